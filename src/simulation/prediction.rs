use chrono::{DateTime, Duration, Utc};
use log::debug;
use super::stepper::FixedStep;
use crate::config::PredictionWindow;
use crate::dosing::DoseRecord;

/// Coarse forward search for the first instant a condition holds.
///
/// Steps from `now` in fixed increments up to a bounded horizon, so an answer
/// may be up to one step late. `None` means the condition did not hold
/// anywhere within the horizon.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdPredictor {
    step: Duration,
    horizon: Duration,
}

impl ThresholdPredictor {
    pub fn new(step: Duration, horizon: Duration) -> Self {
        Self { step, horizon }
    }

    pub fn from_window(window: &PredictionWindow) -> Self {
        Self::new(Duration::minutes(window.step_minutes), Duration::hours(window.horizon_hours))
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    /// First step at which `crossed(t)` is true. Returns `now` right away
    /// for an empty dose list.
    pub fn predict_crossing<F>(&self, doses: &[DoseRecord], now: DateTime<Utc>, mut crossed: F) -> Option<DateTime<Utc>>
    where
        F: FnMut(DateTime<Utc>) -> bool,
    {
        if doses.is_empty() {
            return Some(now);
        }

        let step_minutes = self.step.num_minutes().max(1);
        let steps = FixedStep::inclusive(self.horizon.num_minutes() as f64, step_minutes as f64);

        let found = steps
            .map(|minutes| now + Duration::minutes(minutes as i64))
            .find(|&at| crossed(at));

        if found.is_none() {
            debug!(
                "No crossing within {} h of {} ({} doses)",
                self.horizon.num_hours(), now, doses.len()
            );
        }
        found
    }
}
