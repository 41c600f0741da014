//! Fixed-step time iteration shared by the alcohol integrator and the
//! threshold predictor.

use std::ops::ControlFlow;

const STEP_TOLERANCE: f64 = 1e-9;

/// Iterator over elapsed times `i * dt` for `i` in `first..=last`, with every
/// value clamped to `limit`.
#[derive(Debug, Clone)]
pub struct FixedStep {
    dt: f64,
    next: usize,
    last: usize,
    limit: f64,
}

impl FixedStep {
    /// Steps `dt, 2·dt, …` until `total` is covered; the final step lands
    /// exactly on `total`. Empty when `total <= 0`.
    pub fn covering(total: f64, dt: f64) -> Self {
        let count = if total > 0.0 && dt > 0.0 {
            let ratio = total / dt;
            // 1.1 / 0.1 is 11.000000000000002, which must stay 11 steps
            if (ratio - ratio.round()).abs() < STEP_TOLERANCE {
                ratio.round().max(1.0) as usize
            } else {
                ratio.ceil() as usize
            }
        } else {
            0
        };
        Self { dt, next: 1, last: count, limit: total }
    }

    /// Steps `0, dt, 2·dt, …` up to and including `horizon` when it is a
    /// multiple of `dt`.
    pub fn inclusive(horizon: f64, dt: f64) -> Self {
        let count = if horizon >= 0.0 && dt > 0.0 {
            (horizon / dt).floor() as usize
        } else {
            0
        };
        Self { dt, next: 0, last: count, limit: horizon.max(0.0) }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }
}

impl Iterator for FixedStep {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.next > self.last {
            return None;
        }
        let elapsed = (self.next as f64 * self.dt).min(self.limit);
        self.next += 1;
        Some(elapsed)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.last + 1).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

/// Runs `update(state, elapsed)` once per step and returns the final state.
///
/// Stops early once `settled(&state)` holds after a step. The caller must
/// only report a state as settled when no remaining step can change it.
pub fn integrate<S, F, P>(mut steps: FixedStep, initial: S, mut update: F, mut settled: P) -> S
where
    F: FnMut(S, f64) -> S,
    P: FnMut(&S) -> bool,
{
    let outcome = steps.try_fold(initial, |state, elapsed| {
        let state = update(state, elapsed);
        if settled(&state) {
            ControlFlow::Break(state)
        } else {
            ControlFlow::Continue(state)
        }
    });

    match outcome {
        ControlFlow::Break(state) | ControlFlow::Continue(state) => state,
    }
}
