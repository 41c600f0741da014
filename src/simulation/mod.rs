pub mod stepper;
pub mod prediction;
pub mod engine;
pub mod combined;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use crate::dosing::DoseRecord;
use crate::error::{PKError, PKResult};
use crate::models::{KineticModel, PKModel};

pub use combined::{CombinedCalculator, CombinedPoint};
pub use engine::SubstanceEngine;
pub use prediction::ThresholdPredictor;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub time: DateTime<Utc>,
    pub concentration: f64,
}

/// Sums single-dose contributions of one kinetic model (superposition).
/// Holds no state besides the model; every call reads the dose snapshot
/// it is given.
#[derive(Debug, Clone)]
pub struct ConcentrationAggregator {
    model: KineticModel,
}

impl ConcentrationAggregator {
    pub fn new(model: KineticModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &KineticModel {
        &self.model
    }

    pub fn single(&self, dose: &DoseRecord, at: DateTime<Utc>) -> f64 {
        self.model.concentration(dose, at)
    }

    pub fn total(&self, doses: &[DoseRecord], at: DateTime<Utc>) -> f64 {
        self.total_of(doses, at)
    }

    pub fn total_of<'a, I>(&self, doses: I, at: DateTime<Utc>) -> f64
    where
        I: IntoIterator<Item = &'a DoseRecord>,
    {
        doses.into_iter()
            .map(|dose| self.model.concentration(dose, at))
            .fold(0.0, |sum, conc| sum + conc)
    }

    /// Remaining absolute quantity (mg or units); the inverse of the volume
    /// scaling applied by the model.
    pub fn total_amount<'a, I>(&self, doses: I, at: DateTime<Utc>) -> f64
    where
        I: IntoIterator<Item = &'a DoseRecord>,
    {
        doses.into_iter()
            .map(|dose| self.model.remaining_amount(dose, at))
            .fold(0.0, |sum, amount| sum + amount)
    }

    pub fn sample_chart(
        &self,
        doses: &[DoseRecord],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        points: usize,
    ) -> PKResult<Vec<ChartPoint>> {
        let times = sample_times(start, end, points)?;
        Ok(times.into_iter()
            .map(|time| ChartPoint { time, concentration: self.total(doses, time) })
            .collect())
    }
}

/// `points + 1` evenly spaced instants covering `[start, end]`.
pub fn sample_times(start: DateTime<Utc>, end: DateTime<Utc>, points: usize) -> PKResult<Vec<DateTime<Utc>>> {
    if points == 0 {
        return Err(PKError::Sampling("Point count must be at least 1".to_string()));
    }
    if end < start {
        return Err(PKError::Sampling(
            format!("Sampling window ends ({}) before it starts ({})", end, start)
        ));
    }

    let span_ms = (end - start).num_milliseconds() as i128;
    let n = points as i128;
    Ok((0..=n)
        .map(|i| start + Duration::milliseconds((span_ms * i / n) as i64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;
    use crate::config::{EngineConfig, UserProfile};
    use crate::dosing::Substance;
    use crate::models::create_model;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn aggregator(substance: Substance) -> ConcentrationAggregator {
        ConcentrationAggregator::new(create_model(substance, &EngineConfig::default(), &UserProfile::default()))
    }

    #[test]
    fn test_empty_total_is_zero() {
        let agg = aggregator(Substance::Caffeine);
        assert_eq!(agg.total(&[], t0()), 0.0);
        assert_eq!(agg.total_amount(&[], t0()), 0.0);
    }

    #[test]
    fn test_superposition_is_exact() {
        let mut rng = StdRng::seed_from_u64(7);
        for substance in Substance::ALL {
            let agg = aggregator(substance);
            for _ in 0..20 {
                let d1 = DoseRecord::new(
                    t0() + Duration::minutes(rng.gen_range(-600..600)),
                    rng.gen_range(0.5..500.0),
                    rng.gen_range(45.0..110.0),
                    substance.tag(),
                ).unwrap();
                let d2 = DoseRecord::new(
                    t0() + Duration::minutes(rng.gen_range(-600..600)),
                    rng.gen_range(0.5..500.0),
                    rng.gen_range(45.0..110.0),
                    substance.tag(),
                ).unwrap();
                let at = t0() + Duration::minutes(rng.gen_range(-120..1440));

                let total = agg.total(&[d1.clone(), d2.clone()], at);
                assert_eq!(total, agg.single(&d1, at) + agg.single(&d2, at));
            }
        }
    }

    #[test]
    fn test_total_amount_matches_concentration_times_volume() {
        let agg = aggregator(Substance::Paracetamol);
        let doses = vec![
            DoseRecord::new(t0(), 1000.0, 72.0, "paracetamol").unwrap(),
            DoseRecord::new(t0() + Duration::hours(6), 500.0, 72.0, "paracetamol").unwrap(),
        ];
        let at = t0() + Duration::hours(7);
        let volume = 72.0 * 0.95;
        assert_relative_eq!(agg.total_amount(&doses, at), agg.total(&doses, at) * volume, epsilon = 1e-9);
    }

    #[test]
    fn test_sample_chart_shape() {
        let agg = aggregator(Substance::Caffeine);
        let doses = vec![DoseRecord::new(t0(), 80.0, 72.0, "caffeine").unwrap()];
        let chart = agg.sample_chart(&doses, t0() - Duration::hours(2), t0() + Duration::hours(22), 96).unwrap();

        assert_eq!(chart.len(), 97);
        assert_eq!(chart[0].time, t0() - Duration::hours(2));
        assert_eq!(chart[96].time, t0() + Duration::hours(22));
        assert_eq!(chart[1].time - chart[0].time, Duration::minutes(15));
        assert_eq!(chart[0].concentration, 0.0);
    }

    #[test]
    fn test_sample_chart_rejects_bad_arguments() {
        let agg = aggregator(Substance::Caffeine);
        assert!(matches!(agg.sample_chart(&[], t0(), t0() + Duration::hours(1), 0), Err(PKError::Sampling(_))));
        assert!(matches!(agg.sample_chart(&[], t0(), t0() - Duration::hours(1), 10), Err(PKError::Sampling(_))));
    }
}
