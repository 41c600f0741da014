use chrono::{DateTime, Utc};
use super::PKModel;
use crate::config::KineticParameters;
use crate::dosing::DoseRecord;

/// Relative gap below which ka and ke are treated as equal and the
/// L'Hôpital limit of the Bateman function is used.
const RATE_EPSILON: f64 = 1e-10;

/// One-compartment model with first-order absorption and elimination.
#[derive(Debug, Clone)]
pub struct OneCompartmentModel {
    params: KineticParameters,
    ka: f64,
    ke: f64,
}

impl OneCompartmentModel {
    pub fn new(params: KineticParameters) -> Self {
        Self {
            ka: params.absorption_rate(),
            ke: params.elimination_rate(),
            params,
        }
    }

    pub fn parameters(&self) -> &KineticParameters {
        &self.params
    }

    /// Bateman curve for `amount` mg in `volume` L, `hours` after intake.
    fn bateman(&self, amount: f64, volume: f64, hours: f64) -> f64 {
        if hours < 0.0 || volume <= 0.0 {
            return 0.0;
        }

        let (ka, ke) = (self.ka, self.ke);
        let exposure = amount * self.params.bioavailability / volume;

        let concentration = if (ka - ke).abs() > RATE_EPSILON * ka.max(ke) {
            exposure * ka / (ka - ke) * ((-ke * hours).exp() - (-ka * hours).exp())
        } else {
            exposure * ke * hours * (-ke * hours).exp()
        };

        if concentration.is_finite() {
            concentration.max(0.0)
        } else {
            0.0
        }
    }

    /// Analytic time to peak, `ln(ka/ke) / (ka - ke)`, in hours.
    pub fn peak_time_hours(&self) -> f64 {
        let (ka, ke) = (self.ka, self.ke);
        if (ka - ke).abs() > RATE_EPSILON * ka.max(ke) {
            (ka / ke).ln() / (ka - ke)
        } else {
            1.0 / ke
        }
    }

    /// Time for near-complete elimination (five half-lives).
    pub fn elimination_time_hours(&self) -> f64 {
        self.params.half_life_hours * 5.0
    }
}

impl PKModel for OneCompartmentModel {
    fn concentration(&self, dose: &DoseRecord, at: DateTime<Utc>) -> f64 {
        self.bateman(dose.amount, self.volume_l(dose), dose.hours_since(at))
    }

    fn remaining_amount(&self, dose: &DoseRecord, at: DateTime<Utc>) -> f64 {
        self.concentration(dose, at) * self.volume_l(dose)
    }

    fn volume_l(&self, dose: &DoseRecord) -> f64 {
        dose.body_weight_kg * self.params.volume_l_per_kg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};
    use crate::config::EngineConfig;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn caffeine() -> OneCompartmentModel {
        OneCompartmentModel::new(EngineConfig::default().caffeine.kinetics)
    }

    #[test]
    fn test_bateman_matches_closed_form() {
        let model = caffeine();
        let dose = DoseRecord::new(t0(), 80.0, 72.0, "caffeine").unwrap();

        let ka = std::f64::consts::LN_2 / 0.75;
        let ke = std::f64::consts::LN_2 / 5.0;
        let volume = 72.0 * 0.65;
        let t = 2.0;
        let expected = 80.0 * ka / (volume * (ka - ke)) * ((-ke * t).exp() - (-ka * t).exp());

        let conc = model.concentration(&dose, t0() + Duration::hours(2));
        assert_relative_eq!(conc, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_before_intake() {
        let model = caffeine();
        let dose = DoseRecord::new(t0(), 80.0, 72.0, "caffeine").unwrap();
        assert_eq!(model.concentration(&dose, t0() - Duration::seconds(1)), 0.0);
        assert_eq!(model.concentration(&dose, t0()), 0.0);
    }

    #[test]
    fn test_equal_rates_use_limit_form() {
        let params = KineticParameters {
            half_life_hours: 2.0,
            absorption_time_hours: 2.0,
            bioavailability: 1.0,
            volume_l_per_kg: 1.0,
        };
        let model = OneCompartmentModel::new(params);
        let dose = DoseRecord::new(t0(), 100.0, 50.0, "paracetamol").unwrap();

        let ke = std::f64::consts::LN_2 / 2.0;
        let expected = 100.0 / 50.0 * ke * 3.0 * (-ke * 3.0).exp();
        let conc = model.concentration(&dose, t0() + Duration::hours(3));
        assert!(conc.is_finite());
        assert_relative_eq!(conc, expected, epsilon = 1e-12);
        assert_relative_eq!(model.peak_time_hours(), 1.0 / ke, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_volume_yields_zero() {
        let mut params = EngineConfig::default().ibuprofen.kinetics;
        params.volume_l_per_kg = 0.0;
        let model = OneCompartmentModel::new(params);
        let dose = DoseRecord::new(t0(), 400.0, 72.0, "ibuprofen").unwrap();
        assert_eq!(model.concentration(&dose, t0() + Duration::hours(1)), 0.0);
    }

    #[test]
    fn test_strictly_decreasing_after_peak() {
        let model = caffeine();
        let dose = DoseRecord::new(t0(), 80.0, 72.0, "caffeine").unwrap();
        let peak = model.peak_time_hours();

        let mut previous = f64::INFINITY;
        for step in 0..200 {
            let hours = peak + 0.01 + step as f64 * 0.25;
            let at = t0() + crate::dosing::hours_to_duration(hours);
            let conc = model.concentration(&dose, at);
            assert!(conc < previous, "not decreasing at {} h", hours);
            previous = conc;
        }
    }

    #[test]
    fn test_remaining_amount_inverts_volume() {
        let model = caffeine();
        let dose = DoseRecord::new(t0(), 80.0, 60.0, "caffeine").unwrap();
        let at = t0() + Duration::hours(3);
        let amount = model.remaining_amount(&dose, at);
        assert_relative_eq!(amount, model.concentration(&dose, at) * 60.0 * 0.65, epsilon = 1e-12);
        assert!(amount < 80.0);
    }
}
