use chrono::{DateTime, Utc};
use super::PKModel;
use crate::config::{AlcoholConfig, Sex, UserProfile};
use crate::dosing::DoseRecord;
use crate::simulation::stepper::{integrate, FixedStep};

/// Alcohol model: absorption split across a fast and a slow first-order
/// compartment, zero-order elimination, integrated in fixed steps.
///
/// Dose amounts are standard units; concentrations are g/L.
#[derive(Debug, Clone)]
pub struct AlcoholModel {
    grams_per_unit: f64,
    elimination_rate: f64,
    fast_fraction: f64,
    k_fast: f64,
    k_slow: f64,
    diffusion_coefficient: f64,
    dt_hours: f64,
}

impl AlcoholModel {
    pub fn new(config: &AlcoholConfig, beverage: &str, sex: Sex) -> Self {
        let absorption_time = config.absorption_time_hours(beverage);
        Self {
            grams_per_unit: config.grams_per_unit,
            elimination_rate: config.elimination_rate_g_per_l_h,
            fast_fraction: config.fast_fraction,
            k_fast: std::f64::consts::LN_2 / (absorption_time * config.fast_time_ratio),
            k_slow: std::f64::consts::LN_2 / absorption_time,
            diffusion_coefficient: config.diffusion_coefficient(sex),
            dt_hours: config.step_minutes / 60.0,
        }
    }

    pub fn for_profile(config: &AlcoholConfig, profile: &UserProfile) -> Self {
        Self::new(config, &profile.beverage, profile.sex)
    }

    /// Fraction of the dose absorbed after `hours`.
    fn absorbed_fraction(&self, hours: f64) -> f64 {
        let slow_fraction = 1.0 - self.fast_fraction;
        let absorbed = self.fast_fraction * (1.0 - (-self.k_fast * hours).exp())
            + slow_fraction * (1.0 - (-self.k_slow * hours).exp());
        absorbed.min(1.0)
    }

    /// Grams of ethanol still in the body `hours` after intake.
    pub fn remaining_grams(&self, dose: &DoseRecord, hours: f64) -> f64 {
        if hours <= 0.0 {
            return 0.0;
        }

        let total_grams = dose.amount * self.grams_per_unit;
        let elimination_per_step = self.elimination_rate * self.volume_l(dose) * self.dt_hours;

        // Once the body is empty and what is left to absorb fits within one
        // step of elimination, every later step leaves it empty.
        let (grams, _) = integrate(
            FixedStep::covering(hours, self.dt_hours),
            (0.0_f64, 0.0_f64),
            |(grams, previous_absorbed), elapsed| {
                let absorbed = total_grams * self.absorbed_fraction(elapsed);
                let newly_absorbed = (absorbed - previous_absorbed).max(0.0);
                let grams = (grams + newly_absorbed - elimination_per_step).max(0.0);
                (grams, absorbed)
            },
            |&(grams, absorbed)| grams <= 0.0 && total_grams - absorbed <= elimination_per_step,
        );

        grams
    }
}

impl PKModel for AlcoholModel {
    fn concentration(&self, dose: &DoseRecord, at: DateTime<Utc>) -> f64 {
        let volume = self.volume_l(dose);
        if volume <= 0.0 {
            return 0.0;
        }
        self.remaining_grams(dose, dose.hours_since(at)) / volume
    }

    /// Remaining standard units.
    fn remaining_amount(&self, dose: &DoseRecord, at: DateTime<Utc>) -> f64 {
        self.remaining_grams(dose, dose.hours_since(at)) / self.grams_per_unit
    }

    fn volume_l(&self, dose: &DoseRecord) -> f64 {
        dose.body_weight_kg * self.diffusion_coefficient
    }
}
