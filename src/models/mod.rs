pub mod one_compartment;
pub mod alcohol;

use chrono::{DateTime, Utc};
use crate::config::{EngineConfig, UserProfile};
use crate::dosing::{DoseRecord, Substance};

pub use alcohol::AlcoholModel;
pub use one_compartment::OneCompartmentModel;

/// Single-dose kinetics. Implementations return 0 for any instant before the
/// dose was taken and never return NaN.
pub trait PKModel {
    fn concentration(&self, dose: &DoseRecord, at: DateTime<Utc>) -> f64;

    /// Amount still in the body, in the dose's own unit.
    fn remaining_amount(&self, dose: &DoseRecord, at: DateTime<Utc>) -> f64;

    /// Volume the dose is distributed in, litres.
    fn volume_l(&self, dose: &DoseRecord) -> f64;
}

/// The closed set of kinetic families, one variant per family.
#[derive(Debug, Clone)]
pub enum KineticModel {
    OneCompartment(OneCompartmentModel),
    Alcohol(AlcoholModel),
}

impl PKModel for KineticModel {
    fn concentration(&self, dose: &DoseRecord, at: DateTime<Utc>) -> f64 {
        match self {
            KineticModel::OneCompartment(model) => model.concentration(dose, at),
            KineticModel::Alcohol(model) => model.concentration(dose, at),
        }
    }

    fn remaining_amount(&self, dose: &DoseRecord, at: DateTime<Utc>) -> f64 {
        match self {
            KineticModel::OneCompartment(model) => model.remaining_amount(dose, at),
            KineticModel::Alcohol(model) => model.remaining_amount(dose, at),
        }
    }

    fn volume_l(&self, dose: &DoseRecord) -> f64 {
        match self {
            KineticModel::OneCompartment(model) => model.volume_l(dose),
            KineticModel::Alcohol(model) => model.volume_l(dose),
        }
    }
}

pub fn create_model(substance: Substance, config: &EngineConfig, profile: &UserProfile) -> KineticModel {
    match config.substance(substance) {
        Some(substance_config) => {
            KineticModel::OneCompartment(OneCompartmentModel::new(substance_config.kinetics))
        }
        None => KineticModel::Alcohol(AlcoholModel::for_profile(&config.alcohol, profile)),
    }
}
