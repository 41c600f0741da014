use serde::{Deserialize, Serialize};

/// One caffeine "unit", a standard espresso capsule.
pub const MG_PER_UNIT: f64 = 80.0;

const MINIMUM_EFFECTIVE_DOSE_MG_PER_KG: f64 = 0.5;

/// Common servings expressed in caffeine units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaffeineServing {
    Espresso,
    Lungo,
    StrongCapsule,
    RegularCup,
    Tea,
    ColaCan,
}

impl CaffeineServing {
    pub fn units(&self) -> f64 {
        match self {
            CaffeineServing::Espresso => 1.0,
            CaffeineServing::Lungo => 1.2,
            CaffeineServing::StrongCapsule => 1.8,
            CaffeineServing::RegularCup => 1.2,
            CaffeineServing::Tea => 0.6,
            CaffeineServing::ColaCan => 0.4,
        }
    }

    pub fn milligrams(&self) -> f64 {
        units_to_mg(self.units())
    }
}

pub fn units_to_mg(units: f64) -> f64 {
    units * MG_PER_UNIT
}

/// Smallest dose (mg) expected to have a noticeable effect at this weight.
pub fn effectiveness_threshold_mg(body_weight_kg: f64) -> f64 {
    MINIMUM_EFFECTIVE_DOSE_MG_PER_KG * body_weight_kg
}
