//! Concentration to effect: the Emax transform and the discrete level
//! classifier.

use serde::{Deserialize, Serialize};
use crate::config::EffectThresholds;
use crate::error::{PKError, PKResult};

pub const E_MAX_PERCENT: f64 = 100.0;

/// Emax model with a Hill coefficient of 1.
///
/// `E(C) = 100 · C / (C + EC50)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PharmacodynamicModel {
    ec50: f64,
}

impl PharmacodynamicModel {
    pub fn new(ec50: f64) -> PKResult<Self> {
        if !ec50.is_finite() || ec50 <= 0.0 {
            return Err(PKError::InvalidModel("EC50 must be finite and > 0".to_string()));
        }
        Ok(Self { ec50 })
    }

    pub fn ec50(&self) -> f64 {
        self.ec50
    }

    /// Effect in percent of the maximal effect; 0 for non-positive input.
    pub fn effect_percent(&self, concentration: f64) -> f64 {
        E_MAX_PERCENT * self.effect_fraction(concentration)
    }

    pub fn effect_fraction(&self, concentration: f64) -> f64 {
        if concentration <= 0.0 || concentration.is_nan() {
            return 0.0;
        }
        concentration / (concentration + self.ec50)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectLevel {
    None,
    Light,
    Moderate,
    Strong,
}

/// Maps a value onto an [`EffectLevel`], testing the highest cutoff first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectClassifier {
    thresholds: EffectThresholds,
    light_cutoff: f64,
}

impl EffectClassifier {
    pub fn new(thresholds: EffectThresholds) -> Self {
        Self { thresholds, light_cutoff: thresholds.light }
    }

    /// Reports `Light` from the negligible cutoff upwards, leaving no band
    /// between "negligible" and "light". Used for blood alcohol.
    pub fn with_negligible_as_light(thresholds: EffectThresholds) -> Self {
        Self { thresholds, light_cutoff: thresholds.negligible }
    }

    pub fn thresholds(&self) -> &EffectThresholds {
        &self.thresholds
    }

    /// (level, cutoff) pairs, most severe first.
    pub fn levels(&self) -> [(EffectLevel, f64); 3] {
        [
            (EffectLevel::Strong, self.thresholds.strong),
            (EffectLevel::Moderate, self.thresholds.moderate),
            (EffectLevel::Light, self.light_cutoff),
        ]
    }

    pub fn classify(&self, value: f64) -> EffectLevel {
        self.levels()
            .into_iter()
            .find(|&(_, cutoff)| value >= cutoff)
            .map(|(level, _)| level)
            .unwrap_or(EffectLevel::None)
    }

    pub fn is_negligible(&self, value: f64) -> bool {
        value < self.thresholds.negligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn caffeine_thresholds() -> EffectThresholds {
        EffectThresholds { negligible: 0.3, light: 1.0, moderate: 3.0, strong: 8.0 }
    }

    #[test]
    fn test_emax_half_effect_at_ec50() {
        let pd = PharmacodynamicModel::new(5.0).unwrap();
        assert_eq!(pd.effect_percent(5.0), 50.0);
        assert_eq!(pd.effect_percent(0.0), 0.0);
        assert_eq!(pd.effect_percent(-3.0), 0.0);
        assert_relative_eq!(pd.effect_fraction(15.0), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_emax_bounded_and_monotonic() {
        let pd = PharmacodynamicModel::new(12.0).unwrap();
        let mut previous = 0.0;
        for step in 1..2000 {
            let effect = pd.effect_percent(step as f64 * 0.5);
            assert!(effect > previous);
            assert!(effect < 100.0);
            previous = effect;
        }
    }

    #[test]
    fn test_rejects_invalid_ec50() {
        assert!(PharmacodynamicModel::new(0.0).is_err());
        assert!(PharmacodynamicModel::new(f64::NAN).is_err());
    }

    #[test]
    fn test_classifier_cutoffs_inclusive() {
        let classifier = EffectClassifier::new(caffeine_thresholds());
        assert_eq!(classifier.classify(0.0), EffectLevel::None);
        assert_eq!(classifier.classify(0.99), EffectLevel::None);
        assert_eq!(classifier.classify(1.0), EffectLevel::Light);
        assert_eq!(classifier.classify(3.0), EffectLevel::Moderate);
        assert_eq!(classifier.classify(8.0), EffectLevel::Strong);
        assert_eq!(classifier.classify(50.0), EffectLevel::Strong);
        assert!(classifier.is_negligible(0.29));
        assert!(!classifier.is_negligible(0.3));
    }

    #[test]
    fn test_negligible_as_light() {
        let thresholds = EffectThresholds { negligible: 0.1, light: 0.2, moderate: 0.5, strong: 1.2 };
        let classifier = EffectClassifier::with_negligible_as_light(thresholds);
        assert_eq!(classifier.classify(0.09), EffectLevel::None);
        assert_eq!(classifier.classify(0.1), EffectLevel::Light);
        assert_eq!(classifier.classify(0.15), EffectLevel::Light);
        assert_eq!(classifier.classify(0.5), EffectLevel::Moderate);
        assert_eq!(EffectClassifier::new(thresholds).classify(0.15), EffectLevel::None);
    }

    #[test]
    fn test_classifier_non_decreasing() {
        let classifier = EffectClassifier::new(caffeine_thresholds());
        let mut rng = StdRng::seed_from_u64(42);
        let mut values: Vec<f64> = (0..500).map(|_| rng.gen_range(0.0..12.0)).collect();
        values.sort_by(|a, b| a.total_cmp(b));

        let levels: Vec<EffectLevel> = values.iter().map(|&v| classifier.classify(v)).collect();
        assert!(levels.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
