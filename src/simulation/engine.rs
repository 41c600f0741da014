use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::{ChartPoint, ConcentrationAggregator, ThresholdPredictor};
use crate::config::{EngineConfig, UserProfile};
use crate::dosing::{DoseRecord, Substance};
use crate::error::PKResult;
use crate::models::{create_model, KineticModel};
use crate::pharmacodynamics::{EffectClassifier, EffectLevel, PharmacodynamicModel};

/// Everything the engine knows about one substance at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstanceStatus {
    pub substance: Substance,
    pub at: DateTime<Utc>,
    pub concentration: f64,
    pub concentration_unit: String,
    pub remaining_amount: f64,
    pub dose_unit: String,
    pub effect_percent: f64,
    pub level: EffectLevel,
    pub effect_end: Option<DateTime<Utc>>,
}

/// Kinetics, effect mapping and prediction for one substance.
#[derive(Debug, Clone)]
pub struct SubstanceEngine {
    substance: Substance,
    aggregator: ConcentrationAggregator,
    pd: PharmacodynamicModel,
    classifier: EffectClassifier,
    predictor: ThresholdPredictor,
    end_cutoff: f64,
}

impl SubstanceEngine {
    pub fn new(substance: Substance, config: &EngineConfig, profile: &UserProfile) -> PKResult<Self> {
        let (ec50, window, end_cutoff) = match config.substance(substance) {
            Some(substance_config) => (
                substance_config.ec50,
                substance_config.prediction,
                substance_config.thresholds.negligible,
            ),
            None => (config.alcohol.ec50, config.alcohol.prediction, config.alcohol.sober_cutoff),
        };

        Ok(Self {
            substance,
            aggregator: ConcentrationAggregator::new(create_model(substance, config, profile)),
            pd: PharmacodynamicModel::new(ec50)?,
            classifier: match substance {
                Substance::Alcohol => EffectClassifier::with_negligible_as_light(config.thresholds(substance)),
                _ => EffectClassifier::new(config.thresholds(substance)),
            },
            predictor: ThresholdPredictor::from_window(&window),
            end_cutoff,
        })
    }

    /// Resolves a substance tag; `None` when the tag is unknown.
    pub fn for_tag(tag: &str, config: &EngineConfig, profile: &UserProfile) -> PKResult<Option<Self>> {
        Substance::from_tag(tag)
            .map(|substance| Self::new(substance, config, profile))
            .transpose()
    }

    pub fn substance(&self) -> Substance {
        self.substance
    }

    pub fn display_name(&self) -> &'static str {
        self.substance.display_name()
    }

    pub fn dose_unit(&self) -> &'static str {
        self.substance.dose_unit()
    }

    pub fn concentration_unit(&self) -> &'static str {
        self.substance.concentration_unit()
    }

    pub fn model(&self) -> &KineticModel {
        self.aggregator.model()
    }

    pub fn aggregator(&self) -> &ConcentrationAggregator {
        &self.aggregator
    }

    pub fn pharmacodynamics(&self) -> &PharmacodynamicModel {
        &self.pd
    }

    pub fn classifier(&self) -> &EffectClassifier {
        &self.classifier
    }

    pub fn predictor(&self) -> &ThresholdPredictor {
        &self.predictor
    }

    pub fn single_dose_concentration(&self, dose: &DoseRecord, at: DateTime<Utc>) -> f64 {
        self.aggregator.single(dose, at)
    }

    pub fn total_concentration(&self, doses: &[DoseRecord], at: DateTime<Utc>) -> f64 {
        self.aggregator.total(doses, at)
    }

    pub fn total_amount(&self, doses: &[DoseRecord], at: DateTime<Utc>) -> f64 {
        self.aggregator.total_amount(doses, at)
    }

    pub fn chart(
        &self,
        doses: &[DoseRecord],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        points: usize,
    ) -> PKResult<Vec<ChartPoint>> {
        self.aggregator.sample_chart(doses, start, end, points)
    }

    pub fn effect_percent(&self, doses: &[DoseRecord], at: DateTime<Utc>) -> f64 {
        self.pd.effect_percent(self.total_concentration(doses, at))
    }

    pub fn effect_level(&self, doses: &[DoseRecord], at: DateTime<Utc>) -> EffectLevel {
        self.classifier.classify(self.total_concentration(doses, at))
    }

    pub fn is_negligible(&self, concentration: f64) -> bool {
        self.classifier.is_negligible(concentration)
    }

    /// First step at which total concentration drops below the end-of-effect
    /// cutoff (the negligible threshold, or the sober cutoff for alcohol).
    pub fn predict_effect_end(&self, doses: &[DoseRecord], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.predict_below(doses, now, self.end_cutoff)
    }

    pub fn predict_below(&self, doses: &[DoseRecord], now: DateTime<Utc>, cutoff: f64) -> Option<DateTime<Utc>> {
        self.predictor.predict_crossing(doses, now, |at| self.total_concentration(doses, at) < cutoff)
    }

    pub fn status(&self, doses: &[DoseRecord], at: DateTime<Utc>) -> SubstanceStatus {
        let concentration = self.total_concentration(doses, at);
        SubstanceStatus {
            substance: self.substance,
            at,
            concentration,
            concentration_unit: self.concentration_unit().to_string(),
            remaining_amount: self.total_amount(doses, at),
            dose_unit: self.dose_unit().to_string(),
            effect_percent: self.pd.effect_percent(concentration),
            level: self.classifier.classify(concentration),
            effect_end: self.predict_effect_end(doses, at),
        }
    }
}
