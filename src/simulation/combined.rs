use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use super::{sample_times, ChartPoint, SubstanceEngine, ThresholdPredictor};
use crate::config::{EffectThresholds, EngineConfig, UserProfile};
use crate::dosing::{filter_substance, DoseRecord, Substance};
use crate::error::PKResult;
use crate::pharmacodynamics::EffectLevel;

/// Per-substance and combined effect at one instant, all in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedPoint {
    pub time: DateTime<Utc>,
    pub paracetamol_effect: f64,
    pub ibuprofen_effect: f64,
    pub combined_effect: f64,
}

/// Paracetamol and ibuprofen on one normalised effect scale.
///
/// 100 % is the summed peak effect of the reference dose pair, computed once
/// at construction. Doses are routed to each pipeline by substance tag.
#[derive(Debug, Clone)]
pub struct CombinedCalculator {
    paracetamol: SubstanceEngine,
    ibuprofen: SubstanceEngine,
    reference_max: f64,
    predictor: ThresholdPredictor,
}

impl CombinedCalculator {
    pub fn new(config: &EngineConfig, profile: &UserProfile) -> PKResult<Self> {
        let paracetamol = SubstanceEngine::new(Substance::Paracetamol, config, profile)?;
        let ibuprofen = SubstanceEngine::new(Substance::Ibuprofen, config, profile)?;

        let combined = &config.combined;
        let reference_time = DateTime::<Utc>::UNIX_EPOCH;
        let window_end = reference_time + Duration::hours(combined.reference_window_hours);

        let peak_effect = |engine: &SubstanceEngine, amount: f64| -> PKResult<f64> {
            let dose = DoseRecord::new(reference_time, amount, combined.reference_weight_kg, engine.substance().tag())?;
            let peak = engine
                .chart(&[dose], reference_time, window_end, combined.reference_points)?
                .into_iter()
                .map(|point| point.concentration)
                .fold(0.0, f64::max);
            Ok(engine.pharmacodynamics().effect_percent(peak))
        };

        let mut reference_max = peak_effect(&paracetamol, combined.reference_paracetamol_mg)?
            + peak_effect(&ibuprofen, combined.reference_ibuprofen_mg)?;
        if reference_max <= 0.0 {
            reference_max = 100.0;
        }
        debug!("Combined pain relief normalised against {:.3} % summed peak effect", reference_max);

        Ok(Self {
            paracetamol,
            ibuprofen,
            reference_max,
            predictor: ThresholdPredictor::from_window(&combined.prediction),
        })
    }

    pub fn reference_max(&self) -> f64 {
        self.reference_max
    }

    pub fn paracetamol(&self) -> &SubstanceEngine {
        &self.paracetamol
    }

    pub fn ibuprofen(&self) -> &SubstanceEngine {
        &self.ibuprofen
    }

    fn concentrations(&self, doses: &[DoseRecord], at: DateTime<Utc>) -> (f64, f64) {
        (
            self.paracetamol.aggregator().total_of(filter_substance(doses, Substance::Paracetamol), at),
            self.ibuprofen.aggregator().total_of(filter_substance(doses, Substance::Ibuprofen), at),
        )
    }

    pub fn effect_point(&self, doses: &[DoseRecord], at: DateTime<Utc>) -> CombinedPoint {
        let (para, ibu) = self.concentrations(doses, at);
        let paracetamol_effect = self.paracetamol.pharmacodynamics().effect_percent(para);
        let ibuprofen_effect = self.ibuprofen.pharmacodynamics().effect_percent(ibu);
        CombinedPoint {
            time: at,
            paracetamol_effect,
            ibuprofen_effect,
            combined_effect: 100.0 * (paracetamol_effect + ibuprofen_effect) / self.reference_max,
        }
    }

    /// Normalised combined effect; can exceed 100 for doses above the
    /// reference pair.
    pub fn effect_percent(&self, doses: &[DoseRecord], at: DateTime<Utc>) -> f64 {
        self.effect_point(doses, at).combined_effect
    }

    /// Worse of the two individually classified levels. Not derived from the
    /// combined percentage.
    pub fn combined_level(&self, doses: &[DoseRecord], at: DateTime<Utc>) -> EffectLevel {
        let (para, ibu) = self.concentrations(doses, at);
        let para_level = self.paracetamol.classifier().classify(para);
        let ibu_level = self.ibuprofen.classifier().classify(ibu);
        para_level.max(ibu_level)
    }

    pub fn chart(
        &self,
        doses: &[DoseRecord],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        points: usize,
    ) -> PKResult<Vec<ChartPoint>> {
        Ok(self.effect_series(doses, start, end, points)?
            .into_iter()
            .map(|point| ChartPoint { time: point.time, concentration: point.combined_effect })
            .collect())
    }

    pub fn effect_series(
        &self,
        doses: &[DoseRecord],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        points: usize,
    ) -> PKResult<Vec<CombinedPoint>> {
        Ok(sample_times(start, end, points)?
            .into_iter()
            .map(|at| self.effect_point(doses, at))
            .collect())
    }

    /// First step at which both substances are below their negligible cutoffs.
    pub fn predict_effect_end(&self, doses: &[DoseRecord], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.predictor.predict_crossing(doses, now, |at| {
            let (para, ibu) = self.concentrations(doses, at);
            self.paracetamol.is_negligible(para) && self.ibuprofen.is_negligible(ibu)
        })
    }

    /// Position of a pair of cutoffs on the normalised scale, taking the
    /// stronger of the two substances' effects.
    fn unified_percent(&self, paracetamol_cutoff: f64, ibuprofen_cutoff: f64) -> f64 {
        let para = self.paracetamol.pharmacodynamics().effect_percent(paracetamol_cutoff);
        let ibu = self.ibuprofen.pharmacodynamics().effect_percent(ibuprofen_cutoff);
        100.0 * para.max(ibu) / self.reference_max
    }

    pub fn strong_percent(&self) -> f64 {
        let (para, ibu) = self.cutoffs();
        self.unified_percent(para.strong, ibu.strong)
    }

    pub fn moderate_percent(&self) -> f64 {
        let (para, ibu) = self.cutoffs();
        self.unified_percent(para.moderate, ibu.moderate)
    }

    pub fn light_percent(&self) -> f64 {
        let (para, ibu) = self.cutoffs();
        self.unified_percent(para.light, ibu.light)
    }

    fn cutoffs(&self) -> (EffectThresholds, EffectThresholds) {
        (*self.paracetamol.classifier().thresholds(), *self.ibuprofen.classifier().thresholds())
    }
}
