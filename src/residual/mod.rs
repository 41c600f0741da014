//! Cross-substance overview based on plain half-life decay.
//!
//! Coarser than the kinetic models in [`crate::models`]: no absorption
//! phase, one half-life per substance. Feeds dashboards spanning every
//! substance over long windows.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::config::EngineConfig;
use crate::dosing::{filter_substance, hours_between, DoseRecord, Substance};
use crate::error::{PKError, PKResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualLoadSnapshot {
    pub timestamp: DateTime<Utc>,
    pub substance: Substance,
    pub residual_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakInfo {
    pub peak_amount: f64,
    pub peak_time: DateTime<Utc>,
    /// `None` when no volume of distribution or weight is available.
    pub hours_above_threshold: Option<f64>,
}

/// `Q(t) = Q0 · exp(-ln2 · t / t½)`, 0 before intake.
pub fn residual_amount(initial: f64, half_life_hours: f64, hours_elapsed: f64) -> f64 {
    if hours_elapsed < 0.0 || half_life_hours <= 0.0 {
        return 0.0;
    }
    initial * (-std::f64::consts::LN_2 * hours_elapsed / half_life_hours).exp()
}

pub struct ResidualLoadAggregator<'a> {
    config: &'a EngineConfig,
}

impl<'a> ResidualLoadAggregator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn remaining(&self, dose: &DoseRecord, substance: Substance, at: DateTime<Utc>) -> f64 {
        residual_amount(dose.amount, self.config.residual_half_life_hours(substance), dose.hours_since(at))
    }

    /// Residual load of `substance` summed over the matching doses.
    pub fn total(&self, doses: &[DoseRecord], substance: Substance, at: DateTime<Utc>) -> f64 {
        filter_substance(doses, substance)
            .map(|dose| self.remaining(dose, substance, at))
            .sum()
    }

    pub fn snapshots(
        &self,
        doses: &[DoseRecord],
        substance: Substance,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: Duration,
    ) -> PKResult<Vec<ResidualLoadSnapshot>> {
        if interval <= Duration::zero() {
            return Err(PKError::Sampling("Snapshot interval must be positive".to_string()));
        }

        let mut snapshots = Vec::new();
        let mut timestamp = from;
        while timestamp <= to {
            snapshots.push(ResidualLoadSnapshot {
                timestamp,
                substance,
                residual_amount: self.total(doses, substance, timestamp),
            });
            timestamp += interval;
        }
        Ok(snapshots)
    }

    /// Snapshots for every known substance, grouped by substance.
    pub fn snapshots_for_all(
        &self,
        doses: &[DoseRecord],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: Duration,
    ) -> PKResult<BTreeMap<Substance, Vec<ResidualLoadSnapshot>>> {
        Substance::ALL
            .into_iter()
            .map(|substance| Ok((substance, self.snapshots(doses, substance, from, to, interval)?)))
            .collect()
    }

    /// Mean hourly residual load over the `days` preceding `now`.
    pub fn average_load(&self, doses: &[DoseRecord], substance: Substance, now: DateTime<Utc>, days: i64) -> PKResult<f64> {
        let snapshots = self.snapshots(doses, substance, now - Duration::days(days), now, Duration::hours(1))?;
        if snapshots.is_empty() {
            return Ok(0.0);
        }
        Ok(snapshots.iter().map(|s| s.residual_amount).sum::<f64>() / snapshots.len() as f64)
    }

    /// Peak of a snapshot series and the time spent at or above a
    /// concentration threshold (mg/L), converting amounts through Vd × weight.
    pub fn peak_info(
        &self,
        snapshots: &[ResidualLoadSnapshot],
        from: DateTime<Utc>,
        threshold: f64,
        weight_kg: f64,
    ) -> PeakInfo {
        let Some(peak) = snapshots.iter().max_by(|a, b| a.residual_amount.total_cmp(&b.residual_amount)) else {
            return PeakInfo { peak_amount: 0.0, peak_time: from, hours_above_threshold: Some(0.0) };
        };

        let volume = self.config.volume_l_per_kg(peak.substance).map(|vd| vd * weight_kg);
        let hours_above_threshold = match volume {
            Some(volume) if volume > 0.0 && threshold > 0.0 => Some(
                snapshots
                    .windows(2)
                    .filter(|pair| pair[0].residual_amount / volume >= threshold)
                    .map(|pair| hours_between(pair[0].timestamp, pair[1].timestamp))
                    .sum(),
            ),
            _ => None,
        };

        PeakInfo {
            peak_amount: peak.residual_amount,
            peak_time: peak.timestamp,
            hours_above_threshold,
        }
    }
}
