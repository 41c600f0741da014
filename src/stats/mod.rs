use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::dosing::{filter_substance, hours_between, DoseRecord, Substance};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_dose: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SummaryStats {
    /// Population statistics; all zeros for an empty slice.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self { mean: 0.0, std_dev: 0.0, min: 0.0, max: 0.0 };
        }

        Self {
            mean: mean(values),
            std_dev: std_dev(values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Doses of `substance` taken within `[start, end]`, oldest first.
pub fn doses_between(doses: &[DoseRecord], substance: Substance, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DoseRecord> {
    let mut selected: Vec<DoseRecord> = filter_substance(doses, substance)
        .filter(|dose| dose.taken_at >= start && dose.taken_at <= end)
        .cloned()
        .collect();
    selected.sort_by_key(|dose| dose.taken_at);
    selected
}

/// One entry per calendar day (UTC) for the `days` days ending on `today`,
/// including days without any dose.
pub fn daily_stats(doses: &[DoseRecord], substance: Substance, today: NaiveDate, days: u32) -> Vec<DailyStats> {
    if days == 0 {
        return Vec::new();
    }
    let start = today - Duration::days(i64::from(days) - 1);

    let mut grouped: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for dose in filter_substance(doses, substance) {
        let date = dose.taken_at.date_naive();
        if date >= start && date <= today {
            let entry = grouped.entry(date).or_insert((0.0, 0));
            entry.0 += dose.amount;
            entry.1 += 1;
        }
    }

    start
        .iter_days()
        .take_while(|date| *date <= today)
        .map(|date| {
            let (total_dose, count) = grouped.get(&date).copied().unwrap_or((0.0, 0));
            DailyStats { date, total_dose, count }
        })
        .collect()
}

/// Mean gap between consecutive doses in hours; `None` with fewer than two.
pub fn average_interval_hours(doses: &[DoseRecord]) -> Option<f64> {
    if doses.len() < 2 {
        return None;
    }
    let mut times: Vec<DateTime<Utc>> = doses.iter().map(|dose| dose.taken_at).collect();
    times.sort();

    let intervals: Vec<f64> = times.windows(2).map(|pair| hours_between(pair[0], pair[1])).collect();
    Some(mean(&intervals))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        let mean_val = mean(values);
        let variance = values.iter()
            .map(|v| (v - mean_val).powi(2))
            .sum::<f64>() / values.len() as f64;
        variance.sqrt()
    }
}
