pub mod caffeine;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::fs::File;
use log::info;
use crate::error::{PKError, PKResult};

pub const DEFAULT_BODY_WEIGHT_KG: f64 = 72.0;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Substances the engine knows how to model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Substance {
    Caffeine,
    Bromazepam,
    Paracetamol,
    Ibuprofen,
    Alcohol,
}

impl Substance {
    pub const ALL: [Substance; 5] = [
        Substance::Caffeine,
        Substance::Bromazepam,
        Substance::Paracetamol,
        Substance::Ibuprofen,
        Substance::Alcohol,
    ];

    /// Resolves a stored substance tag, case-insensitively. Accepts the
    /// French spellings used by older dose files.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "caffeine" | "cafeine" => Some(Substance::Caffeine),
            "bromazepam" => Some(Substance::Bromazepam),
            "paracetamol" | "acetaminophen" => Some(Substance::Paracetamol),
            "ibuprofen" | "ibuprofene" => Some(Substance::Ibuprofen),
            "alcohol" | "alcool" => Some(Substance::Alcohol),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Substance::Caffeine => "caffeine",
            Substance::Bromazepam => "bromazepam",
            Substance::Paracetamol => "paracetamol",
            Substance::Ibuprofen => "ibuprofen",
            Substance::Alcohol => "alcohol",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Substance::Caffeine => "Caffeine",
            Substance::Bromazepam => "Bromazepam",
            Substance::Paracetamol => "Paracetamol",
            Substance::Ibuprofen => "Ibuprofen",
            Substance::Alcohol => "Alcohol",
        }
    }

    pub fn dose_unit(&self) -> &'static str {
        match self {
            Substance::Alcohol => "u",
            _ => "mg",
        }
    }

    pub fn concentration_unit(&self) -> &'static str {
        match self {
            Substance::Alcohol => "g/L",
            _ => "mg/L",
        }
    }
}

impl fmt::Display for Substance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One recorded intake.
///
/// Records are owned by the dose store; the engine only reads snapshots of
/// them and never caches anything derived from a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseRecord {
    #[serde(default = "new_dose_id")]
    pub id: String,
    pub taken_at: DateTime<Utc>,
    /// mg for drugs, standard units (10 g ethanol) for alcohol
    pub amount: f64,
    #[serde(default = "default_weight")]
    pub body_weight_kg: f64,
    #[serde(default)]
    pub substance_key: String,
}

fn new_dose_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_weight() -> f64 {
    DEFAULT_BODY_WEIGHT_KG
}

impl DoseRecord {
    pub fn new(
        taken_at: DateTime<Utc>,
        amount: f64,
        body_weight_kg: f64,
        substance_key: impl Into<String>,
    ) -> PKResult<Self> {
        let dose = Self {
            id: new_dose_id(),
            taken_at,
            amount,
            body_weight_kg,
            substance_key: substance_key.into(),
        };
        dose.validate()?;
        Ok(dose)
    }

    pub fn validate(&self) -> PKResult<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(PKError::InvalidDose(
                format!("Dose amount must be positive, got {}", self.amount)
            ));
        }
        if !self.body_weight_kg.is_finite() || self.body_weight_kg <= 0.0 {
            return Err(PKError::InvalidDose(
                format!("Body weight must be positive, got {}", self.body_weight_kg)
            ));
        }
        Ok(())
    }

    pub fn substance(&self) -> Option<Substance> {
        Substance::from_tag(&self.substance_key)
    }

    pub fn is_substance(&self, substance: Substance) -> bool {
        self.substance() == Some(substance)
    }

    /// Hours elapsed between intake and `at`; negative before intake.
    pub fn hours_since(&self, at: DateTime<Utc>) -> f64 {
        hours_between(self.taken_at, at)
    }
}

pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

pub fn hours_to_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours * MILLIS_PER_HOUR).round() as i64)
}

pub fn filter_substance<'a>(
    doses: &'a [DoseRecord],
    substance: Substance,
) -> impl Iterator<Item = &'a DoseRecord> + 'a {
    doses.iter().filter(move |dose| dose.is_substance(substance))
}

/// Dose as written in the store; the weight may be missing in older files.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDose {
    #[serde(default = "new_dose_id")]
    id: String,
    taken_at: DateTime<Utc>,
    amount: f64,
    body_weight_kg: Option<f64>,
    #[serde(default)]
    substance_key: String,
}

pub fn load_doses<P: AsRef<Path>>(path: P) -> PKResult<Vec<DoseRecord>> {
    load_doses_with_weight(path, DEFAULT_BODY_WEIGHT_KG)
}

/// Loads the store, giving `default_weight_kg` to doses recorded without a
/// body weight.
pub fn load_doses_with_weight<P: AsRef<Path>>(path: P, default_weight_kg: f64) -> PKResult<Vec<DoseRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)?;
    let stored: Vec<StoredDose> = serde_json::from_str(&content)?;
    let doses: Vec<DoseRecord> = stored
        .into_iter()
        .map(|dose| DoseRecord {
            id: dose.id,
            taken_at: dose.taken_at,
            amount: dose.amount,
            body_weight_kg: dose.body_weight_kg.unwrap_or(default_weight_kg),
            substance_key: dose.substance_key,
        })
        .collect();
    for dose in &doses {
        dose.validate()?;
    }

    info!("Loaded {} doses from {:?}", doses.len(), path);
    Ok(doses)
}

pub fn save_doses<P: AsRef<Path>>(doses: &[DoseRecord], path: P) -> PKResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, doses)?;
    Ok(())
}
