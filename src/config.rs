use serde::{Deserialize, Serialize};
use std::path::Path;
use std::collections::HashMap;
use log::{info, debug};
use crate::dosing::{Substance, DEFAULT_BODY_WEIGHT_KG};
use crate::error::{PKError, PKResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub caffeine: SubstanceConfig,
    pub bromazepam: SubstanceConfig,
    pub paracetamol: SubstanceConfig,
    pub ibuprofen: SubstanceConfig,
    pub alcohol: AlcoholConfig,
    pub combined: CombinedConfig,
}

/// Constants of the one-compartment (Bateman) model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KineticParameters {
    pub half_life_hours: f64,
    pub absorption_time_hours: f64,
    pub bioavailability: f64,
    pub volume_l_per_kg: f64,
}

impl KineticParameters {
    /// ke = ln(2) / t½
    pub fn elimination_rate(&self) -> f64 {
        std::f64::consts::LN_2 / self.half_life_hours
    }

    /// ka = ln(2) / t_abs
    pub fn absorption_rate(&self) -> f64 {
        std::f64::consts::LN_2 / self.absorption_time_hours
    }
}

/// Concentration cutoffs, strictly increasing from `negligible` to `strong`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectThresholds {
    pub negligible: f64,
    pub light: f64,
    pub moderate: f64,
    pub strong: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PredictionWindow {
    pub step_minutes: i64,
    pub horizon_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstanceConfig {
    pub kinetics: KineticParameters,
    pub thresholds: EffectThresholds,
    pub ec50: f64,
    pub prediction: PredictionWindow,
    pub residual_half_life_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlcoholConfig {
    pub grams_per_unit: f64,
    /// Zero-order elimination of blood alcohol, g/L per hour
    pub elimination_rate_g_per_l_h: f64,
    pub fast_fraction: f64,
    /// Fast compartment time constant as a fraction of the beverage absorption time
    pub fast_time_ratio: f64,
    pub step_minutes: f64,
    pub default_absorption_time_hours: f64,
    pub beverage_absorption_hours: HashMap<String, f64>,
    pub diffusion: DiffusionCoefficients,
    pub thresholds: EffectThresholds,
    pub ec50: f64,
    pub prediction: PredictionWindow,
    /// Blood alcohol below which the user is considered sober
    pub sober_cutoff: f64,
    pub residual_half_life_hours: f64,
}

/// Widmark-style body water coefficients (L/kg) by sex.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiffusionCoefficients {
    pub male: f64,
    pub female: f64,
    pub unspecified: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinedConfig {
    pub reference_paracetamol_mg: f64,
    pub reference_ibuprofen_mg: f64,
    pub reference_weight_kg: f64,
    pub reference_window_hours: i64,
    pub reference_points: usize,
    pub prediction: PredictionWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unspecified,
}

impl Sex {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "male" | "homme" | "m" => Sex::Male,
            "female" | "femme" | "f" => Sex::Female,
            _ => Sex::Unspecified,
        }
    }
}

/// Per-user inputs supplied by the preferences store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub weight_kg: f64,
    pub sex: Sex,
    pub beverage: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            weight_kg: DEFAULT_BODY_WEIGHT_KG,
            sex: Sex::Unspecified,
            beverage: String::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            caffeine: SubstanceConfig {
                kinetics: KineticParameters {
                    half_life_hours: 5.0,
                    absorption_time_hours: 0.75,
                    bioavailability: 1.0,
                    volume_l_per_kg: 0.65,
                },
                thresholds: EffectThresholds { negligible: 0.3, light: 1.0, moderate: 3.0, strong: 8.0 },
                ec50: 3.0,
                prediction: PredictionWindow { step_minutes: 15, horizon_hours: 24 },
                residual_half_life_hours: 5.0,
            },
            bromazepam: SubstanceConfig {
                kinetics: KineticParameters {
                    half_life_hours: 14.0,
                    absorption_time_hours: 2.0,
                    bioavailability: 0.84,
                    volume_l_per_kg: 0.9,
                },
                thresholds: EffectThresholds { negligible: 0.01, light: 0.02, moderate: 0.05, strong: 0.08 },
                ec50: 0.05,
                prediction: PredictionWindow { step_minutes: 30, horizon_hours: 14 * 24 },
                residual_half_life_hours: 14.0,
            },
            paracetamol: SubstanceConfig {
                kinetics: KineticParameters {
                    half_life_hours: 2.5,
                    absorption_time_hours: 0.5,
                    bioavailability: 0.92,
                    volume_l_per_kg: 0.95,
                },
                thresholds: EffectThresholds { negligible: 0.8, light: 2.0, moderate: 5.0, strong: 8.5 },
                ec50: 5.0,
                prediction: PredictionWindow { step_minutes: 15, horizon_hours: 24 },
                residual_half_life_hours: 2.5,
            },
            ibuprofen: SubstanceConfig {
                kinetics: KineticParameters {
                    half_life_hours: 2.0,
                    absorption_time_hours: 0.75,
                    bioavailability: 0.9,
                    volume_l_per_kg: 0.15,
                },
                thresholds: EffectThresholds { negligible: 2.0, light: 5.0, moderate: 10.0, strong: 17.0 },
                ec50: 12.0,
                prediction: PredictionWindow { step_minutes: 15, horizon_hours: 24 },
                residual_half_life_hours: 2.0,
            },
            alcohol: AlcoholConfig::default(),
            combined: CombinedConfig::default(),
        }
    }
}

impl Default for AlcoholConfig {
    fn default() -> Self {
        let beverage_absorption_hours = [
            ("cocktail", 2.0),
            ("wine", 1.0),
            ("vin", 1.0),
            ("beer", 0.5),
            ("biere", 0.5),
            ("cider", 0.75),
            ("cidre", 0.75),
            ("spirits", 1.5),
            ("spiritueux", 1.5),
        ]
        .into_iter()
        .map(|(name, hours)| (name.to_string(), hours))
        .collect();

        Self {
            grams_per_unit: 10.0,
            elimination_rate_g_per_l_h: 0.15,
            fast_fraction: 0.3,
            fast_time_ratio: 0.5,
            step_minutes: 1.0,
            default_absorption_time_hours: 0.75,
            beverage_absorption_hours,
            diffusion: DiffusionCoefficients { male: 0.7, female: 0.6, unspecified: 0.68 },
            thresholds: EffectThresholds { negligible: 0.1, light: 0.2, moderate: 0.5, strong: 1.2 },
            ec50: 0.5,
            prediction: PredictionWindow { step_minutes: 15, horizon_hours: 72 },
            sober_cutoff: 0.2,
            residual_half_life_hours: 4.0,
        }
    }
}

impl Default for CombinedConfig {
    fn default() -> Self {
        Self {
            reference_paracetamol_mg: 1000.0,
            reference_ibuprofen_mg: 400.0,
            reference_weight_kg: DEFAULT_BODY_WEIGHT_KG,
            reference_window_hours: 6,
            reference_points: 120,
            prediction: PredictionWindow { step_minutes: 15, horizon_hours: 24 },
        }
    }
}

impl AlcoholConfig {
    /// Absorption time for a beverage, falling back to the default for
    /// unknown or empty beverage names.
    pub fn absorption_time_hours(&self, beverage: &str) -> f64 {
        let key = beverage.trim().to_lowercase();
        match self.beverage_absorption_hours.get(&key) {
            Some(&hours) => hours,
            None => {
                if !key.is_empty() {
                    debug!("Unknown beverage type {:?}, using default absorption time", beverage);
                }
                self.default_absorption_time_hours
            }
        }
    }

    pub fn diffusion_coefficient(&self, sex: Sex) -> f64 {
        match sex {
            Sex::Male => self.diffusion.male,
            Sex::Female => self.diffusion.female,
            Sex::Unspecified => self.diffusion.unspecified,
        }
    }

    pub fn known_beverages(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.beverage_absorption_hours.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> PKResult<Self> {
        let content = std::fs::read_to_string(&path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded engine configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Parameters of a one-compartment substance; `None` for alcohol.
    pub fn substance(&self, substance: Substance) -> Option<&SubstanceConfig> {
        match substance {
            Substance::Caffeine => Some(&self.caffeine),
            Substance::Bromazepam => Some(&self.bromazepam),
            Substance::Paracetamol => Some(&self.paracetamol),
            Substance::Ibuprofen => Some(&self.ibuprofen),
            Substance::Alcohol => None,
        }
    }

    pub fn thresholds(&self, substance: Substance) -> EffectThresholds {
        match self.substance(substance) {
            Some(config) => config.thresholds,
            None => self.alcohol.thresholds,
        }
    }

    pub fn residual_half_life_hours(&self, substance: Substance) -> f64 {
        match self.substance(substance) {
            Some(config) => config.residual_half_life_hours,
            None => self.alcohol.residual_half_life_hours,
        }
    }

    /// Volume of distribution per kg used to turn residual amounts back into
    /// concentrations, if the substance has one.
    pub fn volume_l_per_kg(&self, substance: Substance) -> Option<f64> {
        self.substance(substance).map(|config| config.kinetics.volume_l_per_kg)
    }

    pub fn validate(&self) -> PKResult<()> {
        for substance in Substance::ALL {
            match self.substance(substance) {
                Some(config) => validate_substance(substance, config)?,
                None => self.validate_alcohol()?,
            }
        }
        self.validate_combined()
    }

    fn validate_alcohol(&self) -> PKResult<()> {
        let alcohol = &self.alcohol;
        let positives = [
            ("grams_per_unit", alcohol.grams_per_unit),
            ("elimination_rate_g_per_l_h", alcohol.elimination_rate_g_per_l_h),
            ("fast_time_ratio", alcohol.fast_time_ratio),
            ("step_minutes", alcohol.step_minutes),
            ("default_absorption_time_hours", alcohol.default_absorption_time_hours),
            ("ec50", alcohol.ec50),
            ("residual_half_life_hours", alcohol.residual_half_life_hours),
        ];
        for (name, value) in positives {
            require_positive("alcohol", name, value)?;
        }

        if !(0.0..=1.0).contains(&alcohol.fast_fraction) {
            return Err(PKError::Validation(
                "alcohol fast_fraction must be within [0, 1]".to_string()
            ));
        }

        for (beverage, &hours) in &alcohol.beverage_absorption_hours {
            require_positive("alcohol", &format!("absorption time of {}", beverage), hours)?;
        }

        let diffusion = alcohol.diffusion;
        for value in [diffusion.male, diffusion.female, diffusion.unspecified] {
            require_positive("alcohol", "diffusion coefficient", value)?;
        }

        validate_thresholds(Substance::Alcohol, &alcohol.thresholds)?;
        validate_window(Substance::Alcohol, &alcohol.prediction)
    }

    fn validate_combined(&self) -> PKResult<()> {
        let combined = &self.combined;
        require_positive("combined", "reference_paracetamol_mg", combined.reference_paracetamol_mg)?;
        require_positive("combined", "reference_ibuprofen_mg", combined.reference_ibuprofen_mg)?;
        require_positive("combined", "reference_weight_kg", combined.reference_weight_kg)?;
        if combined.reference_window_hours <= 0 || combined.reference_points == 0 {
            return Err(PKError::Validation(
                "combined reference window and point count must be positive".to_string()
            ));
        }
        Ok(())
    }
}

fn validate_substance(substance: Substance, config: &SubstanceConfig) -> PKResult<()> {
    let kinetics = &config.kinetics;
    let positives = [
        ("half_life_hours", kinetics.half_life_hours),
        ("absorption_time_hours", kinetics.absorption_time_hours),
        ("volume_l_per_kg", kinetics.volume_l_per_kg),
        ("ec50", config.ec50),
        ("residual_half_life_hours", config.residual_half_life_hours),
    ];
    for (name, value) in positives {
        require_positive(substance.tag(), name, value)?;
    }

    if !(kinetics.bioavailability > 0.0 && kinetics.bioavailability <= 1.0) {
        return Err(PKError::Validation(
            format!("{} bioavailability must be within (0, 1]", substance)
        ));
    }

    validate_thresholds(substance, &config.thresholds)?;
    validate_window(substance, &config.prediction)
}

fn validate_thresholds(substance: Substance, thresholds: &EffectThresholds) -> PKResult<()> {
    let ordered = [thresholds.negligible, thresholds.light, thresholds.moderate, thresholds.strong];
    let increasing = ordered.windows(2).all(|pair| pair[0] < pair[1]);
    if ordered[0] < 0.0 || !increasing {
        return Err(PKError::Validation(
            format!("{} thresholds must be non-negative and strictly increasing", substance)
        ));
    }
    Ok(())
}

fn validate_window(substance: Substance, window: &PredictionWindow) -> PKResult<()> {
    if window.step_minutes <= 0 || window.horizon_hours <= 0 {
        return Err(PKError::Validation(
            format!("{} prediction step and horizon must be positive", substance)
        ));
    }
    Ok(())
}

fn require_positive(scope: &str, name: &str, value: f64) -> PKResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PKError::Validation(
            format!("{} {} must be positive", scope, name)
        ));
    }
    Ok(())
}
