//! Estimates substance concentrations and subjective effect levels from a
//! personal dose history.
//!
//! Each substance is evaluated by a kinetic model ([`models`]), summed over
//! doses ([`simulation::ConcentrationAggregator`]), mapped to an effect
//! ([`pharmacodynamics`]) and searched forward for the end of its effect
//! ([`simulation::ThresholdPredictor`]). All computations are pure functions
//! of the dose snapshot they receive.

pub mod config;
pub mod dosing;
pub mod error;
pub mod models;
pub mod output;
pub mod pharmacodynamics;
pub mod residual;
pub mod simulation;
pub mod stats;

pub use config::{EngineConfig, UserProfile};
pub use dosing::{DoseRecord, Substance};
pub use error::{PKError, PKResult};
pub use pharmacodynamics::EffectLevel;
pub use simulation::{CombinedCalculator, ConcentrationAggregator, SubstanceEngine, ThresholdPredictor};
