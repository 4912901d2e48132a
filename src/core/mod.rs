//! Ambient pieces shared by the engine and the food-web layer.

pub mod config;
pub mod error;

pub use config::{ExecutionMode, FoodWebConfig, MetabolicConfig, ScalingConfig, SolverConfig};
pub use error::{ModelError, ModelResult};
