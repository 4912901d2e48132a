//! Food-web Core - Lotka-Volterra equilibrium and stability engine
//!
//! Two layers:
//!
//! * [`engine`]: a generic, ecology-agnostic Type-I Lotka-Volterra solver.
//!   Finds the fixed point `A·x = b` and reports feasibility, local
//!   stability and reactivity of that point.
//! * [`foodweb`]: allometric parameterisation of the engine from body size
//!   and interference traits, log-scaled readouts for display, and the
//!   Clean/Dirty/Solving lifecycle that keeps the O(n³) solve off the
//!   foreground thread.
//!
//! ```no_run
//! use foodweb_core::{FoodWeb, FoodWebConfig};
//!
//! let mut web: FoodWeb<u32> = FoodWeb::new(FoodWebConfig::default());
//! web.add_species(0, true)?;
//! web.add_species(1, false)?;
//! web.add_interaction(&0, &1)?;
//! if let Some(report) = web.equilibrate_blocking() {
//!     println!("feasible: {}", report?.feasible);
//! }
//! # Ok::<(), foodweb_core::ModelError>(())
//! ```

pub mod core;
pub mod engine;
pub mod foodweb;

#[cfg(feature = "python")]
pub mod python;

pub use crate::core::config::{
    ExecutionMode, FoodWebConfig, MetabolicConfig, ScalingConfig, SolverConfig,
};
pub use crate::core::error::{ModelError, ModelResult};
pub use engine::{FnParams, LotkaVolterra, SpeciesKey, SpeciesParams};
pub use foodweb::{
    EquilibriumObserver, FoodWeb, LogScale, Notification, NotificationLog, Overflow, SolveReport,
    SolveState,
};

/// Initialize tracing for the library.
pub fn setup_logging(level: Option<String>) {
    let filter = level.unwrap_or_else(|| "info".to_string());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
