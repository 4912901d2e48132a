use crate::core::error::{ModelError, ModelResult};
use crate::foodweb::allometry::Species;
use crate::foodweb::scaling::{unnormalise_on_log_scale, LogScale, Overflow};
use serde::{Deserialize, Serialize};

/// Allometric constants (Pawar et al. 2012).
///
/// Foraging on plants follows a grazing strategy, foraging on animals
/// follows active capture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetabolicConfig {
    /// production constant
    pub r0: f64,
    /// loss constant
    pub z0: f64,
    /// search rate
    pub a0: f64,
    /// metabolism exponent
    pub beta: f64,
    /// velocity exponent
    pub p_v: f64,
    /// reaction distance exponent
    pub p_d: f64,
    /// conversion efficiency of plant biomass
    pub e_p: f64,
    /// conversion efficiency of animal biomass
    pub e_c: f64,
    pub kg_min: f64,
    pub kg_max: f64,
    /// interference bounds
    pub a_min: f64,
    pub a_max: f64,
}

impl MetabolicConfig {
    pub fn body_size(&self, size_normalised: f64) -> f64 {
        unnormalise_on_log_scale(size_normalised, self.kg_min, self.kg_max)
    }

    pub fn interference(&self, greed_normalised: f64) -> f64 {
        -unnormalise_on_log_scale(greed_normalised, self.a_min, self.a_max)
    }

    pub fn metabolism(&self, body_size: f64, is_producer: bool) -> f64 {
        let size_scaling = body_size.powf(self.beta - 1.0);
        if is_producer {
            size_scaling * self.r0
        } else {
            -size_scaling * self.z0
        }
    }

    pub fn efficiency(&self, is_producer: bool) -> f64 {
        if is_producer {
            self.e_p
        } else {
            self.e_c
        }
    }

    pub fn active_capture(&self, m_r: f64, m_c: f64) -> f64 {
        let k_rc = m_r / m_c;
        self.a0
            * m_c.powf(self.p_v + 2.0 * self.p_d)
            * (1.0 + k_rc.powf(2.0 * self.p_v)).sqrt()
            * k_rc.powf(self.p_d)
    }

    pub fn grazing(&self, m_r: f64, m_c: f64) -> f64 {
        let k_rc = m_r / m_c;
        self.a0 * m_c.powf(self.p_v + 2.0 * self.p_d) * k_rc.powf(self.p_d)
    }

    /// Mass-specific attack rate; `None` if the consumer is a producer.
    ///
    /// NOTE: `grazing` and `active_capture` are per individual, hence the
    /// division by consumer mass.
    pub fn foraging(&self, resource: &Species, consumer: &Species) -> Option<f64> {
        if consumer.is_producer {
            return None;
        }
        let capture = if resource.is_producer {
            self.grazing(resource.body_size, consumer.body_size)
        } else {
            self.active_capture(resource.body_size, consumer.body_size)
        };
        Some(capture / consumer.body_size)
    }

    /// A fresh species with both traits at their midpoint.
    pub fn new_species(&self, is_producer: bool) -> Species {
        let body_size = self.body_size(0.5);
        Species {
            is_producer,
            body_size,
            interference: self.interference(0.5),
            metabolism: self.metabolism(body_size, is_producer),
            efficiency: self.efficiency(is_producer),
        }
    }

    /// Every constant by name, for debug readouts.
    pub fn parameterisation(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("r0", self.r0),
            ("z0", self.z0),
            ("a0", self.a0),
            ("beta", self.beta),
            ("p_v", self.p_v),
            ("p_d", self.p_d),
            ("e_p", self.e_p),
            ("e_c", self.e_c),
            ("kg_min", self.kg_min),
            ("kg_max", self.kg_max),
            ("a_min", self.a_min),
            ("a_max", self.a_max),
        ]
    }
}

impl Default for MetabolicConfig {
    fn default() -> Self {
        MetabolicConfig {
            r0: 1.71e-6,
            z0: 4.15e-8,
            a0: 8.31e-4,
            beta: 0.75,
            p_v: 0.26,
            p_d: 0.21,
            e_p: 0.2,
            e_c: 0.5,
            kg_min: 1e-3,
            kg_max: 1e3,
            a_min: 1e-5,
            a_max: 1.0,
        }
    }
}

/// Bounds used to squash raw solver output into UI-facing scores.
/// Found by empirical tuning against the default constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub abundance: LogScale,
    pub flux: LogScale,
    pub complexity: LogScale,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        ScalingConfig {
            abundance: LogScale::new(2e-10, 1.95, Overflow::Clamp),
            flux: LogScale::new(1e-16, 1e-6, Overflow::Extrapolate),
            complexity: LogScale::new(2.1e-5, 6.3e-3, Overflow::Extrapolate),
        }
    }
}

/// Where the O(n³) solve runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// On tokio's blocking pool, collected on a later `update()`.
    Background,
    /// Synchronously inside `update()`, for targets without threads.
    Inline,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        if cfg!(target_arch = "wasm32") {
            ExecutionMode::Inline
        } else {
            ExecutionMode::Background
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub execution: ExecutionMode,
    /// Iteration cap for the Schur and symmetric eigen-decompositions.
    pub eigen_max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            execution: ExecutionMode::default(),
            eigen_max_iterations: 10_000,
        }
    }
}

/// Main configuration for a `FoodWeb`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodWebConfig {
    pub metabolism: MetabolicConfig,
    pub scaling: ScalingConfig,
    pub solver: SolverConfig,
}

impl FoodWebConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) JSON document; missing fields keep defaults.
    pub fn from_json(json: &str) -> ModelResult<Self> {
        let config: FoodWebConfig =
            serde_json::from_str(json).map_err(|e| ModelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.solver.execution = execution;
        self
    }

    /// Log-scale interpolation needs strictly positive, ordered bounds.
    pub fn validate(&self) -> ModelResult<()> {
        let m = &self.metabolism;
        let ranges = [
            ("kg", m.kg_min, m.kg_max),
            ("a", m.a_min, m.a_max),
            ("abundance", self.scaling.abundance.min, self.scaling.abundance.max),
            ("flux", self.scaling.flux.min, self.scaling.flux.max),
            ("complexity", self.scaling.complexity.min, self.scaling.complexity.max),
        ];
        for (name, min, max) in ranges {
            if !(min > 0.0 && max > min) {
                return Err(ModelError::Config(format!(
                    "{} bounds must satisfy 0 < min < max (got {}..{})",
                    name, min, max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs())
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = FoodWebConfig::from_json(
            r#"{ "metabolism": { "beta": 0.7 }, "solver": { "execution": "Inline" } }"#,
        )
        .unwrap();
        assert_eq!(config.metabolism.beta, 0.7);
        assert_eq!(config.metabolism.r0, 1.71e-6);
        assert_eq!(config.solver.execution, ExecutionMode::Inline);
        assert_eq!(config.scaling, ScalingConfig::default());
    }

    #[test]
    fn json_round_trip() {
        let config = FoodWebConfig::new().with_execution(ExecutionMode::Inline);
        let parsed = FoodWebConfig::from_json(&config.to_json()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = FoodWebConfig::from_json(r#"{ "metabolism": { "kg_min": 10.0, "kg_max": 1.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));

        let err = FoodWebConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn parameterisation_lists_every_constant() {
        let params = MetabolicConfig::default().parameterisation();
        assert_eq!(params.len(), 12);
        assert!(params.contains(&("a0", 8.31e-4)));
    }

    #[test]
    fn body_size_spans_kg_range() {
        let config = MetabolicConfig::default();
        assert!(close(config.body_size(0.0), 1e-3));
        assert!(close(config.body_size(1.0), 1e3));
        assert!(close(config.body_size(0.5), 1.0));
    }

    #[test]
    fn metabolism_sign_follows_producer_flag() {
        let config = MetabolicConfig::default();
        assert!(close(config.metabolism(1.0, true), 1.71e-6));
        assert!(close(config.metabolism(1.0, false), -4.15e-8));

        // smaller bodies metabolise faster per kg
        let m = 1e-2f64;
        assert!(close(config.metabolism(m, true), m.powf(-0.25) * 1.71e-6));
        assert!(config.metabolism(1e-3, true) > config.metabolism(1e3, true));
    }

    #[test]
    fn interference_is_negated_log_scale() {
        let config = MetabolicConfig::default();
        assert!(close(config.interference(0.0), -1e-5));
        assert!(close(config.interference(1.0), -1.0));
        assert!(config.interference(0.25) > config.interference(0.75));
    }

    #[test]
    fn foraging_regimes() {
        let config = MetabolicConfig::default();
        let plant = config.new_species(true);
        let animal = config.new_species(false);

        // equal masses of 1 kg: k_rc = 1, m_c^x = 1
        let grazing = config.foraging(&plant, &animal).unwrap();
        assert!(close(grazing, 8.31e-4));
        let capture = config.foraging(&animal, &animal).unwrap();
        assert!(close(capture, 8.31e-4 * 2f64.sqrt()));

        assert_eq!(config.foraging(&animal, &plant), None);
        assert_eq!(config.foraging(&plant, &plant), None);
    }

    #[test]
    fn foraging_is_mass_specific() {
        let config = MetabolicConfig::default();
        let mut small = config.new_species(true);
        small.body_size = 0.01;
        let mut big = config.new_species(false);
        big.body_size = 10.0;

        let per_individual = config.grazing(small.body_size, big.body_size);
        assert!(close(config.foraging(&small, &big).unwrap(), per_individual / 10.0));
    }
}
