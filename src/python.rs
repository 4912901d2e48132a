//! Python bindings, built with `--features python`.
//!
//! Species ids are plain Python ints. Every `ModelError` surfaces as
//! `ValueError`.

use crate::core::config::FoodWebConfig;
use crate::core::error::ModelError;
use crate::foodweb::{FoodWeb, SolveReport, SolveState};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

impl From<ModelError> for PyErr {
    fn from(err: ModelError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

/// Outcome of one solve cycle.
#[pyclass(name = "SolveReport")]
#[derive(Clone, Debug)]
pub struct SolveReportPy {
    #[pyo3(get)]
    pub richness: usize,
    #[pyo3(get)]
    pub feasible: bool,
    #[pyo3(get)]
    pub stable: bool,
    #[pyo3(get)]
    pub nonreactive: bool,
    #[pyo3(get)]
    pub total_flux: f64,
    #[pyo3(get)]
    pub raw_total_flux: f64,
    #[pyo3(get)]
    pub complexity: f64,
    #[pyo3(get)]
    pub raw_complexity: f64,
    #[pyo3(get)]
    pub endangered: Vec<i64>,
    #[pyo3(get)]
    pub rescued: Vec<i64>,
}

impl From<SolveReport<i64>> for SolveReportPy {
    fn from(r: SolveReport<i64>) -> Self {
        SolveReportPy {
            richness: r.richness,
            feasible: r.feasible,
            stable: r.stable,
            nonreactive: r.nonreactive,
            total_flux: r.total_flux,
            raw_total_flux: r.raw_total_flux,
            complexity: r.complexity,
            raw_complexity: r.raw_complexity,
            endangered: r.endangered,
            rescued: r.rescued,
        }
    }
}

#[pymethods]
impl SolveReportPy {
    pub fn __repr__(&self) -> String {
        format!(
            "SolveReport(S={}, feasible={}, stable={}, endangered={:?}, rescued={:?})",
            self.richness, self.feasible, self.stable, self.endangered, self.rescued
        )
    }
}

type Collected = Option<Result<SolveReport<i64>, ModelError>>;

fn report_to_py(collected: Collected) -> PyResult<Option<SolveReportPy>> {
    match collected {
        None => Ok(None),
        Some(outcome) => Ok(Some(outcome?.into())),
    }
}

/// A food web whose equilibrium is solved in the background.
#[pyclass(name = "FoodWeb", unsendable)]
pub struct FoodWebPy {
    inner: FoodWeb<i64>,
}

#[pymethods]
impl FoodWebPy {
    #[new]
    #[pyo3(signature = (config_json = None))]
    pub fn new(config_json: Option<String>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => FoodWebConfig::from_json(&json)?,
            None => FoodWebConfig::default(),
        };
        Ok(FoodWebPy {
            inner: FoodWeb::new(config),
        })
    }

    pub fn add_species(&mut self, id: i64, is_producer: bool) -> PyResult<()> {
        Ok(self.inner.add_species(id, is_producer)?)
    }

    pub fn remove_species(&mut self, id: i64) -> PyResult<()> {
        Ok(self.inner.remove_species(&id)?)
    }

    pub fn set_body_size(&mut self, id: i64, size: f64) -> PyResult<()> {
        Ok(self.inner.set_body_size(&id, size)?)
    }

    pub fn set_interference(&mut self, id: i64, greed: f64) -> PyResult<()> {
        Ok(self.inner.set_interference(&id, greed)?)
    }

    pub fn set_is_producer(&mut self, id: i64, is_producer: bool) -> PyResult<()> {
        Ok(self.inner.set_is_producer(&id, is_producer)?)
    }

    pub fn add_interaction(&mut self, resource: i64, consumer: i64) -> PyResult<()> {
        Ok(self.inner.add_interaction(&resource, &consumer)?)
    }

    pub fn remove_interaction(&mut self, resource: i64, consumer: i64) -> PyResult<()> {
        Ok(self.inner.remove_interaction(&resource, &consumer)?)
    }

    pub fn trigger_solve(&mut self) {
        self.inner.trigger_solve();
    }

    /// Call once per frame. Returns a report when a solve has finished.
    pub fn update(&mut self) -> PyResult<Option<SolveReportPy>> {
        report_to_py(self.inner.update())
    }

    /// Blocks until the model is clean.
    pub fn equilibrate(&mut self) -> PyResult<Option<SolveReportPy>> {
        report_to_py(self.inner.equilibrate_blocking())
    }

    pub fn normalized_abundance(&self, id: i64) -> PyResult<f64> {
        Ok(self.inner.normalized_abundance(&id)?)
    }

    pub fn normalized_flux(&self, resource: i64, consumer: i64) -> PyResult<f64> {
        Ok(self.inner.normalized_flux(&resource, &consumer)?)
    }

    pub fn normalized_total_flux(&self) -> f64 {
        self.inner.normalized_total_flux()
    }

    pub fn normalized_complexity(&self) -> f64 {
        self.inner.normalized_complexity()
    }

    pub fn abundance(&self, id: i64) -> PyResult<f64> {
        Ok(self.inner.abundance(&id)?)
    }

    #[getter]
    pub fn is_calculating(&self) -> bool {
        self.inner.is_calculating()
    }

    #[getter]
    pub fn is_dirty(&self) -> bool {
        self.inner.state() == SolveState::Dirty
    }

    #[getter]
    pub fn feasible(&self) -> bool {
        self.inner.feasible()
    }

    #[getter]
    pub fn stable(&self) -> bool {
        self.inner.stable()
    }

    #[getter]
    pub fn nonreactive(&self) -> bool {
        self.inner.nonreactive()
    }

    pub fn complexity_description(&self) -> String {
        self.inner.complexity_description()
    }

    pub fn describe_state(&self) -> String {
        self.inner.describe_state()
    }

    pub fn parameterisation(&self) -> Vec<(String, f64)> {
        self.inner
            .parameterisation()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    pub fn config_json(&self) -> String {
        self.inner.config().to_json()
    }
}

#[pyfunction]
#[pyo3(signature = (level = None))]
fn setup_logging(level: Option<String>) {
    crate::setup_logging(level);
}

/// Python module initialization
#[pymodule]
fn foodweb_core(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<FoodWebPy>()?;
    m.add_class::<SolveReportPy>()?;
    m.add_function(wrap_pyfunction!(setup_logging, m)?)?;
    Ok(())
}
