//! Food-web Parameterisation Layer
//!
//! Binds the generic engine to allometric ecology and owns the solve
//! lifecycle. All mutation happens on one foreground thread; the O(n³)
//! solve runs on a snapshot taken at dispatch, so no lock guards the
//! matrices.
//!
//! Call [`FoodWeb::update`] once per frame: it collects a finished solve,
//! publishes its results, then starts a new one if anything changed.

pub mod allometry;
pub mod events;
pub mod lifecycle;
pub mod scaling;

mod scenario_test;

use crate::core::config::FoodWebConfig;
use crate::core::error::{ModelError, ModelResult};
use crate::engine::{LotkaVolterra, SpeciesKey};
use std::collections::HashMap;
use std::fmt::Write;
use tracing::{debug, error, info};

pub use allometry::{Species, Traits};
pub use events::{AbundanceSign, EquilibriumObserver, Notification, NotificationLog, SolveReport};
pub use lifecycle::{Equilibrium, PendingSolve, SolveJob, SolveScheduler, SolveState};
pub use scaling::{LogScale, Overflow};

/// External graph view: every consumer of the given resource.
pub type AdjacencyFn<Id> = Box<dyn Fn(&Id) -> Vec<Id> + Send + Sync>;

/// Bounds required of a species id handed to the background solver.
pub trait FoodWebId: SpeciesKey + Send + Sync + 'static {}

impl<T: SpeciesKey + Send + Sync + 'static> FoodWebId for T {}

pub struct FoodWeb<Id: FoodWebId> {
    config: FoodWebConfig,
    // live model, mutated by the foreground only
    model: LotkaVolterra<Id, Traits<Id>>,
    // last completed solve, what every query reads
    solved: Option<Equilibrium<Id>>,
    last_report: Option<SolveReport<Id>>,

    scheduler: SolveScheduler,
    in_flight: Option<PendingSolve<Id>>,

    adjacency: Option<AdjacencyFn<Id>>,
    observers: Vec<Box<dyn EquilibriumObserver<Id>>>,
    signs: HashMap<Id, AbundanceSign>,
}

impl<Id: FoodWebId> Default for FoodWeb<Id> {
    fn default() -> Self {
        Self::new(FoodWebConfig::default())
    }
}

impl<Id: FoodWebId> FoodWeb<Id> {
    pub fn new(config: FoodWebConfig) -> Self {
        let model = LotkaVolterra::new(Traits::new(config.metabolism.clone()))
            .with_eigen_max_iterations(config.solver.eigen_max_iterations);
        info!(
            "🌿 [FoodWeb] Initialized (execution={:?})",
            config.solver.execution
        );
        FoodWeb {
            config,
            model,
            solved: None,
            last_report: None,
            scheduler: SolveScheduler::new(),
            in_flight: None,
            adjacency: None,
            observers: Vec::new(),
            signs: HashMap::new(),
        }
    }

    pub fn config(&self) -> &FoodWebConfig {
        &self.config
    }

    pub fn richness(&self) -> usize {
        self.model.richness()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.model.contains(id)
    }

    pub fn species(&self, id: &Id) -> Option<&Species> {
        self.model.params().get(id)
    }

    fn dirty(&mut self) {
        self.scheduler.mark_dirty();
    }

    // Mutators

    pub fn add_species(&mut self, id: Id, is_producer: bool) -> ModelResult<()> {
        self.model.add_species(id.clone())?;
        self.model.params_mut().insert(id.clone(), is_producer);
        debug!("[FoodWeb] + species {:?} (producer={})", id, is_producer);
        self.dirty();
        Ok(())
    }

    pub fn remove_species(&mut self, id: &Id) -> ModelResult<()> {
        self.model.remove_species(id)?;
        self.model.params_mut().remove(id);
        self.signs.remove(id);
        debug!("[FoodWeb] - species {:?}", id);
        self.dirty();
        Ok(())
    }

    /// `size_normalised` in [0, 1], log-mapped onto `[kg_min, kg_max]`.
    pub fn set_body_size(&mut self, id: &Id, size_normalised: f64) -> ModelResult<()> {
        self.model.params_mut().set_body_size(id, size_normalised)?;
        self.dirty();
        Ok(())
    }

    /// `greed_normalised` in [0, 1], log-mapped onto `[a_min, a_max]`.
    pub fn set_interference(&mut self, id: &Id, greed_normalised: f64) -> ModelResult<()> {
        self.model.params_mut().set_interference(id, greed_normalised)?;
        self.dirty();
        Ok(())
    }

    pub fn set_is_producer(&mut self, id: &Id, is_producer: bool) -> ModelResult<()> {
        if !self.model.contains(id) {
            return Err(ModelError::unknown_species(id));
        }
        if is_producer {
            if let Some(prey) = self.model.index().resources_of(id).first() {
                return Err(ModelError::invalid_foraging(prey, id));
            }
        }
        self.model.params_mut().set_is_producer(id, is_producer)?;
        self.dirty();
        Ok(())
    }

    pub fn add_interaction(&mut self, resource: &Id, consumer: &Id) -> ModelResult<()> {
        if resource == consumer {
            return Err(ModelError::self_interaction(resource));
        }
        let predator = self
            .model
            .params()
            .get(consumer)
            .ok_or_else(|| ModelError::unknown_species(consumer))?;
        if predator.is_producer {
            return Err(ModelError::invalid_foraging(resource, consumer));
        }
        self.model.add_interaction(resource, consumer)?;
        debug!("[FoodWeb] + link {:?} -> {:?}", resource, consumer);
        self.dirty();
        Ok(())
    }

    pub fn remove_interaction(&mut self, resource: &Id, consumer: &Id) -> ModelResult<()> {
        self.model.remove_interaction(resource, consumer)?;
        debug!("[FoodWeb] - link {:?} -> {:?}", resource, consumer);
        self.dirty();
        Ok(())
    }

    /// Read the topology from an external graph instead of the model's own
    /// interaction set. Called once per species at every dispatch.
    pub fn attach_adjacency(&mut self, consumers_of: AdjacencyFn<Id>) {
        self.adjacency = Some(consumers_of);
        self.dirty();
    }

    pub fn detach_adjacency(&mut self) {
        self.adjacency = None;
        self.dirty();
    }

    /// For changes the model cannot see, such as an edit to the attached
    /// external graph.
    pub fn trigger_solve(&mut self) {
        self.dirty();
    }

    pub fn observe(&mut self, observer: Box<dyn EquilibriumObserver<Id>>) {
        self.observers.push(observer);
    }

    // Solve cycle

    /// Non-blocking. Returns the outcome of a solve if one finished.
    pub fn update(&mut self) -> Option<ModelResult<SolveReport<Id>>> {
        let mut finished = self.collect();
        if self.scheduler.try_begin() {
            self.dispatch();
            if finished.is_none() {
                finished = self.collect();
            }
        }
        finished
    }

    /// Blocks until the in-flight solve (if any) completes and publishes it.
    /// Must not be called from async code; use [`FoodWeb::equilibrate`].
    pub fn wait(&mut self) -> Option<ModelResult<SolveReport<Id>>> {
        let pending = self.in_flight.take()?;
        let outcome = pending.wait();
        Some(self.complete(outcome))
    }

    /// Solves until clean. Returns the last outcome, `None` if already clean.
    pub fn equilibrate_blocking(&mut self) -> Option<ModelResult<SolveReport<Id>>> {
        let mut last = None;
        loop {
            if let Some(outcome) = self.update() {
                last = Some(outcome);
            }
            match self.wait() {
                Some(outcome) => last = Some(outcome),
                None => return last,
            }
        }
    }

    pub async fn equilibrate(&mut self) -> Option<ModelResult<SolveReport<Id>>> {
        let mut last = None;
        loop {
            if let Some(outcome) = self.update() {
                last = Some(outcome);
            }
            let Some(mut pending) = self.in_flight.take() else {
                return last;
            };
            let outcome = pending.join().await;
            last = Some(self.complete(outcome));
        }
    }

    fn dispatch(&mut self) {
        // without an attached graph the job walks the engine's own adjacency
        let consumers = self.adjacency.as_ref().map(|consumers_of| {
            self.model
                .index()
                .keys()
                .iter()
                .map(|k| (k.clone(), consumers_of(k)))
                .collect::<HashMap<Id, Vec<Id>>>()
        });

        info!(
            "🧮 [FoodWeb] Dispatching solve #{} (S={}, {:?})",
            self.scheduler.dispatched(),
            self.model.richness(),
            self.config.solver.execution
        );
        let job = SolveJob::new(self.model.clone(), consumers);
        self.in_flight = Some(PendingSolve::dispatch(job, self.config.solver.execution));
    }

    fn collect(&mut self) -> Option<ModelResult<SolveReport<Id>>> {
        let outcome = self.in_flight.as_mut()?.try_take()?;
        self.in_flight = None;
        Some(self.complete(outcome))
    }

    fn complete(&mut self, outcome: ModelResult<Equilibrium<Id>>) -> ModelResult<SolveReport<Id>> {
        self.scheduler.finish();
        match outcome {
            Ok(solved) => Ok(self.publish(solved)),
            Err(e) => {
                error!("❌ [FoodWeb] Solve failed: {}", e);
                for observer in &self.observers {
                    observer.on_solve_failed(&e);
                }
                Err(e)
            }
        }
    }

    fn publish(&mut self, solved: Equilibrium<Id>) -> SolveReport<Id> {
        let mut endangered = Vec::new();
        let mut rescued = Vec::new();

        for (i, id) in solved.engine.index().keys().iter().enumerate() {
            // removed while the solve was in flight
            if !self.model.contains(id) {
                continue;
            }
            let next = AbundanceSign::of(solved.engine.equilibrium()[i]);
            let previous = self.signs.insert(id.clone(), next).unwrap_or_default();
            match previous.transition(next) {
                Some(events::SignChange::Endangered) => endangered.push(id.clone()),
                Some(events::SignChange::Rescued) => rescued.push(id.clone()),
                None => {}
            }
        }

        let scaling = &self.config.scaling;
        let raw_total_flux = solved.engine.total_flux();
        let raw_complexity = solved.engine.complexity();
        let report = SolveReport {
            richness: solved.engine.richness(),
            feasible: solved.feasible,
            stable: solved.stable,
            nonreactive: solved.nonreactive,
            total_flux: scaling.flux.normalise(raw_total_flux),
            raw_total_flux,
            complexity: scaling.complexity.normalise(raw_complexity),
            raw_complexity,
            endangered,
            rescued,
        };
        info!(
            "✅ [FoodWeb] Equilibrium: feasible={} stable={} endangered={} rescued={}",
            report.feasible,
            report.stable,
            report.endangered.len(),
            report.rescued.len()
        );

        for observer in &self.observers {
            for id in &report.endangered {
                observer.on_endangered(id);
            }
            for id in &report.rescued {
                observer.on_rescued(id);
            }
            observer.on_equilibrium(&report);
        }

        self.solved = Some(solved);
        self.last_report = Some(report.clone());
        report
    }

    // Queries, all against the last completed solve

    pub fn state(&self) -> SolveState {
        self.scheduler.state()
    }

    pub fn is_calculating(&self) -> bool {
        self.scheduler.is_solving()
    }

    pub fn solves_dispatched(&self) -> u64 {
        self.scheduler.dispatched()
    }

    pub fn last_report(&self) -> Option<&SolveReport<Id>> {
        self.last_report.as_ref()
    }

    pub fn feasible(&self) -> bool {
        self.solved.as_ref().is_some_and(|s| s.feasible)
    }

    pub fn stable(&self) -> bool {
        self.solved.as_ref().is_some_and(|s| s.stable)
    }

    pub fn nonreactive(&self) -> bool {
        self.solved.as_ref().is_some_and(|s| s.nonreactive)
    }

    /// Raw equilibrium abundance. 0 for a live species not yet solved.
    pub fn abundance(&self, id: &Id) -> ModelResult<f64> {
        if !self.model.contains(id) {
            return Err(ModelError::unknown_species(id));
        }
        Ok(self
            .solved
            .as_ref()
            .and_then(|s| s.engine.get_solved_abundance(id).ok())
            .unwrap_or(0.0))
    }

    /// In [-1, 1]; negative values say how infeasible the species is.
    pub fn normalized_abundance(&self, id: &Id) -> ModelResult<f64> {
        let raw = self.abundance(id)?;
        Ok(self.config.scaling.abundance.normalise_signed(raw))
    }

    /// In [0, 1] up to the flux bound, extrapolated past it.
    pub fn normalized_flux(&self, resource: &Id, consumer: &Id) -> ModelResult<f64> {
        for id in [resource, consumer] {
            if !self.model.contains(id) {
                return Err(ModelError::unknown_species(id));
            }
        }
        let raw = self
            .solved
            .as_ref()
            .and_then(|s| s.engine.get_solved_flux(resource, consumer).ok())
            .unwrap_or(0.0);
        Ok(self.config.scaling.flux.normalise(raw))
    }

    pub fn normalized_total_flux(&self) -> f64 {
        let raw = self.solved.as_ref().map_or(0.0, |s| s.engine.total_flux());
        self.config.scaling.flux.normalise(raw)
    }

    /// In [0, ∞).
    pub fn normalized_complexity(&self) -> f64 {
        let raw = self.solved.as_ref().map_or(0.0, |s| s.engine.complexity());
        self.config.scaling.complexity.normalise(raw)
    }

    pub fn complexity_description(&self) -> String {
        match &self.solved {
            None => "not yet solved".to_string(),
            Some(s) => format!(
                "S={} L={} C={:.3} complexity={:.3e} dominant eigenvalue={:.3e}",
                s.engine.richness(),
                s.engine.link_count(),
                s.engine.connectance(),
                s.engine.complexity(),
                s.engine.dominant_eigenvalue()
            ),
        }
    }

    pub fn describe_state(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "state: {:?} (dispatched {})",
            self.state(),
            self.solves_dispatched()
        );
        match &self.solved {
            None => out.push_str("no equilibrium yet\n"),
            Some(s) => {
                let _ = writeln!(
                    out,
                    "feasible={} stable={} nonreactive={}",
                    s.feasible, s.stable, s.nonreactive
                );
                out.push_str(&s.engine.describe_state());
            }
        }
        out
    }

    pub fn parameterisation(&self) -> Vec<(&'static str, f64)> {
        self.config.metabolism.parameterisation()
    }
}
