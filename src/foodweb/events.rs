//! Solve notifications: per-species sign transitions and the report
//! published after every completed cycle.

use crate::core::error::ModelError;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Sign of a species' abundance as of the last solve it took part in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum AbundanceSign {
    /// Never solved.
    #[default]
    Unknown,
    NonPositive,
    Positive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignChange {
    Endangered,
    Rescued,
}

impl AbundanceSign {
    /// NaN counts as non-positive.
    pub fn of(abundance: f64) -> Self {
        if abundance > 0.0 {
            AbundanceSign::Positive
        } else {
            AbundanceSign::NonPositive
        }
    }

    /// Edge-triggered: same sign in, nothing out. A species' first solve
    /// always reports one way or the other.
    pub fn transition(self, next: AbundanceSign) -> Option<SignChange> {
        use AbundanceSign::*;
        match (self, next) {
            (Positive | Unknown, NonPositive) => Some(SignChange::Endangered),
            (NonPositive | Unknown, Positive) => Some(SignChange::Rescued),
            _ => None,
        }
    }
}

/// Published once per completed solve, after the per-species events.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SolveReport<Id> {
    pub richness: usize,
    pub feasible: bool,
    pub stable: bool,
    pub nonreactive: bool,
    /// log-scaled, see `ScalingConfig::flux`
    pub total_flux: f64,
    pub raw_total_flux: f64,
    /// log-scaled, see `ScalingConfig::complexity`
    pub complexity: f64,
    pub raw_complexity: f64,
    pub endangered: Vec<Id>,
    pub rescued: Vec<Id>,
}

/// Callback sink for solve results. Every method defaults to a no-op.
pub trait EquilibriumObserver<Id>: Send {
    fn on_endangered(&self, _species: &Id) {}

    fn on_rescued(&self, _species: &Id) {}

    fn on_equilibrium(&self, _report: &SolveReport<Id>) {}

    fn on_solve_failed(&self, _error: &ModelError) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum Notification<Id> {
    Endangered(Id),
    Rescued(Id),
    Equilibrium(SolveReport<Id>),
    SolveFailed(ModelError),
}

/// Observer that records everything it is told.
///
/// Clones share one buffer: register a fork with `FoodWeb::observe` and
/// read from the one you kept.
#[derive(Clone, Debug)]
pub struct NotificationLog<Id> {
    inner: Arc<RwLock<Vec<Notification<Id>>>>,
}

impl<Id: Clone> Default for NotificationLog<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Clone> NotificationLog<Id> {
    pub fn new() -> Self {
        NotificationLog {
            inner: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Shallow copy onto the same buffer.
    pub fn fork(&self) -> Self {
        NotificationLog {
            inner: self.inner.clone(),
        }
    }

    fn push(&self, notification: Notification<Id>) {
        self.inner.write().push(notification);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Notification<Id>> {
        self.inner.read().clone()
    }

    pub fn drain(&self) -> Vec<Notification<Id>> {
        std::mem::take(&mut *self.inner.write())
    }

    pub fn endangered(&self) -> Vec<Id> {
        self.inner
            .read()
            .iter()
            .filter_map(|n| match n {
                Notification::Endangered(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn rescued(&self) -> Vec<Id> {
        self.inner
            .read()
            .iter()
            .filter_map(|n| match n {
                Notification::Rescued(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn reports(&self) -> Vec<SolveReport<Id>> {
        self.inner
            .read()
            .iter()
            .filter_map(|n| match n {
                Notification::Equilibrium(report) => Some(report.clone()),
                _ => None,
            })
            .collect()
    }
}

impl<Id: Clone + Send + Sync> EquilibriumObserver<Id> for NotificationLog<Id> {
    fn on_endangered(&self, species: &Id) {
        self.push(Notification::Endangered(species.clone()));
    }

    fn on_rescued(&self, species: &Id) {
        self.push(Notification::Rescued(species.clone()));
    }

    fn on_equilibrium(&self, report: &SolveReport<Id>) {
        self.push(Notification::Equilibrium(report.clone()));
    }

    fn on_solve_failed(&self, error: &ModelError) {
        self.push(Notification::SolveFailed(error.clone()));
    }
}
