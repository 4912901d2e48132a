//! Solve lifecycle: the Clean/Dirty/Solving state machine and the one-shot
//! background job that runs a single equilibrium solve.

use super::allometry::Traits;
use crate::core::config::ExecutionMode;
use crate::core::error::{ModelError, ModelResult};
use crate::engine::{LotkaVolterra, SpeciesKey};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use std::time::Instant;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, error};

/// Only used when the caller is not already inside a tokio runtime.
static SOLVER_RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn shared_runtime() -> &'static Runtime {
    SOLVER_RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("foodweb-solver")
            .enable_all()
            .build()
            .expect("Failed to create solver runtime")
    })
}

/// The ambient runtime if there is one, the crate-wide one otherwise.
pub fn solver_handle() -> Handle {
    Handle::try_current().unwrap_or_else(|_| shared_runtime().handle().clone())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveState {
    /// Results reflect the current model.
    Clean,
    /// Edited since the last solve was dispatched.
    Dirty,
    /// A solve is in flight.
    Solving,
}

/// Coalesces edits so that at most one solve is ever in flight.
#[derive(Debug)]
pub struct SolveScheduler {
    state: SolveState,
    // edits that arrived while Solving
    queued: bool,
    dispatched: u64,
}

impl Default for SolveScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SolveScheduler {
    pub fn new() -> Self {
        SolveScheduler {
            state: SolveState::Clean,
            queued: false,
            dispatched: 0,
        }
    }

    pub fn state(&self) -> SolveState {
        self.state
    }

    pub fn is_solving(&self) -> bool {
        self.state == SolveState::Solving
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    /// Total solves ever started.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// An in-flight solve is never cancelled, only followed by one more.
    pub fn mark_dirty(&mut self) {
        match self.state {
            SolveState::Solving => self.queued = true,
            _ => self.state = SolveState::Dirty,
        }
    }

    /// Dirty -> Solving. False if there is nothing to do or a solve is
    /// already running.
    pub fn try_begin(&mut self) -> bool {
        if self.state != SolveState::Dirty {
            return false;
        }
        self.state = SolveState::Solving;
        self.dispatched += 1;
        true
    }

    /// Leaves Solving whether the solve succeeded or not.
    pub fn finish(&mut self) {
        if self.state != SolveState::Solving {
            return;
        }
        self.state = if self.queued {
            SolveState::Dirty
        } else {
            SolveState::Clean
        };
        self.queued = false;
    }
}

/// A solved copy of the engine plus the three predicates.
#[derive(Clone, Debug)]
pub struct Equilibrium<Id> {
    pub engine: LotkaVolterra<Id, Traits<Id>>,
    pub feasible: bool,
    pub stable: bool,
    pub nonreactive: bool,
}

/// Everything one solve needs, captured on the foreground at dispatch.
///
/// `consumers` is an external graph snapshot; `None` builds from the
/// engine's own interaction set.
pub struct SolveJob<Id> {
    engine: LotkaVolterra<Id, Traits<Id>>,
    consumers: Option<HashMap<Id, Vec<Id>>>,
}

impl<Id: SpeciesKey> SolveJob<Id> {
    pub fn new(
        engine: LotkaVolterra<Id, Traits<Id>>,
        consumers: Option<HashMap<Id, Vec<Id>>>,
    ) -> Self {
        SolveJob { engine, consumers }
    }

    pub fn run(self) -> ModelResult<Equilibrium<Id>> {
        let started = Instant::now();
        let SolveJob {
            mut engine,
            consumers,
        } = self;

        let feasible = match consumers {
            Some(graph) => {
                engine.solve_feasibility(|s| graph.get(s).cloned().unwrap_or_default())?
            }
            None => engine.solve_own_feasibility()?,
        };
        let stable = engine.solve_stability()?;
        let nonreactive = engine.solve_reactivity()?;

        debug!(
            "[SolveJob] S={} L={} solved in {:?}",
            engine.richness(),
            engine.link_count(),
            started.elapsed()
        );
        Ok(Equilibrium {
            engine,
            feasible,
            stable,
            nonreactive,
        })
    }
}

type Outcome<Id> = ModelResult<Equilibrium<Id>>;

/// Receiving end of a dispatched solve. Inline solves complete before this
/// is returned, so both modes are collected the same way.
pub struct PendingSolve<Id> {
    rx: oneshot::Receiver<Outcome<Id>>,
}

fn lost_task() -> ModelError {
    ModelError::SolveFailed("solve task ended without a result".to_string())
}

/// A panic is reported as a failed solve so the scheduler still leaves
/// Solving.
fn run_caught<T>(solve: impl FnOnce() -> ModelResult<T>) -> ModelResult<T> {
    panic::catch_unwind(AssertUnwindSafe(solve)).unwrap_or_else(|_| {
        error!("❌ [SolveJob] Solve panicked");
        Err(lost_task())
    })
}

impl<Id: SpeciesKey + Send + 'static> PendingSolve<Id> {
    pub fn dispatch(job: SolveJob<Id>, mode: ExecutionMode) -> Self {
        let (tx, rx) = oneshot::channel();
        match mode {
            ExecutionMode::Inline => {
                let _ = tx.send(run_caught(|| job.run()));
            }
            ExecutionMode::Background => {
                solver_handle().spawn_blocking(move || {
                    let _ = tx.send(run_caught(|| job.run()));
                });
            }
        }
        PendingSolve { rx }
    }

    /// A pending solve whose task is already gone.
    #[cfg(test)]
    pub(crate) fn abandoned() -> Self {
        let (_, rx) = oneshot::channel();
        PendingSolve { rx }
    }

    /// Non-blocking; `None` while the solve is still running.
    pub fn try_take(&mut self) -> Option<Outcome<Id>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(lost_task())),
        }
    }

    /// Blocks the calling thread. Must not be called from async code.
    pub fn wait(self) -> Outcome<Id> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(lost_task()))
    }

    pub async fn join(&mut self) -> Outcome<Id> {
        (&mut self.rx).await.unwrap_or_else(|_| Err(lost_task()))
    }
}
