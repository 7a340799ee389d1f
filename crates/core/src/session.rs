//! Simulation session: one mesh + solver instance with a run loop
//!
//! A session owns its mesh, solver state and formula registry, so
//! parallel sessions can never interfere with each other. Stepping is
//! strictly sequential — step N+1 depends on step N — and cancellation
//! is cooperative: it is observed between steps, never mid-step, so a
//! torn field is impossible.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, SolverError};
use crate::formula::FormulaRegistry;
use crate::mesh::ScalarField;
use crate::params::SimulationParameters;
use crate::solver::HeatSolver;

/// Cooperative cancellation flag shared with a running session.
///
/// Clone it before starting a long run and trigger it from another
/// thread; the session observes it between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Simulated time reached the configured duration
    Completed,
    /// The cancel token was triggered between steps
    Cancelled,
    /// A step produced non-finite enthalpy; history up to that point
    /// is preserved in the snapshots
    Diverged,
    /// The caller's deadline passed between steps
    TimedOut,
}

/// One temperature snapshot plus summary metrics, read-only once
/// produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    /// Simulated time of the snapshot, s
    pub time: f64,
    /// Number of completed solver steps
    pub step: usize,
    /// Temperature field in the canonical linearization, K
    pub field: ScalarField,
    /// Maximum cell temperature, K
    pub max_temperature: f64,
    /// Minimum cell temperature, K
    pub min_temperature: f64,
    /// Volume-weighted mean temperature, K
    pub avg_temperature: f64,
    /// Volume-weighted liquid fraction in [0, 1]
    pub melt_fraction: f64,
    /// True when this step produced a non-finite enthalpy somewhere
    pub diverged: bool,
}

impl SimulationResults {
    /// Named summary metric, the vocabulary parametric studies rank
    /// by.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        match name {
            "max_temperature" => Some(self.max_temperature),
            "min_temperature" => Some(self.min_temperature),
            "avg_temperature" => Some(self.avg_temperature),
            "melt_fraction" => Some(self.melt_fraction),
            _ => None,
        }
    }

    /// All metric names [`metric`](Self::metric) accepts.
    #[must_use]
    pub fn metric_names() -> &'static [&'static str] {
        &[
            "max_temperature",
            "min_temperature",
            "avg_temperature",
            "melt_fraction",
        ]
    }
}

/// Snapshots of one run plus how the run ended. Partial histories are
/// always returned — cancellation and divergence keep everything
/// recorded so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Recorded snapshots in time order
    pub snapshots: Vec<SimulationResults>,
    /// Why the loop stopped
    pub status: RunStatus,
}

/// One simulation: validated parameters, a solver, a formula registry
/// and a cancellation flag.
pub struct Session {
    params: SimulationParameters,
    solver: HeatSolver,
    registry: FormulaRegistry,
    cancel: CancelToken,
    steps_taken: usize,
    total_steps: usize,
    finished: bool,
}

/// Validate parameters and open a session.
///
/// # Errors
///
/// [`ConfigError`] naming the first violated invariant; nothing is
/// allocated for the field before validation passes.
pub fn create_session(params: SimulationParameters) -> Result<Session, ConfigError> {
    Session::new(params)
}

impl Session {
    /// Validate parameters and open a session. The initial enthalpy
    /// field is the configured initial temperature converted through
    /// the material's enthalpy curve at every cell.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] naming the first violated invariant.
    pub fn new(params: SimulationParameters) -> Result<Self, ConfigError> {
        params.validate()?;
        info!(
            n_r = params.n_r,
            n_theta = params.n_theta,
            n_z = params.n_z,
            torches = params.torches.len(),
            duration = params.duration,
            "session created"
        );
        let solver = HeatSolver::new(&params);
        let total_steps = params.total_steps();
        Ok(Self {
            params,
            solver,
            registry: FormulaRegistry::with_builtins(),
            cancel: CancelToken::new(),
            steps_taken: 0,
            total_steps,
            finished: false,
        })
    }

    /// The validated parameters this session runs with.
    #[must_use]
    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// This session's formula registry.
    #[must_use]
    pub fn registry(&self) -> &FormulaRegistry {
        &self.registry
    }

    /// Mutable registry access, e.g. to rebind a slot mid-run. A
    /// rebinding takes effect starting with the next step, never
    /// retroactively.
    pub fn registry_mut(&mut self) -> &mut FormulaRegistry {
        &mut self.registry
    }

    /// Cancellation token for this session; clone it to another thread
    /// to stop a long [`run`](Self::run).
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Simulated time so far, s.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.solver.time()
    }

    /// True once the run reached its duration, diverged or was
    /// cancelled. Finished sessions cannot be restarted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advance exactly one step and snapshot the result.
    ///
    /// # Errors
    ///
    /// [`SolverError::Finished`] when the session already ended;
    /// [`SolverError::Formula`] when a bound formula fails to
    /// evaluate. Divergence is not an error: the snapshot is returned
    /// with its `diverged` flag set and the session finishes.
    pub fn step(&mut self) -> Result<SimulationResults, SolverError> {
        if self.finished || self.cancel.is_cancelled() {
            return Err(SolverError::Finished);
        }
        let outcome = self.solver.step(&self.registry)?;
        self.steps_taken += 1;
        if outcome.diverged || self.steps_taken >= self.total_steps {
            self.finished = true;
        }
        Ok(self.snapshot(outcome.diverged))
    }

    /// Run to completion, recording a snapshot every `record_interval`
    /// steps plus the final state. `record_interval == 0` records only
    /// the final state.
    ///
    /// The run stops at the configured duration, on divergence or on
    /// cancellation; whatever was recorded up to that point is
    /// returned.
    ///
    /// # Errors
    ///
    /// [`SolverError`] as for [`step`](Self::step); cancellation is a
    /// status, not an error.
    pub fn run(&mut self, record_interval: usize) -> Result<RunOutput, SolverError> {
        self.run_with_deadline(record_interval, None)
    }

    /// [`run`](Self::run) with an optional wall-clock deadline checked
    /// between steps. Orchestrators use this for run-granular time
    /// budgets.
    ///
    /// # Errors
    ///
    /// [`SolverError`] as for [`step`](Self::step).
    pub fn run_with_deadline(
        &mut self,
        record_interval: usize,
        deadline: Option<Instant>,
    ) -> Result<RunOutput, SolverError> {
        if self.finished {
            return Err(SolverError::Finished);
        }
        let mut snapshots = Vec::new();
        let status = loop {
            if self.cancel.is_cancelled() {
                debug!(step = self.steps_taken, "run cancelled between steps");
                break RunStatus::Cancelled;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    break RunStatus::TimedOut;
                }
            }
            let outcome = self.solver.step(&self.registry)?;
            self.steps_taken += 1;
            let diverged = outcome.diverged;
            let done = diverged || self.steps_taken >= self.total_steps;
            let on_interval = record_interval > 0 && self.steps_taken % record_interval == 0;
            if done || on_interval {
                snapshots.push(self.snapshot(diverged));
            }
            if done {
                self.finished = true;
                break if diverged {
                    RunStatus::Diverged
                } else {
                    RunStatus::Completed
                };
            }
        };
        if status != RunStatus::Completed {
            self.finished = true;
        }
        // A cancelled or timed-out run still reports its last state so
        // partial progress is never discarded silently.
        if snapshots.is_empty() && self.steps_taken > 0 {
            snapshots.push(self.snapshot(false));
        }
        Ok(RunOutput { snapshots, status })
    }

    /// Current state as a results snapshot without stepping.
    #[must_use]
    pub fn current_results(&self) -> SimulationResults {
        self.snapshot(false)
    }

    fn snapshot(&self, diverged: bool) -> SimulationResults {
        let field = self.solver.temperature_field();
        let mesh = self.params.mesh();
        SimulationResults {
            time: self.solver.time(),
            step: self.steps_taken,
            max_temperature: field.max(),
            min_temperature: field.min(),
            avg_temperature: field.volume_weighted_mean(&mesh),
            melt_fraction: self.solver.melt_fraction(),
            diverged,
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn create_session_validates_up_front() {
        let mut p = SimulationParameters::furnace_default();
        p.time_step = -1.0;
        assert!(Session::new(p).is_err());
        assert!(Session::new(SimulationParameters::furnace_default()).is_ok());
    }

    #[test]
    fn initial_snapshot_is_uniform_at_initial_temperature() {
        let p = SimulationParameters::furnace_default();
        let initial = p.initial_temperature;
        let session = Session::new(p).unwrap();
        let results = session.current_results();
        assert_relative_eq!(results.max_temperature, initial, max_relative = 1e-10);
        assert_relative_eq!(results.min_temperature, initial, max_relative = 1e-10);
        assert_relative_eq!(results.avg_temperature, initial, max_relative = 1e-10);
        assert_eq!(results.melt_fraction, 0.0);
    }

    #[test]
    fn run_records_on_interval_and_final() {
        let mut p = SimulationParameters::furnace_default();
        p.duration = 1.0; // 20 steps at dt = 0.05
        let mut session = Session::new(p).unwrap();
        let output = session.run(5).unwrap();
        assert_eq!(output.status, RunStatus::Completed);
        // Steps 5, 10, 15, 20; step 20 is also the final state
        assert_eq!(output.snapshots.len(), 4);
        assert_eq!(output.snapshots.last().unwrap().step, 20);
        assert!(session.is_finished());
    }

    #[test]
    fn record_interval_zero_keeps_only_final() {
        let mut p = SimulationParameters::furnace_default();
        p.duration = 0.5;
        let mut session = Session::new(p).unwrap();
        let output = session.run(0).unwrap();
        assert_eq!(output.snapshots.len(), 1);
        assert_eq!(output.status, RunStatus::Completed);
    }

    #[test]
    fn finished_session_cannot_be_restarted() {
        let mut p = SimulationParameters::furnace_default();
        p.duration = 0.2;
        let mut session = Session::new(p).unwrap();
        session.run(0).unwrap();
        assert!(matches!(session.run(0), Err(SolverError::Finished)));
        assert!(matches!(session.step(), Err(SolverError::Finished)));
    }

    #[test]
    fn cancellation_is_observed_between_steps() {
        let mut session = Session::new(SimulationParameters::furnace_default()).unwrap();
        session.step().unwrap();
        session.cancel();
        let output = session.run(1).unwrap();
        assert_eq!(output.status, RunStatus::Cancelled);
        // The pre-cancel state is still reported
        assert_eq!(output.snapshots.len(), 1);
        assert!(session.is_finished());
    }

    #[test]
    fn torch_raises_max_temperature() {
        let mut p = SimulationParameters::furnace_default();
        p.duration = 2.0;
        let ambient = p.initial_temperature;
        let mut session = Session::new(p).unwrap();
        let output = session.run(0).unwrap();
        assert!(output.snapshots.last().unwrap().max_temperature > ambient);
    }

    #[test]
    fn results_serde_roundtrip() {
        let mut p = SimulationParameters::furnace_default();
        p.duration = 0.2;
        let mut session = Session::new(p).unwrap();
        let results = session.step().unwrap();
        let json = serde_json::to_string(&results).unwrap();
        let back: SimulationResults = serde_json::from_str(&json).unwrap();
        assert_eq!(back, results);
    }

    #[test]
    fn metric_vocabulary_is_closed() {
        let session = Session::new(SimulationParameters::furnace_default()).unwrap();
        let results = session.current_results();
        for name in SimulationResults::metric_names() {
            assert!(results.metric(name).is_some(), "missing metric {name}");
        }
        assert!(results.metric("no_such_metric").is_none());
    }
}
