//! Parametric study orchestrator
//!
//! Expands a parameter grid, runs one independent session per grid
//! point under bounded parallelism, and aggregates the results:
//! per-run records, the best configuration under the optimization
//! goal, and a per-parameter sensitivity score.
//!
//! Sessions share no mutable state, so parallel execution cannot race
//! by construction. Cancellation is cooperative and observed between
//! runs; wall-time budgets are checked at run granularity, and a
//! timed-out in-progress run's partial output is discarded rather
//! than reported as a completed result. Partial study results are
//! always returned, never thrown away.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::params::SimulationParameters;
use crate::session::{CancelToken, RunOutput, RunStatus, Session, SimulationResults};

/// How a swept parameter's value sequence is spaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleKind {
    /// Evenly spaced across `[min, max]`
    Linear,
    /// Evenly spaced in log10 space; requires `min > 0`
    Logarithmic,
}

/// One swept parameter: bounds and point count, or an explicit value
/// list that overrides both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametricParameter {
    /// Name understood by [`apply_parameter`]
    pub name: String,
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Number of sampled points (>= 1)
    pub points: usize,
    /// Spacing of the sampled points
    pub scale: ScaleKind,
    /// Explicit values; when present, bounds and count are ignored
    pub values: Option<Vec<f64>>,
}

impl ParametricParameter {
    /// Evenly spaced sweep without an explicit value list.
    #[must_use]
    pub fn spaced(name: &str, min: f64, max: f64, points: usize, scale: ScaleKind) -> Self {
        Self {
            name: name.to_string(),
            min,
            max,
            points,
            scale,
            values: None,
        }
    }

    /// Concrete value sequence for this parameter.
    ///
    /// # Errors
    ///
    /// [`ConfigError::LogScaleBounds`] for a logarithmic scale with
    /// `min <= 0`; [`ConfigError::InvalidParameter`] for an empty
    /// explicit list, a zero point count or inverted bounds.
    pub fn expand(&self) -> Result<Vec<f64>, ConfigError> {
        if let Some(values) = &self.values {
            if values.is_empty() {
                return Err(ConfigError::InvalidParameter {
                    name: "values",
                    value: 0.0,
                    constraint: "explicit value list must be non-empty",
                });
            }
            return Ok(values.clone());
        }
        if self.points == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "points",
                value: 0.0,
                constraint: "must be at least 1",
            });
        }
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(ConfigError::InvalidParameter {
                name: "min",
                value: self.min,
                constraint: "bounds must be finite with min <= max",
            });
        }
        if self.points == 1 {
            return Ok(vec![self.min]);
        }
        let n = self.points;
        match self.scale {
            ScaleKind::Linear => Ok((0..n)
                .map(|i| self.min + (self.max - self.min) * i as f64 / (n - 1) as f64)
                .collect()),
            ScaleKind::Logarithmic => {
                if self.min <= 0.0 {
                    return Err(ConfigError::LogScaleBounds {
                        name: self.name.clone(),
                        min: self.min,
                    });
                }
                let lo = self.min.log10();
                let hi = self.max.log10();
                Ok((0..n)
                    .map(|i| 10f64.powf(lo + (hi - lo) * i as f64 / (n - 1) as f64))
                    .collect())
            }
        }
    }
}

/// Direction the target metric is optimized in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationGoal {
    /// The best run has the largest target value
    Maximize,
    /// The best run has the smallest target value
    Minimize,
}

/// Full study description: ordered parameters, ranking metric and
/// budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametricStudyConfig {
    /// Swept parameters; grid order follows this declaration order,
    /// with the last parameter varying fastest
    pub parameters: Vec<ParametricParameter>,
    /// Session metric the study ranks by (see
    /// [`SimulationResults::metric_names`])
    pub target_metric: String,
    /// Optimization direction
    pub goal: OptimizationGoal,
    /// Run-count budget; a larger grid is truncated deterministically
    /// in grid order
    pub max_runs: Option<usize>,
    /// Wall-time budget in seconds, checked at run granularity
    pub max_wall_time_secs: Option<f64>,
    /// Run sessions across the rayon worker pool
    pub parallel: bool,
}

/// Outcome of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRun {
    /// Position in deterministic grid order
    pub ordinal: usize,
    /// Parameter name → value for this run
    pub assignment: Vec<(String, f64)>,
    /// Target metric of the final snapshot; `None` when the run
    /// failed before producing one
    pub target_value: Option<f64>,
    /// All summary metrics of the final snapshot
    pub metrics: BTreeMap<String, f64>,
    /// Wall-clock run time, s
    pub run_time_secs: f64,
    /// True when the solver diverged during this run
    pub diverged: bool,
    /// Configuration or solver error, recorded without aborting the
    /// rest of the sweep
    pub error: Option<String>,
}

impl StudyRun {
    /// Target value when the run is usable for ranking and
    /// sensitivity: produced, finite and not diverged.
    #[must_use]
    fn usable_target(&self) -> Option<f64> {
        match self.target_value {
            Some(v) if v.is_finite() && !self.diverged && self.error.is_none() => Some(v),
            _ => None,
        }
    }
}

/// How the study loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudyStatus {
    /// Every scheduled run finished
    Completed,
    /// Cancellation was observed between runs
    Cancelled,
    /// The wall-time budget expired between or during runs
    TimedOut,
}

/// Normalized sensitivity of the target metric to one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSensitivity {
    /// Parameter name
    pub name: String,
    /// Range of per-value mean targets divided by the global target
    /// range, in [0, 1]; 0 when degenerate
    pub score: f64,
}

/// Aggregated study output. Always contains whatever completed, even
/// after cancellation or budget expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametricStudyResult {
    /// Per-run records in grid order
    pub runs: Vec<StudyRun>,
    /// The run with the extremal target under the goal
    pub best: Option<StudyRun>,
    /// Per-parameter sensitivity, in declaration order
    pub sensitivity: Vec<ParameterSensitivity>,
    /// True when the grid exceeded the run budget and was truncated
    pub truncated: bool,
    /// Runs whose in-progress output was discarded at the deadline
    pub n_timed_out: usize,
    /// How the study ended
    pub status: StudyStatus,
}

/// Apply one named sweep value to a parameter set. Torch parameters
/// apply to every torch.
///
/// # Errors
///
/// [`ConfigError::UnknownParameter`] for a name the simulation does
/// not expose.
pub fn apply_parameter(
    params: &mut SimulationParameters,
    name: &str,
    value: f64,
) -> Result<(), ConfigError> {
    match name {
        "torch_power" => {
            for torch in &mut params.torches {
                torch.power = value;
            }
        }
        "torch_efficiency" => {
            for torch in &mut params.torches {
                torch.efficiency = value;
            }
        }
        "initial_temperature" => params.initial_temperature = value,
        "ambient_temperature" => params.ambient_temperature = value,
        "time_step" => params.time_step = value,
        "duration" => params.duration = value,
        "conductivity" => params.material.conductivity = value,
        "specific_heat" => params.material.specific_heat = value,
        "density" => params.material.density = value,
        "emissivity" => params.material.emissivity = value,
        "latent_heat_fusion" => params.material.latent_heat_fusion = value,
        _ => {
            return Err(ConfigError::UnknownParameter {
                name: name.to_string(),
            })
        }
    }
    Ok(())
}

/// The deterministic run list: Cartesian product of the expanded
/// parameters in declaration order, truncated (in grid order) at the
/// run budget.
fn build_grid(
    config: &ParametricStudyConfig,
) -> Result<(Vec<Vec<(String, f64)>>, bool), ConfigError> {
    if config.parameters.is_empty() {
        return Err(ConfigError::EmptyStudy);
    }
    let expanded: Vec<(String, Vec<f64>)> = config
        .parameters
        .iter()
        .map(|p| Ok((p.name.clone(), p.expand()?)))
        .collect::<Result<_, ConfigError>>()?;

    let total: usize = expanded.iter().map(|(_, v)| v.len()).product();
    let budget = config.max_runs.unwrap_or(total);
    let kept = total.min(budget);
    let truncated = kept < total;

    let mut grid = Vec::with_capacity(kept);
    let mut indices = vec![0usize; expanded.len()];
    // Budget checked before each push so a zero budget schedules nothing
    'outer: while grid.len() < kept {
        let assignment: Vec<(String, f64)> = expanded
            .iter()
            .zip(&indices)
            .map(|((name, values), &i)| (name.clone(), values[i]))
            .collect();
        grid.push(assignment);
        // Odometer increment, last parameter fastest
        for axis in (0..indices.len()).rev() {
            indices[axis] += 1;
            if indices[axis] < expanded[axis].1.len() {
                continue 'outer;
            }
            indices[axis] = 0;
        }
        break;
    }
    Ok((grid, truncated))
}

fn run_session(
    base: &SimulationParameters,
    assignment: &[(String, f64)],
    deadline: Option<Instant>,
) -> Result<RunOutput, String> {
    let mut params = base.clone();
    for (name, value) in assignment {
        apply_parameter(&mut params, name, *value).map_err(|e| e.to_string())?;
    }
    let mut session = Session::new(params).map_err(|e| e.to_string())?;
    session
        .run_with_deadline(0, deadline)
        .map_err(|e| e.to_string())
}

fn execute_run(
    base: &SimulationParameters,
    assignment: &[(String, f64)],
    ordinal: usize,
    target_metric: &str,
    deadline: Option<Instant>,
) -> Option<StudyRun> {
    let start = Instant::now();
    let mut run = StudyRun {
        ordinal,
        assignment: assignment.to_vec(),
        target_value: None,
        metrics: BTreeMap::new(),
        run_time_secs: 0.0,
        diverged: false,
        error: None,
    };

    let outcome = run_session(base, assignment, deadline);
    run.run_time_secs = start.elapsed().as_secs_f64();
    match outcome {
        Ok(output) if output.status == RunStatus::TimedOut => {
            // Partial output of a timed-out run is discarded, never
            // reported as a completed result.
            debug!(ordinal, "run hit the wall-time budget");
            None
        }
        Ok(output) => {
            run.diverged = output.status == RunStatus::Diverged;
            if let Some(results) = output.snapshots.last() {
                for name in SimulationResults::metric_names() {
                    if let Some(value) = results.metric(name) {
                        run.metrics.insert((*name).to_string(), value);
                    }
                }
                run.target_value = results.metric(target_metric);
            }
            Some(run)
        }
        Err(message) => {
            run.error = Some(message);
            Some(run)
        }
    }
}

/// Run a parametric study against a base parameter set.
///
/// # Errors
///
/// [`ConfigError`] when the study configuration itself is invalid
/// (unknown metric or parameter name, bad expansion); these are
/// rejected before any session starts.
pub fn run_parametric_study(
    base: &SimulationParameters,
    config: &ParametricStudyConfig,
) -> Result<ParametricStudyResult, ConfigError> {
    run_parametric_study_with(base, config, &CancelToken::new(), |_| {})
}

/// [`run_parametric_study`] with a cancellation token and a per-run
/// callback, invoked once per completed run (the cancellable sequence
/// of per-run results preceding the final aggregate).
///
/// # Errors
///
/// [`ConfigError`] as for [`run_parametric_study`].
pub fn run_parametric_study_with(
    base: &SimulationParameters,
    config: &ParametricStudyConfig,
    cancel: &CancelToken,
    on_run: impl Fn(&StudyRun) + Sync,
) -> Result<ParametricStudyResult, ConfigError> {
    // Fail fast on config problems before committing any compute.
    if !SimulationResults::metric_names().contains(&config.target_metric.as_str()) {
        return Err(ConfigError::UnknownMetric {
            name: config.target_metric.clone(),
        });
    }
    {
        let mut probe = base.clone();
        for parameter in &config.parameters {
            apply_parameter(&mut probe, &parameter.name, parameter.min)?;
        }
    }
    let (grid, truncated) = build_grid(config)?;
    info!(
        runs = grid.len(),
        truncated,
        parallel = config.parallel,
        "starting parametric study"
    );

    let deadline = config
        .max_wall_time_secs
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs));
    let deadline_passed = || deadline.is_some_and(|d| Instant::now() >= d);

    let slots: Vec<Option<StudyRun>> = if config.parallel {
        grid.par_iter()
            .enumerate()
            .map(|(ordinal, assignment)| {
                if cancel.is_cancelled() || deadline_passed() {
                    return None;
                }
                let run =
                    execute_run(base, assignment, ordinal, &config.target_metric, deadline)?;
                on_run(&run);
                Some(run)
            })
            .collect()
    } else {
        let mut slots = Vec::with_capacity(grid.len());
        for (ordinal, assignment) in grid.iter().enumerate() {
            if cancel.is_cancelled() || deadline_passed() {
                slots.push(None);
                continue;
            }
            let run = execute_run(base, assignment, ordinal, &config.target_metric, deadline);
            if let Some(run) = &run {
                on_run(run);
            }
            slots.push(run);
        }
        slots
    };

    let scheduled = slots.len();
    let runs: Vec<StudyRun> = slots.into_iter().flatten().collect();
    let n_timed_out = if cancel.is_cancelled() {
        0
    } else {
        scheduled - runs.len()
    };

    let status = if cancel.is_cancelled() {
        StudyStatus::Cancelled
    } else if n_timed_out > 0 || (deadline_passed() && runs.len() < scheduled) {
        StudyStatus::TimedOut
    } else {
        StudyStatus::Completed
    };

    let best = select_best(&runs, config.goal);
    let sensitivity = compute_sensitivity(&config.parameters, &runs);

    Ok(ParametricStudyResult {
        best,
        sensitivity,
        truncated,
        n_timed_out,
        status,
        runs,
    })
}

/// The run with the extremal usable target under the goal; ties keep
/// the earliest grid ordinal.
fn select_best(runs: &[StudyRun], goal: OptimizationGoal) -> Option<StudyRun> {
    let mut best: Option<(&StudyRun, f64)> = None;
    for run in runs {
        let Some(value) = run.usable_target() else {
            continue;
        };
        let better = match best {
            None => true,
            Some((_, current)) => match goal {
                OptimizationGoal::Maximize => value > current,
                OptimizationGoal::Minimize => value < current,
            },
        };
        if better {
            best = Some((run, value));
        }
    }
    best.map(|(run, _)| run.clone())
}

/// Sensitivity per parameter: the range of mean targets across that
/// parameter's sampled values, normalized by the global target range.
/// One consistent measure across all parameters; 0 when degenerate.
fn compute_sensitivity(
    parameters: &[ParametricParameter],
    runs: &[StudyRun],
) -> Vec<ParameterSensitivity> {
    let targets: Vec<f64> = runs.iter().filter_map(StudyRun::usable_target).collect();
    let global_min = targets.iter().copied().fold(f64::INFINITY, f64::min);
    let global_max = targets.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let global_range = global_max - global_min;

    parameters
        .iter()
        .map(|parameter| {
            let score = if global_range > 0.0 {
                // Mean target per sampled value of this parameter
                let mut by_value: BTreeMap<u64, (f64, usize)> = BTreeMap::new();
                for run in runs {
                    let Some(target) = run.usable_target() else {
                        continue;
                    };
                    let Some((_, value)) =
                        run.assignment.iter().find(|(n, _)| n == &parameter.name)
                    else {
                        continue;
                    };
                    let entry = by_value.entry(value.to_bits()).or_insert((0.0, 0));
                    entry.0 += target;
                    entry.1 += 1;
                }
                let means: Vec<f64> = by_value
                    .values()
                    .map(|(sum, count)| sum / *count as f64)
                    .collect();
                if means.len() < 2 {
                    0.0
                } else {
                    let lo = means.iter().copied().fold(f64::INFINITY, f64::min);
                    let hi = means.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    ((hi - lo) / global_range).clamp(0.0, 1.0)
                }
            } else {
                0.0
            };
            ParameterSensitivity {
                name: parameter.name.clone(),
                score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn small_base() -> SimulationParameters {
        let mut p = SimulationParameters::furnace_default();
        p.n_r = 4;
        p.n_z = 6;
        p.duration = 0.5;
        p
    }

    #[test]
    fn linear_expansion_matches_specified_points() {
        let p = ParametricParameter::spaced("torch_power", 50.0, 200.0, 4, ScaleKind::Linear);
        assert_eq!(p.expand().unwrap(), vec![50.0, 100.0, 150.0, 200.0]);
    }

    #[test]
    fn logarithmic_expansion_is_even_in_log_space() {
        let p = ParametricParameter::spaced("torch_power", 10.0, 1000.0, 3, ScaleKind::Logarithmic);
        let values = p.expand().unwrap();
        assert_eq!(values.len(), 3);
        for (got, want) in values.iter().zip([10.0, 100.0, 1000.0]) {
            assert_relative_eq!(*got, want, max_relative = 1e-12);
        }
    }

    #[test]
    fn logarithmic_with_nonpositive_min_is_rejected() {
        let p = ParametricParameter::spaced("x", 0.0, 10.0, 3, ScaleKind::Logarithmic);
        assert!(matches!(
            p.expand(),
            Err(ConfigError::LogScaleBounds { .. })
        ));
    }

    #[test]
    fn explicit_values_override_bounds_and_count() {
        let mut p = ParametricParameter::spaced("x", 0.0, 1.0, 99, ScaleKind::Linear);
        p.values = Some(vec![3.0, 1.0, 2.0]);
        assert_eq!(p.expand().unwrap(), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn single_point_expansion_is_the_minimum() {
        let p = ParametricParameter::spaced("x", 7.0, 9.0, 1, ScaleKind::Linear);
        assert_eq!(p.expand().unwrap(), vec![7.0]);
    }

    #[test]
    fn grid_is_cartesian_product_last_parameter_fastest() {
        let config = ParametricStudyConfig {
            parameters: vec![
                ParametricParameter::spaced("torch_power", 1.0, 2.0, 2, ScaleKind::Linear),
                ParametricParameter::spaced("duration", 0.1, 0.3, 3, ScaleKind::Linear),
            ],
            target_metric: "max_temperature".to_string(),
            goal: OptimizationGoal::Maximize,
            max_runs: None,
            max_wall_time_secs: None,
            parallel: false,
        };
        let (grid, truncated) = build_grid(&config).unwrap();
        assert!(!truncated);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0][0].1, 1.0);
        assert_eq!(grid[0][1].1, 0.1);
        assert_eq!(grid[1][1].1, 0.2); // last parameter varies fastest
        assert_eq!(grid[3][0].1, 2.0);
    }

    #[test]
    fn grid_truncates_deterministically_at_run_budget() {
        let config = ParametricStudyConfig {
            parameters: vec![ParametricParameter::spaced(
                "torch_power",
                0.0,
                9.0,
                10,
                ScaleKind::Linear,
            )],
            target_metric: "max_temperature".to_string(),
            goal: OptimizationGoal::Maximize,
            max_runs: Some(4),
            max_wall_time_secs: None,
            parallel: false,
        };
        let (grid, truncated) = build_grid(&config).unwrap();
        assert!(truncated);
        assert_eq!(grid.len(), 4);
        // First four grid points in order, not a random subsample
        for (i, assignment) in grid.iter().enumerate() {
            assert_relative_eq!(assignment[0].1, i as f64, max_relative = 1e-12);
        }
    }

    #[test]
    fn zero_run_budget_schedules_nothing() {
        let config = ParametricStudyConfig {
            parameters: vec![ParametricParameter::spaced(
                "torch_power",
                1e4,
                1e5,
                3,
                ScaleKind::Linear,
            )],
            target_metric: "max_temperature".to_string(),
            goal: OptimizationGoal::Maximize,
            max_runs: Some(0),
            max_wall_time_secs: None,
            parallel: false,
        };
        let result = run_parametric_study(&small_base(), &config).unwrap();
        assert!(result.runs.is_empty(), "empty budget must not execute runs");
        assert!(result.truncated);
        assert!(result.best.is_none());
        assert_eq!(result.n_timed_out, 0);
        assert_eq!(result.status, StudyStatus::Completed);
    }

    #[test]
    fn unknown_parameter_fails_before_any_run() {
        let config = ParametricStudyConfig {
            parameters: vec![ParametricParameter::spaced(
                "warp_factor",
                1.0,
                9.0,
                3,
                ScaleKind::Linear,
            )],
            target_metric: "max_temperature".to_string(),
            goal: OptimizationGoal::Maximize,
            max_runs: None,
            max_wall_time_secs: None,
            parallel: false,
        };
        assert!(matches!(
            run_parametric_study(&small_base(), &config),
            Err(ConfigError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn unknown_metric_fails_before_any_run() {
        let config = ParametricStudyConfig {
            parameters: vec![ParametricParameter::spaced(
                "torch_power",
                1e4,
                1e5,
                2,
                ScaleKind::Linear,
            )],
            target_metric: "coolness".to_string(),
            goal: OptimizationGoal::Maximize,
            max_runs: None,
            max_wall_time_secs: None,
            parallel: false,
        };
        assert!(matches!(
            run_parametric_study(&small_base(), &config),
            Err(ConfigError::UnknownMetric { .. })
        ));
    }

    #[test]
    fn study_finds_higher_power_hotter() {
        let config = ParametricStudyConfig {
            parameters: vec![ParametricParameter::spaced(
                "torch_power",
                1e5,
                1e6,
                3,
                ScaleKind::Linear,
            )],
            target_metric: "max_temperature".to_string(),
            goal: OptimizationGoal::Maximize,
            max_runs: None,
            max_wall_time_secs: None,
            parallel: true,
        };
        let result = run_parametric_study(&small_base(), &config).unwrap();
        assert_eq!(result.status, StudyStatus::Completed);
        assert_eq!(result.runs.len(), 3);
        let best = result.best.unwrap();
        assert_relative_eq!(best.assignment[0].1, 1e6, max_relative = 1e-12);
        // Power is the only swept parameter, so it owns all the variance
        assert_relative_eq!(result.sensitivity[0].score, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn minimize_goal_selects_smallest_target() {
        let config = ParametricStudyConfig {
            parameters: vec![ParametricParameter::spaced(
                "torch_power",
                1e5,
                1e6,
                2,
                ScaleKind::Linear,
            )],
            target_metric: "max_temperature".to_string(),
            goal: OptimizationGoal::Minimize,
            max_runs: None,
            max_wall_time_secs: None,
            parallel: false,
        };
        let result = run_parametric_study(&small_base(), &config).unwrap();
        let best = result.best.unwrap();
        assert_relative_eq!(best.assignment[0].1, 1e5, max_relative = 1e-12);
    }

    #[test]
    fn poisoned_run_is_recorded_without_aborting_the_sweep() {
        // time_step = -1 fails session validation for one grid point
        let mut p = ParametricParameter::spaced("time_step", 0.0, 0.0, 1, ScaleKind::Linear);
        p.values = Some(vec![0.05, -1.0, 0.025]);
        let config = ParametricStudyConfig {
            parameters: vec![p],
            target_metric: "max_temperature".to_string(),
            goal: OptimizationGoal::Maximize,
            max_runs: None,
            max_wall_time_secs: None,
            parallel: false,
        };
        let result = run_parametric_study(&small_base(), &config).unwrap();
        assert_eq!(result.runs.len(), 3);
        assert!(result.runs[1].error.is_some());
        assert!(result.runs[1].target_value.is_none());
        assert!(result.runs[0].error.is_none());
        assert!(result.runs[2].error.is_none());
        assert!(result.best.is_some());
    }

    #[test]
    fn cancelling_after_n_runs_returns_exactly_n_results() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let config = ParametricStudyConfig {
            parameters: vec![ParametricParameter::spaced(
                "torch_power",
                1e4,
                1e5,
                10,
                ScaleKind::Linear,
            )],
            target_metric: "max_temperature".to_string(),
            goal: OptimizationGoal::Maximize,
            max_runs: None,
            max_wall_time_secs: None,
            parallel: false,
        };
        let cancel = CancelToken::new();
        let completed = AtomicUsize::new(0);
        let result = run_parametric_study_with(&small_base(), &config, &cancel, |_| {
            if completed.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                cancel.cancel();
            }
        })
        .unwrap();
        assert_eq!(result.status, StudyStatus::Cancelled);
        assert_eq!(result.runs.len(), 3);
        // No duplicates
        let mut ordinals: Vec<usize> = result.runs.iter().map(|r| r.ordinal).collect();
        ordinals.dedup();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }

    #[test]
    fn expired_budget_returns_partial_results() {
        let config = ParametricStudyConfig {
            parameters: vec![ParametricParameter::spaced(
                "torch_power",
                1e4,
                1e5,
                5,
                ScaleKind::Linear,
            )],
            target_metric: "max_temperature".to_string(),
            goal: OptimizationGoal::Maximize,
            max_runs: None,
            max_wall_time_secs: Some(0.0), // already expired
            parallel: false,
        };
        let result = run_parametric_study(&small_base(), &config).unwrap();
        assert_eq!(result.status, StudyStatus::TimedOut);
        assert!(result.runs.len() < 5);
    }

    #[test]
    fn study_result_serde_roundtrip() {
        let config = ParametricStudyConfig {
            parameters: vec![ParametricParameter::spaced(
                "torch_power",
                1e5,
                2e5,
                2,
                ScaleKind::Linear,
            )],
            target_metric: "avg_temperature".to_string(),
            goal: OptimizationGoal::Maximize,
            max_runs: None,
            max_wall_time_secs: None,
            parallel: false,
        };
        let result = run_parametric_study(&small_base(), &config).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: ParametricStudyResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);

        let config_json = serde_json::to_string(&config).unwrap();
        let config_back: ParametricStudyConfig = serde_json::from_str(&config_json).unwrap();
        assert_eq!(config_back, config);
    }
}
