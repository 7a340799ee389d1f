//! Explicit enthalpy-method heat transfer solver
//!
//! Advances the volumetric enthalpy field one time step at a time over
//! the cylindrical mesh. Per step: accumulate torch sources, conduct
//! between neighbor cells with cylindrical metric factors, apply
//! boundary losses, integrate explicitly, then recover temperature
//! through the enthalpy curve.
//!
//! Per-cell work reads only the previous step's field and writes into
//! a separate next buffer, so it parallelizes without in-place races
//! and identical inputs always produce the identical next field.
//!
//! The explicit scheme has no automatic step-size control. A time step
//! above the Fourier bound surfaces as divergent or NaN enthalpies;
//! the post-step scan annotates the outcome instead of crashing, and
//! history up to that point is preserved.

mod enthalpy;

pub use enthalpy::EnthalpyCurve;

use nalgebra::Point3;
use rayon::prelude::*;
use tracing::warn;

use crate::error::SolverError;
use crate::formula::{FormulaRegistry, FunctionSlot, SlotEvaluator};
use crate::mesh::{CylindricalMesh, ScalarField};
use crate::params::{BoundaryCondition, SimulationParameters};

/// Stefan-Boltzmann constant, W/(m²·K⁴)
pub const STEFAN_BOLTZMANN: f64 = 5.670374419e-8;

/// Outcome annotation for one completed step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Simulated time after the step, s
    pub time: f64,
    /// True when the step produced a non-finite enthalpy anywhere
    pub diverged: bool,
}

/// One solver instance owning the enthalpy state for a session.
pub struct HeatSolver {
    mesh: CylindricalMesh,
    params: SimulationParameters,
    curve: EnthalpyCurve,
    /// Current enthalpy per cell, J/m³, canonical linearization
    h: Vec<f64>,
    /// Next-step buffer, swapped in after each step
    h_next: Vec<f64>,
    /// Torch power per cell (W) under the built-in distribution laws
    builtin_source: Vec<f64>,
    /// Softening length for the inverse-square law, m
    softening: f64,
    time: f64,
}

impl HeatSolver {
    /// Build a solver from validated parameters. The initial field is
    /// the configured initial temperature converted to enthalpy at
    /// every cell.
    #[must_use]
    pub fn new(params: &SimulationParameters) -> Self {
        let mesh = params.mesh();
        let curve = EnthalpyCurve::new(&params.material);
        let h0 = curve.enthalpy(params.initial_temperature);
        let softening = 0.5 * mesh.dr().min(mesh.dz());

        let mut solver = Self {
            h: vec![h0; mesh.len()],
            h_next: vec![0.0; mesh.len()],
            builtin_source: vec![0.0; mesh.len()],
            mesh,
            params: params.clone(),
            curve,
            softening,
            time: 0.0,
        };
        solver.builtin_source = solver
            .compute_source(None)
            .unwrap_or_else(|_| vec![0.0; solver.mesh.len()]);
        solver
    }

    /// Simulated time, s.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The enthalpy–temperature curve in use.
    #[must_use]
    pub fn curve(&self) -> &EnthalpyCurve {
        &self.curve
    }

    /// Raw enthalpy samples, J/m³.
    #[must_use]
    pub fn enthalpy(&self) -> &[f64] {
        &self.h
    }

    /// Temperature snapshot converted from the current enthalpy field.
    #[must_use]
    pub fn temperature_field(&self) -> ScalarField {
        let mut field = ScalarField::with_value(&self.mesh, 0.0);
        for (out, &h) in field.data.iter_mut().zip(&self.h) {
            *out = self.curve.temperature(h);
        }
        field
    }

    /// Total heat content Σ H·V over the furnace, J. Invariant under
    /// zero sources and adiabatic boundaries.
    #[must_use]
    pub fn total_enthalpy(&self) -> f64 {
        self.h
            .iter()
            .enumerate()
            .map(|(offset, &h)| h * self.mesh.cell_volume(offset % self.mesh.n_r))
            .sum()
    }

    /// Volume-weighted liquid fraction of the charge, in [0, 1].
    #[must_use]
    pub fn melt_fraction(&self) -> f64 {
        let mut molten = 0.0;
        let mut total = 0.0;
        for (offset, &h) in self.h.iter().enumerate() {
            let vol = self.mesh.cell_volume(offset % self.mesh.n_r);
            molten += self.curve.liquid_fraction(h) * vol;
            total += vol;
        }
        molten / total
    }

    /// Advance one explicit step, consulting `registry` for bound
    /// formula slots. Slot bindings are resolved here, at step start,
    /// so a rebinding takes effect on the next step and never
    /// mid-step.
    ///
    /// # Errors
    ///
    /// [`SolverError::Formula`] when a bound formula fails to
    /// evaluate. Numerical divergence is not an error; it is reported
    /// in the [`StepOutcome`].
    pub fn step(&mut self, registry: &FormulaRegistry) -> Result<StepOutcome, SolverError> {
        let source = match registry.evaluator(FunctionSlot::TorchDistribution) {
            Some(eval) => std::borrow::Cow::Owned(self.compute_source(Some(eval))?),
            None => std::borrow::Cow::Borrowed(self.builtin_source.as_slice()),
        };
        let conductivity = registry.evaluator(FunctionSlot::Conductivity);
        let heat_loss = registry.evaluator(FunctionSlot::HeatLoss);

        // Temperature snapshot of the previous step, used by the
        // conduction and loss terms.
        let temp: Vec<f64> = self.h.iter().map(|&h| self.curve.temperature(h)).collect();

        let mesh = &self.mesh;
        let params = &self.params;
        let h = &self.h;
        let n_r = mesh.n_r;
        let n_theta = mesh.n_theta;
        let dt_step = params.time_step;

        self.h_next
            .par_chunks_mut(n_r)
            .enumerate()
            .try_for_each(|(column, chunk)| -> Result<(), SolverError> {
                let theta = column % n_theta;
                let z = column / n_theta;
                for (r, next) in chunk.iter_mut().enumerate() {
                    let offset = r + n_r * column;
                    let net_power = cell_net_power(
                        mesh,
                        params,
                        &temp,
                        source.as_ref(),
                        conductivity,
                        heat_loss,
                        r,
                        theta,
                        z,
                        offset,
                    )?;
                    let volume = mesh.cell_volume(r);
                    *next = h[offset] + dt_step * net_power / volume;
                }
                Ok(())
            })?;

        std::mem::swap(&mut self.h, &mut self.h_next);
        self.time += dt_step;

        let diverged = self.h.iter().any(|h| !h.is_finite());
        if diverged {
            warn!(
                time = self.time,
                "non-finite enthalpy detected; annotating step as diverged"
            );
        }
        Ok(StepOutcome {
            time: self.time,
            diverged,
        })
    }

    /// Torch power deposited into each cell, W. Weights from the
    /// built-in distribution law (or the bound formula) are normalized
    /// by their volume-weighted sum so each torch deposits exactly
    /// `power * efficiency` in total.
    fn compute_source(&self, eval: Option<&SlotEvaluator>) -> Result<Vec<f64>, SolverError> {
        let mesh = &self.mesh;
        let mut source = vec![0.0; mesh.len()];
        let mut weights = vec![0.0; mesh.len()];

        for torch in &self.params.torches {
            let mut weighted_volume = 0.0;
            for offset in 0..mesh.len() {
                let r = offset % mesh.n_r;
                let rest = offset / mesh.n_r;
                let (theta, z) = (rest % mesh.n_theta, rest / mesh.n_theta);
                let (x, y, zc) = mesh.cell_center_cartesian(r, theta, z);
                let center = Point3::new(x, y, zc);
                let weight = match eval {
                    Some(formula) => formula.eval(&[
                        ("distance", torch.distance_to(&center)),
                        ("power", torch.power),
                    ])?,
                    None => torch.weight_at(&center, self.softening),
                };
                weights[offset] = weight;
                weighted_volume += weight * mesh.cell_volume(r);
            }
            if weighted_volume <= 0.0 {
                // Degenerate distribution (all weights zero): the
                // torch deposits nothing rather than dividing by zero.
                continue;
            }
            let delivered = torch.delivered_power();
            for offset in 0..mesh.len() {
                let r = offset % mesh.n_r;
                source[offset] += delivered * weights[offset] * mesh.cell_volume(r) / weighted_volume;
            }
        }
        Ok(source)
    }
}

/// Net power into one cell, W: torch source minus boundary losses plus
/// conductive exchange with all neighbors.
#[allow(clippy::too_many_arguments)]
fn cell_net_power(
    mesh: &CylindricalMesh,
    params: &SimulationParameters,
    temp: &[f64],
    source: &[f64],
    conductivity: Option<&SlotEvaluator>,
    heat_loss: Option<&SlotEvaluator>,
    r: usize,
    theta: usize,
    z: usize,
    offset: usize,
) -> Result<f64, SolverError> {
    let dr = mesh.dr();
    let dtheta = mesh.dtheta();
    let dz = mesh.dz();
    let n_r = mesh.n_r;
    let n_theta = mesh.n_theta;
    let n_z = mesh.n_z;

    let t = temp[offset];
    let r_in = r as f64 * dr;
    let r_out = r_in + dr;
    let r_center = r_in + 0.5 * dr;

    let k_at = |t_face: f64| -> Result<f64, SolverError> {
        match conductivity {
            Some(formula) => Ok(formula.eval(&[("temperature", t_face)])?),
            None => Ok(params.material.conductivity),
        }
    };

    let mut power = source[offset];

    // Radial flux. The inner face of the innermost cell sits on the
    // axis where the face area vanishes: the r = 0 symmetry condition.
    if r > 0 {
        let t_nb = temp[offset - 1];
        let area = r_in * dtheta * dz;
        power += k_at(0.5 * (t + t_nb))? * area * (t_nb - t) / dr;
    }
    let outer_area = r_out * dtheta * dz;
    if r + 1 < n_r {
        let t_nb = temp[offset + 1];
        power += k_at(0.5 * (t + t_nb))? * outer_area * (t_nb - t) / dr;
    } else {
        power += boundary_power(
            params,
            params.boundaries.outer,
            heat_loss,
            &k_at,
            t,
            outer_area,
            dr,
        )?;
    }

    // Angular flux, periodic. With a single angular cell the ring
    // closes on itself and exchanges nothing.
    if n_theta > 1 {
        let area = dr * dz;
        let dist = r_center * dtheta;
        let prev = if theta == 0 { n_theta - 1 } else { theta - 1 };
        let next = if theta + 1 == n_theta { 0 } else { theta + 1 };
        for nb_theta in [prev, next] {
            let nb_offset = r + n_r * (nb_theta + n_theta * z);
            let t_nb = temp[nb_offset];
            power += k_at(0.5 * (t + t_nb))? * area * (t_nb - t) / dist;
        }
    }

    // Axial flux and the top/bottom faces.
    let axial_area = 0.5 * (r_out * r_out - r_in * r_in) * dtheta;
    if z > 0 {
        let t_nb = temp[offset - n_r * n_theta];
        power += k_at(0.5 * (t + t_nb))? * axial_area * (t_nb - t) / dz;
    } else {
        power += boundary_power(
            params,
            params.boundaries.bottom,
            heat_loss,
            &k_at,
            t,
            axial_area,
            dz,
        )?;
    }
    if z + 1 < n_z {
        let t_nb = temp[offset + n_r * n_theta];
        power += k_at(0.5 * (t + t_nb))? * axial_area * (t_nb - t) / dz;
    } else {
        power += boundary_power(
            params,
            params.boundaries.top,
            heat_loss,
            &k_at,
            t,
            axial_area,
            dz,
        )?;
    }

    Ok(power)
}

/// Signed power through one boundary face, W. Positive into the cell.
///
/// A formula bound to the heat-loss slot replaces the convective and
/// radiative loss laws; fixed-temperature and adiabatic faces keep
/// their structural behavior.
fn boundary_power(
    params: &SimulationParameters,
    condition: BoundaryCondition,
    heat_loss: Option<&SlotEvaluator>,
    k_at: &dyn Fn(f64) -> Result<f64, SolverError>,
    t: f64,
    area: f64,
    cell_span: f64,
) -> Result<f64, SolverError> {
    let ambient = params.ambient_temperature;
    match condition {
        BoundaryCondition::Adiabatic => Ok(0.0),
        BoundaryCondition::FixedTemperature { temperature } => {
            // Ghost cell at the wall, half a cell away
            let k = k_at(0.5 * (t + temperature))?;
            Ok(k * area * (temperature - t) / (0.5 * cell_span))
        }
        BoundaryCondition::Convective { coefficient } => match heat_loss {
            Some(formula) => {
                Ok(-area * formula.eval(&[("temperature", t), ("ambient", ambient)])?)
            }
            None => Ok(-coefficient * area * (t - ambient)),
        },
        BoundaryCondition::Radiative => match heat_loss {
            Some(formula) => {
                Ok(-area * formula.eval(&[("temperature", t), ("ambient", ambient)])?)
            }
            None => Ok(-params.material.emissivity
                * STEFAN_BOLTZMANN
                * area
                * (t.powi(4) - ambient.powi(4))),
        },
        BoundaryCondition::Mixed { coefficient } => match heat_loss {
            Some(formula) => {
                Ok(-area * formula.eval(&[("temperature", t), ("ambient", ambient)])?)
            }
            None => {
                let convective = coefficient * (t - ambient);
                let radiative = params.material.emissivity
                    * STEFAN_BOLTZMANN
                    * (t.powi(4) - ambient.powi(4));
                Ok(-area * (convective + radiative))
            }
        },
    }
}
