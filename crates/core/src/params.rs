//! Simulation parameters, boundary conditions and up-front validation
//!
//! Every invariant is checked before a session starts; a violated
//! invariant is a [`ConfigError`] naming the parameter, the constraint
//! and the offending value. No input is ever silently replaced by a
//! default.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::material::{Material, Torch};
use crate::mesh::CylindricalMesh;

/// Boundary condition applied at one furnace face.
///
/// The symmetry condition at r = 0 and the periodic wrap in the
/// angular direction are structural properties of the mesh, not
/// configurable; these kinds apply to the outer wall and the top and
/// bottom faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoundaryCondition {
    /// Wall held at a fixed temperature (ghost-cell conduction), K
    FixedTemperature {
        /// Imposed wall temperature, K
        temperature: f64,
    },
    /// Convective loss `h·(T − T_amb)` against ambient
    Convective {
        /// Heat transfer coefficient, W/(m²·K)
        coefficient: f64,
    },
    /// Radiative loss `ε·σ·(T⁴ − T_amb⁴)` against ambient, using the
    /// material emissivity
    Radiative,
    /// Convective and radiative losses combined
    Mixed {
        /// Heat transfer coefficient, W/(m²·K)
        coefficient: f64,
    },
    /// Zero flux through the face
    Adiabatic,
}

/// Per-face boundary conditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundaries {
    /// Outer cylindrical wall
    pub outer: BoundaryCondition,
    /// Top face (z = height)
    pub top: BoundaryCondition,
    /// Bottom face (z = 0)
    pub bottom: BoundaryCondition,
}

impl Default for Boundaries {
    fn default() -> Self {
        Self {
            outer: BoundaryCondition::Mixed { coefficient: 15.0 },
            top: BoundaryCondition::Radiative,
            bottom: BoundaryCondition::Convective { coefficient: 5.0 },
        }
    }
}

/// Everything a session needs to start: geometry, initial state, time
/// discretization, torches, material and boundary conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Radial cell count
    pub n_r: usize,
    /// Angular cell count
    pub n_theta: usize,
    /// Axial cell count
    pub n_z: usize,
    /// Axial cell height, m
    pub cell_size: f64,
    /// Furnace radius, m
    pub radius: f64,
    /// Uniform initial charge temperature, K
    pub initial_temperature: f64,
    /// Ambient temperature outside the vessel, K
    pub ambient_temperature: f64,
    /// Explicit time step, s
    pub time_step: f64,
    /// Simulated duration, s
    pub duration: f64,
    /// Plasma torches (may be empty for pure-diffusion studies)
    pub torches: Vec<Torch>,
    /// Charge material
    pub material: Material,
    /// Per-face boundary conditions
    pub boundaries: Boundaries,
}

impl SimulationParameters {
    /// Small default configuration used by parameter sweeps and tests:
    /// a 1 m radius, 2 m tall vessel of steel scrap with one torch.
    #[must_use]
    pub fn furnace_default() -> Self {
        Self {
            n_r: 10,
            n_theta: 1,
            n_z: 20,
            cell_size: 0.1,
            radius: 1.0,
            initial_temperature: 293.15,
            ambient_temperature: 293.15,
            time_step: 0.05,
            duration: 10.0,
            torches: vec![Torch {
                position: nalgebra::Point3::new(0.0, 0.0, 1.8),
                power: 500e3,
                efficiency: 0.7,
                distribution: crate::material::TorchDistribution::Gaussian { sigma: 0.3 },
            }],
            material: Material::steel_scrap(),
            boundaries: Boundaries::default(),
        }
    }

    /// Build the mesh described by the geometric parameters.
    #[must_use]
    pub fn mesh(&self) -> CylindricalMesh {
        CylindricalMesh::new(self.n_r, self.n_theta, self.n_z, self.cell_size, self.radius)
    }

    /// Check every structural invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint as a [`ConfigError`];
    /// callers see the parameter name, the rule and the value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn require(
            ok: bool,
            name: &'static str,
            value: f64,
            constraint: &'static str,
        ) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::InvalidParameter {
                    name,
                    value,
                    constraint,
                })
            }
        }

        require(self.n_r >= 1, "n_r", self.n_r as f64, "must be at least 1")?;
        require(
            self.n_theta >= 1,
            "n_theta",
            self.n_theta as f64,
            "must be at least 1",
        )?;
        require(self.n_z >= 1, "n_z", self.n_z as f64, "must be at least 1")?;
        require(
            self.cell_size > 0.0 && self.cell_size.is_finite(),
            "cell_size",
            self.cell_size,
            "must be positive and finite",
        )?;
        require(
            self.radius > 0.0 && self.radius.is_finite(),
            "radius",
            self.radius,
            "must be positive and finite",
        )?;
        require(
            self.initial_temperature.is_finite() && self.initial_temperature >= 0.0,
            "initial_temperature",
            self.initial_temperature,
            "must be finite and non-negative",
        )?;
        require(
            self.ambient_temperature.is_finite() && self.ambient_temperature >= 0.0,
            "ambient_temperature",
            self.ambient_temperature,
            "must be finite and non-negative",
        )?;
        require(
            self.time_step > 0.0 && self.time_step.is_finite(),
            "time_step",
            self.time_step,
            "must be positive and finite",
        )?;
        require(
            self.duration > 0.0 && self.duration.is_finite(),
            "duration",
            self.duration,
            "must be positive and finite",
        )?;

        for torch in &self.torches {
            require(
                torch.efficiency > 0.0 && torch.efficiency <= 1.0,
                "torch.efficiency",
                torch.efficiency,
                "must be in (0, 1]",
            )?;
            require(
                torch.power >= 0.0 && torch.power.is_finite(),
                "torch.power",
                torch.power,
                "must be non-negative and finite",
            )?;
        }

        let m = &self.material;
        require(
            m.specific_heat > 0.0,
            "material.specific_heat",
            m.specific_heat,
            "must be positive",
        )?;
        require(
            m.density > 0.0,
            "material.density",
            m.density,
            "must be positive",
        )?;
        require(
            m.conductivity > 0.0,
            "material.conductivity",
            m.conductivity,
            "must be positive",
        )?;
        require(
            (0.0..=1.0).contains(&m.emissivity),
            "material.emissivity",
            m.emissivity,
            "must be in [0, 1]",
        )?;
        require(
            m.latent_heat_fusion >= 0.0,
            "material.latent_heat_fusion",
            m.latent_heat_fusion,
            "must be non-negative",
        )?;
        require(
            m.liquidus >= m.solidus,
            "material.liquidus",
            m.liquidus,
            "must be at or above the solidus",
        )?;
        if let Some(vap) = m.vaporization {
            require(
                vap.temperature > m.liquidus,
                "material.vaporization.temperature",
                vap.temperature,
                "must be above the liquidus",
            )?;
            require(
                vap.latent_heat >= 0.0,
                "material.vaporization.latent_heat",
                vap.latent_heat,
                "must be non-negative",
            )?;
        }

        if self.fourier_number() > 0.5 {
            // Explicit Euler has no automatic step-size control; an
            // oversized step surfaces as divergent results, which the
            // solver annotates rather than crashes on.
            warn!(
                fourier = self.fourier_number(),
                time_step = self.time_step,
                "time step exceeds the explicit stability bound; expect divergence"
            );
        }

        Ok(())
    }

    /// Fourier number `α·Δt / Δx²` of the configured discretization,
    /// using the smallest cell dimension. Values above ~0.5 make the
    /// explicit scheme unstable.
    #[must_use]
    pub fn fourier_number(&self) -> f64 {
        let mesh = self.mesh();
        let dx = mesh.dr().min(mesh.dz());
        self.material.thermal_diffusivity() * self.time_step / (dx * dx)
    }

    /// Number of solver steps the configured duration spans. The
    /// epsilon absorbs division round-off so e.g. 1.0 s at 0.05 s is
    /// exactly 20 steps.
    #[must_use]
    pub fn total_steps(&self) -> usize {
        ((self.duration / self.time_step - 1e-9).ceil().max(1.0)) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_are_valid() {
        assert!(SimulationParameters::furnace_default().validate().is_ok());
    }

    #[test]
    fn zero_cell_count_is_rejected() {
        let mut p = SimulationParameters::furnace_default();
        p.n_r = 0;
        let err = p.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter { name: "n_r", .. }
        ));
    }

    #[test]
    fn nonpositive_time_step_is_rejected() {
        let mut p = SimulationParameters::furnace_default();
        p.time_step = 0.0;
        assert!(p.validate().is_err());
        p.time_step = -1.0;
        assert!(p.validate().is_err());
        p.time_step = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn torch_efficiency_must_be_in_unit_interval() {
        let mut p = SimulationParameters::furnace_default();
        p.torches[0].efficiency = 0.0;
        assert!(p.validate().is_err());
        p.torches[0].efficiency = 1.0;
        assert!(p.validate().is_ok());
        p.torches[0].efficiency = 1.5;
        assert!(p.validate().is_err());
    }

    #[test]
    fn emissivity_outside_unit_interval_is_rejected() {
        let mut p = SimulationParameters::furnace_default();
        p.material.emissivity = 1.2;
        assert!(p.validate().is_err());
        p.material.emissivity = -0.1;
        assert!(p.validate().is_err());
    }

    #[test]
    fn liquidus_below_solidus_is_rejected() {
        let mut p = SimulationParameters::furnace_default();
        p.material.liquidus = p.material.solidus - 10.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn zero_torches_is_a_valid_configuration() {
        let mut p = SimulationParameters::furnace_default();
        p.torches.clear();
        assert!(p.validate().is_ok());
    }

    #[test]
    fn fourier_number_scales_with_time_step() {
        let mut p = SimulationParameters::furnace_default();
        let base = p.fourier_number();
        p.time_step *= 2.0;
        assert!((p.fourier_number() - 2.0 * base).abs() < 1e-12);
    }

    #[test]
    fn parameters_serde_roundtrip() {
        let p = SimulationParameters::furnace_default();
        let json = serde_json::to_string(&p).unwrap();
        let back: SimulationParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
