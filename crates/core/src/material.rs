//! Material and plasma torch models
//!
//! A [`Material`] carries the static thermal properties plus the
//! latent-heat data the enthalpy method needs. A [`Torch`] deposits a
//! fixed total power into the charge with a configurable spatial
//! distribution; the distribution weight can be swapped at runtime
//! through the `"torch-distribution"` formula slot.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Thermal properties of the furnace charge.
///
/// Units: conductivity W/(m·K), specific heat J/(kg·K), density kg/m³,
/// latent heats J/kg, temperatures K. Constant per session unless a
/// formula slot overrides a term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Display name
    pub name: String,
    /// Thermal conductivity, W/(m·K)
    pub conductivity: f64,
    /// Specific heat capacity, J/(kg·K)
    pub specific_heat: f64,
    /// Density, kg/m³
    pub density: f64,
    /// Surface emissivity in [0, 1]
    pub emissivity: f64,
    /// Latent heat of fusion, J/kg
    pub latent_heat_fusion: f64,
    /// Solidus temperature, K
    pub solidus: f64,
    /// Liquidus temperature, K (>= solidus)
    pub liquidus: f64,
    /// Optional vaporization transition
    pub vaporization: Option<Vaporization>,
}

/// Vaporization transition data, used for a second latent plateau.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vaporization {
    /// Boiling temperature, K
    pub temperature: f64,
    /// Latent heat of vaporization, J/kg
    pub latent_heat: f64,
}

impl Material {
    /// Volumetric heat capacity ρ·cp, J/(m³·K).
    #[must_use]
    pub fn volumetric_heat_capacity(&self) -> f64 {
        self.density * self.specific_heat
    }

    /// Thermal diffusivity k/(ρ·cp), m²/s. Drives the Fourier
    /// stability bound of the explicit scheme.
    #[must_use]
    pub fn thermal_diffusivity(&self) -> f64 {
        self.conductivity / self.volumetric_heat_capacity()
    }

    /// Low-carbon steel scrap, the common plasma-furnace charge.
    #[must_use]
    pub fn steel_scrap() -> Self {
        Self {
            name: "Steel scrap".to_string(),
            conductivity: 45.0,
            specific_heat: 490.0,
            density: 7850.0,
            emissivity: 0.8,
            latent_heat_fusion: 2.7e5,
            solidus: 1723.0,
            liquidus: 1793.0,
            vaporization: Some(Vaporization {
                temperature: 3134.0,
                latent_heat: 6.1e6,
            }),
        }
    }

    /// Pure copper. Solidus equals liquidus: an isothermal transition
    /// with a flat latent plateau.
    #[must_use]
    pub fn copper() -> Self {
        Self {
            name: "Copper".to_string(),
            conductivity: 400.0,
            specific_heat: 385.0,
            density: 8960.0,
            emissivity: 0.6,
            latent_heat_fusion: 2.05e5,
            solidus: 1357.8,
            liquidus: 1357.8,
            vaporization: Some(Vaporization {
                temperature: 2835.0,
                latent_heat: 4.73e6,
            }),
        }
    }

    /// Alumina refractory, effectively non-melting at furnace
    /// temperatures. Useful as a conduction-only reference charge.
    #[must_use]
    pub fn alumina() -> Self {
        Self {
            name: "Alumina".to_string(),
            conductivity: 30.0,
            specific_heat: 880.0,
            density: 3950.0,
            emissivity: 0.75,
            latent_heat_fusion: 1.07e6,
            solidus: 2345.0,
            liquidus: 2345.0,
            vaporization: None,
        }
    }
}

/// Spatial distribution shape of a torch's heat deposition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TorchDistribution {
    /// `exp(-d² / 2σ²)` around the torch focus
    Gaussian {
        /// Spread in meters
        sigma: f64,
    },
    /// `1 / max(d², core²)`, softened near the focus so the weight
    /// stays finite inside the closest cell
    InverseSquare,
    /// Constant weight inside `radius`, zero outside
    Uniform {
        /// Deposition radius in meters
        radius: f64,
    },
}

/// One plasma torch. Immutable for the duration of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Torch {
    /// Focus position in furnace Cartesian coordinates (axis along +z,
    /// origin at the bottom center), meters
    pub position: Point3<f64>,
    /// Electrical power, W
    pub power: f64,
    /// Thermal efficiency in (0, 1]
    pub efficiency: f64,
    /// Spatial deposition shape
    pub distribution: TorchDistribution,
}

impl Torch {
    /// Unnormalized deposition weight at a point. The solver divides
    /// by the volume-weighted sum over the mesh so the total deposited
    /// power is exactly `power * efficiency` regardless of shape.
    ///
    /// `softening` keeps the inverse-square law finite at the focus;
    /// callers pass half the smallest cell dimension.
    #[must_use]
    pub fn weight_at(&self, point: &Point3<f64>, softening: f64) -> f64 {
        let d2 = nalgebra::distance_squared(&self.position, point);
        match self.distribution {
            TorchDistribution::Gaussian { sigma } => (-d2 / (2.0 * sigma * sigma)).exp(),
            TorchDistribution::InverseSquare => 1.0 / d2.max(softening * softening),
            TorchDistribution::Uniform { radius } => {
                if d2 <= radius * radius {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Distance from the torch focus to a point, meters. Bound to the
    /// `distance` variable when a formula overrides the distribution.
    #[must_use]
    pub fn distance_to(&self, point: &Point3<f64>) -> f64 {
        nalgebra::distance(&self.position, point)
    }

    /// Power actually delivered into the charge, W.
    #[must_use]
    pub fn delivered_power(&self) -> f64 {
        self.power * self.efficiency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn torch(distribution: TorchDistribution) -> Torch {
        Torch {
            position: Point3::new(0.0, 0.0, 1.0),
            power: 100e3,
            efficiency: 0.8,
            distribution,
        }
    }

    #[test]
    fn gaussian_weight_decays_with_distance() {
        let t = torch(TorchDistribution::Gaussian { sigma: 0.2 });
        let near = t.weight_at(&Point3::new(0.1, 0.0, 1.0), 0.01);
        let far = t.weight_at(&Point3::new(0.5, 0.0, 1.0), 0.01);
        assert!(near > far);
        assert_relative_eq!(
            t.weight_at(&Point3::new(0.0, 0.0, 1.0), 0.01),
            1.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn inverse_square_is_softened_at_focus() {
        let t = torch(TorchDistribution::InverseSquare);
        let at_focus = t.weight_at(&Point3::new(0.0, 0.0, 1.0), 0.05);
        assert!(at_focus.is_finite());
        assert_relative_eq!(at_focus, 1.0 / (0.05 * 0.05), max_relative = 1e-12);
        // Quarter weight at double distance, outside the core
        let w1 = t.weight_at(&Point3::new(0.2, 0.0, 1.0), 0.05);
        let w2 = t.weight_at(&Point3::new(0.4, 0.0, 1.0), 0.05);
        assert_relative_eq!(w1 / w2, 4.0, max_relative = 1e-12);
    }

    #[test]
    fn uniform_weight_is_an_indicator() {
        let t = torch(TorchDistribution::Uniform { radius: 0.3 });
        assert_eq!(t.weight_at(&Point3::new(0.2, 0.0, 1.0), 0.01), 1.0);
        assert_eq!(t.weight_at(&Point3::new(0.4, 0.0, 1.0), 0.01), 0.0);
    }

    #[test]
    fn delivered_power_applies_efficiency() {
        let t = torch(TorchDistribution::InverseSquare);
        assert_relative_eq!(t.delivered_power(), 80e3, max_relative = 1e-12);
    }

    #[test]
    fn material_serde_roundtrip() {
        let m = Material::steel_scrap();
        let json = serde_json::to_string(&m).unwrap();
        let back: Material = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn diffusivity_consistency() {
        let m = Material::copper();
        assert_relative_eq!(
            m.thermal_diffusivity() * m.volumetric_heat_capacity(),
            m.conductivity,
            max_relative = 1e-12
        );
    }
}
