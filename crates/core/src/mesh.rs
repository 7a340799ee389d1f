//! Structured cylindrical mesh and scalar field storage
//!
//! The furnace volume is discretized into `n_r x n_theta x n_z` cells.
//! Field values are stored as a flat `Vec<f64>` with linear offset
//! `r + n_r * (theta + n_theta * z)` — this linearization is a
//! compatibility contract for every consumer of a snapshot, including
//! hosts that read serialized results.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::error::IndexOutOfRange;

/// Immutable discretization of the cylindrical furnace volume.
///
/// Radial spacing is `radius / n_r`, angular spacing `2π / n_theta`,
/// and the axial spacing is the configured `cell_size`. Cell volumes
/// grow with radius; they are the integration weights used by the
/// solver and every volume-weighted summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CylindricalMesh {
    /// Number of radial cells (>= 1)
    pub n_r: usize,
    /// Number of angular cells (>= 1)
    pub n_theta: usize,
    /// Number of axial cells (>= 1)
    pub n_z: usize,
    /// Axial cell height in meters (> 0)
    pub cell_size: f64,
    /// Furnace radius in meters (> 0)
    pub radius: f64,
}

impl CylindricalMesh {
    /// Create a mesh. Parameter validation happens in
    /// `SimulationParameters::validate`; this constructor only stores.
    #[must_use]
    pub fn new(n_r: usize, n_theta: usize, n_z: usize, cell_size: f64, radius: f64) -> Self {
        Self {
            n_r,
            n_theta,
            n_z,
            cell_size,
            radius,
        }
    }

    /// Total number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n_r * self.n_theta * self.n_z
    }

    /// True when the mesh has no cells. Validation rejects this before
    /// a session starts, but the contract of `len` demands the pair.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Radial cell width in meters.
    #[must_use]
    pub fn dr(&self) -> f64 {
        self.radius / self.n_r as f64
    }

    /// Angular cell extent in radians.
    #[must_use]
    pub fn dtheta(&self) -> f64 {
        TAU / self.n_theta as f64
    }

    /// Axial cell height in meters.
    #[must_use]
    pub fn dz(&self) -> f64 {
        self.cell_size
    }

    /// Furnace height in meters.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.cell_size * self.n_z as f64
    }

    /// Linear offset for a cell index triple.
    ///
    /// # Errors
    ///
    /// Returns [`IndexOutOfRange`] naming the violated axis when any
    /// index is outside `[0, n)` for its axis. Never clamps.
    pub fn index(&self, r: usize, theta: usize, z: usize) -> Result<usize, IndexOutOfRange> {
        if r >= self.n_r {
            return Err(IndexOutOfRange {
                axis: "radial",
                index: r,
                len: self.n_r,
            });
        }
        if theta >= self.n_theta {
            return Err(IndexOutOfRange {
                axis: "angular",
                index: theta,
                len: self.n_theta,
            });
        }
        if z >= self.n_z {
            return Err(IndexOutOfRange {
                axis: "axial",
                index: z,
                len: self.n_z,
            });
        }
        Ok(r + self.n_r * (theta + self.n_theta * z))
    }

    /// Inverse of [`index`](Self::index): linear offset to `(r, theta, z)`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexOutOfRange`] when `offset >= len()`.
    pub fn unravel(&self, offset: usize) -> Result<(usize, usize, usize), IndexOutOfRange> {
        if offset >= self.len() {
            return Err(IndexOutOfRange {
                axis: "linear",
                index: offset,
                len: self.len(),
            });
        }
        let r = offset % self.n_r;
        let rest = offset / self.n_r;
        Ok((r, rest % self.n_theta, rest / self.n_theta))
    }

    /// Cylindrical coordinates of a cell center `(r_m, theta_rad, z_m)`.
    #[must_use]
    pub fn cell_center(&self, r: usize, theta: usize, z: usize) -> (f64, f64, f64) {
        (
            (r as f64 + 0.5) * self.dr(),
            (theta as f64 + 0.5) * self.dtheta(),
            (z as f64 + 0.5) * self.dz(),
        )
    }

    /// Cartesian coordinates of a cell center, with the cylinder axis
    /// along +z and the origin at the bottom center of the furnace.
    #[must_use]
    pub fn cell_center_cartesian(&self, r: usize, theta: usize, z: usize) -> (f64, f64, f64) {
        let (rc, tc, zc) = self.cell_center(r, theta, z);
        (rc * tc.cos(), rc * tc.sin(), zc)
    }

    /// Volume of the cell at radial index `r` in cubic meters.
    ///
    /// The cell is a cylindrical shell sector: `(r_out² - r_in²)/2 · Δθ · Δz`.
    /// Volume depends only on the radial index.
    #[must_use]
    pub fn cell_volume(&self, r: usize) -> f64 {
        let r_in = r as f64 * self.dr();
        let r_out = r_in + self.dr();
        0.5 * (r_out * r_out - r_in * r_in) * self.dtheta() * self.dz()
    }

    /// Total furnace volume in cubic meters.
    #[must_use]
    pub fn total_volume(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius * self.height()
    }
}

/// Dense scalar samples over a [`CylindricalMesh`].
///
/// Owned by the session: replaced or updated per step, never mutated
/// concurrently with a read of the same step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarField {
    /// Samples in the canonical linearization
    pub data: Vec<f64>,
    /// Radial cell count
    pub n_r: usize,
    /// Angular cell count
    pub n_theta: usize,
    /// Axial cell count
    pub n_z: usize,
}

impl ScalarField {
    /// Create a field over `mesh` with every sample set to `value`.
    #[must_use]
    pub fn with_value(mesh: &CylindricalMesh, value: f64) -> Self {
        Self {
            data: vec![value; mesh.len()],
            n_r: mesh.n_r,
            n_theta: mesh.n_theta,
            n_z: mesh.n_z,
        }
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the field holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample at a cell index triple.
    ///
    /// # Errors
    ///
    /// Returns [`IndexOutOfRange`] on any axis violation.
    pub fn get(&self, r: usize, theta: usize, z: usize) -> Result<f64, IndexOutOfRange> {
        Ok(self.data[self.offset(r, theta, z)?])
    }

    /// Overwrite the sample at a cell index triple.
    ///
    /// # Errors
    ///
    /// Returns [`IndexOutOfRange`] on any axis violation.
    pub fn set(&mut self, r: usize, theta: usize, z: usize, value: f64) -> Result<(), IndexOutOfRange> {
        let idx = self.offset(r, theta, z)?;
        self.data[idx] = value;
        Ok(())
    }

    /// Set every sample to `value`.
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Borrow the raw samples in the canonical linearization.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Maximum sample, NaN-propagating inputs excluded upstream.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Minimum sample.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Volume-weighted mean over `mesh`. Plain arithmetic means would
    /// over-weight the small cells near the axis.
    #[must_use]
    pub fn volume_weighted_mean(&self, mesh: &CylindricalMesh) -> f64 {
        let mut weighted = 0.0;
        let mut total = 0.0;
        for (offset, &v) in self.data.iter().enumerate() {
            let r = offset % self.n_r;
            let vol = mesh.cell_volume(r);
            weighted += v * vol;
            total += vol;
        }
        if total > 0.0 {
            weighted / total
        } else {
            0.0
        }
    }

    fn offset(&self, r: usize, theta: usize, z: usize) -> Result<usize, IndexOutOfRange> {
        if r >= self.n_r {
            return Err(IndexOutOfRange {
                axis: "radial",
                index: r,
                len: self.n_r,
            });
        }
        if theta >= self.n_theta {
            return Err(IndexOutOfRange {
                axis: "angular",
                index: theta,
                len: self.n_theta,
            });
        }
        if z >= self.n_z {
            return Err(IndexOutOfRange {
                axis: "axial",
                index: z,
                len: self.n_z,
            });
        }
        Ok(r + self.n_r * (theta + self.n_theta * z))
    }
}
