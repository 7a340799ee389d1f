//! Comparison of simulated fields against measured reference data
//!
//! Reference points live in Cartesian coordinates; each is mapped into
//! the cylindrical mesh and the simulated temperature is trilinearly
//! interpolated between the surrounding cell centers, with a periodic
//! wrap in the angular direction. Points outside the furnace volume
//! are rejected and counted, never silently dropped. The error metrics
//! are standard: MAE, MSE, RMSE, MAPE, R², maximum absolute error,
//! mean signed error (bias) and range-normalized RMSE.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValidationError;
use crate::mesh::{CylindricalMesh, ScalarField};
use crate::session::SimulationResults;

/// One measured data point in Cartesian coordinates, with the cylinder
/// axis along +z and the origin at the bottom center of the furnace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    /// Measurement location, m
    pub position: Point3<f64>,
    /// Measured temperature, K
    pub value: f64,
    /// Measurement uncertainty (one sigma), K
    pub uncertainty: Option<f64>,
}

/// A named set of reference measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    /// Data set label, carried into the report
    pub name: String,
    /// The measurements
    pub points: Vec<ReferencePoint>,
}

/// Error metrics over one set of compared points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    /// Mean absolute error, K
    pub mae: f64,
    /// Mean squared error, K²
    pub mse: f64,
    /// Root mean squared error, K
    pub rmse: f64,
    /// Mean absolute percentage error over points with a non-zero
    /// reference value, percent
    pub mape: f64,
    /// Coefficient of determination against the reference-mean
    /// baseline
    pub r_squared: f64,
    /// Largest absolute error, K
    pub max_abs_error: f64,
    /// Mean signed error (simulated minus reference), K
    pub mean_signed_error: f64,
    /// RMSE normalized by the reference value range; 0 when the range
    /// is degenerate
    pub nrmse: f64,
    /// Points that entered the statistics
    pub n_points: usize,
    /// Points rejected for lying outside the furnace volume
    pub n_outside: usize,
    /// Points excluded from MAPE for a zero reference value
    pub n_mape_excluded: usize,
}

/// A spatial subset of the furnace in cylindrical coordinates. An
/// unset range leaves that axis unconstrained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Region label, carried into the report
    pub name: String,
    /// Radial range `[min, max]`, m
    pub r_range: Option<(f64, f64)>,
    /// Angular range `[min, max]`, rad in `[0, 2π)`
    pub theta_range: Option<(f64, f64)>,
    /// Axial range `[min, max]`, m
    pub z_range: Option<(f64, f64)>,
}

impl Region {
    fn contains(&self, r: f64, theta: f64, z: f64) -> bool {
        let within = |range: Option<(f64, f64)>, v: f64| match range {
            None => true,
            Some((lo, hi)) => v >= lo && v <= hi,
        };
        within(self.r_range, r) && within(self.theta_range, theta) && within(self.z_range, z)
    }
}

/// Metrics for one region; `None` when no usable reference point fell
/// inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionReport {
    /// Region label
    pub name: String,
    /// Metrics over the points inside the region
    pub metrics: Option<ValidationMetrics>,
}

/// Full comparison result: overall metrics plus one entry per
/// requested region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Label of the compared data set
    pub dataset: String,
    /// Metrics over every usable point
    pub overall: ValidationMetrics,
    /// Per-region breakdowns in request order
    pub regions: Vec<RegionReport>,
}

/// One compared point after interpolation.
struct ComparedPoint {
    r: f64,
    theta: f64,
    z: f64,
    simulated: f64,
    reference: f64,
}

/// Trilinearly interpolate the field at a Cartesian point.
///
/// Returns `None` when the point lies outside the furnace volume
/// (`r > radius` or `z` outside `[0, height]`). Inside the half-cell
/// rim between the outermost cell center and the wall the value is
/// clamped to the outermost center, and likewise at the axis and the
/// axial faces; the angular axis wraps periodically.
#[must_use]
pub fn sample_field(
    field: &ScalarField,
    mesh: &CylindricalMesh,
    position: &Point3<f64>,
) -> Option<f64> {
    let r = position.x.hypot(position.y);
    let z = position.z;
    if r > mesh.radius || z < 0.0 || z > mesh.height() {
        return None;
    }
    let theta = position.y.atan2(position.x).rem_euclid(std::f64::consts::TAU);

    // Continuous cell-center coordinates, clamped at non-periodic ends
    let u = (r / mesh.dr() - 0.5).clamp(0.0, (mesh.n_r - 1) as f64);
    let w = (z / mesh.dz() - 0.5).clamp(0.0, (mesh.n_z - 1) as f64);
    let v = theta / mesh.dtheta() - 0.5;

    let r0 = u.floor() as usize;
    let r1 = (r0 + 1).min(mesh.n_r - 1);
    let fr = u - u.floor();

    let z0 = w.floor() as usize;
    let z1 = (z0 + 1).min(mesh.n_z - 1);
    let fz = w - w.floor();

    let (t0, t1, ft) = if mesh.n_theta == 1 {
        (0, 0, 0.0)
    } else {
        let base = v.floor();
        let t0 = (base.rem_euclid(mesh.n_theta as f64)) as usize;
        (t0, (t0 + 1) % mesh.n_theta, v - base)
    };

    let mut value = 0.0;
    let mut weight_sum = 0.0;
    for (ri, wr) in [(r0, 1.0 - fr), (r1, fr)] {
        for (ti, wt) in [(t0, 1.0 - ft), (t1, ft)] {
            for (zi, wz) in [(z0, 1.0 - fz), (z1, fz)] {
                let weight = wr * wt * wz;
                if weight == 0.0 {
                    continue;
                }
                let offset = mesh.index(ri, ti, zi).ok()?;
                value += weight * field.data[offset];
                weight_sum += weight;
            }
        }
    }
    Some(value / weight_sum)
}

/// Compare a snapshot against a reference data set.
///
/// # Errors
///
/// [`ValidationError::ShapeMismatch`] when the snapshot field does not
/// match the mesh; [`ValidationError::NoUsablePoints`] when every
/// reference point lies outside the furnace volume.
pub fn validate(
    results: &SimulationResults,
    mesh: &CylindricalMesh,
    reference: &ReferenceData,
    regions: &[Region],
) -> Result<ValidationReport, ValidationError> {
    if results.field.len() != mesh.len() {
        return Err(ValidationError::ShapeMismatch {
            expected: mesh.len(),
            actual: results.field.len(),
        });
    }

    let mut compared = Vec::with_capacity(reference.points.len());
    let mut n_outside = 0usize;
    for point in &reference.points {
        match sample_field(&results.field, mesh, &point.position) {
            Some(simulated) => compared.push(ComparedPoint {
                r: point.position.x.hypot(point.position.y),
                theta: point
                    .position
                    .y
                    .atan2(point.position.x)
                    .rem_euclid(std::f64::consts::TAU),
                z: point.position.z,
                simulated,
                reference: point.value,
            }),
            None => n_outside += 1,
        }
    }
    let Some(overall) = compute_metrics(&compared, n_outside) else {
        return Err(ValidationError::NoUsablePoints {
            n_outside,
            n_total: reference.points.len(),
        });
    };
    debug!(
        dataset = %reference.name,
        n_points = compared.len(),
        n_outside,
        "comparing snapshot against reference data"
    );

    let regions = regions
        .iter()
        .map(|region| {
            let subset: Vec<&ComparedPoint> = compared
                .iter()
                .filter(|p| region.contains(p.r, p.theta, p.z))
                .collect();
            RegionReport {
                name: region.name.clone(),
                metrics: compute_metrics_ref(&subset, 0),
            }
        })
        .collect();

    Ok(ValidationReport {
        dataset: reference.name.clone(),
        overall,
        regions,
    })
}

fn compute_metrics(points: &[ComparedPoint], n_outside: usize) -> Option<ValidationMetrics> {
    let refs: Vec<&ComparedPoint> = points.iter().collect();
    compute_metrics_ref(&refs, n_outside)
}

fn compute_metrics_ref(points: &[&ComparedPoint], n_outside: usize) -> Option<ValidationMetrics> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;

    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut signed_sum = 0.0;
    let mut max_abs = 0.0f64;
    let mut mape_sum = 0.0;
    let mut n_mape = 0usize;
    let mut ref_min = f64::INFINITY;
    let mut ref_max = f64::NEG_INFINITY;
    let mut ref_sum = 0.0;
    for p in points {
        let err = p.simulated - p.reference;
        abs_sum += err.abs();
        sq_sum += err * err;
        signed_sum += err;
        max_abs = max_abs.max(err.abs());
        if p.reference != 0.0 {
            mape_sum += (err / p.reference).abs();
            n_mape += 1;
        }
        ref_min = ref_min.min(p.reference);
        ref_max = ref_max.max(p.reference);
        ref_sum += p.reference;
    }
    let ref_mean = ref_sum / n;
    let ss_tot: f64 = points
        .iter()
        .map(|p| (p.reference - ref_mean).powi(2))
        .sum();
    let mse = sq_sum / n;
    let rmse = mse.sqrt();
    // Round-off in the mean can leave a vanishing but non-zero SS_tot
    // for constant references; treat that as degenerate too.
    let tot_floor = f64::EPSILON * n * ref_mean * ref_mean;
    let r_squared = if ss_tot > tot_floor {
        1.0 - sq_sum / ss_tot
    } else {
        // Degenerate reference variance: a matching field is a perfect
        // fit, anything else explains nothing. The tolerance absorbs
        // interpolation round-off.
        let scale = ref_mean.abs().max(1.0);
        if rmse <= 1e-9 * scale {
            1.0
        } else {
            0.0
        }
    };
    let ref_range = ref_max - ref_min;
    Some(ValidationMetrics {
        mae: abs_sum / n,
        mse,
        rmse,
        mape: if n_mape > 0 {
            100.0 * mape_sum / n_mape as f64
        } else {
            0.0
        },
        r_squared,
        max_abs_error: max_abs,
        mean_signed_error: signed_sum / n,
        nrmse: if ref_range > 0.0 { rmse / ref_range } else { 0.0 },
        n_points: points.len(),
        n_outside,
        n_mape_excluded: points.len() - n_mape,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SimulationParameters;
    use crate::session::Session;
    use approx::assert_relative_eq;

    fn snapshot() -> (SimulationResults, CylindricalMesh) {
        let p = SimulationParameters::furnace_default();
        let mesh = p.mesh();
        let session = Session::new(p).unwrap();
        (session.current_results(), mesh)
    }

    fn point(x: f64, y: f64, z: f64, value: f64) -> ReferencePoint {
        ReferencePoint {
            position: Point3::new(x, y, z),
            value,
            uncertainty: None,
        }
    }

    #[test]
    fn identical_field_scores_perfectly() {
        let (results, mesh) = snapshot();
        let t = results.max_temperature; // uniform initial field
        let reference = ReferenceData {
            name: "thermocouples".to_string(),
            points: vec![
                point(0.05, 0.0, 0.05, t),
                point(0.45, 0.0, 0.95, t),
                point(-0.3, 0.2, 1.5, t),
            ],
        };
        let report = validate(&results, &mesh, &reference, &[]).unwrap();
        assert_eq!(report.overall.n_points, 3);
        assert_eq!(report.overall.n_outside, 0);
        assert_relative_eq!(report.overall.mae, 0.0, epsilon = 1e-9);
        assert_relative_eq!(report.overall.mse, 0.0, epsilon = 1e-9);
        assert_relative_eq!(report.overall.rmse, 0.0, epsilon = 1e-9);
        assert_relative_eq!(report.overall.max_abs_error, 0.0, epsilon = 1e-9);
        // Zero reference variance with zero residual is a perfect fit
        assert_relative_eq!(report.overall.r_squared, 1.0);
    }

    #[test]
    fn outside_points_are_rejected_and_counted() {
        let (results, mesh) = snapshot();
        let t = results.max_temperature;
        let reference = ReferenceData {
            name: "probes".to_string(),
            points: vec![
                point(0.5, 0.0, 1.0, t),
                point(1.5, 0.0, 1.0, t),  // beyond the wall
                point(0.5, 0.0, -0.1, t), // below the floor
                point(0.5, 0.0, 2.5, t),  // above the top
            ],
        };
        let report = validate(&results, &mesh, &reference, &[]).unwrap();
        assert_eq!(report.overall.n_points, 1);
        assert_eq!(report.overall.n_outside, 3);
    }

    #[test]
    fn all_points_outside_is_an_error() {
        let (results, mesh) = snapshot();
        let reference = ReferenceData {
            name: "misplaced".to_string(),
            points: vec![point(2.0, 0.0, 1.0, 300.0), point(0.0, 3.0, 1.0, 300.0)],
        };
        let err = validate(&results, &mesh, &reference, &[]).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NoUsablePoints {
                n_outside: 2,
                n_total: 2
            }
        ));
    }

    #[test]
    fn rim_points_clamp_to_the_outermost_center() {
        let (results, mesh) = snapshot();
        let t = results.max_temperature;
        // Between the outermost cell center (r = 0.95) and the wall
        let reference = ReferenceData {
            name: "rim".to_string(),
            points: vec![point(0.99, 0.0, 1.0, t)],
        };
        let report = validate(&results, &mesh, &reference, &[]).unwrap();
        assert_eq!(report.overall.n_points, 1);
        assert_relative_eq!(report.overall.mae, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn known_bias_shows_in_the_metrics() {
        let (results, mesh) = snapshot();
        let t = results.max_temperature;
        // References 10 K below the simulated field everywhere
        let reference = ReferenceData {
            name: "biased".to_string(),
            points: vec![
                point(0.2, 0.0, 0.5, t - 10.0),
                point(0.4, 0.0, 1.0, t - 10.0),
                point(0.6, 0.0, 1.5, t - 10.0),
            ],
        };
        let report = validate(&results, &mesh, &reference, &[]).unwrap();
        assert_relative_eq!(report.overall.mae, 10.0, max_relative = 1e-10);
        assert_relative_eq!(report.overall.mean_signed_error, 10.0, max_relative = 1e-10);
        assert_relative_eq!(report.overall.rmse, 10.0, max_relative = 1e-10);
        assert_relative_eq!(report.overall.max_abs_error, 10.0, max_relative = 1e-10);
        // Constant references, non-zero residual: nothing explained
        assert_relative_eq!(report.overall.r_squared, 0.0);
    }

    #[test]
    fn zero_references_are_excluded_from_mape() {
        let (results, mesh) = snapshot();
        let t = results.max_temperature;
        let reference = ReferenceData {
            name: "mixed".to_string(),
            points: vec![point(0.2, 0.0, 0.5, t), point(0.4, 0.0, 1.0, 0.0)],
        };
        let report = validate(&results, &mesh, &reference, &[]).unwrap();
        assert_eq!(report.overall.n_mape_excluded, 1);
        assert_relative_eq!(report.overall.mape, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn regions_partition_the_points() {
        let (results, mesh) = snapshot();
        let t = results.max_temperature;
        let reference = ReferenceData {
            name: "layers".to_string(),
            points: vec![
                point(0.3, 0.0, 0.3, t),
                point(0.3, 0.0, 0.5, t),
                point(0.3, 0.0, 1.7, t),
            ],
        };
        let regions = vec![
            Region {
                name: "lower".to_string(),
                r_range: None,
                theta_range: None,
                z_range: Some((0.0, 1.0)),
            },
            Region {
                name: "upper".to_string(),
                r_range: None,
                theta_range: None,
                z_range: Some((1.0, 2.0)),
            },
            Region {
                name: "empty-annulus".to_string(),
                r_range: Some((0.8, 1.0)),
                theta_range: None,
                z_range: None,
            },
        ];
        let report = validate(&results, &mesh, &reference, &regions).unwrap();
        assert_eq!(report.regions.len(), 3);
        assert_eq!(report.regions[0].metrics.as_ref().unwrap().n_points, 2);
        assert_eq!(report.regions[1].metrics.as_ref().unwrap().n_points, 1);
        assert!(report.regions[2].metrics.is_none());
    }

    #[test]
    fn mismatched_field_shape_is_an_error() {
        let (results, _) = snapshot();
        let other = CylindricalMesh::new(3, 1, 3, 0.1, 1.0);
        let reference = ReferenceData {
            name: "any".to_string(),
            points: vec![point(0.1, 0.0, 0.1, 300.0)],
        };
        assert!(matches!(
            validate(&results, &other, &reference, &[]),
            Err(ValidationError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn reference_data_regions_and_report_survive_serialization() {
        let (results, mesh) = snapshot();
        let t = results.max_temperature;
        let reference = ReferenceData {
            name: "pyrometers".to_string(),
            points: vec![
                ReferencePoint {
                    position: Point3::new(0.2, 0.1, 0.5),
                    value: t,
                    uncertainty: Some(2.5),
                },
                point(0.4, 0.0, 1.2, t - 5.0),
            ],
        };
        let json = serde_json::to_string(&reference).unwrap();
        let back: ReferenceData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reference);

        let region = Region {
            name: "core".to_string(),
            r_range: Some((0.0, 0.5)),
            theta_range: None,
            z_range: Some((0.0, 1.0)),
        };
        let json = serde_json::to_string(&region).unwrap();
        let back: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(back, region);

        let report = validate(&results, &mesh, &reference, std::slice::from_ref(&region)).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let back: ValidationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn interpolation_is_linear_between_axial_centers() {
        let p = SimulationParameters::furnace_default();
        let mesh = p.mesh();
        let mut field = ScalarField::with_value(&mesh, 0.0);
        // Field rises linearly with axial cell index
        for z in 0..mesh.n_z {
            for r in 0..mesh.n_r {
                field.set(r, 0, z, z as f64).unwrap();
            }
        }
        // Halfway between the centers of cells z=4 (0.45 m) and z=5 (0.55 m)
        let value = sample_field(&field, &mesh, &Point3::new(0.35, 0.0, 0.5)).unwrap();
        assert_relative_eq!(value, 4.5, max_relative = 1e-12);
    }
}
