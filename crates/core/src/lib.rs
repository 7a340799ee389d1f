//! Plasma Furnace Simulation Core Library
//!
//! Transient heat transfer in a cylindrical plasma furnace: plasma
//! torch heat deposition, conduction through the charge, and melting
//! and vaporization tracked through the enthalpy method.
//!
//! ## Structure
//!
//! - A structured cylindrical mesh with the canonical
//!   `r + n_r * (theta + n_theta * z)` field linearization
//! - An explicit finite-volume solver carrying volumetric enthalpy, so
//!   latent-heat plateaus need no special casing in the update loop
//! - A session layer owning one solver instance per run, with
//!   cooperative cancellation and snapshot recording
//! - A formula engine for user-defined torch distribution,
//!   conductivity and heat-loss expressions, compiled once and
//!   evaluated allocation-free in the hot loop
//! - Parametric studies sweeping named parameters across independent
//!   parallel sessions
//! - Validation of simulated fields against measured reference points

pub mod error;
pub mod formula;
pub mod material;
pub mod mesh;
pub mod params;
pub mod session;
pub mod solver;
pub mod study;
pub mod validation;

// Re-export the session surface
pub use session::{
    create_session, CancelToken, RunOutput, RunStatus, Session, SimulationResults,
};

// Re-export configuration types
pub use material::{Material, Torch, TorchDistribution, Vaporization};
pub use mesh::{CylindricalMesh, ScalarField};
pub use params::{Boundaries, BoundaryCondition, SimulationParameters};

// Re-export formula types
pub use formula::{CompiledFormula, Formula, FormulaRegistry, FunctionSlot};

// Re-export solver types
pub use solver::{EnthalpyCurve, HeatSolver, StepOutcome};

// Re-export study and validation surfaces
pub use study::{
    run_parametric_study, run_parametric_study_with, OptimizationGoal, ParametricParameter,
    ParametricStudyConfig, ParametricStudyResult, ScaleKind, StudyRun, StudyStatus,
};
pub use validation::{
    sample_field, validate, ReferenceData, ReferencePoint, Region, ValidationMetrics,
    ValidationReport,
};
