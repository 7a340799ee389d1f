//! Unified error types for the furnace simulation core
//!
//! Structural and configuration errors fail fast, before any compute is
//! committed. Numerical trouble inside a run (NaN enthalpy, oversized
//! timestep) is reported as a divergence annotation on the result, not
//! as an error that discards history. Cancellation and wall-time
//! expiry are statuses, not errors.

use thiserror::Error;

/// Invalid simulation or study configuration, rejected before any
/// computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A scalar parameter violated its documented constraint.
    #[error("parameter '{name}' {constraint}, got {value}")]
    InvalidParameter {
        /// Parameter name as it appears on `SimulationParameters`
        name: &'static str,
        /// Offending value
        value: f64,
        /// Human-readable constraint, e.g. "must be positive"
        constraint: &'static str,
    },

    /// Logarithmic parameter expansion requires strictly positive bounds.
    #[error("parametric parameter '{name}' uses a logarithmic scale but min = {min} (must be > 0)")]
    LogScaleBounds {
        /// Parameter name from the study config
        name: String,
        /// Offending lower bound
        min: f64,
    },

    /// A study referenced a sweep parameter the simulation does not expose.
    #[error("unknown sweep parameter '{name}'")]
    UnknownParameter {
        /// The unrecognized name
        name: String,
    },

    /// A study referenced a target metric the session does not report.
    #[error("unknown target metric '{name}'")]
    UnknownMetric {
        /// The unrecognized name
        name: String,
    },

    /// A study was configured with no parameters to sweep.
    #[error("parametric study has no parameters")]
    EmptyStudy,

    /// A slot binding referenced a formula id that is not registered.
    #[error("formula '{id}' is not registered")]
    UnknownFormula {
        /// The unregistered id
        id: String,
    },

    /// A formula bound to a slot references a variable the slot does
    /// not provide and no parameter default covers.
    #[error("formula '{id}' needs variable '{variable}' which slot '{slot}' does not provide")]
    UnboundSlotVariable {
        /// Formula id
        id: String,
        /// Slot name
        slot: String,
        /// The uncovered variable
        variable: String,
    },
}

/// Bounds violation on mesh or field access. Access outside the mesh
/// fails; it never clamps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{axis} index {index} out of range 0..{len}")]
pub struct IndexOutOfRange {
    /// Which axis was violated ("radial", "angular", "axial" or "linear")
    pub axis: &'static str,
    /// The offending index
    pub index: usize,
    /// Exclusive upper bound
    pub len: usize,
}

/// Formula compilation failure, carrying the byte position in the
/// expression text where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    /// What went wrong
    pub message: String,
    /// Byte offset into the expression text
    pub position: usize,
}

/// Formula evaluation failure inside the solver hot path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A variable was referenced that the caller did not bind.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A math function was called outside its domain (sqrt of a
    /// negative, log of a non-positive, ...).
    #[error("domain error in '{function}' with argument {argument}")]
    DomainError {
        /// Offending function name
        function: &'static str,
        /// Offending argument value
        argument: f64,
    },

    /// Expression nesting exceeded the compile-time depth limit.
    #[error("expression depth exceeds limit of {limit}")]
    DepthExceeded {
        /// The configured limit
        limit: usize,
    },
}

/// Failure while advancing the solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// A user formula bound to a solver slot failed to evaluate.
    #[error("formula evaluation failed: {0}")]
    Formula(#[from] EvalError),

    /// The session already ran to completion, diverged or was
    /// cancelled; stepping a finished session is a caller bug.
    #[error("session is finished and cannot be stepped")]
    Finished,
}

/// Failure while validating a simulated field against reference data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The reference set was empty, or every point fell outside the mesh.
    #[error("no reference points fall inside the mesh ({n_outside} outside of {n_total})")]
    NoUsablePoints {
        /// Points rejected for lying outside the mesh
        n_outside: usize,
        /// Total points supplied
        n_total: usize,
    },

    /// Result snapshot and its declared shape disagree.
    #[error("field length {actual} does not match mesh shape product {expected}")]
    ShapeMismatch {
        /// Nr * Ntheta * Nz from the snapshot header
        expected: usize,
        /// Actual sample count
        actual: usize,
    },
}
