//! # Safe control module
//!
//! Safe control is responsible for keeping the vehicle away from sensed
//! obstacles while it tracks the goal position. Every cycle it takes the
//! current kinematic state and the latest lidar scan and produces the planar
//! acceleration command closest to the nominal goal-tracking command which
//! still respects every obstacle constraint.
//!
//! The filtering is built on exponential control barrier functions. For each
//! beam of the scan a barrier value `h` (the margin between the measured
//! range and the safety distance) and its time derivative `hd` (the velocity
//! component closing that margin) are computed. The barrier decay condition
//! `hdd + Kp*h + Kd*hd >= 0` is then rearranged into the linear inequality
//! `A*u >= b` on the acceleration command `u`, and the filtered command is
//! found by solving the quadratic program
//!
//! ```text
//! minimise   0.5*||u - u_nom||^2
//! subject to A*u >= b
//! ```
//!
//! which is the Euclidean projection of the nominal command onto the safe
//! set. With the filter disabled the nominal command is passed through
//! unchanged, which is the baseline for unfiltered-comparison runs.
//!
//! Each cycle is an independent solve, no solver state is carried between
//! cycles.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod barrier;
pub mod constraints;
pub mod nominal;
pub mod params;
pub mod qp;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use barrier::*;
pub use constraints::*;
pub use nominal::*;
pub use params::Params;
pub use qp::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during SafeCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum SafeCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    /// The scan's bearing and range sequences disagree in length. This is an
    /// integration error, not a sensor fault, and is never recovered from
    /// within the module.
    #[error("Scan shape mismatch: {num_bearings} bearings but {num_ranges} ranges")]
    ScanShapeMismatch {
        num_bearings: usize,
        num_ranges: usize,
    },

    /// The assembled constraint system is internally inconsistent.
    #[error("Constraint shape mismatch: A is {rows}x{cols}, b has {b_len} elements")]
    ConstraintShapeMismatch {
        rows: usize,
        cols: usize,
        b_len: usize,
    },

    /// The QP backend rejected the problem during setup.
    #[error("Could not set up the safety QP: {0}")]
    QpSetupError(String),
}
