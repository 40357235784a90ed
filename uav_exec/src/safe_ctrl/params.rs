//! Safe control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use super::barrier::BarrierModel;
use super::qp::InfeasiblePolicy;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for safe control.
///
/// These are fixed for the whole run and threaded explicitly through every
/// call, there is no ambient tuning state.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// The goal position to track.
    ///
    /// Units: meters
    pub goal_m: [f64; 2],

    /// Nominal controller position gain, maps position error to a desired
    /// velocity.
    ///
    /// Units: 1/second
    pub nom_k_pos: f64,

    /// Nominal controller velocity gain, maps velocity error to the nominal
    /// acceleration.
    ///
    /// Units: 1/second
    pub nom_k_vel: f64,

    /// Saturation limit on the norm of the nominal acceleration. This is a
    /// conditioning aid for the QP, not a physical actuator limit.
    ///
    /// Units: meters/second^2
    pub nom_acc_sat_ms2: f64,

    /// Barrier proportional gain, weight on `h` in the decay condition.
    pub barrier_k_p: f64,

    /// Barrier derivative gain, weight on `hd` in the decay condition.
    pub barrier_k_d: f64,

    /// The safety distance. Obstacles closer than this along any beam
    /// violate the barrier.
    ///
    /// Units: meters
    pub safety_dist_m: f64,

    /// If false the filter is bypassed and the nominal command is passed
    /// through untouched.
    pub use_safety_filter: bool,

    /// The active barrier geometry strategy.
    pub barrier_model: BarrierModel,

    /// Fallback behaviour when the QP has no feasible solution.
    pub infeasible_policy: InfeasiblePolicy,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            goal_m: [70.0, 90.0],
            nom_k_pos: -0.08,
            nom_k_vel: -0.2,
            nom_acc_sat_ms2: 1.0,
            barrier_k_p: 3.0,
            barrier_k_d: 4.0,
            safety_dist_m: 2.0,
            use_safety_filter: true,
            barrier_model: BarrierModel::RangeMargin,
            infeasible_policy: InfeasiblePolicy::Stop,
        }
    }
}
