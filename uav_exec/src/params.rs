//! Simulation-level parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the simulation driver.
#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    /// Maximum number of cycles before the run is stopped.
    pub max_cycles: u64,

    /// Starting position of the vehicle.
    ///
    /// Units: meters
    pub start_position_m: [f64; 3],

    /// Distance from the goal below which the run is considered complete.
    ///
    /// Units: meters
    pub goal_threshold_m: f64,

    /// Number of cycles between status log lines.
    pub status_log_period_cycles: u64,

    /// Variance of the random-walk position noise applied before control.
    /// Zero disables noise injection.
    ///
    /// Units: meters
    pub state_noise_variance_m: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            max_cycles: 50_000,
            start_position_m: [15.0, 20.0, 10.0],
            goal_threshold_m: 0.5,
            status_log_period_cycles: 500,
            state_noise_variance_m: 0.0,
        }
    }
}
