//! # Data Store

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::dynamics::QuadState;
use crate::safe_ctrl;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    /// Simulation elapsed time
    ///
    /// Units: seconds
    pub sim_time_s: f64,

    // Vehicle state
    /// The current vehicle state. Mutated only by the dynamics integrator
    /// between cycles.
    pub quad_state: QuadState,

    // SafeCtrl
    pub safe_ctrl: safe_ctrl::SafeCtrl,
    pub safe_ctrl_output: Option<safe_ctrl::OutputData>,
    pub safe_ctrl_status_rpt: safe_ctrl::StatusReport,

    // Histories, saved at the end of the run
    /// Position history, one entry per cycle.
    pub state_hist: Vec<[f64; 3]>,

    /// Smallest barrier margin per cycle.
    pub min_margin_hist: Vec<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform the start-of-cycle bookkeeping.
    pub fn cycle_start(&mut self, dt_s: f64) {
        self.num_cycles += 1;
        self.sim_time_s += dt_s;
    }
}
