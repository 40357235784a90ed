//! Dynamics parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the dynamics integrator
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// The integration time step.
    ///
    /// Units: seconds
    pub dt_s: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self { dt_s: 0.01 }
    }
}
