//! Lidar simulator parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An axis-aligned rectangular obstacle in the world XY plane.
#[derive(Debug, Clone, Deserialize)]
pub struct RectObstacle {
    /// Centre of the rectangle.
    ///
    /// Units: meters
    pub centre_m: [f64; 2],

    /// Half extents of the rectangle along X and Y.
    ///
    /// Units: meters
    pub half_extents_m: [f64; 2],
}

/// Parameters for the lidar simulator
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Number of evenly-spaced beams.
    pub num_beams: usize,

    /// Maximum sensor range, also the "no detection" sentinel value.
    ///
    /// Units: meters
    pub max_range_m: f64,

    /// The obstacle world.
    pub obstacles: Vec<RectObstacle>,
}
