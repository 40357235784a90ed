//! # Lidar simulator module
//!
//! This module simulates a planar scanning range sensor. The bearing set is
//! fixed when the simulator is constructed and never changes, only the
//! measured ranges are refreshed when `update` is called with a new vehicle
//! position.
//!
//! The obstacle world is a set of axis-aligned rectangles taken from the
//! parameter file. Each beam is cast from the vehicle position along its
//! bearing and the range to the nearest rectangle is returned, clipped to
//! the sensor's maximum range. A beam which hits nothing reports the
//! maximum range, which acts as the "no detection" sentinel for downstream
//! consumers.
//!
//! Bearing convention: a beam at bearing `theta` points along the unit
//! vector `(sin(theta), cos(theta))` in the world XY plane. The safe control
//! module relies on this convention when projecting the vehicle velocity
//! onto the beam directions.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;

// Internal
pub use params::{Params, RectObstacle};
use util::maths::wrap_2pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single scan of the simulated lidar.
///
/// The bearings and ranges are index-aligned, one range per bearing.
#[derive(Debug, Clone, PartialEq)]
pub struct LidarScan {
    /// Beam bearings, fixed at construction time.
    ///
    /// Units: radians, in [0, 2*pi)
    pub bearings_rad: Vec<f64>,

    /// Measured range along each beam.
    ///
    /// Units: meters
    pub ranges_m: Vec<f64>,

    /// The sensor's maximum range. Ranges equal to this value denote no
    /// detection.
    ///
    /// Units: meters
    pub max_range_m: f64,
}

/// The lidar simulator.
pub struct LidarSim {
    obstacles: Vec<RectObstacle>,

    scan: LidarScan,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LidarScan {
    /// Number of beams in the scan.
    pub fn len(&self) -> usize {
        self.bearings_rad.len()
    }

    /// True if the scan has no beams.
    pub fn is_empty(&self) -> bool {
        self.bearings_rad.is_empty()
    }

    /// True if any range in the scan is physically invalid (negative or
    /// non-finite).
    ///
    /// The simulator itself never produces such readings but consumers must
    /// not assume that, a real sensor driver can.
    pub fn is_degenerate(&self) -> bool {
        self.ranges_m.iter().any(|r| !r.is_finite() || *r < 0.0)
    }

    /// The smallest range in the scan, or the max range sentinel for an
    /// empty scan.
    pub fn min_range_m(&self) -> f64 {
        self.ranges_m
            .iter()
            .cloned()
            .fold(self.max_range_m, f64::min)
    }
}

impl LidarSim {
    /// Create a new simulator with the evenly-spaced bearing set given by
    /// the parameters.
    pub fn new(params: Params) -> Self {
        let num_beams = params.num_beams;

        let bearings_rad = (0..num_beams)
            .map(|i| wrap_2pi(i as f64 * std::f64::consts::TAU / num_beams as f64))
            .collect();

        Self::with_bearings(params, bearings_rad)
    }

    /// Create a new simulator with an explicit bearing set.
    ///
    /// Used by the evaluation tooling to build a denser sensor than the one
    /// the controller flies with.
    pub fn with_bearings(params: Params, bearings_rad: Vec<f64>) -> Self {
        let num_beams = bearings_rad.len();

        let scan = LidarScan {
            bearings_rad,
            ranges_m: vec![params.max_range_m; num_beams],
            max_range_m: params.max_range_m,
        };

        Self {
            obstacles: params.obstacles,
            scan,
        }
    }

    /// Refresh the scan ranges for the given vehicle position.
    pub fn update(&mut self, position_m: &Vector2<f64>) -> &LidarScan {
        let max_range_m = self.scan.max_range_m;

        for i in 0..self.scan.bearings_rad.len() {
            let bearing_rad = self.scan.bearings_rad[i];
            let dir = Vector2::new(bearing_rad.sin(), bearing_rad.cos());

            // Range to the nearest obstacle along this beam, or the max
            // range if nothing is hit.
            let mut range_m = max_range_m;
            for obs in &self.obstacles {
                if let Some(t) = ray_rect_intersect(position_m, &dir, obs) {
                    if t < range_m {
                        range_m = t;
                    }
                }
            }

            self.scan.ranges_m[i] = range_m;
        }

        &self.scan
    }

    /// Get the most recent scan.
    pub fn scan(&self) -> &LidarScan {
        &self.scan
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Intersect a ray with an axis-aligned rectangle using the slab method.
///
/// Returns the distance along the ray to the rectangle boundary, `Some(0.0)`
/// if the origin is inside the rectangle, or `None` for a miss.
fn ray_rect_intersect(
    origin_m: &Vector2<f64>,
    dir: &Vector2<f64>,
    rect: &RectObstacle,
) -> Option<f64> {
    let mut t_near = f64::NEG_INFINITY;
    let mut t_far = f64::INFINITY;

    for axis in 0..2 {
        let min_m = rect.centre_m[axis] - rect.half_extents_m[axis];
        let max_m = rect.centre_m[axis] + rect.half_extents_m[axis];

        if dir[axis].abs() < 1e-12 {
            // Beam parallel to this slab, miss unless the origin is within it
            if origin_m[axis] < min_m || origin_m[axis] > max_m {
                return None;
            }
        } else {
            let t_0 = (min_m - origin_m[axis]) / dir[axis];
            let t_1 = (max_m - origin_m[axis]) / dir[axis];

            let (t_lo, t_hi) = if t_0 < t_1 { (t_0, t_1) } else { (t_1, t_0) };

            if t_lo > t_near {
                t_near = t_lo;
            }
            if t_hi < t_far {
                t_far = t_hi;
            }

            if t_near > t_far {
                return None;
            }
        }
    }

    if t_far < 0.0 {
        // Rectangle entirely behind the origin
        None
    } else if t_near < 0.0 {
        // Origin inside the rectangle
        Some(0.0)
    } else {
        Some(t_near)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn single_obstacle_params() -> Params {
        Params {
            num_beams: 4,
            max_range_m: 30.0,
            obstacles: vec![RectObstacle {
                centre_m: [0.0, 10.0],
                half_extents_m: [1.0, 1.0],
            }],
        }
    }

    #[test]
    fn test_beam_hit_and_miss() {
        let mut lidar = LidarSim::new(single_obstacle_params());

        // 4 beams at 0, 90, 180, 270 degrees, i.e. +Y, +X, -Y, -X
        let scan = lidar.update(&Vector2::new(0.0, 0.0));

        assert_eq!(scan.len(), 4);

        // Beam 0 points at the obstacle, near face at y = 9
        assert!((scan.ranges_m[0] - 9.0).abs() < 1e-9);

        // The other beams miss and report the sentinel
        assert_eq!(scan.ranges_m[1], 30.0);
        assert_eq!(scan.ranges_m[2], 30.0);
        assert_eq!(scan.ranges_m[3], 30.0);

        assert!(!scan.is_degenerate());
        assert!((scan.min_range_m() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_origin_inside_obstacle() {
        let mut lidar = LidarSim::new(single_obstacle_params());

        let scan = lidar.update(&Vector2::new(0.0, 10.0));

        // Every beam starts inside the rectangle
        for range_m in &scan.ranges_m {
            assert_eq!(*range_m, 0.0);
        }
    }

    #[test]
    fn test_fixed_bearings_refreshed_ranges() {
        let mut lidar = LidarSim::new(single_obstacle_params());

        let bearings_before = lidar.scan().bearings_rad.clone();

        lidar.update(&Vector2::new(0.0, 0.0));
        let first = lidar.scan().ranges_m.clone();

        lidar.update(&Vector2::new(0.0, 5.0));
        let second = lidar.scan().ranges_m.clone();

        // Bearings never change, ranges do
        assert_eq!(lidar.scan().bearings_rad, bearings_before);
        assert!((first[0] - 9.0).abs() < 1e-9);
        assert!((second[0] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_dense_bearings() {
        let params = single_obstacle_params();
        let bearings_rad = (0..90).map(|i| (i as f64 * 4.0).to_radians()).collect();

        let mut lidar = LidarSim::with_bearings(params, bearings_rad);
        let scan = lidar.update(&Vector2::new(0.0, 0.0));

        assert_eq!(scan.len(), 90);
        assert!((scan.min_range_m() - 9.0).abs() < 1e-9);
    }
}
