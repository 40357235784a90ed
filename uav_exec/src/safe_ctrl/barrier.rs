//! # Barrier geometry module
//!
//! This module computes the barrier value `h` and its time derivative `hd`
//! for each sensed direction. `h` is the signed safety margin (positive is
//! safe) and `hd` is the rate at which the margin is currently closing under
//! the vehicle's velocity. Both are recomputed from scratch every cycle and
//! never persisted.
//!
//! Two barrier geometries are available, selected once per run through the
//! parameters:
//!
//! - `RangeMargin`: one barrier per lidar beam, `h = range - safety_dist`.
//!   The range rate is not measured independently, it is inferred from the
//!   vehicle kinematics assuming static obstacles.
//! - `Superellipsoid`: a single barrier around a known obstacle centre with
//!   a quartic superellipsoid level set. Used when the obstacle geometry is
//!   known a priori rather than sensed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use super::SafeCtrlError;
use crate::dynamics::QuadState;
use crate::lidar_sim::LidarScan;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Barrier value assigned to a beam reporting no detection. Large enough
/// that the associated constraint can never bind.
///
/// Units: meters
pub const NO_DETECTION_MARGIN_M: f64 = 1.0e3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Barrier values and derivatives, one pair per constraint direction.
#[derive(Debug, Clone, PartialEq)]
pub struct BarrierVector {
    /// Signed safety margin per direction, positive is safe.
    ///
    /// Units: meters
    pub h_m: Vec<f64>,

    /// Rate of change of the margin under the current velocity.
    ///
    /// Units: meters/second
    pub hd_ms: Vec<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The active barrier geometry strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum BarrierModel {
    /// Per-beam range margin against the lidar scan.
    RangeMargin,

    /// Quartic superellipsoid level set around a known obstacle centre.
    Superellipsoid {
        /// Semi-axis along X.
        ///
        /// Units: meters
        a_m: f64,

        /// Semi-axis along Y.
        ///
        /// Units: meters
        b_m: f64,

        /// Obstacle centre in the world frame.
        ///
        /// Units: meters
        centre_m: [f64; 2],
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BarrierVector {
    /// Number of constraint directions.
    pub fn len(&self) -> usize {
        self.h_m.len()
    }

    /// True if there are no constraint directions.
    pub fn is_empty(&self) -> bool {
        self.h_m.is_empty()
    }

    /// The smallest margin over all directions.
    pub fn min_h_m(&self) -> f64 {
        self.h_m.iter().cloned().fold(f64::INFINITY, f64::min)
    }
}

impl BarrierModel {
    /// Compute the barrier vector for the given state and scan.
    ///
    /// The returned vector always has one entry per constraint direction:
    /// one per beam for `RangeMargin`, exactly one for `Superellipsoid`.
    pub fn compute_barrier(
        &self,
        state: &QuadState,
        scan: &LidarScan,
        safety_dist_m: f64,
    ) -> Result<BarrierVector, SafeCtrlError> {
        match self {
            BarrierModel::RangeMargin => {
                check_scan_shape(scan)?;

                let h_m = scan
                    .ranges_m
                    .iter()
                    .map(|range_m| {
                        if *range_m >= scan.max_range_m {
                            // No detection along this beam
                            NO_DETECTION_MARGIN_M
                        } else {
                            range_m - safety_dist_m
                        }
                    })
                    .collect();

                Ok(BarrierVector {
                    h_m,
                    hd_ms: range_rates(state, scan),
                })
            }
            BarrierModel::Superellipsoid { a_m, b_m, centre_m } => {
                let (rel_m, vel_ms) = (
                    state.position2_m() - nalgebra::Vector2::from(*centre_m),
                    state.velocity2_ms(),
                );

                let h = (rel_m[0] / a_m).powi(4) + (rel_m[1] / b_m).powi(4) - safety_dist_m;

                let hd = 4.0 * rel_m[0].powi(3) * vel_ms[0] / a_m.powi(4)
                    + 4.0 * rel_m[1].powi(3) * vel_ms[1] / b_m.powi(4);

                Ok(BarrierVector {
                    h_m: vec![h],
                    hd_ms: vec![hd],
                })
            }
        }
    }

    /// Compute the barrier vector used when the current scan has been
    /// rejected and no previous barrier is available.
    ///
    /// All sensed directions are treated as unconstrained. The
    /// superellipsoid model does not depend on the scan so it is computed
    /// normally.
    pub fn fallback_barrier(
        &self,
        state: &QuadState,
        scan: &LidarScan,
        safety_dist_m: f64,
    ) -> Result<BarrierVector, SafeCtrlError> {
        match self {
            BarrierModel::RangeMargin => {
                check_scan_shape(scan)?;

                Ok(BarrierVector {
                    h_m: vec![NO_DETECTION_MARGIN_M; scan.len()],
                    hd_ms: range_rates(state, scan),
                })
            }
            BarrierModel::Superellipsoid { .. } => {
                self.compute_barrier(state, scan, safety_dist_m)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Rate of change of each beam's range margin under the current velocity.
///
/// The beam at bearing `theta` points along `(sin(theta), cos(theta))`, so
/// the margin closes at the velocity component along that direction:
/// `hd = -sin(theta)*vx - cos(theta)*vy`. Obstacles are assumed static.
fn range_rates(state: &QuadState, scan: &LidarScan) -> Vec<f64> {
    let vel_ms = state.velocity2_ms();

    scan.bearings_rad
        .iter()
        .map(|bearing_rad| -bearing_rad.sin() * vel_ms[0] - bearing_rad.cos() * vel_ms[1])
        .collect()
}

fn check_scan_shape(scan: &LidarScan) -> Result<(), SafeCtrlError> {
    if scan.bearings_rad.len() != scan.ranges_m.len() {
        return Err(SafeCtrlError::ScanShapeMismatch {
            num_bearings: scan.bearings_rad.len(),
            num_ranges: scan.ranges_m.len(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;

    fn scan(bearings_rad: Vec<f64>, ranges_m: Vec<f64>) -> LidarScan {
        LidarScan {
            bearings_rad,
            ranges_m,
            max_range_m: 30.0,
        }
    }

    fn moving_state(vx: f64, vy: f64) -> QuadState {
        QuadState {
            velocity_ms: Vector3::new(vx, vy, 0.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_range_margin_h() {
        let model = BarrierModel::RangeMargin;
        let scan = scan(vec![0.0, std::f64::consts::FRAC_PI_2], vec![1.0, 5.0]);

        let barrier = model
            .compute_barrier(&QuadState::default(), &scan, 2.0)
            .unwrap();

        assert_eq!(barrier.len(), 2);

        // 1 m range against a 2 m safety distance is a violated margin
        assert!((barrier.h_m[0] + 1.0).abs() < 1e-12);
        assert!((barrier.h_m[1] - 3.0).abs() < 1e-12);
        assert!((barrier.min_h_m() + 1.0).abs() < 1e-12);

        // Zero velocity closes no margin
        assert_eq!(barrier.hd_ms, vec![0.0, 0.0]);
    }

    #[test]
    fn test_range_margin_hd_projection() {
        let model = BarrierModel::RangeMargin;

        // Beam at bearing 0 points along +Y, beam at pi/2 along +X
        let scan = scan(vec![0.0, std::f64::consts::FRAC_PI_2], vec![10.0, 10.0]);
        let state = moving_state(1.0, 2.0);

        let barrier = model.compute_barrier(&state, &scan, 2.0).unwrap();

        // Flying at +2 m/s along +Y closes the bearing-0 margin at 2 m/s
        assert!((barrier.hd_ms[0] + 2.0).abs() < 1e-12);
        // Flying at +1 m/s along +X closes the bearing-pi/2 margin at 1 m/s
        assert!((barrier.hd_ms[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_detection_sentinel() {
        let model = BarrierModel::RangeMargin;
        let scan = scan(vec![0.0, 1.0], vec![30.0, 30.0]);

        let barrier = model
            .compute_barrier(&QuadState::default(), &scan, 2.0)
            .unwrap();

        assert_eq!(barrier.h_m, vec![NO_DETECTION_MARGIN_M; 2]);
    }

    #[test]
    fn test_scan_shape_mismatch_fails_fast() {
        let model = BarrierModel::RangeMargin;
        let scan = scan(vec![0.0, 1.0, 2.0], vec![5.0, 5.0]);

        let result = model.compute_barrier(&QuadState::default(), &scan, 2.0);

        assert!(matches!(
            result,
            Err(SafeCtrlError::ScanShapeMismatch {
                num_bearings: 3,
                num_ranges: 2
            })
        ));
    }

    #[test]
    fn test_superellipsoid_single_constraint() {
        let model = BarrierModel::Superellipsoid {
            a_m: 1.0,
            b_m: 1.0,
            centre_m: [0.0, 0.0],
        };

        let state = QuadState {
            position_m: Vector3::new(2.0, 0.0, 0.0),
            velocity_ms: Vector3::new(-1.0, 0.0, 0.0),
            ..Default::default()
        };

        let scan = scan(vec![0.0], vec![30.0]);
        let barrier = model.compute_barrier(&state, &scan, 2.0).unwrap();

        assert_eq!(barrier.len(), 1);

        // h = 2^4 - 2 = 14, hd = 4*2^3*(-1) = -32
        assert!((barrier.h_m[0] - 14.0).abs() < 1e-12);
        assert!((barrier.hd_ms[0] + 32.0).abs() < 1e-12);
    }

    #[test]
    fn test_fallback_unconstrained() {
        let model = BarrierModel::RangeMargin;
        let scan = scan(vec![0.0, 1.0], vec![-1.0, 5.0]);
        let state = moving_state(0.0, 1.0);

        let barrier = model.fallback_barrier(&state, &scan, 2.0).unwrap();

        // Every direction unconstrained regardless of the (invalid) ranges
        assert_eq!(barrier.h_m, vec![NO_DETECTION_MARGIN_M; 2]);

        // Range rates still follow the kinematics
        assert!((barrier.hd_ms[0] + 1.0).abs() < 1e-12);
    }
}
