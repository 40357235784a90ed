//! # Constraint assembly module
//!
//! This module converts the barrier values and derivatives into the linear
//! inequality `A*u >= b` consumed by the safety QP. Row `i` of `A` is the
//! barrier gradient with respect to the acceleration command and `b_i`
//! collects the exponential decay condition `Kp*h_i + Kd*hd_i` together with
//! any velocity-dependent curvature terms of the chosen barrier geometry.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector};

// Internal
use super::barrier::{BarrierModel, BarrierVector};
use super::SafeCtrlError;
use crate::dynamics::QuadState;
use crate::lidar_sim::LidarScan;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Dimension of the planar acceleration command.
pub const CTRL_DIM: usize = 2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The linear inequality system `A*u >= b` encoding the safety requirement.
///
/// One row per constraint direction, one column per control dimension.
/// Recomputed every cycle, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSystem {
    pub a_mat: DMatrix<f64>,
    pub b_vec: DVector<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ConstraintSystem {
    /// Number of constraint rows.
    pub fn num_constraints(&self) -> usize {
        self.a_mat.nrows()
    }

    /// Verify the internal dimensions are consistent.
    pub fn check_shape(&self) -> Result<(), SafeCtrlError> {
        if self.a_mat.ncols() != CTRL_DIM || self.a_mat.nrows() != self.b_vec.len() {
            return Err(SafeCtrlError::ConstraintShapeMismatch {
                rows: self.a_mat.nrows(),
                cols: self.a_mat.ncols(),
                b_len: self.b_vec.len(),
            });
        }

        Ok(())
    }

    /// True if the given command satisfies every row to within `tol`.
    pub fn is_satisfied_by(&self, u: &nalgebra::Vector2<f64>, tol: f64) -> bool {
        let residual = &self.a_mat * u - &self.b_vec;
        residual.iter().all(|r| *r >= -tol)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Assemble the constraint system for the active barrier geometry.
///
/// The barrier vector must have been computed from the same state and scan
/// on this cycle, one entry per constraint direction.
pub fn build_constraints(
    model: &BarrierModel,
    state: &QuadState,
    scan: &LidarScan,
    barrier: &BarrierVector,
    k_p: f64,
    k_d: f64,
) -> Result<ConstraintSystem, SafeCtrlError> {
    let system = match model {
        BarrierModel::RangeMargin => {
            let num_h = barrier.len();

            if num_h != scan.bearings_rad.len() {
                return Err(SafeCtrlError::ScanShapeMismatch {
                    num_bearings: scan.bearings_rad.len(),
                    num_ranges: num_h,
                });
            }

            // Row i is the negative beam direction: accelerating towards the
            // obstacle decreases h.
            let a_mat = DMatrix::from_fn(num_h, CTRL_DIM, |i, j| {
                let bearing_rad = scan.bearings_rad[i];
                match j {
                    0 => -bearing_rad.sin(),
                    _ => -bearing_rad.cos(),
                }
            });

            let b_vec = DVector::from_fn(num_h, |i, _| {
                -(k_p * barrier.h_m[i] + k_d * barrier.hd_ms[i])
            });

            ConstraintSystem { a_mat, b_vec }
        }
        BarrierModel::Superellipsoid { a_m, b_m, centre_m } => {
            let rel_m = state.position2_m() - nalgebra::Vector2::from(*centre_m);
            let vel_ms = state.velocity2_ms();

            // Barrier gradient with respect to the acceleration command
            let grad = [
                4.0 * rel_m[0].powi(3) / a_m.powi(4),
                4.0 * rel_m[1].powi(3) / b_m.powi(4),
            ];

            let a_mat = DMatrix::from_row_slice(1, CTRL_DIM, &grad);

            // Velocity curvature term of the second barrier derivative
            let extra = -(12.0 * rel_m[0].powi(2) * vel_ms[0].powi(2) / a_m.powi(4)
                + 12.0 * rel_m[1].powi(2) * vel_ms[1].powi(2) / b_m.powi(4));

            let b_vec = DVector::from_element(
                1,
                extra - (k_p * barrier.h_m[0] + k_d * barrier.hd_ms[0]),
            );

            ConstraintSystem { a_mat, b_vec }
        }
    };

    system.check_shape()?;

    Ok(system)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lidar_sim::LidarScan;
    use crate::safe_ctrl::barrier::BarrierModel;
    use nalgebra::Vector3;

    fn scan(bearings_rad: Vec<f64>, ranges_m: Vec<f64>) -> LidarScan {
        LidarScan {
            bearings_rad,
            ranges_m,
            max_range_m: 30.0,
        }
    }

    /// Single beam at bearing 0 with a violated margin: the exact values of
    /// A and b are known in closed form.
    #[test]
    fn test_violated_margin_exact_values() {
        let model = BarrierModel::RangeMargin;
        let state = QuadState::default();
        let scan = scan(vec![0.0], vec![1.0]);

        let barrier = model.compute_barrier(&state, &scan, 2.0).unwrap();
        assert!((barrier.h_m[0] + 1.0).abs() < 1e-12);

        let system = build_constraints(&model, &state, &scan, &barrier, 3.0, 4.0).unwrap();

        assert_eq!(system.num_constraints(), 1);

        // A = [[-sin(0), -cos(0)]] = [[0, -1]]
        assert!(system.a_mat[(0, 0)].abs() < 1e-12);
        assert!((system.a_mat[(0, 1)] + 1.0).abs() < 1e-12);

        // b = -(Kp*(-1) + Kd*0) = Kp
        assert!((system.b_vec[0] - 3.0).abs() < 1e-12);
    }

    /// Shrinking the safety distance towards zero grows every margin and so
    /// can only lower (never raise) every b entry.
    #[test]
    fn test_safety_distance_monotonicity() {
        let model = BarrierModel::RangeMargin;
        let state = QuadState {
            velocity_ms: Vector3::new(0.3, -0.7, 0.0),
            ..Default::default()
        };
        let scan = scan(vec![0.0, 1.0, 2.0, 4.0], vec![1.0, 3.0, 8.0, 20.0]);

        let mut prev_b: Option<DVector<f64>> = None;

        for safety_dist_m in &[2.0, 1.0, 0.5, 0.0] {
            let barrier = model.compute_barrier(&state, &scan, *safety_dist_m).unwrap();
            let system = build_constraints(&model, &state, &scan, &barrier, 3.0, 4.0).unwrap();

            if let Some(prev) = prev_b {
                for i in 0..system.b_vec.len() {
                    assert!(system.b_vec[i] <= prev[i] + 1e-12);
                }
            }
            prev_b = Some(system.b_vec.clone());
        }
    }

    #[test]
    fn test_row_per_beam() {
        let model = BarrierModel::RangeMargin;
        let state = QuadState::default();
        let scan = scan(
            (0..6).map(|i| i as f64).collect(),
            vec![5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        );

        let barrier = model.compute_barrier(&state, &scan, 2.0).unwrap();
        let system = build_constraints(&model, &state, &scan, &barrier, 3.0, 4.0).unwrap();

        assert_eq!(system.a_mat.nrows(), 6);
        assert_eq!(system.a_mat.ncols(), CTRL_DIM);
        assert_eq!(system.b_vec.len(), 6);
        assert!(system.check_shape().is_ok());
    }

    #[test]
    fn test_superellipsoid_gradient_row() {
        let model = BarrierModel::Superellipsoid {
            a_m: 1.0,
            b_m: 1.0,
            centre_m: [0.0, 0.0],
        };
        let state = QuadState {
            position_m: Vector3::new(2.0, 1.0, 0.0),
            velocity_ms: Vector3::new(-1.0, 0.0, 0.0),
            ..Default::default()
        };
        let scan = scan(vec![0.0], vec![30.0]);

        let barrier = model.compute_barrier(&state, &scan, 2.0).unwrap();
        let system = build_constraints(&model, &state, &scan, &barrier, 3.0, 4.0).unwrap();

        assert_eq!(system.num_constraints(), 1);

        // grad = [4*2^3, 4*1^3] = [32, 4]
        assert!((system.a_mat[(0, 0)] - 32.0).abs() < 1e-12);
        assert!((system.a_mat[(0, 1)] - 4.0).abs() < 1e-12);

        // h = 16 + 1 - 2 = 15, hd = 4*8*(-1) = -32
        // extra = -(12*4*1) = -48
        // b = -48 - (3*15 + 4*(-32)) = -48 - (45 - 128) = 35
        assert!((system.b_vec[0] - 35.0).abs() < 1e-12);
    }
}
