//! # Safety QP module
//!
//! This module wraps the OSQP backend to project the nominal command onto
//! the safe set. The problem solved each cycle is
//!
//! ```text
//! minimise   0.5*u'*u - u_nom'*u
//! subject to b <= A*u <= +inf
//! ```
//!
//! which is the standard-form rendering of the Euclidean projection of
//! `u_nom` onto `{u : A*u >= b}`. The problem is strictly convex so the
//! optimum is unique whenever the feasible set is non-empty.
//!
//! A fresh problem instance is set up for every solve, no solver state is
//! carried between cycles. Infeasibility is reported to the caller, which
//! applies the configured fallback policy, the solve itself never produces
//! an undefined command.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use nalgebra::{DMatrix, Vector2};
use osqp::{CscMatrix, Problem, Settings, Status};
use serde::Deserialize;
use std::borrow::Cow;

// Internal
use super::constraints::ConstraintSystem;
use super::SafeCtrlError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Fallback behaviour when the safety QP has no feasible solution, which
/// can occur when the vehicle is already inside the safety margin along one
/// beam with no relieving direction.
#[derive(Debug, Copy, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfeasiblePolicy {
    /// Command zero acceleration.
    Stop,

    /// Pass the nominal command through unfiltered.
    HoldNominal,
}

/// Outcome of a safety QP solve.
#[derive(Debug, Clone, PartialEq)]
pub enum QpResult {
    /// The unique optimum of the projection.
    Optimal(Vector2<f64>),

    /// No command satisfies every constraint.
    Infeasible,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Project the nominal command onto the constraint set.
///
/// Returns the optimal command, or `QpResult::Infeasible` if the constraint
/// set is empty of solutions. Solver terminations which yield no reliable
/// optimum (iteration or time limits) are treated as infeasible so that the
/// caller's fallback policy always applies.
pub fn solve_safe(
    u_nom: &Vector2<f64>,
    constraints: &ConstraintSystem,
) -> Result<QpResult, SafeCtrlError> {
    constraints.check_shape()?;

    let num_constraints = constraints.num_constraints();
    if num_constraints == 0 {
        // Nothing binds, the projection is the identity
        return Ok(QpResult::Optimal(*u_nom));
    }

    // Objective: P = identity, q = -u_nom
    let p_mat = dense_to_csc(&DMatrix::identity(2, 2));
    let q = [-u_nom[0], -u_nom[1]];

    // Constraints: b <= A*u <= +inf
    let a_mat = dense_to_csc(&constraints.a_mat);
    let lower: Vec<f64> = constraints.b_vec.iter().cloned().collect();
    let upper = vec![f64::INFINITY; num_constraints];

    let settings = Settings::default()
        .verbose(false)
        .eps_abs(1e-6)
        .eps_rel(1e-6)
        .polish(true);

    let mut problem = Problem::new(p_mat, &q, a_mat, &lower, &upper, &settings)
        .map_err(|e| SafeCtrlError::QpSetupError(format!("{:?}", e)))?;

    match problem.solve() {
        Status::Solved(solution) => {
            let x = solution.x();
            Ok(QpResult::Optimal(Vector2::new(x[0], x[1])))
        }
        Status::SolvedInaccurate(solution) => {
            warn!("Safety QP solved to reduced accuracy");
            let x = solution.x();
            Ok(QpResult::Optimal(Vector2::new(x[0], x[1])))
        }
        Status::PrimalInfeasible(_) | Status::PrimalInfeasibleInaccurate(_) => {
            Ok(QpResult::Infeasible)
        }
        _ => {
            warn!("Safety QP terminated without an optimum, treating as infeasible");
            Ok(QpResult::Infeasible)
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a dense matrix into the compressed sparse column form the
/// backend consumes. Explicit zeros are dropped.
fn dense_to_csc(mat: &DMatrix<f64>) -> CscMatrix<'static> {
    let nrows = mat.nrows();
    let ncols = mat.ncols();

    let mut indptr = Vec::with_capacity(ncols + 1);
    let mut indices = Vec::new();
    let mut data = Vec::new();

    indptr.push(0);
    for j in 0..ncols {
        for i in 0..nrows {
            let value = mat[(i, j)];
            if value != 0.0 {
                indices.push(i);
                data.push(value);
            }
        }
        indptr.push(indices.len());
    }

    CscMatrix {
        nrows,
        ncols,
        indptr: Cow::Owned(indptr),
        indices: Cow::Owned(indices),
        data: Cow::Owned(data),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::DVector;

    /// Solver tolerance used in the assertions. Looser than the configured
    /// termination tolerances to leave headroom.
    const TOL: f64 = 1e-4;

    fn system(rows: Vec<[f64; 2]>, b: Vec<f64>) -> ConstraintSystem {
        let flat: Vec<f64> = rows.iter().flatten().cloned().collect();
        ConstraintSystem {
            a_mat: DMatrix::from_row_slice(rows.len(), 2, &flat),
            b_vec: DVector::from_vec(b),
        }
    }

    #[test]
    fn test_dense_to_csc() {
        let mat = DMatrix::from_row_slice(2, 2, &[0.0, -1.0, 2.0, 0.0]);
        let csc = dense_to_csc(&mat);

        assert_eq!(csc.nrows, 2);
        assert_eq!(csc.ncols, 2);
        assert_eq!(csc.indptr.as_ref(), &[0, 1, 2]);
        assert_eq!(csc.indices.as_ref(), &[1, 0]);
        assert_eq!(csc.data.as_ref(), &[2.0, -1.0]);
    }

    #[test]
    fn test_inactive_constraints_return_nominal() {
        let u_nom = Vector2::new(0.3, -0.2);

        // A single far-from-binding constraint
        let constraints = system(vec![[0.0, -1.0]], vec![-1.0e3]);

        match solve_safe(&u_nom, &constraints).unwrap() {
            QpResult::Optimal(u) => {
                assert!((u - u_nom).norm() < TOL);
            }
            QpResult::Infeasible => panic!("expected an optimum"),
        }
    }

    #[test]
    fn test_projection_onto_active_constraint() {
        // -uy >= 0.5, i.e. uy <= -0.5
        let constraints = system(vec![[0.0, -1.0]], vec![0.5]);
        let u_nom = Vector2::new(0.2, 0.0);

        match solve_safe(&u_nom, &constraints).unwrap() {
            QpResult::Optimal(u) => {
                // Projection moves only the constrained component
                assert!((u[0] - 0.2).abs() < TOL);
                assert!((u[1] + 0.5).abs() < TOL);
                assert!(constraints.is_satisfied_by(&u, TOL));
            }
            QpResult::Infeasible => panic!("expected an optimum"),
        }
    }

    #[test]
    fn test_all_constraints_satisfied() {
        let constraints = system(
            vec![[0.0, -1.0], [-1.0, 0.0], [0.7071, 0.7071]],
            vec![0.3, -0.1, -0.5],
        );
        let u_nom = Vector2::new(0.8, 0.9);

        match solve_safe(&u_nom, &constraints).unwrap() {
            QpResult::Optimal(u) => {
                assert!(constraints.is_satisfied_by(&u, TOL));
            }
            QpResult::Infeasible => panic!("expected an optimum"),
        }
    }

    #[test]
    fn test_solve_is_deterministic() {
        let constraints = system(vec![[0.0, -1.0], [-1.0, 0.0]], vec![0.5, 0.2]);
        let u_nom = Vector2::new(1.0, 1.0);

        let first = solve_safe(&u_nom, &constraints).unwrap();
        let second = solve_safe(&u_nom, &constraints).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_infeasible_detected() {
        // uy >= 1 and -uy >= 1 cannot both hold
        let constraints = system(vec![[0.0, 1.0], [0.0, -1.0]], vec![1.0, 1.0]);
        let u_nom = Vector2::zeros();

        assert_eq!(
            solve_safe(&u_nom, &constraints).unwrap(),
            QpResult::Infeasible
        );
    }

    #[test]
    fn test_violated_margin_pushes_away() {
        // Obstacle dead ahead along +Y inside the safety margin: the decay
        // condition demands -uy >= 3, so the command must accelerate away
        // from the obstacle regardless of the nominal.
        let constraints = system(vec![[0.0, -1.0]], vec![3.0]);
        let u_nom = Vector2::zeros();

        match solve_safe(&u_nom, &constraints).unwrap() {
            QpResult::Optimal(u) => {
                assert!(u[1] <= -3.0 + TOL);
                assert!(constraints.is_satisfied_by(&u, TOL));
            }
            QpResult::Infeasible => panic!("expected an optimum"),
        }
    }
}
