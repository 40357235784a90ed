//! # Nominal controller module
//!
//! The nominal controller computes the unconstrained goal-tracking
//! acceleration, entirely ignoring obstacles. It is a two-gain cascade: the
//! position error commands a desired velocity, the velocity error commands
//! the acceleration. The output norm is saturated to keep the QP's
//! unconstrained reference well conditioned, the cap is a tuning parameter
//! rather than an actuator limit.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;

// Internal
use super::Params;
use crate::dynamics::QuadState;
use util::maths::saturate_norm;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the nominal goal-tracking acceleration.
///
/// Returns the (saturated) command and a flag which is true if the
/// saturation limit was applied.
pub fn nominal_acc(state: &QuadState, params: &Params) -> (Vector2<f64>, bool) {
    let goal_m = Vector2::from(params.goal_m);

    let vel_dem_ms = params.nom_k_pos * (state.position2_m() - goal_m);
    let acc_ms2 = params.nom_k_vel * (state.velocity2_ms() - vel_dem_ms);

    saturate_norm(acc_ms2, params.nom_acc_sat_ms2)
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_accelerates_towards_goal_from_rest() {
        let params = Params::default();

        let state = QuadState {
            position_m: Vector3::new(0.0, 0.0, 10.0),
            ..Default::default()
        };

        let (acc, _) = nominal_acc(&state, &params);

        // From rest, the command must point from the position towards the
        // goal (both gains are negative)
        let to_goal = Vector2::from(params.goal_m);
        let cos_angle = acc.dot(&to_goal) / (acc.norm() * to_goal.norm());
        assert!((cos_angle - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_at_goal_at_rest() {
        let params = Params::default();

        let state = QuadState {
            position_m: Vector3::new(params.goal_m[0], params.goal_m[1], 10.0),
            ..Default::default()
        };

        let (acc, saturated) = nominal_acc(&state, &params);

        assert_eq!(acc, Vector2::zeros());
        assert!(!saturated);
    }

    #[test]
    fn test_saturation_preserves_direction() {
        let params = Params {
            goal_m: [1000.0, 0.0],
            ..Default::default()
        };

        let state = QuadState::default();
        let (acc, saturated) = nominal_acc(&state, &params);

        // Far from the goal the raw command is far over the cap
        assert!(saturated);
        assert!((acc.norm() - params.nom_acc_sat_ms2).abs() < 1e-12);

        // Direction is unchanged: straight along +X
        assert!((acc[0] - params.nom_acc_sat_ms2).abs() < 1e-12);
        assert!(acc[1].abs() < 1e-12);
    }

    #[test]
    fn test_unsaturated_values() {
        let params = Params {
            goal_m: [10.0, 0.0],
            nom_k_pos: -0.08,
            nom_k_vel: -0.2,
            ..Default::default()
        };

        let state = QuadState {
            position_m: Vector3::new(0.0, 0.0, 10.0),
            velocity_ms: Vector3::new(0.1, 0.0, 0.0),
            ..Default::default()
        };

        let (acc, saturated) = nominal_acc(&state, &params);

        // vd = -0.08 * (0 - 10) = 0.8, u = -0.2 * (0.1 - 0.8) = 0.14
        assert!(!saturated);
        assert!((acc[0] - 0.14).abs() < 1e-12);
        assert!(acc[1].abs() < 1e-12);
    }
}
