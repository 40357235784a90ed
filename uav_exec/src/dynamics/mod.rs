//! # Dynamics module
//!
//! This module propagates the vehicle state under a commanded planar
//! acceleration. The vehicle is modelled as a point mass flying at constant
//! altitude with a level attitude, integrated with the semi-implicit Euler
//! scheme. Attitude dynamics inversion and motor mixing are deliberately not
//! modelled, the controller commands accelerations directly.
//!
//! `step` is a pure function, it takes the current state and a command and
//! returns the next state without side effects.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

// Internal
pub use params::Params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The full kinematic state of the vehicle.
///
/// The state is owned by the simulation driver. It is mutated only by
/// [`Dynamics::step`] between cycles and is read (never mutated) by the
/// controller modules.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize)]
pub struct QuadState {
    /// Position in the world frame.
    ///
    /// Units: meters
    pub position_m: Vector3<f64>,

    /// Velocity in the world frame.
    ///
    /// Units: meters/second
    pub velocity_ms: Vector3<f64>,

    /// Attitude as roll, pitch, yaw angles.
    ///
    /// Units: radians
    pub attitude_rad: Vector3<f64>,

    /// Angular velocity about the body axes.
    ///
    /// Units: radians/second
    pub ang_vel_rads: Vector3<f64>,
}

/// The dynamics integrator.
pub struct Dynamics {
    params: Params,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl QuadState {
    /// Get the planar (XY) position of the vehicle.
    pub fn position2_m(&self) -> Vector2<f64> {
        Vector2::new(self.position_m[0], self.position_m[1])
    }

    /// Get the planar (XY) velocity of the vehicle.
    pub fn velocity2_ms(&self) -> Vector2<f64> {
        Vector2::new(self.velocity_ms[0], self.velocity_ms[1])
    }
}

impl Dynamics {
    /// Create a new integrator from the parameters.
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// The integration time step.
    ///
    /// Units: seconds
    pub fn dt_s(&self) -> f64 {
        self.params.dt_s
    }

    /// Propagate the state one time step under the given planar acceleration
    /// demand.
    ///
    /// Semi-implicit Euler: the velocity is updated first and the new
    /// velocity is used to update the position. Altitude and attitude are
    /// held.
    pub fn step(&self, state: &QuadState, acc_dem_ms2: &Vector2<f64>) -> QuadState {
        let dt_s = self.params.dt_s;

        let mut next = *state;

        next.velocity_ms[0] += acc_dem_ms2[0] * dt_s;
        next.velocity_ms[1] += acc_dem_ms2[1] * dt_s;

        next.position_m += next.velocity_ms * dt_s;

        next
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_step_constant_acc() {
        let dynamics = Dynamics::new(Params { dt_s: 0.1 });

        let mut state = QuadState::default();
        let acc = Vector2::new(1.0, -2.0);

        for _ in 0..10 {
            state = dynamics.step(&state, &acc);
        }

        // After 1 s of constant acceleration the velocity is exactly a*t
        assert!((state.velocity_ms[0] - 1.0).abs() < 1e-12);
        assert!((state.velocity_ms[1] + 2.0).abs() < 1e-12);

        // Semi-implicit Euler overshoots the analytic a*t^2/2 by a*t*dt/2
        assert!((state.position_m[0] - 0.55).abs() < 1e-12);
        assert!((state.position_m[1] + 1.10).abs() < 1e-12);

        // Altitude and attitude are held
        assert_eq!(state.position_m[2], 0.0);
        assert_eq!(state.attitude_rad, nalgebra::Vector3::zeros());
    }

    #[test]
    fn test_step_is_pure() {
        let dynamics = Dynamics::new(Params { dt_s: 0.05 });

        let state = QuadState {
            position_m: Vector3::new(1.0, 2.0, 10.0),
            velocity_ms: Vector3::new(0.5, -0.5, 0.0),
            ..Default::default()
        };

        let next_a = dynamics.step(&state, &Vector2::new(0.1, 0.1));
        let next_b = dynamics.step(&state, &Vector2::new(0.1, 0.1));

        // The input state is untouched and the output deterministic
        assert_eq!(state.position_m, Vector3::new(1.0, 2.0, 10.0));
        assert_eq!(next_a.position_m, next_b.position_m);
        assert_eq!(next_a.velocity_ms, next_b.velocity_ms);
    }
}
