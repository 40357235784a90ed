//! # Safety Evaluation
//!
//! This binary compares a filtered and an unfiltered run of the same
//! scenario. Both trials fly the identical start state, goal, and obstacle
//! world; the only difference is whether the safety filter is enabled. Each
//! cycle the distance to the closest obstacle is measured with a dense
//! evaluation lidar (much finer than the one the controller flies with) and
//! both series are written to a CSV file in the session directory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::info;
use nalgebra::{Vector2, Vector3};
use serde::Serialize;

// Internal
use uav_lib::{
    dynamics::{self, Dynamics, QuadState},
    lidar_sim::{self, LidarSim},
    params::SimParams,
    safe_ctrl::{self, SafeCtrl},
};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of beams in the dense evaluation lidar.
const NUM_EVAL_BEAMS: usize = 90;

/// Number of cycles per trial.
const NUM_EVAL_CYCLES: u64 = 2000;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One row of the output CSV.
#[derive(Serialize)]
struct ClosestRecord {
    cycle: u64,
    filtered_m: f64,
    unfiltered_m: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    let session =
        Session::new("eval_safety", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Safety Evaluation\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let sim_params: SimParams =
        util::params::load("sim.toml").wrap_err("Could not load sim params")?;
    let safe_ctrl_params: safe_ctrl::Params =
        util::params::load("safe_ctrl.toml").wrap_err("Could not load safe ctrl params")?;
    let dynamics_params: dynamics::Params =
        util::params::load("dynamics.toml").wrap_err("Could not load dynamics params")?;
    let lidar_params: lidar_sim::Params =
        util::params::load("lidar_sim.toml").wrap_err("Could not load lidar params")?;

    // ---- RUN TRIALS ----

    info!("Running filtered trial ({} cycles)", NUM_EVAL_CYCLES);
    let filtered = run_trial(
        true,
        &sim_params,
        &safe_ctrl_params,
        &dynamics_params,
        &lidar_params,
    )?;

    info!("Running unfiltered trial ({} cycles)", NUM_EVAL_CYCLES);
    let unfiltered = run_trial(
        false,
        &sim_params,
        &safe_ctrl_params,
        &dynamics_params,
        &lidar_params,
    )?;

    // ---- WRITE RESULTS ----

    let mut csv_path = session.session_root.clone();
    csv_path.push("closest_obstacle.csv");

    let mut writer =
        csv::Writer::from_path(&csv_path).wrap_err("Could not create the results file")?;

    for (i, (filtered_m, unfiltered_m)) in
        filtered.iter().zip(unfiltered.iter()).enumerate()
    {
        writer
            .serialize(ClosestRecord {
                cycle: i as u64 + 1,
                filtered_m: *filtered_m,
                unfiltered_m: *unfiltered_m,
            })
            .wrap_err("Could not write a results record")?;
    }
    writer.flush().wrap_err("Could not flush the results file")?;

    info!("Results written to {:?}", csv_path);
    info!(
        "Closest approach: filtered {:.3} m, unfiltered {:.3} m",
        filtered.iter().cloned().fold(f64::INFINITY, f64::min),
        unfiltered.iter().cloned().fold(f64::INFINITY, f64::min)
    );

    session.exit();

    Ok(())
}

/// Run one trial and return the closest-obstacle distance per cycle.
fn run_trial(
    filter_enabled: bool,
    sim_params: &SimParams,
    safe_ctrl_params: &safe_ctrl::Params,
    dynamics_params: &dynamics::Params,
    lidar_params: &lidar_sim::Params,
) -> Result<Vec<f64>, Report> {
    let mut params = safe_ctrl_params.clone();
    params.use_safety_filter = filter_enabled;

    let mut ctrl = SafeCtrl::with_params(params);
    let dynamics = Dynamics::new(dynamics_params.clone());

    // The controller flies with the configured sensor, the evaluation uses a
    // dense one against the same obstacle world
    let mut lidar = LidarSim::new(lidar_params.clone());

    let eval_bearings_rad = (0..NUM_EVAL_BEAMS)
        .map(|i| (i as f64 * 360.0 / NUM_EVAL_BEAMS as f64).to_radians())
        .collect();
    let mut eval_lidar = LidarSim::with_bearings(lidar_params.clone(), eval_bearings_rad);

    let mut state = QuadState {
        position_m: Vector3::from(sim_params.start_position_m),
        ..Default::default()
    };

    lidar.update(&state.position2_m());

    let mut closest_m = Vec::with_capacity(NUM_EVAL_CYCLES as usize);

    for _ in 0..NUM_EVAL_CYCLES {
        let input = safe_ctrl::InputData {
            state,
            scan: lidar.scan().clone(),
        };

        let (output, _) = ctrl.proc(&input).wrap_err("SafeCtrl processing failed")?;

        state = dynamics.step(&state, &Vector2::from(output.acc_dem_ms2));
        lidar.update(&state.position2_m());

        let eval_scan = eval_lidar.update(&state.position2_m());
        closest_m.push(eval_scan.min_range_m());
    }

    Ok(closest_m)
}
