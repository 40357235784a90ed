//! Main simulation executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Read the vehicle state and the current lidar scan
//!         - Safe control processing (barrier, constraints, nominal, QP)
//!         - Dynamics propagation with the filtered command
//!         - Sensor update at the new state
//!
//! The ordering inside the loop is load-bearing: the safety filter always
//! sees the pre-step state together with the scan taken at that state, never
//! a stale or future reading.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use uav_lib::{
    data_store::DataStore, dynamics::Dynamics, lidar_sim::LidarSim, params::SimParams, safe_ctrl,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use nalgebra::{Vector2, Vector3};
use rand::Rng;

// Internal
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("uav_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Argus UAV Safe Control Simulation\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let sim_params: SimParams =
        util::params::load("sim.toml").wrap_err("Could not load sim params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    ds.safe_ctrl
        .init("safe_ctrl.toml", &session)
        .wrap_err("Failed to initialise SafeCtrl")?;
    info!("SafeCtrl init complete");

    let dynamics = Dynamics::new(
        util::params::load("dynamics.toml").wrap_err("Could not load dynamics params")?,
    );

    let mut lidar_sim = LidarSim::new(
        util::params::load("lidar_sim.toml").wrap_err("Could not load lidar params")?,
    );

    info!("Module initialisation complete\n");

    // ---- SET INITIAL STATE ----

    ds.quad_state.position_m = Vector3::from(sim_params.start_position_m);

    // Take the initial scan at the starting state so the first cycle has a
    // current-cycle reading
    lidar_sim.update(&ds.quad_state.position2_m());

    let mut rng = rand::thread_rng();

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        ds.cycle_start(dynamics.dt_s());

        // Optional random-walk position noise, mocking localisation drift
        if sim_params.state_noise_variance_m > 0.0 {
            ds.quad_state.position_m[0] +=
                (rng.gen::<f64>() - 0.5) * sim_params.state_noise_variance_m;
            ds.quad_state.position_m[1] +=
                (rng.gen::<f64>() - 0.5) * sim_params.state_noise_variance_m;
        }

        // ---- SAFE CONTROL PROCESSING ----

        // The filter consumes the pre-step state and the scan taken at it
        let input = safe_ctrl::InputData {
            state: ds.quad_state,
            scan: lidar_sim.scan().clone(),
        };

        let (output, report) = ds
            .safe_ctrl
            .proc(&input)
            .wrap_err("SafeCtrl processing failed")?;

        ds.safe_ctrl_output = Some(output);
        ds.safe_ctrl_status_rpt = report;

        // ---- DYNAMICS PROPAGATION ----

        let acc_dem_ms2 = Vector2::from(output.acc_dem_ms2);
        ds.quad_state = dynamics.step(&ds.quad_state, &acc_dem_ms2);

        // ---- SENSOR UPDATE ----

        // Advance the lidar with the post-step state, ready for the next
        // cycle
        lidar_sim.update(&ds.quad_state.position2_m());

        // ---- ARCHIVING ----

        if let Err(e) = ds.safe_ctrl.write() {
            warn!("Could not write SafeCtrl archives: {}", e);
        }

        ds.state_hist.push([
            ds.quad_state.position_m[0],
            ds.quad_state.position_m[1],
            ds.quad_state.position_m[2],
        ]);
        ds.min_margin_hist.push(report.min_margin_m);

        // ---- MONITORING ----

        let dist_to_goal_m = (ds.quad_state.position2_m() - ds.safe_ctrl.goal_m()).norm();

        if ds.num_cycles % sim_params.status_log_period_cycles == 0 {
            info!(
                "Cycle {} ({:.1} s): position [{:.2}, {:.2}] m, {:.2} m to goal, min margin {:.2} m",
                ds.num_cycles,
                ds.sim_time_s,
                ds.quad_state.position_m[0],
                ds.quad_state.position_m[1],
                dist_to_goal_m,
                report.min_margin_m
            );
        }

        if dist_to_goal_m < sim_params.goal_threshold_m {
            info!(
                "Goal reached after {} cycles ({:.1} s)",
                ds.num_cycles, ds.sim_time_s
            );
            break;
        }

        if ds.num_cycles >= sim_params.max_cycles {
            warn!(
                "Cycle limit ({}) reached before the goal",
                sim_params.max_cycles
            );
            break;
        }
    }

    // ---- SAVE & EXIT ----

    session.save("state_hist.json", ds.state_hist.clone());
    session.save("min_margin_hist.json", ds.min_margin_hist.clone());

    session.exit();

    Ok(())
}
