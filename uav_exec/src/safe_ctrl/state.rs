//! Implementations for the SafeCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use super::barrier::BarrierVector;
use super::constraints::build_constraints;
use super::nominal::nominal_acc;
use super::qp::{solve_safe, InfeasiblePolicy, QpResult};
use super::{Params, SafeCtrlError};
use crate::dynamics::QuadState;
use crate::lidar_sim::LidarScan;
use util::{
    archive::{Archived, Archiver},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Safe control module state
#[derive(Default)]
pub struct SafeCtrl {
    pub(crate) params: Params,

    pub(crate) report: StatusReport,
    arch_report: Archiver,

    /// Barrier vector of the last accepted scan, reused if a scan is
    /// rejected as degenerate.
    pub(crate) prev_barrier: Option<BarrierVector>,

    pub(crate) output: Option<OutputData>,
    arch_output: Archiver,
}

/// Input data to Safe Control.
///
/// Both members must be from the current cycle: the pre-step state and the
/// scan taken at that state.
pub struct InputData {
    /// The vehicle state at the start of the cycle.
    pub state: QuadState,

    /// The lidar scan taken at that state.
    pub scan: LidarScan,
}

/// Output command from SafeCtrl that the dynamics integrator must execute.
#[derive(Clone, Copy, Serialize, Debug)]
pub struct OutputData {
    /// The safety-filtered planar acceleration demand.
    ///
    /// Units: meters/second^2
    pub acc_dem_ms2: [f64; 2],

    /// The unfiltered nominal command, kept for comparison archives.
    ///
    /// Units: meters/second^2
    pub nom_acc_ms2: [f64; 2],
}

impl Default for OutputData {
    fn default() -> Self {
        OutputData {
            acc_dem_ms2: [0.0; 2],
            nom_acc_ms2: [0.0; 2],
        }
    }
}

/// Status report for SafeCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// The smallest barrier margin over all sensed directions.
    ///
    /// Units: meters
    pub min_margin_m: f64,

    /// True if the nominal command was saturated this cycle.
    pub nominal_saturated: bool,

    /// True if the scan was rejected as degenerate this cycle.
    pub scan_rejected: bool,

    /// True if the QP was infeasible and the fallback policy was applied.
    pub qp_fallback: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for SafeCtrl {
    type InitData = &'static str;
    type InitError = SafeCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = SafeCtrlError;

    /// Initialise the SafeCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        // Load the parameters
        self.params = match params::load(init_data) {
            Ok(p) => p,
            Err(e) => return Err(SafeCtrlError::ParamLoadError(e)),
        };

        // Create the arch folder for safe_ctrl
        let mut arch_path = session.arch_root.clone();
        arch_path.push("safe_ctrl");
        std::fs::create_dir_all(arch_path).unwrap();

        // Initialise the archivers
        self.arch_report = Archiver::from_path(
            session, "safe_ctrl/status_report.csv"
        ).unwrap();
        self.arch_output = Archiver::from_path(
            session, "safe_ctrl/output.csv"
        ).unwrap();

        Ok(())
    }

    /// Perform cyclic processing of Safe Control.
    ///
    /// The steps are strictly ordered: barrier computation, constraint
    /// assembly, nominal command, QP solve. Barrier and constraints always
    /// use the pre-step state and the current-cycle scan from the input.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        // Clear the status report
        self.report = StatusReport::default();

        // Compute the barrier vector, applying the degenerate-scan policy
        let barrier = self.get_barrier(input_data)?;
        self.report.min_margin_m = barrier.min_h_m();

        // Assemble the constraint system
        let constraints = build_constraints(
            &self.params.barrier_model,
            &input_data.state,
            &input_data.scan,
            &barrier,
            self.params.barrier_k_p,
            self.params.barrier_k_d,
        )?;

        // Compute the nominal goal-tracking command
        let (nom_acc_ms2, saturated) = nominal_acc(&input_data.state, &self.params);
        self.report.nominal_saturated = saturated;

        // Filter the command through the QP, or bypass entirely
        let acc_dem_ms2 = if self.params.use_safety_filter {
            match solve_safe(&nom_acc_ms2, &constraints)? {
                QpResult::Optimal(u) => u,
                QpResult::Infeasible => {
                    self.report.qp_fallback = true;
                    warn!(
                        "Safety QP infeasible, applying {:?} fallback",
                        self.params.infeasible_policy
                    );

                    match self.params.infeasible_policy {
                        InfeasiblePolicy::Stop => Vector2::zeros(),
                        InfeasiblePolicy::HoldNominal => nom_acc_ms2,
                    }
                }
            }
        } else {
            nom_acc_ms2
        };

        let output = OutputData {
            acc_dem_ms2: [acc_dem_ms2[0], acc_dem_ms2[1]],
            nom_acc_ms2: [nom_acc_ms2[0], nom_acc_ms2[1]],
        };

        // Update the output in self
        self.output = Some(output);

        Ok((output, self.report))
    }
}

impl Archived for SafeCtrl {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_report.serialise(self.report)?;
        self.arch_output.serialise(self.output)?;

        Ok(())
    }
}

impl SafeCtrl {
    /// Build a SafeCtrl directly from a parameter value, without archiving.
    ///
    /// Used by the evaluation tooling and benchmarks, where several module
    /// instances share one session.
    pub fn with_params(params: Params) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// The goal position being tracked.
    ///
    /// Units: meters
    pub fn goal_m(&self) -> Vector2<f64> {
        Vector2::from(self.params.goal_m)
    }

    /// Enable or disable the safety filter.
    ///
    /// With the filter disabled the nominal command is passed through
    /// unmodified, the baseline for unfiltered-comparison runs.
    pub fn set_filter_enabled(&mut self, enabled: bool) {
        self.params.use_safety_filter = enabled;
    }

    /// Get the barrier vector for this cycle.
    ///
    /// A degenerate scan (negative or non-finite range) is rejected rather
    /// than allowed to poison the QP: the previous cycle's barrier vector is
    /// reused if one exists, otherwise every direction is treated as
    /// unconstrained.
    fn get_barrier(&mut self, input_data: &InputData)
        -> Result<BarrierVector, SafeCtrlError>
    {
        if input_data.scan.is_degenerate() {
            self.report.scan_rejected = true;

            match self.prev_barrier.clone() {
                Some(b) => Ok(b),
                None => self.params.barrier_model.fallback_barrier(
                    &input_data.state,
                    &input_data.scan,
                    self.params.safety_dist_m,
                ),
            }
        } else {
            let barrier = self.params.barrier_model.compute_barrier(
                &input_data.state,
                &input_data.scan,
                self.params.safety_dist_m,
            )?;

            self.prev_barrier = Some(barrier.clone());

            Ok(barrier)
        }
    }
}
