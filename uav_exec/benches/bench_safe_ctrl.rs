//! # Safe Control Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use nalgebra::Vector3;
use uav_lib::{
    dynamics::QuadState,
    lidar_sim::LidarScan,
    safe_ctrl::{InputData, Params, SafeCtrl},
};
use util::module::State;

fn safe_ctrl_benchmark(c: &mut Criterion) {
    // ---- Build a representative cycle input ----

    // Six beams, two of them near obstacles so the QP has active constraints
    let bearings_rad: Vec<f64> = (0..6).map(|i| (i as f64 * 60.0).to_radians()).collect();
    let ranges_m = vec![2.5, 30.0, 30.0, 3.0, 30.0, 30.0];

    let scan = LidarScan {
        bearings_rad,
        ranges_m,
        max_range_m: 30.0,
    };

    let state = QuadState {
        position_m: Vector3::new(15.0, 20.0, 10.0),
        velocity_ms: Vector3::new(0.4, 0.6, 0.0),
        ..Default::default()
    };

    let input = InputData { state, scan };

    let mut safe_ctrl = SafeCtrl::with_params(Params::default());

    c.bench_function("safe_ctrl cycle", |b| {
        b.iter(|| safe_ctrl.proc(&input).unwrap())
    });
}

criterion_group!(benches, safe_ctrl_benchmark);
criterion_main!(benches);
