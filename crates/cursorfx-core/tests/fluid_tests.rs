// Fluid engine: dissipation law, splashes and pointer-driven splats.

use cursorfx_core::fluid::MAX_DT;
use cursorfx_core::{EngineConfig, FluidConfig, FluidEngine};
use glam::Vec2;

fn small_config() -> FluidConfig {
    FluidConfig {
        sim_resolution: 32,
        dye_resolution: 64,
        ..FluidConfig::default()
    }
}

#[test]
fn dye_energy_decays_by_the_dissipation_law() {
    let config = FluidConfig {
        curl: 0.0,
        ..small_config()
    };
    let dissipation = config.density_dissipation;
    let mut fluid = FluidEngine::new(config, 800, 600).unwrap();
    fluid.splat_at_client(400.0, 300.0, Vec2::ZERO, [1.0, 0.5, 0.25]).unwrap();

    let dt = MAX_DT;
    let factor = 1.0 / (1.0 + dissipation * dt) as f64;
    let mut energy = fluid.dye_energy();
    assert!(energy > 0.0);
    for _ in 0..200 {
        fluid.step(dt);
        let next = fluid.dye_energy();
        assert!(next < energy, "energy rose from {energy} to {next}");
        let expected = energy * factor * factor;
        assert!((next - expected).abs() <= expected * 1e-3 + 1e-12);
        energy = next;
    }
}

#[test]
fn dye_converges_to_zero_after_a_splash() {
    let mut fluid = FluidEngine::new(small_config(), 800, 600).unwrap();
    fluid.splash_at_client(400.0, 300.0, Some([1.0, 0.0, 0.0]), "x").unwrap();
    let start = fluid.dye_energy();
    for _ in 0..900 {
        fluid.step(1.0 / 60.0);
    }
    assert!(fluid.dye_energy() < start * 1e-6);
}

#[test]
fn long_frames_are_clamped() {
    let config = FluidConfig {
        curl: 0.0,
        ..small_config()
    };
    let mut a = FluidEngine::new(config.clone(), 400, 400).unwrap();
    let mut b = FluidEngine::new(config, 400, 400).unwrap();
    for f in [&mut a, &mut b] {
        f.splat_at_client(200.0, 200.0, Vec2::ZERO, [1.0, 1.0, 1.0]).unwrap();
    }
    a.step(5.0);
    b.step(MAX_DT);
    assert!((a.dye_energy() - b.dye_energy()).abs() < 1e-9);
}

#[test]
fn splash_raises_energy_near_the_point() {
    let mut fluid = FluidEngine::new(small_config(), 800, 600).unwrap();
    let before = fluid.dye_energy_near(400.0, 300.0, 60.0);
    fluid.splash_at_client(400.0, 300.0, Some([1.0, 0.0, 0.0]), "x").unwrap();
    fluid.step(1.0 / 60.0);
    let after = fluid.dye_energy_near(400.0, 300.0, 60.0);
    assert!(after > before, "{after} <= {before}");
    // the far corner is untouched
    assert_eq!(fluid.dye_energy_near(0.0, 0.0, 20.0), 0.0);
}

#[test]
fn splash_rejects_malformed_coordinates() {
    let mut fluid = FluidEngine::new(small_config(), 800, 600).unwrap();
    assert!(fluid.splash_at_client(f64::NAN, 1.0, None, "x").is_err());
    assert_eq!(fluid.dye_energy(), 0.0);
}

#[test]
fn only_moving_pointers_splat() {
    let mut fluid = FluidEngine::new(small_config(), 800, 600).unwrap();
    fluid.update_pointer(400.0, 300.0, None, "mouse");
    fluid.step(1.0 / 60.0);
    assert_eq!(fluid.dye_energy(), 0.0);

    fluid.update_pointer(420.0, 310.0, None, "mouse");
    fluid.step(1.0 / 60.0);
    assert!(fluid.dye_energy() > 0.0);
    assert!(fluid.velocity_energy() > 0.0);
}

#[test]
fn initial_splats_paint_on_creation() {
    let config = FluidConfig::from_json(
        r#"{"SIM_RESOLUTION": 16, "DYE_RESOLUTION": 32, "INITIAL_SPLATS": 5}"#,
    )
    .unwrap();
    let fluid = FluidEngine::new(config, 320, 240).unwrap();
    assert!(fluid.dye_energy() > 0.0);
}

#[test]
fn idle_remote_pointers_are_swept_by_the_frame_loop() {
    let mut fluid = FluidEngine::new(small_config(), 200, 200).unwrap();
    fluid.update_pointer(10.0, 10.0, None, "mouse");
    fluid.update_pointer(20.0, 20.0, None, "remote-1");
    for _ in 0..(60 * 8) {
        fluid.step(1.0 / 60.0);
    }
    assert!(fluid.registry().get("remote-1").is_none());
    assert!(fluid.registry().get("mouse").is_some());
}
