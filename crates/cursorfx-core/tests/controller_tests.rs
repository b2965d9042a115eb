// Effect switching, handle lifetimes and async liveness guards.

use cursorfx_core::controller::CpuBackend;
use cursorfx_core::{
    negotiate_formats, ActiveEffect, EffectController, EffectKind, EngineState, FormatKind,
    FormatSupport, FxError, Liveness,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn controller() -> EffectController<CpuBackend> {
    EffectController::new(CpuBackend::default(), 800, 600)
}

#[test]
fn each_effect_runs_frames_and_tracks_pointers() {
    let mut c = controller();
    for kind in EffectKind::ALL {
        let h = c
            .activate(kind, json!({"SIM_RESOLUTION": 16, "DYE_RESOLUTION": 32, "COUNT": 12}))
            .unwrap();
        c.update_pointer(h, 400.0, 300.0, Some([1.0, 0.0, 0.0]), "mouse").unwrap();
        c.update_pointer(h, 100.0, 100.0, None, "host-eyes").unwrap();
        for i in 0..10 {
            c.update_pointer(h, 400.0 + i as f64, 300.0, None, "mouse").unwrap();
            c.frame(1.0 / 60.0);
        }
        assert_eq!(c.active_kind(), Some(kind));
        assert_eq!(c.active().map(|e| e.as_effect().registry().len()), Some(2));
    }
    assert_eq!(c.backend().frames, 30);
    assert_eq!(c.backend().peak_live, 1);
}

#[test]
fn switching_discards_previous_state() {
    let mut c = controller();
    let fluid = c.activate(EffectKind::Fluid, json!({"SIM_RESOLUTION": 16})).unwrap();
    c.update_pointer(fluid, 10.0, 10.0, None, "remote-1").unwrap();
    let balls = c.activate(EffectKind::Balls, json!({"COUNT": 5})).unwrap();
    assert_eq!(c.active().map(|e| e.as_effect().registry().len()), Some(0));
    assert_eq!(c.update_pointer(fluid, 1.0, 1.0, None, "mouse"), Err(FxError::Destroyed));
    assert!(c.is_current(balls));
}

#[test]
fn splash_is_ignored_by_non_fluid_effects() {
    let mut c = controller();
    let h = c.activate(EffectKind::Metaballs, serde_json::Value::Null).unwrap();
    assert!(c.splash_at_client(h, 10.0, 10.0, None, "x").is_ok());

    let h = c.activate(EffectKind::Fluid, json!({"SIM_RESOLUTION": 16, "DYE_RESOLUTION": 32})).unwrap();
    c.splash_at_client(h, 400.0, 300.0, Some([0.0, 0.0, 1.0]), "x").unwrap();
    match c.active() {
        Some(ActiveEffect::Fluid(f)) => assert!(f.dye_energy() > 0.0),
        _ => panic!("fluid should be active"),
    }
}

#[test]
fn resize_reaches_the_running_effect() {
    let mut c = controller();
    let _h = c.activate(EffectKind::Balls, json!({"COUNT": 3})).unwrap();
    c.resize(1600, 600);
    c.frame(1.0 / 60.0);
    assert_eq!(c.viewport(), (1600, 600));
    match c.active() {
        Some(ActiveEffect::Balls(b)) => {
            let he = b.camera().half_extents();
            assert!((he.x / he.y - 1600.0 / 600.0).abs() < 1e-3);
        }
        _ => panic!("balls should be active"),
    }
}

#[test]
fn destroy_is_idempotent_and_terminal() {
    let mut c = controller();
    let h = c.activate(EffectKind::Fluid, json!({"SIM_RESOLUTION": 16})).unwrap();
    c.destroy(h);
    c.destroy(h);
    assert!(c.active().is_none());
    assert_eq!(c.state(), None);
    assert_eq!(c.play(h), Err(FxError::Destroyed));
    assert_eq!(c.backend().live, 0);
}

#[test]
fn late_completion_is_dropped_after_destroy() {
    // An async resource load finishing after its owner is gone must not
    // touch the owner's state.
    let applied = Rc::new(RefCell::new(Vec::new()));
    let owner = Liveness::new();
    let token = owner.token();
    let complete = {
        let applied = applied.clone();
        move |value: u32| {
            if token.is_alive() {
                applied.borrow_mut().push(value);
            }
        }
    };
    owner.kill();
    complete(7);
    assert!(applied.borrow().is_empty());
}

#[test]
fn format_negotiation_is_independent_of_the_loop() {
    let webgpu_like = |f: FormatKind| !matches!(f, FormatKind::Rgba32Float | FormatKind::Rg32Float | FormatKind::R32Float);
    match negotiate_formats(webgpu_like) {
        FormatSupport::Supported(f) => {
            assert_eq!(f.rgba, FormatKind::Rgba16Float);
            assert_eq!(f.rg, FormatKind::Rg16Float);
            assert_eq!(f.r, FormatKind::R16Float);
        }
        FormatSupport::Unsupported => panic!("expected support"),
    }
    assert_eq!(negotiate_formats(|_| false), FormatSupport::Unsupported);
}

#[test]
fn paused_effect_still_renders() {
    let mut c = controller();
    let h = c.activate(EffectKind::Metaballs, serde_json::Value::Null).unwrap();
    c.pause(h).unwrap();
    c.frame(1.0 / 60.0);
    c.frame(1.0 / 60.0);
    assert_eq!(c.state(), Some(EngineState::Paused));
    assert_eq!(c.backend().frames, 2);
}
