// Host-side tests for constants and their mathematical relationships.
// The main crate is wasm-only, so we include the pure-Rust modules directly.

#![allow(dead_code)]
mod constants {
    include!("../src/constants.rs");
}

use constants::*;

#[test]
#[allow(clippy::assertions_on_constants)]
fn constants_are_within_reasonable_bounds() {
    assert!(VOLUME > 0.0 && VOLUME <= 1.0);
    assert!(MIN_AUDIBLE_INTENSITY >= 0.0 && MIN_AUDIBLE_INTENSITY < 1.0);
    assert!(MIN_SOUND_INTERVAL_MS > 0.0);
    assert!(SOUND_ATTACK_SEC > 0.0 && SOUND_ATTACK_SEC < SOUND_DECAY_SEC);
    assert!(SOUND_BASE_HZ > 20.0 && SOUND_BASE_HZ + SOUND_HZ_SPAN < 20_000.0);

    assert!(MAX_FRAME_DT_SEC > 1.0 / 60.0);
    assert!(BALL_AMBIENT >= 0.0 && BALL_AMBIENT <= 1.0);
    assert!(METABALL_EDGE > 0.0);
}

#[test]
fn pointer_ids_do_not_collide() {
    assert!(!MOUSE_POINTER_ID.starts_with(TOUCH_POINTER_PREFIX));
    assert!(!TOUCH_POINTER_PREFIX.is_empty());
}

#[test]
fn gpu_source_cap_matches_shader_array() {
    let wgsl = include_str!("../shaders/metaballs.wgsl");
    let decl = format!("array<vec4<f32>, {}>", MAX_GPU_SOURCES);
    assert_eq!(wgsl.matches(decl.as_str()).count(), 2);
    assert!(wgsl.contains(&format!("MAX_SOURCES: u32 = {}u", MAX_GPU_SOURCES)));
}

#[test]
fn light_direction_is_not_degenerate() {
    let [x, y, z] = BALL_LIGHT_DIR;
    assert!((x * x + y * y + z * z).sqrt() > 0.1);
    assert!(z > 0.0, "light must face the camera");
}
