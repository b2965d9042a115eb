/// Web front-end tuning constants.
///
/// Kept free of web-sys types so host tests can include this file directly.
// Canvas mounting
pub const CANVAS_ID: &str = "cursorfx-canvas";
pub const CANVAS_Z_INDEX: i32 = 9999;

// Pointer ids produced by DOM ingress
pub const MOUSE_POINTER_ID: &str = "mouse";
pub const TOUCH_POINTER_PREFIX: &str = "touch-";

// Frame loop
// Longest frame gap handed to an engine, in seconds. Engines clamp further.
pub const MAX_FRAME_DT_SEC: f32 = 0.25;

// Collision sound
pub const VOLUME: f32 = 0.35;
// Minimum spacing between two collision one-shots.
pub const MIN_SOUND_INTERVAL_MS: f64 = 60.0;
// Quieter events are not worth a node graph.
pub const MIN_AUDIBLE_INTENSITY: f32 = 0.02;
pub const SOUND_ATTACK_SEC: f64 = 0.005;
pub const SOUND_DECAY_SEC: f64 = 0.18;
pub const SOUND_BASE_HZ: f32 = 220.0;
pub const SOUND_HZ_SPAN: f32 = 660.0;
pub const SOUND_LOWPASS_HZ: f32 = 2400.0;

// Rendering
// Upper bound on metaball sources the fragment shader iterates.
pub const MAX_GPU_SOURCES: usize = 64;
pub const BALL_LIGHT_DIR: [f32; 3] = [-0.4, 0.6, 0.7];
pub const BALL_AMBIENT: f32 = 0.25;
pub const BALL_SPECULAR: f32 = 0.5;
// Width of the soft metaball edge, in field units around the threshold.
pub const METABALL_EDGE: f32 = 0.08;
