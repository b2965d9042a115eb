// Shaders bundled as string constants
pub static FULLSCREEN_WGSL: &str = include_str!("../shaders/fullscreen.wgsl");
pub static COMPOSITE_WGSL: &str = include_str!("../shaders/composite.wgsl");
pub static METABALLS_WGSL: &str = include_str!("../shaders/metaballs.wgsl");
pub static BALLS_WGSL: &str = include_str!("../shaders/balls.wgsl");
pub static FLUID_WGSL: &str = include_str!("../shaders/fluid.wgsl");

/// Fragment-only sources need the shared fullscreen vertex stage in front.
pub fn with_fullscreen(fragment: &str) -> String {
    format!("{FULLSCREEN_WGSL}\n{fragment}")
}
