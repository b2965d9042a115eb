//! Flat, JSON-friendly engine configuration.
//!
//! Every field is optional on the wire: absent keys keep the defaults below,
//! which gives the shallow "overrides over defaults" merge hosts expect.

use crate::error::{FxError, Result};
use crate::pointer::DEFAULT_PRIMARY_ID;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const DEFAULT_PALETTE: [[f32; 3]; 5] = [
    [0.95, 0.33, 0.42],
    [0.98, 0.72, 0.25],
    [0.30, 0.78, 0.65],
    [0.33, 0.55, 0.95],
    [0.70, 0.42, 0.92],
];

/// Pointer bookkeeping shared by every engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PointerSettings {
    /// Source exempt from idle eviction and bound to slot 0. `None` disables
    /// the primary policy entirely.
    pub primary_id: Option<String>,
    pub idle_timeout_ms: f64,
    /// Simulation seconds between idle sweeps.
    pub sweep_interval_sec: f32,
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self {
            primary_id: Some(DEFAULT_PRIMARY_ID.to_string()),
            idle_timeout_ms: 5000.0,
            sweep_interval_sec: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct FluidConfig {
    #[serde(flatten)]
    pub pointers: PointerSettings,
    /// Cells along the shorter viewport side for velocity/pressure.
    pub sim_resolution: u32,
    /// Cells along the shorter viewport side for the dye field.
    pub dye_resolution: u32,
    pub density_dissipation: f32,
    pub velocity_dissipation: f32,
    /// Fraction of last frame's pressure kept as the Jacobi initial guess.
    pub pressure: f32,
    pub pressure_iterations: u32,
    pub curl: f32,
    /// Percent of the viewport; divided by 100 before use.
    pub splat_radius: f32,
    pub splat_force: f32,
    /// Scale applied to pointer colors before they enter the dye field.
    pub splat_intensity: f32,
    pub colorful: bool,
    pub color_update_speed: f32,
    pub back_color: [f32; 3],
    pub transparent: bool,
    pub initial_splats: u32,
    pub seed: u64,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            pointers: PointerSettings::default(),
            sim_resolution: 128,
            dye_resolution: 512,
            density_dissipation: 1.0,
            velocity_dissipation: 0.2,
            pressure: 0.8,
            pressure_iterations: 20,
            curl: 30.0,
            splat_radius: 0.25,
            splat_force: 6000.0,
            splat_intensity: 0.15,
            colorful: true,
            color_update_speed: 10.0,
            back_color: [0.0, 0.0, 0.0],
            transparent: true,
            initial_splats: 0,
            seed: 0x5EED_F1D0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct BallConfig {
    #[serde(flatten)]
    pub pointers: PointerSettings,
    pub count: usize,
    pub min_size: f32,
    pub max_size: f32,
    /// Downward acceleration per step, multiplied by particle radius.
    pub gravity: f32,
    pub friction: f32,
    pub wall_bounce: f32,
    /// World units per step.
    pub max_velocity: f32,
    pub ease_factor: f32,
    pub follow_cursor: bool,
    pub camera_fov_deg: f32,
    pub camera_z: f32,
    /// Half-depth of the box particles live in.
    pub depth_bound: f32,
    pub collision_kick: f32,
    pub repulsion_strength: f32,
    pub intensity_overlap_weight: f32,
    pub intensity_speed_weight: f32,
    /// Collision intensities below this are not reported.
    pub min_collision_intensity: f32,
    pub palette: Vec<[f32; 3]>,
    pub seed: u64,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            pointers: PointerSettings::default(),
            count: 60,
            min_size: 0.5,
            max_size: 1.0,
            gravity: 0.01,
            friction: 0.9975,
            wall_bounce: 0.95,
            max_velocity: 0.15,
            ease_factor: 0.1,
            follow_cursor: true,
            camera_fov_deg: 75.0,
            camera_z: 20.0,
            depth_bound: 4.0,
            collision_kick: 0.01,
            repulsion_strength: 0.08,
            intensity_overlap_weight: 0.6,
            intensity_speed_weight: 0.4,
            min_collision_intensity: 0.05,
            palette: DEFAULT_PALETTE.to_vec(),
            seed: 0xBA11_5EED,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MetaballConfig {
    #[serde(flatten)]
    pub pointers: PointerSettings,
    /// Procedurally orbiting sources.
    pub fixed_count: usize,
    pub max_pointer_sources: usize,
    /// Radii are fractions of the viewport height.
    pub pointer_radius: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Orbit speed in radians per second.
    pub speed: f32,
    pub ease_factor: f32,
    pub threshold: f32,
    pub intensity_overlap_weight: f32,
    pub intensity_speed_weight: f32,
    /// Pointer speed (viewport heights per second) mapped to full intensity.
    pub reference_speed: f32,
    pub palette: Vec<[f32; 3]>,
    pub seed: u64,
}

impl Default for MetaballConfig {
    fn default() -> Self {
        Self {
            pointers: PointerSettings::default(),
            fixed_count: 8,
            max_pointer_sources: 16,
            pointer_radius: 0.07,
            min_radius: 0.04,
            max_radius: 0.09,
            speed: 0.35,
            ease_factor: 0.12,
            threshold: 1.0,
            intensity_overlap_weight: 0.5,
            intensity_speed_weight: 0.5,
            reference_speed: 2.0,
            palette: DEFAULT_PALETTE.to_vec(),
            seed: 0x3E7A_BA11,
        }
    }
}

/// Parsing and validation shared by the engine configs.
pub trait EngineConfig: Sized + Default + DeserializeOwned {
    fn validate(&self) -> Result<()>;

    /// Parse a JSON object of overrides; `""` and `"null"` yield defaults.
    fn from_json(json: &str) -> Result<Self> {
        let trimmed = json.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Self::default());
        }
        let cfg: Self = serde_json::from_str(trimmed)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let cfg: Self = serde_json::from_value(value)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn require(cond: bool, what: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(FxError::InvalidConfig(what.to_string()))
    }
}

fn validate_pointers(p: &PointerSettings) -> Result<()> {
    require(p.idle_timeout_ms > 0.0, "IDLE_TIMEOUT_MS must be positive")?;
    require(p.sweep_interval_sec > 0.0, "SWEEP_INTERVAL_SEC must be positive")
}

fn validate_palette(palette: &[[f32; 3]]) -> Result<()> {
    require(!palette.is_empty(), "PALETTE must not be empty")?;
    require(
        palette.iter().flatten().all(|c| c.is_finite()),
        "PALETTE entries must be finite",
    )
}

impl EngineConfig for FluidConfig {
    fn validate(&self) -> Result<()> {
        validate_pointers(&self.pointers)?;
        require(self.sim_resolution >= 8, "SIM_RESOLUTION must be at least 8")?;
        require(self.dye_resolution >= 8, "DYE_RESOLUTION must be at least 8")?;
        require(self.density_dissipation >= 0.0, "DENSITY_DISSIPATION must be >= 0")?;
        require(self.velocity_dissipation >= 0.0, "VELOCITY_DISSIPATION must be >= 0")?;
        require((0.0..=1.0).contains(&self.pressure), "PRESSURE must be within [0, 1]")?;
        require(self.splat_radius > 0.0, "SPLAT_RADIUS must be positive")?;
        require(self.color_update_speed >= 0.0, "COLOR_UPDATE_SPEED must be >= 0")
    }
}

impl EngineConfig for BallConfig {
    fn validate(&self) -> Result<()> {
        validate_pointers(&self.pointers)?;
        validate_palette(&self.palette)?;
        require(self.count > 0, "COUNT must be positive")?;
        require(self.min_size > 0.0, "MIN_SIZE must be positive")?;
        require(self.max_size >= self.min_size, "MAX_SIZE must be >= MIN_SIZE")?;
        require(
            self.friction > 0.0 && self.friction <= 1.0,
            "FRICTION must be within (0, 1]",
        )?;
        require(
            self.ease_factor > 0.0 && self.ease_factor <= 1.0,
            "EASE_FACTOR must be within (0, 1]",
        )?;
        require(self.max_velocity > 0.0, "MAX_VELOCITY must be positive")?;
        require(
            self.camera_fov_deg > 0.0 && self.camera_fov_deg < 180.0,
            "CAMERA_FOV_DEG must be within (0, 180)",
        )?;
        require(self.camera_z > 0.0, "CAMERA_Z must be positive")?;
        require(self.depth_bound > 0.0, "DEPTH_BOUND must be positive")
    }
}

impl EngineConfig for MetaballConfig {
    fn validate(&self) -> Result<()> {
        validate_pointers(&self.pointers)?;
        validate_palette(&self.palette)?;
        require(self.pointer_radius > 0.0, "POINTER_RADIUS must be positive")?;
        require(self.min_radius > 0.0, "MIN_RADIUS must be positive")?;
        require(self.max_radius >= self.min_radius, "MAX_RADIUS must be >= MIN_RADIUS")?;
        require(
            self.ease_factor > 0.0 && self.ease_factor <= 1.0,
            "EASE_FACTOR must be within (0, 1]",
        )?;
        require(self.reference_speed > 0.0, "REFERENCE_SPEED must be positive")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_merge_over_defaults() {
        let cfg = BallConfig::from_json(r#"{"COUNT": 10, "MAX_SIZE": 2.0}"#).unwrap();
        assert_eq!(cfg.count, 10);
        assert_eq!(cfg.max_size, 2.0);
        assert_eq!(cfg.min_size, BallConfig::default().min_size);
        assert_eq!(cfg.pointers.primary_id.as_deref(), Some("mouse"));
    }

    #[test]
    fn flattened_pointer_settings_are_accepted() {
        let cfg =
            FluidConfig::from_json(r#"{"PRIMARY_ID": "host-eyes", "IDLE_TIMEOUT_MS": 900}"#).unwrap();
        assert_eq!(cfg.pointers.primary_id.as_deref(), Some("host-eyes"));
        assert_eq!(cfg.pointers.idle_timeout_ms, 900.0);
        assert_eq!(cfg.sim_resolution, 128);
    }

    #[test]
    fn empty_input_yields_defaults() {
        assert_eq!(MetaballConfig::from_json("").unwrap(), MetaballConfig::default());
        assert_eq!(MetaballConfig::from_json("null").unwrap(), MetaballConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            BallConfig::from_json(r#"{"COUNT": 0}"#),
            Err(FxError::InvalidConfig(_))
        ));
        assert!(matches!(
            BallConfig::from_json(r#"{"MIN_SIZE": 2.0, "MAX_SIZE": 1.0}"#),
            Err(FxError::InvalidConfig(_))
        ));
        assert!(matches!(
            FluidConfig::from_json("{not json"),
            Err(FxError::InvalidConfig(_))
        ));
    }
}
