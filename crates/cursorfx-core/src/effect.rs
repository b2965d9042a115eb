//! What every effect engine exposes to the lifecycle controller.

use crate::error::{FxError, Result};
use crate::lifecycle::EngineState;
use crate::pointer::PointerRegistry;
use glam::Vec2;
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Fluid,
    Balls,
    Metaballs,
}

impl EffectKind {
    pub const ALL: [EffectKind; 3] = [EffectKind::Fluid, EffectKind::Balls, EffectKind::Metaballs];

    pub fn as_str(self) -> &'static str {
        match self {
            EffectKind::Fluid => "fluid",
            EffectKind::Balls => "balls",
            EffectKind::Metaballs => "metaballs",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectKind {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fluid" => Ok(EffectKind::Fluid),
            "balls" | "ball" => Ok(EffectKind::Balls),
            "metaballs" | "metaball" => Ok(EffectKind::Metaballs),
            other => Err(FxError::InvalidConfig(format!("unknown effect '{other}'"))),
        }
    }
}

/// A collision worth a sound. `intensity` is in `[0, 1]`; `position` is in
/// viewport pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionEvent {
    pub intensity: f32,
    pub position: Vec2,
}

pub type Collisions = SmallVec<[CollisionEvent; 8]>;

/// Pending events kept per engine between drains.
pub const MAX_PENDING_COLLISIONS: usize = 32;

/// Heuristic loudness of a contact, mixing how deep the overlap is with how
/// fast the two met. Both ratios are already normalized; the weights are
/// tuning knobs.
pub fn collision_intensity(overlap_ratio: f32, speed_ratio: f32, w_overlap: f32, w_speed: f32) -> f32 {
    (overlap_ratio * w_overlap + speed_ratio * w_speed).clamp(0.0, 1.0)
}

pub(crate) fn push_collision(queue: &mut Collisions, event: CollisionEvent) {
    if queue.len() < MAX_PENDING_COLLISIONS {
        queue.push(event);
    }
}

/// Uniform surface over the fluid, ball and metaball engines.
pub trait Effect {
    fn kind(&self) -> EffectKind;

    fn state(&self) -> EngineState;

    fn registry(&self) -> &PointerRegistry;

    /// Viewport pixels, top-left origin. Malformed samples are ignored.
    fn update_pointer(&mut self, x: f64, y: f64, color: Option<[f32; 3]>, id: &str);

    fn remove_pointer(&mut self, id: &str);

    /// Takes effect at the start of the next step.
    fn resize(&mut self, width: u32, height: u32);

    fn step(&mut self, dt: f32);

    fn pause(&mut self);

    fn play(&mut self);

    fn destroy(&mut self);

    fn drain_collisions(&mut self) -> Collisions {
        Collisions::new()
    }
}
