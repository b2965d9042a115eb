pub mod ball;
pub mod camera;
pub mod color;
pub mod config;
pub mod controller;
pub mod effect;
pub mod error;
pub mod fluid;
pub mod formats;
pub mod lifecycle;
pub mod metaball;
pub mod pointer;
pub mod router;

pub use ball::{BallEngine, Bounds};
pub use camera::Camera;
pub use config::{BallConfig, EngineConfig, FluidConfig, MetaballConfig, PointerSettings};
pub use controller::{ActiveEffect, CpuBackend, EffectBackend, EffectController, EffectHandle};
pub use effect::{CollisionEvent, Collisions, Effect, EffectKind};
pub use error::{FxError, Result};
pub use fluid::{FluidEngine, FluidOp, SolverMode, Splat};
pub use formats::{negotiate_formats, FieldFormats, FormatKind, FormatSupport};
pub use lifecycle::{EngineState, Liveness, LivenessToken};
pub use metaball::{FieldSource, MetaballEngine};
pub use pointer::{LogicalPointer, PointerRegistry, DEFAULT_PRIMARY_ID};
pub use router::{InputRouter, PointerMotion, PointerSink, SlotPolicy};
