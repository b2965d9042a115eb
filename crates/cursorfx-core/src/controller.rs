//! Owns at most one running effect and the rendering resources built for it.
//!
//! Switching is destroy-then-create: the previous engine is destroyed and its
//! backend resources released before the next engine is constructed, so two
//! effects are never resident at once. Handles carry a generation number;
//! a handle from an earlier activation is rejected with [`FxError::Destroyed`].

use crate::ball::BallEngine;
use crate::config::{BallConfig, EngineConfig, FluidConfig, MetaballConfig};
use crate::effect::{Collisions, Effect, EffectKind};
use crate::error::{FxError, Result};
use crate::fluid::{FluidEngine, SolverMode};
use crate::lifecycle::EngineState;
use crate::metaball::MetaballEngine;
use crate::pointer::PointerRegistry;

pub enum ActiveEffect {
    Fluid(FluidEngine),
    Balls(BallEngine),
    Metaballs(MetaballEngine),
}

impl ActiveEffect {
    /// Parse `config` for `kind` and build the engine. `fluid_solver` says
    /// where a fluid engine's fields live.
    pub fn create(
        kind: EffectKind,
        config: serde_json::Value,
        width: u32,
        height: u32,
        fluid_solver: SolverMode,
    ) -> Result<Self> {
        Ok(match kind {
            EffectKind::Fluid => ActiveEffect::Fluid(FluidEngine::with_solver(
                FluidConfig::from_value(config)?,
                width,
                height,
                fluid_solver,
            )?),
            EffectKind::Balls => {
                ActiveEffect::Balls(BallEngine::new(BallConfig::from_value(config)?, width, height)?)
            }
            EffectKind::Metaballs => ActiveEffect::Metaballs(MetaballEngine::new(
                MetaballConfig::from_value(config)?,
                width,
                height,
            )?),
        })
    }

    pub fn kind(&self) -> EffectKind {
        self.as_effect().kind()
    }

    pub fn as_effect(&self) -> &dyn Effect {
        match self {
            ActiveEffect::Fluid(e) => e,
            ActiveEffect::Balls(e) => e,
            ActiveEffect::Metaballs(e) => e,
        }
    }

    pub fn as_effect_mut(&mut self) -> &mut dyn Effect {
        match self {
            ActiveEffect::Fluid(e) => e,
            ActiveEffect::Balls(e) => e,
            ActiveEffect::Metaballs(e) => e,
        }
    }
}

macro_rules! forward_effect {
    (@impl $ty:ty, $kind:expr, { $($extra:tt)* }) => {
        impl Effect for $ty {
            fn kind(&self) -> EffectKind {
                $kind
            }
            fn state(&self) -> EngineState {
                <$ty>::state(self)
            }
            fn registry(&self) -> &PointerRegistry {
                <$ty>::registry(self)
            }
            fn update_pointer(&mut self, x: f64, y: f64, color: Option<[f32; 3]>, id: &str) {
                <$ty>::update_pointer(self, x, y, color, id)
            }
            fn remove_pointer(&mut self, id: &str) {
                <$ty>::remove_pointer(self, id)
            }
            fn resize(&mut self, width: u32, height: u32) {
                <$ty>::resize(self, width, height)
            }
            fn step(&mut self, dt: f32) {
                <$ty>::step(self, dt)
            }
            fn pause(&mut self) {
                <$ty>::pause(self)
            }
            fn play(&mut self) {
                <$ty>::play(self)
            }
            fn destroy(&mut self) {
                <$ty>::destroy(self)
            }
            $($extra)*
        }
    };
    ($ty:ty, $kind:expr) => {
        forward_effect!(@impl $ty, $kind, {});
    };
    ($ty:ty, $kind:expr, collisions) => {
        forward_effect!(@impl $ty, $kind, {
            fn drain_collisions(&mut self) -> Collisions {
                <$ty>::drain_collisions(self)
            }
        });
    };
}

forward_effect!(FluidEngine, EffectKind::Fluid);
forward_effect!(BallEngine, EffectKind::Balls, collisions);
forward_effect!(MetaballEngine, EffectKind::Metaballs, collisions);

/// Rendering side of an activation. Resources are created after the engine
/// and released after it is destroyed.
pub trait EffectBackend {
    type Resources;

    /// Backends that run the fluid solver themselves return
    /// [`SolverMode::External`] and drain the engine's ops in `render`.
    fn fluid_solver(&self) -> SolverMode {
        SolverMode::Cpu
    }

    fn create(&mut self, effect: &ActiveEffect, width: u32, height: u32) -> Result<Self::Resources>;

    fn resize(&mut self, _resources: &mut Self::Resources, _width: u32, _height: u32) {}

    fn render(&mut self, resources: &mut Self::Resources, effect: &mut ActiveEffect);

    fn release(&mut self, resources: Self::Resources);
}

/// Headless backend: no drawing, just bookkeeping of what is resident.
#[derive(Debug, Default)]
pub struct CpuBackend {
    pub live: usize,
    pub peak_live: usize,
    pub created: usize,
    pub frames: u64,
    /// Make the next `create` fail, as a missing GPU would.
    pub fail_next: bool,
}

#[derive(Debug)]
pub struct CpuResources {
    pub kind: EffectKind,
}

impl EffectBackend for CpuBackend {
    type Resources = CpuResources;

    fn create(&mut self, effect: &ActiveEffect, _width: u32, _height: u32) -> Result<CpuResources> {
        if std::mem::take(&mut self.fail_next) {
            return Err(FxError::ResourceInit("no rendering context".into()));
        }
        self.live += 1;
        self.created += 1;
        self.peak_live = self.peak_live.max(self.live);
        Ok(CpuResources {
            kind: effect.kind(),
        })
    }

    fn render(&mut self, _resources: &mut CpuResources, _effect: &mut ActiveEffect) {
        self.frames += 1;
    }

    fn release(&mut self, _resources: CpuResources) {
        self.live = self.live.saturating_sub(1);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectHandle {
    generation: u64,
    kind: EffectKind,
}

impl EffectHandle {
    pub fn kind(&self) -> EffectKind {
        self.kind
    }
}

struct Activation<R> {
    handle: EffectHandle,
    effect: ActiveEffect,
    resources: R,
}

pub struct EffectController<B: EffectBackend> {
    backend: B,
    active: Option<Activation<B::Resources>>,
    generation: u64,
    viewport: (u32, u32),
}

impl<B: EffectBackend> EffectController<B> {
    pub fn new(backend: B, width: u32, height: u32) -> Self {
        Self {
            backend,
            active: None,
            generation: 0,
            viewport: (width.max(1), height.max(1)),
        }
    }

    /// Destroy whatever is running, then build `kind` from `config`
    /// (a JSON object of overrides, or null for defaults).
    pub fn activate(&mut self, kind: EffectKind, config: serde_json::Value) -> Result<EffectHandle> {
        self.deactivate();
        let (w, h) = self.viewport;
        let mut effect = ActiveEffect::create(kind, config, w, h, self.backend.fluid_solver())?;
        let resources = match self.backend.create(&effect, w, h) {
            Ok(r) => r,
            Err(e) => {
                log::error!("[controller] {kind} failed to initialize: {e}");
                effect.as_effect_mut().destroy();
                return Err(e);
            }
        };
        self.generation += 1;
        let handle = EffectHandle {
            generation: self.generation,
            kind,
        };
        self.active = Some(Activation {
            handle,
            effect,
            resources,
        });
        log::info!("[controller] activated {kind}");
        Ok(handle)
    }

    /// Tear down the running effect, if any. Idempotent.
    pub fn deactivate(&mut self) {
        if let Some(mut a) = self.active.take() {
            a.effect.as_effect_mut().destroy();
            self.backend.release(a.resources);
            log::info!("[controller] deactivated {}", a.handle.kind);
        }
    }

    /// Destroy through a handle. Stale handles are a no-op.
    pub fn destroy(&mut self, handle: EffectHandle) {
        if self.is_current(handle) {
            self.deactivate();
        }
    }

    pub fn is_current(&self, handle: EffectHandle) -> bool {
        self.active.as_ref().is_some_and(|a| a.handle == handle)
    }

    fn effect_mut(&mut self, handle: EffectHandle) -> Result<&mut ActiveEffect> {
        match self.active.as_mut() {
            Some(a) if a.handle == handle => Ok(&mut a.effect),
            _ => Err(FxError::Destroyed),
        }
    }

    pub fn update_pointer(
        &mut self,
        handle: EffectHandle,
        x: f64,
        y: f64,
        color: Option<[f32; 3]>,
        id: &str,
    ) -> Result<()> {
        self.effect_mut(handle)?.as_effect_mut().update_pointer(x, y, color, id);
        Ok(())
    }

    pub fn remove_pointer(&mut self, handle: EffectHandle, id: &str) -> Result<()> {
        self.effect_mut(handle)?.as_effect_mut().remove_pointer(id);
        Ok(())
    }

    /// One-off fluid splash. Other effects ignore it.
    pub fn splash_at_client(
        &mut self,
        handle: EffectHandle,
        x: f64,
        y: f64,
        color: Option<[f32; 3]>,
        id: &str,
    ) -> Result<()> {
        match self.effect_mut(handle)? {
            ActiveEffect::Fluid(f) => f.splash_at_client(x, y, color, id),
            _ => Ok(()),
        }
    }

    pub fn pause(&mut self, handle: EffectHandle) -> Result<()> {
        self.effect_mut(handle)?.as_effect_mut().pause();
        Ok(())
    }

    pub fn play(&mut self, handle: EffectHandle) -> Result<()> {
        self.effect_mut(handle)?.as_effect_mut().play();
        Ok(())
    }

    /// New viewport size, forwarded to the running effect and its resources.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
        if let Some(a) = self.active.as_mut() {
            a.effect.as_effect_mut().resize(width, height);
            self.backend.resize(&mut a.resources, width, height);
        }
    }

    /// Step and render the running effect; returns its collision events.
    pub fn frame(&mut self, dt: f32) -> Collisions {
        let Some(a) = self.active.as_mut() else {
            return Collisions::new();
        };
        let effect = a.effect.as_effect_mut();
        effect.step(dt);
        let events = effect.drain_collisions();
        self.backend.render(&mut a.resources, &mut a.effect);
        events
    }

    pub fn active(&self) -> Option<&ActiveEffect> {
        self.active.as_ref().map(|a| &a.effect)
    }

    pub fn active_kind(&self) -> Option<EffectKind> {
        self.active.as_ref().map(|a| a.handle.kind)
    }

    pub fn state(&self) -> Option<EngineState> {
        self.active().map(|e| e.as_effect().state())
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: EffectBackend> Drop for EffectController<B> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::FluidOp;
    use serde_json::json;

    /// Runs no solver of its own; collects what a GPU solver would be fed.
    #[derive(Default)]
    struct DrainingBackend {
        ops: Vec<FluidOp>,
    }

    impl EffectBackend for DrainingBackend {
        type Resources = ();

        fn fluid_solver(&self) -> SolverMode {
            SolverMode::External
        }

        fn create(&mut self, _effect: &ActiveEffect, _width: u32, _height: u32) -> Result<()> {
            Ok(())
        }

        fn render(&mut self, _resources: &mut (), effect: &mut ActiveEffect) {
            if let ActiveEffect::Fluid(f) = effect {
                self.ops.extend(f.take_ops());
            }
        }

        fn release(&mut self, _resources: ()) {}
    }

    fn controller() -> EffectController<CpuBackend> {
        EffectController::new(CpuBackend::default(), 640, 480)
    }

    #[test]
    fn switching_never_overlaps() {
        let mut c = controller();
        let mut last = None;
        for kind in EffectKind::ALL.into_iter().chain(EffectKind::ALL) {
            let h = c.activate(kind, json!({"SIM_RESOLUTION": 16, "DYE_RESOLUTION": 16})).unwrap();
            c.frame(1.0 / 60.0);
            assert_eq!(c.backend().live, 1);
            if let Some(prev) = last {
                assert!(!c.is_current(prev));
            }
            last = Some(h);
        }
        assert_eq!(c.backend().peak_live, 1);
        assert_eq!(c.backend().created, 6);
        c.deactivate();
        c.deactivate();
        assert_eq!(c.backend().live, 0);
    }

    #[test]
    fn stale_handle_is_rejected() {
        let mut c = controller();
        let old = c.activate(EffectKind::Balls, json!({"COUNT": 4})).unwrap();
        let new = c.activate(EffectKind::Metaballs, serde_json::Value::Null).unwrap();
        assert_eq!(c.update_pointer(old, 1.0, 1.0, None, "mouse"), Err(FxError::Destroyed));
        c.destroy(old);
        assert!(c.is_current(new));
        c.update_pointer(new, 1.0, 1.0, None, "mouse").unwrap();
        assert_eq!(c.active().map(|e| e.as_effect().registry().len()), Some(1));
    }

    #[test]
    fn backend_failure_leaves_nothing_running() {
        let mut c = controller();
        c.backend_mut().fail_next = true;
        let err = c.activate(EffectKind::Fluid, serde_json::Value::Null).unwrap_err();
        assert!(matches!(err, FxError::ResourceInit(_)));
        assert!(c.active().is_none());
        assert_eq!(c.backend().live, 0);
    }

    #[test]
    fn bad_config_is_reported() {
        let mut c = controller();
        let err = c.activate(EffectKind::Balls, json!({"COUNT": 0})).unwrap_err();
        assert!(matches!(err, FxError::InvalidConfig(_)));
        assert_eq!(c.backend().created, 0);
    }

    #[test]
    fn pause_and_play_through_handle() {
        let mut c = controller();
        let h = c.activate(EffectKind::Metaballs, serde_json::Value::Null).unwrap();
        c.pause(h).unwrap();
        assert_eq!(c.state(), Some(EngineState::Paused));
        c.play(h).unwrap();
        assert_eq!(c.state(), Some(EngineState::Running));
        c.destroy(h);
        assert_eq!(c.state(), None);
        assert_eq!(c.play(h), Err(FxError::Destroyed));
    }

    #[test]
    fn external_fluid_solver_is_fed_every_frame() {
        let mut c = EffectController::new(DrainingBackend::default(), 640, 480);
        let h = c.activate(EffectKind::Fluid, json!({"SIM_RESOLUTION": 16})).unwrap();
        c.update_pointer(h, 10.0, 10.0, None, "mouse").unwrap();
        c.update_pointer(h, 30.0, 10.0, None, "mouse").unwrap();
        c.frame(1.0 / 60.0);
        c.frame(1.0 / 60.0);
        let ops = &c.backend().ops;
        let steps = ops.iter().filter(|op| matches!(op, FluidOp::Step(_))).count();
        let splats = ops.iter().filter(|op| matches!(op, FluidOp::Splat(_))).count();
        assert_eq!((splats, steps), (1, 2));
        match c.active() {
            Some(ActiveEffect::Fluid(f)) => {
                assert_eq!(f.solver_mode(), SolverMode::External);
                assert_eq!(f.dye_energy(), 0.0);
            }
            _ => panic!("fluid should be active"),
        }
    }
}
