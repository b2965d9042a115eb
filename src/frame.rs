use crate::audio::CollisionSound;
use crate::constants::MAX_FRAME_DT_SEC;
use crate::dom;
use crate::input::{self, TickOutcome};
use crate::render::GpuBackend;
use cursorfx_core::{EffectController, EffectHandle, EffectKind, FxError, Liveness};
use instant::Instant;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

/// Everything the exported API, DOM listeners and the animation loop share.
///
/// Before the GPU is ready there is no controller: activations are queued
/// and pointer updates are dropped. After `destroy` every call reports
/// [`FxError::Destroyed`].
pub struct FrameContext {
    pub canvas: web::HtmlCanvasElement,
    pub liveness: Liveness,
    controller: Option<EffectController<GpuBackend>>,
    handle: Option<EffectHandle>,
    pending: Option<(EffectKind, serde_json::Value)>,
    sound: Option<CollisionSound>,
    viewport: (u32, u32),
    started: Instant,
    last_ms: Option<f64>,
}

impl FrameContext {
    pub fn new(canvas: web::HtmlCanvasElement, sound: Option<CollisionSound>) -> Self {
        let viewport = dom::css_size(&canvas);
        Self {
            canvas,
            liveness: Liveness::new(),
            controller: None,
            handle: None,
            pending: None,
            sound,
            viewport,
            started: Instant::now(),
            last_ms: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.controller.is_some()
    }

    fn check_alive(&self) -> Result<(), FxError> {
        if self.liveness.is_alive() {
            Ok(())
        } else {
            Err(FxError::Destroyed)
        }
    }

    /// GPU came up: build the controller and run any queued activation.
    pub fn attach_backend(&mut self, backend: GpuBackend) {
        let (w, h) = self.viewport;
        self.controller = Some(EffectController::new(backend, w, h));
        if let Some((kind, config)) = self.pending.take() {
            if let Err(e) = self.activate(kind, config) {
                log::error!("[controller] queued {} failed: {}", kind, e);
            }
        }
    }

    pub fn activate(&mut self, kind: EffectKind, config: serde_json::Value) -> Result<(), FxError> {
        self.check_alive()?;
        let Some(controller) = self.controller.as_mut() else {
            self.pending = Some((kind, config));
            return Ok(());
        };
        self.handle = None;
        self.handle = Some(controller.activate(kind, config)?);
        Ok(())
    }

    pub fn active_kind(&self) -> Option<EffectKind> {
        self.controller.as_ref().and_then(|c| c.active_kind())
    }

    /// Run `f` against the current activation. No-op while not ready or
    /// with nothing active.
    fn with_active(
        &mut self,
        f: impl FnOnce(&mut EffectController<GpuBackend>, EffectHandle) -> Result<(), FxError>,
    ) -> Result<(), FxError> {
        self.check_alive()?;
        match (self.controller.as_mut(), self.handle) {
            (Some(c), Some(h)) => f(c, h),
            _ => Ok(()),
        }
    }

    pub fn update_pointer(
        &mut self,
        x: f64,
        y: f64,
        color: Option<[f32; 3]>,
        id: &str,
    ) -> Result<(), FxError> {
        self.with_active(|c, h| c.update_pointer(h, x, y, color, id))
    }

    pub fn remove_pointer(&mut self, id: &str) -> Result<(), FxError> {
        self.with_active(|c, h| c.remove_pointer(h, id))
    }

    pub fn splash_at_client(
        &mut self,
        x: f64,
        y: f64,
        color: Option<[f32; 3]>,
        id: &str,
    ) -> Result<(), FxError> {
        self.with_active(|c, h| c.splash_at_client(h, x, y, color, id))
    }

    pub fn pause(&mut self) -> Result<(), FxError> {
        self.with_active(|c, h| c.pause(h))
    }

    pub fn play(&mut self) -> Result<(), FxError> {
        self.with_active(|c, h| c.play(h))
    }

    /// Re-read the canvas size; engines are told about CSS size changes.
    pub fn resize(&mut self) -> Result<(), FxError> {
        self.check_alive()?;
        dom::sync_canvas_backing_size(&self.canvas);
        let size = dom::css_size(&self.canvas);
        if size != self.viewport {
            self.viewport = size;
            if let Some(c) = self.controller.as_mut() {
                c.resize(size.0, size.1);
            }
        }
        Ok(())
    }

    pub fn resume_audio(&self) {
        if let Some(s) = &self.sound {
            s.resume();
        }
    }

    pub fn frame(&mut self) {
        if !self.liveness.is_alive() {
            return;
        }
        let now_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let dt = match self.last_ms {
            Some(prev) => input::frame_dt(prev, now_ms, MAX_FRAME_DT_SEC),
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let events = controller.frame(dt);
        if let Some(sound) = self.sound.as_mut() {
            sound.play(&events, self.viewport.0 as f32, now_ms);
        }
    }

    /// Idempotent teardown: drop the effect and its GPU resources, close
    /// audio. The loop sees the dead liveness flag and stops itself.
    pub fn destroy(&mut self) {
        if !self.liveness.is_alive() {
            return;
        }
        self.liveness.kill();
        self.pending = None;
        self.handle = None;
        if let Some(mut c) = self.controller.take() {
            c.deactivate();
        }
        if let Some(s) = self.sound.take() {
            s.close();
        }
        log::info!("[controller] destroyed");
    }
}

/// Owner of the self-rescheduling animation callback.
pub struct FrameLoop {
    tick: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
    raf_id: Rc<Cell<Option<i32>>>,
}

impl FrameLoop {
    pub fn start(ctx: Rc<RefCell<FrameContext>>) -> Self {
        let tick: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
        let raf_id = Rc::new(Cell::new(None));
        let tick_clone = tick.clone();
        let raf_clone = raf_id.clone();
        *tick.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            raf_clone.set(None);
            let outcome = input::run_tick(&*ctx, |c| c.liveness.is_alive(), FrameContext::frame);
            if outcome == TickOutcome::Busy {
                log::debug!("[frame] context busy; frame skipped");
            }
            if outcome.reschedule() {
                raf_clone.set(request_frame(&tick_clone));
            }
        }) as Box<dyn FnMut()>));
        raf_id.set(request_frame(&tick));
        Self { tick, raf_id }
    }

    /// Cancel the pending callback and break the closure's reference to
    /// itself. Call after `destroy`.
    pub fn stop(&self) {
        if let (Some(id), Some(w)) = (self.raf_id.take(), web::window()) {
            _ = w.cancel_animation_frame(id);
        }
        self.tick.borrow_mut().take();
    }
}

fn request_frame(tick: &Rc<RefCell<Option<Closure<dyn FnMut()>>>>) -> Option<i32> {
    let window = web::window()?;
    let tick = tick.borrow();
    let closure = tick.as_ref()?;
    window
        .request_animation_frame(closure.as_ref().unchecked_ref())
        .ok()
}
