#![cfg(target_arch = "wasm32")]
use cursorfx_core::EffectKind;
use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

mod audio;
mod constants;
mod dom;
mod events;
mod frame;
mod input;
mod render;
mod shaders;

use frame::{FrameContext, FrameLoop};

fn to_js(e: impl Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("cursorfx-web starting");
    Ok(())
}

/// Page-facing controller: one overlay canvas, at most one running effect.
#[wasm_bindgen]
pub struct CursorFx {
    ctx: Rc<RefCell<FrameContext>>,
    frame_loop: Rc<RefCell<Option<FrameLoop>>>,
    listeners: Option<events::Listeners>,
}

#[wasm_bindgen]
impl CursorFx {
    /// Mount the canvas and start acquiring the GPU. `ready()` turns true
    /// once that finishes; activations requested earlier are queued.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<CursorFx, JsValue> {
        let document = dom::window_document().ok_or_else(|| to_js("no document"))?;
        let canvas = dom::mount_canvas(&document).map_err(to_js)?;
        dom::sync_canvas_backing_size(&canvas);

        let sound = match audio::CollisionSound::new() {
            Ok(s) => Some(s),
            Err(e) => {
                log::warn!("[audio] disabled: {:?}", e);
                None
            }
        };
        let ctx = Rc::new(RefCell::new(FrameContext::new(canvas.clone(), sound)));
        let mut listeners = events::Listeners::default();
        events::wire_pointer_handlers(&ctx, &mut listeners);

        let frame_loop = Rc::new(RefCell::new(None));
        let token = ctx.borrow().liveness.token();
        let ctx_init = ctx.clone();
        let loop_init = frame_loop.clone();
        spawn_local(async move {
            let backend = match render::GpuBackend::new(&canvas).await {
                Ok(b) => b,
                Err(e) => {
                    log::error!("[gpu] init error: {:?}", e);
                    return;
                }
            };
            // destroyed while the adapter was pending
            if !token.is_alive() {
                log::info!("[gpu] init finished after destroy; dropped");
                return;
            }
            ctx_init.borrow_mut().attach_backend(backend);
            *loop_init.borrow_mut() = Some(FrameLoop::start(ctx_init));
            log::info!("[gpu] ready");
        });

        Ok(CursorFx {
            ctx,
            frame_loop,
            listeners: Some(listeners),
        })
    }

    pub fn ready(&self) -> bool {
        self.ctx.borrow().is_ready()
    }

    /// Switch to `kind` ("fluid", "balls", "metaballs"). `config_json` is an
    /// optional JSON object of overrides.
    pub fn activate(&self, kind: &str, config_json: Option<String>) -> Result<(), JsValue> {
        let kind = EffectKind::from_str(kind).map_err(to_js)?;
        let config = match config_json.as_deref().map(str::trim) {
            None | Some("") => serde_json::Value::Null,
            Some(json) => serde_json::from_str(json).map_err(to_js)?,
        };
        self.ctx.borrow_mut().activate(kind, config).map_err(to_js)
    }

    #[wasm_bindgen(js_name = activeEffect)]
    pub fn active_effect(&self) -> Option<String> {
        self.ctx
            .borrow()
            .active_kind()
            .map(|k| k.as_str().to_string())
    }

    #[wasm_bindgen(js_name = updatePointerPosition)]
    pub fn update_pointer_position(
        &self,
        x: f64,
        y: f64,
        color: Option<Vec<f32>>,
        id: &str,
    ) -> Result<(), JsValue> {
        let color = input::color_from_slice(color.as_deref());
        self.ctx
            .borrow_mut()
            .update_pointer(x, y, color, id)
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = removePointer)]
    pub fn remove_pointer(&self, id: &str) -> Result<(), JsValue> {
        self.ctx.borrow_mut().remove_pointer(id).map_err(to_js)
    }

    #[wasm_bindgen(js_name = splashAtClient)]
    pub fn splash_at_client(
        &self,
        x: f64,
        y: f64,
        color: Option<Vec<f32>>,
        id: &str,
    ) -> Result<(), JsValue> {
        let color = input::color_from_slice(color.as_deref());
        self.ctx
            .borrow_mut()
            .splash_at_client(x, y, color, id)
            .map_err(to_js)
    }

    pub fn pause(&self) -> Result<(), JsValue> {
        self.ctx.borrow_mut().pause().map_err(to_js)
    }

    pub fn play(&self) -> Result<(), JsValue> {
        self.ctx.borrow_mut().play().map_err(to_js)
    }

    pub fn resize(&self) -> Result<(), JsValue> {
        self.ctx.borrow_mut().resize().map_err(to_js)
    }

    /// Stop the loop, release GPU and audio, detach listeners. Safe to call
    /// more than once.
    pub fn destroy(&mut self) {
        self.ctx.borrow_mut().destroy();
        if let Some(l) = self.frame_loop.borrow_mut().take() {
            l.stop();
        }
        self.listeners = None;
    }
}
