use super::Listeners;
use crate::constants::{MOUSE_POINTER_ID, TOUCH_POINTER_PREFIX};
use crate::dom;
use crate::frame::FrameContext;
use crate::input;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use web_sys as web;

/// Mouse and touch ingress. The canvas ignores pointer events, so listeners
/// sit on the window and map client coordinates onto the canvas.
pub fn wire_pointer_handlers(ctx: &Rc<RefCell<FrameContext>>, listeners: &mut Listeners) {
    let Some(window) = web::window() else {
        return;
    };
    let target: &web::EventTarget = window.as_ref();

    let c = ctx.clone();
    listeners.add(target, "mousemove", move |ev| {
        if let Some(ev) = ev.dyn_ref::<web::MouseEvent>() {
            route(&c, ev.client_x() as f64, ev.client_y() as f64, MOUSE_POINTER_ID);
        }
    });

    // first gesture unlocks audio
    let c = ctx.clone();
    listeners.add(target, "pointerdown", move |_ev| {
        if let Ok(c) = c.try_borrow() {
            c.resume_audio();
        }
    });

    for event in ["touchstart", "touchmove"] {
        let c = ctx.clone();
        listeners.add(target, event, move |ev| {
            let Some(ev) = ev.dyn_ref::<web::TouchEvent>() else {
                return;
            };
            let touches = ev.changed_touches();
            for i in 0..touches.length() {
                if let Some(t) = touches.get(i) {
                    let id = input::touch_pointer_id(TOUCH_POINTER_PREFIX, t.identifier());
                    route(&c, t.client_x() as f64, t.client_y() as f64, &id);
                }
            }
        });
    }

    for event in ["touchend", "touchcancel"] {
        let c = ctx.clone();
        listeners.add(target, event, move |ev| {
            let Some(ev) = ev.dyn_ref::<web::TouchEvent>() else {
                return;
            };
            let Ok(mut c) = c.try_borrow_mut() else {
                return;
            };
            let touches = ev.changed_touches();
            for i in 0..touches.length() {
                if let Some(t) = touches.get(i) {
                    let id = input::touch_pointer_id(TOUCH_POINTER_PREFIX, t.identifier());
                    _ = c.remove_pointer(&id);
                }
            }
        });
    }

    let c = ctx.clone();
    listeners.add(target, "resize", move |_ev| {
        if let Ok(mut c) = c.try_borrow_mut() {
            _ = c.resize();
        }
    });
}

fn route(ctx: &Rc<RefCell<FrameContext>>, client_x: f64, client_y: f64, id: &str) {
    let Ok(mut c) = ctx.try_borrow_mut() else {
        return;
    };
    let rect = dom::canvas_rect(&c.canvas);
    if let Some((x, y)) = input::client_to_canvas(client_x, client_y, &rect) {
        _ = c.update_pointer(x, y, None, id);
    }
}
