use crate::constants::{CANVAS_ID, CANVAS_Z_INDEX};
use crate::input::{self, ClientRect};
use wasm_bindgen::JsCast;
use web_sys as web;

#[inline]
pub fn window_document() -> Option<web::Document> {
    web::window().and_then(|w| w.document())
}

/// Find our canvas, or create a full-viewport overlay that ignores pointer
/// events so the page underneath stays interactive.
pub fn mount_canvas(document: &web::Document) -> anyhow::Result<web::HtmlCanvasElement> {
    if let Some(el) = document.get_element_by_id(CANVAS_ID) {
        return el
            .dyn_into::<web::HtmlCanvasElement>()
            .map_err(|e| anyhow::anyhow!("#{CANVAS_ID} is not a canvas: {:?}", e));
    }
    let canvas: web::HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(|e| anyhow::anyhow!("create canvas: {:?}", e))?
        .dyn_into()
        .map_err(|e| anyhow::anyhow!("{:?}", e))?;
    canvas.set_id(CANVAS_ID);
    let style = canvas.style();
    for (k, v) in [
        ("position", "fixed"),
        ("left", "0"),
        ("top", "0"),
        ("width", "100vw"),
        ("height", "100vh"),
        ("pointer-events", "none"),
    ] {
        _ = style.set_property(k, v);
    }
    _ = style.set_property("z-index", &CANVAS_Z_INDEX.to_string());
    let body = document
        .body()
        .ok_or_else(|| anyhow::anyhow!("document has no body"))?;
    body.append_child(&canvas)
        .map_err(|e| anyhow::anyhow!("append canvas: {:?}", e))?;
    log::info!("[dom] mounted #{CANVAS_ID}");
    Ok(canvas)
}

pub fn canvas_rect(canvas: &web::HtmlCanvasElement) -> ClientRect {
    let rect = canvas.get_bounding_client_rect();
    ClientRect {
        left: rect.left(),
        top: rect.top(),
        width: rect.width(),
        height: rect.height(),
    }
}

/// Canvas size in CSS pixels; the space pointer coordinates arrive in.
pub fn css_size(canvas: &web::HtmlCanvasElement) -> (u32, u32) {
    let rect = canvas_rect(canvas);
    input::backing_size(rect.width, rect.height, 1.0)
}

/// Keep the backing store at CSS size times devicePixelRatio. Returns the
/// new backing size when it changed.
pub fn sync_canvas_backing_size(canvas: &web::HtmlCanvasElement) -> Option<(u32, u32)> {
    let dpr = web::window()?.device_pixel_ratio();
    let rect = canvas_rect(canvas);
    let (w, h) = input::backing_size(rect.width, rect.height, dpr);
    if canvas.width() == w && canvas.height() == h {
        return None;
    }
    canvas.set_width(w);
    canvas.set_height(h);
    Some((w, h))
}
