// Pure pointer helpers. No web-sys here; the DOM layer extracts numbers and
// passes them in so these can be tested on the host.

use glam::Vec2;

/// CSS rectangle of the canvas in client coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClientRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Client (CSS px) coordinates to canvas-relative CSS px.
///
/// The engines work in the viewport pixels they were sized with, which are
/// the canvas CSS size, not its backing store.
#[inline]
pub fn client_to_canvas(client_x: f64, client_y: f64, rect: &ClientRect) -> Option<(f64, f64)> {
    if !(rect.width > 0.0 && rect.height > 0.0) {
        return None;
    }
    let x = client_x - rect.left;
    let y = client_y - rect.top;
    (x.is_finite() && y.is_finite()).then_some((x, y))
}

#[inline]
pub fn touch_pointer_id(prefix: &str, identifier: i32) -> String {
    format!("{prefix}{identifier}")
}

/// CSS size times device pixel ratio, never zero.
#[inline]
pub fn backing_size(css_width: f64, css_height: f64, dpr: f64) -> (u32, u32) {
    let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
    let w = (css_width.max(0.0) * dpr).round() as u32;
    let h = (css_height.max(0.0) * dpr).round() as u32;
    (w.max(1), h.max(1))
}

/// Seconds between two timestamps in ms, bounded to `[0, max_sec]`.
#[inline]
pub fn frame_dt(prev_ms: f64, now_ms: f64, max_sec: f32) -> f32 {
    let dt = ((now_ms - prev_ms) / 1000.0) as f32;
    if dt.is_finite() {
        dt.clamp(0.0, max_sec)
    } else {
        0.0
    }
}

/// Collision position as a stereo pan in `[-1, 1]`.
#[inline]
pub fn pan_for(position: Vec2, viewport_width: f32) -> f32 {
    if viewport_width <= 0.0 {
        return 0.0;
    }
    (position.x / viewport_width * 2.0 - 1.0).clamp(-1.0, 1.0)
}

/// Whether enough time has passed since the last sound.
#[inline]
pub fn sound_due(last_ms: Option<f64>, now_ms: f64, min_interval_ms: f64) -> bool {
    match last_ms {
        Some(last) => now_ms - last >= min_interval_ms,
        None => true,
    }
}

/// Parse an optional `[r, g, b]` color from a JS-supplied slice.
#[inline]
pub fn color_from_slice(values: Option<&[f32]>) -> Option<[f32; 3]> {
    match values {
        Some([r, g, b, ..]) if r.is_finite() && g.is_finite() && b.is_finite() => Some([*r, *g, *b]),
        _ => None,
    }
}

/// Result of one animation callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Ran,
    /// The shared state was borrowed further up the stack; skip this frame.
    Busy,
    /// Torn down. The loop ends here.
    Stopped,
}

impl TickOutcome {
    #[inline]
    pub fn reschedule(self) -> bool {
        self != TickOutcome::Stopped
    }
}

/// Run `frame` against `ctx` unless it is busy or no longer `alive`.
pub fn run_tick<T>(
    ctx: &std::cell::RefCell<T>,
    alive: impl Fn(&T) -> bool,
    frame: impl FnOnce(&mut T),
) -> TickOutcome {
    let Ok(mut c) = ctx.try_borrow_mut() else {
        return TickOutcome::Busy;
    };
    if !alive(&c) {
        return TickOutcome::Stopped;
    }
    frame(&mut c);
    TickOutcome::Ran
}
