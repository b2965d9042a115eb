// Host-side tests for pure input functions.
// The main crate is wasm-only, so we include the pure-Rust modules directly.

#![allow(dead_code)]
mod input {
    include!("../src/input.rs");
}

use glam::Vec2;
use input::*;

fn rect() -> ClientRect {
    ClientRect {
        left: 100.0,
        top: 50.0,
        width: 800.0,
        height: 600.0,
    }
}

#[test]
fn client_coordinates_are_relative_to_the_canvas() {
    assert_eq!(client_to_canvas(100.0, 50.0, &rect()), Some((0.0, 0.0)));
    assert_eq!(client_to_canvas(500.0, 350.0, &rect()), Some((400.0, 300.0)));
    // outside the canvas still maps; engines clamp or ignore as they see fit
    assert_eq!(client_to_canvas(0.0, 0.0, &rect()), Some((-100.0, -50.0)));
}

#[test]
fn collapsed_canvas_or_bad_input_maps_to_nothing() {
    let collapsed = ClientRect {
        width: 0.0,
        ..rect()
    };
    assert_eq!(client_to_canvas(10.0, 10.0, &collapsed), None);
    assert_eq!(client_to_canvas(f64::NAN, 10.0, &rect()), None);
    assert_eq!(client_to_canvas(10.0, f64::INFINITY, &rect()), None);
}

#[test]
fn touch_ids_are_stable_per_identifier() {
    assert_eq!(touch_pointer_id("touch-", 0), "touch-0");
    assert_eq!(touch_pointer_id("touch-", 17), touch_pointer_id("touch-", 17));
    assert_ne!(touch_pointer_id("touch-", 1), touch_pointer_id("touch-", 2));
}

#[test]
fn backing_size_scales_by_pixel_ratio_and_never_hits_zero() {
    assert_eq!(backing_size(400.0, 300.0, 2.0), (800, 600));
    assert_eq!(backing_size(0.0, 0.0, 2.0), (1, 1));
    assert_eq!(backing_size(100.0, 100.0, f64::NAN), (100, 100));
    assert_eq!(backing_size(100.0, 100.0, -1.0), (100, 100));
}

#[test]
fn frame_dt_is_bounded() {
    assert!((frame_dt(1000.0, 1016.0, 0.25) - 0.016).abs() < 1e-6);
    assert_eq!(frame_dt(1000.0, 9000.0, 0.25), 0.25);
    // clocks never run backwards for an engine
    assert_eq!(frame_dt(1000.0, 900.0, 0.25), 0.0);
    assert_eq!(frame_dt(f64::NAN, 900.0, 0.25), 0.0);
}

#[test]
fn pan_follows_horizontal_position() {
    assert_eq!(pan_for(Vec2::new(0.0, 10.0), 800.0), -1.0);
    assert_eq!(pan_for(Vec2::new(400.0, 10.0), 800.0), 0.0);
    assert_eq!(pan_for(Vec2::new(800.0, 10.0), 800.0), 1.0);
    assert_eq!(pan_for(Vec2::new(5000.0, 10.0), 800.0), 1.0);
    assert_eq!(pan_for(Vec2::new(10.0, 10.0), 0.0), 0.0);
}

#[test]
fn sounds_are_throttled() {
    assert!(sound_due(None, 0.0, 60.0));
    assert!(!sound_due(Some(100.0), 130.0, 60.0));
    assert!(sound_due(Some(100.0), 160.0, 60.0));
}

#[test]
fn colors_need_three_finite_components() {
    assert_eq!(color_from_slice(None), None);
    assert_eq!(color_from_slice(Some(&[0.1, 0.2][..])), None);
    assert_eq!(color_from_slice(Some(&[0.1, f32::NAN, 0.3][..])), None);
    assert_eq!(color_from_slice(Some(&[0.1, 0.2, 0.3][..])), Some([0.1, 0.2, 0.3]));
    assert_eq!(color_from_slice(Some(&[0.1, 0.2, 0.3, 1.0][..])), Some([0.1, 0.2, 0.3]));
}

#[test]
fn busy_tick_skips_the_frame_but_keeps_the_loop() {
    let ctx = std::cell::RefCell::new((true, 0u32));
    let held = ctx.borrow_mut();
    let outcome = run_tick(&ctx, |c| c.0, |c| c.1 += 1);
    assert_eq!(outcome, TickOutcome::Busy);
    assert!(outcome.reschedule());
    drop(held);

    assert_eq!(run_tick(&ctx, |c| c.0, |c| c.1 += 1), TickOutcome::Ran);
    assert_eq!(ctx.borrow().1, 1);
}

#[test]
fn dead_context_stops_the_loop() {
    let ctx = std::cell::RefCell::new((false, 0u32));
    let outcome = run_tick(&ctx, |c| c.0, |c| c.1 += 1);
    assert_eq!(outcome, TickOutcome::Stopped);
    assert!(!outcome.reschedule());
    assert_eq!(ctx.borrow().1, 0);
}
