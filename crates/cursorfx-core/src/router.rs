//! Unified pointer ingress.
//!
//! Every transport (DOM mouse/touch handlers, a parent frame relaying eye
//! gaze, a remote multi-user relay) funnels through [`InputRouter::route_pointer`].
//! Updates are applied synchronously; the frame loop reads whatever state the
//! registry holds when it runs.

use crate::config::PointerSettings;
use crate::pointer::{validate_coordinate, LogicalPointer, PointerRegistry};
use glam::Vec2;

/// Motion derived from one accepted pointer sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerMotion {
    /// Pixels moved since the previous sample.
    pub delta: Vec2,
    pub is_new: bool,
}

/// Implemented by each simulation so it can adapt the generic pointer into
/// the shape it consumes (texture coordinates, world space, field sources).
pub trait PointerSink {
    fn on_pointer_changed(&mut self, pointer: &LogicalPointer, motion: PointerMotion);

    /// Called after `pointer` has left the registry (explicit removal or
    /// idle eviction); its slot is already released.
    fn on_pointer_removed(&mut self, _pointer: &LogicalPointer) {}
}

/// Whether the router reserves a registry slot for each non-primary source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotPolicy {
    None,
    Allocate,
}

pub struct InputRouter<S: PointerSink> {
    registry: PointerRegistry,
    sink: S,
    slot_policy: SlotPolicy,
}

impl<S: PointerSink> InputRouter<S> {
    pub fn new(registry: PointerRegistry, sink: S, slot_policy: SlotPolicy) -> Self {
        Self {
            registry,
            sink,
            slot_policy,
        }
    }

    /// Apply one pointer sample. Non-finite coordinates are dropped without
    /// touching any state; `None` is returned in that case.
    pub fn route_pointer(
        &mut self,
        x: f64,
        y: f64,
        color: Option<[f32; 3]>,
        id: &str,
    ) -> Option<PointerMotion> {
        if let Err(e) = validate_coordinate(x, y) {
            log::debug!("[router] dropped sample for {id}: {e}");
            return None;
        }
        let is_new = self.registry.get(id).is_none();
        self.registry.upsert(id, x, y, color)?;
        if self.slot_policy == SlotPolicy::Allocate && !self.registry.is_primary(id) {
            self.registry.allocate_slot(id);
        }
        let pointer = self.registry.get(id)?;
        let motion = PointerMotion {
            delta: pointer.delta(),
            is_new,
        };
        self.sink.on_pointer_changed(pointer, motion);
        Some(motion)
    }

    /// Explicit disconnect. Safe to call for unknown ids.
    pub fn remove_pointer(&mut self, id: &str) {
        if let Some(removed) = self.registry.remove(id) {
            self.sink.on_pointer_removed(&removed);
        }
    }

    /// Evict idle non-primary pointers, notifying the sink for each.
    pub fn sweep_idle(&mut self, timeout_ms: f64) -> usize {
        let evicted = self.registry.evict_idle(timeout_ms);
        for p in &evicted {
            self.sink.on_pointer_removed(p);
        }
        if !evicted.is_empty() {
            log::info!("[router] evicted {} idle pointer(s)", evicted.len());
        }
        evicted.len()
    }

    pub fn registry(&self) -> &PointerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PointerRegistry {
        &mut self.registry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Split borrow used by the frame step: the simulation reads the
    /// registry while mutating itself.
    pub fn parts_mut(&mut self) -> (&mut PointerRegistry, &mut S) {
        (&mut self.registry, &mut self.sink)
    }
}

/// Drives the registry clock and the periodic idle sweep from inside an
/// engine's frame step.
#[derive(Clone, Debug)]
pub struct IdleSweeper {
    interval_sec: f32,
    timeout_ms: f64,
    elapsed: f32,
}

impl IdleSweeper {
    pub fn new(settings: &PointerSettings) -> Self {
        Self {
            interval_sec: settings.sweep_interval_sec,
            timeout_ms: settings.idle_timeout_ms,
            elapsed: 0.0,
        }
    }

    /// Advance by `dt` simulation seconds; returns the number of pointers
    /// evicted this tick.
    pub fn tick<S: PointerSink>(&mut self, router: &mut InputRouter<S>, dt: f32) -> usize {
        router.registry_mut().advance_clock(f64::from(dt) * 1000.0);
        self.elapsed += dt;
        if self.elapsed < self.interval_sec {
            return 0;
        }
        self.elapsed = 0.0;
        router.sweep_idle(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        changed: Vec<(String, PointerMotion)>,
        removed: Vec<String>,
    }

    impl PointerSink for Recorder {
        fn on_pointer_changed(&mut self, pointer: &LogicalPointer, motion: PointerMotion) {
            self.changed.push((pointer.id.clone(), motion));
        }
        fn on_pointer_removed(&mut self, pointer: &LogicalPointer) {
            self.removed.push(pointer.id.clone());
        }
    }

    fn router(policy: SlotPolicy) -> InputRouter<Recorder> {
        InputRouter::new(PointerRegistry::default(), Recorder::default(), policy)
    }

    #[test]
    fn delta_is_reported_to_sink() {
        let mut r = router(SlotPolicy::None);
        let first = r.route_pointer(10.0, 10.0, None, "mouse").unwrap();
        assert!(first.is_new);
        assert_eq!(first.delta, Vec2::ZERO);
        let second = r.route_pointer(13.0, 6.0, None, "mouse").unwrap();
        assert!(!second.is_new);
        assert_eq!(second.delta, Vec2::new(3.0, -4.0));
        assert_eq!(r.sink().changed.len(), 2);
    }

    #[test]
    fn malformed_samples_never_reach_sink() {
        let mut r = router(SlotPolicy::Allocate);
        assert!(r.route_pointer(f64::NAN, 5.0, None, "x").is_none());
        assert!(r.route_pointer(1.0, f64::INFINITY, None, "x").is_none());
        assert!(r.registry().get("x").is_none());
        assert!(r.sink().changed.is_empty());
    }

    #[test]
    fn allocate_policy_reserves_slots_for_secondary_sources() {
        let mut r = router(SlotPolicy::Allocate);
        r.route_pointer(0.0, 0.0, None, "mouse");
        r.route_pointer(0.0, 0.0, None, "eyes-1");
        r.route_pointer(0.0, 0.0, None, "remote-7");
        assert_eq!(r.registry().get("mouse").unwrap().slot, Some(0));
        assert_eq!(r.registry().get("eyes-1").unwrap().slot, Some(1));
        assert_eq!(r.registry().get("remote-7").unwrap().slot, Some(2));
    }

    #[test]
    fn removal_notifies_once() {
        let mut r = router(SlotPolicy::None);
        r.route_pointer(0.0, 0.0, None, "eyes-1");
        r.remove_pointer("eyes-1");
        r.remove_pointer("eyes-1");
        assert_eq!(r.sink().removed, vec!["eyes-1".to_string()]);
    }

    #[test]
    fn sweeper_runs_on_interval() {
        let mut r = router(SlotPolicy::None);
        let mut sweeper = IdleSweeper::new(&PointerSettings::default());
        r.route_pointer(0.0, 0.0, None, "eyes-1");
        // 1.5 s: not yet due
        for _ in 0..90 {
            assert_eq!(sweeper.tick(&mut r, 1.0 / 60.0), 0);
        }
        for _ in 0..300 {
            sweeper.tick(&mut r, 1.0 / 60.0);
        }
        assert!(r.registry().get("eyes-1").is_none());
        assert_eq!(r.sink().removed, vec!["eyes-1".to_string()]);
    }

    #[test]
    fn sweep_notifies_sink_for_evicted() {
        let mut r = router(SlotPolicy::None);
        r.route_pointer(0.0, 0.0, None, "mouse");
        r.route_pointer(0.0, 0.0, None, "eyes-1");
        r.registry_mut().advance_clock(10_000.0);
        assert_eq!(r.sweep_idle(5_000.0), 1);
        assert_eq!(r.sink().removed, vec!["eyes-1".to_string()]);
        assert!(r.registry().get("mouse").is_some());
    }
}
