//! Registry of named logical pointers.
//!
//! One entry per input source ("mouse", a touch id, an eye tracker, a remote
//! user). The registry knows nothing about the simulations that consume it:
//! it stores positions, colors and activity timestamps, and hands out
//! per-pointer resource slots.

use crate::error::{FxError, Result};
use fnv::FnvHashMap;
use glam::Vec2;
use std::collections::BTreeSet;

/// Id of the designated primary source unless configured otherwise.
pub const DEFAULT_PRIMARY_ID: &str = "mouse";

/// Slot reserved for the primary source.
pub const PRIMARY_SLOT: usize = 0;

#[derive(Clone, Debug, PartialEq)]
pub struct LogicalPointer {
    pub id: String,
    /// Viewport pixels, top-left origin, y down.
    pub position: Vec2,
    pub previous_position: Vec2,
    pub color: Option<[f32; 3]>,
    /// Registry clock reading of the most recent update.
    pub last_active_ms: f64,
    /// Registry-wide update counter; orders updates sharing a clock reading.
    pub seq: u64,
    pub slot: Option<usize>,
    /// Set on every update that changes the position, cleared by the
    /// consuming engine once it has reacted to the motion.
    pub moved: bool,
}

impl LogicalPointer {
    /// Motion between the last two samples.
    #[inline]
    pub fn delta(&self) -> Vec2 {
        self.position - self.previous_position
    }
}

#[inline]
pub fn is_valid_coordinate(x: f64, y: f64) -> bool {
    x.is_finite() && y.is_finite()
}

pub fn validate_coordinate(x: f64, y: f64) -> Result<Vec2> {
    if is_valid_coordinate(x, y) {
        Ok(Vec2::new(x as f32, y as f32))
    } else {
        Err(FxError::InvalidInput { x, y })
    }
}

pub struct PointerRegistry {
    pointers: FnvHashMap<String, LogicalPointer>,
    used_slots: BTreeSet<usize>,
    primary_id: Option<String>,
    clock_ms: f64,
    seq: u64,
}

impl Default for PointerRegistry {
    fn default() -> Self {
        Self::new(Some(DEFAULT_PRIMARY_ID.to_string()))
    }
}

impl PointerRegistry {
    pub fn new(primary_id: Option<String>) -> Self {
        Self {
            pointers: FnvHashMap::default(),
            used_slots: BTreeSet::new(),
            primary_id,
            clock_ms: 0.0,
            seq: 0,
        }
    }

    pub fn primary_id(&self) -> Option<&str> {
        self.primary_id.as_deref()
    }

    #[inline]
    pub fn is_primary(&self, id: &str) -> bool {
        self.primary_id.as_deref() == Some(id)
    }

    pub fn now_ms(&self) -> f64 {
        self.clock_ms
    }

    /// Advance the monotonic clock. Negative or non-finite steps are ignored.
    pub fn advance_clock(&mut self, dt_ms: f64) {
        if dt_ms.is_finite() && dt_ms > 0.0 {
            self.clock_ms += dt_ms;
        }
    }

    /// Create or update the pointer `id`.
    ///
    /// Returns `None` and leaves the registry untouched when either
    /// coordinate is not finite. An absent `color` keeps the previous one.
    pub fn upsert(
        &mut self,
        id: &str,
        x: f64,
        y: f64,
        color: Option<[f32; 3]>,
    ) -> Option<&LogicalPointer> {
        if !is_valid_coordinate(x, y) {
            return None;
        }
        let pos = Vec2::new(x as f32, y as f32);
        let now = self.clock_ms;
        self.seq += 1;
        let seq = self.seq;

        if !self.pointers.contains_key(id) {
            let slot = if self.is_primary(id) {
                self.used_slots.insert(PRIMARY_SLOT);
                Some(PRIMARY_SLOT)
            } else {
                None
            };
            self.pointers.insert(
                id.to_string(),
                LogicalPointer {
                    id: id.to_string(),
                    position: pos,
                    previous_position: pos,
                    color,
                    last_active_ms: now,
                    seq,
                    slot,
                    moved: false,
                },
            );
            log::debug!("[registry] new pointer {id} at ({x:.1},{y:.1})");
        } else if let Some(p) = self.pointers.get_mut(id) {
            p.previous_position = p.position;
            p.position = pos;
            if color.is_some() {
                p.color = color;
            }
            p.last_active_ms = now;
            p.seq = seq;
            if p.previous_position != pos {
                p.moved = true;
            }
        }
        self.pointers.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&LogicalPointer> {
        self.pointers.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut LogicalPointer> {
        self.pointers.get_mut(id)
    }

    /// Delete `id`, releasing its slot. Returns the removed pointer, or
    /// `None` if it was not present (removal is idempotent).
    pub fn remove(&mut self, id: &str) -> Option<LogicalPointer> {
        let removed = self.pointers.remove(id)?;
        if let Some(slot) = removed.slot {
            self.used_slots.remove(&slot);
        }
        log::debug!("[registry] removed pointer {id}");
        Some(removed)
    }

    pub fn list_active(&self) -> impl Iterator<Item = &LogicalPointer> {
        self.pointers.values()
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    /// The designated primary source, if it is present.
    pub fn designated_primary(&self) -> Option<&LogicalPointer> {
        self.primary_id.as_deref().and_then(|id| self.pointers.get(id))
    }

    /// The designated primary source if present, else the most recently
    /// active pointer. Updates within one clock reading are ordered by `seq`.
    pub fn primary(&self) -> Option<&LogicalPointer> {
        if let Some(p) = self.designated_primary() {
            return Some(p);
        }
        self.pointers.values().max_by(|a, b| {
            a.last_active_ms
                .total_cmp(&b.last_active_ms)
                .then(a.seq.cmp(&b.seq))
        })
    }

    /// Remove every non-primary pointer idle for longer than `timeout_ms`,
    /// returning the evicted entries.
    pub fn evict_idle(&mut self, timeout_ms: f64) -> Vec<LogicalPointer> {
        let cutoff = self.clock_ms - timeout_ms;
        let stale: Vec<String> = self
            .pointers
            .values()
            .filter(|p| !self.is_primary(&p.id) && p.last_active_ms < cutoff)
            .map(|p| p.id.clone())
            .collect();
        stale.iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Count-returning form of [`PointerRegistry::evict_idle`].
    pub fn sweep_idle(&mut self, timeout_ms: f64) -> usize {
        self.evict_idle(timeout_ms).len()
    }

    /// Give `id` the lowest free slot >= 1 unless it already holds one.
    /// The primary source always holds slot 0.
    pub fn allocate_slot(&mut self, id: &str) -> Option<usize> {
        let existing = self.pointers.get(id)?.slot;
        if existing.is_some() {
            return existing;
        }
        let slot = if self.is_primary(id) {
            PRIMARY_SLOT
        } else {
            self.lowest_free_slot()
        };
        self.used_slots.insert(slot);
        if let Some(p) = self.pointers.get_mut(id) {
            p.slot = Some(slot);
        }
        Some(slot)
    }

    pub fn release_slot(&mut self, id: &str) {
        if let Some(p) = self.pointers.get_mut(id) {
            if let Some(slot) = p.slot.take() {
                self.used_slots.remove(&slot);
            }
        }
    }

    /// Re-slot pointers holding a slot `>= capacity` whenever a lower slot
    /// is free, most recently active first.
    pub fn compact_slots(&mut self, capacity: usize) {
        if self.lowest_free_slot() >= capacity {
            return;
        }
        let mut overflow: Vec<(String, f64, u64)> = self
            .pointers
            .values()
            .filter(|p| !self.is_primary(&p.id) && p.slot.is_some_and(|s| s >= capacity))
            .map(|p| (p.id.clone(), p.last_active_ms, p.seq))
            .collect();
        overflow.sort_by(|a, b| b.1.total_cmp(&a.1).then(b.2.cmp(&a.2)));
        for (id, _, _) in overflow {
            if self.lowest_free_slot() >= capacity {
                break;
            }
            self.release_slot(&id);
            self.allocate_slot(&id);
        }
    }

    fn lowest_free_slot(&self) -> usize {
        (1..)
            .find(|s| !self.used_slots.contains(s))
            .unwrap_or(usize::MAX)
    }

    /// Clear the `moved` flag on every pointer.
    pub fn clear_motion(&mut self) {
        for p in self.pointers.values_mut() {
            p.moved = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_preserves_previous_position() {
        let mut reg = PointerRegistry::default();
        reg.upsert("a", 10.0, 10.0, None);
        let p = reg.upsert("a", 15.0, 12.0, None).cloned().unwrap();
        assert_eq!(p.previous_position, Vec2::new(10.0, 10.0));
        assert_eq!(p.delta(), Vec2::new(5.0, 2.0));
        assert!(p.moved);
    }

    #[test]
    fn absent_color_keeps_previous() {
        let mut reg = PointerRegistry::default();
        reg.upsert("a", 0.0, 0.0, Some([1.0, 0.0, 0.0]));
        reg.upsert("a", 1.0, 0.0, None);
        assert_eq!(reg.get("a").unwrap().color, Some([1.0, 0.0, 0.0]));
    }

    #[test]
    fn primary_gets_slot_zero_on_creation() {
        let mut reg = PointerRegistry::default();
        reg.upsert("mouse", 1.0, 1.0, None);
        reg.upsert("eyes-1", 1.0, 1.0, None);
        assert_eq!(reg.get("mouse").unwrap().slot, Some(0));
        assert_eq!(reg.get("eyes-1").unwrap().slot, None);
        assert_eq!(reg.allocate_slot("mouse"), Some(0));
    }

    #[test]
    fn allocate_is_idempotent_and_reuses_released() {
        let mut reg = PointerRegistry::default();
        for id in ["a", "b", "c"] {
            reg.upsert(id, 0.0, 0.0, None);
        }
        assert_eq!(reg.allocate_slot("a"), Some(1));
        assert_eq!(reg.allocate_slot("a"), Some(1));
        assert_eq!(reg.allocate_slot("b"), Some(2));
        reg.release_slot("a");
        assert_eq!(reg.allocate_slot("c"), Some(1));
        assert_eq!(reg.allocate_slot("unknown"), None);
    }

    #[test]
    fn primary_falls_back_to_most_recent() {
        let mut reg = PointerRegistry::default();
        reg.upsert("a", 0.0, 0.0, None);
        reg.advance_clock(10.0);
        reg.upsert("b", 0.0, 0.0, None);
        assert_eq!(reg.primary().unwrap().id, "b");
    }

    #[test]
    fn compact_moves_overflow_into_freed_slot() {
        let mut reg = PointerRegistry::default();
        for id in ["a", "b", "c"] {
            reg.upsert(id, 0.0, 0.0, None);
            reg.allocate_slot(id);
        }
        assert_eq!(reg.get("c").unwrap().slot, Some(3));
        reg.remove("a");
        reg.compact_slots(3);
        assert_eq!(reg.get("c").unwrap().slot, Some(1));
        assert_eq!(reg.get("b").unwrap().slot, Some(2));
    }
}
