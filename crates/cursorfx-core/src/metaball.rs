//! Metaball field sources: a fixed set of orbiting blobs plus one blob per
//! active pointer, up to a cap.
//!
//! Positions are in viewport-height units with a top-left origin, so `x`
//! spans `[0, aspect]` and `y` spans `[0, 1]`. Radii use the same unit.
//! The renderer sums `r^2 / d^2` over [`MetaballEngine::sources`] per pixel;
//! [`MetaballEngine::field_at`] evaluates the same sum on the CPU.

use crate::config::{EngineConfig, MetaballConfig};
use crate::effect::{collision_intensity, push_collision, CollisionEvent, Collisions};
use crate::error::Result;
use crate::lifecycle::EngineState;
use crate::pointer::{LogicalPointer, PointerRegistry};
use crate::router::{IdleSweeper, InputRouter, PointerMotion, PointerSink, SlotPolicy};
use fnv::{FnvHashMap, FnvHashSet};
use glam::Vec2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f32::consts::TAU;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldSource {
    pub position: Vec2,
    pub radius: f32,
    pub color: [f32; 3],
}

/// Closed-form elliptical path, seeded once.
#[derive(Clone, Copy, Debug)]
struct Orbit {
    /// Centre in `[0, 1]^2`; x is stretched by the aspect ratio on use.
    centre: Vec2,
    extent: Vec2,
    phase: f32,
    angular_speed: f32,
    radius: f32,
    color: [f32; 3],
}

impl Orbit {
    fn position(&self, t: f32, aspect: f32) -> Vec2 {
        let a = self.phase + self.angular_speed * t;
        let p = self.centre + self.extent * Vec2::new(a.cos(), a.sin());
        Vec2::new(p.x * aspect, p.y)
    }
}

#[derive(Clone, Debug)]
struct PointerBlob {
    position: Vec2,
    color: [f32; 3],
    speed: f32,
    /// Bit k set while touching orbit k.
    touching: u64,
}

pub struct MetaballSim {
    config: MetaballConfig,
    viewport: (u32, u32),
    orbits: Vec<Orbit>,
    blobs: FnvHashMap<String, PointerBlob>,
    palette_cursor: usize,
    time: f32,
    collisions: Collisions,
}

impl MetaballSim {
    fn new(config: MetaballConfig, width: u32, height: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let orbits = (0..config.fixed_count)
            .map(|i| {
                let direction = if rng.gen::<bool>() { 1.0 } else { -1.0 };
                Orbit {
                    centre: Vec2::new(rng.gen_range(0.25..0.75), rng.gen_range(0.25..0.75)),
                    extent: Vec2::new(rng.gen_range(0.05..0.25), rng.gen_range(0.05..0.25)),
                    phase: rng.gen::<f32>() * TAU,
                    angular_speed: direction * config.speed * rng.gen_range(0.5..1.5),
                    radius: if config.max_radius > config.min_radius {
                        rng.gen_range(config.min_radius..config.max_radius)
                    } else {
                        config.min_radius
                    },
                    color: config.palette[i % config.palette.len()],
                }
            })
            .collect();
        Self {
            viewport: (width.max(1), height.max(1)),
            orbits,
            blobs: FnvHashMap::default(),
            palette_cursor: 0,
            time: 0.0,
            collisions: Collisions::new(),
            config,
        }
    }

    fn aspect(&self) -> f32 {
        self.viewport.0 as f32 / self.viewport.1 as f32
    }

    fn to_field_space(&self, client: Vec2) -> Vec2 {
        client / self.viewport.1 as f32
    }

    fn to_client(&self, p: Vec2) -> Vec2 {
        p * self.viewport.1 as f32
    }

    /// Pointers that get a field source: the holders of the lowest
    /// `max_pointer_sources` slots in use, whatever their numbers are.
    fn visible_pointers<'r>(&self, registry: &'r PointerRegistry) -> Vec<&'r LogicalPointer> {
        let mut pointers: Vec<&LogicalPointer> =
            registry.list_active().filter(|p| p.slot.is_some()).collect();
        pointers.sort_by_key(|p| p.slot);
        pointers.truncate(self.config.max_pointer_sources);
        pointers
    }

    fn advance(&mut self, registry: &PointerRegistry, dt: f32) {
        self.time += dt;
        let aspect = self.aspect();
        let orbit_positions: Vec<Vec2> = self.orbits.iter().map(|o| o.position(self.time, aspect)).collect();

        let visible_ids: FnvHashSet<&str> = self
            .visible_pointers(registry)
            .into_iter()
            .map(|p| p.id.as_str())
            .collect();
        for pointer in registry.list_active() {
            let target = self.to_field_space(pointer.position);
            let visible = visible_ids.contains(pointer.id.as_str());
            let Some(blob) = self.blobs.get_mut(&pointer.id) else {
                continue;
            };
            let before = blob.position;
            blob.position += (target - before) * self.config.ease_factor;
            blob.speed = if dt > 0.0 { (blob.position - before).length() / dt } else { 0.0 };
            if !visible {
                blob.touching = 0;
                continue;
            }

            let r = self.config.pointer_radius;
            for (k, (orbit, op)) in self.orbits.iter().zip(&orbit_positions).enumerate().take(64) {
                let reach = r + orbit.radius;
                let dist = blob.position.distance(*op);
                let bit = 1u64 << k;
                if dist >= reach {
                    blob.touching &= !bit;
                    continue;
                }
                if blob.touching & bit != 0 {
                    continue;
                }
                blob.touching |= bit;
                let intensity = collision_intensity(
                    (reach - dist) / reach,
                    blob.speed / self.config.reference_speed,
                    self.config.intensity_overlap_weight,
                    self.config.intensity_speed_weight,
                );
                let contact = blob.position + (*op - blob.position) * (r / reach);
                push_collision(
                    &mut self.collisions,
                    CollisionEvent {
                        intensity,
                        position: contact * self.viewport.1 as f32,
                    },
                );
            }
        }
    }

    fn sources(&self, registry: &PointerRegistry) -> Vec<FieldSource> {
        let aspect = self.aspect();
        let mut out: Vec<FieldSource> = self
            .orbits
            .iter()
            .map(|o| FieldSource {
                position: o.position(self.time, aspect),
                radius: o.radius,
                color: o.color,
            })
            .collect();
        for p in self.visible_pointers(registry) {
            if let Some(blob) = self.blobs.get(&p.id) {
                out.push(FieldSource {
                    position: blob.position,
                    radius: self.config.pointer_radius,
                    color: blob.color,
                });
            }
        }
        out
    }
}

impl PointerSink for MetaballSim {
    fn on_pointer_changed(&mut self, pointer: &LogicalPointer, _motion: PointerMotion) {
        let start = self.to_field_space(pointer.position);
        let palette = &self.config.palette;
        let cursor = &mut self.palette_cursor;
        let blob = self.blobs.entry(pointer.id.clone()).or_insert_with(|| {
            let color = palette[*cursor % palette.len()];
            *cursor += 1;
            PointerBlob {
                position: start,
                color,
                speed: 0.0,
                touching: 0,
            }
        });
        if let Some(c) = pointer.color {
            blob.color = c;
        }
    }

    fn on_pointer_removed(&mut self, pointer: &LogicalPointer) {
        self.blobs.remove(&pointer.id);
    }
}

pub struct MetaballEngine {
    router: InputRouter<MetaballSim>,
    state: EngineState,
    sweeper: IdleSweeper,
    pending_resize: Option<(u32, u32)>,
}

impl MetaballEngine {
    pub fn new(config: MetaballConfig, width: u32, height: u32) -> Result<Self> {
        config.validate()?;
        let registry = PointerRegistry::new(config.pointers.primary_id.clone());
        let sweeper = IdleSweeper::new(&config.pointers);
        let sim = MetaballSim::new(config, width, height);
        log::info!("[metaballs] created with {} orbiting sources", sim.orbits.len());
        Ok(Self {
            router: InputRouter::new(registry, sim, SlotPolicy::Allocate),
            state: EngineState::Running,
            sweeper,
            pending_resize: None,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &MetaballConfig {
        &self.router.sink().config
    }

    pub fn registry(&self) -> &PointerRegistry {
        self.router.registry()
    }

    pub fn update_pointer(&mut self, x: f64, y: f64, color: Option<[f32; 3]>, id: &str) {
        if self.state.is_destroyed() {
            return;
        }
        self.router.route_pointer(x, y, color, id);
    }

    pub fn remove_pointer(&mut self, id: &str) {
        if self.state.is_destroyed() {
            return;
        }
        self.router.remove_pointer(id);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.state.is_destroyed() {
            return;
        }
        self.pending_resize = Some((width, height));
    }

    pub fn step(&mut self, dt: f32) {
        if self.state.is_destroyed() {
            return;
        }
        if let Some((w, h)) = self.pending_resize.take() {
            self.router.sink_mut().viewport = (w.max(1), h.max(1));
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.sweeper.tick(&mut self.router, dt);
        if !self.state.is_stepping() {
            return;
        }
        let cap = self.router.sink().config.max_pointer_sources;
        self.router.registry_mut().compact_slots(cap);
        let (registry, sim) = self.router.parts_mut();
        sim.advance(registry, dt);
        registry.clear_motion();
    }

    pub fn pause(&mut self) {
        self.state = self.state.paused();
    }

    pub fn play(&mut self) {
        self.state = self.state.resumed();
    }

    pub fn destroy(&mut self) {
        if self.state.is_destroyed() {
            return;
        }
        self.state = EngineState::Destroyed;
        let sim = self.router.sink_mut();
        sim.orbits = Vec::new();
        sim.blobs.clear();
        sim.collisions.clear();
        log::info!("[metaballs] destroyed");
    }

    pub fn drain_collisions(&mut self) -> Collisions {
        std::mem::take(&mut self.router.sink_mut().collisions)
    }

    /// Orbiting sources first, then pointer sources in slot order.
    pub fn sources(&self) -> Vec<FieldSource> {
        self.router.sink().sources(self.router.registry())
    }

    /// Largest source count [`MetaballEngine::sources`] can return.
    pub fn max_sources(&self) -> usize {
        let cfg = self.config();
        cfg.fixed_count + cfg.max_pointer_sources
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.router.sink().viewport
    }

    /// Field value at a point in field space.
    pub fn field_at(&self, p: Vec2) -> f32 {
        self.sources()
            .iter()
            .map(|s| s.radius * s.radius / p.distance_squared(s.position).max(1e-6))
            .sum()
    }

    pub fn field_at_client(&self, x: f32, y: f32) -> f32 {
        let p = self.router.sink().to_field_space(Vec2::new(x, y));
        self.field_at(p)
    }

    /// Viewport pixel of a field-space point.
    pub fn to_client(&self, p: Vec2) -> Vec2 {
        self.router.sink().to_client(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(config: MetaballConfig) -> MetaballEngine {
        MetaballEngine::new(config, 800, 600).unwrap()
    }

    #[test]
    fn pointer_sources_follow_fixed_ones() {
        let mut e = engine(MetaballConfig::default());
        e.update_pointer(400.0, 300.0, Some([1.0, 1.0, 1.0]), "mouse");
        e.step(1.0 / 60.0);
        let sources = e.sources();
        assert_eq!(sources.len(), 9);
        let last = sources[8];
        assert_eq!(last.color, [1.0, 1.0, 1.0]);
        assert!((last.position - Vec2::new(400.0 / 600.0, 0.5)).length() < 1e-5);
    }

    #[test]
    fn pointer_easing_moves_part_way() {
        let mut e = engine(MetaballConfig {
            ease_factor: 0.5,
            ..MetaballConfig::default()
        });
        e.update_pointer(0.0, 0.0, None, "mouse");
        e.update_pointer(600.0, 0.0, None, "mouse");
        e.step(1.0 / 60.0);
        let p = e.sources().last().unwrap().position;
        assert!((p.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn sources_past_the_cap_are_dropped_until_a_slot_frees() {
        let mut e = engine(MetaballConfig {
            fixed_count: 2,
            max_pointer_sources: 3,
            ..MetaballConfig::default()
        });
        for id in ["mouse", "a", "b", "c"] {
            e.update_pointer(100.0, 100.0, None, id);
        }
        e.step(0.01);
        assert_eq!(e.registry().len(), 4);
        assert_eq!(e.sources().len(), 2 + 3);
        e.remove_pointer("a");
        e.step(0.01);
        assert_eq!(e.registry().get("c").unwrap().slot, Some(1));
        assert_eq!(e.sources().len(), 2 + 3);
    }

    #[test]
    fn full_cap_of_remote_pointers_is_drawn_without_a_mouse() {
        let mut e = engine(MetaballConfig {
            fixed_count: 0,
            max_pointer_sources: 16,
            ..MetaballConfig::default()
        });
        for i in 0..17 {
            e.update_pointer(20.0 * i as f64, 100.0, None, &format!("remote-{i}"));
        }
        e.step(0.01);
        assert_eq!(e.registry().len(), 17);
        let sources = e.sources();
        assert_eq!(sources.len(), 16);
        // the 17th holds slot 17 and is the one left out
        let dropped = Vec2::new(20.0 * 16.0 / 600.0, 100.0 / 600.0);
        assert!(sources.iter().all(|s| s.position.distance(dropped) > 1e-4));

        e.remove_pointer("remote-3");
        e.step(0.01);
        assert_eq!(e.sources().len(), 16);
    }

    #[test]
    fn field_peaks_near_sources() {
        let mut e = engine(MetaballConfig {
            fixed_count: 0,
            ..MetaballConfig::default()
        });
        e.update_pointer(300.0, 300.0, None, "mouse");
        e.step(0.0);
        let r = e.config().pointer_radius;
        let at_edge = e.field_at(Vec2::new(0.5 + r, 0.5));
        assert!((at_edge - 1.0).abs() < 1e-3);
        assert!(e.field_at_client(300.0, 300.0) > 100.0);
        assert!(e.field_at_client(0.0, 0.0) < 0.1);
    }

    #[test]
    fn entering_an_orbit_fires_one_event() {
        let mut e = engine(MetaballConfig {
            fixed_count: 1,
            speed: 0.0,
            ..MetaballConfig::default()
        });
        let target = e.to_client(e.sources()[0].position);
        // start in the opposite corner
        let sx = if target.x < 400.0 { 790.0 } else { 10.0 };
        let sy = if target.y < 300.0 { 590.0 } else { 10.0 };
        e.update_pointer(sx, sy, None, "mouse");
        e.step(0.01);
        assert!(e.drain_collisions().is_empty());

        let mut fired = 0;
        e.update_pointer(target.x as f64, target.y as f64, None, "mouse");
        for _ in 0..120 {
            e.step(0.01);
            fired += e.drain_collisions().len();
        }
        assert_eq!(fired, 1);
    }
}
