//! Fixed-count ball physics with pointer-pinned leader balls.
//!
//! Index 0 follows the designated primary pointer; indices handed out by the registry
//! follow the pointers that hold them. Every other ball is free: it falls,
//! collides softly with other free balls and gets shoved aside by leaders.
//! All per-step constants assume a 1/60 s step.

use crate::camera::Camera;
use crate::config::{BallConfig, EngineConfig};
use crate::effect::{collision_intensity, push_collision, CollisionEvent, Collisions};
use crate::error::Result;
use crate::lifecycle::EngineState;
use crate::pointer::{LogicalPointer, PointerRegistry, PRIMARY_SLOT};
use crate::router::{IdleSweeper, InputRouter, PointerMotion, PointerSink, SlotPolicy};
use glam::{Vec2, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use smallvec::SmallVec;

pub const FIXED_STEP: f32 = 1.0 / 60.0;
const MAX_SUBSTEPS: u32 = 4;

/// Axis-aligned box the balls live in. There is no ceiling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub half_width: f32,
    pub floor: f32,
    pub half_depth: f32,
}

impl Bounds {
    pub fn from_camera(camera: &Camera, half_depth: f32) -> Self {
        let he = camera.half_extents();
        Self {
            half_width: he.x,
            floor: -he.y,
            half_depth,
        }
    }
}

/// Physics state. Also the router's sink, so it sees pointers come and go.
pub struct BallSim {
    config: BallConfig,
    viewport: (u32, u32),
    camera: Camera,
    bounds: Bounds,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    radii: Vec<f32>,
    base_radii: Vec<f32>,
    colors: Vec<[f32; 3]>,
    leaders: Vec<bool>,
    collisions: Collisions,
}

impl BallSim {
    fn new(config: BallConfig, width: u32, height: u32) -> Self {
        let viewport = (width.max(1), height.max(1));
        let camera = camera_for(&config, viewport);
        let bounds = Bounds::from_camera(&camera, config.depth_bound);
        let mut rng = StdRng::seed_from_u64(config.seed);
        let n = config.count;
        let mut positions = Vec::with_capacity(n);
        let mut base_radii = Vec::with_capacity(n);
        let mut colors = Vec::with_capacity(n);
        for _ in 0..n {
            let r = if config.max_size > config.min_size {
                rng.gen_range(config.min_size..config.max_size)
            } else {
                config.min_size
            };
            let x_span = (bounds.half_width - r).max(0.0);
            let z_span = (bounds.half_depth - r).max(0.0);
            positions.push(Vec3::new(
                rng.gen_range(-1.0f32..=1.0) * x_span,
                bounds.floor + r + rng.gen::<f32>() * (-2.0 * bounds.floor),
                rng.gen_range(-1.0f32..=1.0) * z_span,
            ));
            base_radii.push(r);
            colors.push(config.palette[rng.gen_range(0..config.palette.len())]);
        }
        let mut sim = Self {
            viewport,
            camera,
            bounds,
            positions,
            velocities: vec![Vec3::ZERO; n],
            radii: base_radii.clone(),
            base_radii,
            colors,
            leaders: vec![false; n],
            collisions: Collisions::new(),
            config,
        };
        if sim.config.follow_cursor && n > 0 {
            sim.leaders[0] = true;
            sim.radii[0] = 0.0;
        }
        sim
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
        self.camera = camera_for(&self.config, self.viewport);
        self.bounds = Bounds::from_camera(&self.camera, self.config.depth_bound);
    }

    fn project(&self, p: Vec2) -> Vec3 {
        self.camera
            .screen_to_plane(p.x, p.y, self.viewport.0 as f32, self.viewport.1 as f32)
    }

    /// Which indices are pinned this step and where they are heading.
    ///
    /// Index 0 belongs to the designated primary only. Without it the
    /// primary leader stays hidden, so other pointers never hop between
    /// index 0 and their own slot.
    fn leader_targets(&self, registry: &PointerRegistry) -> SmallVec<[(usize, Vec3); 8]> {
        let mut targets = SmallVec::new();
        if !self.config.follow_cursor {
            return targets;
        }
        if let Some(p) = registry.designated_primary() {
            targets.push((PRIMARY_SLOT, self.project(p.position)));
        }
        for p in registry.list_active() {
            match p.slot {
                Some(s) if s != PRIMARY_SLOT && s < self.positions.len() => {
                    targets.push((s, self.project(p.position)));
                }
                _ => {}
            }
        }
        targets
    }

    fn physics_step(&mut self, registry: &PointerRegistry) {
        let targets = self.leader_targets(registry);
        let mut leader_motion: SmallVec<[(usize, Vec3); 8]> = SmallVec::new();

        // 1. leaders
        let mut now_leader = vec![false; self.positions.len()];
        if self.config.follow_cursor && !now_leader.is_empty() {
            now_leader[PRIMARY_SLOT] = true;
        }
        for &(i, target) in &targets {
            now_leader[i] = true;
            let before = self.positions[i];
            self.positions[i] += (target - before) * self.config.ease_factor;
            self.velocities[i] = Vec3::ZERO;
            self.radii[i] = self.config.max_size;
            leader_motion.push((i, self.positions[i] - before));
        }
        for i in 0..self.positions.len() {
            let has_target = targets.iter().any(|&(t, _)| t == i);
            if now_leader[i] && !has_target {
                self.radii[i] = 0.0;
                self.velocities[i] = Vec3::ZERO;
            } else if !now_leader[i] && self.leaders[i] {
                self.radii[i] = self.base_radii[i];
                self.velocities[i] = Vec3::ZERO;
            }
        }
        self.leaders = now_leader;

        // 2. free-free soft separation
        let n = self.positions.len();
        for i in 0..n {
            if self.leaders[i] {
                continue;
            }
            for j in (i + 1)..n {
                if self.leaders[j] {
                    continue;
                }
                let d = self.positions[j] - self.positions[i];
                let min_dist = self.radii[i] + self.radii[j];
                let dist2 = d.length_squared();
                if dist2 >= min_dist * min_dist {
                    continue;
                }
                let dist = dist2.sqrt();
                let normal = if dist > 1e-6 { d / dist } else { Vec3::X };
                let push = normal * ((min_dist - dist) * 0.5);
                self.positions[i] -= push;
                self.positions[j] += push;
                let kick = normal * self.config.collision_kick;
                self.velocities[i] -= kick;
                self.velocities[j] += kick;
            }
        }

        // 3. leaders shove free balls
        for &(l, motion) in &leader_motion {
            let lp = self.positions[l];
            let lr = self.radii[l];
            for p in 0..n {
                if self.leaders[p] {
                    continue;
                }
                let d = self.positions[p] - lp;
                let min_dist = lr + self.radii[p];
                let dist = d.length();
                if dist >= min_dist {
                    continue;
                }
                let normal = if dist > 1e-6 { d / dist } else { Vec3::Y };
                let overlap = min_dist - dist;
                let rel_speed = (motion - self.velocities[p]).length();
                self.positions[p] += normal * overlap;
                self.velocities[p] +=
                    normal * self.config.repulsion_strength * (1.0 + overlap / min_dist);

                let intensity = collision_intensity(
                    overlap / min_dist,
                    rel_speed / self.config.max_velocity,
                    self.config.intensity_overlap_weight,
                    self.config.intensity_speed_weight,
                );
                if intensity >= self.config.min_collision_intensity {
                    let contact = lp + normal * lr;
                    let position = self.camera.world_to_screen(
                        contact,
                        self.viewport.0 as f32,
                        self.viewport.1 as f32,
                    );
                    push_collision(&mut self.collisions, CollisionEvent { intensity, position });
                }
            }
        }

        // 4. integrate, 5. walls
        let b = self.bounds;
        for i in 0..n {
            if self.leaders[i] {
                continue;
            }
            let r = self.radii[i];
            let mut v = self.velocities[i];
            v.y -= self.config.gravity * r;
            v *= self.config.friction;
            v = v.clamp_length_max(self.config.max_velocity);
            let mut p = self.positions[i] + v;

            let bounce = self.config.wall_bounce;
            let (lo, hi) = (-b.half_width + r, (b.half_width - r).max(-b.half_width + r));
            if p.x < lo {
                p.x = lo;
                v.x = v.x.abs() * bounce;
            } else if p.x > hi {
                p.x = hi;
                v.x = -v.x.abs() * bounce;
            }
            let floor = b.floor + r;
            if p.y < floor {
                p.y = floor;
                v.y = v.y.abs() * bounce;
            }
            let (lo, hi) = (-b.half_depth + r, (b.half_depth - r).max(-b.half_depth + r));
            if p.z < lo {
                p.z = lo;
                v.z = v.z.abs() * bounce;
            } else if p.z > hi {
                p.z = hi;
                v.z = -v.z.abs() * bounce;
            }
            self.positions[i] = p;
            self.velocities[i] = v;
        }
    }
}

fn camera_for(config: &BallConfig, viewport: (u32, u32)) -> Camera {
    let aspect = viewport.0 as f32 / viewport.1 as f32;
    Camera::looking_at_origin(config.camera_z, config.camera_fov_deg, aspect)
}

impl PointerSink for BallSim {
    fn on_pointer_changed(&mut self, pointer: &LogicalPointer, motion: PointerMotion) {
        if motion.is_new {
            log::debug!("[balls] pointer {} joined on slot {:?}", pointer.id, pointer.slot);
        }
    }

    fn on_pointer_removed(&mut self, pointer: &LogicalPointer) {
        if let Some(slot) = pointer.slot.filter(|s| *s < self.positions.len()) {
            log::debug!("[balls] leader {slot} released by {}", pointer.id);
        }
    }
}

pub struct BallEngine {
    router: InputRouter<BallSim>,
    state: EngineState,
    sweeper: IdleSweeper,
    pending_resize: Option<(u32, u32)>,
    accumulator: f32,
}

impl BallEngine {
    pub fn new(config: BallConfig, width: u32, height: u32) -> Result<Self> {
        config.validate()?;
        let registry = PointerRegistry::new(config.pointers.primary_id.clone());
        let sweeper = IdleSweeper::new(&config.pointers);
        let sim = BallSim::new(config, width, height);
        log::info!("[balls] created with {} balls", sim.positions.len());
        Ok(Self {
            router: InputRouter::new(registry, sim, SlotPolicy::Allocate),
            state: EngineState::Running,
            sweeper,
            pending_resize: None,
            accumulator: 0.0,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &BallConfig {
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

    /// Advance by `dt` seconds of wall time in fixed 1/60 s steps.
    pub fn step(&mut self, dt: f32) {
        if self.state.is_destroyed() {
            return;
        }
        if let Some((w, h)) = self.pending_resize.take() {
            self.router.sink_mut().resize(w, h);
            log::debug!("[balls] bounds recomputed for {w}x{h}");
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.sweeper.tick(&mut self.router, dt);
        if !self.state.is_stepping() {
            return;
        }
        let capacity = self.router.sink().positions.len();
        self.router.registry_mut().compact_slots(capacity);

        self.accumulator = (self.accumulator + dt).min(FIXED_STEP * MAX_SUBSTEPS as f32);
        let (registry, sim) = self.router.parts_mut();
        let mut steps = 0;
        while self.accumulator >= FIXED_STEP && steps < MAX_SUBSTEPS {
            sim.physics_step(registry);
            self.accumulator -= FIXED_STEP;
            steps += 1;
        }
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
        sim.positions = Vec::new();
        sim.velocities = Vec::new();
        sim.radii = Vec::new();
        sim.base_radii = Vec::new();
        sim.colors = Vec::new();
        sim.leaders = Vec::new();
        sim.collisions.clear();
        log::info!("[balls] destroyed");
    }

    pub fn drain_collisions(&mut self) -> Collisions {
        std::mem::take(&mut self.router.sink_mut().collisions)
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.router.sink().positions
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.router.sink().velocities
    }

    pub fn radii(&self) -> &[f32] {
        &self.router.sink().radii
    }

    pub fn colors(&self) -> &[[f32; 3]] {
        &self.router.sink().colors
    }

    pub fn is_leader(&self, index: usize) -> bool {
        self.router.sink().leaders.get(index).copied().unwrap_or(false)
    }

    pub fn bounds(&self) -> Bounds {
        self.router.sink().bounds
    }

    pub fn camera(&self) -> &Camera {
        &self.router.sink().camera
    }

    /// World position a viewport pixel maps to on the leaders' plane.
    pub fn project(&self, x: f32, y: f32) -> Vec3 {
        self.router.sink().project(Vec2::new(x, y))
    }
}
