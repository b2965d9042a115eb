//! Grid-based incompressible fluid driven by pointer splats.

pub mod field;
pub mod kernels;

use crate::color::{generate_color, scale};
use crate::config::{EngineConfig, FluidConfig};
use crate::error::{FxError, Result};
use crate::lifecycle::EngineState;
use crate::pointer::{validate_coordinate, LogicalPointer, PointerRegistry};
use crate::router::{IdleSweeper, InputRouter, PointerMotion, PointerSink, SlotPolicy};
use field::{grid_size, DoubleGrid, Grid};
use fnv::FnvHashMap;
use glam::{Vec2, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Longest step the solver will take; larger frame gaps (tab resume) are cut.
pub const MAX_DT: f32 = 1.0 / 60.0;

/// Velocity magnitude of a manual splash, in sim texels per second.
const SPLASH_VELOCITY: f32 = 1000.0;
const SPLASH_BRIGHTNESS: f32 = 10.0;

/// One gaussian impulse in texture coordinates (bottom-left origin).
/// `force` goes into velocity, `color` into dye.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    pub point: Vec2,
    pub force: Vec2,
    pub color: [f32; 3],
    pub radius: f32,
    pub aspect: f32,
}

/// Queued work for a solver that lives outside this crate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FluidOp {
    Splat(Splat),
    /// One full solver step of `dt` seconds.
    Step(f32),
}

/// Where the fields live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SolverMode {
    /// Grids in this process; used headless and as the reference.
    #[default]
    Cpu,
    /// The renderer owns the fields and drains [`FluidEngine::take_ops`]
    /// once per frame.
    External,
}

/// CPU-resident fields.
struct CpuFields {
    velocity: DoubleGrid<Vec2>,
    dye: DoubleGrid<Vec3>,
    pressure: DoubleGrid<f32>,
    divergence: Grid<f32>,
    curl: Grid<f32>,
}

impl CpuFields {
    fn new((sw, sh): (usize, usize), (dw, dh): (usize, usize)) -> Self {
        Self {
            velocity: DoubleGrid::new(sw, sh),
            dye: DoubleGrid::new(dw, dh),
            pressure: DoubleGrid::new(sw, sh),
            divergence: Grid::new(sw, sh),
            curl: Grid::new(sw, sh),
        }
    }

    fn splat(&mut self, s: &Splat) {
        kernels::splat(&mut self.velocity.read, s.point, s.force, s.radius, s.aspect);
        kernels::splat(&mut self.dye.read, s.point, Vec3::from(s.color), s.radius, s.aspect);
    }

    fn solve(&mut self, config: &FluidConfig, dt: f32) {
        kernels::curl(&self.velocity.read, &mut self.curl);
        kernels::vorticity(&self.velocity.read, &self.curl, config.curl, dt, &mut self.velocity.write);
        self.velocity.swap();

        kernels::divergence(&self.velocity.read, &mut self.divergence);
        self.pressure.read.scale(config.pressure);
        for _ in 0..config.pressure_iterations {
            kernels::jacobi_pressure(&self.pressure.read, &self.divergence, &mut self.pressure.write);
            self.pressure.swap();
        }
        kernels::subtract_gradient(&self.pressure.read, &self.velocity.read, &mut self.velocity.write);
        self.velocity.swap();

        kernels::advect(
            &self.velocity.read,
            &self.velocity.read,
            dt,
            config.velocity_dissipation,
            &mut self.velocity.write,
        );
        self.velocity.swap();
        kernels::advect(
            &self.velocity.read,
            &self.dye.read,
            dt,
            config.density_dissipation,
            &mut self.dye.write,
        );
        self.dye.swap();
    }

    fn resize(&mut self, (sw, sh): (usize, usize), (dw, dh): (usize, usize)) {
        self.velocity.resize(sw, sh);
        self.dye.resize(dw, dh);
        self.pressure = DoubleGrid::new(sw, sh);
        self.divergence = Grid::new(sw, sh);
        self.curl = Grid::new(sw, sh);
    }
}

enum Solver {
    Cpu(Box<CpuFields>),
    External(Vec<FluidOp>),
    Released,
}

/// Per-pointer color state and the solver. Receives pointer notifications
/// from the router.
pub struct FluidSim {
    config: FluidConfig,
    viewport: (u32, u32),
    solver: Solver,
    colors: FnvHashMap<String, [f32; 3]>,
    color_timer: f32,
    rng: StdRng,
}

impl FluidSim {
    fn new(config: FluidConfig, width: u32, height: u32, mode: SolverMode) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let mut sim = Self {
            config,
            viewport: (width.max(1), height.max(1)),
            solver: Solver::Released,
            colors: FnvHashMap::default(),
            color_timer: 0.0,
            rng,
        };
        sim.solver = match mode {
            SolverMode::Cpu => Solver::Cpu(Box::new(CpuFields::new(sim.sim_size(), sim.dye_size()))),
            SolverMode::External => Solver::External(Vec::new()),
        };
        sim
    }

    fn sim_size(&self) -> (usize, usize) {
        grid_size(self.config.sim_resolution, self.viewport.0, self.viewport.1)
    }

    fn dye_size(&self) -> (usize, usize) {
        grid_size(self.config.dye_resolution, self.viewport.0, self.viewport.1)
    }

    fn aspect(&self) -> f32 {
        self.viewport.0 as f32 / self.viewport.1 as f32
    }

    fn splat_radius(&self) -> f32 {
        let r = self.config.splat_radius / 100.0;
        let aspect = self.aspect();
        if aspect > 1.0 {
            r * aspect
        } else {
            r
        }
    }

    /// Client pixels (top-left origin) to texture coordinates (bottom-left).
    fn client_to_uv(&self, p: Vec2) -> Vec2 {
        let (w, h) = (self.viewport.0 as f32, self.viewport.1 as f32);
        Vec2::new(p.x / w, 1.0 - p.y / h)
    }

    fn client_delta_to_uv(&self, d: Vec2) -> Vec2 {
        let (w, h) = (self.viewport.0 as f32, self.viewport.1 as f32);
        let mut delta = Vec2::new(d.x / w, -d.y / h);
        let aspect = self.aspect();
        if aspect < 1.0 {
            delta.x *= aspect;
        }
        if aspect > 1.0 {
            delta.y /= aspect;
        }
        delta
    }

    fn color_for(&mut self, pointer: &LogicalPointer) -> [f32; 3] {
        if let Some(c) = pointer.color {
            return scale(c, self.config.splat_intensity);
        }
        let intensity = self.config.splat_intensity;
        let rng = &mut self.rng;
        *self
            .colors
            .entry(pointer.id.clone())
            .or_insert_with(|| generate_color(rng, intensity))
    }

    fn splat(&mut self, point: Vec2, force: Vec2, color: [f32; 3]) {
        let splat = Splat {
            point,
            force,
            color,
            radius: self.splat_radius(),
            aspect: self.aspect(),
        };
        match &mut self.solver {
            Solver::Cpu(fields) => fields.splat(&splat),
            Solver::External(ops) => ops.push(FluidOp::Splat(splat)),
            Solver::Released => {}
        }
    }

    fn splat_pointer(&mut self, pointer: &LogicalPointer) {
        let point = self.client_to_uv(pointer.position);
        let force = self.client_delta_to_uv(pointer.delta()) * self.config.splat_force;
        let color = self.color_for(pointer);
        self.splat(point, force, color);
    }

    fn random_splat(&mut self, point: Vec2, color: Option<[f32; 3]>) {
        let color = match color {
            Some(c) => c,
            None => generate_color(&mut self.rng, self.config.splat_intensity),
        };
        let force = Vec2::new(
            SPLASH_VELOCITY * (self.rng.gen::<f32>() - 0.5),
            SPLASH_VELOCITY * (self.rng.gen::<f32>() - 0.5),
        );
        self.splat(point, force, scale(color, SPLASH_BRIGHTNESS));
    }

    fn update_colors(&mut self, dt: f32) {
        if !self.config.colorful {
            return;
        }
        self.color_timer += dt * self.config.color_update_speed;
        if self.color_timer < 1.0 {
            return;
        }
        self.color_timer = self.color_timer.fract();
        let intensity = self.config.splat_intensity;
        for c in self.colors.values_mut() {
            *c = generate_color(&mut self.rng, intensity);
        }
    }

    fn solve(&mut self, dt: f32) {
        match &mut self.solver {
            Solver::Cpu(fields) => fields.solve(&self.config, dt),
            Solver::External(ops) => ops.push(FluidOp::Step(dt)),
            Solver::Released => {}
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
        let (sim, dye) = (self.sim_size(), self.dye_size());
        // external solvers notice the new sizes when they next draw
        if let Solver::Cpu(fields) = &mut self.solver {
            fields.resize(sim, dye);
        }
    }

    fn release(&mut self) {
        self.solver = Solver::Released;
        self.colors.clear();
    }

    fn cpu(&self) -> Option<&CpuFields> {
        match &self.solver {
            Solver::Cpu(fields) => Some(fields),
            _ => None,
        }
    }
}

impl PointerSink for FluidSim {
    fn on_pointer_changed(&mut self, pointer: &LogicalPointer, _motion: PointerMotion) {
        if pointer.color.is_none() {
            self.color_for(pointer);
        }
    }

    fn on_pointer_removed(&mut self, pointer: &LogicalPointer) {
        self.colors.remove(&pointer.id);
    }
}

pub struct FluidEngine {
    router: InputRouter<FluidSim>,
    state: EngineState,
    sweeper: IdleSweeper,
    pending_resize: Option<(u32, u32)>,
}

impl FluidEngine {
    /// Engine with CPU-resident fields.
    pub fn new(config: FluidConfig, width: u32, height: u32) -> Result<Self> {
        Self::with_solver(config, width, height, SolverMode::Cpu)
    }

    pub fn with_solver(config: FluidConfig, width: u32, height: u32, mode: SolverMode) -> Result<Self> {
        config.validate()?;
        let registry = PointerRegistry::new(config.pointers.primary_id.clone());
        let sweeper = IdleSweeper::new(&config.pointers);
        let initial = config.initial_splats;
        let sim = FluidSim::new(config, width, height, mode);
        let ((sw, sh), (dw, dh)) = (sim.sim_size(), sim.dye_size());
        log::info!("[fluid] created ({mode:?}): sim {sw}x{sh}, dye {dw}x{dh}");
        let mut engine = Self {
            router: InputRouter::new(registry, sim, SlotPolicy::None),
            state: EngineState::Running,
            sweeper,
            pending_resize: None,
        };
        engine.random_splats(initial);
        Ok(engine)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &FluidConfig {
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

    /// One-off impulse at client coordinates, independent of pointer
    /// tracking. Without an explicit color the pointer `id`'s color is used,
    /// or a fresh random hue if `id` is unknown.
    pub fn splash_at_client(&mut self, x: f64, y: f64, color: Option<[f32; 3]>, id: &str) -> Result<()> {
        if self.state.is_destroyed() {
            return Err(FxError::Destroyed);
        }
        let pos = validate_coordinate(x, y)?;
        let (registry, sim) = self.router.parts_mut();
        let color = match (color, registry.get(id)) {
            (Some(c), _) => Some(scale(c, sim.config.splat_intensity)),
            (None, Some(p)) => Some(sim.color_for(p)),
            (None, None) => None,
        };
        let point = sim.client_to_uv(pos);
        sim.random_splat(point, color);
        Ok(())
    }

    /// Splat with an explicit velocity (client pixels per second) and an
    /// unscaled dye color.
    pub fn splat_at_client(&mut self, x: f64, y: f64, velocity: Vec2, color: [f32; 3]) -> Result<()> {
        if self.state.is_destroyed() {
            return Err(FxError::Destroyed);
        }
        let pos = validate_coordinate(x, y)?;
        let sim = self.router.sink_mut();
        let point = sim.client_to_uv(pos);
        let force = sim.client_delta_to_uv(velocity) * sim.config.splat_force;
        sim.splat(point, force, color);
        Ok(())
    }

    /// Random bursts across the viewport.
    pub fn random_splats(&mut self, count: u32) {
        if self.state.is_destroyed() {
            return;
        }
        let sim = self.router.sink_mut();
        for _ in 0..count {
            let point = Vec2::new(sim.rng.gen(), sim.rng.gen());
            sim.random_splat(point, None);
        }
    }

    /// Recorded now, applied at the start of the next step.
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
            self.router.sink_mut().resize(w, h);
            log::debug!("[fluid] resized to {w}x{h}");
        }
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_DT) } else { 0.0 };
        self.sweeper.tick(&mut self.router, dt);

        let (registry, sim) = self.router.parts_mut();
        if !self.state.is_stepping() {
            registry.clear_motion();
            return;
        }
        sim.update_colors(dt);
        for pointer in registry.list_active().filter(|p| p.moved) {
            sim.splat_pointer(pointer);
        }
        registry.clear_motion();
        sim.solve(dt);
    }

    pub fn pause(&mut self) {
        self.state = self.state.paused();
    }

    pub fn play(&mut self) {
        self.state = self.state.resumed();
    }

    /// Idempotent; drops every field.
    pub fn destroy(&mut self) {
        if self.state.is_destroyed() {
            return;
        }
        self.state = EngineState::Destroyed;
        self.router.sink_mut().release();
        log::info!("[fluid] destroyed");
    }

    pub fn solver_mode(&self) -> SolverMode {
        match self.router.sink().solver {
            Solver::External(_) => SolverMode::External,
            _ => SolverMode::Cpu,
        }
    }

    /// Velocity and pressure grid size for the current viewport.
    pub fn sim_size(&self) -> (usize, usize) {
        self.router.sink().sim_size()
    }

    pub fn dye_size(&self) -> (usize, usize) {
        self.router.sink().dye_size()
    }

    /// Splats and solver steps queued since the last call, in order. Always
    /// empty for the CPU solver.
    pub fn take_ops(&mut self) -> Vec<FluidOp> {
        match &mut self.router.sink_mut().solver {
            Solver::External(ops) => std::mem::take(ops),
            _ => Vec::new(),
        }
    }

    /// Summed squared dye. Zero unless the fields are CPU-resident.
    pub fn dye_energy(&self) -> f64 {
        self.router.sink().cpu().map_or(0.0, |f| f.dye.read.energy())
    }

    pub fn velocity_energy(&self) -> f64 {
        self.router.sink().cpu().map_or(0.0, |f| f.velocity.read.energy())
    }

    /// Dye energy of the cells whose centres lie within `radius` client
    /// pixels of `(x, y)`.
    pub fn dye_energy_near(&self, x: f32, y: f32, radius: f32) -> f64 {
        use field::FieldValue;
        let sim = self.router.sink();
        let Some(fields) = sim.cpu() else {
            return 0.0;
        };
        let dye = &fields.dye.read;
        let (w, h) = (sim.viewport.0 as f32, sim.viewport.1 as f32);
        let centre = Vec2::new(x, y);
        let mut total = 0.0;
        for j in 0..dye.height() {
            for i in 0..dye.width() {
                let uv = dye.uv(i, j);
                let px = Vec2::new(uv.x * w, (1.0 - uv.y) * h);
                if px.distance(centre) <= radius {
                    total += dye.get(i, j).energy() as f64;
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> FluidConfig {
        FluidConfig {
            sim_resolution: 16,
            dye_resolution: 32,
            ..FluidConfig::default()
        }
    }

    #[test]
    fn moved_pointer_injects_dye_and_clears_motion() {
        let mut e = FluidEngine::new(small(), 200, 100).unwrap();
        e.update_pointer(100.0, 50.0, Some([1.0, 0.0, 0.0]), "mouse");
        e.update_pointer(110.0, 50.0, None, "mouse");
        assert!(e.registry().get("mouse").unwrap().moved);
        e.step(1.0 / 60.0);
        assert!(e.dye_energy() > 0.0);
        assert!(e.velocity_energy() > 0.0);
        assert!(!e.registry().get("mouse").unwrap().moved);
    }

    #[test]
    fn paused_engine_keeps_picture() {
        let mut e = FluidEngine::new(small(), 100, 100).unwrap();
        e.splat_at_client(50.0, 50.0, Vec2::ZERO, [0.0, 1.0, 0.0]).unwrap();
        e.pause();
        let before = e.dye_energy();
        e.step(1.0 / 60.0);
        assert_eq!(e.dye_energy(), before);
        e.play();
        e.step(1.0 / 60.0);
        assert!(e.dye_energy() < before);
    }

    #[test]
    fn resize_is_deferred_and_resamples() {
        let mut e = FluidEngine::new(small(), 100, 100).unwrap();
        e.splash_at_client(50.0, 50.0, Some([1.0, 1.0, 1.0]), "x").unwrap();
        e.resize(200, 100);
        assert_eq!(e.dye_size(), (32, 32));
        e.step(0.0);
        assert_eq!(e.dye_size(), (64, 32));
        assert!(e.dye_energy() > 0.0);
    }

    #[test]
    fn external_solver_receives_ops_in_order() {
        let mut e = FluidEngine::with_solver(small(), 200, 100, SolverMode::External).unwrap();
        assert_eq!(e.solver_mode(), SolverMode::External);
        e.update_pointer(100.0, 50.0, None, "mouse");
        e.update_pointer(120.0, 50.0, None, "mouse");
        e.step(1.0 / 60.0);
        e.splash_at_client(10.0, 10.0, Some([0.0, 0.0, 1.0]), "x").unwrap();
        let ops = e.take_ops();
        assert_eq!(ops.len(), 3);
        match ops[0] {
            FluidOp::Splat(s) => {
                assert!((s.point - Vec2::new(0.6, 0.5)).length() < 1e-6);
                assert!(s.force.x > 0.0 && s.force.y == 0.0);
                assert_eq!(s.aspect, 2.0);
            }
            op => panic!("expected a splat, got {op:?}"),
        }
        assert_eq!(ops[1], FluidOp::Step(1.0 / 60.0));
        assert!(matches!(ops[2], FluidOp::Splat(_)));
        assert!(e.take_ops().is_empty());
        // nothing is simulated on this side
        assert_eq!(e.dye_energy(), 0.0);
    }

    #[test]
    fn paused_external_solver_queues_no_steps() {
        let config = FluidConfig {
            initial_splats: 2,
            ..small()
        };
        let mut e = FluidEngine::with_solver(config, 100, 100, SolverMode::External).unwrap();
        e.pause();
        e.step(1.0 / 60.0);
        let ops = e.take_ops();
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| matches!(op, FluidOp::Splat(_))));
        e.resize(300, 100);
        e.step(1.0 / 60.0);
        assert_eq!(e.sim_size(), (48, 16));
        e.destroy();
        e.step(1.0 / 60.0);
        assert!(e.take_ops().is_empty());
    }

    #[test]
    fn destroyed_engine_rejects_work() {
        let mut e = FluidEngine::new(small(), 100, 100).unwrap();
        e.destroy();
        e.destroy();
        assert_eq!(e.state(), EngineState::Destroyed);
        assert_eq!(
            e.splash_at_client(1.0, 1.0, None, "x"),
            Err(FxError::Destroyed)
        );
        e.play();
        assert_eq!(e.state(), EngineState::Destroyed);
    }
}
