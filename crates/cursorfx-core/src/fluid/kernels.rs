//! Stable-fluids passes on CPU grids.
//!
//! Each pass reads `src` grids and writes a destination grid; the caller
//! swaps double buffers between passes. Velocities are in sim texels per
//! second.

use super::field::{FieldValue, Grid};
use glam::Vec2;

const VELOCITY_LIMIT: f32 = 1000.0;

/// Add a gaussian blob of `value` centred on `point` (texture coords).
/// `aspect` stretches x so the blob stays round on non-square viewports.
pub fn splat<T: FieldValue>(target: &mut Grid<T>, point: Vec2, value: T, radius: f32, aspect: f32) {
    // Beyond ~4.3 sigma the contribution is below 1e-8; skip those cells.
    let reach = (radius * 18.0).sqrt();
    let reach_x = reach / aspect.max(1e-3);
    let (w, h) = (target.width(), target.height());
    let i0 = (((point.x - reach_x) * w as f32).floor().max(0.0)) as usize;
    let i1 = (((point.x + reach_x) * w as f32).ceil().max(0.0) as usize).min(w);
    let j0 = (((point.y - reach) * h as f32).floor().max(0.0)) as usize;
    let j1 = (((point.y + reach) * h as f32).ceil().max(0.0) as usize).min(h);
    for j in j0..j1 {
        for i in i0..i1 {
            let mut p = target.uv(i, j) - point;
            p.x *= aspect;
            let k = (-p.dot(p) / radius).exp();
            let v = target.get(i, j) + value * k;
            target.set(i, j, v);
        }
    }
}

pub fn curl(velocity: &Grid<Vec2>, out: &mut Grid<f32>) {
    for j in 0..velocity.height() {
        for i in 0..velocity.width() {
            let l = velocity.at(i, j, -1, 0).y;
            let r = velocity.at(i, j, 1, 0).y;
            let t = velocity.at(i, j, 0, 1).x;
            let b = velocity.at(i, j, 0, -1).x;
            out.set(i, j, 0.5 * (r - l - t + b));
        }
    }
}

/// Vorticity confinement: push velocity along the curl gradient.
pub fn vorticity(velocity: &Grid<Vec2>, curl: &Grid<f32>, strength: f32, dt: f32, out: &mut Grid<Vec2>) {
    for j in 0..velocity.height() {
        for i in 0..velocity.width() {
            let l = curl.at(i, j, -1, 0);
            let r = curl.at(i, j, 1, 0);
            let t = curl.at(i, j, 0, 1);
            let b = curl.at(i, j, 0, -1);
            let c = curl.get(i, j);
            let mut force = 0.5 * Vec2::new(t.abs() - b.abs(), r.abs() - l.abs());
            force /= force.length() + 0.0001;
            force *= strength * c;
            force.y = -force.y;
            let v = (velocity.get(i, j) + force * dt).clamp(
                Vec2::splat(-VELOCITY_LIMIT),
                Vec2::splat(VELOCITY_LIMIT),
            );
            out.set(i, j, v);
        }
    }
}

/// Divergence with reflective walls: a neighbour outside the grid mirrors
/// the centre velocity.
pub fn divergence(velocity: &Grid<Vec2>, out: &mut Grid<f32>) {
    let (w, h) = (velocity.width(), velocity.height());
    for j in 0..h {
        for i in 0..w {
            let c = velocity.get(i, j);
            let l = if i == 0 { -c.x } else { velocity.get(i - 1, j).x };
            let r = if i + 1 == w { -c.x } else { velocity.get(i + 1, j).x };
            let b = if j == 0 { -c.y } else { velocity.get(i, j - 1).y };
            let t = if j + 1 == h { -c.y } else { velocity.get(i, j + 1).y };
            out.set(i, j, 0.5 * (r - l + t - b));
        }
    }
}

pub fn jacobi_pressure(pressure: &Grid<f32>, divergence: &Grid<f32>, out: &mut Grid<f32>) {
    for j in 0..pressure.height() {
        for i in 0..pressure.width() {
            let l = pressure.at(i, j, -1, 0);
            let r = pressure.at(i, j, 1, 0);
            let b = pressure.at(i, j, 0, -1);
            let t = pressure.at(i, j, 0, 1);
            out.set(i, j, (l + r + b + t - divergence.get(i, j)) * 0.25);
        }
    }
}

pub fn subtract_gradient(pressure: &Grid<f32>, velocity: &Grid<Vec2>, out: &mut Grid<Vec2>) {
    for j in 0..velocity.height() {
        for i in 0..velocity.width() {
            let l = pressure.at(i, j, -1, 0);
            let r = pressure.at(i, j, 1, 0);
            let b = pressure.at(i, j, 0, -1);
            let t = pressure.at(i, j, 0, 1);
            out.set(i, j, velocity.get(i, j) - Vec2::new(r - l, t - b));
        }
    }
}

/// Semi-Lagrangian advection of `source` by `velocity`, then
/// `value / (1 + dissipation * dt)` decay.
pub fn advect<T: FieldValue>(
    velocity: &Grid<Vec2>,
    source: &Grid<T>,
    dt: f32,
    dissipation: f32,
    out: &mut Grid<T>,
) {
    let texel = velocity.texel_size();
    let decay = 1.0 / (1.0 + dissipation * dt);
    for j in 0..out.height() {
        for i in 0..out.width() {
            let uv = out.uv(i, j);
            let back = uv - dt * velocity.sample(uv) * texel;
            out.set(i, j, source.sample(back) * decay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn splat_peaks_at_point() {
        let mut g: Grid<f32> = Grid::new(32, 32);
        splat(&mut g, Vec2::new(0.5, 0.5), 1.0, 0.01, 1.0);
        let centre = g.get(16, 16).max(g.get(15, 15));
        assert!(centre > 0.9);
        assert!(g.get(0, 0) < 1e-6);
    }

    #[test]
    fn advect_with_still_velocity_only_decays() {
        let velocity: Grid<Vec2> = Grid::new(8, 8);
        let mut dye: Grid<Vec3> = Grid::new(8, 8);
        dye.set(3, 3, Vec3::ONE);
        let mut out: Grid<Vec3> = Grid::new(8, 8);
        advect(&velocity, &dye, 0.5, 1.0, &mut out);
        let expect = 1.0 / 1.5;
        assert!((out.get(3, 3).x - expect).abs() < 1e-4);
    }

    #[test]
    fn divergence_free_after_projection_of_uniform_flow() {
        let mut v: Grid<Vec2> = Grid::new(8, 8);
        v.fill(Vec2::new(1.0, 0.0));
        let mut div: Grid<f32> = Grid::new(8, 8);
        divergence(&v, &mut div);
        // interior of a uniform field has no divergence
        assert!(div.get(4, 4).abs() < 1e-6);
        // walls reflect
        assert!(div.get(0, 4) > 0.0);
    }
}
