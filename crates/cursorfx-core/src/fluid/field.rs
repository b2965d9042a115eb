use glam::{Vec2, Vec3};
use std::ops::{Add, Mul, Sub};

/// Values a grid cell can hold: scalars, 2D velocities, RGB dye.
pub trait FieldValue:
    Copy + Default + Add<Output = Self> + Sub<Output = Self> + Mul<f32, Output = Self>
{
    fn energy(self) -> f32;
}

impl FieldValue for f32 {
    fn energy(self) -> f32 {
        self * self
    }
}

impl FieldValue for Vec2 {
    fn energy(self) -> f32 {
        self.length_squared()
    }
}

impl FieldValue for Vec3 {
    fn energy(self) -> f32 {
        self.length_squared()
    }
}

/// Row-major cell grid. Row 0 is the bottom of the viewport; texture
/// coordinates run `[0, 1]` left to right and bottom to top with cell
/// centres at `(i + 0.5) / width`.
#[derive(Clone, Debug)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T: FieldValue> Grid<T> {
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[j * self.width + i]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, v: T) {
        self.data[j * self.width + i] = v;
    }

    /// Clamp-to-edge neighbour lookup with signed offsets.
    #[inline]
    pub fn at(&self, i: usize, j: usize, di: isize, dj: isize) -> T {
        let x = (i as isize + di).clamp(0, self.width as isize - 1) as usize;
        let y = (j as isize + dj).clamp(0, self.height as isize - 1) as usize;
        self.get(x, y)
    }

    #[inline]
    pub fn uv(&self, i: usize, j: usize) -> Vec2 {
        Vec2::new(
            (i as f32 + 0.5) / self.width as f32,
            (j as f32 + 0.5) / self.height as f32,
        )
    }

    /// Bilinear sample at texture coordinate `uv`, clamped to the edge.
    pub fn sample(&self, uv: Vec2) -> T {
        let x = (uv.x * self.width as f32 - 0.5).clamp(0.0, (self.width - 1) as f32);
        let y = (uv.y * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let bottom = self.get(x0, y0) * (1.0 - fx) + self.get(x1, y0) * fx;
        let top = self.get(x0, y1) * (1.0 - fx) + self.get(x1, y1) * fx;
        bottom * (1.0 - fy) + top * fy
    }

    pub fn fill(&mut self, v: T) {
        self.data.fill(v);
    }

    pub fn scale(&mut self, k: f32) {
        for v in &mut self.data {
            *v = *v * k;
        }
    }

    pub fn energy(&self) -> f64 {
        self.data.iter().map(|v| v.energy() as f64).sum()
    }

    /// Bilinearly resample into a grid of a different size.
    pub fn resampled(&self, width: usize, height: usize) -> Self {
        let mut out = Self::new(width, height);
        for j in 0..out.height {
            for i in 0..out.width {
                let v = self.sample(out.uv(i, j));
                out.set(i, j, v);
            }
        }
        out
    }
}

/// Read/write pair swapped after each pass.
#[derive(Clone, Debug)]
pub struct DoubleGrid<T> {
    pub read: Grid<T>,
    pub write: Grid<T>,
}

impl<T: FieldValue> DoubleGrid<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            read: Grid::new(width, height),
            write: Grid::new(width, height),
        }
    }

    #[inline]
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.read = self.read.resampled(width, height);
        self.write = Grid::new(width, height);
    }
}

/// Grid dimensions for a viewport: `resolution` cells along the shorter
/// side, proportionally more along the longer one.
pub fn grid_size(resolution: u32, viewport_w: u32, viewport_h: u32) -> (usize, usize) {
    let w = viewport_w.max(1) as f32;
    let h = viewport_h.max(1) as f32;
    let mut aspect = w / h;
    if aspect < 1.0 {
        aspect = 1.0 / aspect;
    }
    let min = resolution.max(1) as usize;
    let max = (resolution as f32 * aspect).round().max(1.0) as usize;
    if w > h {
        (max, min)
    } else {
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_at_cell_centre_is_exact() {
        let mut g: Grid<f32> = Grid::new(4, 4);
        g.set(2, 1, 3.0);
        let v = g.sample(g.uv(2, 1));
        assert!((v - 3.0).abs() < 1e-5);
    }

    #[test]
    fn sample_interpolates_between_cells() {
        let mut g: Grid<f32> = Grid::new(2, 1);
        g.set(0, 0, 0.0);
        g.set(1, 0, 1.0);
        let v = g.sample(Vec2::new(0.5, 0.5));
        assert!((v - 0.5).abs() < 1e-5);
    }

    #[test]
    fn grid_size_follows_aspect() {
        assert_eq!(grid_size(128, 1600, 800), (256, 128));
        assert_eq!(grid_size(128, 800, 1600), (128, 256));
        assert_eq!(grid_size(64, 500, 500), (64, 64));
    }

    #[test]
    fn resample_preserves_constant_field() {
        let mut g: Grid<Vec3> = Grid::new(8, 4);
        g.fill(Vec3::splat(0.25));
        let r = g.resampled(16, 9);
        assert!(r.data().iter().all(|v| (*v - Vec3::splat(0.25)).length() < 1e-5));
    }
}
