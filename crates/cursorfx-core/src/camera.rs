use glam::{Mat4, Vec2, Vec3, Vec4};

/// Fixed perspective camera looking down -Z at the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    pub fovy_radians: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn looking_at_origin(camera_z: f32, fov_deg: f32, aspect: f32) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, camera_z),
            target: Vec3::ZERO,
            up: Vec3::Y,
            aspect,
            fovy_radians: fov_deg.to_radians(),
            znear: 0.1,
            zfar: camera_z * 4.0,
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy_radians, self.aspect, self.znear, self.zfar)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Half width and half height of the visible region on the z = 0 plane.
    pub fn half_extents(&self) -> Vec2 {
        let distance = (self.eye - self.target).length();
        let half_h = (self.fovy_radians * 0.5).tan() * distance;
        Vec2::new(half_h * self.aspect, half_h)
    }

    /// World ray through a viewport pixel (top-left origin, y down).
    pub fn screen_ray(&self, sx: f32, sy: f32, width: f32, height: f32) -> (Vec3, Vec3) {
        let ndc_x = 2.0 * sx / width.max(1.0) - 1.0;
        let ndc_y = 1.0 - 2.0 * sy / height.max(1.0);
        let inv = self.view_proj().inverse();
        let far = inv * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let far = far.truncate() / far.w;
        (self.eye, (far - self.eye).normalize())
    }

    /// Where the ray through a viewport pixel meets the z = 0 plane.
    pub fn screen_to_plane(&self, sx: f32, sy: f32, width: f32, height: f32) -> Vec3 {
        let (ro, rd) = self.screen_ray(sx, sy, width, height);
        if rd.z.abs() < 1e-6 {
            return Vec3::new(ro.x, ro.y, 0.0);
        }
        let t = -ro.z / rd.z;
        let p = ro + rd * t;
        Vec3::new(p.x, p.y, 0.0)
    }

    /// Viewport pixel of a world point.
    pub fn world_to_screen(&self, p: Vec3, width: f32, height: f32) -> Vec2 {
        let clip = self.view_proj() * p.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        Vec2::new((ndc.x + 1.0) * 0.5 * width, (1.0 - ndc.y) * 0.5 * height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_pixel_hits_origin() {
        let cam = Camera::looking_at_origin(20.0, 75.0, 1.5);
        let p = cam.screen_to_plane(600.0, 400.0, 1200.0, 800.0);
        assert!(p.length() < 1e-2);
    }

    #[test]
    fn corner_pixel_hits_half_extents() {
        let cam = Camera::looking_at_origin(20.0, 75.0, 2.0);
        let he = cam.half_extents();
        let p = cam.screen_to_plane(0.0, 0.0, 800.0, 400.0);
        assert!((p.x + he.x).abs() < 0.05, "{p:?} vs {he:?}");
        assert!((p.y - he.y).abs() < 0.05);
        let back = cam.world_to_screen(p, 800.0, 400.0);
        assert!(back.length() < 0.5);
    }
}
