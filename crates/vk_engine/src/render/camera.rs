//! Fixed orbit camera and the spinning model transform
//!
//! The camera sits at (2, 2, 2) looking at the origin with +Y up. The
//! projection is a 45 degree vertical field of view with near/far planes at
//! 0.1 and 10, built for Vulkan clip space (depth in `[0, 1]`, Y down).

use crate::foundation::math::{deg_to_rad, vulkan_perspective, Mat4, Point3, Vec3};

/// Perspective camera with standard Y-up orientation
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Point the camera is looking at in world space
    pub target: Vec3,
    /// Up vector for camera orientation
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov: f32,
    /// Distance to near clipping plane
    pub near: f32,
    /// Distance to far clipping plane
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(Vec3::new(2.0, 2.0, 2.0), 45.0, 0.1, 10.0)
    }
}

impl Camera {
    /// Create a camera at `position` looking at the origin
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    pub fn perspective(position: Vec3, fov_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: deg_to_rad(fov_degrees),
            near,
            far,
        }
    }

    /// World-to-camera transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(
            &Point3::from(self.position),
            &Point3::from(self.target),
            &self.up,
        )
    }

    /// Projection for a viewport of the given aspect ratio (width / height)
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        vulkan_perspective(self.fov, aspect, self.near, self.far)
    }
}

/// Model rotation about +Y at a constant angular speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpin {
    /// Angular speed in degrees per second
    pub degrees_per_second: f32,
}

impl ModelSpin {
    /// Spin at `degrees_per_second`
    pub fn new(degrees_per_second: f32) -> Self {
        Self { degrees_per_second }
    }

    /// Model matrix after `elapsed_seconds`
    pub fn model_matrix(&self, elapsed_seconds: f32) -> Mat4 {
        let angle = deg_to_rad(self.degrees_per_second * elapsed_seconds);
        Mat4::from_axis_angle(&Vec3::y_axis(), angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_view_puts_origin_in_front() {
        let camera = Camera::default();
        let origin = camera.view_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        // Distance from (2, 2, 2) to the origin, straight down -Z
        assert_relative_eq!(origin.z, -(12.0f32).sqrt(), epsilon = 1e-5);
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(origin.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_spin_quarter_turn_after_one_second() {
        let spin = ModelSpin::new(90.0);
        let rotated = spin.model_matrix(1.0) * Vec4::new(1.0, 0.0, 0.0, 1.0);
        // +X rotates to -Z about +Y
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(rotated.z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(rotated.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_spin_starts_at_identity() {
        assert_relative_eq!(ModelSpin::new(90.0).model_matrix(0.0), Mat4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_projection_uses_aspect() {
        let camera = Camera::default();
        let wide = camera.projection_matrix(2.0);
        let square = camera.projection_matrix(1.0);
        assert_relative_eq!(wide[(0, 0)] * 2.0, square[(0, 0)], epsilon = 1e-5);
        assert!(square[(1, 1)] < 0.0);
    }
}
