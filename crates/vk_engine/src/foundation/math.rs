//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the Vulkan-flavoured projection the
//! renderer needs.

pub use nalgebra::{Matrix4, Unit, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Convert degrees to radians
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees.to_radians()
}

/// Right-handed perspective projection for Vulkan clip space
///
/// Depth maps to `[0, 1]` and the Y axis is flipped, since Vulkan's
/// framebuffer Y points down.
pub fn vulkan_perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fov_y_radians * 0.5).tan();
    let depth_range = near - far;

    Mat4::new(
        f / aspect, 0.0, 0.0, 0.0,
        0.0, -f, 0.0, 0.0,
        0.0, 0.0, far / depth_range, (near * far) / depth_range,
        0.0, 0.0, -1.0, 0.0,
    )
}

/// Column-major array form, as GLSL `mat4` expects
pub fn to_column_array(matrix: &Mat4) -> [[f32; 4]; 4] {
    (*matrix).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn project(matrix: &Mat4, point: Vec3) -> Vec3 {
        let clip = matrix * Vec4::new(point.x, point.y, point.z, 1.0);
        Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn test_perspective_depth_range() {
        let proj = vulkan_perspective(deg_to_rad(45.0), 1.5, 0.1, 10.0);

        assert_relative_eq!(project(&proj, Vec3::new(0.0, 0.0, -0.1)).z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(project(&proj, Vec3::new(0.0, 0.0, -10.0)).z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_perspective_flips_y() {
        let proj = vulkan_perspective(deg_to_rad(45.0), 1.0, 0.1, 10.0);
        let above = project(&proj, Vec3::new(0.0, 1.0, -5.0));
        assert!(above.y < 0.0);
    }

    #[test]
    fn test_column_array_layout() {
        let mut matrix = Mat4::identity();
        matrix[(0, 3)] = 7.0;
        let columns = to_column_array(&matrix);
        // Translation lives in the fourth column
        assert_relative_eq!(columns[3][0], 7.0);
        assert_relative_eq!(columns[0][3], 0.0);
    }
}
