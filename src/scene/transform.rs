//! Widget model transform: pointer tilt followed by a continuous spin

use glam::{Mat4, Vec2};

/// Largest tilt in degrees, reached at [`TILT_RANGE`] pixels from the center
pub const MAX_TILT_DEGREES: f32 = 10.0;
/// Pointer offset in pixels that produces the full tilt
pub const TILT_RANGE: f32 = 100.0;
/// Spin speed about the vertical axis
pub const SPIN_DEGREES_PER_SECOND: f32 = 60.0;

/// Tilt angles in degrees for a pointer offset from the widget center.
///
/// `hover` scales the tilt and is expected in `[0, 1]`. Offsets are clamped
/// to `±TILT_RANGE` on each axis.
pub fn tilt_degrees(hover: f32, pointer: Vec2, center: Vec2) -> Vec2 {
    let offset = (pointer - center).clamp(Vec2::splat(-TILT_RANGE), Vec2::splat(TILT_RANGE));
    hover * offset / TILT_RANGE * MAX_TILT_DEGREES
}

/// Rotation of a widget model
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    /// Tilt in degrees; x turns about the vertical axis, y about the horizontal
    pub tilt: Vec2,
    /// Spin about the vertical axis in degrees. It is the rightmost factor of
    /// the model matrix, so it turns the model before the tilt does.
    pub spin: f32,
}

impl Transform {
    /// Transform after `time` seconds of spinning
    pub fn new(tilt: Vec2, time: f32) -> Self {
        Self {
            tilt,
            spin: time * SPIN_DEGREES_PER_SECOND,
        }
    }

    /// `R_y(tilt.x) * R_x(tilt.y) * R_y(spin)`
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_y(self.tilt.x.to_radians())
            * Mat4::from_rotation_x(self.tilt.y.to_radians())
            * Mat4::from_rotation_y(self.spin.to_radians())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_no_tilt_without_hover() {
        let tilt = tilt_degrees(0.0, Vec2::new(500.0, -20.0), Vec2::ZERO);
        assert_eq!(tilt, Vec2::ZERO);
    }

    #[test]
    fn test_tilt_clamps_both_sides() {
        let center = Vec2::new(150.0, 150.0);
        assert_eq!(
            tilt_degrees(1.0, Vec2::new(1000.0, -1000.0), center),
            Vec2::new(10.0, -10.0)
        );
        assert_eq!(
            tilt_degrees(0.5, Vec2::new(200.0, 100.0), center),
            Vec2::new(2.5, -2.5)
        );
    }

    #[test]
    fn test_identity_at_rest() {
        let transform = Transform::new(Vec2::ZERO, 0.0);
        assert!(transform.matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_spin_rate() {
        // 1.5 s at 60 degrees per second is a quarter turn
        let transform = Transform::new(Vec2::ZERO, 1.5);
        assert_eq!(transform.spin, 90.0);
        let x = transform.matrix().transform_vector3(Vec3::X);
        assert!(x.abs_diff_eq(-Vec3::Z, 1e-6));
    }

    #[test]
    fn test_spin_applied_before_tilt() {
        let transform = Transform {
            tilt: Vec2::new(0.0, 90.0),
            spin: 90.0,
        };
        // Spin takes X to -Z, then the tilt about X takes -Z to +Y
        let v = transform.matrix().transform_vector3(Vec3::X);
        assert!(v.abs_diff_eq(Vec3::Y, 1e-6));
    }
}
