//! Affine transformations of Cartesian site positions.
//!
//! Used to shift a model when its cell is expanded and to rotate a
//! particle about an anchor point.

use nalgebra::{Matrix3, Rotation3, Unit, Vector3};

/// An affine transformation: rotation matrix + translation.
#[derive(Debug, Clone)]
pub struct Transform {
    pub matrix: Matrix3<f64>,
    /// Translation vector (nm).
    pub translation: Vector3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

impl Transform {
    /// Create a pure translation.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: Vector3::new(dx, dy, dz),
        }
    }

    /// Right-handed rotation by `degrees` about `axis` through `anchor`.
    ///
    /// Returns `None` for a zero-length axis.
    pub fn rotation_about(axis: [f64; 3], anchor: [f64; 3], degrees: f64) -> Option<Self> {
        let axis = Unit::try_new(Vector3::new(axis[0], axis[1], axis[2]), 1e-12)?;
        let rotation = Rotation3::from_axis_angle(&axis, degrees.to_radians());
        let anchor = Vector3::new(anchor[0], anchor[1], anchor[2]);
        let matrix = *rotation.matrix();
        Some(Self {
            matrix,
            translation: anchor - matrix * anchor,
        })
    }

    /// Apply this transformation to a 3D point.
    pub fn apply(&self, point: &[f64; 3]) -> [f64; 3] {
        let v = Vector3::new(point[0], point[1], point[2]);
        let result = self.matrix * v + self.translation;
        [result.x, result.y, result.z]
    }

    /// Compose two transforms: self followed by other.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            matrix: other.matrix * self.matrix,
            translation: other.matrix * self.translation + other.translation,
        }
    }
}
