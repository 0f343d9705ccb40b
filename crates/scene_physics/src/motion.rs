//! Body transforms and motion states

use rapier3d::na::{Quaternion, UnitQuaternion};
use rapier3d::prelude as rapier;
use serde::{Deserialize, Serialize};

/// Rigid transform: position plus orientation quaternion (x, y, z, w)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Translation
    pub position: [f32; 3],
    /// Orientation as a quaternion (x, y, z, w)
    pub rotation: [f32; 4],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// Origin with identity orientation
    pub const IDENTITY: Self = Self {
        position: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };

    /// Pure translation
    pub fn from_position(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            ..Self::IDENTITY
        }
    }

    /// Set orientation from euler angles (radians)
    pub fn with_rotation_euler(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = euler_to_quat(x, y, z);
        self
    }

    /// Whether the transform is exactly the identity
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Squared norm of the rotation quaternion
    pub fn rotation_norm_squared(&self) -> f32 {
        self.rotation.iter().map(|c| c * c).sum()
    }

    pub(crate) fn to_isometry(self) -> rapier::Isometry<f32> {
        let [x, y, z, w] = self.rotation;
        rapier::Isometry::from_parts(
            rapier::Translation::new(self.position[0], self.position[1], self.position[2]),
            UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
        )
    }

    pub(crate) fn from_isometry(iso: &rapier::Isometry<f32>) -> Self {
        let t = iso.translation.vector;
        let r = iso.rotation;
        Self {
            position: [t.x, t.y, t.z],
            rotation: [r.i, r.j, r.k, r.w],
        }
    }
}

/// Cached world transform of a body.
///
/// The bootstrapper writes the body pose back into its motion state after
/// every simulation step; observers read it from there.
pub trait MotionState {
    /// Current world transform
    fn world_transform(&self) -> Transform;

    /// Store a new world transform
    fn set_world_transform(&mut self, transform: Transform);
}

/// Motion state that remembers its starting transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultMotionState {
    start: Transform,
    current: Transform,
}

impl DefaultMotionState {
    /// Create a motion state at `start`
    pub fn new(start: Transform) -> Self {
        Self {
            start,
            current: start,
        }
    }

    /// Transform the state was created with
    pub fn start_transform(&self) -> Transform {
        self.start
    }
}

impl Default for DefaultMotionState {
    fn default() -> Self {
        Self::new(Transform::IDENTITY)
    }
}

impl MotionState for DefaultMotionState {
    fn world_transform(&self) -> Transform {
        self.current
    }

    fn set_world_transform(&mut self, transform: Transform) {
        self.current = transform;
    }
}

/// Convert euler angles to quaternion
fn euler_to_quat(x: f32, y: f32, z: f32) -> [f32; 4] {
    let (sx, cx) = (x * 0.5).sin_cos();
    let (sy, cy) = (y * 0.5).sin_cos();
    let (sz, cz) = (z * 0.5).sin_cos();

    [
        sx * cy * cz - cx * sy * sz,
        cx * sy * cz + sx * cy * sz,
        cx * cy * sz - sx * sy * cz,
        cx * cy * cz + sx * sy * sz,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_isometry() {
        let iso = Transform::IDENTITY.to_isometry();
        assert_eq!(iso, rapier::Isometry::identity());
        assert!(Transform::from_isometry(&iso).is_identity());
    }

    #[test]
    fn test_isometry_keeps_position_and_rotation() {
        let t = Transform::from_position(1.0, 2.0, 3.0).with_rotation_euler(0.0, 0.5, 0.0);
        let back = Transform::from_isometry(&t.to_isometry());

        for i in 0..3 {
            assert_relative_eq!(back.position[i], t.position[i], epsilon = 1e-6);
        }
        for i in 0..4 {
            assert_relative_eq!(back.rotation[i], t.rotation[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_euler_zero_is_identity_rotation() {
        let t = Transform::IDENTITY.with_rotation_euler(0.0, 0.0, 0.0);
        assert_eq!(t.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_relative_eq!(t.rotation_norm_squared(), 1.0);
    }

    #[test]
    fn test_motion_state_tracks_current() {
        let mut state = DefaultMotionState::new(Transform::from_position(0.0, 5.0, 0.0));
        state.set_world_transform(Transform::from_position(0.0, 4.0, 0.0));

        assert_eq!(state.start_transform().position, [0.0, 5.0, 0.0]);
        assert_eq!(state.world_transform().position, [0.0, 4.0, 0.0]);
    }
}
