/*!
Core collision types and math aliases shared by the collision submodules.

This module contains no algorithms. It defines the data exchanged between:
- the physics query contract (penetration, ground check, overlap gather)
- the parry-backed reference world (narrow and broad phase)
- the character solver and its post-processors

Conventions
- The controller is Y-up and units are meters.
- An actor's position is the base (feet) of its capsule; the capsule spans
  `[position.y, position.y + height]`.
*/

use nalgebra as na;
use rapier3d::parry::shape as pshape;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// A rigid transform (isometry) in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

impl Transform {
    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::identity())
    }

    /// Convert to nalgebra `Isometry3` for use with parry narrow-phase queries.
    #[inline]
    pub fn iso(&self) -> Iso {
        Iso::from_parts(
            na::Translation3::new(self.translation.x, self.translation.y, self.translation.z),
            self.rotation,
        )
    }
}

/// Static collision shapes supported by the reference world.
///
/// - Plane: infinite plane in world-space represented by its normal and offset (dist)
///   satisfying: normal ⋅ x = dist. Everything below the plane is solid.
/// - Cuboid: oriented box with half-extents in local space, placed by `transform`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StaticShape {
    Plane {
        /// World-space unit normal of the plane.
        normal: Vec3,
        /// Plane offset along the normal, i.e., normal ⋅ x = dist.
        dist: f32,
    },
    Cuboid {
        /// Local-space half-extents (hx, hy, hz).
        half_extents: Vec3,
        /// World-space pose of the cuboid.
        transform: Transform,
    },
    Sphere {
        radius: f32,
        /// World-space pose (translation used; rotation ignored).
        transform: Transform,
    },
    Capsule {
        radius: f32,
        /// Half of the cylinder length along the local +Y axis.
        half_height: f32,
        transform: Transform,
    },
}

impl StaticShape {
    /// Pose the shape is placed with. Planes are posed at `normal * dist`.
    pub fn pose(&self) -> Transform {
        match *self {
            StaticShape::Plane { normal, dist } => Transform::from_translation(normal * dist),
            StaticShape::Cuboid { transform, .. }
            | StaticShape::Sphere { transform, .. }
            | StaticShape::Capsule { transform, .. } => transform,
        }
    }
}

/// Capsule collider of a kinematic actor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActorShape {
    pub radius: f32,
    /// Full height including both hemispherical caps.
    pub height: f32,
    /// Layer index (0..32) of the actor's collider.
    pub layer: u8,
    pub is_trigger: bool,
}

impl ActorShape {
    pub fn new(radius: f32, height: f32) -> Self {
        Self {
            radius,
            height,
            layer: 0,
            is_trigger: false,
        }
    }

    /// Half-length of the cylinder section between the caps.
    #[inline]
    pub fn half_segment(&self) -> f32 {
        (self.height * 0.5 - self.radius).max(0.0)
    }

    /// Y-aligned parry capsule, optionally inflated by `margin`.
    #[inline]
    pub fn capsule(&self, margin: f32) -> pshape::Capsule {
        pshape::Capsule::new_y(self.half_segment(), self.radius + margin.max(0.0))
    }

    /// Capsule center for an actor standing at `position`.
    #[inline]
    pub fn center(&self, position: Vec3) -> Vec3 {
        position + Vec3::new(0.0, self.height * 0.5, 0.0)
    }

    /// Pose of the capsule (center, upright) for an actor standing at `position`.
    #[inline]
    pub fn iso(&self, position: Vec3) -> Iso {
        let c = self.center(position);
        Iso::from_parts(na::Translation3::new(c.x, c.y, c.z), Quat::identity())
    }
}

/// Identifier of a collider in the physics world.
pub type ColliderId = u32;

/// A collider reported by an overlap query, with its pose cached for the step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColliderRef {
    pub id: ColliderId,
    pub shape: StaticShape,
    pub layer: u8,
    pub is_trigger: bool,
}
