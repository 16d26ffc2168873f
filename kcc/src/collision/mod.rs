/*!
Collision root module.

The character solver consumes physics through the [`PhysicsQuery`] contract.
This module defines that contract and ships a parry-backed reference world:

- types:        shared data types (Transform, StaticShape, ActorShape, ColliderRef)
- settings:     collision tolerances
- query:        the physics contract (penetration, ground check, overlap gather)
- narrow_phase: thin wrappers over parry queries (contact/penetration)
- broad:        broad-phase accelerator (BVH over finite shapes, planes kept apart)
- world:        `StaticWorld`, the reference `PhysicsQuery` implementation
*/

pub mod broad;
pub mod narrow_phase;
pub mod query;
pub mod settings;
pub mod types;
pub mod world;

// Re-export commonly used types and functions.
pub use query::{GroundCheck, Penetration, PhysicsQuery, QueryTriggers};
pub use types::{ActorShape, ColliderId, ColliderRef, Iso, Quat, StaticShape, Transform, Vec3};
pub use world::StaticWorld;

/// Convenience: build a `StaticShape::Plane` from a world-space plane pose:
/// - normal = rotation * +Y
/// - dist = dot(normal, translation) + optional offset
#[inline]
pub fn plane_from_pose(rotation: Quat, translation: Vec3, offset_along_normal: f32) -> StaticShape {
    let normal = rotation * Vec3::new(0.0, 1.0, 0.0);
    let dist = normal.dot(&translation) + offset_along_normal;
    StaticShape::Plane { normal, dist }
}

/// Convenience: build a `StaticShape::Cuboid` with given half extents and pose.
#[inline]
pub fn cuboid_from_pose(half_extents: Vec3, translation: Vec3, rotation: Quat) -> StaticShape {
    StaticShape::Cuboid {
        half_extents,
        transform: Transform {
            translation,
            rotation,
        },
    }
}
