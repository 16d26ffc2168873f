use nalgebra as na;
use rapier3d::parry::{
    bounding_volume::Aabb,
    partitioning::{Bvh, BvhBuildStrategy},
    shape::Shape as _,
};

use super::{
    narrow_phase::with_parry_shape,
    types::{ActorShape, ColliderRef, StaticShape, Vec3},
};

/// Acceleration structure for broad-phase queries over immutable world colliders.
///
/// Notes:
/// - Finite shapes (Cuboid, Sphere, Capsule) are stored as world-space AABBs in a BVH.
///   Planes are handled separately because they are infinite.
/// - `non_plane_indices` maps each stored AABB back to its index in the original slice.
/// - `plane_indices` stores indices of planes in the original slice.
pub struct WorldAccel {
    /// BVH over finite shapes (AABBs).
    pub bvh: Bvh,
    /// Indices into the original collider slice for the AABBs above.
    pub non_plane_indices: Vec<usize>,
    /// Indices into the original collider slice for planes.
    pub plane_indices: Vec<usize>,
}

impl WorldAccel {
    /// Return true if this accelerator has no non-plane entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.non_plane_indices.is_empty()
    }

    /// Number of non-plane entries (AABBs) in this accelerator.
    #[inline]
    pub fn len(&self) -> usize {
        self.non_plane_indices.len()
    }
}

/// Build a broad-phase accelerator over immutable world colliders.
///
/// - Finite shapes get a world-space AABB and are indexed.
/// - Planes are kept in `plane_indices` and must be tested separately during queries.
pub fn build_world_accel(colliders: &[ColliderRef]) -> WorldAccel {
    let mut aabbs: Vec<Aabb> = Vec::new();
    let mut non_plane_indices: Vec<usize> = Vec::new();
    let mut plane_indices: Vec<usize> = Vec::new();

    for (i, c) in colliders.iter().enumerate() {
        match c.shape {
            StaticShape::Plane { .. } => plane_indices.push(i),
            _ => {
                aabbs.push(shape_aabb(&c.shape));
                non_plane_indices.push(i);
            }
        }
    }

    WorldAccel {
        bvh: Bvh::from_leaves(BvhBuildStrategy::Binned, &aabbs),
        non_plane_indices,
        plane_indices,
    }
}

/// World-space AABB of a finite static shape.
fn shape_aabb(shape: &StaticShape) -> Aabb {
    with_parry_shape(shape, |iso, s| s.compute_aabb(iso))
}

/// AABB of an upright capsule standing at `position`, inflated by `margin`.
pub fn capsule_aabb(position: Vec3, radius: f32, height: f32, margin: f32) -> Aabb {
    let r = radius + margin.max(0.0);
    let mins = na::Point3::new(position.x - r, position.y - margin.max(0.0), position.z - r);
    let maxs = na::Point3::new(
        position.x + r,
        position.y + height.max(radius * 2.0) + margin.max(0.0),
        position.z + r,
    );
    Aabb { mins, maxs }
}

/// AABB of an actor's capsule at `position`.
#[inline]
pub fn actor_aabb(actor: &ActorShape, position: Vec3, margin: f32) -> Aabb {
    capsule_aabb(position, actor.radius, actor.height, margin)
}

/// Query candidate collider indices whose AABB intersects `aabb`.
///
/// Returns indices referencing the original collider slice (not the local AABB array).
/// Candidates are sorted so query results do not depend on BVH traversal order.
pub fn query_candidates(accel: &WorldAccel, aabb: &Aabb) -> Vec<usize> {
    let mut candidates: Vec<usize> = accel
        .bvh
        .intersect_aabb(aabb)
        .map(|leaf_idx| accel.non_plane_indices[leaf_idx as usize])
        .collect();
    candidates.sort_unstable();
    candidates
}
