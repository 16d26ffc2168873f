//! Parry-backed reference implementation of [`PhysicsQuery`] over immutable colliders.
//!
//! Design goals
//! - Deterministic: given the same inputs (sorted by `id`), queries return identical results.
//! - Query-only: the world is never mutated after construction.

use super::{
    broad::{self, WorldAccel},
    narrow_phase,
    query::{Penetration, PhysicsQuery, QueryTriggers},
    types::{ActorShape, ColliderId, ColliderRef, StaticShape, Vec3},
};
use crate::character::overlap::OverlapInfo;

/// Immutable collider set plus its broad-phase accelerator.
pub struct StaticWorld {
    colliders: Vec<ColliderRef>,
    accel: WorldAccel,
}

impl StaticWorld {
    /// Build a query world from collider definitions.
    ///
    /// The input is sorted by `id` before indexing so candidate order is stable.
    pub fn build(mut colliders: Vec<ColliderRef>) -> Self {
        colliders.sort_by_key(|c| c.id);
        let accel = broad::build_world_accel(&colliders);
        log::debug!(
            "built static world: {} finite colliders, {} planes",
            accel.len(),
            accel.plane_indices.len()
        );
        Self { colliders, accel }
    }

    pub fn colliders(&self) -> &[ColliderRef] {
        &self.colliders
    }

    pub fn get(&self, id: ColliderId) -> Option<&ColliderRef> {
        self.colliders
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.colliders[i])
    }
}

/// Convenience: a solid collider on layer 0.
pub fn solid(id: ColliderId, shape: StaticShape) -> ColliderRef {
    ColliderRef {
        id,
        shape,
        layer: 0,
        is_trigger: false,
    }
}

/// Convenience: a trigger collider on layer 0.
pub fn trigger(id: ColliderId, shape: StaticShape) -> ColliderRef {
    ColliderRef {
        id,
        shape,
        layer: 0,
        is_trigger: true,
    }
}

impl PhysicsQuery for StaticWorld {
    fn penetration(
        &self,
        actor: &ActorShape,
        position: Vec3,
        other: &ColliderRef,
    ) -> Option<Penetration> {
        narrow_phase::capsule_penetration(&actor.iso(position), &actor.capsule(0.0), &other.shape)
    }

    fn overlap(
        &self,
        position: Vec3,
        radius: f32,
        height: f32,
        layer_mask: u32,
        triggers: QueryTriggers,
        out: &mut OverlapInfo,
    ) {
        out.reset(position, radius, height);

        let probe = ActorShape::new(radius, height);
        let iso = probe.iso(position);
        let capsule = probe.capsule(0.0);
        let aabb = broad::actor_aabb(&probe, position, 0.0);

        let candidates = self
            .accel
            .plane_indices
            .iter()
            .copied()
            .chain(broad::query_candidates(&self.accel, &aabb));

        for idx in candidates {
            let collider = &self.colliders[idx];
            if layer_mask & (1u32 << (collider.layer & 31)) == 0 {
                continue;
            }
            if collider.is_trigger && triggers == QueryTriggers::Ignore {
                continue;
            }
            if narrow_phase::capsule_overlaps(&iso, &capsule, &collider.shape, 0.0) {
                out.add(*collider);
            }
        }
    }
}
