//! Contract of the physics collaborator consumed by the character solver.
//!
//! The solver never inspects geometry itself. Everything it needs is expressed
//! through [`PhysicsQuery`]; queries must be deterministic for identical poses
//! and must not mutate the world.

use super::{
    settings::DIST_EPS,
    types::{ActorShape, ColliderRef, Vec3},
};
use crate::character::overlap::OverlapInfo;

/// Separation reported by a penetration query.
///
/// Moving the actor by `direction * distance` removes the overlap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Penetration {
    /// Unit separation direction for the actor.
    pub direction: Vec3,
    /// Penetration depth (meters, >= 0).
    pub distance: f32,
}

/// Result of the downward ground probe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundCheck {
    pub is_grounded: bool,
    pub normal: Vec3,
    /// Gap between the capsule and the ground (meters, >= 0).
    pub distance: f32,
    /// The collider is within the probe extent, walkable or not.
    pub is_within_extent: bool,
}

impl GroundCheck {
    pub fn none() -> Self {
        Self {
            is_grounded: false,
            normal: Vec3::y(),
            distance: 0.0,
            is_within_extent: false,
        }
    }
}

/// Whether overlap gathering reports trigger colliders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryTriggers {
    #[default]
    Ignore,
    Include,
}

pub trait PhysicsQuery {
    /// Penetration of the actor standing at `position` into `other`, if any.
    fn penetration(
        &self,
        actor: &ActorShape,
        position: Vec3,
        other: &ColliderRef,
    ) -> Option<Penetration>;

    /// Gather colliders overlapping a capsule standing at `position` into `out`.
    ///
    /// Only colliders whose layer is set in `layer_mask` are reported. `out` is
    /// cleared first so stale entries never survive into the next step.
    fn overlap(
        &self,
        position: Vec3,
        radius: f32,
        height: f32,
        layer_mask: u32,
        triggers: QueryTriggers,
        out: &mut OverlapInfo,
    );

    /// Probe for walkable ground under the actor against `other`.
    ///
    /// The default implementation lowers the capsule by `extent` and converts the
    /// penetration found there into a vertical gap.
    fn ground_check(
        &self,
        actor: &ActorShape,
        position: Vec3,
        other: &ColliderRef,
        extent: f32,
        min_ground_dot: f32,
    ) -> GroundCheck {
        let probe = position - Vec3::new(0.0, extent, 0.0);
        let Some(hit) = self.penetration(actor, probe, other) else {
            return GroundCheck::none();
        };

        if hit.direction.y >= min_ground_dot {
            let (_, vertical) = vertical_correction(hit.direction, hit.distance);
            return GroundCheck {
                is_grounded: true,
                normal: hit.direction,
                distance: (extent - vertical).max(0.0),
                is_within_extent: true,
            };
        }

        GroundCheck {
            is_within_extent: true,
            ..GroundCheck::none()
        }
    }
}

/// Convert a penetration into a purely horizontal correction that reaches the
/// same separation from the contact plane.
///
/// Returns the input unchanged when the separation has no planar component.
pub fn horizontal_correction(direction: Vec3, distance: f32) -> (Vec3, f32) {
    let correction = direction * distance;
    let correction_xz = Vec3::new(correction.x, 0.0, correction.z);
    let distance_xz = correction_xz.norm();
    if distance_xz < DIST_EPS {
        return (direction, distance);
    }
    let reflected = correction.y * correction.y / distance_xz;
    (correction_xz / distance_xz, distance_xz + reflected)
}

/// Convert a penetration into a purely vertical correction that reaches the
/// same separation from the contact plane.
///
/// Returns the input unchanged when the separation has no vertical component.
pub fn vertical_correction(direction: Vec3, distance: f32) -> (Vec3, f32) {
    let correction = direction * distance;
    if correction.y.abs() < DIST_EPS {
        return (direction, distance);
    }
    let reflected = (correction.x * correction.x + correction.z * correction.z) / correction.y;
    let vertical = correction.y + reflected;
    (Vec3::new(0.0, vertical.signum(), 0.0), vertical.abs())
}
