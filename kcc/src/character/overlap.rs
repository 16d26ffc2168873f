use crate::collision::{ColliderRef, Transform, Vec3};

use super::classify::CollisionType;

/// One collider overlapping the actor during a step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlapHit {
    pub collider: ColliderRef,
    /// Pose of the collider cached when the step started.
    pub cached_pose: Transform,
    pub is_trigger: bool,
    pub has_penetration: bool,
    pub is_within_extent: bool,
    /// Last separation direction computed for this collider.
    pub direction: Vec3,
    /// Last penetration depth computed for this collider.
    pub distance: f32,
    /// Deepest penetration seen this step.
    pub max_penetration: f32,
    /// Highest `dot(direction, up)` seen this step.
    pub up_direction_dot: f32,
    pub collision_type: CollisionType,
}

impl OverlapHit {
    pub fn new(collider: ColliderRef) -> Self {
        Self {
            collider,
            cached_pose: collider.shape.pose(),
            is_trigger: collider.is_trigger,
            has_penetration: false,
            is_within_extent: false,
            direction: Vec3::zeros(),
            distance: 0.0,
            max_penetration: 0.0,
            up_direction_dot: 0.0,
            collision_type: CollisionType::None,
        }
    }

    /// Forget results of a previous resolve pass, keeping the collider and its pose.
    pub fn reset_results(&mut self) {
        self.has_penetration = false;
        self.is_within_extent = false;
        self.direction = Vec3::zeros();
        self.distance = 0.0;
        self.max_penetration = 0.0;
        self.up_direction_dot = f32::MIN;
        self.collision_type = CollisionType::None;
    }
}

/// Colliders overlapping the actor for one step.
///
/// Filled by [`PhysicsQuery::overlap`](crate::collision::PhysicsQuery::overlap); the
/// backing vectors keep their capacity across steps.
#[derive(Clone, Debug, Default)]
pub struct OverlapInfo {
    pub position: Vec3,
    pub radius: f32,
    pub height: f32,
    pub collider_hits: Vec<OverlapHit>,
    pub trigger_hits: Vec<OverlapHit>,
}

impl OverlapInfo {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            collider_hits: Vec::with_capacity(capacity),
            trigger_hits: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Clear all hits and record the query volume.
    pub fn reset(&mut self, position: Vec3, radius: f32, height: f32) {
        self.position = position;
        self.radius = radius;
        self.height = height;
        self.collider_hits.clear();
        self.trigger_hits.clear();
    }

    pub fn add(&mut self, collider: ColliderRef) {
        let hit = OverlapHit::new(collider);
        if collider.is_trigger {
            self.trigger_hits.push(hit);
        } else {
            self.collider_hits.push(hit);
        }
    }

    #[inline]
    pub fn all_hit_count(&self) -> usize {
        self.collider_hits.len() + self.trigger_hits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{StaticShape, world};

    #[test]
    fn reset_drops_stale_hits() {
        let mut info = OverlapInfo::with_capacity(4);
        let plane = StaticShape::Plane {
            normal: Vec3::y(),
            dist: 0.0,
        };
        info.add(world::solid(1, plane));
        info.add(world::trigger(2, plane));
        assert_eq!(info.all_hit_count(), 2);
        assert_eq!(info.collider_hits[0].collider.id, 1);
        assert_eq!(info.trigger_hits[0].collider.id, 2);

        info.reset(Vec3::zeros(), 0.5, 2.0);
        assert_eq!(info.all_hit_count(), 0);
        assert!(info.collider_hits.capacity() >= 4);
    }
}
