//! Contact classification by the angle between the separation direction and world up.

/// Traversal category of a contact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollisionType {
    #[default]
    None,
    Ground,
    Slope,
    Wall,
    Hang,
    Top,
    Trigger,
}

/// Dot-product thresholds derived once per step from the configured angles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactThresholds {
    /// `cos(max_ground_angle)`
    pub min_ground_dot: f32,
    /// `-cos(90° - max_wall_angle)`
    pub min_wall_dot: f32,
    /// `-cos(90° - max_hang_angle)`
    pub min_hang_dot: f32,
}

impl ContactThresholds {
    /// Angles are in degrees and clamped to `[0, 90]`.
    pub fn new(max_ground_angle: f32, max_wall_angle: f32, max_hang_angle: f32) -> Self {
        let clamp = |deg: f32| deg.clamp(0.0, 90.0).to_radians();
        Self {
            min_ground_dot: clamp(max_ground_angle).cos(),
            min_wall_dot: -clamp(90.0 - max_wall_angle).cos(),
            min_hang_dot: -clamp(90.0 - max_hang_angle).cos(),
        }
    }

    /// Classify a contact from `up_dot = dot(separation_direction, up)`.
    ///
    /// The ground boundary is inclusive: a contact exactly at the max ground angle is ground.
    pub fn classify(&self, up_dot: f32) -> CollisionType {
        if up_dot >= self.min_ground_dot {
            CollisionType::Ground
        } else if up_dot > -self.min_wall_dot {
            CollisionType::Slope
        } else if up_dot >= self.min_wall_dot {
            CollisionType::Wall
        } else if up_dot >= self.min_hang_dot {
            CollisionType::Hang
        } else {
            CollisionType::Top
        }
    }

    /// A surface steeper than ground but still facing up: the actor should slide down it.
    #[inline]
    pub fn is_unwalkable_slope(&self, up_dot: f32) -> bool {
        up_dot > 0.0 && up_dot < self.min_ground_dot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::Vec3;

    fn dot_at_angle(deg: f32) -> f32 {
        // Separation direction tilted `deg` away from up.
        let r = deg.to_radians();
        Vec3::new(r.sin(), r.cos(), 0.0).dot(&Vec3::y())
    }

    #[test]
    fn ground_boundary_is_inclusive() {
        let t = ContactThresholds::new(45.0, 5.0, 30.0);
        assert_eq!(t.classify(t.min_ground_dot), CollisionType::Ground);
        assert_eq!(t.classify(45.0_f32.to_radians().cos()), CollisionType::Ground);
        assert_eq!(t.classify(dot_at_angle(45.5)), CollisionType::Slope);
    }

    #[test]
    fn buckets_follow_the_angle_from_up() {
        let t = ContactThresholds::new(60.0, 5.0, 30.0);
        assert_eq!(t.classify(dot_at_angle(0.0)), CollisionType::Ground);
        assert_eq!(t.classify(dot_at_angle(59.0)), CollisionType::Ground);
        assert_eq!(t.classify(dot_at_angle(70.0)), CollisionType::Slope);
        // Within ±5° of vertical.
        assert_eq!(t.classify(dot_at_angle(88.0)), CollisionType::Wall);
        assert_eq!(t.classify(dot_at_angle(92.0)), CollisionType::Wall);
        // Overhang up to 30° past vertical.
        assert_eq!(t.classify(dot_at_angle(110.0)), CollisionType::Hang);
        assert_eq!(t.classify(dot_at_angle(150.0)), CollisionType::Top);
        assert_eq!(t.classify(dot_at_angle(180.0)), CollisionType::Top);
    }

    #[test]
    fn unwalkable_slope_range_is_open() {
        let t = ContactThresholds::new(45.0, 5.0, 30.0);
        assert!(t.is_unwalkable_slope(dot_at_angle(60.0)));
        assert!(!t.is_unwalkable_slope(dot_at_angle(30.0)));
        assert!(!t.is_unwalkable_slope(0.0));
    }
}
