//! Ground tangent derivation for grounded actors.

use crate::{
    collision::{Vec3, settings::GROUND_PROJECTION_EPS},
    utils,
};

use super::data::KccData;

/// Project `direction` onto the plane with `normal` along the up axis.
///
/// Returns `None` when the plane is too close to vertical or the result is degenerate.
pub fn project_on_ground(direction: Vec3, normal: Vec3) -> Option<Vec3> {
    let up_dot = utils::up().dot(&normal);
    if up_dot.abs() < GROUND_PROJECTION_EPS {
        return None;
    }
    let projected = Vec3::new(
        direction.x,
        direction.y + (-direction.dot(&normal)) / up_dot,
        direction.z,
    );
    utils::try_normalize(projected)
}

/// Recompute `ground_tangent` from the current ground normal.
///
/// The first usable direction wins: the planar transform forward, the planar
/// desired velocity, then the look direction. Non-grounded actors get no tangent.
pub fn recalculate_ground_properties(data: &mut KccData) {
    data.ground_tangent = Vec3::zeros();
    if !data.is_grounded {
        return;
    }

    let candidates = [
        utils::only_xz(data.transform_direction),
        utils::only_xz(data.desired_velocity),
        utils::yaw_forward(data.look_yaw),
    ];

    for candidate in candidates {
        let Some(direction) = utils::try_normalize(candidate) else {
            continue;
        };
        if let Some(tangent) = project_on_ground(direction, data.ground_normal) {
            data.ground_tangent = tangent;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KccSettings;
    use approx::assert_relative_eq;

    fn grounded(normal: Vec3) -> KccData {
        let mut data = KccData::new(&KccSettings::default());
        data.is_grounded = true;
        data.ground_normal = normal;
        data
    }

    #[test]
    fn tangent_follows_the_slope() {
        let n = Vec3::new(-1.0, 1.0, 0.0).normalize();
        let mut data = grounded(n);
        data.desired_velocity = Vec3::new(2.0, -1.0, 0.0);
        recalculate_ground_properties(&mut data);

        let t = data.ground_tangent;
        assert_relative_eq!(t.dot(&n), 0.0, epsilon = 1.0e-6);
        assert_relative_eq!(t, Vec3::new(1.0, 1.0, 0.0).normalize(), epsilon = 1.0e-6);
    }

    #[test]
    fn transform_forward_wins_over_velocity() {
        let mut data = grounded(Vec3::y());
        data.transform_direction = Vec3::new(0.0, 0.0, -3.0);
        data.desired_velocity = Vec3::new(1.0, 0.0, 0.0);
        recalculate_ground_properties(&mut data);
        assert_relative_eq!(data.ground_tangent, -Vec3::z(), epsilon = 1.0e-6);
    }

    #[test]
    fn falls_back_to_look_direction() {
        let mut data = grounded(Vec3::y());
        data.look_yaw = 90.0;
        recalculate_ground_properties(&mut data);
        assert_relative_eq!(data.ground_tangent, Vec3::x(), epsilon = 1.0e-6);
    }

    #[test]
    fn vertical_ground_and_airborne_actors_have_no_tangent() {
        assert!(project_on_ground(Vec3::x(), Vec3::x()).is_none());

        let mut data = grounded(Vec3::y());
        data.is_grounded = false;
        data.ground_tangent = Vec3::x();
        recalculate_ground_properties(&mut data);
        assert_eq!(data.ground_tangent, Vec3::zeros());
    }
}
