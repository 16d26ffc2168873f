use nalgebra as na;
use rapier3d::parry::{query, shape as pshape};

use super::{
    query::Penetration,
    types::{Iso, StaticShape, Vec3},
};
use crate::utils;

/// Run `f` with the parry shape and world pose backing `shape`.
///
/// Planes become parry half-spaces positioned at `normal * dist`.
pub fn with_parry_shape<R>(
    shape: &StaticShape,
    f: impl FnOnce(&Iso, &dyn pshape::Shape) -> R,
) -> R {
    let iso = shape.pose().iso();
    match *shape {
        StaticShape::Plane { normal, .. } => {
            let plane = pshape::HalfSpace::new(na::Unit::new_normalize(normal));
            f(&iso, &plane)
        }
        StaticShape::Cuboid { half_extents, .. } => f(&iso, &pshape::Cuboid::new(half_extents)),
        StaticShape::Sphere { radius, .. } => f(&iso, &pshape::Ball::new(radius)),
        StaticShape::Capsule {
            radius,
            half_height,
            ..
        } => f(&iso, &pshape::Capsule::new_y(half_height, radius)),
    }
}

/// Signed gap between the capsule surface and the plane `normal · x = dist`.
///
/// Returns the unit plane normal and the gap; the gap is negative once the
/// lowest point of the capsule dips below the plane.
fn capsule_plane_gap(
    capsule_iso: &Iso,
    capsule: &pshape::Capsule,
    normal: Vec3,
    dist: f32,
) -> Option<(Vec3, f32)> {
    let n = utils::try_normalize(normal)?;
    let a = capsule_iso * capsule.segment.a;
    let b = capsule_iso * capsule.segment.b;
    let lowest = n.dot(&a.coords).min(n.dot(&b.coords)) - capsule.radius;
    Some((n, lowest - dist))
}

/// Penetration of a Y-aligned capsule into a static shape.
///
/// - `capsule_iso`: the capsule's center pose in world space.
/// - Returns the direction that moves the capsule out (unit) and the depth.
/// - Touching without overlap (`dist == 0`) is not a penetration.
/// - Planes are solved in closed form against the capsule segment.
pub fn capsule_penetration(
    capsule_iso: &Iso,
    capsule: &pshape::Capsule,
    shape: &StaticShape,
) -> Option<Penetration> {
    if let StaticShape::Plane { normal, dist } = *shape {
        let (direction, gap) = capsule_plane_gap(capsule_iso, capsule, normal, dist)?;
        return (gap < 0.0).then_some(Penetration {
            direction,
            distance: -gap,
        });
    }

    with_parry_shape(shape, |iso, other| {
        let contact = match query::contact(capsule_iso, capsule, iso, other, 0.0) {
            Ok(Some(contact)) => contact,
            Ok(None) => return None,
            Err(_) => {
                log::warn!("unsupported penetration query against {shape:?}");
                return None;
            }
        };
        if contact.dist >= 0.0 {
            return None;
        }

        // `normal1` points from the capsule toward the other shape.
        let direction = -contact.normal1.into_inner();
        if !utils::is_finite(&direction) {
            return None;
        }
        Some(Penetration {
            direction,
            distance: -contact.dist,
        })
    })
}

/// True if the capsule and the shape are closer than `margin` (or overlapping).
pub fn capsule_overlaps(
    capsule_iso: &Iso,
    capsule: &pshape::Capsule,
    shape: &StaticShape,
    margin: f32,
) -> bool {
    let margin = margin.max(0.0);
    if let StaticShape::Plane { normal, dist } = *shape {
        return capsule_plane_gap(capsule_iso, capsule, normal, dist)
            .is_some_and(|(_, gap)| gap <= margin);
    }

    with_parry_shape(shape, |iso, other| {
        matches!(
            query::contact(capsule_iso, capsule, iso, other, margin),
            Ok(Some(_))
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::types::Transform;
    use approx::assert_relative_eq;

    fn capsule_at(center: Vec3) -> (Iso, pshape::Capsule) {
        (
            Transform::from_translation(center).iso(),
            pshape::Capsule::new_y(0.5, 0.5),
        )
    }

    #[test]
    fn capsule_sunk_into_plane_is_pushed_up() {
        let ground = StaticShape::Plane {
            normal: Vec3::y(),
            dist: 0.0,
        };
        // Bottom of the capsule at y = -0.2.
        let (iso, capsule) = capsule_at(Vec3::new(0.0, 0.8, 0.0));
        let hit = capsule_penetration(&iso, &capsule, &ground).unwrap();
        assert_relative_eq!(hit.direction, Vec3::y(), epsilon = 1.0e-5);
        assert_relative_eq!(hit.distance, 0.2, epsilon = 1.0e-5);
    }

    #[test]
    fn separated_capsule_has_no_penetration() {
        let ground = StaticShape::Plane {
            normal: Vec3::y(),
            dist: 0.0,
        };
        let (iso, capsule) = capsule_at(Vec3::new(0.0, 1.1, 0.0));
        assert!(capsule_penetration(&iso, &capsule, &ground).is_none());
        assert!(capsule_overlaps(&iso, &capsule, &ground, 0.2));
        assert!(!capsule_overlaps(&iso, &capsule, &ground, 0.05));
    }

    #[test]
    fn tilted_plane_depth_uses_the_lowest_capsule_point() {
        let n = Vec3::new(1.0, 1.0, 0.0).normalize();
        let slope = StaticShape::Plane {
            normal: n,
            dist: 0.0,
        };
        // Lower segment end at the origin, so the surface dips `radius` below.
        let (iso, capsule) = capsule_at(Vec3::new(0.0, 0.5, 0.0));
        let hit = capsule_penetration(&iso, &capsule, &slope).unwrap();
        assert_relative_eq!(hit.direction, n, epsilon = 1.0e-5);
        assert_relative_eq!(hit.distance, 0.5, epsilon = 1.0e-5);

        // Lift the capsule 0.1 clear of the plane along its normal.
        let (iso, capsule) = capsule_at(Vec3::new(0.0, 0.5, 0.0) + n * 0.6);
        assert!(capsule_penetration(&iso, &capsule, &slope).is_none());
        assert!(capsule_overlaps(&iso, &capsule, &slope, 0.15));
        assert!(!capsule_overlaps(&iso, &capsule, &slope, 0.05));
    }

    #[test]
    fn capsule_pushed_sideways_out_of_box() {
        let wall = StaticShape::Cuboid {
            half_extents: Vec3::new(0.5, 2.0, 2.0),
            transform: Transform::from_translation(Vec3::new(1.0, 1.0, 0.0)),
        };
        // Capsule surface reaches x = 0.6, wall starts at x = 0.5.
        let (iso, capsule) = capsule_at(Vec3::new(0.1, 1.0, 0.0));
        let hit = capsule_penetration(&iso, &capsule, &wall).unwrap();
        assert_relative_eq!(hit.direction, -Vec3::x(), epsilon = 1.0e-5);
        assert_relative_eq!(hit.distance, 0.1, epsilon = 1.0e-5);
    }
}
