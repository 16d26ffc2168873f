use crate::collision::{Quat, Vec3};
use nalgebra as na;

/// Smallest squared length treated as a usable direction.
const DIR_EPS_SQ: f32 = 1.0e-12;

/// World up axis as a vector.
#[inline]
pub fn up() -> Vec3 {
    Vec3::y()
}

/// Planar (XZ) part of a vector.
#[inline]
pub fn only_xz(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Normalize `v`, or `None` when it is too short to carry a direction.
#[inline]
pub fn try_normalize(v: Vec3) -> Option<Vec3> {
    let len_sq = v.norm_squared();
    if len_sq > DIR_EPS_SQ && len_sq.is_finite() {
        Some(v / len_sq.sqrt())
    } else {
        None
    }
}

#[inline]
pub fn is_finite(v: &Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

/// Angle between two vectors in degrees.
#[inline]
pub fn angle_deg(a: Vec3, b: Vec3) -> f32 {
    let denom = (a.norm_squared() * b.norm_squared()).sqrt();
    if denom <= DIR_EPS_SQ {
        return 0.0;
    }
    (a.dot(&b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Move `current` toward `target` by at most `max_delta`.
#[inline]
pub fn move_towards(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let delta = target - current;
    let dist = delta.norm();
    if dist <= max_delta || dist <= f32::EPSILON {
        return target;
    }
    current + delta / dist * max_delta
}

/// Wrap an angle in degrees to `[-180, 180)`.
#[inline]
pub fn wrap_angle(deg: f32) -> f32 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Shortest signed difference `to - from` in degrees, in `[-180, 180)`.
#[inline]
pub fn delta_angle(from: f32, to: f32) -> f32 {
    wrap_angle(to - from)
}

/// Shortest-path interpolation between two angles in degrees.
///
/// The result is wrapped to `[-180, 180)`.
#[inline]
pub fn lerp_angle(from: f32, to: f32, alpha: f32) -> f32 {
    wrap_angle(from + delta_angle(from, to) * alpha)
}

#[inline]
pub fn lerp(from: f32, to: f32, alpha: f32) -> f32 {
    from + (to - from) * alpha
}

/// Yaw-pitch look rotation (degrees). Pitch rotates about +X, yaw about +Y.
pub fn look_rotation(pitch_deg: f32, yaw_deg: f32) -> Quat {
    let yaw = na::UnitQuaternion::from_axis_angle(&na::Vector3::y_axis(), yaw_deg.to_radians());
    let pitch =
        na::UnitQuaternion::from_axis_angle(&na::Vector3::x_axis(), pitch_deg.to_radians());
    yaw * pitch
}

/// Planar facing direction for a yaw angle in degrees (+Z forward at 0°).
#[inline]
pub fn yaw_forward(yaw_deg: f32) -> Vec3 {
    let (s, c) = yaw_deg.to_radians().sin_cos();
    Vec3::new(s, 0.0, c)
}
