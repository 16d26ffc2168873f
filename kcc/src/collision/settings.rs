/*!
Collision tolerances shared by the solver and the reference physics world.

Notes
- Distances are in meters.
- Favor practical world-space tolerances over machine epsilon for robust behavior.
*/

/// Practical small distance for comparisons (meters).
/// Use for dot-product guards, equality checks in world space, etc.
pub const DIST_EPS: f32 = 1.0e-6;

/// Penetrations shallower than this classify the contact but do not move the actor.
pub const MIN_PENETRATION: f32 = 1.0e-6;

/// Tolerance used when comparing the blended and steepest ground normals.
pub const NORMAL_EQ_EPS: f32 = 1.0e-6;

/// `up ⋅ normal` below which a surface is treated as vertical when projecting onto it.
pub const GROUND_PROJECTION_EPS: f32 = 0.001;

/// Overlap radius multiplier used by the ground snap probe.
pub const SNAP_OVERLAP_RADIUS_SCALE: f32 = 1.5;

/// Ground snap walks down in increments of at most `radius * SNAP_STEP_RADIUS_SCALE`.
pub const SNAP_STEP_RADIUS_SCALE: f32 = 0.25;

/// Distance reported for "no ground found yet" while picking the closest probe result.
pub const NO_GROUND_DISTANCE: f32 = 1000.0;
