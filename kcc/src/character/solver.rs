/*!
Depenetration solver.

Moves a proposed target position out of every overlapping collider and derives
the grounded state from the contacts it resolved. Geometry comes exclusively
from the [`PhysicsQuery`] collaborator.

Overview
- One collider: penetrations are resolved directly, one query per sub-step.
- Several colliders: every collider is queried in the same sub-step, the
  corrections are combined by the [`KccResolver`], then refined by a few
  re-query passes with a decaying multiplier.
- Ground probe: when no contact was ground, colliders are probed slightly below
  the actor to find ground within the extent.
- Triggers are tested for overlap and classified, never moving the actor.
*/

use crate::{
    collision::{
        ActorShape, PhysicsQuery, Vec3,
        query::horizontal_correction,
        settings::{MIN_PENETRATION, NO_GROUND_DISTANCE, NORMAL_EQ_EPS},
    },
    constants::{MIN_STEP_DISTANCE, RESOLVER_MAX_ITERATIONS, RESOLVER_TOLERANCE},
    utils,
};

use super::{
    classify::{CollisionType, ContactThresholds},
    data::KccData,
    overlap::{OverlapHit, OverlapInfo},
    resolver::KccResolver,
};

/// Per-call solver options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolveParams {
    /// Probe for ground below the actor when no contact was ground.
    pub probe_grounding: bool,
    pub max_sub_steps: u32,
    /// Refinement passes after the first multi-collider correction.
    pub resolver_iterations: u32,
    pub resolve_triggers: bool,
}

impl Default for ResolveParams {
    fn default() -> Self {
        Self {
            probe_grounding: true,
            max_sub_steps: 1,
            resolver_iterations: 2,
            resolve_triggers: false,
        }
    }
}

/// Number of sub-steps used to travel from `base` to `target`.
///
/// Short moves are split into fewer steps so no step is shorter than
/// [`MIN_STEP_DISTANCE`].
pub fn sub_step_count(base: Vec3, target: Vec3, max_sub_steps: u32) -> u32 {
    if max_sub_steps <= 1 {
        return 1;
    }
    let distance = (target - base).norm();
    if distance < max_sub_steps as f32 * MIN_STEP_DISTANCE {
        let clamped = ((distance / MIN_STEP_DISTANCE) as u32).max(1);
        log::debug!("sub-steps clamped {max_sub_steps} -> {clamped} for {distance} m");
        return clamped;
    }
    max_sub_steps
}

/// Multiplier applied to the combined correction of refinement pass `pass`.
#[inline]
pub fn pass_multiplier(pass: u32) -> f32 {
    1.0 - pass.min(2) as f32 * 0.25
}

/// Depenetration solver bound to one physics collaborator and actor shape.
pub struct Solver<'a, Q: PhysicsQuery + ?Sized> {
    query: &'a Q,
    actor: ActorShape,
    /// Probe distance below the actor used by the ground check.
    extent: f32,
}

impl<'a, Q: PhysicsQuery + ?Sized> Solver<'a, Q> {
    pub fn new(query: &'a Q, actor: ActorShape, extent: f32) -> Self {
        Self {
            query,
            actor,
            extent,
        }
    }

    /// Resolve `target_position` against the colliders in `overlap`.
    ///
    /// Updates `data.is_grounded` and the ground fields, and each hit's
    /// penetration and classification. Returns the corrected position.
    pub fn resolve(
        &self,
        overlap: &mut OverlapInfo,
        data: &mut KccData,
        resolver: &mut KccResolver,
        base_position: Vec3,
        target_position: Vec3,
        params: ResolveParams,
    ) -> Vec3 {
        let thresholds = ContactThresholds::new(
            data.max_ground_angle,
            data.max_wall_angle,
            data.max_hang_angle,
        );

        data.is_grounded = false;
        data.ground_normal = Vec3::zeros();
        data.ground_distance = 0.0;

        for hit in overlap.collider_hits.iter_mut() {
            hit.reset_results();
        }

        let motion = Motion {
            planar: utils::only_xz(target_position - base_position),
            falling: data.dynamic_velocity.y <= 0.0,
        };

        let mut position = match overlap.collider_hits.len() {
            0 => target_position,
            1 => self.resolve_single(
                &mut overlap.collider_hits[0],
                data,
                &thresholds,
                motion,
                base_position,
                target_position,
                params.max_sub_steps,
            ),
            _ => self.resolve_multi(
                &mut overlap.collider_hits,
                data,
                resolver,
                &thresholds,
                motion,
                base_position,
                target_position,
                params,
            ),
        };

        if !utils::is_finite(&position) {
            log::warn!("solver produced non-finite position, keeping target");
            position = target_position;
        }

        if !data.is_grounded && params.probe_grounding {
            self.probe_ground(&mut overlap.collider_hits, data, &thresholds, position);
        }

        if params.resolve_triggers {
            self.resolve_triggers(&mut overlap.trigger_hits, position);
        }

        data.target_position = position;
        if data.is_grounded {
            data.update_ground_position(self.actor.radius);
        } else {
            data.ground_angle = 0.0;
        }

        position
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_single(
        &self,
        hit: &mut OverlapHit,
        data: &mut KccData,
        thresholds: &ContactThresholds,
        motion: Motion,
        base_position: Vec3,
        target_position: Vec3,
        max_sub_steps: u32,
    ) -> Vec3 {
        let steps = sub_step_count(base_position, target_position, max_sub_steps);
        if steps <= 1 {
            let correction = self.depenetrate(hit, data, thresholds, motion, target_position);
            return target_position + correction;
        }

        let step = (target_position - base_position) / steps as f32;
        let mut position = base_position;
        for _ in 0..steps {
            position += step;
            position += self.depenetrate(hit, data, thresholds, motion, position);
        }
        position
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_multi(
        &self,
        hits: &mut [OverlapHit],
        data: &mut KccData,
        resolver: &mut KccResolver,
        thresholds: &ContactThresholds,
        motion: Motion,
        base_position: Vec3,
        target_position: Vec3,
        params: ResolveParams,
    ) -> Vec3 {
        let steps = sub_step_count(base_position, target_position, params.max_sub_steps);
        let (mut position, step) = if steps <= 1 {
            (target_position, Vec3::zeros())
        } else {
            (base_position, (target_position - base_position) / steps as f32)
        };

        for _ in 0..steps {
            position += step;

            for pass in 0..=params.resolver_iterations {
                resolver.reset();

                let mut max_ground_dot = f32::MIN;
                let mut max_ground_normal = Vec3::zeros();
                let mut average_ground_normal = Vec3::zeros();

                for hit in hits.iter_mut() {
                    let correction = self.depenetrate(hit, data, thresholds, motion, position);
                    if !hit.has_penetration {
                        continue;
                    }
                    if let Some(direction) = utils::try_normalize(correction) {
                        resolver.add_correction(direction, correction.norm());
                    }

                    let up_dot = hit.direction.y;
                    if up_dot >= thresholds.min_ground_dot {
                        if up_dot > max_ground_dot {
                            max_ground_dot = up_dot;
                            max_ground_normal = hit.direction;
                        }
                        average_ground_normal += hit.direction * up_dot;
                    }
                }

                if max_ground_dot > f32::MIN {
                    data.is_grounded = true;
                    data.ground_normal =
                        blend_ground_normal(max_ground_normal, average_ground_normal);
                }

                if resolver.count() == 0 {
                    break;
                }

                let correction =
                    resolver.calculate_best(RESOLVER_MAX_ITERATIONS, RESOLVER_TOLERANCE);
                position += correction * pass_multiplier(pass);
            }
        }

        position
    }

    /// Query one collider at `position`, update the hit and the ground state, and
    /// return the correction to apply.
    fn depenetrate(
        &self,
        hit: &mut OverlapHit,
        data: &mut KccData,
        thresholds: &ContactThresholds,
        motion: Motion,
        position: Vec3,
    ) -> Vec3 {
        hit.has_penetration = false;

        let Some(penetration) = self.query.penetration(&self.actor, position, &hit.collider)
        else {
            return Vec3::zeros();
        };
        let direction = penetration.direction;
        let distance = penetration.distance;
        if !utils::is_finite(&direction) || !distance.is_finite() || distance < 0.0 {
            log::warn!("discarding invalid penetration against collider {}", hit.collider.id);
            return Vec3::zeros();
        }

        hit.has_penetration = true;
        hit.direction = direction;
        hit.distance = distance;
        hit.max_penetration = hit.max_penetration.max(distance);

        let up_dot = direction.dot(&utils::up());
        if up_dot > hit.up_direction_dot {
            hit.up_direction_dot = up_dot;
            hit.collision_type = thresholds.classify(up_dot);
            log::trace!(
                "collider {} classified {:?} (up dot {up_dot})",
                hit.collider.id,
                hit.collision_type
            );

            if hit.collision_type == CollisionType::Ground
                && (!data.is_grounded || up_dot > data.ground_normal.y)
            {
                data.is_grounded = true;
                data.ground_normal = direction;
            }
        }

        if distance < MIN_PENETRATION {
            return Vec3::zeros();
        }

        // Pushing straight out of an unwalkable slope would lift the actor up it.
        if thresholds.is_unwalkable_slope(up_dot)
            && motion.falling
            && motion.planar.dot(&utils::only_xz(direction)) < 0.0
        {
            let (dir, dist) = horizontal_correction(direction, distance);
            return dir * dist;
        }

        direction * distance
    }

    /// Probe each collider below `position`; the closest ground within the extent wins.
    fn probe_ground(
        &self,
        hits: &mut [OverlapHit],
        data: &mut KccData,
        thresholds: &ContactThresholds,
        position: Vec3,
    ) {
        let mut best_distance = NO_GROUND_DISTANCE;
        let mut best_normal = None;

        for hit in hits.iter_mut() {
            let check = self.query.ground_check(
                &self.actor,
                position,
                &hit.collider,
                self.extent,
                thresholds.min_ground_dot,
            );
            if !check.is_within_extent {
                continue;
            }
            hit.is_within_extent = true;

            if check.is_grounded {
                if hit.collision_type == CollisionType::None {
                    hit.collision_type = CollisionType::Ground;
                }
                if check.distance < best_distance {
                    best_distance = check.distance;
                    best_normal = Some(check.normal);
                }
            } else if hit.collision_type == CollisionType::None {
                hit.collision_type = CollisionType::Slope;
            }
        }

        if let Some(normal) = best_normal {
            data.is_grounded = true;
            data.ground_normal = normal;
            data.ground_distance = best_distance;
        }
    }

    fn resolve_triggers(&self, hits: &mut [OverlapHit], position: Vec3) {
        for hit in hits.iter_mut() {
            hit.reset_results();
            let Some(penetration) = self.query.penetration(&self.actor, position, &hit.collider)
            else {
                continue;
            };
            hit.has_penetration = true;
            hit.direction = penetration.direction;
            hit.distance = penetration.distance;
            hit.max_penetration = penetration.distance;
            hit.up_direction_dot = penetration.direction.y;
            hit.collision_type = CollisionType::Trigger;
        }
    }
}

/// Movement facts used by the slope guard.
#[derive(Clone, Copy, Debug)]
struct Motion {
    planar: Vec3,
    falling: bool,
}

/// Blend of all ground contacts, unless the steepest-up contact is the only one.
fn blend_ground_normal(max_ground_normal: Vec3, average_ground_normal: Vec3) -> Vec3 {
    if (average_ground_normal - max_ground_normal).norm_squared() <= NORMAL_EQ_EPS {
        return max_ground_normal;
    }
    utils::try_normalize(average_ground_normal).unwrap_or(max_ground_normal)
}
