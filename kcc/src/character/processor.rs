/*!
Post-solve processors.

A processor runs after the depenetration solver of every step and may adjust
the resolved position and state. The controller keeps its processors sorted by
descending [`Processor::priority`]; processors with equal priority run in the
order they were added.
*/

use crate::{
    collision::{ActorShape, PhysicsQuery, QueryTriggers, Vec3, settings},
    config::{Feature, KccSettings},
    utils,
};

use super::{
    data::KccData,
    overlap::OverlapInfo,
    resolver::KccResolver,
    solver::{ResolveParams, Solver},
};

/// Everything a processor may read or change after the solve.
pub struct ProcessorContext<'a> {
    pub query: &'a dyn PhysicsQuery,
    pub settings: &'a KccSettings,
    pub actor: ActorShape,
    pub data: &'a mut KccData,
    /// Overlaps gathered for the step that was just solved.
    pub overlap: &'a mut OverlapInfo,
    pub resolver: &'a mut KccResolver,
}

pub trait Processor: Send {
    /// Higher runs first.
    fn priority(&self) -> i32;

    /// Whether the processor runs for an actor with `settings`.
    fn is_enabled(&self, _settings: &KccSettings) -> bool {
        true
    }

    fn after_resolve(&mut self, ctx: &mut ProcessorContext<'_>);
}

/// Sort processors by descending priority, keeping insertion order for ties.
pub fn sort_processors(processors: &mut [Box<dyn Processor>]) {
    processors.sort_by_key(|p| std::cmp::Reverse(p.priority()));
}

pub const GROUND_SNAP_PRIORITY: i32 = 1000;

/// Keeps an actor that just left the ground glued to descending terrain.
///
/// Only acts on the first airborne steps after being grounded, and never while
/// jumping, stepping up or moving upward.
pub struct GroundSnapProcessor {
    priority: i32,
    /// Widened overlap gathered below the actor.
    overlap: OverlapInfo,
}

impl Default for GroundSnapProcessor {
    fn default() -> Self {
        Self {
            priority: GROUND_SNAP_PRIORITY,
            overlap: OverlapInfo::default(),
        }
    }
}

impl GroundSnapProcessor {
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            ..Default::default()
        }
    }

    fn should_snap(data: &KccData) -> bool {
        !data.is_grounded
            && data.was_grounded
            && data.jump_frames == 0
            && !data.is_stepping_up
            && !data.was_stepping_up
            && data.dynamic_velocity.y <= 0.0
    }
}

impl Processor for GroundSnapProcessor {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_enabled(&self, settings: &KccSettings) -> bool {
        settings.has_feature(Feature::GroundSnap)
    }

    fn after_resolve(&mut self, ctx: &mut ProcessorContext<'_>) {
        let snap_distance = ctx.settings.snap_distance;
        if snap_distance <= 0.0 || !Self::should_snap(ctx.data) {
            return;
        }

        let radius = ctx.actor.radius;
        let target = ctx.data.target_position;
        let saved = ctx.data.ground_info();

        ctx.query.overlap(
            target - Vec3::new(0.0, snap_distance, 0.0),
            radius * settings::SNAP_OVERLAP_RADIUS_SCALE,
            ctx.actor.height + snap_distance,
            ctx.settings.collision_layer_mask,
            QueryTriggers::Ignore,
            &mut self.overlap,
        );
        if self.overlap.collider_hits.is_empty() {
            return;
        }

        let step_length = radius * settings::SNAP_STEP_RADIUS_SCALE;
        let steps = (snap_distance / step_length).ceil().max(1.0) as u32;
        let step = Vec3::new(0.0, -snap_distance / steps as f32, 0.0);

        let solver = Solver::new(ctx.query, ctx.actor, ctx.settings.extent);
        let params = ResolveParams {
            probe_grounding: true,
            max_sub_steps: 1,
            resolver_iterations: ctx.settings.resolver_iterations,
            resolve_triggers: false,
        };

        let mut probe = target;
        let mut ground = None;
        for _ in 0..steps {
            let next = probe + step;
            let corrected =
                solver.resolve(&mut self.overlap, ctx.data, ctx.resolver, probe, next, params);
            if ctx.data.is_grounded {
                ground = Some(corrected);
                break;
            }
            probe = corrected;
        }

        let data = &mut *ctx.data;
        data.target_position = target;

        let Some(ground) = ground else {
            log::trace!("no ground within {snap_distance} m to snap to");
            data.restore_ground_info(&saved);
            return;
        };

        let mut max_delta = ctx.settings.snap_speed * data.delta_time;
        if !data.was_snapping_to_ground {
            max_delta *= 0.5;
        }
        let drop = (target.y - ground.y).max(0.0);
        let goal = Vec3::new(target.x, target.y - drop, target.z);
        data.target_position = utils::move_towards(target, goal, max_delta);
        let moved = target.y - data.target_position.y;

        data.ground_distance += drop - moved;
        data.update_ground_position(radius);
        data.is_snapping_to_ground = true;

        log::debug!(
            "snapping to ground: drop {drop:.4}, moved {moved:.4}, remaining {:.4}",
            drop - moved
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{StaticShape, StaticWorld, world};
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    struct Fixture {
        world: StaticWorld,
        settings: KccSettings,
        data: KccData,
        overlap: OverlapInfo,
        resolver: KccResolver,
    }

    impl Fixture {
        fn new(start_y: f32) -> Self {
            let floor = world::solid(
                1,
                StaticShape::Plane {
                    normal: Vec3::y(),
                    dist: 0.0,
                },
            );
            let settings = KccSettings {
                radius: 0.5,
                height: 2.0,
                ..Default::default()
            };
            let mut data = KccData::new(&settings);
            data.set_position(Vec3::new(0.0, start_y, 0.0));
            data.was_grounded = true;
            data.delta_time = DT;
            Self {
                world: StaticWorld::build(vec![floor]),
                settings,
                data,
                overlap: OverlapInfo::default(),
                resolver: KccResolver::new(16),
            }
        }

        fn run(&mut self, processor: &mut GroundSnapProcessor) {
            let mut ctx = ProcessorContext {
                query: &self.world,
                settings: &self.settings,
                actor: ActorShape::new(self.settings.radius, self.settings.height),
                data: &mut self.data,
                overlap: &mut self.overlap,
                resolver: &mut self.resolver,
            };
            processor.after_resolve(&mut ctx);
        }
    }

    #[test]
    fn snaps_down_at_half_speed_on_the_first_frame() {
        let mut f = Fixture::new(0.1);
        let mut p = GroundSnapProcessor::default();
        f.run(&mut p);

        let first = f.settings.snap_speed * DT * 0.5;
        assert!(f.data.is_snapping_to_ground);
        assert!(f.data.is_grounded);
        assert_relative_eq!(f.data.target_position.y, 0.1 - first, epsilon = 1.0e-5);
        assert_relative_eq!(f.data.ground_distance, 0.1 - first, epsilon = 1.0e-3);
        assert_relative_eq!(f.data.ground_normal, Vec3::y(), epsilon = 1.0e-4);

        // Second frame runs at full speed.
        f.data.is_grounded = false;
        f.data.was_snapping_to_ground = true;
        f.data.is_snapping_to_ground = false;
        let before = f.data.target_position.y;
        f.run(&mut p);
        assert_relative_eq!(
            f.data.target_position.y,
            before - f.settings.snap_speed * DT,
            epsilon = 1.0e-5
        );
    }

    #[test]
    fn ground_out_of_reach_restores_state() {
        let mut f = Fixture::new(1.0);
        let mut p = GroundSnapProcessor::default();
        f.run(&mut p);

        assert!(!f.data.is_snapping_to_ground);
        assert!(!f.data.is_grounded);
        assert_eq!(f.data.target_position, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(f.data.ground_normal, Vec3::zeros());
    }

    #[test]
    fn skipped_while_jumping_or_rising() {
        let mut f = Fixture::new(0.1);
        f.data.jump_frames = 1;
        let mut p = GroundSnapProcessor::default();
        f.run(&mut p);
        assert!(!f.data.is_snapping_to_ground);

        let mut f = Fixture::new(0.1);
        f.data.dynamic_velocity.y = 2.0;
        f.run(&mut p);
        assert!(!f.data.is_snapping_to_ground);
        assert_eq!(f.data.target_position.y, 0.1);
    }

    #[test]
    fn gated_by_feature_flag_and_sorted_by_priority() {
        let mut s = KccSettings::default();
        let p = GroundSnapProcessor::default();
        assert!(p.is_enabled(&s));
        s.set_feature(Feature::GroundSnap, false);
        assert!(!p.is_enabled(&s));

        let mut list: Vec<Box<dyn Processor>> = vec![
            Box::new(GroundSnapProcessor::with_priority(1)),
            Box::new(GroundSnapProcessor::with_priority(10)),
            Box::new(GroundSnapProcessor::with_priority(5)),
        ];
        sort_processors(&mut list);
        let order: Vec<_> = list.iter().map(|p| p.priority()).collect();
        assert_eq!(order, vec![10, 5, 1]);
    }
}
