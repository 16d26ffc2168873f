/*!
Kinematic character controller.

`Kcc` owns everything one actor needs to simulate: settings, the fixed and
render movement state, its correction accumulator, its overlap scratch and its
post-solve processors. Actors share nothing, so separate actors can be stepped
on separate threads against the same read-only physics world.

Step order
1. Update history flags and apply a pending teleport or jump.
2. Integrate gravity and compose the desired velocity.
3. Gather overlaps around the target and resolve it.
4. Run the enabled processors by descending priority.
5. Clamp velocities against ground and ceiling, derive ground tangent and real velocity.
*/

use crate::{
    collision::{ActorShape, ColliderId, PhysicsQuery, QueryTriggers, Vec3},
    config::{InterpolationMode, KccSettings, ShapeType},
    constants::RESOLVER_CAPACITY,
    error::{CodecError, ConfigError},
    network::codec::{self, InterpolationSource},
    utils,
};

use super::{
    classify::CollisionType,
    data::{Interaction, InteractionId, InteractionKind, KccData},
    ground,
    overlap::OverlapInfo,
    processor::{GroundSnapProcessor, Processor, ProcessorContext, sort_processors},
    resolver::KccResolver,
    solver::{ResolveParams, Solver},
};

pub struct Kcc {
    settings: KccSettings,
    fixed: KccData,
    render: KccData,
    resolver: KccResolver,
    overlap: OverlapInfo,
    processors: Vec<Box<dyn Processor>>,
    pending_teleport: Option<Vec3>,
    pending_jump: Option<Vec3>,
}

impl Kcc {
    /// Create a controller standing at `position`. Invalid settings are refused.
    pub fn new(settings: KccSettings, position: Vec3) -> Result<Self, ConfigError> {
        if let Err(e) = settings.validate() {
            log::warn!("rejecting controller settings: {e}");
            return Err(e);
        }

        let mut fixed = KccData::new(&settings);
        fixed.set_position(position);
        let render = fixed.clone();

        Ok(Self {
            resolver: KccResolver::new(RESOLVER_CAPACITY),
            overlap: OverlapInfo::with_capacity(RESOLVER_CAPACITY),
            processors: vec![Box::new(GroundSnapProcessor::default())],
            pending_teleport: None,
            pending_jump: None,
            settings,
            fixed,
            render,
        })
    }

    pub fn settings(&self) -> &KccSettings {
        &self.settings
    }

    /// Replace the settings. Angle limits are copied into the movement state and
    /// interactions are reset when the capacity changes.
    pub fn set_settings(&mut self, settings: KccSettings) -> Result<(), ConfigError> {
        if let Err(e) = settings.validate() {
            log::warn!("rejecting controller settings: {e}");
            return Err(e);
        }
        if settings.max_total_interactions != self.settings.max_total_interactions {
            let fresh = KccData::new(&settings).interactions;
            self.fixed.interactions = fresh.clone();
            self.render.interactions = fresh;
        }
        for data in [&mut self.fixed, &mut self.render] {
            data.max_ground_angle = settings.max_ground_angle;
            data.max_wall_angle = settings.max_wall_angle;
            data.max_hang_angle = settings.max_hang_angle;
        }
        self.settings = settings;
        Ok(())
    }

    /// Authoritative movement state.
    pub fn fixed_data(&self) -> &KccData {
        &self.fixed
    }

    pub fn fixed_data_mut(&mut self) -> &mut KccData {
        &mut self.fixed
    }

    /// Movement state for presentation.
    pub fn render_data(&self) -> &KccData {
        &self.render
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.fixed.target_position
    }

    pub fn actor_shape(&self) -> ActorShape {
        ActorShape {
            radius: self.settings.radius,
            height: self.settings.height,
            layer: self.settings.collider_layer,
            is_trigger: self.settings.is_trigger,
        }
    }

    /// Register a processor; processors stay sorted by descending priority.
    pub fn add_processor(&mut self, processor: Box<dyn Processor>) {
        self.processors.push(processor);
        sort_processors(&mut self.processors);
    }

    pub fn processors(&self) -> &[Box<dyn Processor>] {
        &self.processors
    }

    pub fn set_active(&mut self, active: bool) {
        self.fixed.is_active = active;
    }

    /// Velocity requested by gameplay, used until changed.
    pub fn set_kinematic_velocity(&mut self, velocity: Vec3) {
        if !utils::is_finite(&velocity) {
            log::warn!("ignoring non-finite kinematic velocity {velocity:?}");
            return;
        }
        self.fixed.kinematic_velocity = velocity;
    }

    /// Set look pitch and yaw in degrees. Pitch is clamped to `[-90, 90]`.
    pub fn set_look_rotation(&mut self, pitch: f32, yaw: f32) {
        if pitch.is_finite() {
            self.fixed.look_pitch = pitch.clamp(-90.0, 90.0);
        }
        if yaw.is_finite() {
            self.fixed.look_yaw = utils::wrap_angle(yaw);
        }
    }

    /// Planar forward used for the ground tangent before velocity and look direction.
    pub fn set_transform_direction(&mut self, direction: Vec3) {
        self.fixed.transform_direction = utils::only_xz(direction);
    }

    /// Add `impulse` to the dynamic velocity on the next step.
    pub fn jump(&mut self, impulse: Vec3) {
        if utils::is_finite(&impulse) {
            self.pending_jump = Some(impulse);
        }
    }

    /// Move to `position` on the next step without sweeping through the world.
    pub fn teleport(&mut self, position: Vec3) {
        if utils::is_finite(&position) {
            self.pending_teleport = Some(position);
        }
    }

    pub fn add_collision(&mut self, id: InteractionId, collider: Option<ColliderId>) -> bool {
        self.add_interaction(InteractionKind::Collision, id, collider)
    }

    pub fn add_modifier(&mut self, id: InteractionId) -> bool {
        self.add_interaction(InteractionKind::Modifier, id, None)
    }

    pub fn add_ignore(&mut self, id: InteractionId, collider: Option<ColliderId>) -> bool {
        self.add_interaction(InteractionKind::Ignore, id, collider)
    }

    fn add_interaction(
        &mut self,
        kind: InteractionKind,
        id: InteractionId,
        collider: Option<ColliderId>,
    ) -> bool {
        self.fixed
            .interactions
            .add(kind, Interaction { id, collider })
    }

    pub fn remove_interaction(&mut self, kind: InteractionKind, id: InteractionId) -> bool {
        self.fixed.interactions.remove(kind, id)
    }

    pub fn has_interaction(&self, kind: InteractionKind, id: InteractionId) -> bool {
        self.fixed.interactions.contains(kind, id)
    }

    pub fn clear_interactions(&mut self) {
        self.fixed.interactions.clear();
    }

    /// Colliders gathered during the last step.
    pub fn overlap(&self) -> &OverlapInfo {
        &self.overlap
    }

    /// Advance the fixed state by `dt` seconds.
    pub fn step(&mut self, query: &dyn PhysicsQuery, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        let actor = self.actor_shape();
        let settings = &self.settings;
        let data = &mut self.fixed;

        data.tick = data.tick.wrapping_add(1);
        data.delta_time = dt;
        data.was_grounded = data.is_grounded;
        data.was_stepping_up = data.is_stepping_up;
        data.was_snapping_to_ground = data.is_snapping_to_ground;
        data.is_stepping_up = false;
        data.is_snapping_to_ground = false;
        data.has_teleported = false;

        if let Some(position) = self.pending_teleport.take() {
            log::debug!("teleporting to {position:?}");
            data.set_position(position);
            data.dynamic_velocity = Vec3::zeros();
            data.clear_ground();
            data.was_grounded = false;
            data.has_teleported = true;
        }

        if !data.is_active {
            data.real_velocity = Vec3::zeros();
            data.real_speed = 0.0;
            self.pending_jump = None;
            self.render.clone_from(&self.fixed);
            return;
        }

        data.jump_frames = 0;
        data.jump_impulse = Vec3::zeros();
        if let Some(impulse) = self.pending_jump.take() {
            if impulse.y > 0.0 && data.dynamic_velocity.y < 0.0 {
                data.dynamic_velocity.y = 0.0;
            }
            data.dynamic_velocity += impulse;
            data.jump_impulse = impulse;
            data.jump_frames = 1;
        }

        data.dynamic_velocity.y += settings.gravity * dt;
        data.desired_velocity = data.dynamic_velocity + data.kinematic_velocity;

        let base = data.target_position;
        let target = base + data.desired_velocity * dt;
        data.base_position = base;
        data.desired_position = target;

        let position = if settings.shape == ShapeType::None {
            self.overlap.reset(target, actor.radius, actor.height);
            data.clear_ground();
            target
        } else {
            let extent = settings.extent;
            query.overlap(
                target - Vec3::new(0.0, extent, 0.0),
                actor.radius + extent,
                actor.height + 2.0 * extent,
                settings.collision_layer_mask,
                QueryTriggers::Include,
                &mut self.overlap,
            );
            let params = ResolveParams {
                probe_grounding: true,
                max_sub_steps: settings.max_sub_steps,
                resolver_iterations: settings.resolver_iterations,
                resolve_triggers: true,
            };
            Solver::new(query, actor, extent).resolve(
                &mut self.overlap,
                data,
                &mut self.resolver,
                base,
                target,
                params,
            )
        };
        data.target_position = position;

        for processor in self.processors.iter_mut() {
            if !processor.is_enabled(&self.settings) {
                continue;
            }
            let mut ctx = ProcessorContext {
                query,
                settings: &self.settings,
                actor,
                data: &mut self.fixed,
                overlap: &mut self.overlap,
                resolver: &mut self.resolver,
            };
            processor.after_resolve(&mut ctx);
        }

        let data = &mut self.fixed;
        if data.is_grounded && data.dynamic_velocity.y < 0.0 {
            data.dynamic_velocity.y = 0.0;
        }
        let hit_ceiling = self
            .overlap
            .collider_hits
            .iter()
            .any(|h| h.has_penetration && h.collision_type == CollisionType::Top);
        if hit_ceiling && data.dynamic_velocity.y > 0.0 {
            data.dynamic_velocity.y = 0.0;
        }

        data.restore_ground_history();
        ground::recalculate_ground_properties(data);

        data.real_velocity = (data.target_position - base) / dt;
        data.real_speed = data.real_velocity.norm();

        self.render.clone_from(&self.fixed);
    }

    /// Write the fixed state into a snapshot buffer.
    pub fn write_snapshot(&self, buffer: &mut [u32]) -> Result<usize, CodecError> {
        codec::write(&self.fixed, &self.settings, buffer)
    }

    /// Replace the fixed state with a received snapshot.
    ///
    /// A snapshot that cannot be applied, including one carrying invalid
    /// settings, is rejected whole and the controller is left as it was.
    pub fn read_snapshot(&mut self, buffer: &[u32]) -> Result<(), CodecError> {
        if let Err(e) = codec::read(buffer, &mut self.fixed, &mut self.settings) {
            log::warn!("discarding snapshot: {e}");
            return Err(e);
        }
        self.render.clone_from(&self.fixed);
        Ok(())
    }

    /// Derive the render state by interpolating two snapshots.
    ///
    /// With [`InterpolationMode::Full`] discrete fields are taken from the fixed
    /// state; with [`InterpolationMode::Transform`] only the transform changes.
    pub fn interpolate_render(
        &mut self,
        source: &InterpolationSource<'_>,
    ) -> Result<(), CodecError> {
        if self.settings.proxy_interpolation_mode == InterpolationMode::Full {
            self.render.clone_from(&self.fixed);
        }
        codec::interpolate(source, &self.settings, &mut self.render)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{Quat, StaticShape, StaticWorld, cuboid_from_pose, world};
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn settings() -> KccSettings {
        KccSettings {
            radius: 0.5,
            height: 2.0,
            max_sub_steps: 4,
            gravity: -20.0,
            ..Default::default()
        }
    }

    fn floor_world() -> StaticWorld {
        StaticWorld::build(vec![world::solid(
            1,
            StaticShape::Plane {
                normal: Vec3::y(),
                dist: 0.0,
            },
        )])
    }

    fn settle(kcc: &mut Kcc, world: &StaticWorld, steps: usize) {
        for _ in 0..steps {
            kcc.step(world, DT);
        }
    }

    #[test]
    fn falling_capsule_lands_on_the_floor() {
        let world = floor_world();
        let mut kcc = Kcc::new(settings(), Vec3::new(0.0, 5.0, 0.0)).unwrap();

        kcc.step(&world, DT);
        assert!(!kcc.fixed_data().is_grounded);
        assert!(kcc.position().y < 5.0);

        settle(&mut kcc, &world, 120);
        let data = kcc.fixed_data();
        assert!(data.is_grounded);
        assert_relative_eq!(data.ground_normal, Vec3::y(), epsilon = 1.0e-3);
        assert_relative_eq!(data.ground_distance, 0.0, epsilon = 1.0e-3);
        assert_relative_eq!(kcc.position().y, 0.0, epsilon = 1.0e-3);
        assert_relative_eq!(data.ground_angle, 0.0, epsilon = 0.1);
        assert_eq!(data.dynamic_velocity.y, 0.0);
    }

    #[test]
    fn walking_on_flat_ground_keeps_grounded_and_tangent() {
        let world = floor_world();
        let mut kcc = Kcc::new(settings(), Vec3::zeros()).unwrap();
        settle(&mut kcc, &world, 5);

        kcc.set_kinematic_velocity(Vec3::new(3.0, 0.0, 0.0));
        settle(&mut kcc, &world, 30);

        let data = kcc.fixed_data();
        assert!(data.is_grounded);
        assert_relative_eq!(kcc.position().x, 3.0 * 30.0 * DT, epsilon = 1.0e-2);
        assert_relative_eq!(kcc.position().y, 0.0, epsilon = 1.0e-3);
        assert_relative_eq!(data.ground_tangent, Vec3::x(), epsilon = 1.0e-3);
        assert_relative_eq!(data.real_speed, 3.0, epsilon = 0.05);
    }

    #[test]
    fn wall_blocks_horizontal_motion() {
        let wall = cuboid_from_pose(
            Vec3::new(0.5, 2.0, 4.0),
            Vec3::new(2.0, 2.0, 0.0),
            Quat::identity(),
        );
        let floor = world::solid(
            1,
            StaticShape::Plane {
                normal: Vec3::y(),
                dist: 0.0,
            },
        );
        let world = StaticWorld::build(vec![floor, world::solid(2, wall)]);
        let mut kcc = Kcc::new(settings(), Vec3::zeros()).unwrap();
        kcc.set_kinematic_velocity(Vec3::new(4.0, 0.0, 0.0));
        settle(&mut kcc, &world, 60);

        // Wall face at x = 1.5, capsule radius 0.5.
        assert!(kcc.position().x <= 1.0 + 1.0e-3);
        assert!(kcc.position().x > 0.9);
        assert!(kcc.fixed_data().is_grounded);
        assert!(
            kcc.overlap()
                .collider_hits
                .iter()
                .any(|h| h.collider.id == 2 && h.collision_type == CollisionType::Wall)
        );
    }

    #[test]
    fn jump_leaves_the_ground_and_lands_again() {
        let world = floor_world();
        let mut kcc = Kcc::new(settings(), Vec3::zeros()).unwrap();
        settle(&mut kcc, &world, 3);
        assert!(kcc.fixed_data().is_grounded);

        kcc.jump(Vec3::new(0.0, 6.0, 0.0));
        kcc.step(&world, DT);
        assert_eq!(kcc.fixed_data().jump_frames, 1);
        assert!(!kcc.fixed_data().is_snapping_to_ground);
        assert!(kcc.position().y > 0.05);

        kcc.step(&world, DT);
        assert_eq!(kcc.fixed_data().jump_frames, 0);
        assert!(!kcc.fixed_data().is_grounded);

        settle(&mut kcc, &world, 90);
        assert!(kcc.fixed_data().is_grounded);
        assert_relative_eq!(kcc.position().y, 0.0, epsilon = 1.0e-3);
    }

    #[test]
    fn teleport_moves_without_sweeping_and_is_replicated() {
        let world = floor_world();
        let mut kcc = Kcc::new(settings(), Vec3::zeros()).unwrap();
        settle(&mut kcc, &world, 3);

        kcc.teleport(Vec3::new(50.0, 3.0, 0.0));
        kcc.step(&world, DT);
        assert!(kcc.fixed_data().has_teleported);
        assert_relative_eq!(kcc.position().x, 50.0);
        assert!(kcc.position().y < 3.0 && kcc.position().y > 2.9);
        assert_eq!(
            kcc.fixed_data().real_speed,
            (kcc.position() - Vec3::new(50.0, 3.0, 0.0)).norm() / DT
        );

        let mut buf = vec![0; codec::word_count(kcc.settings())];
        kcc.write_snapshot(&mut buf).unwrap();
        let mut proxy = Kcc::new(settings(), Vec3::zeros()).unwrap();
        proxy.read_snapshot(&buf).unwrap();
        assert!(proxy.fixed_data().has_teleported);
        assert_eq!(proxy.position(), kcc.position());

        kcc.step(&world, DT);
        assert!(!kcc.fixed_data().has_teleported);
    }

    #[test]
    fn rejected_snapshot_leaves_the_proxy_unchanged() {
        let world = floor_world();
        let mut kcc = Kcc::new(settings(), Vec3::new(7.0, 1.0, 0.0)).unwrap();
        kcc.step(&world, DT);
        let mut buf = vec![0; codec::word_count(kcc.settings())];
        kcc.write_snapshot(&mut buf).unwrap();
        // Height below twice the radius.
        buf[11] = 0.3f32.to_bits();

        let mut proxy = Kcc::new(settings(), Vec3::zeros()).unwrap();
        proxy.add_modifier(99);
        assert!(matches!(
            proxy.read_snapshot(&buf),
            Err(CodecError::InvalidSettings(_))
        ));
        assert_eq!(proxy.position(), Vec3::zeros());
        assert_eq!(proxy.settings(), &settings());
        assert!(proxy.has_interaction(InteractionKind::Modifier, 99));
    }

    #[test]
    fn interpolate_render_blends_snapshots() {
        let world = floor_world();
        let mut kcc = Kcc::new(settings(), Vec3::zeros()).unwrap();
        kcc.set_kinematic_velocity(Vec3::new(0.0, 0.0, 6.0));
        settle(&mut kcc, &world, 2);

        let words = codec::word_count(kcc.settings());
        let mut from = vec![0; words];
        let mut to = vec![0; words];
        kcc.write_snapshot(&mut from).unwrap();
        let a = kcc.position();
        kcc.step(&world, DT);
        kcc.write_snapshot(&mut to).unwrap();
        let b = kcc.position();

        let source = InterpolationSource {
            from: &from,
            to: &to,
            from_tick: 2,
            to_tick: 3,
            alpha: 0.5,
            delta_time: DT,
        };
        kcc.interpolate_render(&source).unwrap();
        let render = kcc.render_data();
        assert_relative_eq!(render.target_position, (a + b) * 0.5, epsilon = 1.0e-4);
        assert_eq!(render.is_grounded, kcc.fixed_data().is_grounded);
        assert_relative_eq!(render.real_velocity.z, 6.0, epsilon = 0.05);
    }

    #[test]
    fn interactions_are_capped_by_settings() {
        let s = KccSettings {
            max_total_interactions: 2,
            ..settings()
        };
        let mut kcc = Kcc::new(s, Vec3::zeros()).unwrap();
        assert!(kcc.add_collision(4, Some(1)));
        assert!(kcc.add_modifier(9));
        assert!(!kcc.add_ignore(5, None));
        assert!(kcc.has_interaction(InteractionKind::Modifier, 9));
        assert!(kcc.remove_interaction(InteractionKind::Collision, 4));
        assert!(kcc.add_ignore(5, None));
        kcc.clear_interactions();
        assert_eq!(kcc.fixed_data().interactions.total(), 0);
    }

    #[test]
    fn invalid_settings_are_refused() {
        let bad = KccSettings {
            radius: 1.0,
            height: 1.0,
            ..Default::default()
        };
        assert!(Kcc::new(bad.clone(), Vec3::zeros()).is_err());

        let mut kcc = Kcc::new(settings(), Vec3::zeros()).unwrap();
        assert!(kcc.set_settings(bad).is_err());
        assert_eq!(kcc.settings().radius, 0.5);
    }

    #[test]
    fn look_rotation_is_clamped_and_wrapped() {
        let mut kcc = Kcc::new(settings(), Vec3::zeros()).unwrap();
        kcc.set_look_rotation(-120.0, 270.0);
        assert_eq!(kcc.fixed_data().look_pitch, -90.0);
        assert_relative_eq!(kcc.fixed_data().look_yaw, -90.0);

        kcc.set_look_rotation(0.0, f32::NAN);
        assert_relative_eq!(kcc.fixed_data().look_yaw, -90.0);
        let forward = kcc.fixed_data().look_rotation() * Vec3::z();
        assert_relative_eq!(forward, -Vec3::x(), epsilon = 1.0e-5);
    }

    #[test]
    fn inactive_actor_does_not_move() {
        let world = floor_world();
        let mut kcc = Kcc::new(settings(), Vec3::new(0.0, 2.0, 0.0)).unwrap();
        kcc.set_active(false);
        settle(&mut kcc, &world, 10);
        assert_eq!(kcc.position(), Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(kcc.fixed_data().real_speed, 0.0);
    }
}
