/*!
Per-actor movement state.

`KccData` is the record the solver, the processors and the network codec all
operate on. An actor keeps two of them:
- the fixed instance, simulated every fixed tick and replicated
- the render instance, derived by interpolating two snapshots and never replicated

Notes
- `target_position` is the actor's position once a step completes; `base_position`
  is where the step started.
- Angles are in degrees.
*/

use crate::{
    collision::{ColliderId, Quat, Vec3},
    config::KccSettings,
    constants::MAX_INTERACTIONS_PER_CATEGORY,
    utils,
};

/// Replication id of an interaction. `0` is never a valid id.
pub type InteractionId = u32;

pub const INVALID_INTERACTION_ID: InteractionId = 0;

/// Category of an interaction, in wire order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionKind {
    Collision,
    Modifier,
    Ignore,
}

/// One active interaction: its replication id plus an optional local collider.
///
/// Interactions rebuilt from a snapshot only know their id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Interaction {
    pub id: InteractionId,
    pub collider: Option<ColliderId>,
}

impl Interaction {
    pub fn new(id: InteractionId) -> Self {
        Self { id, collider: None }
    }

    pub fn with_collider(id: InteractionId, collider: ColliderId) -> Self {
        Self {
            id,
            collider: Some(collider),
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.id != INVALID_INTERACTION_ID
    }
}

/// Fixed-capacity interaction list with an explicit count.
///
/// Storage is allocated once; adding and removing never reallocates. Entries keep
/// their insertion order, which is also the order they are replicated in.
#[derive(Clone, Debug, PartialEq)]
pub struct InteractionList {
    entries: Box<[Interaction]>,
    count: usize,
}

impl InteractionList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: vec![Interaction::default(); capacity].into_boxed_slice(),
            count: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn as_slice(&self) -> &[Interaction] {
        &self.entries[..self.count]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interaction> {
        self.as_slice().iter()
    }

    /// Append `interaction`. Returns `false` when the list is full.
    pub fn push(&mut self, interaction: Interaction) -> bool {
        if self.count >= self.entries.len() {
            return false;
        }
        self.entries[self.count] = interaction;
        self.count += 1;
        true
    }

    pub fn contains(&self, id: InteractionId) -> bool {
        self.iter().any(|i| i.id == id)
    }

    /// Remove the entry with `id`, keeping the order of the rest.
    pub fn remove(&mut self, id: InteractionId) -> bool {
        let Some(index) = self.iter().position(|i| i.id == id) else {
            return false;
        };
        self.entries.copy_within(index + 1..self.count, index);
        self.count -= 1;
        self.entries[self.count] = Interaction::default();
        true
    }

    pub fn clear(&mut self) {
        self.entries[..self.count].fill(Interaction::default());
        self.count = 0;
    }
}

/// Collisions, modifiers and ignores sharing one total capacity.
#[derive(Clone, Debug, PartialEq)]
pub struct Interactions {
    pub collisions: InteractionList,
    pub modifiers: InteractionList,
    pub ignores: InteractionList,
    max_total: usize,
}

impl Interactions {
    pub fn new(max_total: usize) -> Self {
        let per_category = max_total.min(MAX_INTERACTIONS_PER_CATEGORY);
        Self {
            collisions: InteractionList::with_capacity(per_category),
            modifiers: InteractionList::with_capacity(per_category),
            ignores: InteractionList::with_capacity(per_category),
            max_total,
        }
    }

    #[inline]
    pub fn max_total(&self) -> usize {
        self.max_total
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.collisions.len() + self.modifiers.len() + self.ignores.len()
    }

    pub fn list(&self, kind: InteractionKind) -> &InteractionList {
        match kind {
            InteractionKind::Collision => &self.collisions,
            InteractionKind::Modifier => &self.modifiers,
            InteractionKind::Ignore => &self.ignores,
        }
    }

    pub fn list_mut(&mut self, kind: InteractionKind) -> &mut InteractionList {
        match kind {
            InteractionKind::Collision => &mut self.collisions,
            InteractionKind::Modifier => &mut self.modifiers,
            InteractionKind::Ignore => &mut self.ignores,
        }
    }

    /// Add an interaction. Invalid ids, duplicates and anything past the shared
    /// capacity are rejected.
    pub fn add(&mut self, kind: InteractionKind, interaction: Interaction) -> bool {
        if !interaction.is_valid() || self.list(kind).contains(interaction.id) {
            return false;
        }
        if self.total() >= self.max_total {
            log::warn!(
                "interaction capacity {} reached, dropping {:?} {}",
                self.max_total,
                kind,
                interaction.id
            );
            return false;
        }
        self.list_mut(kind).push(interaction)
    }

    pub fn remove(&mut self, kind: InteractionKind, id: InteractionId) -> bool {
        self.list_mut(kind).remove(id)
    }

    pub fn contains(&self, kind: InteractionKind, id: InteractionId) -> bool {
        self.list(kind).contains(id)
    }

    pub fn clear(&mut self) {
        self.collisions.clear();
        self.modifiers.clear();
        self.ignores.clear();
    }

    /// All entries in wire order: collisions, then modifiers, then ignores.
    pub fn iter_all(&self) -> impl Iterator<Item = (InteractionKind, &Interaction)> {
        self.collisions
            .iter()
            .map(|i| (InteractionKind::Collision, i))
            .chain(self.modifiers.iter().map(|i| (InteractionKind::Modifier, i)))
            .chain(self.ignores.iter().map(|i| (InteractionKind::Ignore, i)))
    }
}

/// Ground fields, saved and restored as a unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundInfo {
    pub is_grounded: bool,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub position: Vec3,
    pub distance: f32,
    pub angle: f32,
}

/// Movement state of one actor.
#[derive(Clone, Debug, PartialEq)]
pub struct KccData {
    pub tick: u32,
    pub delta_time: f32,

    pub base_position: Vec3,
    pub desired_position: Vec3,
    pub target_position: Vec3,

    pub look_pitch: f32,
    pub look_yaw: f32,
    /// Planar forward of the actor's transform, if gameplay drives one.
    pub transform_direction: Vec3,

    /// Velocity owned by the controller (gravity, jumps).
    pub dynamic_velocity: Vec3,
    /// Velocity requested by gameplay each step.
    pub kinematic_velocity: Vec3,
    /// `dynamic_velocity + kinematic_velocity` used for the last step.
    pub desired_velocity: Vec3,
    /// Velocity actually achieved, after collisions.
    pub real_velocity: Vec3,
    pub real_speed: f32,

    pub jump_impulse: Vec3,
    pub jump_frames: u32,

    pub is_active: bool,
    pub is_grounded: bool,
    pub was_grounded: bool,
    pub is_stepping_up: bool,
    pub was_stepping_up: bool,
    pub is_snapping_to_ground: bool,
    pub was_snapping_to_ground: bool,
    pub has_teleported: bool,

    pub ground_normal: Vec3,
    pub ground_tangent: Vec3,
    pub ground_position: Vec3,
    pub ground_distance: f32,
    pub ground_angle: f32,

    pub max_ground_angle: f32,
    pub max_wall_angle: f32,
    pub max_hang_angle: f32,

    pub interactions: Interactions,
}

impl KccData {
    pub fn new(settings: &KccSettings) -> Self {
        Self {
            tick: 0,
            delta_time: 0.0,
            base_position: Vec3::zeros(),
            desired_position: Vec3::zeros(),
            target_position: Vec3::zeros(),
            look_pitch: 0.0,
            look_yaw: 0.0,
            transform_direction: Vec3::zeros(),
            dynamic_velocity: Vec3::zeros(),
            kinematic_velocity: Vec3::zeros(),
            desired_velocity: Vec3::zeros(),
            real_velocity: Vec3::zeros(),
            real_speed: 0.0,
            jump_impulse: Vec3::zeros(),
            jump_frames: 0,
            is_active: true,
            is_grounded: false,
            was_grounded: false,
            is_stepping_up: false,
            was_stepping_up: false,
            is_snapping_to_ground: false,
            was_snapping_to_ground: false,
            has_teleported: false,
            ground_normal: Vec3::zeros(),
            ground_tangent: Vec3::zeros(),
            ground_position: Vec3::zeros(),
            ground_distance: 0.0,
            ground_angle: 0.0,
            max_ground_angle: settings.max_ground_angle,
            max_wall_angle: settings.max_wall_angle,
            max_hang_angle: settings.max_hang_angle,
            interactions: Interactions::new(settings.max_total_interactions),
        }
    }

    /// Current position of the actor.
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.target_position
    }

    /// Rotation built from look pitch and yaw.
    pub fn look_rotation(&self) -> Quat {
        utils::look_rotation(self.look_pitch, self.look_yaw)
    }

    /// Place the actor at `position` without simulating the move.
    pub fn set_position(&mut self, position: Vec3) {
        self.base_position = position;
        self.desired_position = position;
        self.target_position = position;
    }

    pub fn ground_info(&self) -> GroundInfo {
        GroundInfo {
            is_grounded: self.is_grounded,
            normal: self.ground_normal,
            tangent: self.ground_tangent,
            position: self.ground_position,
            distance: self.ground_distance,
            angle: self.ground_angle,
        }
    }

    pub fn restore_ground_info(&mut self, info: &GroundInfo) {
        self.is_grounded = info.is_grounded;
        self.ground_normal = info.normal;
        self.ground_tangent = info.tangent;
        self.ground_position = info.position;
        self.ground_distance = info.distance;
        self.ground_angle = info.angle;
    }

    pub fn clear_ground(&mut self) {
        self.is_grounded = false;
        self.ground_normal = Vec3::zeros();
        self.ground_tangent = Vec3::zeros();
        self.ground_position = Vec3::zeros();
        self.ground_distance = 0.0;
        self.ground_angle = 0.0;
    }

    /// Ground point below a capsule of `radius` standing at `target_position`.
    pub fn update_ground_position(&mut self, radius: f32) {
        self.ground_position = self.target_position + Vec3::new(0.0, radius, 0.0)
            - self.ground_normal * (radius + self.ground_distance);
        self.ground_angle = utils::angle_deg(self.ground_normal, utils::up());
    }

    /// Rebuild ground fields after a replicated read, which only carries the flag.
    ///
    /// A usable local normal is kept; otherwise the actor stands on flat
    /// ground directly below it.
    pub fn restore_replicated_ground(&mut self, radius: f32) {
        if !self.is_grounded {
            self.clear_ground();
            return;
        }
        match utils::try_normalize(self.ground_normal) {
            Some(normal) => self.ground_normal = normal,
            None => {
                self.ground_normal = utils::up();
                self.ground_distance = 0.0;
            }
        }
        if !self.ground_distance.is_finite() || self.ground_distance < 0.0 {
            self.ground_distance = 0.0;
        }
        self.update_ground_position(radius);
    }

    /// Make sure ground fields carried into the next tick are consistent.
    ///
    /// A non-grounded state keeps no ground data, and a grounded state with a
    /// broken normal is demoted to non-grounded.
    pub fn restore_ground_history(&mut self) {
        if self.is_grounded {
            let valid = utils::is_finite(&self.ground_normal)
                && self.ground_distance.is_finite()
                && self.ground_distance >= 0.0
                && utils::try_normalize(self.ground_normal).is_some();
            if valid {
                return;
            }
            log::warn!(
                "discarding invalid ground state: normal {:?}, distance {}",
                self.ground_normal,
                self.ground_distance
            );
        }
        self.clear_ground();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interactions(max: usize) -> Interactions {
        Interactions::new(max)
    }

    #[test]
    fn interaction_list_keeps_order_on_remove() {
        let mut list = InteractionList::with_capacity(4);
        for id in [3, 5, 7] {
            assert!(list.push(Interaction::new(id)));
        }
        assert!(list.remove(5));
        assert!(!list.remove(5));
        let ids: Vec<_> = list.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 7]);
        assert_eq!(list.capacity(), 4);
    }

    #[test]
    fn total_capacity_is_shared_between_categories() {
        let mut i = interactions(3);
        assert!(i.add(InteractionKind::Collision, Interaction::with_collider(1, 10)));
        assert!(i.add(InteractionKind::Modifier, Interaction::new(2)));
        assert!(i.add(InteractionKind::Ignore, Interaction::new(3)));
        assert!(!i.add(InteractionKind::Collision, Interaction::new(4)));
        assert_eq!(i.total(), 3);

        assert!(i.remove(InteractionKind::Modifier, 2));
        assert!(i.add(InteractionKind::Collision, Interaction::new(4)));
        assert!(i.contains(InteractionKind::Collision, 4));
        assert!(!i.contains(InteractionKind::Modifier, 2));

        let order: Vec<_> = i.iter_all().map(|(_, e)| e.id).collect();
        assert_eq!(order, vec![1, 4, 3]);
    }

    #[test]
    fn invalid_and_duplicate_ids_are_rejected() {
        let mut i = interactions(4);
        assert!(!i.add(InteractionKind::Collision, Interaction::new(INVALID_INTERACTION_ID)));
        assert!(i.add(InteractionKind::Collision, Interaction::new(9)));
        assert!(!i.add(InteractionKind::Collision, Interaction::new(9)));
        // Same id in another category is a different interaction.
        assert!(i.add(InteractionKind::Ignore, Interaction::new(9)));
        i.clear();
        assert_eq!(i.total(), 0);
    }

    #[test]
    fn ground_history_drops_stale_and_broken_normals() {
        let mut data = KccData::new(&KccSettings::default());
        data.ground_normal = Vec3::y();
        data.ground_distance = 0.2;
        data.restore_ground_history();
        assert_eq!(data.ground_normal, Vec3::zeros());
        assert_eq!(data.ground_distance, 0.0);

        data.is_grounded = true;
        data.ground_normal = Vec3::new(f32::NAN, 1.0, 0.0);
        data.restore_ground_history();
        assert!(!data.is_grounded);
        assert_eq!(data.ground_normal, Vec3::zeros());

        data.is_grounded = true;
        data.ground_normal = Vec3::y();
        data.restore_ground_history();
        assert!(data.is_grounded);
        assert_eq!(data.ground_normal, Vec3::y());
    }

    #[test]
    fn ground_position_sits_under_the_capsule() {
        let mut data = KccData::new(&KccSettings::default());
        data.target_position = Vec3::new(1.0, 0.1, 2.0);
        data.ground_normal = Vec3::y();
        data.ground_distance = 0.1;
        data.update_ground_position(0.5);
        approx::assert_relative_eq!(
            data.ground_position,
            Vec3::new(1.0, 0.0, 2.0),
            epsilon = 1.0e-6
        );
        approx::assert_relative_eq!(data.ground_angle, 0.0);
    }
}
