/*!
Snapshot codec for the replicated controller state.

Word layout (`u32` each, in order):

| words | content                                                            |
|-------|--------------------------------------------------------------------|
| 0..3  | compressed position, `round(p * 1024)` as `i32`                    |
| 3..6  | position extension (f32 bits), the sub-grid remainder              |
| 6     | look pitch (f32 bits)                                              |
| 7     | look yaw (f32 bits)                                                |
| 8     | flags word, see below                                              |
| 9     | collision layer mask                                               |
| 10    | radius (f32 bits)                                                  |
| 11    | height (f32 bits)                                                  |
| 12    | extent (f32 bits)                                                  |
| 13    | interaction header: collisions / modifiers / ignores counts (8 bits each, shifts 0/8/16) |
| 14..  | `max_total_interactions` interaction ids, unused words zero        |

Flags word: bits 0-11 are [`StateFlag`]s, then shape (12-13), input authority
behavior (14-15), state authority behavior (16-17), proxy interpolation mode
(18-19), collider layer (20-24) and features (25-29).
*/

use crate::{
    bitmask_flags::BitmaskFlags,
    character::data::{Interaction, InteractionKind, Interactions, KccData},
    collision::Vec3,
    config::{AuthorityBehavior, FEATURE_BITS, InterpolationMode, KccSettings, ShapeType},
    constants::INTERACTION_WORD_COUNT,
    define_bitmask_flags,
    error::CodecError,
    quantize, utils,
};

use super::words::{WordReader, WordWriter};

define_bitmask_flags!(StateFlag, u32, {
    IsActive,
    IsGrounded,
    WasGrounded,
    IsSteppingUp,
    WasSteppingUp,
    IsSnappingToGround,
    WasSnappingToGround,
    HasTeleported,
    HasJumpFrames,
    IsTrigger,
    ForcePredictedLookRotation,
    AllowClientTeleports,
});

const SHAPE_SHIFT: u32 = 12;
const INPUT_AUTHORITY_SHIFT: u32 = 14;
const STATE_AUTHORITY_SHIFT: u32 = 16;
const INTERPOLATION_MODE_SHIFT: u32 = 18;
const COLLIDER_LAYER_SHIFT: u32 = 20;
const FEATURES_SHIFT: u32 = 25;

const TWO_BITS: u32 = 0b11;
const COLLIDER_LAYER_MASK: u32 = 0b1_1111;
const FEATURES_MASK: u32 = (1 << FEATURE_BITS) - 1;

const HEADER_SHIFTS: [u32; 3] = [0, 8, 16];
const HEADER_COUNT_MASK: u32 = 0xFF;

const CATEGORIES: [InteractionKind; 3] = [
    InteractionKind::Collision,
    InteractionKind::Modifier,
    InteractionKind::Ignore,
];

/// Words before the interaction block.
pub const STATE_WORD_COUNT: usize = 13;

/// Words of the interaction count header.
pub const INTERACTION_HEADER_WORD_COUNT: usize = 1;

/// Snapshot size for actors configured with `settings`.
pub fn word_count(settings: &KccSettings) -> usize {
    STATE_WORD_COUNT
        + INTERACTION_HEADER_WORD_COUNT
        + settings.max_total_interactions * INTERACTION_WORD_COUNT
}

fn ensure_len(available: usize, needed: usize) -> Result<(), CodecError> {
    if available < needed {
        return Err(CodecError::BufferTooSmall { needed, available });
    }
    Ok(())
}

/// Write the replicated state of `data` into `buffer`. Returns the number of words written.
pub fn write(
    data: &KccData,
    settings: &KccSettings,
    buffer: &mut [u32],
) -> Result<usize, CodecError> {
    ensure_len(buffer.len(), word_count(settings))?;
    let mut w = WordWriter::new(buffer);

    let position = data.target_position;
    let code = quantize::compress_position(position);
    let extension = quantize::position_extension(position);
    for c in code {
        w.write_i32(c)?;
    }
    for e in extension.iter() {
        w.write_f32(*e)?;
    }

    w.write_f32(data.look_pitch)?;
    w.write_f32(data.look_yaw)?;
    w.write_u32(pack_flags(data, settings))?;
    w.write_u32(settings.collision_layer_mask)?;
    w.write_f32(settings.radius)?;
    w.write_f32(settings.height)?;
    w.write_f32(settings.extent)?;

    write_interactions(&mut w, &data.interactions, settings.max_total_interactions)?;
    Ok(w.position())
}

/// Read a snapshot into `data` and the replicated part of `settings`.
///
/// Everything is decoded and the replicated settings validated before either
/// output is touched, so an error leaves both unchanged. Grounded states get
/// their ground fields rebuilt since the wire only carries the flag.
pub fn read(
    buffer: &[u32],
    data: &mut KccData,
    settings: &mut KccSettings,
) -> Result<(), CodecError> {
    ensure_len(buffer.len(), word_count(settings))?;
    let mut r = WordReader::new(buffer);

    let position = read_position(&mut r)?;
    let look_pitch = r.read_f32()?;
    let look_yaw = r.read_f32()?;
    let flags = r.read_u32()?;

    let mut staged = settings.clone();
    unpack_settings(flags, &mut staged);
    staged.collision_layer_mask = r.read_u32()?;
    staged.radius = r.read_f32()?;
    staged.height = r.read_f32()?;
    staged.extent = r.read_f32()?;
    staged.validate()?;

    let block = InteractionBlock::read_header(&mut r, staged.max_total_interactions)?;

    data.set_position(position);
    data.look_pitch = look_pitch;
    data.look_yaw = look_yaw;
    unpack_state(flags, data);
    block.read_into(&mut r, &mut data.interactions)?;
    data.restore_replicated_ground(staged.radius);
    *settings = staged;
    Ok(())
}

/// Two buffered snapshots and where to sample between them.
#[derive(Clone, Copy, Debug)]
pub struct InterpolationSource<'a> {
    pub from: &'a [u32],
    pub to: &'a [u32],
    pub from_tick: u32,
    pub to_tick: u32,
    /// `0` samples `from`, `1` samples `to`.
    pub alpha: f32,
    /// Fixed tick duration (seconds).
    pub delta_time: f32,
}

impl InterpolationSource<'_> {
    #[inline]
    pub fn tick_delta(&self) -> i64 {
        self.to_tick as i64 - self.from_tick as i64
    }
}

/// Sample position, look rotation and real velocity between two snapshots.
///
/// Discrete fields are left untouched. A move longer than `teleport_threshold`
/// per tick, or a `to` snapshot flagged as teleported, snaps position and look
/// rotation to `to` with zero velocity instead of sweeping through the gap.
pub fn interpolate(
    source: &InterpolationSource<'_>,
    settings: &KccSettings,
    out: &mut KccData,
) -> Result<(), CodecError> {
    let needed = word_count(settings);
    ensure_len(source.from.len(), needed)?;
    ensure_len(source.to.len(), needed)?;

    let mut from = WordReader::new(source.from);
    let mut to = WordReader::new(source.to);

    let from_position = read_position(&mut from)?;
    let to_position = read_position(&mut to)?;
    let from_pitch = from.read_f32()?;
    let to_pitch = to.read_f32()?;
    let from_yaw = from.read_f32()?;
    let to_yaw = to.read_f32()?;

    let to_flags = BitmaskFlags::new(to.read_u32()?);
    from.skip(1)?;
    // Discrete fields are not interpolated, only skipped.
    from.skip(needed - from.position())?;
    to.skip(needed - to.position())?;

    let alpha = source.alpha;
    let tick_delta = source.tick_delta();
    let delta = to_position - from_position;

    let threshold = settings.teleport_threshold * tick_delta as f32;
    let teleported = to_flags.has(StateFlag::HasTeleported)
        || (tick_delta > 0 && delta.norm_squared() > threshold * threshold);

    if teleported {
        log::debug!(
            "teleport between ticks {} and {}: {:?} -> {:?}",
            source.from_tick,
            source.to_tick,
            from_position,
            to_position
        );
        out.set_position(to_position);
        out.real_velocity = Vec3::zeros();
        out.look_pitch = to_pitch;
        out.look_yaw = to_yaw;
    } else {
        out.set_position(from_position + delta * alpha);
        out.look_pitch = utils::lerp(from_pitch, to_pitch, alpha);
        out.look_yaw = utils::lerp_angle(from_yaw, to_yaw, alpha);
        out.real_velocity = if tick_delta > 0 && source.delta_time > 0.0 {
            delta / (source.delta_time * tick_delta as f32)
        } else {
            Vec3::zeros()
        };
    }
    out.real_speed = out.real_velocity.norm();
    out.has_teleported = teleported;
    Ok(())
}

fn read_position(r: &mut WordReader<'_>) -> Result<Vec3, CodecError> {
    let code = [r.read_i32()?, r.read_i32()?, r.read_i32()?];
    let extension = Vec3::new(r.read_f32()?, r.read_f32()?, r.read_f32()?);
    let position = quantize::decompress_position(code) + extension;
    if utils::is_finite(&position) {
        Ok(position)
    } else {
        // Extension words are not trusted beyond the grid value.
        Ok(quantize::decompress_position(code))
    }
}

fn pack_flags(data: &KccData, settings: &KccSettings) -> u32 {
    let mut flags = BitmaskFlags::<u32>::default();
    flags.set(StateFlag::IsActive, data.is_active);
    flags.set(StateFlag::IsGrounded, data.is_grounded);
    flags.set(StateFlag::WasGrounded, data.was_grounded);
    flags.set(StateFlag::IsSteppingUp, data.is_stepping_up);
    flags.set(StateFlag::WasSteppingUp, data.was_stepping_up);
    flags.set(StateFlag::IsSnappingToGround, data.is_snapping_to_ground);
    flags.set(StateFlag::WasSnappingToGround, data.was_snapping_to_ground);
    flags.set(StateFlag::HasTeleported, data.has_teleported);
    flags.set(StateFlag::HasJumpFrames, data.jump_frames > 0);
    flags.set(StateFlag::IsTrigger, settings.is_trigger);
    flags.set(
        StateFlag::ForcePredictedLookRotation,
        settings.force_predicted_look_rotation,
    );
    flags.set(StateFlag::AllowClientTeleports, settings.allow_client_teleports);

    flags.bits
        | (settings.shape as u32 & TWO_BITS) << SHAPE_SHIFT
        | (settings.input_authority_behavior as u32 & TWO_BITS) << INPUT_AUTHORITY_SHIFT
        | (settings.state_authority_behavior as u32 & TWO_BITS) << STATE_AUTHORITY_SHIFT
        | (settings.proxy_interpolation_mode as u32 & TWO_BITS) << INTERPOLATION_MODE_SHIFT
        | (settings.collider_layer as u32 & COLLIDER_LAYER_MASK) << COLLIDER_LAYER_SHIFT
        | (settings.features as u32 & FEATURES_MASK) << FEATURES_SHIFT
}

fn unpack_state(word: u32, data: &mut KccData) {
    let flags = BitmaskFlags::new(word);
    data.is_active = flags.has(StateFlag::IsActive);
    data.is_grounded = flags.has(StateFlag::IsGrounded);
    data.was_grounded = flags.has(StateFlag::WasGrounded);
    data.is_stepping_up = flags.has(StateFlag::IsSteppingUp);
    data.was_stepping_up = flags.has(StateFlag::WasSteppingUp);
    data.is_snapping_to_ground = flags.has(StateFlag::IsSnappingToGround);
    data.was_snapping_to_ground = flags.has(StateFlag::WasSnappingToGround);
    data.has_teleported = flags.has(StateFlag::HasTeleported);
    data.jump_frames = u32::from(flags.has(StateFlag::HasJumpFrames));
}

fn unpack_settings(word: u32, settings: &mut KccSettings) {
    let flags = BitmaskFlags::new(word);
    settings.is_trigger = flags.has(StateFlag::IsTrigger);
    settings.force_predicted_look_rotation = flags.has(StateFlag::ForcePredictedLookRotation);
    settings.allow_client_teleports = flags.has(StateFlag::AllowClientTeleports);
    settings.shape = ShapeType::from_bits(word >> SHAPE_SHIFT & TWO_BITS);
    settings.input_authority_behavior =
        AuthorityBehavior::from_bits(word >> INPUT_AUTHORITY_SHIFT & TWO_BITS);
    settings.state_authority_behavior =
        AuthorityBehavior::from_bits(word >> STATE_AUTHORITY_SHIFT & TWO_BITS);
    settings.proxy_interpolation_mode =
        InterpolationMode::from_bits(word >> INTERPOLATION_MODE_SHIFT & TWO_BITS);
    settings.collider_layer = (word >> COLLIDER_LAYER_SHIFT & COLLIDER_LAYER_MASK) as u8;
    settings.features = (word >> FEATURES_SHIFT & FEATURES_MASK) as u8;
}

/// Header plus `capacity` id words. Invalid ids are skipped and entries past
/// `capacity` are dropped in wire order.
fn write_interactions(
    w: &mut WordWriter<'_>,
    interactions: &Interactions,
    capacity: usize,
) -> Result<(), CodecError> {
    let mut counts = [0usize; 3];
    let mut remaining = capacity;
    for (count, kind) in counts.iter_mut().zip(CATEGORIES) {
        let valid = interactions.list(kind).iter().filter(|i| i.is_valid()).count();
        *count = valid.min(remaining).min(HEADER_COUNT_MASK as usize);
        remaining -= *count;
    }

    let header = counts
        .iter()
        .zip(HEADER_SHIFTS)
        .fold(0u32, |acc, (count, shift)| acc | (*count as u32) << shift);
    w.write_u32(header)?;

    for (count, kind) in counts.iter().zip(CATEGORIES) {
        for interaction in interactions
            .list(kind)
            .iter()
            .filter(|i| i.is_valid())
            .take(*count)
        {
            w.write_u32(interaction.id)?;
        }
    }
    w.write_zeros(remaining * INTERACTION_WORD_COUNT)
}

/// Interaction header of a snapshot being read.
///
/// Entries past the receiver's capacity, or past the end of the buffer, are
/// dropped in wire order.
struct InteractionBlock {
    counts: [usize; 3],
    capacity: usize,
}

impl InteractionBlock {
    fn read_header(r: &mut WordReader<'_>, capacity: usize) -> Result<Self, CodecError> {
        let header = r.read_u32()?;
        let counts = HEADER_SHIFTS.map(|shift| (header >> shift & HEADER_COUNT_MASK) as usize);
        let declared: usize = counts.iter().sum();
        let available = r.remaining() / INTERACTION_WORD_COUNT;
        if declared > capacity || declared > available {
            log::debug!(
                "truncating {declared} interactions to capacity {capacity}, {available} readable"
            );
        }
        // Clamp so the ids read below stay in bounds.
        let mut readable = declared.min(available);
        let counts = counts.map(|count| {
            let take = count.min(readable);
            readable -= take;
            take
        });
        Ok(Self { counts, capacity })
    }

    fn read_into(
        &self,
        r: &mut WordReader<'_>,
        interactions: &mut Interactions,
    ) -> Result<(), CodecError> {
        interactions.clear();
        let mut kept = 0;
        for (count, kind) in self.counts.into_iter().zip(CATEGORIES) {
            for _ in 0..count {
                let interaction = Interaction::new(r.read_u32()?);
                if kept < self.capacity && interactions.add(kind, interaction) {
                    kept += 1;
                }
            }
        }
        Ok(())
    }
}
