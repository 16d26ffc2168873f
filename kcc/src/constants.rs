/// Accuracy of the compressed position record (units per meter).
///
/// Part of the wire format: `q = round(p * POSITION_ACCURACY)` stored as `i32`.
pub const POSITION_ACCURACY: f32 = 1024.0;

/// Inverse of [`POSITION_ACCURACY`], the size of one position grid cell (meters).
pub const INV_POSITION_ACCURACY: f32 = 1.0 / POSITION_ACCURACY;

/// Number of words per replicated interaction entry.
pub const INTERACTION_WORD_COUNT: usize = 1;

/// Maximum number of interactions per category that fit into the 8-bit header counts.
pub const MAX_INTERACTIONS_PER_CATEGORY: usize = u8::MAX as usize;

/// Smallest sub-step length used by the depenetration solver (meters).
///
/// Displacements shorter than `max_sub_steps * MIN_STEP_DISTANCE` get fewer sub-steps.
pub const MIN_STEP_DISTANCE: f32 = 0.001;

/// Iteration cap passed to the correction accumulator.
pub const RESOLVER_MAX_ITERATIONS: usize = 12;

/// Residual tolerance passed to the correction accumulator (meters).
pub const RESOLVER_TOLERANCE: f32 = 0.0001;

/// Upper bound of corrections gathered in one accumulator pass.
pub const RESOLVER_CAPACITY: usize = 64;

