//! Replication of the controller state as fixed-size `u32` snapshots.

pub mod codec;
pub mod words;

pub use codec::{InterpolationSource, StateFlag, interpolate, read, word_count, write};
pub use words::{WordReader, WordWriter};
