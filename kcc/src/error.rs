use thiserror::Error;

/// Invalid controller configuration, reported when an actor is created.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("radius must be finite and > 0, got {0}")]
    InvalidRadius(f32),

    #[error("height must be finite and >= 2 * radius ({radius}), got {height}")]
    InvalidHeight { height: f32, radius: f32 },

    #[error("extent must be finite and >= 0, got {0}")]
    InvalidExtent(f32),

    #[error("{name} must be within [0, 90] degrees, got {value}")]
    InvalidAngle { name: &'static str, value: f32 },

    #[error("collider layer must be < 32, got {0}")]
    InvalidColliderLayer(u8),

    #[error("max total interactions must be > 0")]
    NoInteractionCapacity,

    #[error("{name} must be finite and >= 0, got {value}")]
    InvalidValue { name: &'static str, value: f32 },

    #[error("parse error: {0}")]
    Parse(String),
}

/// Snapshot faults. A failed read leaves the destination state untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("snapshot buffer too small: need {needed} words, got {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("snapshot carries invalid settings: {0}")]
    InvalidSettings(#[from] ConfigError),
}
