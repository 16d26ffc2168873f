pub mod bitmask_flags;
pub mod character;
pub mod collision;
pub mod config;
pub mod constants;
pub mod error;
pub mod network;
pub mod quantize;
pub mod utils;

pub use character::{CollisionType, Kcc, KccData, KccResolver, OverlapInfo, Processor};
pub use collision::{ActorShape, ColliderRef, PhysicsQuery, StaticShape, StaticWorld, Vec3};
pub use config::{Feature, KccSettings};
pub use error::{CodecError, ConfigError};
pub use network::InterpolationSource;
