/*!
Character root module.

- data:      movement state (`KccData`) and bounded interaction lists
- overlap:   per-step overlap gather results
- classify:  contact classification by angle to up
- resolver:  correction accumulator for simultaneous penetrations
- solver:    depenetration solver (single and multi collider, ground probe)
- ground:    ground tangent derivation
- processor: post-solve processors (ground snap)
- kcc:       the controller tying it all together
*/

pub mod classify;
pub mod data;
pub mod ground;
pub mod kcc;
pub mod overlap;
pub mod processor;
pub mod resolver;
pub mod solver;

pub use classify::{CollisionType, ContactThresholds};
pub use data::{Interaction, InteractionId, InteractionKind, InteractionList, Interactions, KccData};
pub use kcc::Kcc;
pub use overlap::{OverlapHit, OverlapInfo};
pub use processor::{GroundSnapProcessor, Processor, ProcessorContext};
pub use resolver::KccResolver;
pub use solver::{ResolveParams, Solver};
