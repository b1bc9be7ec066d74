//! Export contents of `tracking` folder
mod timed_point;
mod pair;
mod neighbor;
mod blob;
mod events;
mod config;
mod registry;
pub mod tracking_errors;

/// Identifier assigned to an object by the upstream detector
pub type ObjectId = u32;
/// Integer seconds. Always supplied by the caller, never read from a clock inside the core
pub type Timestamp = i64;

pub use self::{
    timed_point::*,
    pair::*,
    neighbor::*,
    blob::*,
    events::*,
    config::*,
    registry::*,
    tracking_errors::*,
};
