//! Per-object state tracking for people moving on a stage.
//!
//! Raw position reports go into a [`tracking::TrackingRegistry`] once per tick.
//! Each tracked [`tracking::Blob`] smooths its position, runs a freeze state
//! machine and watches the distance to every other blob for steady
//! relationships. State changes come out as [`tracking::BlobEvent`]s.
pub mod tracking;
pub mod utils;
