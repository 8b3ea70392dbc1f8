//! Change-event mirroring.

mod engine;

pub use engine::{SyncEngine, SyncOutcome};
