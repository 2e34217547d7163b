//! Core types shared by the NexusDB statement layer.

mod ids;

pub use ids::{SessionId, StatementId};
