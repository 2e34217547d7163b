//! # nexus-test
//!
//! Test support for the NexusDB statement layer.
//!
//! This crate contains:
//! - An in-memory backend with a small SQL dialect and fault injection
//! - Session and tracing helpers shared by the integration tests
//! - End-to-end tests of prepare, execute, cursors, reprepare and the
//!   headless sandbox (under `tests/`)

#![warn(missing_docs)]
#![warn(clippy::all)]

/// In-memory compiler and executor.
pub mod mock;

/// Session and tracing helpers.
pub mod utils;

pub use mock::{Faults, InvokeHook, MockBackend};
pub use utils::{column, init_tracing, session, session_with_config};
