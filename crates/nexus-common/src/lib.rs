//! # nexus-common
//!
//! Common types, error codes, and configuration for the NexusDB statement
//! layer.
//!
//! This crate provides the foundational pieces shared by the wire codec and
//! the statement execution core:
//!
//! - **Types**: Statement and session identifiers
//! - **Errors**: Stable `ErrorCode`s and diagnostic `Condition`s
//! - **Config**: `StatementConfig`, loadable from TOML
//! - **Constants**: Limits such as the reprepare attempt budget
//!
//! ## Example
//!
//! ```rust
//! use nexus_common::error::{Condition, ErrorCode};
//! use nexus_common::types::StatementId;
//!
//! let id = StatementId::new(1);
//! let cond = Condition::error(ErrorCode::UnknownStatement, format!("unknown statement {id}"));
//! assert_eq!(cond.code.category(), "Statement");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::StatementConfig;
pub use constants::*;
pub use error::{Condition, ErrorCode, Severity};
pub use types::{SessionId, StatementId};
