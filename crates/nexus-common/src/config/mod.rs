//! Configuration for the statement layer.

mod statement;

pub use statement::{StatementConfig, StatementConfigBuilder};
