//! Error codes and diagnostic conditions.
//!
//! Every crate in the statement layer maps its own error enum onto these
//! codes so that the client sees one consistent numbering.

mod codes;
mod condition;

pub use codes::ErrorCode;
pub use condition::{Condition, Severity};
