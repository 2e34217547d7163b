//! # nexus-wire
//!
//! Binary protocol value codec for the NexusDB statement layer.
//!
//! Parameters arrive pre-typed: each carries a [`FieldType`] code, an
//! unsigned flag, and a raw byte span whose length the framing layer has
//! already determined. This crate turns such spans into [`Value`]s and back,
//! and builds the reply payloads (OK, ERR, column definitions, binary rows)
//! that a network result sink emits.
//!
//! ## Example
//!
//! ```rust
//! use nexus_wire::{decode, encode_to_bytes, FieldType, Value};
//!
//! let bytes = encode_to_bytes(FieldType::Long, false, &Value::Int(7)).unwrap();
//! assert_eq!(bytes.len(), 4);
//! let (value, used) = decode(FieldType::Long, false, &bytes).unwrap();
//! assert_eq!(value, Value::Int(7));
//! assert_eq!(used, 4);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod packet;
pub mod temporal;
pub mod types;
pub mod value;

pub use codec::{decode, encode, encode_to_bytes, natural_type};
pub use error::{WireError, WireResult};
pub use temporal::{DateTimeParts, Temporal, TimeParts};
pub use types::FieldType;
pub use value::Value;
