//! Wire format for the Navicat PostgreSQL HTTP tunnel.
//!
//! The tunnel answers every request with a single binary stream. The stream
//! is built from four primitives:
//!
//! - *long*: 4-byte big-endian unsigned integer
//! - *short*: 2-byte big-endian unsigned integer
//! - *block*: length-prefixed byte string (1-byte length below 254, otherwise
//!   `0xFE` followed by a 4-byte length)
//! - *null*: the single byte `0xFF`
//!
//! [`WireWriter`] produces these; [`WireReader`] exists for tests and
//! diagnostics. [`types`] holds the backend-type to protocol-code table the
//! client depends on.

pub mod codec;
pub mod reader;
pub mod types;

pub use codec::{BLOCK_LONG_MARKER, NULL_MARKER, SHORT_BLOCK_LIMIT, WireWriter};
pub use reader::{ReadError, WireReader};
pub use types::{TypeRecord, map_type};
