//! Metadata embedded in the UDP payload of measurement packets.
//!
//! The sender writes a fixed 20-byte header at the start of every payload:
//! sequence number, the send timestamp (seconds + nanoseconds) and a delay
//! counter. This decoder is the canonical sequence-number source for
//! capture-based correlation.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::{PayloadMetadata, parse_payload_metadata};
