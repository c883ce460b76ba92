//! Forwarding classification from IPv4 header bits.
//!
//! Two single-bit signals are read from the network header: the low bit of
//! the type-of-service byte and the high bit of the flags/fragment-offset
//! word. The latter is the reserved IPv4 flag, repurposed by the relocation
//! mechanism as a redirect marker. The decoder also extracts the
//! transport endpoints and, for UDP, the payload carrying the embedded
//! metadata.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::{DecodedFrame, HeaderFlags, parse_frame};
