//! Text log decoders.
//!
//! Send-side logs are colon/space delimited and only lines carrying the
//! `time` marker matter. Receiver-side logs are comma delimited with a
//! leading numeric column. Both parsers return `None` for irrelevant or
//! malformed lines; skipping is never an error.

mod receiver;
mod send;

pub use receiver::{ReceiverLine, parse_receiver_line};
pub use send::parse_send_line;
