//! Trace sources.
//!
//! Sources own all input I/O. Capture files are exposed as a stream of raw
//! frames (`PacketSource`), text logs as a stream of lines (`LineSource`);
//! decoding happens in `decode`.

mod pcap;
mod text;

pub use pcap::PcapFileSource;
pub use text::TextSource;

use pcap_parser::Linktype;
use thiserror::Error;

/// One captured frame with its capture timestamp in seconds.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    pub ts: Option<f64>,
    pub linktype: Linktype,
    pub data: Vec<u8>,
}

pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError>;
}

pub trait LineSource {
    fn next_line(&mut self) -> Result<Option<String>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            pcap::error::PcapSourceError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
        }
    }
}
