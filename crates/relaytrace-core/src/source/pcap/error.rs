use thiserror::Error;

/// Failures while opening or walking a capture file.
///
/// `context` names the reader stage (init, next, refill) so truncated or
/// corrupt captures can be told apart in logs.
#[derive(Debug, Error)]
pub enum PcapSourceError {
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture parse error ({context}): {message}")]
    Pcap {
        context: &'static str,
        message: String,
    },
}
