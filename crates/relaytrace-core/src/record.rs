//! Normalized packet records shared by every pipeline stage.
//!
//! A `PacketRecord` starts life in a trace reader with only the fields its
//! source can observe, is merged by the correlator, and is read-only from the
//! aggregator onward.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::trace::TraceFormat;

/// Forwarding treatment a packet received on its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardingClass {
    Direct,
    InFlightRedirect,
    TaggedRedirect,
    Unclassified,
}

impl ForwardingClass {
    /// Classes a merged record may carry, in report order.
    pub const CLASSIFIED: [ForwardingClass; 3] = [
        ForwardingClass::Direct,
        ForwardingClass::InFlightRedirect,
        ForwardingClass::TaggedRedirect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ForwardingClass::Direct => "direct",
            ForwardingClass::InFlightRedirect => "in_flight_redirect",
            ForwardingClass::TaggedRedirect => "tagged_redirect",
            ForwardingClass::Unclassified => "unclassified",
        }
    }

    pub fn is_classified(self) -> bool {
        self != ForwardingClass::Unclassified
    }
}

impl fmt::Display for ForwardingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a class name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown forwarding class '{0}'")]
pub struct UnknownClass(pub String);

impl FromStr for ForwardingClass {
    type Err = UnknownClass;

    /// Accepts the canonical names plus the short labels used in experiment
    /// logs (`normal`, `infly`, `redirect`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "normal" => Ok(ForwardingClass::Direct),
            "in_flight_redirect" | "infly" => Ok(ForwardingClass::InFlightRedirect),
            "tagged_redirect" | "redirect" => Ok(ForwardingClass::TaggedRedirect),
            "unclassified" => Ok(ForwardingClass::Unclassified),
            _ => Err(UnknownClass(s.to_string())),
        }
    }
}

/// Trace a record's timing data came from before the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Send,
    SourceHop,
    DestHop,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Send => "send",
            Origin::SourceHop => "src",
            Origin::DestHop => "dst",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observation points a receiver-side record can carry a timestamp for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hop {
    /// Frame timestamp from the receiver's packet capture.
    Capture,
    /// Timestamp written by the receiver's application log.
    Log,
}

pub const HOP_COUNT: usize = 2;

impl Hop {
    pub const ALL: [Hop; HOP_COUNT] = [Hop::Capture, Hop::Log];

    pub fn index(self) -> usize {
        match self {
            Hop::Capture => 0,
            Hop::Log => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Udp,
    Tcp,
}

/// Path identifiers, only known for capture-derived records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub transport: Transport,
    pub source_ip: IpAddr,
    pub source_port: u16,
    pub dest_ip: IpAddr,
    pub dest_port: u16,
}

/// The unit of correlation.
///
/// Timestamps are seconds, delays are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub sequence_number: u32,
    /// Set when `sequence_number` was read from the capture payload rather
    /// than assigned by the per-trace counter.
    #[serde(default)]
    pub sequence_embedded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Endpoints>,
    pub send_time: Option<f64>,
    pub hop_times: [Option<f64>; HOP_COUNT],
    /// Delay carried in the capture payload, before wrap correction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_delay_ms: Option<f64>,
    pub end_to_end_delay: Option<f64>,
    pub hop_delays: [Option<f64>; HOP_COUNT],
    /// Set when the end-to-end delay was recovered by wrap correction.
    pub wrapped: bool,
    pub forwarding_class: ForwardingClass,
    pub origin: Origin,
}

impl PacketRecord {
    pub fn new(sequence_number: u32, origin: Origin) -> Self {
        Self {
            sequence_number,
            sequence_embedded: false,
            endpoints: None,
            send_time: None,
            hop_times: [None; HOP_COUNT],
            raw_delay_ms: None,
            end_to_end_delay: None,
            hop_delays: [None; HOP_COUNT],
            wrapped: false,
            forwarding_class: ForwardingClass::Unclassified,
            origin,
        }
    }

    pub fn hop_time(&self, hop: Hop) -> Option<f64> {
        self.hop_times[hop.index()]
    }

    pub fn set_hop_time(&mut self, hop: Hop, ts: Option<f64>) {
        self.hop_times[hop.index()] = ts;
    }

    pub fn hop_delay(&self, hop: Hop) -> Option<f64> {
        self.hop_delays[hop.index()]
    }

    /// Arrival time implied by the end-to-end delay.
    pub fn arrival_time(&self) -> Option<f64> {
        Some(self.send_time? + self.end_to_end_delay? / 1000.0)
    }
}

/// Ordered records produced by one trace reader.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSet {
    pub origin: Origin,
    pub format: TraceFormat,
    pub records: Vec<PacketRecord>,
}

impl FlowSet {
    pub fn new(origin: Origin, format: TraceFormat) -> Self {
        Self {
            origin,
            format,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_send_time(&self) -> Option<f64> {
        self.records.first().and_then(|record| record.send_time)
    }
}
