//! Flow correlator.
//!
//! Merges the send trace and the receiver traces into one record per packet,
//! then derives hop and end-to-end delays. Two alignment strategies exist:
//! sequence-number lookup when the receivers are captures carrying embedded
//! metadata, and a best-effort positional pairing for text logs.

mod positional;
mod sequence;

pub use positional::{correlate_by_position, merge_companion_log};
pub use sequence::{correlate_by_sequence, union_by_sequence};

use serde::{Deserialize, Serialize};

use crate::config::WrapCorrection;
use crate::record::{FlowSet, Hop, PacketRecord};
use crate::trace::TraceFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Sequence,
    Positional,
}

impl Strategy {
    /// Sequence numbers are trusted only when both receivers are captures.
    pub fn select(src: &FlowSet, dst: &FlowSet) -> Self {
        if src.format == TraceFormat::Capture && dst.format == TraceFormat::Capture {
            Strategy::Sequence
        } else {
            Strategy::Positional
        }
    }
}

/// Record counts observed while correlating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceCounts {
    pub send: usize,
    pub src: usize,
    pub dst: usize,
    /// Records emitted into the merged set.
    pub merged: usize,
    /// Send records with no receiver counterpart.
    pub unmatched_send: usize,
    /// Receiver records with no send counterpart.
    pub unmatched_receiver: usize,
    /// Receiver records dropped because their sequence number repeated.
    pub duplicates: usize,
    /// Receiver records left out of sequence alignment because their
    /// number came from the trace counter, not the payload.
    #[serde(default)]
    pub unsequenced: usize,
}

impl TraceCounts {
    pub fn received(&self) -> usize {
        self.src + self.dst
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub strategy: Strategy,
    pub records: Vec<PacketRecord>,
    pub counts: TraceCounts,
}

/// Overlay a receiver observation onto the send record for the same packet.
///
/// The send trace is authoritative for the send time when it has one.
pub(crate) fn overlay(send: &PacketRecord, receiver: &PacketRecord) -> PacketRecord {
    let mut merged = receiver.clone();
    merged.sequence_number = send.sequence_number;
    if send.send_time.is_some() {
        merged.send_time = send.send_time;
    }
    merged
}

/// Fill in hop delays and the end-to-end delay.
///
/// The end-to-end delay is the wrap-corrected embedded delay when the
/// capture carried one, otherwise the delay to the latest observed hop.
pub(crate) fn derive_delays(record: &mut PacketRecord, wrap: &WrapCorrection) {
    for hop in Hop::ALL {
        record.hop_delays[hop.index()] = match (record.hop_time(hop), record.send_time) {
            (Some(observed), Some(sent)) => Some((observed - sent) * 1000.0),
            _ => None,
        };
    }

    match record.raw_delay_ms {
        Some(raw) => {
            let (delay, wrapped) = wrap.correct(raw);
            record.end_to_end_delay = Some(delay);
            record.wrapped = wrapped;
        }
        None => {
            let latest = Hop::ALL
                .iter()
                .filter_map(|hop| Some((record.hop_time(*hop)?, record.hop_delay(*hop)?)))
                .max_by(|a, b| a.0.total_cmp(&b.0));
            record.end_to_end_delay = latest.map(|(_, delay)| delay);
            record.wrapped = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Strategy, derive_delays, overlay};
    use crate::config::WrapCorrection;
    use crate::record::{FlowSet, ForwardingClass, Hop, Origin, PacketRecord};
    use crate::trace::TraceFormat;

    #[test]
    fn strategy_requires_two_captures() {
        let capture = FlowSet::new(Origin::SourceHop, TraceFormat::Capture);
        let text = FlowSet::new(Origin::DestHop, TraceFormat::Text);
        assert_eq!(Strategy::select(&capture, &capture), Strategy::Sequence);
        assert_eq!(Strategy::select(&capture, &text), Strategy::Positional);
        assert_eq!(Strategy::select(&text, &text), Strategy::Positional);
    }

    #[test]
    fn overlay_keeps_send_identity_and_receiver_class() {
        let mut send = PacketRecord::new(3, Origin::Send);
        send.send_time = Some(1.0);
        let mut receiver = PacketRecord::new(9, Origin::DestHop);
        receiver.forwarding_class = ForwardingClass::InFlightRedirect;
        receiver.send_time = Some(0.5);
        receiver.set_hop_time(Hop::Capture, Some(1.2));

        let merged = overlay(&send, &receiver);
        assert_eq!(merged.sequence_number, 3);
        assert_eq!(merged.send_time, Some(1.0));
        assert_eq!(merged.origin, Origin::DestHop);
        assert_eq!(merged.forwarding_class, ForwardingClass::InFlightRedirect);
    }

    #[test]
    fn delays_use_embedded_value_with_wrap_correction() {
        let mut record = PacketRecord::new(1, Origin::DestHop);
        record.send_time = Some(10.0);
        record.raw_delay_ms = Some(995.0);
        record.set_hop_time(Hop::Capture, Some(10.02));
        derive_delays(&mut record, &WrapCorrection::default());

        assert_eq!(record.end_to_end_delay, Some(5.0));
        assert!(record.wrapped);
        let capture = record.hop_delay(Hop::Capture).unwrap();
        assert!((capture - 20.0).abs() < 1e-6);
        assert!(record.hop_delay(Hop::Log).is_none());
    }

    #[test]
    fn delays_fall_back_to_latest_hop() {
        let mut record = PacketRecord::new(1, Origin::SourceHop);
        record.send_time = Some(10.0);
        record.set_hop_time(Hop::Capture, Some(10.010));
        record.set_hop_time(Hop::Log, Some(10.030));
        derive_delays(&mut record, &WrapCorrection::default());

        let delay = record.end_to_end_delay.unwrap();
        assert!((delay - 30.0).abs() < 1e-6);
        assert!(!record.wrapped);
    }

    #[test]
    fn delays_without_send_time_stay_empty() {
        let mut record = PacketRecord::new(1, Origin::SourceHop);
        record.set_hop_time(Hop::Log, Some(3.0));
        derive_delays(&mut record, &WrapCorrection::default());
        assert!(record.end_to_end_delay.is_none());
        assert!(record.hop_delay(Hop::Log).is_none());
    }
}
