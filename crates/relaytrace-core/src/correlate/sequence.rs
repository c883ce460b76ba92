use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, info};

use crate::config::WrapCorrection;
use crate::record::{FlowSet, ForwardingClass, PacketRecord};

use super::{Correlation, Strategy, TraceCounts, derive_delays, overlay};

/// Align receiver records to send records by sequence number.
///
/// Send records missing from both receivers are not emitted; their loss is
/// recovered later from gaps in the sequence space.
pub fn correlate_by_sequence(
    send: FlowSet,
    src: FlowSet,
    dst: FlowSet,
    wrap: &WrapCorrection,
) -> Correlation {
    let mut counts = TraceCounts {
        send: send.len(),
        src: src.len(),
        dst: dst.len(),
        ..TraceCounts::default()
    };
    let src_index = index(src, &mut counts);
    let dst_index = index(dst, &mut counts);

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(send.len());
    for sent in &send.records {
        if !seen.insert(sent.sequence_number) {
            continue;
        }
        let observed = resolve(
            src_index.get(&sent.sequence_number),
            dst_index.get(&sent.sequence_number),
        );
        match observed {
            Some(receiver) => {
                let mut merged = overlay(sent, &receiver);
                derive_delays(&mut merged, wrap);
                records.push(merged);
            }
            None => counts.unmatched_send += 1,
        }
    }

    counts.unmatched_receiver = src_index
        .keys()
        .chain(dst_index.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|seq| !seen.contains(*seq))
        .count();
    counts.merged = records.len();

    info!(
        strategy = "sequence",
        merged = counts.merged,
        unmatched_send = counts.unmatched_send,
        unmatched_receiver = counts.unmatched_receiver,
        unsequenced = counts.unsequenced,
        "traces correlated"
    );
    Correlation {
        strategy: Strategy::Sequence,
        records,
        counts,
    }
}

/// Merge two receiver captures without a send trace.
///
/// The embedded send timestamp stands in for the send trace; output is in
/// ascending sequence order.
pub fn union_by_sequence(src: FlowSet, dst: FlowSet, wrap: &WrapCorrection) -> Correlation {
    let mut counts = TraceCounts {
        src: src.len(),
        dst: dst.len(),
        ..TraceCounts::default()
    };
    let src_index = index(src, &mut counts);
    let dst_index = index(dst, &mut counts);

    let keys: BTreeSet<u32> = src_index.keys().chain(dst_index.keys()).copied().collect();
    let records: Vec<PacketRecord> = keys
        .into_iter()
        .filter_map(|seq| resolve(src_index.get(&seq), dst_index.get(&seq)))
        .map(|mut record| {
            derive_delays(&mut record, wrap);
            record
        })
        .collect();
    counts.merged = records.len();

    info!(
        strategy = "sequence",
        merged = counts.merged,
        "receiver traces merged"
    );
    Correlation {
        strategy: Strategy::Sequence,
        records,
        counts,
    }
}

/// First occurrence of a sequence number wins.
///
/// Only payload-numbered records are indexed. A counter number shares the
/// key space with real sequence numbers and would shadow them.
fn index(flow: FlowSet, counts: &mut TraceCounts) -> BTreeMap<u32, PacketRecord> {
    let origin = flow.origin;
    let mut index = BTreeMap::new();
    for record in flow.records {
        let sequence = record.sequence_number;
        if !record.sequence_embedded {
            counts.unsequenced += 1;
            debug!(trace.origin = %origin, sequence, "record without embedded sequence skipped");
            continue;
        }
        if index.contains_key(&sequence) {
            counts.duplicates += 1;
            debug!(trace.origin = %origin, sequence, "duplicate sequence number dropped");
            continue;
        }
        index.insert(sequence, record);
    }
    index
}

/// Pick the receiver observation for one packet.
///
/// Seen at both hops, the destination record wins, but a redirect class
/// observed at the source is not overwritten by a direct one.
fn resolve(src: Option<&PacketRecord>, dst: Option<&PacketRecord>) -> Option<PacketRecord> {
    match (src, dst) {
        (Some(src), None) => Some(src.clone()),
        (None, Some(dst)) => Some(dst.clone()),
        (Some(src), Some(dst)) => {
            let mut record = dst.clone();
            if record.forwarding_class == ForwardingClass::Direct
                && src.forwarding_class != ForwardingClass::Direct
            {
                record.forwarding_class = src.forwarding_class;
            }
            Some(record)
        }
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{correlate_by_sequence, resolve, union_by_sequence};
    use crate::config::WrapCorrection;
    use crate::record::{FlowSet, ForwardingClass, Hop, Origin, PacketRecord};
    use crate::trace::TraceFormat;
    use std::collections::HashSet;

    fn send_flow(range: std::ops::RangeInclusive<u32>) -> FlowSet {
        let mut flow = FlowSet::new(Origin::Send, TraceFormat::Text);
        for seq in range {
            let mut record = PacketRecord::new(seq, Origin::Send);
            record.send_time = Some(seq as f64);
            flow.records.push(record);
        }
        flow
    }

    fn receiver_flow(origin: Origin, seqs: &[u32], class: ForwardingClass) -> FlowSet {
        let mut flow = FlowSet::new(origin, TraceFormat::Capture);
        for &seq in seqs {
            let mut record = PacketRecord::new(seq, origin);
            record.forwarding_class = class;
            record.send_time = Some(seq as f64);
            record.sequence_embedded = true;
            record.raw_delay_ms = Some(10.0);
            record.set_hop_time(Hop::Capture, Some(seq as f64 + 0.01));
            flow.records.push(record);
        }
        flow
    }

    #[test]
    fn lost_packets_are_not_emitted() {
        let send = send_flow(1..=10);
        let src = receiver_flow(Origin::SourceHop, &[], ForwardingClass::Direct);
        let dst = receiver_flow(
            Origin::DestHop,
            &[1, 2, 3, 4, 6, 7, 8, 9, 10],
            ForwardingClass::Direct,
        );
        let correlation = correlate_by_sequence(send, src, dst, &WrapCorrection::default());
        assert_eq!(correlation.records.len(), 9);
        assert_eq!(correlation.counts.unmatched_send, 1);
        assert!(correlation.records.iter().all(|r| r.sequence_number != 5));
        assert!(
            correlation
                .records
                .iter()
                .all(|r| r.forwarding_class.is_classified())
        );
    }

    #[test]
    fn output_has_unique_sequence_numbers() {
        let mut send = send_flow(1..=4);
        send.records.push(PacketRecord::new(2, Origin::Send));
        let src = receiver_flow(Origin::SourceHop, &[1, 2, 2], ForwardingClass::Direct);
        let dst = receiver_flow(
            Origin::DestHop,
            &[2, 3, 4],
            ForwardingClass::InFlightRedirect,
        );
        let correlation = correlate_by_sequence(send, src, dst, &WrapCorrection::default());
        let unique: HashSet<u32> = correlation
            .records
            .iter()
            .map(|r| r.sequence_number)
            .collect();
        assert_eq!(unique.len(), correlation.records.len());
        assert_eq!(correlation.counts.duplicates, 1);
    }

    #[test]
    fn receiver_only_sequences_are_counted() {
        let send = send_flow(1..=2);
        let src = receiver_flow(Origin::SourceHop, &[1, 7], ForwardingClass::Direct);
        let dst = receiver_flow(Origin::DestHop, &[2, 8], ForwardingClass::Direct);
        let correlation = correlate_by_sequence(send, src, dst, &WrapCorrection::default());
        assert_eq!(correlation.counts.unmatched_receiver, 2);
        assert_eq!(correlation.counts.merged, 2);
    }

    #[test]
    fn resolve_prefers_destination_but_keeps_redirect() {
        let mut src = PacketRecord::new(1, Origin::SourceHop);
        src.forwarding_class = ForwardingClass::InFlightRedirect;
        let mut dst = PacketRecord::new(1, Origin::DestHop);
        dst.forwarding_class = ForwardingClass::Direct;
        let resolved = resolve(Some(&src), Some(&dst)).unwrap();
        assert_eq!(resolved.origin, Origin::DestHop);
        assert_eq!(resolved.forwarding_class, ForwardingClass::InFlightRedirect);
    }

    #[test]
    fn union_orders_by_sequence() {
        let src = receiver_flow(Origin::SourceHop, &[3, 1], ForwardingClass::Direct);
        let dst = receiver_flow(Origin::DestHop, &[2], ForwardingClass::TaggedRedirect);
        let correlation = union_by_sequence(src, dst, &WrapCorrection::default());
        let seqs: Vec<u32> = correlation
            .records
            .iter()
            .map(|r| r.sequence_number)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(correlation.records[0].end_to_end_delay, Some(10.0));
    }

    #[test]
    fn counter_numbered_records_do_not_shadow_payload_sequences() {
        let send = send_flow(1..=2);
        let mut src = receiver_flow(Origin::SourceHop, &[1, 2], ForwardingClass::Direct);
        let mut tcp = PacketRecord::new(1, Origin::SourceHop);
        tcp.forwarding_class = ForwardingClass::Direct;
        tcp.set_hop_time(Hop::Capture, Some(0.0));
        src.records.insert(0, tcp);
        let dst = receiver_flow(Origin::DestHop, &[], ForwardingClass::Direct);

        let correlation = correlate_by_sequence(send, src, dst, &WrapCorrection::default());
        assert_eq!(correlation.counts.duplicates, 0);
        assert_eq!(correlation.counts.unsequenced, 1);
        assert_eq!(correlation.records.len(), 2);
        let first = &correlation.records[0];
        assert_eq!(first.raw_delay_ms, Some(10.0));
        assert_eq!(first.end_to_end_delay, Some(10.0));
    }

    #[test]
    fn union_ignores_counter_numbered_records() {
        let mut src = receiver_flow(Origin::SourceHop, &[2], ForwardingClass::Direct);
        src.records.push(PacketRecord::new(1, Origin::SourceHop));
        let dst = receiver_flow(Origin::DestHop, &[], ForwardingClass::Direct);
        let correlation = union_by_sequence(src, dst, &WrapCorrection::default());
        assert_eq!(correlation.records.len(), 1);
        assert_eq!(correlation.records[0].sequence_number, 2);
        assert_eq!(correlation.counts.unsequenced, 1);
    }
}
