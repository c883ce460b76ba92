use tracing::{info, warn};

use crate::config::WrapCorrection;
use crate::record::{FlowSet, Hop};

use super::{Correlation, Strategy, TraceCounts, derive_delays, overlay};

/// Pair send records with receiver records by position.
///
/// Best effort only: receiver logs carry no packet identity, so the source
/// trace followed by the destination trace is assumed to be in send order
/// with loss already reflected in their lengths. Unpaired tails on either
/// side are dropped and counted.
pub fn correlate_by_position(
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

    let received: Vec<_> = src.records.into_iter().chain(dst.records).collect();
    let paired = send.len().min(received.len());
    if send.len() != received.len() {
        warn!(
            send = send.len(),
            received = received.len(),
            paired,
            "send and receiver record counts differ, dropping unpaired tail"
        );
    }

    let records: Vec<_> = send
        .records
        .iter()
        .zip(received.iter())
        .map(|(sent, receiver)| {
            let mut merged = overlay(sent, receiver);
            derive_delays(&mut merged, wrap);
            merged
        })
        .collect();

    counts.merged = records.len();
    counts.unmatched_send = send.len() - paired;
    counts.unmatched_receiver = received.len() - paired;

    info!(strategy = "positional", merged = counts.merged, "traces correlated");
    Correlation {
        strategy: Strategy::Positional,
        records,
        counts,
    }
}

/// Copy log-hop timestamps from a companion receiver log onto the capture
/// trace of the same hop, position for position.
pub fn merge_companion_log(mut capture: FlowSet, log: &FlowSet) -> FlowSet {
    if capture.len() != log.len() {
        warn!(
            trace.origin = %capture.origin,
            capture = capture.len(),
            log = log.len(),
            "companion log length differs from capture"
        );
    }
    for (record, logged) in capture.records.iter_mut().zip(&log.records) {
        record.set_hop_time(Hop::Log, logged.hop_time(Hop::Log));
    }
    capture
}
