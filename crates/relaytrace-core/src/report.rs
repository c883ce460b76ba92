//! Plain-text renderings of a finished analysis.
//!
//! Pure formatting: callers decide where the text goes and whether it
//! replaces or extends an existing file.

use std::fmt::Write as _;

use crate::correlate::TraceCounts;
use crate::record::{Hop, PacketRecord};
use crate::stats::{Aggregate, DelayKind, DelayStats};

/// Header line of the per-packet table.
pub const PACKET_TABLE_HEADER: &str = "1:num---2:initime---3:outtimetfm---4:outtimenf---5:outtime";

const SEPARATOR: &str = "----------------------------------------";
const MISSING: &str = "-";

/// One row per merged record, every time relative to the first record's
/// send time.
pub fn format_packet_table(records: &[PacketRecord]) -> String {
    let origin = records
        .iter()
        .find_map(|record| record.send_time)
        .unwrap_or(0.0);
    let relative = |ts: Option<f64>| match ts {
        Some(ts) => format!("{:.6}", ts - origin),
        None => MISSING.to_string(),
    };

    let mut out = String::new();
    out.push_str(PACKET_TABLE_HEADER);
    out.push('\n');
    for record in records {
        let _ = writeln!(
            out,
            "{} {} {} {} {}",
            record.sequence_number,
            relative(record.send_time),
            relative(record.hop_time(Hop::Capture)),
            relative(record.hop_time(Hop::Log)),
            relative(record.arrival_time()),
        );
    }
    out
}

/// `sendnum=..,srcnum=..,dstnum=..,real=..`
pub fn format_counts_line(counts: &TraceCounts) -> String {
    format!(
        "sendnum={},srcnum={},dstnum={},real={}",
        counts.send,
        counts.src,
        counts.dst,
        counts.received()
    )
}

pub fn format_summary(aggregate: &Aggregate) -> String {
    let mut out = String::new();
    for bucket in &aggregate.buckets {
        out.push_str(SEPARATOR);
        out.push('\n');
        let _ = writeln!(out, "class:{}   pkt_num:{}", bucket.class, bucket.count);
        if bucket.is_empty() {
            out.push_str("no records\n");
        } else {
            for kind in DelayKind::ALL {
                let _ = writeln!(out, "{}", format_delay_line(kind, bucket.delay(kind)));
            }
        }
        let _ = writeln!(out, "lost:{}", bucket.lost_count);
    }

    let loss = &aggregate.loss;
    out.push_str(SEPARATOR);
    out.push('\n');
    let _ = writeln!(
        out,
        "first_seq:{}   last_seq:{}   received:{}   lost:{}",
        optional(loss.first_sequence),
        optional(loss.last_sequence),
        loss.received,
        loss.lost_total()
    );
    if !loss.ranges.is_empty() {
        let ranges: Vec<String> = loss.ranges.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "lost_ranges:{}", ranges.join(","));
    }
    out
}

fn format_delay_line(kind: DelayKind, stats: &DelayStats) -> String {
    let mut line = format!(
        "{}: samples={} min={} max={} avg={}",
        kind,
        stats.samples,
        millis(stats.min),
        millis(stats.max),
        millis(stats.average)
    );
    if stats.wrap_corrected {
        line.push_str(" (wrap corrected)");
    }
    line
}

fn millis(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |ms| format!("{ms:.3}"))
}

fn optional(value: Option<u32>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::{PACKET_TABLE_HEADER, format_counts_line, format_packet_table, format_summary};
    use crate::config::WrapCorrection;
    use crate::correlate::TraceCounts;
    use crate::record::{ForwardingClass, Hop, Origin, PacketRecord};
    use crate::stats::aggregate;

    fn merged(seq: u32, send: f64, delay_ms: f64) -> PacketRecord {
        let mut record = PacketRecord::new(seq, Origin::DestHop);
        record.forwarding_class = ForwardingClass::Direct;
        record.send_time = Some(send);
        record.end_to_end_delay = Some(delay_ms);
        record
    }

    #[test]
    fn packet_table_is_relative_to_first_send() {
        let mut first = merged(1, 100.0, 10.0);
        first.set_hop_time(Hop::Capture, Some(100.010));
        let second = merged(2, 100.5, 20.0);
        let table = format_packet_table(&[first, second]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], PACKET_TABLE_HEADER);
        assert_eq!(lines[1], "1 0.000000 0.010000 - 0.010000");
        assert_eq!(lines[2], "2 0.500000 - - 0.520000");
    }

    #[test]
    fn packet_table_without_records_is_header_only() {
        assert_eq!(format_packet_table(&[]), format!("{PACKET_TABLE_HEADER}\n"));
    }

    #[test]
    fn counts_line_sums_receivers() {
        let counts = TraceCounts {
            send: 10,
            src: 4,
            dst: 5,
            ..TraceCounts::default()
        };
        assert_eq!(
            format_counts_line(&counts),
            "sendnum=10,srcnum=4,dstnum=5,real=9"
        );
    }

    #[test]
    fn summary_lists_every_class_and_loss() {
        let records = vec![merged(1, 1.0, 5.0), merged(4, 1.1, 7.0)];
        let agg = aggregate(&records, &WrapCorrection::default());
        let summary = format_summary(&agg);

        assert!(summary.contains("class:direct   pkt_num:2"));
        assert!(summary.contains("end_to_end: samples=2 min=5.000 max=7.000 avg=6.000"));
        assert!(summary.contains("capture_hop: samples=0 min=- max=- avg=-"));
        assert!(summary.contains("class:tagged_redirect   pkt_num:0\nno records\nlost:0"));
        assert!(summary.contains("first_seq:1   last_seq:4   received:2   lost:2"));
        assert!(summary.contains("lost_ranges:2-3"));
    }
}
