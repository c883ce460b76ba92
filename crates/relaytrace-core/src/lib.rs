//! relaytrace core library for offline delay analysis of relocation
//! experiments.
//!
//! A run reads a send trace and two receiver traces (source hop and
//! destination hop), normalizes every entry into a `PacketRecord`, merges
//! the traces into one record per packet, and aggregates delay and loss per
//! forwarding class. Decoders are byte- or line-oriented and side-effect
//! free; all input I/O is isolated in `source`.
//!
//! Invariants:
//! - Merged records carry a classified forwarding class.
//! - Sequence-number correlation never emits a sequence number twice.
//! - Loss plus received records covers the observed sequence span.
//!
//! # Examples
//! ```no_run
//! use relaytrace_core::{AnalysisConfig, RunMode, TracePaths, analyze};
//!
//! let paths = TracePaths::new("src.pcap", "dst.pcap").with_send("send.txt");
//! let analysis = analyze(RunMode::Tfm, &paths, &AnalysisConfig::default())?;
//! println!("merged records: {}", analysis.records.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};

mod analysis;
mod config;
mod context;
mod correlate;
pub mod decode;
mod record;
pub mod report;
mod source;
mod stats;
mod trace;

pub use analysis::{Analysis, AnalysisError, RunMode, TracePaths, analyze};
pub use config::{AnalysisConfig, ConfigError, DelayUnit, WrapCorrection};
pub use context::{Admission, RunContext};
pub use correlate::{
    Correlation, Strategy, TraceCounts, correlate_by_position, correlate_by_sequence,
    merge_companion_log, union_by_sequence,
};
pub use decode::header::HeaderFlags;
pub use record::{
    Endpoints, FlowSet, ForwardingClass, Hop, Origin, PacketRecord, Transport, UnknownClass,
};
pub use source::{
    LineSource, PacketEvent, PacketSource, PcapFileSource, SourceError, TextSource,
};
pub use stats::{
    Aggregate, AggregateBucket, DelayKind, DelayStats, LossSummary, LostRange, aggregate,
    detect_loss,
};
pub use trace::{
    TraceError, TraceFormat, read_capture_trace, read_text_trace, read_trace, read_trace_auto,
};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no send time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Machine-readable report of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    /// Tool identification metadata.
    pub tool: ToolInfo,
    /// RFC3339 timestamp of the first send time in the run.
    pub generated_at: String,
    pub mode: RunMode,
    pub config: AnalysisConfig,
    /// Traces in the order they were read.
    pub inputs: Vec<InputInfo>,
    pub strategy: Strategy,
    pub counts: TraceCounts,
    /// One bucket per forwarding class, in class order.
    pub buckets: Vec<AggregateBucket>,
    pub loss: LossSummary,
    /// Merged records in correlation order.
    pub records: Vec<PacketRecord>,
}

/// Tool metadata embedded in reports.
///
/// # Examples
/// ```
/// use relaytrace_core::ToolInfo;
///
/// let tool = ToolInfo {
///     name: "relaytrace".to_string(),
///     version: "0.1.0".to_string(),
/// };
/// assert_eq!(tool.name, "relaytrace");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    /// Tool version (semver).
    pub version: String,
}

/// One trace read during a run.
///
/// # Examples
/// ```
/// use relaytrace_core::{InputInfo, Origin, TraceFormat};
///
/// let input = InputInfo {
///     origin: Origin::DestHop,
///     path: "dst.pcap".to_string(),
///     format: TraceFormat::Capture,
///     records: 9,
/// };
/// assert_eq!(input.records, 9);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputInfo {
    pub origin: Origin,
    /// Input path as provided to the analyzer.
    pub path: String,
    pub format: TraceFormat,
    /// Records the trace reader produced.
    pub records: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_classes_and_omits_absent_metadata() {
        let mut record = PacketRecord::new(4, Origin::DestHop);
        record.forwarding_class = ForwardingClass::TaggedRedirect;
        record.send_time = Some(1.0);
        record.end_to_end_delay = Some(2.5);
        let records = vec![record];
        let agg = aggregate(&records, &WrapCorrection::default());

        let report = Report {
            report_version: REPORT_VERSION,
            tool: ToolInfo {
                name: "relaytrace".to_string(),
                version: "0.1.0".to_string(),
            },
            generated_at: DEFAULT_GENERATED_AT.to_string(),
            mode: RunMode::Tfm,
            config: AnalysisConfig::default(),
            inputs: vec![InputInfo {
                origin: Origin::DestHop,
                path: "dst.pcap".to_string(),
                format: TraceFormat::Capture,
                records: 1,
            }],
            strategy: Strategy::Sequence,
            counts: TraceCounts::default(),
            buckets: agg.buckets,
            loss: agg.loss,
            records,
        };

        let value = serde_json::to_value(&report).expect("report json");
        assert_eq!(value["mode"], "tfm");
        assert_eq!(value["strategy"], "sequence");
        assert_eq!(value["inputs"][0]["origin"], "dest_hop");
        assert_eq!(value["inputs"][0]["format"], "capture");
        assert_eq!(value["buckets"][2]["class"], "tagged_redirect");
        assert_eq!(value["buckets"][2]["count"], 1);
        assert!(value["buckets"][0]["end_to_end"]["min"].is_null());

        let packet = &value["records"][0];
        assert_eq!(packet["forwarding_class"], "tagged_redirect");
        assert!(packet.get("endpoints").is_none());
        assert!(packet.get("raw_delay_ms").is_none());
    }
}
