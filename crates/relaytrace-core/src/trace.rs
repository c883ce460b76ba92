//! Trace reader: one full pass over a source, one `FlowSet` out.
//!
//! Entries a decoder rejects are dropped with a debug log; only source-level
//! I/O and container errors propagate.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::context::{Admission, RunContext};
use crate::decode::header::parse_frame;
use crate::decode::payload::parse_payload_metadata;
use crate::decode::text::{parse_receiver_line, parse_send_line};
use crate::record::{FlowSet, Hop, Origin, PacketRecord, Transport};
use crate::source::{
    LineSource, PacketEvent, PacketSource, PcapFileSource, SourceError, TextSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceFormat {
    Text,
    Capture,
}

impl TraceFormat {
    /// Infer the format from the file name: `txt` means text, `pcap` means
    /// capture (which also matches `.pcapng`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy();
        if name.contains("txt") {
            Some(TraceFormat::Text)
        } else if name.contains("pcap") {
            Some(TraceFormat::Capture)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TraceFormat::Text => "text",
            TraceFormat::Capture => "capture",
        }
    }
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Source error in {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: SourceError,
    },
    #[error("cannot infer trace format from file name: {path}")]
    UnknownFormat { path: String },
}

/// Open `path` and read it end to end.
pub fn read_trace(
    path: &Path,
    format: TraceFormat,
    origin: Origin,
    config: &AnalysisConfig,
    ctx: &mut RunContext,
) -> Result<FlowSet, TraceError> {
    let source_err = |source| TraceError::Source {
        path: path.display().to_string(),
        source,
    };
    let flow = match format {
        TraceFormat::Text => {
            let source = TextSource::open(path).map_err(source_err)?;
            read_text_trace(source, origin, config, ctx).map_err(source_err)?
        }
        TraceFormat::Capture => {
            let source = PcapFileSource::open(path).map_err(source_err)?;
            read_capture_trace(source, origin, config, ctx).map_err(source_err)?
        }
    };
    info!(
        trace.origin = %origin,
        trace.format = format.as_str(),
        trace.path = %path.display(),
        trace.records = flow.len(),
        "trace read"
    );
    Ok(flow)
}

/// Like `read_trace`, inferring the format from the file name.
pub fn read_trace_auto(
    path: &Path,
    origin: Origin,
    config: &AnalysisConfig,
    ctx: &mut RunContext,
) -> Result<FlowSet, TraceError> {
    let format = TraceFormat::from_path(path).ok_or_else(|| TraceError::UnknownFormat {
        path: path.display().to_string(),
    })?;
    read_trace(path, format, origin, config, ctx)
}

pub fn read_text_trace<S: LineSource>(
    mut source: S,
    origin: Origin,
    config: &AnalysisConfig,
    ctx: &mut RunContext,
) -> Result<FlowSet, SourceError> {
    ctx.begin_trace();
    let mut flow = FlowSet::new(origin, TraceFormat::Text);
    let mut skipped = 0usize;

    while let Some(line) = source.next_line()? {
        let record = match origin {
            Origin::Send => decode_send_line(&line, config, ctx),
            Origin::SourceHop | Origin::DestHop => decode_receiver_line(&line, origin, config, ctx),
        };
        match record {
            Some(record) => flow.records.push(record),
            None => skipped += 1,
        }
    }

    debug!(trace.origin = %origin, skipped, "text lines without a record");
    Ok(flow)
}

pub fn read_capture_trace<S: PacketSource>(
    mut source: S,
    origin: Origin,
    config: &AnalysisConfig,
    ctx: &mut RunContext,
) -> Result<FlowSet, SourceError> {
    ctx.begin_trace();
    let mut flow = FlowSet::new(origin, TraceFormat::Capture);
    let mut skipped = 0usize;

    while let Some(event) = source.next_packet()? {
        match decode_capture_frame(&event, origin, config, ctx) {
            Some(record) => flow.records.push(record),
            None => skipped += 1,
        }
    }

    debug!(trace.origin = %origin, skipped, "frames without a record");
    Ok(flow)
}

fn decode_send_line(
    line: &str,
    config: &AnalysisConfig,
    ctx: &mut RunContext,
) -> Option<PacketRecord> {
    let send_time = parse_send_line(line, config.subsecond_width)?;
    let mut record = PacketRecord::new(ctx.next_sequence(), Origin::Send);
    record.send_time = Some(send_time);
    Some(record)
}

fn decode_receiver_line(
    line: &str,
    origin: Origin,
    config: &AnalysisConfig,
    ctx: &mut RunContext,
) -> Option<PacketRecord> {
    let parsed = parse_receiver_line(line, config.receiver_timestamp_width)?;
    match ctx.admit(parsed.observed_time) {
        Admission::Admitted => {}
        Admission::BeforeSend => {
            debug!(
                trace.origin = %origin,
                observed = parsed.observed_time,
                "receiver record precedes first send, skipping"
            );
            return None;
        }
        Admission::BeforeNormal => {
            warn!(
                trace.origin = %origin,
                observed = parsed.observed_time,
                baseline = ctx.normal_baseline(),
                "receiver record stamped earlier than its send time, discarding"
            );
            return None;
        }
    }

    let mut record = PacketRecord::new(ctx.next_sequence(), origin);
    record.forwarding_class = parsed.class;
    record.set_hop_time(Hop::Log, Some(parsed.observed_time));
    Some(record)
}

fn decode_capture_frame(
    event: &PacketEvent,
    origin: Origin,
    config: &AnalysisConfig,
    ctx: &mut RunContext,
) -> Option<PacketRecord> {
    if origin == Origin::Send {
        let mut record = PacketRecord::new(ctx.next_sequence(), Origin::Send);
        record.send_time = event.ts;
        return Some(record);
    }

    let frame = match parse_frame(event.linktype, &event.data) {
        Ok(Some(frame)) => frame,
        Ok(None) => return None,
        Err(err) => {
            debug!(trace.origin = %origin, error = %err, "undecodable frame");
            return None;
        }
    };

    let mut record = match (frame.endpoints.transport, frame.udp_payload) {
        (Transport::Udp, Some(payload)) => match parse_payload_metadata(payload) {
            Ok(meta) => {
                let mut record = PacketRecord::new(meta.sequence_number, origin);
                record.sequence_embedded = true;
                record.send_time = Some(meta.initial_time);
                record.raw_delay_ms = Some(meta.delay_ms(config.delay_unit));
                record
            }
            Err(err) => {
                debug!(trace.origin = %origin, error = %err, "UDP frame without metadata");
                return None;
            }
        },
        _ => PacketRecord::new(ctx.next_sequence(), origin),
    };

    record.endpoints = Some(frame.endpoints);
    record.forwarding_class = frame.flags.classify();
    record.set_hop_time(Hop::Capture, event.ts);
    Some(record)
}
