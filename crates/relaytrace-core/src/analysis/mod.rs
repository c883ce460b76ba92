use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{info, warn};

use crate::config::{AnalysisConfig, ConfigError};
use crate::context::RunContext;
use crate::correlate::{Correlation, Strategy, TraceCounts};
use crate::record::{FlowSet, ForwardingClass, Origin, PacketRecord};
use crate::stats::{Aggregate, aggregate};
use crate::trace::{TraceError, TraceFormat, read_trace, read_trace_auto};
use crate::{DEFAULT_GENERATED_AT, InputInfo, REPORT_VERSION, Report, ToolInfo};

mod opennf;
mod tfm;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error("{origin} trace has zero records: {path}")]
    EmptyTrace { origin: Origin, path: String },
    #[error("without a send trace both receiver traces must be captures")]
    MissingSendTrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Capture-based relocation experiment; sequence numbers come from the
    /// payload metadata.
    Tfm,
    /// Log-based relocation experiment; positional correlation with
    /// baselines.
    Opennf,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Tfm => "tfm",
            RunMode::Opennf => "opennf",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tfm" => Ok(RunMode::Tfm),
            "opennf" => Ok(RunMode::Opennf),
            other => Err(format!("unknown run mode '{other}'")),
        }
    }
}

/// Input paths of one run. `send` is mandatory for `opennf`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TracePaths {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub send: Option<PathBuf>,
    /// Companion receiver log for the source hop.
    pub src_log: Option<PathBuf>,
    /// Companion receiver log for the destination hop.
    pub dst_log: Option<PathBuf>,
}

impl TracePaths {
    pub fn new(src: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            ..Self::default()
        }
    }

    pub fn with_send(mut self, send: impl Into<PathBuf>) -> Self {
        self.send = Some(send.into());
        self
    }
}

/// Everything one run produced, ready for the report writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub mode: RunMode,
    pub config: AnalysisConfig,
    pub inputs: Vec<InputInfo>,
    pub strategy: Strategy,
    pub counts: TraceCounts,
    pub records: Vec<PacketRecord>,
    pub aggregate: Aggregate,
}

impl Analysis {
    /// Merged records of one class, in merged order.
    pub fn records_of(
        &self,
        class: ForwardingClass,
    ) -> impl Iterator<Item = &PacketRecord> + '_ {
        self.records
            .iter()
            .filter(move |record| record.forwarding_class == class)
    }

    pub fn to_report(&self) -> Report {
        let first_send = self.records.iter().find_map(|record| record.send_time);
        Report {
            report_version: REPORT_VERSION,
            tool: ToolInfo {
                name: "relaytrace".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            generated_at: ts_to_rfc3339(first_send)
                .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string()),
            mode: self.mode,
            config: self.config,
            inputs: self.inputs.clone(),
            strategy: self.strategy,
            counts: self.counts.clone(),
            buckets: self.aggregate.buckets.clone(),
            loss: self.aggregate.loss.clone(),
            records: self.records.clone(),
        }
    }
}

/// Run the pipeline for `mode`: read every trace, correlate, aggregate.
pub fn analyze(
    mode: RunMode,
    paths: &TracePaths,
    config: &AnalysisConfig,
) -> Result<Analysis, AnalysisError> {
    config.validate()?;
    let mut run = Run::new(config);
    let correlation = match mode {
        RunMode::Tfm => tfm::correlate(&mut run, paths)?,
        RunMode::Opennf => opennf::correlate(&mut run, paths)?,
    };

    let negative = correlation
        .records
        .iter()
        .filter(|record| record.end_to_end_delay.is_some_and(|delay| delay < 0.0))
        .count();
    if negative > 0 {
        warn!(
            records = negative,
            "negative end-to-end delays, receiver pairing is likely off"
        );
    }

    let aggregate = aggregate(&correlation.records, &config.wrap);
    info!(
        mode = mode.as_str(),
        merged = correlation.records.len(),
        lost = aggregate.loss.lost_total(),
        "analysis complete"
    );

    let Correlation {
        strategy,
        records,
        counts,
    } = correlation;
    Ok(Analysis {
        mode,
        config: *config,
        inputs: run.inputs,
        strategy,
        counts,
        records,
        aggregate,
    })
}

/// Shared state of one pipeline run.
struct Run<'a> {
    config: &'a AnalysisConfig,
    ctx: RunContext,
    inputs: Vec<InputInfo>,
}

impl<'a> Run<'a> {
    fn new(config: &'a AnalysisConfig) -> Self {
        Self {
            config,
            ctx: RunContext::new(),
            inputs: Vec::new(),
        }
    }

    /// Read a trace, inferring its format when `format` is `None`.
    fn read(
        &mut self,
        path: &Path,
        origin: Origin,
        format: Option<TraceFormat>,
    ) -> Result<FlowSet, AnalysisError> {
        let flow = match format {
            Some(format) => read_trace(path, format, origin, self.config, &mut self.ctx)?,
            None => read_trace_auto(path, origin, self.config, &mut self.ctx)?,
        };
        self.inputs.push(InputInfo {
            origin,
            path: path.display().to_string(),
            format: flow.format,
            records: flow.len(),
        });
        Ok(flow)
    }

    /// Like `read`, but a trace without records ends the run.
    fn read_required(
        &mut self,
        path: &Path,
        origin: Origin,
        format: Option<TraceFormat>,
    ) -> Result<FlowSet, AnalysisError> {
        let flow = self.read(path, origin, format)?;
        if flow.is_empty() {
            return Err(AnalysisError::EmptyTrace {
                origin,
                path: path.display().to_string(),
            });
        }
        Ok(flow)
    }
}

fn ts_to_rfc3339(ts: Option<f64>) -> Option<String> {
    let ts = ts?;
    let nanos = (ts * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}
