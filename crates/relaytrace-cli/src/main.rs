use std::env;
use std::fs::{self, OpenOptions};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use glob::glob;
use relaytrace_core::report::{format_counts_line, format_packet_table, format_summary};
use relaytrace_core::{
    Analysis, AnalysisConfig, AnalysisError, DelayUnit, ForwardingClass, Hop, RunMode,
    SourceError, TraceError, TraceFormat, TracePaths, WrapCorrection, analyze,
};
use tracing::{Level, info};
use tracing_subscriber::{
    EnvFilter, fmt::Layer, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("RELAYTRACE_BUILD_COMMIT"),
    " ",
    env!("RELAYTRACE_BUILD_DATE"),
    ")"
);

const RESULT_FILE: &str = "result.txt";
const LOG_LEVEL_ENV: &str = "RELAYTRACE_LOG_LEVEL";

#[derive(Parser, Debug)]
#[command(name = "relaytrace")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Delay and loss analysis for network-function relocation experiments.",
    long_about = None,
    after_help = "Examples:\n  relaytrace tfm src.pcap dst.pcap --send send.txt\n  relaytrace opennf src.txt dst.txt send.txt --output-dir out\n  relaytrace tfm 'run1/src*.pcap' 'run1/dst*.pcap' --json report.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture-based run: receiver captures carry per-packet metadata.
    Tfm {
        /// Source-hop capture (.pcap/.pcapng) or receiver log (.txt)
        src: PathBuf,

        /// Destination-hop capture (.pcap/.pcapng) or receiver log (.txt)
        dst: PathBuf,

        /// Send-side trace; without it the receiver captures are merged on
        /// their embedded metadata
        #[arg(long)]
        send: Option<PathBuf>,

        /// Companion receiver log for the source hop
        #[arg(long, value_name = "PATH")]
        src_log: Option<PathBuf>,

        /// Companion receiver log for the destination hop
        #[arg(long, value_name = "PATH")]
        dst_log: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Log-based run: three text logs correlated by position.
    Opennf {
        /// Source-hop receiver log
        src: PathBuf,

        /// Destination-hop receiver log
        dst: PathBuf,

        /// Send-side log
        send: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Log every merged record of this forwarding class (empty disables)
    #[arg(long, value_name = "CLASS")]
    debug_class: Option<String>,

    /// Directory receiving result.txt and the per-packet table
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Append to existing output files instead of overwriting them
    #[arg(long)]
    batch: bool,

    /// Also write the JSON report to this path
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(long, requires = "json")]
    pretty: bool,

    /// Period of the embedded delay counter, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000.0)]
    wrap_period: f64,

    /// Delays above this many milliseconds are treated as wrapped
    #[arg(long, value_name = "MS", default_value_t = 900.0)]
    wrap_threshold: f64,

    /// Offset added to recombined extrema of wrapped classes
    #[arg(long, value_name = "MS", default_value_t = 0.05)]
    wrap_epsilon: f64,

    /// Unit of the embedded delay field
    #[arg(long, value_enum, default_value_t = DelayUnitArg::Micros)]
    delay_unit: DelayUnitArg,

    /// Log level (overrides RELAYTRACE_LOG_LEVEL)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<Level>,

    /// Suppress non-error output
    #[arg(long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DelayUnitArg {
    Micros,
    Nanos,
}

impl From<DelayUnitArg> for DelayUnit {
    fn from(value: DelayUnitArg) -> Self {
        match value {
            DelayUnitArg::Micros => DelayUnit::Micros,
            DelayUnitArg::Nanos => DelayUnit::Nanos,
        }
    }
}

impl CommonArgs {
    fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            wrap: WrapCorrection {
                period_ms: self.wrap_period,
                threshold_ms: self.wrap_threshold,
                epsilon_ms: self.wrap_epsilon,
            },
            delay_unit: self.delay_unit.into(),
            ..AnalysisConfig::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Usage errors go to stdout; help and version keep clap's handling.
        Err(err) if err.use_stderr() => {
            print!("{}", err.render());
            return ExitCode::from(2);
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
    };

    let result = match cli.command {
        Commands::Tfm {
            src,
            dst,
            send,
            src_log,
            dst_log,
            common,
        } => {
            let paths = TracePaths {
                src,
                dst,
                send,
                src_log,
                dst_log,
            };
            cmd_analyze(RunMode::Tfm, paths, common)
        }
        Commands::Opennf {
            src,
            dst,
            send,
            common,
        } => cmd_analyze(RunMode::Opennf, TracePaths::new(src, dst).with_send(send), common),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

impl From<AnalysisError> for CliError {
    fn from(err: AnalysisError) -> Self {
        let hint = match &err {
            AnalysisError::Config(_) => "check the --wrap-period/--wrap-threshold/--wrap-epsilon values",
            AnalysisError::EmptyTrace { .. } => {
                "the trace decoded to no records; check it is the right file for this mode"
            }
            AnalysisError::MissingSendTrace => "pass --send, or use two .pcap/.pcapng receiver traces",
            AnalysisError::Trace(TraceError::UnknownFormat { .. }) => {
                "trace file names must contain 'txt' (text log) or 'pcap' (capture)"
            }
            AnalysisError::Trace(TraceError::Source {
                source: SourceError::Io(_),
                ..
            }) => "check the file exists and is readable",
            AnalysisError::Trace(TraceError::Source {
                source: SourceError::Pcap(_),
                ..
            }) => "the capture looks truncated or corrupt",
        };
        CliError::new(err.to_string(), Some(hint.to_string()))
    }
}

fn cmd_analyze(mode: RunMode, paths: TracePaths, common: CommonArgs) -> Result<(), CliError> {
    init_logging(&common);
    let debug_class = parse_debug_class(common.debug_class.as_deref())?;

    let paths = TracePaths {
        src: resolve_trace(&paths.src, mode)?,
        dst: resolve_trace(&paths.dst, mode)?,
        send: paths.send.map(|p| resolve_trace(&p, mode)).transpose()?,
        src_log: paths.src_log.map(|p| resolve_trace(&p, mode)).transpose()?,
        dst_log: paths.dst_log.map(|p| resolve_trace(&p, mode)).transpose()?,
    };

    let analysis = analyze(mode, &paths, &common.analysis_config())?;

    if let Some(class) = debug_class {
        log_class_records(&analysis, class);
    }

    write_results(&analysis, &common.output_dir, common.batch)?;
    if let Some(json_path) = &common.json {
        write_json(&analysis, json_path, common.pretty)?;
    }

    if !common.quiet {
        eprintln!(
            "OK: results written -> {}",
            common.output_dir.join(RESULT_FILE).display()
        );
    }
    Ok(())
}

fn init_logging(common: &CommonArgs) {
    let level = if common.quiet {
        Level::ERROR
    } else {
        common
            .log_level
            .or_else(|| env::var(LOG_LEVEL_ENV).ok()?.parse().ok())
            .unwrap_or(Level::INFO)
    };

    let ansi = std::io::stderr().is_terminal() && env::var("NO_COLOR").is_err();
    let mut fmt_layer = Layer::new()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(ansi);
    if level >= Level::DEBUG {
        fmt_layer = fmt_layer.with_file(true).with_line_number(true);
    }

    let filter = EnvFilter::new(format!("warn,relaytrace_core={level},relaytrace={level}"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn parse_debug_class(raw: Option<&str>) -> Result<Option<ForwardingClass>, CliError> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };
    let class = raw.parse::<ForwardingClass>().map_err(|err| {
        CliError::new(
            err.to_string(),
            Some("use direct, in_flight_redirect or tagged_redirect".to_string()),
        )
    })?;
    Ok(Some(class))
}

fn log_class_records(analysis: &Analysis, class: ForwardingClass) {
    for record in analysis.records_of(class) {
        info!(
            sequence = record.sequence_number,
            class = %class,
            send_time = ?record.send_time,
            capture_time = ?record.hop_time(Hop::Capture),
            log_time = ?record.hop_time(Hop::Log),
            delay_ms = ?record.end_to_end_delay,
            wrapped = record.wrapped,
            "debug class record"
        );
    }
}

fn write_results(analysis: &Analysis, output_dir: &Path, batch: bool) -> Result<(), CliError> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create output directory: {}", output_dir.display())
    })?;

    let mut summary = format_counts_line(&analysis.counts);
    summary.push('\n');
    summary.push_str(&format_summary(&analysis.aggregate));
    write_output(&output_dir.join(RESULT_FILE), &summary, batch)?;

    let table_name = format!("{}_time.txt", analysis.mode.as_str());
    write_output(
        &output_dir.join(table_name),
        &format_packet_table(&analysis.records),
        batch,
    )?;
    Ok(())
}

fn write_output(path: &Path, contents: &str, append: bool) -> Result<(), CliError> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .with_context(|| format!("Failed to open output file: {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    Ok(())
}

fn write_json(analysis: &Analysis, path: &Path, pretty: bool) -> Result<(), CliError> {
    let report = analysis.to_report();
    let json = if pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .context("JSON serialization failed")?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    fs::write(path, json).with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

fn resolve_trace(input: &Path, mode: RunMode) -> Result<PathBuf, CliError> {
    let resolved = resolve_input_path(input)?;
    validate_input_file(&resolved, mode)?;
    Ok(resolved)
}

fn validate_input_file(input: &Path, mode: RunMode) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("check the trace path; patterns must match exactly one file".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("pass a trace file, not a directory".to_string()),
        ));
    }
    if mode == RunMode::Tfm && TraceFormat::from_path(input).is_none() {
        return Err(CliError::new(
            format!("cannot tell the trace format of '{}'", input.display()),
            Some("trace file names must contain 'txt' (text log) or 'pcap' (capture)".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern".to_string()),
        )),
        1 => Ok(matches.remove(0)),
        count => {
            let listed: Vec<String> = matches
                .iter()
                .take(3)
                .map(|p| p.display().to_string())
                .collect();
            let more = if count > 3 { ", ..." } else { "" };
            Err(CliError::new(
                format!(
                    "multiple files match pattern '{}' ({} matches); matches: {}{}",
                    pattern,
                    count,
                    listed.join(", "),
                    more
                ),
                Some("each trace argument must name a single file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
