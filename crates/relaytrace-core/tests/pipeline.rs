use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use etherparse::PacketBuilder;
use relaytrace_core::{
    AnalysisConfig, AnalysisError, ForwardingClass, RunMode, SourceError, Strategy, TraceError,
    TracePaths, analyze,
};

const BASE_SECONDS: u32 = 1_400_000_000;

struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    fn new(tag: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("relaytrace_{tag}_{unique}"));
        fs::create_dir_all(&dir).unwrap();
        Self { dir }
    }

    fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn send_log(count: u32) -> String {
    (1..=count)
        .map(|i| format!("12:00:pkt send time: {BASE_SECONDS} {}00000us\n", i))
        .collect()
}

/// Ethernet/IPv4/UDP frame carrying relocation metadata.
fn metadata_frame(seq: u32, send_tenths: u32, delay_us: u32, tos: bool, marker: bool) -> Vec<u8> {
    let mut payload = vec![0u8; 24];
    payload[0..4].copy_from_slice(&seq.to_be_bytes());
    payload[4..8].copy_from_slice(&BASE_SECONDS.to_be_bytes());
    payload[8..12].copy_from_slice(&(send_tenths * 100_000_000).to_be_bytes());
    payload[16..20].copy_from_slice(&delay_us.to_be_bytes());

    let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
        .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
        .udp(5000, 6000);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, &payload).unwrap();
    if tos {
        frame[14 + 1] |= 0x01;
    }
    if marker {
        frame[14 + 6] |= 0x80;
    }
    frame
}

/// Ethernet/IPv4/TCP segment with no relocation metadata.
fn tcp_frame() -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
        .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
        .tcp(40_000, 80, 7, 1024);
    let mut frame = Vec::with_capacity(builder.size(0));
    builder.write(&mut frame, &[]).unwrap();
    frame
}

/// Little-endian legacy pcap, Ethernet link type, microsecond stamps.
fn legacy_pcap(frames: &[(u32, u32, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&65_535u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    for (secs, micros, frame) in frames {
        out.extend_from_slice(&secs.to_le_bytes());
        out.extend_from_slice(&micros.to_le_bytes());
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        out.extend_from_slice(frame);
    }
    out
}

#[test]
fn tfm_run_correlates_captures_by_sequence() {
    let scratch = Scratch::new("tfm");
    let send = scratch.write("send.txt", send_log(5).as_bytes());
    let src = scratch.write(
        "src.pcap",
        &legacy_pcap(&[
            (BASE_SECONDS, 110_000, metadata_frame(1, 1, 10_000, false, false)),
            (BASE_SECONDS, 210_000, metadata_frame(2, 2, 10_000, false, false)),
        ]),
    );
    let dst = scratch.write(
        "dst.pcap",
        &legacy_pcap(&[
            (BASE_SECONDS, 420_000, metadata_frame(4, 4, 990_000, true, true)),
            (BASE_SECONDS, 520_000, metadata_frame(5, 5, 995_000, true, true)),
        ]),
    );

    let paths = TracePaths::new(&src, &dst).with_send(&send);
    let analysis = analyze(RunMode::Tfm, &paths, &AnalysisConfig::default()).unwrap();

    assert_eq!(analysis.strategy, Strategy::Sequence);
    assert_eq!(analysis.counts.send, 5);
    assert_eq!(analysis.counts.unmatched_send, 1);
    let seqs: Vec<u32> = analysis.records.iter().map(|r| r.sequence_number).collect();
    assert_eq!(seqs, vec![1, 2, 4, 5]);

    let direct = analysis.aggregate.bucket(ForwardingClass::Direct).unwrap();
    assert_eq!(direct.count, 2);
    assert_eq!(direct.lost_count, 0);
    assert!((direct.end_to_end.average.unwrap() - 10.0).abs() < 1e-6);

    let tagged = analysis
        .aggregate
        .bucket(ForwardingClass::TaggedRedirect)
        .unwrap();
    assert_eq!(tagged.count, 2);
    assert_eq!(tagged.lost_count, 1);
    assert!(tagged.end_to_end.wrap_corrected);
    assert!((tagged.end_to_end.min.unwrap() - 5.05).abs() < 1e-6);
    assert!((tagged.end_to_end.max.unwrap() - 10.05).abs() < 1e-6);

    assert!(
        analysis
            .records
            .iter()
            .all(|r| r.end_to_end_delay.unwrap() >= 0.0)
    );
    assert_eq!(analysis.inputs.len(), 3);
}

#[test]
fn tfm_sequence_run_ignores_frames_without_metadata() {
    let scratch = Scratch::new("tfm_mixed");
    let send = scratch.write("send.txt", send_log(2).as_bytes());
    let src = scratch.write(
        "src.pcap",
        &legacy_pcap(&[
            (BASE_SECONDS - 1, 0, tcp_frame()),
            (BASE_SECONDS, 105_000, metadata_frame(1, 1, 5_000, false, false)),
            (BASE_SECONDS, 210_000, tcp_frame()),
        ]),
    );
    let dst = scratch.write(
        "dst.pcap",
        &legacy_pcap(&[
            (BASE_SECONDS - 2, 0, tcp_frame()),
            (BASE_SECONDS, 215_000, metadata_frame(2, 2, 15_000, false, false)),
        ]),
    );

    let paths = TracePaths::new(&src, &dst).with_send(&send);
    let analysis = analyze(RunMode::Tfm, &paths, &AnalysisConfig::default()).unwrap();

    assert_eq!(analysis.strategy, Strategy::Sequence);
    assert_eq!(analysis.counts.duplicates, 0);
    assert_eq!(analysis.counts.unsequenced, 3);
    let seqs: Vec<u32> = analysis.records.iter().map(|r| r.sequence_number).collect();
    assert_eq!(seqs, vec![1, 2]);
    assert!(analysis.records.iter().all(|r| r.sequence_embedded));
    assert!(
        analysis
            .records
            .iter()
            .all(|r| r.end_to_end_delay.is_some_and(|d| d >= 0.0))
    );
    assert!((analysis.records[0].end_to_end_delay.unwrap() - 5.0).abs() < 1e-6);
}

#[test]
fn tfm_run_without_send_trace_merges_receivers() {
    let scratch = Scratch::new("tfm_union");
    let src = scratch.write(
        "src.pcap",
        &legacy_pcap(&[(BASE_SECONDS, 110_000, metadata_frame(1, 1, 10_000, false, false))]),
    );
    let dst = scratch.write(
        "dst.pcap",
        &legacy_pcap(&[(BASE_SECONDS, 220_000, metadata_frame(2, 2, 20_000, false, true))]),
    );

    let paths = TracePaths::new(&src, &dst);
    let analysis = analyze(RunMode::Tfm, &paths, &AnalysisConfig::default()).unwrap();
    assert_eq!(analysis.records.len(), 2);
    assert_eq!(
        analysis.records[1].forwarding_class,
        ForwardingClass::InFlightRedirect
    );
    assert_eq!(analysis.counts.send, 0);
}

#[test]
fn opennf_run_pairs_logs_by_position() {
    let scratch = Scratch::new("opennf");
    let send = scratch.write("send.txt", send_log(6).as_bytes());
    let src = scratch.write(
        "src.txt",
        b"1,1399999999.000000,0\n\
          1,1400000000.110000,0\n\
          2,1400000000.210000,0\n\
          3,1400000000.310000,0\n",
    );
    let dst = scratch.write(
        "dst.txt",
        b"9,1400000000.350000,1\n\
          4,1400000000.420000,1\n\
          5,1400000000.520000,2\n\
          6,1400000000.620000,0\n",
    );

    let paths = TracePaths::new(&src, &dst).with_send(&send);
    let analysis = analyze(RunMode::Opennf, &paths, &AnalysisConfig::default()).unwrap();

    assert_eq!(analysis.strategy, Strategy::Positional);
    assert_eq!(analysis.counts.send, 6);
    assert_eq!(analysis.counts.src, 3);
    assert_eq!(analysis.counts.dst, 3);
    assert_eq!(analysis.records.len(), 6);

    let direct = analysis.aggregate.bucket(ForwardingClass::Direct).unwrap();
    assert_eq!(direct.count, 4);
    let infly = analysis
        .aggregate
        .bucket(ForwardingClass::InFlightRedirect)
        .unwrap();
    assert_eq!(infly.count, 1);
    assert!((infly.end_to_end.min.unwrap() - 20.0).abs() < 1e-3);
    assert_eq!(analysis.aggregate.loss.lost_total(), 0);
}

#[test]
fn empty_destination_trace_aborts_the_run() {
    let scratch = Scratch::new("empty");
    let send = scratch.write("send.txt", send_log(2).as_bytes());
    let src = scratch.write("src.txt", b"1,1400000000.110000,0\n");
    let dst = scratch.write("dst.txt", b"");

    let paths = TracePaths::new(&src, &dst).with_send(&send);
    let err = analyze(RunMode::Opennf, &paths, &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, AnalysisError::EmptyTrace { .. }));
    assert!(err.to_string().contains("zero records"));
}

#[test]
fn missing_trace_file_is_an_io_error() {
    let scratch = Scratch::new("missing");
    let send = scratch.write("send.txt", send_log(2).as_bytes());
    let paths = TracePaths::new(scratch.dir.join("nope.txt"), scratch.dir.join("dst.txt"))
        .with_send(&send);
    let err = analyze(RunMode::Opennf, &paths, &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Trace(TraceError::Source {
            source: SourceError::Io(_),
            ..
        })
    ));
}

#[test]
fn invalid_wrap_configuration_is_rejected_before_reading() {
    let mut config = AnalysisConfig::default();
    config.wrap.threshold_ms = 2000.0;
    let paths = TracePaths::new("missing-src.pcap", "missing-dst.pcap");
    let err = analyze(RunMode::Tfm, &paths, &config).unwrap_err();
    assert!(matches!(err, AnalysisError::Config(_)));
}
