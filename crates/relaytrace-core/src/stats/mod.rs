//! Statistics aggregator.
//!
//! One pass over the merged records fills one bucket per forwarding class
//! with count and min/max/sum/average for each delay measure, then charges
//! sequence gaps to classes. Buckets are not touched after `aggregate`
//! returns.

mod loss;

pub use loss::{LossSummary, LostRange, detect_loss};

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::WrapCorrection;
use crate::record::{ForwardingClass, Hop, PacketRecord};

/// Delay measurements tracked per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayKind {
    EndToEnd,
    CaptureHop,
    LogHop,
}

impl DelayKind {
    pub const ALL: [DelayKind; 3] = [DelayKind::EndToEnd, DelayKind::CaptureHop, DelayKind::LogHop];

    pub fn as_str(self) -> &'static str {
        match self {
            DelayKind::EndToEnd => "end_to_end",
            DelayKind::CaptureHop => "capture_hop",
            DelayKind::LogHop => "log_hop",
        }
    }

    fn sample(self, record: &PacketRecord) -> Option<f64> {
        match self {
            DelayKind::EndToEnd => record.end_to_end_delay,
            DelayKind::CaptureHop => record.hop_delay(Hop::Capture),
            DelayKind::LogHop => record.hop_delay(Hop::Log),
        }
    }
}

impl fmt::Display for DelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extremes and mean of one delay measure; all `None` without samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelayStats {
    pub samples: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub sum: f64,
    pub average: Option<f64>,
    /// Set when the extremes were recombined by wrap correction.
    pub wrap_corrected: bool,
}

impl DelayStats {
    fn push(&mut self, value: f64) {
        self.samples += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
    }

    fn finish(&mut self) {
        self.average = (self.samples > 0).then(|| self.sum / self.samples as f64);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBucket {
    pub class: ForwardingClass,
    pub count: u64,
    pub end_to_end: DelayStats,
    pub capture_hop: DelayStats,
    pub log_hop: DelayStats,
    pub lost_count: u64,
}

impl AggregateBucket {
    fn new(class: ForwardingClass) -> Self {
        Self {
            class,
            count: 0,
            end_to_end: DelayStats::default(),
            capture_hop: DelayStats::default(),
            log_hop: DelayStats::default(),
            lost_count: 0,
        }
    }

    pub fn delay(&self, kind: DelayKind) -> &DelayStats {
        match kind {
            DelayKind::EndToEnd => &self.end_to_end,
            DelayKind::CaptureHop => &self.capture_hop,
            DelayKind::LogHop => &self.log_hop,
        }
    }

    fn delay_mut(&mut self, kind: DelayKind) -> &mut DelayStats {
        match kind {
            DelayKind::EndToEnd => &mut self.end_to_end,
            DelayKind::CaptureHop => &mut self.capture_hop,
            DelayKind::LogHop => &mut self.log_hop,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub buckets: Vec<AggregateBucket>,
    pub loss: LossSummary,
}

impl Aggregate {
    pub fn bucket(&self, class: ForwardingClass) -> Option<&AggregateBucket> {
        self.buckets.iter().find(|bucket| bucket.class == class)
    }
}

/// End-to-end delays as the payload reported them, reduced into the wrap
/// period but not flipped.
#[derive(Debug, Default)]
struct RawDelays {
    stats: DelayStats,
    wrapped: bool,
}

pub fn aggregate(records: &[PacketRecord], wrap: &WrapCorrection) -> Aggregate {
    let mut buckets: Vec<AggregateBucket> = ForwardingClass::CLASSIFIED
        .iter()
        .map(|class| AggregateBucket::new(*class))
        .collect();
    let mut raw: Vec<RawDelays> = ForwardingClass::CLASSIFIED
        .iter()
        .map(|_| RawDelays::default())
        .collect();

    let mut classified = Vec::with_capacity(records.len());
    for record in records {
        let Some(slot) = class_slot(record.forwarding_class) else {
            warn!(
                sequence = record.sequence_number,
                "unclassified record reached the aggregator, ignoring"
            );
            continue;
        };
        classified.push(record.clone());

        let bucket = &mut buckets[slot];
        bucket.count += 1;
        for kind in DelayKind::ALL {
            if let Some(value) = kind.sample(record) {
                bucket.delay_mut(kind).push(value);
            }
        }
        if let Some(delay) = record.raw_delay_ms {
            raw[slot].stats.push(wrap.reduce(delay));
            raw[slot].wrapped |= record.wrapped;
        }
    }

    for (bucket, raw) in buckets.iter_mut().zip(raw.iter_mut()) {
        for kind in DelayKind::ALL {
            bucket.delay_mut(kind).finish();
        }
        raw.stats.finish();
        if raw.wrapped {
            recombine_wrapped(&mut bucket.end_to_end, &raw.stats, wrap);
        }
        if bucket.is_empty() {
            info!(class = %bucket.class, "no records for class");
        }
    }

    let loss = detect_loss(&classified);
    for bucket in &mut buckets {
        bucket.lost_count = loss.lost(bucket.class);
    }

    Aggregate { buckets, loss }
}

/// Treat the whole class as having wrapped: the extremes swap roles under
/// `period - value`, and epsilon keeps the floor off zero. This is a
/// heuristic, not an exact unwrap; a class mixing wrapped and unwrapped
/// samples gets a wide range.
fn recombine_wrapped(stats: &mut DelayStats, raw: &DelayStats, wrap: &WrapCorrection) {
    let (Some(raw_min), Some(raw_max), Some(raw_average)) = (raw.min, raw.max, raw.average) else {
        return;
    };
    stats.min = Some(wrap.period_ms - raw_max + wrap.epsilon_ms);
    stats.max = Some(wrap.period_ms - raw_min + wrap.epsilon_ms);
    let average = wrap.period_ms - raw_average + wrap.epsilon_ms;
    stats.average = Some(average);
    stats.sum = average * stats.samples as f64;
    stats.wrap_corrected = true;
}

fn class_slot(class: ForwardingClass) -> Option<usize> {
    ForwardingClass::CLASSIFIED
        .iter()
        .position(|candidate| *candidate == class)
}
