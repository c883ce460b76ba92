use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::{ForwardingClass, PacketRecord};

/// Inclusive range of missing sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostRange {
    pub first: u32,
    pub last: u32,
}

impl LostRange {
    pub fn count(&self) -> u64 {
        u64::from(self.last - self.first) + 1
    }
}

impl fmt::Display for LostRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossSummary {
    pub first_sequence: Option<u32>,
    pub last_sequence: Option<u32>,
    pub received: u64,
    pub lost_by_class: BTreeMap<ForwardingClass, u64>,
    pub ranges: Vec<LostRange>,
}

impl LossSummary {
    pub fn lost_total(&self) -> u64 {
        self.lost_by_class.values().sum()
    }

    pub fn lost(&self, class: ForwardingClass) -> u64 {
        self.lost_by_class.get(&class).copied().unwrap_or(0)
    }
}

/// Find gaps in the sequence space of the merged records.
///
/// A lost packet's class cannot be observed, so every gap is charged to the
/// class of the record that follows it. Repeated sequence numbers are not
/// gaps.
pub fn detect_loss(records: &[PacketRecord]) -> LossSummary {
    let mut ordered: Vec<(u32, ForwardingClass)> = records
        .iter()
        .map(|record| (record.sequence_number, record.forwarding_class))
        .collect();
    ordered.sort_by_key(|(sequence, _)| *sequence);

    let mut summary = LossSummary {
        first_sequence: ordered.first().map(|(sequence, _)| *sequence),
        last_sequence: ordered.last().map(|(sequence, _)| *sequence),
        received: ordered.len() as u64,
        ..LossSummary::default()
    };
    for class in ForwardingClass::CLASSIFIED {
        summary.lost_by_class.insert(class, 0);
    }

    for pair in ordered.windows(2) {
        let (previous, _) = pair[0];
        let (next, class) = pair[1];
        if next.saturating_sub(previous) > 1 {
            let range = LostRange {
                first: previous + 1,
                last: next - 1,
            };
            *summary.lost_by_class.entry(class).or_insert(0) += range.count();
            summary.ranges.push(range);
        }
    }
    summary
}
