pub const SEQUENCE_RANGE: std::ops::Range<usize> = 0..4;
pub const INIT_SECONDS_RANGE: std::ops::Range<usize> = 4..8;
pub const INIT_NANOS_RANGE: std::ops::Range<usize> = 8..12;
// 12..16 is written by the sender but carries nothing we use.
pub const DELAY_RANGE: std::ops::Range<usize> = 16..20;

pub const MIN_LEN: usize = DELAY_RANGE.end;
pub const NANOS_PER_SECOND: f64 = 1e9;
