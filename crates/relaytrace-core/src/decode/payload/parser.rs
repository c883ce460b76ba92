use crate::config::DelayUnit;

use super::error::PayloadError;
use super::layout;
use super::reader::PayloadReader;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayloadMetadata {
    pub sequence_number: u32,
    /// Send timestamp in seconds.
    pub initial_time: f64,
    /// Delay counter as written by the sender, in `DelayUnit`s.
    pub raw_delay: u32,
}

impl PayloadMetadata {
    pub fn delay_ms(&self, unit: DelayUnit) -> f64 {
        self.raw_delay as f64 / unit.units_per_ms()
    }
}

pub fn parse_payload_metadata(payload: &[u8]) -> Result<PayloadMetadata, PayloadError> {
    let reader = PayloadReader::new(payload);
    reader.require_len(layout::MIN_LEN)?;

    let sequence_number = reader.read_u32_be(layout::SEQUENCE_RANGE)?;
    let seconds = reader.read_u32_be(layout::INIT_SECONDS_RANGE)?;
    let nanos = reader.read_u32_be(layout::INIT_NANOS_RANGE)?;
    let raw_delay = reader.read_u32_be(layout::DELAY_RANGE)?;

    Ok(PayloadMetadata {
        sequence_number,
        initial_time: seconds as f64 + nanos as f64 / layout::NANOS_PER_SECOND,
        raw_delay,
    })
}
