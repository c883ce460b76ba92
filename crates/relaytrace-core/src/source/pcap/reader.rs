use std::io::{Read, Seek, SeekFrom};

use pcap_parser::Linktype;

use super::error::PcapSourceError;
use super::layout;

/// Container encodings a capture file can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Legacy,
    Ng,
}

impl CaptureKind {
    pub fn from_magic(magic: &[u8; 4]) -> Self {
        if magic == &layout::PCAPNG_MAGIC {
            CaptureKind::Ng
        } else {
            CaptureKind::Legacy
        }
    }
}

/// Peek at the first four bytes, leaving the reader at offset zero.
///
/// # Errors
/// Returns `PcapSourceError::Io` for files shorter than a magic number.
pub fn sniff_kind<R: Read + Seek>(reader: &mut R) -> Result<CaptureKind, PcapSourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(CaptureKind::from_magic(&magic))
}

/// Link type and timestamp scale of one pcapng interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterfaceClock {
    pub linktype: Linktype,
    pub ticks_per_second: f64,
    /// Seconds added to every timestamp (`if_tsoffset`).
    pub offset_seconds: i64,
}

impl Default for InterfaceClock {
    fn default() -> Self {
        Self {
            linktype: Linktype::ETHERNET,
            ticks_per_second: layout::MICROS_PER_SECOND,
            offset_seconds: 0,
        }
    }
}

impl InterfaceClock {
    /// Decode an `if_tsresol` byte: the high bit selects a power of two,
    /// otherwise a power of ten, of the remaining bits.
    pub fn new(linktype: Linktype, tsresol: u8, offset_seconds: i64) -> Self {
        let exponent = i32::from(tsresol & layout::TSRESOL_EXPONENT_MASK);
        let ticks_per_second = if tsresol & layout::TSRESOL_BINARY_FLAG != 0 {
            2f64.powi(exponent)
        } else {
            10f64.powi(exponent)
        };
        Self {
            linktype,
            ticks_per_second,
            offset_seconds,
        }
    }

    pub fn seconds(&self, ts_high: u32, ts_low: u32) -> f64 {
        let ticks = (u64::from(ts_high) << 32) | u64::from(ts_low);
        self.offset_seconds as f64 + ticks as f64 / self.ticks_per_second
    }
}

/// Clock of the interface a packet names; unknown ids fall back to
/// Ethernet with microsecond stamps.
pub fn clock_for_interface(clocks: &[InterfaceClock], if_id: u32) -> InterfaceClock {
    clocks.get(if_id as usize).copied().unwrap_or_default()
}

/// The sub-second field of a legacy record holds nanoseconds when the file
/// magic announced nanosecond precision, microseconds otherwise.
pub fn legacy_ts_to_seconds(ts_sec: u32, ts_frac: u32, nanosecond: bool) -> f64 {
    let scale = if nanosecond {
        layout::NANOS_PER_SECOND
    } else {
        layout::MICROS_PER_SECOND
    };
    f64::from(ts_sec) + f64::from(ts_frac) / scale
}
