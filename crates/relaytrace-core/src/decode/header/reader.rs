use super::error::HeaderError;
use super::layout;

/// Bounds-checked access to a raw header or transport segment.
pub struct HeaderReader<'a> {
    bytes: &'a [u8],
}

impl<'a> HeaderReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, HeaderError> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or(HeaderError::TooShort {
                needed: offset + 1,
                actual: self.bytes.len(),
            })
    }

    pub fn bit_set(&self, offset: usize, mask: u8) -> Result<bool, HeaderError> {
        Ok(self.read_u8(offset)? & mask != 0)
    }

    pub fn udp_payload(&self) -> Result<&'a [u8], HeaderError> {
        self.bytes
            .get(layout::UDP_HEADER_LEN..)
            .ok_or(HeaderError::TooShort {
                needed: layout::UDP_HEADER_LEN,
                actual: self.bytes.len(),
            })
    }
}
