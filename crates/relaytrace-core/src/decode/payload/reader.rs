use super::error::PayloadError;

pub struct PayloadReader<'a> {
    payload: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), PayloadError> {
        if self.payload.len() < needed {
            return Err(PayloadError::TooShort {
                needed,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], PayloadError> {
        self.payload.get(range.clone()).ok_or(PayloadError::TooShort {
            needed: range.end,
            actual: self.payload.len(),
        })
    }

    pub fn read_u32_be(&self, range: std::ops::Range<usize>) -> Result<u32, PayloadError> {
        let bytes: [u8; 4] = self
            .read_slice(range)?
            .try_into()
            .map_err(|_| PayloadError::TooShort {
                needed: 4,
                actual: self.payload.len(),
            })?;
        Ok(u32::from_be_bytes(bytes))
    }
}
