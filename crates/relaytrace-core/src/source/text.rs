use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{LineSource, SourceError};

/// Line-oriented text log.
///
/// Lines are decoded lossily so a stray non-UTF-8 byte only spoils the line
/// it sits on; trailing `\r\n` / `\n` are stripped.
pub struct TextSource<R> {
    reader: R,
    buf: Vec<u8>,
}

impl TextSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TextSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> LineSource for TextSource<R> {
    fn next_line(&mut self) -> Result<Option<String>, SourceError> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
