use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::error::{LogError, Result};

/// Open a log file, treating "not found" as "no log yet"
pub(crate) fn open_log(path: &Path) -> Result<Option<BufReader<File>>> {
    match File::open(path) {
        Ok(file) => Ok(Some(BufReader::new(file))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LogError::io(path, e)),
    }
}

/// Iterator over `(line_num, line)` pairs with 1-based raw line numbers
///
/// Every raw line is counted, blank or not, so numbers stay stable across
/// repeated reads of a growing file. Invalid UTF-8 is replaced, never fatal.
pub(crate) struct NumberedLines<R> {
    reader: R,
    buf: Vec<u8>,
    line_num: u64,
}

impl<R: BufRead> NumberedLines<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
            line_num: 0,
        }
    }
}

impl<R: BufRead> Iterator for NumberedLines<R> {
    type Item = io::Result<(u64, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_num += 1;
                let line = String::from_utf8_lossy(&self.buf).trim_end().to_string();
                Some(Ok((self.line_num, line)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
