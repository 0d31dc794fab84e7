//! Forward-only splitting of a byte stream into frame records.

use bytes::{Bytes, BytesMut};
use std::io::{ErrorKind, Read};

use crate::frame::FRAME_DELIMITER;
use crate::{Error, Result};

/// Maximum allowed record size (1 MiB, delimiter included) to bound buffering
/// on malformed input.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

const READ_CHUNK: usize = 64 * 1024;

/// Splits a reader into records, each ending with [`FRAME_DELIMITER`].
///
/// Records are produced lazily, one per call, and the scanner cannot be
/// rewound. Bytes left over at end of input without a terminating delimiter
/// are dropped rather than returned as a record.
///
/// # Example
///
/// ```
/// use moshpit_avi::FrameScanner;
///
/// let data = b"header00dcframe00dctrailing".as_slice();
/// let records: Vec<_> = FrameScanner::new(data).collect::<Result<_, _>>()?;
/// assert_eq!(records.len(), 2);
/// assert_eq!(&records[1][..], b"frame00dc");
/// # Ok::<(), moshpit_avi::Error>(())
/// ```
pub struct FrameScanner<R> {
    reader: R,
    buf: BytesMut,
    /// Position in `buf` before which no delimiter can start.
    searched: usize,
    eof: bool,
    done: bool,
    max_frame_bytes: usize,
    records: u64,
}

impl<R: Read> FrameScanner<R> {
    /// Create a scanner with the default [`MAX_FRAME_BYTES`] limit.
    pub fn new(reader: R) -> Self {
        Self::with_max_frame_bytes(reader, MAX_FRAME_BYTES)
    }

    /// Create a scanner with a custom record size limit.
    pub fn with_max_frame_bytes(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK),
            searched: 0,
            eof: false,
            done: false,
            max_frame_bytes,
            records: 0,
        }
    }

    /// Number of records produced so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Return the next complete record, or `None` once the input is exhausted.
    ///
    /// # Errors
    ///
    /// - [`Error::FrameTooLarge`] if a record would exceed the size limit.
    /// - [`Error::Io`] if reading fails.
    ///
    /// After an error the scanner is finished and yields `None`.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }
        let result = self.scan();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn scan(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(pos) = find_delimiter(&self.buf[self.searched..]) {
                let end = self.searched + pos + FRAME_DELIMITER.len();
                if end > self.max_frame_bytes {
                    return Err(Error::frame_too_large(end, self.max_frame_bytes));
                }
                self.searched = 0;
                self.records += 1;
                return Ok(Some(self.buf.split_to(end).freeze()));
            }

            // A delimiter may straddle the next read boundary.
            self.searched = self
                .buf
                .len()
                .saturating_sub(FRAME_DELIMITER.len() - 1);

            if self.buf.len() >= self.max_frame_bytes {
                return Err(Error::frame_too_large(self.buf.len(), self.max_frame_bytes));
            }

            if self.eof {
                if !self.buf.is_empty() {
                    tracing::debug!(
                        bytes = self.buf.len(),
                        records = self.records,
                        "discarding unterminated trailing data"
                    );
                    self.buf.clear();
                }
                return Ok(None);
            }

            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<()> {
        let start = self.buf.len();
        self.buf.resize(start + READ_CHUNK, 0);
        loop {
            match self.reader.read(&mut self.buf[start..]) {
                Ok(n) => {
                    self.buf.truncate(start + n);
                    if n == 0 {
                        self.eof = true;
                    }
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(e.into());
                }
            }
        }
    }
}

impl<R: Read> Iterator for FrameScanner<R> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(FRAME_DELIMITER.len())
        .position(|w| w == FRAME_DELIMITER)
}
