use std::cmp::min;
use std::io::{Error, ErrorKind, Read, Result};

/// A reader over a fixed buffer that can hand its bytes out in small chunks, be interrupted,
/// or fail part-way through.
pub struct MockStream {
    read_buf: Vec<u8>,
    read_pos: usize,
    chunk_size: usize,
    interrupt: bool,
    err_after: Option<usize>,
}

impl Default for MockStream {
    fn default() -> Self {
        MockStream {
            read_buf: Vec::new(),
            read_pos: 0,
            chunk_size: usize::MAX,
            interrupt: false,
            err_after: None,
        }
    }
}

impl MockStream {
    pub fn new(read_buf: Vec<u8>) -> MockStream {
        MockStream::default().with_buf(read_buf)
    }

    pub fn with_buf(mut self, read_buf: Vec<u8>) -> MockStream {
        self.read_buf = read_buf;
        self
    }

    /// Never return more than `size` bytes from one read.
    pub fn with_chunk_size(mut self, size: usize) -> MockStream {
        self.chunk_size = size;
        self
    }

    /// Fail the first read with `Interrupted`.
    pub fn with_interrupt(mut self) -> MockStream {
        self.interrupt = true;
        self
    }

    /// Fail every read once `n` bytes have been handed out.
    pub fn with_err_after(mut self, n: usize) -> MockStream {
        self.err_after = Some(n);
        self
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.interrupt {
            self.interrupt = false;
            return Err(Error::new(ErrorKind::Interrupted, "MockStream interrupted"));
        }
        let mut end = self.read_buf.len();
        if let Some(n) = self.err_after {
            if self.read_pos >= n {
                return Err(Error::new(ErrorKind::Other, "MockStream Error"));
            }
            end = min(end, n);
        }
        let write_len = min(min(buf.len(), self.chunk_size), end - self.read_pos);
        buf[..write_len].copy_from_slice(&self.read_buf[self.read_pos..self.read_pos + write_len]);
        self.read_pos += write_len;
        Ok(write_len)
    }
}
