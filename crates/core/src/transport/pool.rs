use std::collections::HashMap;
use std::io::{self, BufRead, Read};

use parking_lot::Mutex;

/// Default read buffer size for connection readers.
pub const DEFAULT_READER_CAPACITY: usize = 4096;

/// Idle buffers kept per capacity.
pub const DEFAULT_MAX_IDLE: usize = 32;

/// Free list of read buffers, keyed by capacity.
///
/// Connection threads [`acquire`](Self::acquire) a buffered reader over
/// their stream; when the reader is dropped, the buffer (never the
/// stream) goes back on the free list. The lock is only held to push or
/// pop a buffer, never across I/O.
#[derive(Debug)]
pub struct ReaderPool {
    free: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
    max_idle: usize,
}

impl Default for ReaderPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

impl ReaderPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(HashMap::new()),
            max_idle,
        }
    }

    /// Bind a pooled buffer of `capacity` bytes to `inner`.
    pub fn acquire<R: Read>(&self, inner: R, capacity: usize) -> PooledReader<'_, R> {
        let capacity = capacity.max(1);
        let buf = self
            .free
            .lock()
            .get_mut(&capacity)
            .and_then(Vec::pop)
            .unwrap_or_else(|| vec![0u8; capacity]);
        PooledReader {
            inner,
            buf,
            pos: 0,
            filled: 0,
            pool: self,
        }
    }

    /// Number of idle buffers of the given capacity.
    pub fn idle(&self, capacity: usize) -> usize {
        self.free.lock().get(&capacity).map_or(0, Vec::len)
    }

    fn release(&self, buf: Vec<u8>) {
        if buf.is_empty() {
            return;
        }
        let mut free = self.free.lock();
        let list = free.entry(buf.len()).or_default();
        if list.len() < self.max_idle {
            list.push(buf);
        }
    }
}

/// Buffered reader borrowing its buffer from a [`ReaderPool`].
///
/// Behaves like [`std::io::BufReader`]. Read position and fill level live
/// here, not in the pooled buffer, so a recycled buffer never exposes a
/// previous connection's bytes.
pub struct PooledReader<'p, R: Read> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    pool: &'p ReaderPool,
}

impl<R: Read> PooledReader<'_, R> {
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Bytes read from the stream but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.filled - self.pos
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<R: Read> Read for PooledReader<'_, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        // Large reads skip the buffer once it is drained.
        if self.pos == self.filled && out.len() >= self.buf.len() {
            return self.inner.read(out);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for PooledReader<'_, R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.filled {
            self.filled = self.inner.read(&mut self.buf)?;
            self.pos = 0;
        }
        Ok(&self.buf[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.filled);
    }
}

impl<R: Read> Drop for PooledReader<'_, R> {
    fn drop(&mut self) {
        self.pos = 0;
        self.filled = 0;
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn buffers_are_reused_per_capacity() {
        let pool = ReaderPool::default();
        assert_eq!(pool.idle(16), 0);
        {
            let _reader = pool.acquire(Cursor::new(b"abc".to_vec()), 16);
            assert_eq!(pool.idle(16), 0);
        }
        assert_eq!(pool.idle(16), 1);

        let reader = pool.acquire(Cursor::new(Vec::new()), 16);
        assert_eq!(reader.capacity(), 16);
        assert_eq!(pool.idle(16), 0);
        drop(reader);

        let _other = pool.acquire(Cursor::new(Vec::new()), 32);
        assert_eq!(pool.idle(16), 1);
    }

    #[test]
    fn recycled_buffer_starts_empty() {
        let pool = ReaderPool::default();
        {
            let mut first = pool.acquire(Cursor::new(b"first connection".to_vec()), 8);
            assert_eq!(first.fill_buf().unwrap(), b"first co");
        }
        let mut second = pool.acquire(Cursor::new(b"xy".to_vec()), 8);
        assert_eq!(second.buffered(), 0);
        assert_eq!(second.fill_buf().unwrap(), b"xy");
        second.consume(2);
        assert_eq!(second.fill_buf().unwrap(), b"");
    }

    #[test]
    fn reads_through_small_and_large_buffers() {
        let pool = ReaderPool::default();
        let data: Vec<u8> = (0..100u8).collect();
        let mut reader = pool.acquire(Cursor::new(data.clone()), 8);

        let mut line = Vec::new();
        reader.read_until(9, &mut line).unwrap();
        assert_eq!(line, (0..10u8).collect::<Vec<_>>());

        let mut rest = vec![0u8; 90];
        reader.read_exact(&mut rest).unwrap();
        assert_eq!(rest, data[10..]);
    }

    #[test]
    fn idle_list_is_bounded() {
        let pool = ReaderPool::new(1);
        let a = pool.acquire(Cursor::new(Vec::new()), 4);
        let b = pool.acquire(Cursor::new(Vec::new()), 4);
        drop(a);
        drop(b);
        assert_eq!(pool.idle(4), 1);
    }
}
