//! Growable byte buffers backing the two halves of a connection.
//!
//! An [`IoBuf`] keeps an explicit split between `len` (bytes in use) and
//! `size` (bytes allocated). The distinction matters to the file pump, which
//! reads from disk straight into the spare region `len..size` and advances
//! `len` by whatever arrived, so `len <= size` is the one invariant enforced
//! here.

use crate::IO_SIZE;
use bstr::ByteSlice;
use std::fmt;

pub struct IoBuf {
    buf: Vec<u8>,
    len: usize,
}

impl Default for IoBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBuf {
    pub fn new() -> Self {
        IoBuf {
            buf: Vec::new(),
            len: 0,
        }
    }

    /// Bytes in use.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes allocated.
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Grows or shrinks the allocation to exactly `size`, truncating the
    /// used region if it no longer fits.
    pub fn resize(&mut self, size: usize) {
        self.buf.resize(size, 0);
        if self.len > size {
            self.len = size;
        }
    }

    /// Appends `data`, growing the allocation in [`IO_SIZE`] steps.
    pub fn add(&mut self, data: &[u8]) {
        let need = self.len + data.len();
        if need > self.size() {
            let rounded = (need + IO_SIZE - 1) / IO_SIZE * IO_SIZE;
            self.resize(rounded);
        }
        self.buf[self.len..need].copy_from_slice(data);
        self.len = need;
    }

    /// Removes the first `n` used bytes, shifting the remainder down.
    pub fn delete(&mut self, n: usize) {
        let n = n.min(self.len);
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// Discards all used bytes; the allocation is kept.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The used region.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Mutable view of the used region, for in-place patching.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }

    /// The unused region `len..size` the file pump refills into.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.buf[len..]
    }

    /// Marks `n` spare bytes as used after an external write into
    /// [`spare_mut`](Self::spare_mut).
    pub fn extend_used(&mut self, n: usize) {
        debug_assert!(self.len + n <= self.size());
        self.len += n;
    }
}

impl fmt::Debug for IoBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoBuf")
            .field("len", &self.len)
            .field("size", &self.size())
            .field("data", &self.as_slice().as_bstr())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_add_and_delete() {
        let mut io = IoBuf::new();
        io.add(b"hello ");
        io.add(b"world");
        assert_eq!(io.as_slice(), b"hello world");
        assert_eq!(io.size(), IO_SIZE);
        io.delete(6);
        assert_eq!(io.as_slice(), b"world");
        io.delete(100);
        assert!(io.is_empty());
    }

    #[test]
    fn test_growth_granularity() {
        let mut io = IoBuf::new();
        io.add(&vec![0u8; IO_SIZE + 1]);
        assert_eq!(io.size(), 2 * IO_SIZE);
        assert_eq!(io.len(), IO_SIZE + 1);
    }

    #[test]
    fn test_resize_truncates() {
        let mut io = IoBuf::new();
        io.add(b"abcdef");
        io.resize(3);
        assert_eq!(io.as_slice(), b"abc");
        assert_eq!(io.size(), 3);
    }

    #[test]
    fn test_spare_window() {
        let mut io = IoBuf::new();
        io.resize(8);
        io.add(b"ab");
        let spare = io.spare_mut();
        spare[0] = b'c';
        io.extend_used(1);
        assert_eq!(io.as_slice(), b"abc");
        assert!(io.len() <= io.size());
    }
}
