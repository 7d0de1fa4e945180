//! Source buffers
//!
//! A [`SourceBuffer`] owns the bytes of one source or scratch file. The
//! contents are always followed by a NUL sentinel so scanners can probe
//! one byte past the logical end without a bounds check.

use std::fs;
use std::io::Read;

use crate::{SourceError, BasicResult};

/// An immutable (or, for scratch chunks, append-written) byte buffer
/// holding one source file plus a trailing NUL sentinel.
///
/// The logical contents are `bytes()`; `bytes_with_sentinel()` exposes
/// one extra `0` byte past the end.
#[derive(Debug)]
pub struct SourceBuffer {
    name: String,
    /// Logical contents plus one trailing NUL.
    data: Box<[u8]>,
    /// Only scratch chunks are created writable.
    writable: bool,
}

impl SourceBuffer {
    /// Copy the caller's bytes into a fresh buffer.
    pub fn from_bytes(bytes: &[u8], name: impl Into<String>) -> Self {
        let mut data = Vec::with_capacity(bytes.len() + 1);
        data.extend_from_slice(bytes);
        data.push(0);
        Self {
            name: name.into(),
            data: data.into_boxed_slice(),
            writable: false,
        }
    }

    /// Read a file from disk into a heap buffer.
    pub fn from_file(path: &str) -> BasicResult<Self> {
        let bytes = fs::read(path).map_err(|e| SourceError::Read {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_bytes(&bytes, path))
    }

    /// Read standard input to exhaustion; the buffer is named `<stdin>`.
    pub fn from_stdin() -> BasicResult<Self> {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .map_err(|e| SourceError::Stdin {
                reason: e.to_string(),
            })?;
        Ok(Self::from_bytes(&bytes, "<stdin>"))
    }

    /// Allocate `size` zeroed bytes to be filled later (scratch chunks).
    pub fn new_zeroed(size: usize, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: vec![0u8; size + 1].into_boxed_slice(),
            writable: true,
        }
    }

    /// The identifier of this buffer: a filename or a synthetic tag such
    /// as `<scratch space>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical contents, without the sentinel.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.data.len() - 1]
    }

    /// Contents plus the trailing NUL sentinel.
    pub fn bytes_with_sentinel(&self) -> &[u8] {
        &self.data
    }

    /// Logical size in bytes.
    pub fn len(&self) -> usize {
        self.data.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Overwrite part of a writable (scratch) buffer.
    ///
    /// Panics on non-writable buffers and on out-of-range writes; both
    /// indicate a scratch-buffer bookkeeping bug.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        assert!(self.writable, "write into immutable source buffer");
        assert!(
            offset + bytes.len() <= self.len(),
            "scratch write past end of buffer"
        );
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}
