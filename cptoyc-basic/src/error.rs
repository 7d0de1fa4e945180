//! Error types for the basic layer

use thiserror::Error;

/// Failures while loading source bytes into a buffer.
///
/// Lexical problems are not errors in this sense; they flow through the
/// [`DiagnosticsEngine`](crate::DiagnosticsEngine) and lexing continues.
/// A `SourceError` aborts the translation unit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("cannot read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("cannot read standard input: {reason}")]
    Stdin { reason: String },
}

/// Failures while loading a header map file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HeaderMapError {
    #[error("header map {path} is truncated")]
    Truncated { path: String },

    #[error("header map {path} has unsupported version {version}")]
    BadVersion { path: String, version: u16 },

    #[error("header map {path} has reserved field {value}, expected 0")]
    BadReserved { path: String, value: u16 },

    #[error("header map {path} bucket count {count} is not a power of two")]
    BadBucketCount { path: String, count: u32 },
}

/// Master error type for the basic layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BasicError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("header map error: {0}")]
    HeaderMap(#[from] HeaderMapError),
}

/// Result type alias for basic-layer operations.
pub type BasicResult<T> = Result<T, BasicError>;
