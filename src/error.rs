//! Error types for the storage engine.
//!
//! These are plain enums rather than `thiserror`/`anyhow` wrappers: every
//! fallible boundary in this crate reports a closed set of conditions the
//! caller can match on, and conversions from the handful of `std` error
//! types we wrap are spelled out by hand with `From` impls.

use std::io;

/// Failure of an [`crate::alloc::Allocator`] operation.
///
/// Per the allocator contract, a failing call never mutates state: callers
/// can retry with a smaller request or propagate the error.
#[derive(Debug)]
pub enum AllocError {
    /// Growing the backing region would exceed its configured ceiling.
    OutOfMemory,
    /// The region has already reached its maximum configured size.
    RegionTooLarge,
}

/// A region failed to parse on open.
#[derive(Debug)]
pub enum CorruptRegion {
    IoError(io::Error),
    BadMagic,
    BadHeader,
    /// The region is a well-formed file, just larger than this `Group`'s
    /// `MAX_REGION_SIZE` — distinct from `BadHeader`, which means the header
    /// itself doesn't parse.
    RegionTooLarge,
    Truncated,
    UnknownWidthCode(u8),
    BadTopArray,
}

impl From<io::Error> for CorruptRegion {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

/// A query failed to assemble.
#[derive(Debug, PartialEq, Eq)]
pub enum MalformedQuery {
    UnbalancedParens,
    UnknownColumn(String),
    EmptySubtableScope,
    NoOpenSubtableScope,
    TypeMismatch { column: String },
}

/// Failure writing a [`crate::group::Group`] to disk.
#[derive(Debug)]
pub enum WriteError {
    IoError(io::Error),
    Alloc(AllocError),
}

impl From<io::Error> for WriteError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl From<AllocError> for WriteError {
    fn from(err: AllocError) -> Self {
        Self::Alloc(err)
    }
}
