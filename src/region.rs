//! The byte buffer backing a [`crate::group::Group`].
//!
//! A region is split at a fixed `watermark`: everything below it is the
//! read-only prefix adopted from a memory-mapped file (or empty, for a
//! fresh heap-only group), and everything at or above it is a plain `Vec<u8>`
//! extension that the current writer may mutate freely. This is the same
//! split the teacher crate's `Pile` makes between its `memmap2::MmapRaw`
//! prefix and newly appended bytes, except here the extension lives in
//! process memory rather than being appended to the file on every write —
//! `Group::write` is what flattens the two back into one file.
//!
//! Refs below the watermark must never be mutated in place: the allocator's
//! copy-on-write rule (spec.md §4.1) relies on this split to let readers
//! who opened the file earlier keep reading undisturbed bytes.

use anybytes::Bytes;
use memmap2::Mmap;
use std::fs::File;
use std::sync::Arc;

use crate::error::CorruptRegion;

pub type Ref = u64;

/// A contiguous logical byte buffer: an optional read-only mapped prefix
/// followed by a growable heap extension.
pub struct Region {
    mapped: Option<Bytes>,
    extension: Vec<u8>,
}

impl Region {
    /// A fresh, empty, fully heap-backed region.
    pub fn new() -> Self {
        Self {
            mapped: None,
            extension: Vec::new(),
        }
    }

    /// Adopt an in-memory buffer as a read-only mapped prefix (mirrors
    /// `Group::open_buffer`).
    pub fn from_buffer(buf: Vec<u8>) -> Self {
        Self {
            mapped: Some(Bytes::from_source(buf)),
            extension: Vec::new(),
        }
    }

    /// Memory-map `file` read-only and adopt it as the mapped prefix
    /// (mirrors `Group::open`), following the teacher's `pile.rs` pattern
    /// of wrapping the raw mapped slice in an `anybytes::Bytes` so clones
    /// (reader snapshots) are cheap refcount bumps rather than copies.
    pub fn from_file(file: &File) -> Result<Self, CorruptRegion> {
        let len = file.metadata()?.len() as usize;
        if len == 0 {
            return Ok(Self::new());
        }
        // Safety: the mapping is read-only for the lifetime of `mmap`, and
        // `Bytes::from_raw_parts` keeps `mmap` alive for as long as any
        // clone of the returned `Bytes` is alive.
        let mmap = unsafe { Mmap::map(file)? };
        let mmap = Arc::new(mmap);
        let slice = std::ptr::slice_from_raw_parts(mmap.as_ptr(), len);
        let bytes = unsafe { Bytes::from_raw_parts(slice.as_ref().unwrap(), mmap.clone()) };
        Ok(Self {
            mapped: Some(bytes),
            extension: Vec::new(),
        })
    }

    /// Length of the read-only prefix. Refs below this are immutable.
    pub fn watermark(&self) -> usize {
        self.mapped.as_ref().map_or(0, |b| b.len())
    }

    /// Total addressable length (mapped prefix + extension).
    pub fn len(&self) -> usize {
        self.watermark() + self.extension.len()
    }

    pub fn is_read_only(&self, r: Ref) -> bool {
        (r as usize) < self.watermark()
    }

    pub fn read(&self, r: Ref, len: usize) -> &[u8] {
        let r = r as usize;
        let watermark = self.watermark();
        if r + len <= watermark {
            &self.mapped.as_ref().unwrap()[r..r + len]
        } else {
            assert!(
                r >= watermark,
                "read spans the read-only/mutable boundary"
            );
            &self.extension[r - watermark..r - watermark + len]
        }
    }

    pub fn write(&mut self, r: Ref, data: &[u8]) {
        let r = r as usize;
        let watermark = self.watermark();
        assert!(r >= watermark, "attempted to mutate a read-only ref");
        let start = r - watermark;
        let end = start + data.len();
        if end > self.extension.len() {
            self.extension.resize(end, 0);
        }
        self.extension[start..end].copy_from_slice(data);
    }

    /// Append `len` zeroed bytes to the mutable extension and return the
    /// ref at which they start.
    pub fn append(&mut self, len: usize) -> Ref {
        let ref_ = self.len() as Ref;
        self.extension.resize(self.extension.len() + len, 0);
        ref_
    }

    /// Flatten mapped prefix + extension into one contiguous buffer, used
    /// by `Group::write`.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        if let Some(b) = &self.mapped {
            out.extend_from_slice(b);
        }
        out.extend_from_slice(&self.extension);
        out
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_only_region_roundtrip() {
        let mut region = Region::new();
        assert_eq!(region.watermark(), 0);
        let r = region.append(8);
        region.write(r, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(region.read(r, 8), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(!region.is_read_only(r));
    }

    #[test]
    fn mapped_prefix_is_read_only() {
        let region = Region::from_buffer(vec![9; 16]);
        assert_eq!(region.watermark(), 16);
        assert!(region.is_read_only(0));
        assert!(region.is_read_only(15));
        assert_eq!(region.read(0, 16), &[9; 16]);
    }
}
