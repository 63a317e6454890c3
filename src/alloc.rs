//! Allocators hand out and reclaim byte ranges inside a [`crate::region::Region`].
//!
//! Two implementations share [`Allocator`]: [`HeapAllocator`] for transient
//! tables that were never attached to a [`crate::group::Group`], and
//! [`RegionAllocator`] for the region backing an open group, which adds the
//! read-only/copy-on-write split spec.md §4.1 requires. Both are built on
//! the same best-fit-over-a-linear-free-list policy; we keep them as
//! separate types (rather than one generic) because a `Group` also needs to
//! persist `RegionAllocator`'s free list as the two free-position/free-size
//! arrays in its top array (spec.md §3.1), which `HeapAllocator` has no use
//! for.
//!
//! **Documented policy choice** (spec.md §9 open question): frees are
//! recorded in the free list and reused by later allocations, but adjacent
//! free spans are never coalesced. For the access patterns this engine is
//! built for — arrays that mostly grow by doubling and are freed whole when
//! their owning table/column is destroyed — fragmentation from adjacent
//! small frees is rare enough that linear best-fit without coalescing is an
//! acceptable trade against the bookkeeping a coalescing free list would add.
//! If a future workload needs it, the free list is the only place to change.

use crate::error::AllocError;
use crate::region::{Ref, Region};

pub trait Allocator {
    fn alloc(&mut self, size: usize) -> Result<Ref, AllocError>;
    fn realloc(&mut self, r: Ref, old_size: usize, new_size: usize) -> Result<Ref, AllocError>;
    fn free(&mut self, r: Ref, size: usize);
    fn read(&self, r: Ref, len: usize) -> &[u8];
    fn write(&mut self, r: Ref, data: &[u8]);
    fn is_read_only(&self, r: Ref) -> bool;
}

/// A best-fit linear free list shared by both allocator implementations.
#[derive(Default)]
struct FreeList {
    spans: Vec<(Ref, usize)>,
}

impl FreeList {
    fn take_best_fit(&mut self, size: usize) -> Option<Ref> {
        let mut best: Option<(usize, Ref, usize)> = None;
        for (idx, &(r, len)) in self.spans.iter().enumerate() {
            if len >= size && best.map_or(true, |(_, _, best_len)| len < best_len) {
                best = Some((idx, r, len));
            }
        }
        let (idx, r, len) = best?;
        self.spans.swap_remove(idx);
        if len > size {
            self.spans.push((r + size as Ref, len - size));
        }
        Some(r)
    }

    fn push(&mut self, r: Ref, size: usize) {
        self.spans.push((r, size));
    }

    /// Try to find and consume a free span that starts exactly at
    /// `r`/`after` and is at least `needed` bytes, used by `realloc` to
    /// extend in place.
    fn take_adjacent(&mut self, after: Ref, needed: usize) -> bool {
        if let Some(idx) = self.spans.iter().position(|&(r, len)| r == after && len >= needed) {
            let (r, len) = self.spans.swap_remove(idx);
            if len > needed {
                self.spans.push((r + needed as Ref, len - needed));
            }
            true
        } else {
            false
        }
    }
}

/// Each ref is an offset into a region owned outright by this allocator;
/// there is no read-only prefix. Used for tables that have not (yet) been
/// registered with a [`crate::group::Group`].
pub struct HeapAllocator {
    region: Region,
    free: FreeList,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self {
            region: Region::new(),
            free: FreeList::default(),
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for HeapAllocator {
    fn alloc(&mut self, size: usize) -> Result<Ref, AllocError> {
        if let Some(r) = self.free.take_best_fit(size) {
            return Ok(r);
        }
        Ok(self.region.append(size))
    }

    fn realloc(&mut self, r: Ref, old_size: usize, new_size: usize) -> Result<Ref, AllocError> {
        if new_size <= old_size {
            return Ok(r);
        }
        let grow_by = new_size - old_size;
        if self.free.take_adjacent(r + old_size as Ref, grow_by) {
            return Ok(r);
        }
        let new_ref = self.alloc(new_size)?;
        let old_bytes = self.region.read(r, old_size).to_vec();
        self.region.write(new_ref, &old_bytes);
        self.free(r, old_size);
        Ok(new_ref)
    }

    fn free(&mut self, r: Ref, size: usize) {
        self.free.push(r, size);
    }

    fn read(&self, r: Ref, len: usize) -> &[u8] {
        self.region.read(r, len)
    }

    fn write(&mut self, r: Ref, data: &[u8]) {
        self.region.write(r, data)
    }

    fn is_read_only(&self, _r: Ref) -> bool {
        false
    }
}

/// Allocator over a [`Region`] that may have a read-only memory-mapped
/// prefix. Allocations and frees only ever touch the mutable extension;
/// refs below the watermark are immutable and writers must copy-on-write
/// through them (spec.md §4.1).
pub struct RegionAllocator {
    region: Region,
    free: FreeList,
}

impl RegionAllocator {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            free: FreeList::default(),
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn region_mut(&mut self) -> &mut Region {
        &mut self.region
    }

    /// Restore the free list from the two free-list arrays persisted in a
    /// group's top array (see [`crate::group::Group`]).
    pub fn restore_free_list(&mut self, spans: Vec<(Ref, usize)>) {
        self.free.spans = spans;
    }

    /// The free list in the form `Group::write` persists as the two
    /// free-position/free-size arrays.
    pub fn free_spans(&self) -> &[(Ref, usize)] {
        &self.free.spans
    }
}

impl Allocator for RegionAllocator {
    fn alloc(&mut self, size: usize) -> Result<Ref, AllocError> {
        if let Some(r) = self.free.take_best_fit(size) {
            return Ok(r);
        }
        Ok(self.region.append(size))
    }

    fn realloc(&mut self, r: Ref, old_size: usize, new_size: usize) -> Result<Ref, AllocError> {
        debug_assert!(!self.is_read_only(r), "realloc on a read-only ref");
        if new_size <= old_size {
            return Ok(r);
        }
        let grow_by = new_size - old_size;
        if self.free.take_adjacent(r + old_size as Ref, grow_by) {
            return Ok(r);
        }
        let new_ref = self.alloc(new_size)?;
        let old_bytes = self.region.read(r, old_size).to_vec();
        self.region.write(new_ref, &old_bytes);
        self.free(r, old_size);
        Ok(new_ref)
    }

    fn free(&mut self, r: Ref, size: usize) {
        if self.is_read_only(r) {
            // Spans inside the read-only mapped prefix were never ours to
            // give back; the caller is destroying an accessor view over
            // data it did not allocate in this session (e.g. re-destroying
            // a subtree rooted below the watermark).
            return;
        }
        self.free.push(r, size);
    }

    fn read(&self, r: Ref, len: usize) -> &[u8] {
        self.region.read(r, len)
    }

    fn write(&mut self, r: Ref, data: &[u8]) {
        self.region.write(r, data)
    }

    fn is_read_only(&self, r: Ref) -> bool {
        self.region.is_read_only(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_allocator_reuses_freed_span() {
        let mut alloc = HeapAllocator::new();
        let a = alloc.alloc(16).unwrap();
        alloc.free(a, 16);
        let b = alloc.alloc(16).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn heap_allocator_best_fit_picks_smallest_adequate_span() {
        let mut alloc = HeapAllocator::new();
        let a = alloc.alloc(64).unwrap();
        let b = alloc.alloc(16).unwrap();
        let c = alloc.alloc(32).unwrap();
        alloc.free(a, 64);
        alloc.free(c, 32);
        let got = alloc.alloc(20).unwrap();
        assert_eq!(got, c);
        let _ = b;
    }

    #[test]
    fn region_allocator_refuses_to_reclaim_readonly_span() {
        let region = crate::region::Region::from_buffer(vec![0u8; 32]);
        let mut alloc = RegionAllocator::new(region);
        alloc.free(0, 32);
        assert!(alloc.free_spans().is_empty());
    }
}
