//! `Group`: the file-backed (or purely in-memory) root of a set of named
//! tables (spec.md §3.1/§4.6).
//!
//! A group's region starts with a fixed 16-byte header — an 8-byte magic
//! marker followed by the little-endian ref of the *top array* — mirroring
//! how the teacher crate's `Pile<const MAX_PILE_SIZE: usize>` anchors each
//! record with its own magic marker (`pile.rs`). The top array itself has
//! four refs: `[table_names, table_refs, free_positions, free_sizes]`,
//! where the last two persist the allocator's free list across a
//! close/reopen (spec.md §4.1 "the free list is derived state, but is
//! persisted for fast reopen").
//!
//! `Group` is generic over `MAX_REGION_SIZE`, the same const-generic shape
//! `Pile` uses to cap how large a single backing file may grow — see
//! `SPEC_FULL.md` §4.9.

use std::fs::File;
use std::path::Path;

use crate::alloc::{Allocator, RegionAllocator};
use crate::array::{Array, ParentLink};
use crate::column::AdaptiveStringColumn;
use crate::error::{AllocError, CorruptRegion, WriteError};
use crate::region::{Ref, Region};
use crate::table::Table;

const MAGIC: &[u8; 8] = b"TABULAE1";
const HEADER_LEN: usize = 16;

pub struct Group<const MAX_REGION_SIZE: usize = { 1 << 32 }> {
    alloc: RegionAllocator,
    top_ref: Ref,
}

impl<const MAX_REGION_SIZE: usize> Group<MAX_REGION_SIZE> {
    /// A fresh, empty, heap-backed group with no file behind it yet.
    pub fn new() -> Result<Self, AllocError> {
        let mut alloc = RegionAllocator::new(Region::new());
        let header_ref = alloc.alloc(HEADER_LEN)?;
        debug_assert_eq!(header_ref, 0, "header must be the first allocation in a fresh region");

        let names = AdaptiveStringColumn::create(&mut alloc)?;
        let tables = Array::create(&mut alloc, true)?;
        let free_positions = Array::create(&mut alloc, false)?;
        let free_sizes = Array::create(&mut alloc, false)?;
        let mut top = Array::create(&mut alloc, true)?;
        top.add_ref(&mut alloc, names.root_ref())?;
        top.add_ref(&mut alloc, tables.ref_())?;
        top.add_ref(&mut alloc, free_positions.ref_())?;
        top.add_ref(&mut alloc, free_sizes.ref_())?;

        alloc.write(header_ref, MAGIC);
        alloc.write(header_ref + 8, &top.ref_().to_le_bytes());

        Ok(Self { alloc, top_ref: top.ref_() })
    }

    /// Memory-map `path` read-only and open the group backed by it; writes
    /// copy-on-write into a heap extension (spec.md §4.1).
    pub fn open(path: &Path) -> Result<Self, CorruptRegion> {
        let file = File::open(path)?;
        let region = Region::from_file(&file)?;
        Self::from_region(region)
    }

    /// Open a group whose full contents already live in memory (e.g. a
    /// buffer read from elsewhere), without touching the filesystem.
    pub fn open_buffer(buf: Vec<u8>) -> Result<Self, CorruptRegion> {
        Self::from_region(Region::from_buffer(buf))
    }

    fn from_region(region: Region) -> Result<Self, CorruptRegion> {
        if region.len() < HEADER_LEN {
            return Err(CorruptRegion::Truncated);
        }
        if region.len() > MAX_REGION_SIZE {
            return Err(CorruptRegion::RegionTooLarge);
        }
        let header = region.read(0, HEADER_LEN);
        if &header[0..8] != MAGIC {
            return Err(CorruptRegion::BadMagic);
        }
        let top_ref = u64::from_le_bytes(header[8..16].try_into().unwrap());

        let alloc = RegionAllocator::new(region);
        let top = Array::open(&alloc, top_ref, None)?;
        if !top.has_refs(&alloc) || top.size(&alloc) != 4 {
            return Err(CorruptRegion::BadTopArray);
        }

        let free_positions = Array::open(&alloc, top.get_ref(&alloc, 2), None)?;
        let free_sizes = Array::open(&alloc, top.get_ref(&alloc, 3), None)?;
        let spans: Vec<(Ref, usize)> = free_positions
            .to_vec(&alloc)
            .into_iter()
            .zip(free_sizes.to_vec(&alloc))
            .map(|(pos, size)| (pos as Ref, size as usize))
            .collect();

        let mut group = Self { alloc, top_ref };
        group.alloc.restore_free_list(spans);
        Ok(group)
    }

    /// Direct access to the backing allocator, for callers driving typed
    /// mutation on a [`Table`] obtained from this group (spec.md §4.6 —
    /// `Table`'s own accessors all take the allocator explicitly rather
    /// than borrowing it from a group).
    pub fn allocator(&self) -> &RegionAllocator {
        &self.alloc
    }

    pub fn allocator_mut(&mut self) -> &mut RegionAllocator {
        &mut self.alloc
    }

    fn top(&self) -> Array {
        Array::open(&self.alloc, self.top_ref, None).expect("group top array corrupted")
    }

    fn names(&self) -> AdaptiveStringColumn {
        AdaptiveStringColumn::from_root(
            Array::open(
                &self.alloc,
                self.top().get_ref(&self.alloc, 0),
                Some(ParentLink { parent_ref: self.top_ref, index_in_parent: 0 }),
            )
            .expect("group table names corrupted"),
        )
    }

    fn tables(&self) -> Array {
        Array::open(
            &self.alloc,
            self.top().get_ref(&self.alloc, 1),
            Some(ParentLink { parent_ref: self.top_ref, index_in_parent: 1 }),
        )
        .expect("group table refs corrupted")
    }

    fn write_top_slot(&mut self, idx: usize, r: Ref) -> Result<(), AllocError> {
        let mut top = self.top();
        top.set_ref(&mut self.alloc, idx, r)?;
        if top.ref_() != self.top_ref {
            self.top_ref = top.ref_();
        }
        Ok(())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        let names = self.names();
        (0..names.size(&self.alloc)).find(|&i| names.get(&self.alloc, i) == name.as_bytes())
    }

    pub fn table_names(&self) -> Vec<String> {
        let names = self.names();
        (0..names.size(&self.alloc)).map(|i| names.get_str(&self.alloc, i)).collect()
    }

    pub fn get_table(&self, name: &str) -> Option<Table> {
        let idx = self.index_of(name)?;
        let tables = self.tables();
        Some(Table::open(&self.alloc, tables.get_ref(&self.alloc, idx)).expect("table corrupted"))
    }

    /// Open `name`, creating an empty table registered under that name if
    /// it doesn't exist yet. Mutations to the returned table must be
    /// written back with [`Group::save_table`] to be visible afterward.
    pub fn get_or_create_table(&mut self, name: &str) -> Result<Table, AllocError> {
        if let Some(idx) = self.index_of(name) {
            let tables = self.tables();
            return Ok(Table::open(&self.alloc, tables.get_ref(&self.alloc, idx)).expect("table corrupted"));
        }
        let table = Table::create(&mut self.alloc)?;
        if self.alloc.region().len() > MAX_REGION_SIZE {
            return Err(AllocError::RegionTooLarge);
        }

        let mut names = self.names();
        names.add(&mut self.alloc, name.as_bytes())?;
        self.write_top_slot(0, names.root_ref())?;

        let mut tables = self.tables();
        tables.add_ref(&mut self.alloc, table.root_ref())?;
        self.write_top_slot(1, tables.ref_())?;

        Ok(table)
    }

    /// Persist a table's current (possibly relocated) root ref back into
    /// the group, e.g. after mutating one obtained from
    /// [`Group::get_or_create_table`].
    pub fn save_table(&mut self, name: &str, table: &Table) -> Result<(), AllocError> {
        let idx = self.index_of(name).expect("save_table on an unregistered name");
        let mut tables = self.tables();
        tables.set_ref(&mut self.alloc, idx, table.root_ref())?;
        self.write_top_slot(1, tables.ref_())
    }

    /// Flatten the current region to one contiguous file, patching the
    /// header to the latest top-array ref (spec.md §4.6 "write produces a
    /// self-contained file from any group, mapped or heap-backed").
    pub fn write(&mut self, path: &Path) -> Result<(), WriteError> {
        self.persist_free_list()?;
        if self.alloc.region().len() > MAX_REGION_SIZE {
            // Ordinary mutation on an existing table (row/column growth, a
            // B+tree split) never checks the ceiling per-operation; this is
            // the backstop so a file that couldn't be reopened is never
            // produced.
            return Err(WriteError::Alloc(AllocError::RegionTooLarge));
        }
        let mut buf = self.alloc.region().to_vec();
        buf[0..8].copy_from_slice(MAGIC);
        buf[8..16].copy_from_slice(&self.top_ref.to_le_bytes());
        std::fs::write(path, buf)?;
        Ok(())
    }

    fn persist_free_list(&mut self) -> Result<(), AllocError> {
        let spans: Vec<(Ref, usize)> = self.alloc.free_spans().to_vec();
        let mut positions = Array::create(&mut self.alloc, false)?;
        let mut sizes = Array::create(&mut self.alloc, false)?;
        let pos_values: Vec<i64> = spans.iter().map(|&(r, _)| r as i64).collect();
        let size_values: Vec<i64> = spans.iter().map(|&(_, s)| s as i64).collect();
        positions.reset_with(&mut self.alloc, &pos_values)?;
        sizes.reset_with(&mut self.alloc, &size_values)?;
        self.write_top_slot(2, positions.ref_())?;
        self.write_top_slot(3, sizes.ref_())
    }
}
