//! Sub-table column: a refs [`Array`] whose entries are the root refs of
//! nested [`crate::table::Table`]s (spec.md §3.1/§4.4 "Sub-table column").
//!
//! Unlike the integer and string columns this never grows a B+tree of its
//! own leaves — spec.md only describes it as "a refs Array", and a table
//! with enough rows to need millions of sub-tables is already well outside
//! the engine's target workload, so one flat refs array is sufficient.
//! A ref of `0` means "not yet materialised"; reading one materialises an
//! empty nested table in its place, matching spec.md §4.4's "reading an
//! unmaterialised sub-table creates an empty table and stores its ref".

use crate::alloc::Allocator;
use crate::array::Array;
use crate::error::AllocError;
use crate::region::Ref;
use crate::table::Table;

#[derive(Clone, Debug)]
pub struct SubtableColumn {
    refs: Array,
}

impl SubtableColumn {
    pub fn create(alloc: &mut impl Allocator) -> Result<Self, AllocError> {
        Ok(Self { refs: Array::create(alloc, true)? })
    }

    pub fn from_root(refs: Array) -> Self {
        Self { refs }
    }

    pub fn root_ref(&self) -> Ref {
        self.refs.ref_()
    }

    pub fn size(&self, alloc: &impl Allocator) -> usize {
        self.refs.size(alloc)
    }

    /// The raw ref stored at `row`, `0` if the sub-table there has never
    /// been read or written.
    pub fn raw_ref(&self, alloc: &impl Allocator, row: usize) -> Ref {
        self.refs.get_ref(alloc, row)
    }

    /// Open the nested table at `row`, materialising an empty one first if
    /// none exists yet.
    pub fn get(&mut self, alloc: &mut impl Allocator, row: usize) -> Result<Table, AllocError> {
        let child_ref = self.refs.get_ref(alloc, row);
        if child_ref != 0 {
            return Ok(Table::open(alloc, child_ref).expect("sub-table corrupted"));
        }
        let table = Table::create(alloc)?;
        self.refs.set_ref(alloc, row, table.root_ref())?;
        Ok(table)
    }

    /// Replace the sub-table at `row` wholesale, freeing whatever was
    /// there before (if it was ours to free).
    pub fn set(&mut self, alloc: &mut impl Allocator, row: usize, table: &Table) -> Result<(), AllocError> {
        let old_ref = self.refs.get_ref(alloc, row);
        if old_ref != 0 && !alloc.is_read_only(old_ref) {
            destroy_ref(alloc, old_ref);
        }
        self.refs.set_ref(alloc, row, table.root_ref())
    }

    pub fn add_empty(&mut self, alloc: &mut impl Allocator) -> Result<(), AllocError> {
        self.refs.add_ref(alloc, 0)
    }

    pub fn insert_empty(&mut self, alloc: &mut impl Allocator, row: usize) -> Result<(), AllocError> {
        self.refs.insert_ref(alloc, row, 0)
    }

    pub fn erase(&mut self, alloc: &mut impl Allocator, row: usize) -> Result<(), AllocError> {
        let child_ref = self.refs.get_ref(alloc, row);
        if child_ref != 0 && !alloc.is_read_only(child_ref) {
            destroy_ref(alloc, child_ref);
        }
        self.refs.erase(alloc, row)
    }

    pub fn clear(&mut self, alloc: &mut impl Allocator) -> Result<(), AllocError> {
        self.refs.destroy(alloc);
        self.refs = Array::create(alloc, true)?;
        Ok(())
    }

    pub fn destroy(&self, alloc: &mut impl Allocator) {
        self.refs.destroy(alloc);
    }
}

fn destroy_ref(alloc: &mut impl Allocator, r: Ref) {
    if let Ok(array) = Array::open(alloc, r, None) {
        array.destroy(alloc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;

    #[test]
    fn unmaterialised_row_opens_empty_table() {
        let mut alloc = HeapAllocator::new();
        let mut col = SubtableColumn::create(&mut alloc).unwrap();
        col.add_empty(&mut alloc).unwrap();
        assert_eq!(col.raw_ref(&alloc, 0), 0);
        let nested = col.get(&mut alloc, 0).unwrap();
        assert_eq!(nested.size(&alloc), 0);
        assert_ne!(col.raw_ref(&alloc, 0), 0);
    }

    #[test]
    fn materialised_row_persists_rows_written_into_it() {
        let mut alloc = HeapAllocator::new();
        let mut col = SubtableColumn::create(&mut alloc).unwrap();
        col.add_empty(&mut alloc).unwrap();
        {
            let mut nested = col.get(&mut alloc, 0).unwrap();
            nested.register_column(&mut alloc, crate::table::ColumnType::Int, "x").unwrap();
            nested.add_empty_row(&mut alloc).unwrap();
            nested.set_int(&mut alloc, 0, 0, 7).unwrap();
            col.set(&mut alloc, 0, &nested).unwrap();
        }
        let reopened = col.get(&mut alloc, 0).unwrap();
        assert_eq!(reopened.size(&alloc), 1);
        assert_eq!(reopened.get_int(&alloc, 0, 0), 7);
    }
}
