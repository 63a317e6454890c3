//! `Cursor`: a `(Table, row)` handle proxying typed per-column access
//! (spec.md §3.1/§4.8).
//!
//! A cursor is non-owning and, like every other accessor in this crate,
//! re-derives everything from its table and row on each call rather than
//! caching column state — so a structural mutation through the `Table` the
//! cursor was built from is always visible on the cursor's next read.
//! Mutating operations that shift rows below a cursor's row index (an
//! `erase_row` earlier in the table) invalidate it logically; reading an
//! invalidated cursor reads whatever row now occupies that index, which is
//! undefined from the caller's perspective — spec.md §4.8 expects callers
//! to re-acquire rather than this type catching the mistake.

use crate::alloc::Allocator;
use crate::error::AllocError;
use crate::table::Table;

pub struct Cursor<'t> {
    table: &'t mut Table,
    row: usize,
}

impl<'t> Cursor<'t> {
    pub fn new(table: &'t mut Table, row: usize) -> Self {
        Self { table, row }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn get_int(&self, alloc: &impl Allocator, col: usize) -> i64 {
        self.table.get_int(alloc, col, self.row)
    }

    pub fn set_int(&mut self, alloc: &mut impl Allocator, col: usize, v: i64) -> Result<(), AllocError> {
        self.table.set_int(alloc, col, self.row, v)
    }

    pub fn get_bool(&self, alloc: &impl Allocator, col: usize) -> bool {
        self.table.get_bool(alloc, col, self.row)
    }

    pub fn set_bool(&mut self, alloc: &mut impl Allocator, col: usize, v: bool) -> Result<(), AllocError> {
        self.table.set_bool(alloc, col, self.row, v)
    }

    pub fn get_string(&self, alloc: &impl Allocator, col: usize) -> Vec<u8> {
        self.table.get_string(alloc, col, self.row)
    }

    pub fn get_str(&self, alloc: &impl Allocator, col: usize) -> String {
        self.table.get_str(alloc, col, self.row)
    }

    pub fn set_string(&mut self, alloc: &mut impl Allocator, col: usize, v: &[u8]) -> Result<(), AllocError> {
        self.table.set_string(alloc, col, self.row, v)
    }

    pub fn get_subtable(&mut self, alloc: &mut impl Allocator, col: usize) -> Result<Table, AllocError> {
        self.table.get_subtable(alloc, col, self.row)
    }

    pub fn set_subtable(&mut self, alloc: &mut impl Allocator, col: usize, nested: &Table) -> Result<(), AllocError> {
        self.table.set_subtable(alloc, col, self.row, nested)
    }

    /// Move this cursor to a different row of the same table.
    pub fn seek(&mut self, row: usize) {
        self.row = row;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;
    use crate::table::ColumnType;

    #[test]
    fn cursor_reads_and_writes_the_bound_row() {
        let mut alloc = HeapAllocator::new();
        let mut table = Table::create(&mut alloc).unwrap();
        table.register_column(&mut alloc, ColumnType::Int, "age").unwrap();
        table.register_column(&mut alloc, ColumnType::String, "name").unwrap();
        table.add_empty_row(&mut alloc).unwrap();
        table.add_empty_row(&mut alloc).unwrap();

        let mut cursor = Cursor::new(&mut table, 1);
        cursor.set_int(&mut alloc, 0, 99).unwrap();
        cursor.set_string(&mut alloc, 1, b"zeta").unwrap();
        assert_eq!(cursor.get_int(&alloc, 0), 99);
        assert_eq!(cursor.get_str(&alloc, 1), "zeta");

        assert_eq!(table.get_int(&alloc, 0, 0), 0);
    }

    #[test]
    fn seek_moves_the_cursor_to_a_new_row() {
        let mut alloc = HeapAllocator::new();
        let mut table = Table::create(&mut alloc).unwrap();
        table.register_column(&mut alloc, ColumnType::Int, "x").unwrap();
        for i in 0..3 {
            table.add_empty_row(&mut alloc).unwrap();
            table.set_int(&mut alloc, 0, i, i as i64 * 10).unwrap();
        }

        let mut cursor = Cursor::new(&mut table, 0);
        assert_eq!(cursor.get_int(&alloc, 0), 0);
        cursor.seek(2);
        assert_eq!(cursor.get_int(&alloc, 0), 20);
    }
}
