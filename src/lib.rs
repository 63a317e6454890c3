//! An embedded, in-memory and file-backed columnar database storage engine.
//!
//! The engine is built bottom-up out of a small number of primitives, each
//! described in its own module:
//!
//! - [`region`] — the byte buffer backing a group, split between a
//!   read-only memory-mapped prefix and a growable heap extension.
//! - [`alloc`] — best-fit allocation over a region, with copy-on-write
//!   through the read-only prefix.
//! - [`array`] — `Array`, the universal bit-packed on-region node every
//!   other structure is built from.
//! - [`column`] — `IntColumn`, `AdaptiveStringColumn`, and `SubtableColumn`,
//!   the three column shapes a [`table::Table`] can hold.
//! - [`table`] — a set of equal-length columns sharing one row index.
//! - [`group`] — a named set of tables, persisted to or opened from a file.
//! - [`query`] — a predicate tree assembled against a table's schema and
//!   evaluated row by row.
//! - [`cursor`] — a `(table, row)` handle proxying typed column access.
//!
//! Data flows in one direction: callers mutate tables through typed column
//! accessors or a [`cursor::Cursor`]; tables delegate to columns; columns
//! read and write arrays; arrays read and write the backing region through
//! an [`alloc::Allocator`].

pub mod alloc;
pub mod array;
pub mod column;
pub mod cursor;
pub mod error;
pub mod group;
pub mod query;
pub mod region;
pub mod table;

pub use alloc::{Allocator, HeapAllocator, RegionAllocator};
pub use column::{AdaptiveStringColumn, IntColumn, SubtableColumn};
pub use cursor::Cursor;
pub use error::{AllocError, CorruptRegion, MalformedQuery, WriteError};
pub use group::Group;
pub use query::{Query, QueryBuilder, TableView};
pub use table::{ColumnType, Table};
