//! Columns: logical row-indexed sequences built out of [`crate::array::Array`]s.
//!
//! A column is either a single leaf `Array` or a B+tree of them (spec.md
//! §3.1/§4.3). The three concrete column kinds — integer, adaptive string,
//! and sub-table — share the same navigation and split/bubble algorithm but
//! specialise how a leaf stores its values, so each gets its own module
//! instead of one generic parameterised over a "leaf storage" trait: the
//! string column's two leaf shapes (short-slot vs. offset+blob) don't map
//! cleanly onto the same leaf type the integer/sub-table columns use.

pub mod int;
pub mod string;
pub mod subtable;

pub use int::IntColumn;
pub use string::AdaptiveStringColumn;
pub use subtable::SubtableColumn;

/// Upper bound on the number of children of a B+tree inner node before it
/// splits (spec.md §3.1 `MAX_NODE_ENTRIES`).
pub const MAX_NODE_ENTRIES: usize = 1000;
