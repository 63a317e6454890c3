//! `Query`: a predicate tree assembled by chaining leaves, parentheses, and
//! `Or`/`Subtable`/`Parent` structural tokens, evaluated against a
//! [`crate::table::Table`] (spec.md §4.7).
//!
//! Conjunction is implicit between consecutive leaves at the same nesting
//! level; `Or` splits the current group into a disjunction; `Subtable(col)`
//! opens a nested scope whose leaves address the sub-table rooted at
//! `(current_row, col)`, closed by `Parent`. A predicate tree is built once
//! with [`QueryBuilder`] and evaluated with [`Query::find_all`].

use crate::alloc::Allocator;
use crate::error::MalformedQuery;
use crate::table::{ColumnType, Table};

#[derive(Clone, Debug, PartialEq)]
pub enum IntOp {
    Equal(i64),
    NotEqual(i64),
    Greater(i64),
    Less(i64),
    Between(i64, i64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringMatch {
    Equal,
    NotEqual,
    BeginsWith,
    EndsWith,
    Contains,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StringOp {
    pub op: StringMatch,
    pub value: Vec<u8>,
    pub case_sensitive: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LeafOp {
    Int(IntOp),
    Bool(bool),
    Str(StringOp),
}

/// One node of the assembled predicate tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Leaf { column: usize, op: LeafOp },
    SubtableDescend { column: usize, inner: Box<Node> },
}

/// A fully assembled, immutable predicate; build one with [`QueryBuilder`].
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    root: Node,
}

impl Query {
    /// The row indices of `table` for which the predicate holds.
    pub fn find_all(&self, alloc: &impl Allocator, table: &Table) -> Vec<usize> {
        (0..table.size(alloc))
            .filter(|&row| eval(&self.root, alloc, table, row))
            .collect()
    }
}

fn eval(node: &Node, alloc: &impl Allocator, table: &Table, row: usize) -> bool {
    match node {
        Node::And(children) => children.iter().all(|c| eval(c, alloc, table, row)),
        Node::Or(children) => children.iter().any(|c| eval(c, alloc, table, row)),
        Node::Leaf { column, op } => eval_leaf(alloc, table, row, *column, op),
        Node::SubtableDescend { column, inner } => {
            let child_ref = table.raw_subtable_ref(alloc, *column, row);
            if child_ref == 0 {
                // Unmaterialised sub-table: zero rows, so "exists a row
                // satisfying the predicate" is vacantly false.
                return false;
            }
            let nested = Table::open(alloc, child_ref).expect("sub-table corrupted");
            (0..nested.size(alloc)).any(|nested_row| eval(inner, alloc, &nested, nested_row))
        }
    }
}

fn eval_leaf(alloc: &impl Allocator, table: &Table, row: usize, column: usize, op: &LeafOp) -> bool {
    match op {
        LeafOp::Int(int_op) => {
            let v = table.get_int(alloc, column, row);
            match *int_op {
                IntOp::Equal(x) => v == x,
                IntOp::NotEqual(x) => v != x,
                IntOp::Greater(x) => v > x,
                IntOp::Less(x) => v < x,
                IntOp::Between(lo, hi) => v >= lo && v <= hi,
            }
        }
        LeafOp::Bool(expected) => table.get_bool(alloc, column, row) == *expected,
        LeafOp::Str(string_op) => {
            let actual = table.get_string(alloc, column, row);
            let (haystack, needle) = if string_op.case_sensitive {
                (actual, string_op.value.clone())
            } else {
                (to_lower(&actual), to_lower(&string_op.value))
            };
            match string_op.op {
                StringMatch::Equal => haystack == needle,
                StringMatch::NotEqual => haystack != needle,
                StringMatch::BeginsWith => haystack.starts_with(&needle[..]),
                StringMatch::EndsWith => haystack.ends_with(&needle[..]),
                StringMatch::Contains => contains(&haystack, &needle),
            }
        }
    }
}

fn to_lower(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|b| b.to_ascii_lowercase()).collect()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[derive(Debug)]
enum PendingOp {
    And(Vec<Node>),
    Or(Vec<Node>),
}

#[derive(Debug)]
struct Frame {
    pending: PendingOp,
}

impl Frame {
    fn new() -> Self {
        Self { pending: PendingOp::And(Vec::new()) }
    }

    fn push(&mut self, node: Node) {
        match &mut self.pending {
            PendingOp::And(nodes) | PendingOp::Or(nodes) => nodes.push(node),
        }
    }

    fn split_into_or(&mut self) {
        let nodes = match std::mem::replace(&mut self.pending, PendingOp::And(Vec::new())) {
            PendingOp::And(nodes) => nodes,
            PendingOp::Or(nodes) => nodes,
        };
        let grouped = if nodes.len() == 1 {
            nodes.into_iter().next().unwrap()
        } else {
            Node::And(nodes)
        };
        match &mut self.pending {
            PendingOp::Or(branches) => branches.push(grouped),
            PendingOp::And(_) => self.pending = PendingOp::Or(vec![grouped]),
        }
    }

    fn finish(self) -> Node {
        match self.pending {
            PendingOp::And(nodes) if nodes.len() == 1 => nodes.into_iter().next().unwrap(),
            PendingOp::And(nodes) => Node::And(nodes),
            PendingOp::Or(mut branches) => {
                branches.retain(|n| !matches!(n, Node::And(v) if v.is_empty()));
                Node::Or(branches)
            }
        }
    }
}

/// Resolves column names to indices and type-checks each leaf against the
/// schema as it's added, per spec.md §4.7's assembly rules.
#[derive(Debug)]
pub struct QueryBuilder<'t> {
    table: &'t Table,
    column_count: usize,
    stack: Vec<Frame>,
    subtable_stack: Vec<(usize, Vec<Frame>)>,
}

impl<'t> QueryBuilder<'t> {
    pub fn new(alloc: &impl Allocator, table: &'t Table) -> Self {
        Self {
            table,
            column_count: table.column_count(alloc),
            stack: vec![Frame::new()],
            subtable_stack: Vec::new(),
        }
    }

    fn column_index(&self, alloc: &impl Allocator, name: &str) -> Result<usize, MalformedQuery> {
        for col in 0..self.column_count {
            if self.table.column_name(alloc, col) == name {
                return Ok(col);
            }
        }
        Err(MalformedQuery::UnknownColumn(name.to_string()))
    }

    fn top(&mut self) -> &mut Frame {
        self.stack.last_mut().expect("builder stack never empties")
    }

    pub fn left_paren(&mut self) -> &mut Self {
        self.stack.push(Frame::new());
        self
    }

    pub fn right_paren(&mut self) -> Result<&mut Self, MalformedQuery> {
        if self.stack.len() < 2 {
            return Err(MalformedQuery::UnbalancedParens);
        }
        let group = self.stack.pop().unwrap().finish();
        self.top().push(group);
        Ok(self)
    }

    pub fn or(&mut self) -> &mut Self {
        self.top().split_into_or();
        self
    }

    pub fn subtable(&mut self, alloc: &impl Allocator, column: &str) -> Result<&mut Self, MalformedQuery> {
        let col = self.column_index(alloc, column)?;
        if self.table.column_type(alloc, col) != ColumnType::Subtable {
            return Err(MalformedQuery::TypeMismatch { column: column.to_string() });
        }
        let saved = std::mem::replace(&mut self.stack, vec![Frame::new()]);
        self.subtable_stack.push((col, saved));
        Ok(self)
    }

    pub fn parent(&mut self) -> Result<&mut Self, MalformedQuery> {
        let (col, saved) = self.subtable_stack.pop().ok_or(MalformedQuery::NoOpenSubtableScope)?;
        if self.stack.len() != 1 {
            return Err(MalformedQuery::UnbalancedParens);
        }
        let inner = self.stack.pop().unwrap().finish();
        if matches!(&inner, Node::And(v) if v.is_empty()) {
            return Err(MalformedQuery::EmptySubtableScope);
        }
        self.stack = saved;
        self.top().push(Node::SubtableDescend { column: col, inner: Box::new(inner) });
        Ok(self)
    }

    fn push_leaf(&mut self, alloc: &impl Allocator, column: &str, expected: ColumnType, op: LeafOp) -> Result<&mut Self, MalformedQuery> {
        let col = self.column_index(alloc, column)?;
        let actual = self.table.column_type(alloc, col);
        let matches_type = actual == expected
            || (expected == ColumnType::Int && actual == ColumnType::Bool)
            || (expected == ColumnType::Bool && actual == ColumnType::Int);
        if !matches_type {
            return Err(MalformedQuery::TypeMismatch { column: column.to_string() });
        }
        self.top().push(Node::Leaf { column: col, op });
        Ok(self)
    }

    pub fn int_eq(&mut self, alloc: &impl Allocator, column: &str, v: i64) -> Result<&mut Self, MalformedQuery> {
        self.push_leaf(alloc, column, ColumnType::Int, LeafOp::Int(IntOp::Equal(v)))
    }

    pub fn int_ne(&mut self, alloc: &impl Allocator, column: &str, v: i64) -> Result<&mut Self, MalformedQuery> {
        self.push_leaf(alloc, column, ColumnType::Int, LeafOp::Int(IntOp::NotEqual(v)))
    }

    pub fn int_gt(&mut self, alloc: &impl Allocator, column: &str, v: i64) -> Result<&mut Self, MalformedQuery> {
        self.push_leaf(alloc, column, ColumnType::Int, LeafOp::Int(IntOp::Greater(v)))
    }

    pub fn int_lt(&mut self, alloc: &impl Allocator, column: &str, v: i64) -> Result<&mut Self, MalformedQuery> {
        self.push_leaf(alloc, column, ColumnType::Int, LeafOp::Int(IntOp::Less(v)))
    }

    pub fn int_between(&mut self, alloc: &impl Allocator, column: &str, lo: i64, hi: i64) -> Result<&mut Self, MalformedQuery> {
        self.push_leaf(alloc, column, ColumnType::Int, LeafOp::Int(IntOp::Between(lo, hi)))
    }

    pub fn bool_eq(&mut self, alloc: &impl Allocator, column: &str, v: bool) -> Result<&mut Self, MalformedQuery> {
        self.push_leaf(alloc, column, ColumnType::Bool, LeafOp::Bool(v))
    }

    fn string_leaf(&mut self, alloc: &impl Allocator, column: &str, op: StringMatch, value: &[u8], case_sensitive: bool) -> Result<&mut Self, MalformedQuery> {
        self.push_leaf(
            alloc,
            column,
            ColumnType::String,
            LeafOp::Str(StringOp { op, value: value.to_vec(), case_sensitive }),
        )
    }

    pub fn str_eq(&mut self, alloc: &impl Allocator, column: &str, v: &[u8], case_sensitive: bool) -> Result<&mut Self, MalformedQuery> {
        self.string_leaf(alloc, column, StringMatch::Equal, v, case_sensitive)
    }

    pub fn str_ne(&mut self, alloc: &impl Allocator, column: &str, v: &[u8], case_sensitive: bool) -> Result<&mut Self, MalformedQuery> {
        self.string_leaf(alloc, column, StringMatch::NotEqual, v, case_sensitive)
    }

    pub fn str_begins_with(&mut self, alloc: &impl Allocator, column: &str, v: &[u8], case_sensitive: bool) -> Result<&mut Self, MalformedQuery> {
        self.string_leaf(alloc, column, StringMatch::BeginsWith, v, case_sensitive)
    }

    pub fn str_ends_with(&mut self, alloc: &impl Allocator, column: &str, v: &[u8], case_sensitive: bool) -> Result<&mut Self, MalformedQuery> {
        self.string_leaf(alloc, column, StringMatch::EndsWith, v, case_sensitive)
    }

    pub fn str_contains(&mut self, alloc: &impl Allocator, column: &str, v: &[u8], case_sensitive: bool) -> Result<&mut Self, MalformedQuery> {
        self.string_leaf(alloc, column, StringMatch::Contains, v, case_sensitive)
    }

    pub fn build(mut self) -> Result<Query, MalformedQuery> {
        if !self.subtable_stack.is_empty() {
            return Err(MalformedQuery::NoOpenSubtableScope);
        }
        if self.stack.len() != 1 {
            return Err(MalformedQuery::UnbalancedParens);
        }
        let root = self.stack.pop().unwrap().finish();
        Ok(Query { root })
    }
}

/// A logical view over the rows that matched a query: a row-index sequence
/// plus the row-count back-reference used by `range`/`limit`. Materialising
/// the selected rows into a standalone `Table` is a separate, explicit
/// request (spec.md §4.7).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableView {
    rows: Vec<usize>,
}

impl TableView {
    pub fn from_rows(rows: Vec<usize>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_row_indices(&self) -> &[usize] {
        &self.rows
    }

    pub fn sort(mut self) -> Self {
        self.rows.sort_unstable();
        self
    }

    pub fn sort_by_key(mut self, alloc: &impl Allocator, table: &Table, column: usize) -> Self {
        self.rows.sort_by_key(|&row| table.get_int(alloc, column, row));
        self
    }

    pub fn range(mut self, from: usize, to: usize) -> Self {
        let to = to.min(self.rows.len());
        let from = from.min(to);
        self.rows = self.rows[from..to].to_vec();
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.rows.truncate(n);
        self
    }
}

pub fn find_all(alloc: &impl Allocator, table: &Table, query: &Query) -> TableView {
    TableView::from_rows(query.find_all(alloc, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;
    use crate::table::{ColumnType, Table};

    fn sample(alloc: &mut HeapAllocator) -> Table {
        let mut t = Table::create(alloc).unwrap();
        t.register_column(alloc, ColumnType::Int, "age").unwrap();
        t.register_column(alloc, ColumnType::String, "name").unwrap();
        t.register_column(alloc, ColumnType::Bool, "active").unwrap();
        for (age, name, active) in [(30i64, "ada", true), (17, "bo", false), (42, "cy", true)] {
            t.add_empty_row(alloc).unwrap();
            let row = t.size(alloc) - 1;
            t.set_int(alloc, 0, row, age).unwrap();
            t.set_string(alloc, 1, row, name.as_bytes()).unwrap();
            t.set_bool(alloc, 2, row, active).unwrap();
        }
        t
    }

    #[test]
    fn implicit_conjunction_between_leaves() {
        let mut alloc = HeapAllocator::new();
        let t = sample(&mut alloc);
        let mut b = QueryBuilder::new(&alloc, &t);
        b.int_gt(&alloc, "age", 18).unwrap().bool_eq(&alloc, "active", true).unwrap();
        let q = b.build().unwrap();
        assert_eq!(q.find_all(&alloc, &t), vec![0, 2]);
    }

    #[test]
    fn or_splits_current_group() {
        let mut alloc = HeapAllocator::new();
        let t = sample(&mut alloc);
        let mut b = QueryBuilder::new(&alloc, &t);
        b.int_eq(&alloc, "age", 17).unwrap().or().str_eq(&alloc, "name", b"cy", true).unwrap();
        let q = b.build().unwrap();
        assert_eq!(q.find_all(&alloc, &t), vec![1, 2]);
    }

    #[test]
    fn parenthesised_group_scopes_or() {
        let mut alloc = HeapAllocator::new();
        let t = sample(&mut alloc);
        let mut b = QueryBuilder::new(&alloc, &t);
        b.bool_eq(&alloc, "active", true)
            .unwrap()
            .left_paren()
            .int_eq(&alloc, "age", 30)
            .unwrap()
            .or()
            .int_eq(&alloc, "age", 999)
            .unwrap()
            .right_paren()
            .unwrap();
        let q = b.build().unwrap();
        assert_eq!(q.find_all(&alloc, &t), vec![0]);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let mut alloc = HeapAllocator::new();
        let t = sample(&mut alloc);
        let mut b = QueryBuilder::new(&alloc, &t);
        let err = b.int_eq(&alloc, "nope", 1).unwrap_err();
        assert_eq!(err, MalformedQuery::UnknownColumn("nope".to_string()));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut alloc = HeapAllocator::new();
        let t = sample(&mut alloc);
        let mut b = QueryBuilder::new(&alloc, &t);
        let err = b.int_eq(&alloc, "name", 1).unwrap_err();
        assert_eq!(err, MalformedQuery::TypeMismatch { column: "name".to_string() });
    }

    #[test]
    fn unbalanced_right_paren_is_rejected() {
        let mut alloc = HeapAllocator::new();
        let t = sample(&mut alloc);
        let mut b = QueryBuilder::new(&alloc, &t);
        assert_eq!(b.right_paren().unwrap_err(), MalformedQuery::UnbalancedParens);
    }

    #[test]
    fn table_view_supports_sort_range_and_limit() {
        let view = TableView::from_rows(vec![5, 1, 3, 2, 4]);
        let sorted = view.sort();
        assert_eq!(sorted.to_row_indices(), &[1, 2, 3, 4, 5]);
        let ranged = sorted.range(1, 4);
        assert_eq!(ranged.to_row_indices(), &[2, 3, 4]);
        let limited = ranged.limit(2);
        assert_eq!(limited.to_row_indices(), &[2, 3]);
    }
}
