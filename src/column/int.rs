//! Integer column: either a single leaf [`Array`], or a B+tree of them keyed
//! by row index (spec.md §4.3).
//!
//! Every inner node is itself an `Array` with `is_node = true, has_refs =
//! true` holding exactly two child refs: an *offsets* array (prefix sums of
//! child row counts) and a *children* array (one ref per child subtree,
//! recursively either a leaf or another node). Descent picks the smallest
//! `i` with `row < offsets[i]`.

use crate::alloc::Allocator;
use crate::array::{Array, ParentLink};
use crate::error::AllocError;
use crate::region::Ref;

use super::MAX_NODE_ENTRIES;

/// Leaves stay below this many elements before splitting; chosen to match
/// the `MAX_NODE_ENTRIES` fan-out bound (spec.md §4.3 "configurable,
/// default ≈1000 entries for integer leaves").
pub const LEAF_SOFT_LIMIT: usize = 1000;

#[derive(Clone, Debug)]
pub struct IntColumn {
    root: Array,
}

/// Result of a recursive insert that overflowed a node: the node/leaf that
/// was operated on now holds the left portion in place, and this carries
/// the row count of that left portion plus the ref of a freshly allocated
/// sibling holding the right portion — ready to be spliced into the parent,
/// or wrapped in a fresh root if the split reached the top.
struct Split {
    left_len: usize,
    sibling_ref: Ref,
}

impl IntColumn {
    pub fn create(alloc: &mut impl Allocator) -> Result<Self, AllocError> {
        Ok(Self {
            root: Array::create(alloc, false)?,
        })
    }

    pub fn from_root(root: Array) -> Self {
        Self { root }
    }

    pub fn root_ref(&self) -> Ref {
        self.root.ref_()
    }

    pub fn size(&self, alloc: &impl Allocator) -> usize {
        Self::size_of(&self.root, alloc)
    }

    fn size_of(node: &Array, alloc: &impl Allocator) -> usize {
        if node.is_node(alloc) {
            let offsets = Self::offsets_of(node, alloc);
            let n = offsets.size(alloc);
            if n == 0 {
                0
            } else {
                offsets.get(alloc, n - 1) as usize
            }
        } else {
            node.size(alloc)
        }
    }

    fn offsets_of(node: &Array, alloc: &impl Allocator) -> Array {
        Array::open(
            alloc,
            node.get_ref(alloc, 0),
            Some(ParentLink {
                parent_ref: node.ref_(),
                index_in_parent: 0,
            }),
        )
        .expect("column offsets array corrupted")
    }

    fn children_of(node: &Array, alloc: &impl Allocator) -> Array {
        Array::open(
            alloc,
            node.get_ref(alloc, 1),
            Some(ParentLink {
                parent_ref: node.ref_(),
                index_in_parent: 1,
            }),
        )
        .expect("column children array corrupted")
    }

    /// Smallest `i` with `row < offsets[i]`, and the row index local to
    /// that child (spec.md §4.3 "Navigation").
    fn locate(offsets: &Array, alloc: &impl Allocator, row: usize) -> (usize, usize) {
        let n = offsets.size(alloc);
        let mut base = 0usize;
        for i in 0..n {
            let end = offsets.get(alloc, i) as usize;
            if row < end {
                return (i, row - base);
            }
            base = end;
        }
        panic!("row {row} out of bounds for column node");
    }

    fn open_child(children: &Array, alloc: &impl Allocator, idx: usize) -> Array {
        let child_ref = children.get_ref(alloc, idx);
        Array::open(
            alloc,
            child_ref,
            Some(ParentLink {
                parent_ref: children.ref_(),
                index_in_parent: idx,
            }),
        )
        .expect("column child corrupted")
    }

    pub fn get(&self, alloc: &impl Allocator, row: usize) -> i64 {
        Self::get_at(&self.root, alloc, row)
    }

    fn get_at(node: &Array, alloc: &impl Allocator, row: usize) -> i64 {
        if !node.is_node(alloc) {
            return node.get(alloc, row);
        }
        let offsets = Self::offsets_of(node, alloc);
        let children = Self::children_of(node, alloc);
        let (idx, local_row) = Self::locate(&offsets, alloc, row);
        let child = Self::open_child(&children, alloc, idx);
        Self::get_at(&child, alloc, local_row)
    }

    pub fn set(&mut self, alloc: &mut impl Allocator, row: usize, v: i64) -> Result<(), AllocError> {
        Self::set_at(&mut self.root, alloc, row, v)
    }

    fn set_at(node: &mut Array, alloc: &mut impl Allocator, row: usize, v: i64) -> Result<(), AllocError> {
        if !node.is_node(alloc) {
            return node.set(alloc, row, v);
        }
        let offsets = Self::offsets_of(node, alloc);
        let mut children = Self::children_of(node, alloc);
        let (idx, local_row) = Self::locate(&offsets, alloc, row);
        let mut child = Self::open_child(&children, alloc, idx);
        Self::set_at(&mut child, alloc, local_row, v)?;
        children.set_ref(alloc, idx, child.ref_())
    }

    pub fn add(&mut self, alloc: &mut impl Allocator, v: i64) -> Result<(), AllocError> {
        let n = self.size(alloc);
        self.insert(alloc, n, v)
    }

    pub fn insert(&mut self, alloc: &mut impl Allocator, row: usize, v: i64) -> Result<(), AllocError> {
        if let Some(split) = Self::insert_at(&mut self.root, alloc, row, v)? {
            self.wrap_new_root(alloc, split)?;
        }
        Ok(())
    }

    fn insert_at(
        node: &mut Array,
        alloc: &mut impl Allocator,
        row: usize,
        v: i64,
    ) -> Result<Option<Split>, AllocError> {
        if !node.is_node(alloc) {
            node.insert(alloc, row, v)?;
            if node.size(alloc) > LEAF_SOFT_LIMIT {
                return Ok(Some(Self::split_leaf(node, alloc)?));
            }
            return Ok(None);
        }

        let mut offsets = Self::offsets_of(node, alloc);
        let mut children = Self::children_of(node, alloc);
        let (idx, local_row) = Self::locate(&offsets, alloc, row);
        let mut child = Self::open_child(&children, alloc, idx);

        let child_split = Self::insert_at(&mut child, alloc, local_row, v)?;

        // The row landed inside child `idx`'s subtree, so every boundary
        // from `idx` onward shifts right by one.
        Self::bump_offsets_from(&mut offsets, alloc, idx, 1)?;
        children.set_ref(alloc, idx, child.ref_())?;

        if let Some(child_split) = child_split {
            let base = if idx == 0 {
                0
            } else {
                offsets.get(alloc, idx - 1) as usize
            };
            offsets.insert(alloc, idx, (base + child_split.left_len) as i64)?;
            children.insert_ref(alloc, idx + 1, child_split.sibling_ref)?;

            if children.size(alloc) > MAX_NODE_ENTRIES {
                return Ok(Some(Self::split_node(node, alloc, &mut offsets, &mut children)?));
            }
        }

        Ok(None)
    }

    fn bump_offsets_from(
        offsets: &mut Array,
        alloc: &mut impl Allocator,
        from: usize,
        delta: i64,
    ) -> Result<(), AllocError> {
        let n = offsets.size(alloc);
        for i in from..n {
            let v = offsets.get(alloc, i);
            offsets.set(alloc, i, v + delta)?;
        }
        Ok(())
    }

    /// Split a leaf roughly in half, returning the left length and the new
    /// sibling's ref; `leaf` is rewritten in place to hold only the left
    /// half (spec.md §4.3 "split into two leaves of roughly equal size").
    fn split_leaf(leaf: &mut Array, alloc: &mut impl Allocator) -> Result<Split, AllocError> {
        let mut values = leaf.to_vec(alloc);
        let right = values.split_off(values.len() / 2);
        let left_len = values.len();
        leaf.reset_with(alloc, &values)?;
        let mut sibling = Array::create(alloc, false)?;
        sibling.reset_with(alloc, &right)?;
        Ok(Split {
            left_len,
            sibling_ref: sibling.ref_(),
        })
    }

    /// Split an overflowing inner node: move the right half of its
    /// offsets/children into a freshly allocated sibling node, re-basing
    /// the sibling's offsets to start at zero.
    fn split_node(
        node: &mut Array,
        alloc: &mut impl Allocator,
        offsets: &mut Array,
        children: &mut Array,
    ) -> Result<Split, AllocError> {
        let all_offsets = offsets.to_vec(alloc);
        let all_children = children.to_vec(alloc);
        let mid = all_children.len() / 2;

        let left_len = all_offsets[mid - 1] as usize;
        let (left_offsets, right_offsets_abs) = all_offsets.split_at(mid);
        let right_offsets: Vec<i64> = right_offsets_abs.iter().map(|o| o - left_len as i64).collect();
        let (left_children, right_children) = all_children.split_at(mid);

        offsets.reset_with(alloc, left_offsets)?;
        children.reset_with(alloc, left_children)?;

        let mut sibling_offsets = Array::create(alloc, false)?;
        sibling_offsets.reset_with(alloc, &right_offsets)?;
        let mut sibling_children = Array::create(alloc, true)?;
        sibling_children.reset_with(alloc, right_children)?;

        let mut sibling_node = Array::create_node(alloc)?;
        sibling_node.add_ref(alloc, sibling_offsets.ref_())?;
        sibling_node.add_ref(alloc, sibling_children.ref_())?;

        let _ = node; // left half stays in place under the existing node ref
        Ok(Split {
            left_len,
            sibling_ref: sibling_node.ref_(),
        })
    }

    fn wrap_new_root(&mut self, alloc: &mut impl Allocator, split: Split) -> Result<(), AllocError> {
        let left_len = split.left_len as i64;
        let right_len = Self::size_of(&self.root, alloc) as i64 - left_len;
        let mut offsets = Array::create(alloc, false)?;
        offsets.add(alloc, left_len)?;
        offsets.add(alloc, left_len + right_len)?;
        let mut children = Array::create(alloc, true)?;
        children.add_ref(alloc, self.root.ref_())?;
        children.add_ref(alloc, split.sibling_ref)?;
        let mut new_root = Array::create_node(alloc)?;
        new_root.add_ref(alloc, offsets.ref_())?;
        new_root.add_ref(alloc, children.ref_())?;
        self.root = new_root;
        Ok(())
    }

    /// Remove the row at `row`. No rebalancing is performed: per spec.md
    /// §4.3 underflowed leaves/nodes are tolerated and simply shrink.
    pub fn erase(&mut self, alloc: &mut impl Allocator, row: usize) -> Result<(), AllocError> {
        Self::erase_at(&mut self.root, alloc, row)
    }

    fn erase_at(node: &mut Array, alloc: &mut impl Allocator, row: usize) -> Result<(), AllocError> {
        if !node.is_node(alloc) {
            return node.erase(alloc, row);
        }
        let mut offsets = Self::offsets_of(node, alloc);
        let mut children = Self::children_of(node, alloc);
        let (idx, local_row) = Self::locate(&offsets, alloc, row);
        let mut child = Self::open_child(&children, alloc, idx);
        Self::erase_at(&mut child, alloc, local_row)?;
        children.set_ref(alloc, idx, child.ref_())?;
        Self::bump_offsets_from(&mut offsets, alloc, idx, -1)
    }

    pub fn clear(&mut self, alloc: &mut impl Allocator) -> Result<(), AllocError> {
        if self.root.is_node(alloc) {
            self.root.destroy(alloc);
            self.root = Array::create(alloc, false)?;
        } else {
            self.root.clear(alloc)?;
        }
        Ok(())
    }

    pub fn destroy(&self, alloc: &mut impl Allocator) {
        self.root.destroy(alloc);
    }

    fn for_each_leaf(node: &Array, alloc: &impl Allocator, f: &mut impl FnMut(&Array)) {
        if !node.is_node(alloc) {
            f(node);
            return;
        }
        let children = Self::children_of(node, alloc);
        for i in 0..children.size(alloc) {
            let child = Self::open_child(&children, alloc, i);
            Self::for_each_leaf(&child, alloc, f);
        }
    }

    pub fn find_first(&self, alloc: &impl Allocator, value: i64) -> Option<usize> {
        let mut base = 0usize;
        let mut found = None;
        Self::for_each_leaf(&self.root, alloc, &mut |leaf| {
            if found.is_none() {
                let n = leaf.size(alloc);
                for i in 0..n {
                    if leaf.get(alloc, i) == value {
                        found = Some(base + i);
                        break;
                    }
                }
                base += n;
            }
        });
        found
    }

    pub fn find_all(&self, alloc: &mut impl Allocator, value: i64, out: &mut IntColumn) -> Result<(), AllocError> {
        let mut base = 0usize;
        let mut matches = Vec::new();
        Self::for_each_leaf(&self.root, &*alloc, &mut |leaf| {
            let n = leaf.size(alloc);
            for i in 0..n {
                if leaf.get(alloc, i) == value {
                    matches.push((base + i) as i64);
                }
            }
            base += n;
        });
        for row in matches {
            out.add(alloc, row)?;
        }
        Ok(())
    }

    pub fn sum(&self, alloc: &impl Allocator) -> i128 {
        let mut total: i128 = 0;
        Self::for_each_leaf(&self.root, alloc, &mut |leaf| {
            for i in 0..leaf.size(alloc) {
                total += leaf.get(alloc, i) as i128;
            }
        });
        total
    }

    pub fn min(&self, alloc: &impl Allocator) -> Option<i64> {
        let mut min = None;
        Self::for_each_leaf(&self.root, alloc, &mut |leaf| {
            for i in 0..leaf.size(alloc) {
                let v = leaf.get(alloc, i);
                min = Some(min.map_or(v, |m: i64| m.min(v)));
            }
        });
        min
    }

    pub fn max(&self, alloc: &impl Allocator) -> Option<i64> {
        let mut max = None;
        Self::for_each_leaf(&self.root, alloc, &mut |leaf| {
            for i in 0..leaf.size(alloc) {
                let v = leaf.get(alloc, i);
                max = Some(max.map_or(v, |m: i64| m.max(v)));
            }
        });
        max
    }

    pub fn average(&self, alloc: &impl Allocator) -> Option<f64> {
        let n = self.size(alloc);
        if n == 0 {
            return None;
        }
        Some(self.sum(alloc) as f64 / n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;

    #[test]
    fn leaf_column_basic_ops() {
        let mut alloc = HeapAllocator::new();
        let mut col = IntColumn::create(&mut alloc).unwrap();
        for v in [0i64, 1, -1, 1000, -1000, 1i64 << 40] {
            col.add(&mut alloc, v).unwrap();
        }
        assert_eq!(col.size(&alloc), 6);
        assert_eq!(col.find_first(&alloc, -1000), Some(4));
        assert_eq!(col.sum(&alloc), (1i64 << 40) as i128 + 999);
    }

    #[test]
    fn btree_split_preserves_order_and_values() {
        let mut alloc = HeapAllocator::new();
        let mut col = IntColumn::create(&mut alloc).unwrap();
        for i in 0..10_000i64 {
            col.insert(&mut alloc, i as usize, i).unwrap();
        }
        assert_eq!(col.size(&alloc), 10_000);
        for i in 0..10_000usize {
            assert_eq!(col.get(&alloc, i), i as i64);
        }
        assert!(col.root.is_node(&alloc));
    }

    #[test]
    fn erase_does_not_rebalance_but_shrinks_offsets() {
        let mut alloc = HeapAllocator::new();
        let mut col = IntColumn::create(&mut alloc).unwrap();
        for i in 0..3_000i64 {
            col.add(&mut alloc, i).unwrap();
        }
        col.erase(&mut alloc, 0).unwrap();
        assert_eq!(col.size(&alloc), 2999);
        assert_eq!(col.get(&alloc, 0), 1);
        assert_eq!(col.get(&alloc, 2998), 2999);
    }

    #[test]
    fn find_all_collects_every_match() {
        let mut alloc = HeapAllocator::new();
        let mut col = IntColumn::create(&mut alloc).unwrap();
        for v in [1, 2, 1, 3, 1] {
            col.add(&mut alloc, v).unwrap();
        }
        let mut out = IntColumn::create(&mut alloc).unwrap();
        col.find_all(&mut alloc, 1, &mut out).unwrap();
        assert_eq!(out.to_vec_for_test(&alloc), vec![0, 2, 4]);
    }

    #[test]
    fn random_append_order_keeps_each_value_findable() {
        use rand::seq::SliceRandom;
        use rand::thread_rng;

        let mut values: Vec<i64> = (0..5_000).collect();
        values.shuffle(&mut thread_rng());

        let mut alloc = HeapAllocator::new();
        let mut col = IntColumn::create(&mut alloc).unwrap();
        for &v in &values {
            col.add(&mut alloc, v).unwrap();
        }

        assert_eq!(col.size(&alloc), 5_000);
        assert_eq!(col.sum(&alloc), (0..5_000i64).map(|v| v as i128).sum::<i128>());
        for (row, &v) in values.iter().enumerate() {
            assert_eq!(col.get(&alloc, row), v);
        }
    }

    #[test]
    fn aggregates_over_a_split_tree() {
        let mut alloc = HeapAllocator::new();
        let mut col = IntColumn::create(&mut alloc).unwrap();
        for i in 0..3_000i64 {
            col.add(&mut alloc, i).unwrap();
        }
        assert_eq!(col.min(&alloc), Some(0));
        assert_eq!(col.max(&alloc), Some(2999));
        assert_eq!(col.sum(&alloc), (0..3000i64).map(|v| v as i128).sum::<i128>());
        assert_eq!(col.average(&alloc), Some(1499.5));
    }
}

#[cfg(test)]
impl IntColumn {
    fn to_vec_for_test(&self, alloc: &impl Allocator) -> Vec<i64> {
        let mut out = Vec::with_capacity(self.size(alloc));
        for i in 0..self.size(alloc) {
            out.push(self.get(alloc, i));
        }
        out
    }
}
