//! `AdaptiveStringColumn`: two leaf storage strategies promoted on demand
//! (spec.md §4.4).
//!
//! *Short form* packs every row into a fixed-size, null-terminated slot
//! (16/32/64 bytes, picked as the smallest that fits every row so far).
//! *Long form* stores an offsets array of cumulative end positions next to
//! a single blob of concatenated bytes. Both shapes, and the column's own
//! B+tree-of-leaves promotion once a leaf grows past
//! [`STRING_LEAF_SOFT_LIMIT`], reuse [`Array`]'s 8-byte header so every
//! on-region node — leaf or inner — stays distinguishable purely by header
//! flags (spec.md §9 "Polymorphism without inheritance"):
//!
//! - `is_node` set: a B+tree inner node, exactly like [`super::int::IntColumn`].
//! - `is_node` clear, `has_refs` set: a long-form leaf — its two refs are
//!   `[offsets_ref, blob_ref]`.
//! - `is_node` clear, `has_refs` clear: a short-form leaf, a raw byte
//!   buffer whose own 8-byte sub-header (distinct from the `Array` header
//!   that precedes it) records `(slot_width, row_count)`.
//!
//! That sub-header is this crate's resolution of an ambiguity in the
//! storage contract: spec.md §3.1 describes short-form slots as "w ∈ {64,
//! 128, 256} bits", which doesn't fit the 3-bit width code the universal
//! `Array` header can express (max 64 bits), while spec.md §4.4 gives the
//! concrete, actionable contract ("slot width s ∈ {16, 32, 64}", doubling
//! on promotion) used here — see `DESIGN.md` for the write-up.

use crate::alloc::Allocator;
use crate::array::{decode_header, encode_header, Array, ArrayHeader, ParentLink, Width, HEADER_LEN};
use crate::error::AllocError;
use crate::region::Ref;

pub const STRING_LEAF_SOFT_LIMIT: usize = 500;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Form {
    Short16,
    Short32,
    Short64,
    Long,
}

impl Form {
    fn slot_width(self) -> Option<usize> {
        match self {
            Form::Short16 => Some(16),
            Form::Short32 => Some(32),
            Form::Short64 => Some(64),
            Form::Long => None,
        }
    }

    fn for_value_len(len: usize) -> Form {
        if len + 1 <= 16 {
            Form::Short16
        } else if len + 1 <= 32 {
            Form::Short32
        } else if len + 1 <= 64 {
            Form::Short64
        } else {
            Form::Long
        }
    }
}

/// A raw, byte-granular buffer sharing `Array`'s 8-byte on-region header
/// but never auto-narrowing below byte width — used for short-form slots
/// and the long-form blob, neither of which are numeric sequences the
/// generic bit-packing in `array.rs` could safely pick a width for (an
/// all-zero or narrow-range string would otherwise get bit-packed below
/// byte granularity, breaking fixed-offset byte addressing).
struct RawLeaf {
    ref_: Ref,
}

impl RawLeaf {
    fn create(alloc: &mut impl Allocator) -> Result<Self, AllocError> {
        let ref_ = alloc.alloc(HEADER_LEN)?;
        alloc.write(
            ref_,
            &encode_header(ArrayHeader {
                is_node: false,
                has_refs: false,
                is_index_node: false,
                width: Width::W8,
                count: 0,
                capacity: 0,
            }),
        );
        Ok(Self { ref_ })
    }

    fn ref_(&self) -> Ref {
        self.ref_
    }

    fn header(&self, alloc: &impl Allocator) -> ArrayHeader {
        decode_header(alloc.read(self.ref_, HEADER_LEN)).expect("raw leaf header corrupted")
    }

    fn read(&self, alloc: &impl Allocator, start: usize, len: usize) -> Vec<u8> {
        alloc
            .read(self.ref_ + HEADER_LEN as Ref + start as Ref, len)
            .to_vec()
    }

    /// Overwrite the full contents; always reallocates when growing, and
    /// copy-on-writes through a read-only ref. Returns the (possibly
    /// unchanged) ref the bytes now live at.
    fn set_all(&mut self, alloc: &mut impl Allocator, bytes: &[u8]) -> Result<Ref, AllocError> {
        let h = self.header(alloc);
        if alloc.is_read_only(self.ref_) {
            let new_ref = alloc.alloc(HEADER_LEN + bytes.len())?;
            alloc.write(
                new_ref,
                &encode_header(ArrayHeader {
                    count: bytes.len() as u32,
                    capacity: bytes.len() as u32,
                    ..h
                }),
            );
            alloc.write(new_ref + HEADER_LEN as Ref, bytes);
            self.ref_ = new_ref;
            return Ok(self.ref_);
        }
        if bytes.len() <= h.capacity as usize {
            alloc.write(self.ref_ + HEADER_LEN as Ref, bytes);
            alloc.write(self.ref_, &encode_header(ArrayHeader { count: bytes.len() as u32, ..h }));
            return Ok(self.ref_);
        }
        let new_capacity = bytes.len().max((h.capacity as usize) * 2);
        let new_ref = alloc.realloc(self.ref_, HEADER_LEN + h.capacity as usize, HEADER_LEN + new_capacity)?;
        self.ref_ = new_ref;
        let mut padded = vec![0u8; new_capacity];
        padded[..bytes.len()].copy_from_slice(bytes);
        alloc.write(self.ref_ + HEADER_LEN as Ref, &padded);
        alloc.write(
            self.ref_,
            &encode_header(ArrayHeader {
                count: bytes.len() as u32,
                capacity: new_capacity as u32,
                ..h
            }),
        );
        Ok(self.ref_)
    }
}

fn short_sub_header(alloc: &impl Allocator, leaf_ref: Ref) -> (usize, usize) {
    let header = decode_header(alloc.read(leaf_ref, HEADER_LEN)).expect("leaf header corrupted");
    if header.count == 0 {
        return (0, 0);
    }
    let raw = alloc.read(leaf_ref + HEADER_LEN as Ref, 8);
    let slot_width = u32::from_le_bytes(raw[0..4].try_into().unwrap()) as usize;
    let row_count = u32::from_le_bytes(raw[4..8].try_into().unwrap()) as usize;
    (slot_width, row_count)
}

fn leaf_form(alloc: &impl Allocator, leaf_ref: Ref) -> Form {
    let header = decode_header(alloc.read(leaf_ref, HEADER_LEN)).expect("leaf header corrupted");
    if header.has_refs {
        return Form::Long;
    }
    match short_sub_header(alloc, leaf_ref).0 {
        0 | 16 => Form::Short16,
        32 => Form::Short32,
        _ => Form::Short64,
    }
}

fn leaf_row_count(alloc: &impl Allocator, leaf_ref: Ref) -> usize {
    let header = decode_header(alloc.read(leaf_ref, HEADER_LEN)).expect("leaf header corrupted");
    if header.has_refs {
        let array = Array::open(alloc, leaf_ref, None).expect("long-form leaf corrupted");
        let offsets = Array::open(alloc, array.get_ref(alloc, 0), None).expect("offsets corrupted");
        offsets.size(alloc)
    } else {
        short_sub_header(alloc, leaf_ref).1
    }
}

fn leaf_get(alloc: &impl Allocator, leaf_ref: Ref, row: usize) -> Vec<u8> {
    let header = decode_header(alloc.read(leaf_ref, HEADER_LEN)).expect("leaf header corrupted");
    if header.has_refs {
        let array = Array::open(alloc, leaf_ref, None).expect("long-form leaf corrupted");
        let offsets = Array::open(alloc, array.get_ref(alloc, 0), None).expect("offsets corrupted");
        let blob = RawLeaf { ref_: array.get_ref(alloc, 1) };
        let start = if row == 0 { 0 } else { offsets.get(alloc, row - 1) as usize };
        let end = offsets.get(alloc, row) as usize;
        blob.read(alloc, start, end - start)
    } else {
        let (slot_width, _) = short_sub_header(alloc, leaf_ref);
        let leaf = RawLeaf { ref_: leaf_ref };
        let raw = leaf.read(alloc, 8 + row * slot_width, slot_width);
        let end = raw.iter().position(|&b| b == 0).unwrap_or(slot_width);
        raw[..end].to_vec()
    }
}

fn leaf_rows(alloc: &impl Allocator, leaf_ref: Ref) -> Vec<Vec<u8>> {
    (0..leaf_row_count(alloc, leaf_ref))
        .map(|i| leaf_get(alloc, leaf_ref, i))
        .collect()
}

fn build_short(alloc: &mut impl Allocator, rows: &[Vec<u8>], slot_width: usize) -> Result<Ref, AllocError> {
    let mut buf = Vec::with_capacity(8 + rows.len() * slot_width);
    buf.extend_from_slice(&(slot_width as u32).to_le_bytes());
    buf.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    for r in rows {
        debug_assert!(r.len() + 1 <= slot_width, "value does not fit the chosen slot width");
        let mut slot = vec![0u8; slot_width];
        slot[..r.len()].copy_from_slice(r);
        buf.extend_from_slice(&slot);
    }
    let mut leaf = RawLeaf::create(alloc)?;
    leaf.set_all(alloc, &buf)?;
    Ok(leaf.ref_())
}

fn build_long(alloc: &mut impl Allocator, rows: &[Vec<u8>]) -> Result<Ref, AllocError> {
    let mut ends = Vec::with_capacity(rows.len());
    let mut end = 0i64;
    let mut blob_bytes = Vec::new();
    for r in rows {
        end += r.len() as i64;
        ends.push(end);
        blob_bytes.extend_from_slice(r);
    }
    let mut offsets = Array::create(alloc, false)?;
    offsets.reset_with(alloc, &ends)?;
    let mut blob = RawLeaf::create(alloc)?;
    blob.set_all(alloc, &blob_bytes)?;
    let mut node = Array::create(alloc, true)?;
    node.add_ref(alloc, offsets.ref_())?;
    node.add_ref(alloc, blob.ref_())?;
    Ok(node.ref_())
}

/// Build a fresh leaf holding exactly `rows`, in a form at least as wide
/// as `min_form` (spec.md §8 invariant 6: a leaf's form only ever grows).
fn leaf_build(alloc: &mut impl Allocator, rows: &[Vec<u8>], min_form: Form) -> Result<Ref, AllocError> {
    let required = rows
        .iter()
        .map(|r| Form::for_value_len(r.len()))
        .fold(Form::Short16, Form::max);
    let form = min_form.max(required);
    match form.slot_width() {
        Some(w) => build_short(alloc, rows, w),
        None => build_long(alloc, rows),
    }
}

fn leaf_destroy_if_owned(alloc: &mut impl Allocator, leaf_ref: Ref) {
    if alloc.is_read_only(leaf_ref) {
        return;
    }
    let header = decode_header(alloc.read(leaf_ref, HEADER_LEN)).expect("leaf header corrupted");
    if header.has_refs {
        Array::open(alloc, leaf_ref, None)
            .expect("long-form leaf corrupted")
            .destroy(alloc);
    } else {
        alloc.free(leaf_ref, HEADER_LEN + header.capacity as usize);
    }
}

fn leaf_insert(alloc: &mut impl Allocator, leaf_ref: Ref, row: usize, value: &[u8]) -> Result<Ref, AllocError> {
    let min_form = leaf_form(alloc, leaf_ref);
    let mut rows = leaf_rows(alloc, leaf_ref);
    rows.insert(row, value.to_vec());
    let new_ref = leaf_build(alloc, &rows, min_form)?;
    if new_ref != leaf_ref {
        leaf_destroy_if_owned(alloc, leaf_ref);
    }
    Ok(new_ref)
}

fn leaf_set(alloc: &mut impl Allocator, leaf_ref: Ref, row: usize, value: &[u8]) -> Result<Ref, AllocError> {
    let min_form = leaf_form(alloc, leaf_ref);
    let mut rows = leaf_rows(alloc, leaf_ref);
    rows[row] = value.to_vec();
    let new_ref = leaf_build(alloc, &rows, min_form)?;
    if new_ref != leaf_ref {
        leaf_destroy_if_owned(alloc, leaf_ref);
    }
    Ok(new_ref)
}

fn leaf_erase(alloc: &mut impl Allocator, leaf_ref: Ref, row: usize) -> Result<Ref, AllocError> {
    let min_form = leaf_form(alloc, leaf_ref);
    let mut rows = leaf_rows(alloc, leaf_ref);
    rows.remove(row);
    let new_ref = leaf_build(alloc, &rows, min_form)?;
    if new_ref != leaf_ref {
        leaf_destroy_if_owned(alloc, leaf_ref);
    }
    Ok(new_ref)
}

struct Split {
    left_len: usize,
    sibling_ref: Ref,
}

#[derive(Clone, Debug)]
pub struct AdaptiveStringColumn {
    root: Array,
}

impl AdaptiveStringColumn {
    pub fn create(alloc: &mut impl Allocator) -> Result<Self, AllocError> {
        let leaf_ref = leaf_build(alloc, &[], Form::Short16)?;
        Ok(Self {
            root: Array::open(alloc, leaf_ref, None).expect("freshly built leaf"),
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
            leaf_row_count(alloc, node.ref_())
        }
    }

    fn offsets_of(node: &Array, alloc: &impl Allocator) -> Array {
        Array::open(
            alloc,
            node.get_ref(alloc, 0),
            Some(ParentLink { parent_ref: node.ref_(), index_in_parent: 0 }),
        )
        .expect("column offsets array corrupted")
    }

    fn children_of(node: &Array, alloc: &impl Allocator) -> Array {
        Array::open(
            alloc,
            node.get_ref(alloc, 1),
            Some(ParentLink { parent_ref: node.ref_(), index_in_parent: 1 }),
        )
        .expect("column children array corrupted")
    }

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
        panic!("row {row} out of bounds for string column node");
    }

    fn open_child(children: &Array, alloc: &impl Allocator, idx: usize) -> Array {
        let child_ref = children.get_ref(alloc, idx);
        Array::open(
            alloc,
            child_ref,
            Some(ParentLink { parent_ref: children.ref_(), index_in_parent: idx }),
        )
        .expect("column child corrupted")
    }

    pub fn get(&self, alloc: &impl Allocator, row: usize) -> Vec<u8> {
        Self::get_at(&self.root, alloc, row)
    }

    pub fn get_str(&self, alloc: &impl Allocator, row: usize) -> String {
        String::from_utf8(self.get(alloc, row)).expect("non-utf8 bytes read through get_str")
    }

    fn get_at(node: &Array, alloc: &impl Allocator, row: usize) -> Vec<u8> {
        if !node.is_node(alloc) {
            return leaf_get(alloc, node.ref_(), row);
        }
        let offsets = Self::offsets_of(node, alloc);
        let children = Self::children_of(node, alloc);
        let (idx, local_row) = Self::locate(&offsets, alloc, row);
        let child = Self::open_child(&children, alloc, idx);
        Self::get_at(&child, alloc, local_row)
    }

    pub fn set(&mut self, alloc: &mut impl Allocator, row: usize, value: &[u8]) -> Result<(), AllocError> {
        Self::set_at(&mut self.root, alloc, row, value)
    }

    fn set_at(node: &mut Array, alloc: &mut impl Allocator, row: usize, value: &[u8]) -> Result<(), AllocError> {
        if !node.is_node(alloc) {
            let new_ref = leaf_set(alloc, node.ref_(), row, value)?;
            *node = Array::open(alloc, new_ref, node.parent()).expect("rebuilt leaf");
            return Ok(());
        }
        let offsets = Self::offsets_of(node, alloc);
        let mut children = Self::children_of(node, alloc);
        let (idx, local_row) = Self::locate(&offsets, alloc, row);
        let mut child = Self::open_child(&children, alloc, idx);
        Self::set_at(&mut child, alloc, local_row, value)?;
        children.set_ref(alloc, idx, child.ref_())
    }

    pub fn add(&mut self, alloc: &mut impl Allocator, value: &[u8]) -> Result<(), AllocError> {
        let n = self.size(alloc);
        self.insert(alloc, n, value)
    }

    pub fn insert(&mut self, alloc: &mut impl Allocator, row: usize, value: &[u8]) -> Result<(), AllocError> {
        if let Some(split) = Self::insert_at(&mut self.root, alloc, row, value)? {
            self.wrap_new_root(alloc, split)?;
        }
        Ok(())
    }

    fn insert_at(node: &mut Array, alloc: &mut impl Allocator, row: usize, value: &[u8]) -> Result<Option<Split>, AllocError> {
        if !node.is_node(alloc) {
            let new_ref = leaf_insert(alloc, node.ref_(), row, value)?;
            *node = Array::open(alloc, new_ref, node.parent()).expect("rebuilt leaf");
            if leaf_row_count(alloc, node.ref_()) > STRING_LEAF_SOFT_LIMIT {
                return Ok(Some(Self::split_leaf(node, alloc)?));
            }
            return Ok(None);
        }

        let mut offsets = Self::offsets_of(node, alloc);
        let mut children = Self::children_of(node, alloc);
        let (idx, local_row) = Self::locate(&offsets, alloc, row);
        let mut child = Self::open_child(&children, alloc, idx);

        let child_split = Self::insert_at(&mut child, alloc, local_row, value)?;

        Self::bump_offsets_from(&mut offsets, alloc, idx, 1)?;
        children.set_ref(alloc, idx, child.ref_())?;

        if let Some(child_split) = child_split {
            let base = if idx == 0 { 0 } else { offsets.get(alloc, idx - 1) as usize };
            offsets.insert(alloc, idx, (base + child_split.left_len) as i64)?;
            children.insert_ref(alloc, idx + 1, child_split.sibling_ref)?;

            if children.size(alloc) > super::MAX_NODE_ENTRIES {
                return Ok(Some(Self::split_node(node, alloc, &mut offsets, &mut children)?));
            }
        }

        Ok(None)
    }

    fn bump_offsets_from(offsets: &mut Array, alloc: &mut impl Allocator, from: usize, delta: i64) -> Result<(), AllocError> {
        let n = offsets.size(alloc);
        for i in from..n {
            let v = offsets.get(alloc, i);
            offsets.set(alloc, i, v + delta)?;
        }
        Ok(())
    }

    fn split_leaf(leaf: &mut Array, alloc: &mut impl Allocator) -> Result<Split, AllocError> {
        let rows = leaf_rows(alloc, leaf.ref_());
        let mid = rows.len() / 2;
        let min_form = leaf_form(alloc, leaf.ref_());
        let left_ref = leaf_build(alloc, &rows[..mid], min_form)?;
        let right_ref = leaf_build(alloc, &rows[mid..], Form::Short16)?;
        leaf_destroy_if_owned(alloc, leaf.ref_());
        *leaf = Array::open(alloc, left_ref, leaf.parent()).expect("rebuilt leaf");
        Ok(Split { left_len: mid, sibling_ref: right_ref })
    }

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

        let _ = node;
        Ok(Split { left_len, sibling_ref: sibling_node.ref_() })
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

    pub fn erase(&mut self, alloc: &mut impl Allocator, row: usize) -> Result<(), AllocError> {
        Self::erase_at(&mut self.root, alloc, row)
    }

    fn erase_at(node: &mut Array, alloc: &mut impl Allocator, row: usize) -> Result<(), AllocError> {
        if !node.is_node(alloc) {
            let new_ref = leaf_erase(alloc, node.ref_(), row)?;
            *node = Array::open(alloc, new_ref, node.parent()).expect("rebuilt leaf");
            return Ok(());
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
        self.root.destroy(alloc);
        let leaf_ref = leaf_build(alloc, &[], Form::Short16)?;
        self.root = Array::open(alloc, leaf_ref, None).expect("freshly built leaf");
        Ok(())
    }

    pub fn destroy(&self, alloc: &mut impl Allocator) {
        self.root.destroy(alloc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;

    #[test]
    fn short_form_promotes_then_long_form() {
        let mut alloc = HeapAllocator::new();
        let mut col = AdaptiveStringColumn::create(&mut alloc).unwrap();
        col.add(&mut alloc, b"a").unwrap();
        col.add(&mut alloc, b"bc").unwrap();
        let thirty = vec![b'x'; 30];
        col.add(&mut alloc, &thirty).unwrap();
        let three_hundred = vec![b'y'; 300];
        col.add(&mut alloc, &three_hundred).unwrap();

        assert_eq!(col.size(&alloc), 4);
        assert_eq!(col.get(&alloc, 0), b"a");
        assert_eq!(col.get(&alloc, 1), b"bc");
        assert_eq!(col.get(&alloc, 2), thirty);
        assert_eq!(col.get(&alloc, 3), three_hundred);
        assert_eq!(leaf_form(&alloc, col.root_ref()), Form::Long);
    }

    #[test]
    fn form_never_demotes_after_erasing_the_long_value() {
        let mut alloc = HeapAllocator::new();
        let mut col = AdaptiveStringColumn::create(&mut alloc).unwrap();
        col.add(&mut alloc, b"a").unwrap();
        col.add(&mut alloc, &vec![b'z'; 300]).unwrap();
        col.erase(&mut alloc, 1).unwrap();
        assert_eq!(col.size(&alloc), 1);
        assert_eq!(leaf_form(&alloc, col.root_ref()), Form::Long);
    }

    #[test]
    fn btree_split_over_many_rows() {
        let mut alloc = HeapAllocator::new();
        let mut col = AdaptiveStringColumn::create(&mut alloc).unwrap();
        for i in 0..2_000 {
            col.add(&mut alloc, format!("row-{i}").as_bytes()).unwrap();
        }
        assert_eq!(col.size(&alloc), 2_000);
        for i in 0..2_000 {
            assert_eq!(col.get_str(&alloc, i), format!("row-{i}"));
        }
        assert!(col.root.is_node(&alloc));
    }
}
