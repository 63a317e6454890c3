//! `Array`: the universal on-region node.
//!
//! Every other on-disk structure in this crate — integer and string
//! columns, table schemas, the group's top array, free lists — is built out
//! of `Array`s. An array is an 8-byte header (flags, bit width, element
//! count, allocated capacity) followed by a packed payload of signed
//! integers, all described in spec.md §3.1/§6.1.
//!
//! The header is hand-encoded to fixed little-endian bytes rather than
//! derived with `zerocopy` (as the teacher crate's `pile.rs` does for its
//! fixed headers): the 24-bit element count does not line up on a type
//! boundary `zerocopy` can express directly, and spec.md §6.1 is explicit
//! that the format is little-endian regardless of host, so encoding by hand
//! with `to_le_bytes`/`from_le_bytes` sidesteps relying on the host's native
//! byte order the way a `repr(C)` struct view would.

use crate::alloc::Allocator;
use crate::error::{AllocError, CorruptRegion};
use crate::region::Ref;

pub const HEADER_LEN: usize = 8;

/// Bit width of one packed element. `W0` stores no payload at all: an
/// all-zero array of any length round-trips through a zero-byte payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Width {
    W0,
    W1,
    W2,
    W4,
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    const ORDER: [Width; 8] = [
        Width::W0,
        Width::W1,
        Width::W2,
        Width::W4,
        Width::W8,
        Width::W16,
        Width::W32,
        Width::W64,
    ];

    pub fn bits(self) -> u32 {
        match self {
            Width::W0 => 0,
            Width::W1 => 1,
            Width::W2 => 2,
            Width::W4 => 4,
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }

    pub fn code(self) -> u8 {
        Self::ORDER.iter().position(|w| *w == self).unwrap() as u8
    }

    pub fn from_code(code: u8) -> Result<Width, CorruptRegion> {
        Self::ORDER
            .get(code as usize)
            .copied()
            .ok_or(CorruptRegion::UnknownWidthCode(code))
    }

    /// The minimum width an array needs so that `v` fits, interpreted as
    /// signed (spec.md §3.1 "Signed representation").
    pub fn min_for_value(v: i64) -> Width {
        for w in Self::ORDER {
            if fits_signed(v, w.bits()) {
                return w;
            }
        }
        unreachable!("W64 fits every i64")
    }

    pub fn max(self, other: Width) -> Width {
        if self.bits() >= other.bits() {
            self
        } else {
            other
        }
    }
}

fn fits_signed(v: i64, bits: u32) -> bool {
    if bits == 0 {
        v == 0
    } else if bits >= 64 {
        true
    } else {
        let lo = -(1i64 << (bits - 1));
        let hi = (1i64 << (bits - 1)) - 1;
        v >= lo && v <= hi
    }
}

/// Number of payload bytes needed to hold `n` elements at `width`.
pub fn payload_bytes_for(width: Width, n: usize) -> usize {
    let bits = width.bits();
    if bits == 0 {
        0
    } else if bits < 8 {
        let per_byte = (8 / bits) as usize;
        (n + per_byte - 1) / per_byte
    } else {
        n * (bits / 8) as usize
    }
}

fn to_signed(raw: u64, bits: u32) -> i64 {
    if bits == 0 {
        0
    } else if bits >= 64 {
        raw as i64
    } else {
        let sign_bit = 1u64 << (bits - 1);
        if raw & sign_bit != 0 {
            (raw | (!0u64 << bits)) as i64
        } else {
            raw as i64
        }
    }
}

fn truncate_bits(v: i64, bits: u32) -> u64 {
    if bits >= 64 {
        v as u64
    } else {
        (v as u64) & ((1u64 << bits) - 1)
    }
}

/// Read the `i`-th packed element out of `payload` (spec.md §4.2 bit
/// packing rule: `(j mod (8/w)) * w` within byte `floor(j*w/8)`).
pub fn get_packed(payload: &[u8], width: Width, i: usize) -> i64 {
    let bits = width.bits();
    if bits == 0 {
        return 0;
    }
    if bits < 8 {
        let per_byte = (8 / bits) as usize;
        let byte = payload[i / per_byte];
        let shift = ((i % per_byte) as u32) * bits;
        let mask = ((1u16 << bits) - 1) as u8;
        let raw = (byte >> shift) & mask;
        to_signed(raw as u64, bits)
    } else {
        let nbytes = (bits / 8) as usize;
        let start = i * nbytes;
        let mut buf = [0u8; 8];
        buf[..nbytes].copy_from_slice(&payload[start..start + nbytes]);
        to_signed(u64::from_le_bytes(buf), bits)
    }
}

/// Write `v` as the `i`-th packed element of `payload`. The caller must
/// have already ensured `v` fits `width`.
pub fn set_packed(payload: &mut [u8], width: Width, i: usize, v: i64) {
    let bits = width.bits();
    if bits == 0 {
        debug_assert_eq!(v, 0, "W0 array can only hold zeroes");
        return;
    }
    let raw = truncate_bits(v, bits);
    if bits < 8 {
        let per_byte = (8 / bits) as usize;
        let shift = ((i % per_byte) as u32) * bits;
        let mask = (((1u16 << bits) - 1) as u8) << shift;
        let byte = &mut payload[i / per_byte];
        *byte = (*byte & !mask) | ((raw as u8) << shift);
    } else {
        let nbytes = (bits / 8) as usize;
        let start = i * nbytes;
        let bytes = raw.to_le_bytes();
        payload[start..start + nbytes].copy_from_slice(&bytes[..nbytes]);
    }
}

fn unpack_all(payload: &[u8], width: Width, n: usize) -> Vec<i64> {
    (0..n).map(|i| get_packed(payload, width, i)).collect()
}

fn pack_all(width: Width, values: &[i64]) -> Vec<u8> {
    let mut buf = vec![0u8; payload_bytes_for(width, values.len())];
    for (i, v) in values.iter().enumerate() {
        set_packed(&mut buf, width, i, *v);
    }
    buf
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParentLink {
    pub parent_ref: Ref,
    pub index_in_parent: usize,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct ArrayHeader {
    pub is_node: bool,
    pub has_refs: bool,
    pub is_index_node: bool,
    pub width: Width,
    pub count: u32,
    pub capacity: u32,
}

pub(crate) fn encode_header(h: ArrayHeader) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    buf[0] = ((h.is_node as u8) << 7)
        | ((h.has_refs as u8) << 6)
        | ((h.is_index_node as u8) << 5)
        | h.width.code();
    let n = h.count & 0x00FF_FFFF;
    buf[1] = (n & 0xFF) as u8;
    buf[2] = ((n >> 8) & 0xFF) as u8;
    buf[3] = ((n >> 16) & 0xFF) as u8;
    buf[4..8].copy_from_slice(&h.capacity.to_le_bytes());
    buf
}

pub(crate) fn decode_header(buf: &[u8]) -> Result<ArrayHeader, CorruptRegion> {
    if buf.len() < HEADER_LEN {
        return Err(CorruptRegion::Truncated);
    }
    let flags = buf[0];
    let width = Width::from_code(flags & 0x07)?;
    let count = (buf[1] as u32) | ((buf[2] as u32) << 8) | ((buf[3] as u32) << 16);
    let capacity = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    Ok(ArrayHeader {
        is_node: flags & 0x80 != 0,
        has_refs: flags & 0x40 != 0,
        is_index_node: flags & 0x20 != 0,
        width,
        count,
        capacity,
    })
}

/// The in-memory accessor for an on-region `Array`. All facts (width,
/// count, capacity) are re-derived from the header on every call rather
/// than cached, so an `Array` handle never goes stale the way a cached
/// `(ptr, w, n)` tuple could after a relocation it didn't witness.
#[derive(Clone, Copy, Debug)]
pub struct Array {
    ref_: Ref,
    parent: Option<ParentLink>,
}

impl Array {
    pub fn create(alloc: &mut impl Allocator, has_refs: bool) -> Result<Array, AllocError> {
        Self::create_with(alloc, has_refs, false)
    }

    /// A B+tree inner node: `has_refs = true`, `is_node = true`, holding
    /// exactly the two child refs (offsets array, children array) spec.md
    /// §3.1 describes.
    pub fn create_node(alloc: &mut impl Allocator) -> Result<Array, AllocError> {
        Self::create_with(alloc, true, true)
    }

    fn create_with(
        alloc: &mut impl Allocator,
        has_refs: bool,
        is_node: bool,
    ) -> Result<Array, AllocError> {
        let ref_ = alloc.alloc(HEADER_LEN)?;
        let header = ArrayHeader {
            is_node,
            has_refs,
            is_index_node: false,
            width: Width::W0,
            count: 0,
            capacity: 0,
        };
        alloc.write(ref_, &encode_header(header));
        Ok(Array { ref_, parent: None })
    }

    /// Open an existing array for access, attaching the back-reference used
    /// to propagate relocations (spec.md §4.2 `update_parent_ref`).
    pub fn open(
        alloc: &impl Allocator,
        ref_: Ref,
        parent: Option<ParentLink>,
    ) -> Result<Array, CorruptRegion> {
        let _ = decode_header(alloc.read(ref_, HEADER_LEN))?;
        Ok(Array { ref_, parent })
    }

    pub fn ref_(&self) -> Ref {
        self.ref_
    }

    pub fn parent(&self) -> Option<ParentLink> {
        self.parent
    }

    pub fn set_parent(&mut self, parent: Option<ParentLink>) {
        self.parent = parent;
    }

    fn header(&self, alloc: &impl Allocator) -> ArrayHeader {
        decode_header(alloc.read(self.ref_, HEADER_LEN)).expect("array header corrupted in-place")
    }

    fn write_header(&self, alloc: &mut impl Allocator, h: ArrayHeader) {
        alloc.write(self.ref_, &encode_header(h));
    }

    pub fn size(&self, alloc: &impl Allocator) -> usize {
        self.header(alloc).count as usize
    }

    pub fn is_empty(&self, alloc: &impl Allocator) -> bool {
        self.size(alloc) == 0
    }

    pub fn has_refs(&self, alloc: &impl Allocator) -> bool {
        self.header(alloc).has_refs
    }

    pub fn is_node(&self, alloc: &impl Allocator) -> bool {
        self.header(alloc).is_node
    }

    fn payload(&self, alloc: &impl Allocator, h: ArrayHeader) -> Vec<u8> {
        let len = payload_bytes_for(h.width, h.count as usize);
        alloc.read(self.ref_ + HEADER_LEN as Ref, len).to_vec()
    }

    pub fn get(&self, alloc: &impl Allocator, i: usize) -> i64 {
        let h = self.header(alloc);
        debug_assert!(i < h.count as usize, "Array::get index out of bounds");
        get_packed(&self.payload(alloc, h), h.width, i)
    }

    pub fn get_ref(&self, alloc: &impl Allocator, i: usize) -> Ref {
        debug_assert!(self.header(alloc).has_refs, "get_ref on a non-refs array");
        self.get(alloc, i) as u64
    }

    /// Copy-on-write through a read-only ref, allocating a fresh copy and
    /// propagating the relocation to the parent if one is tracked. A no-op
    /// if the array is already in the mutable extension.
    pub fn ensure_writable(&mut self, alloc: &mut impl Allocator) -> Result<(), AllocError> {
        if !alloc.is_read_only(self.ref_) {
            return Ok(());
        }
        let h = self.header(alloc);
        let payload = self.payload(alloc, h);
        let total = HEADER_LEN + payload.len();
        let new_ref = alloc.alloc(total)?;
        alloc.write(new_ref, &encode_header(h));
        alloc.write(new_ref + HEADER_LEN as Ref, &payload);
        self.relocate(alloc, new_ref)?;
        Ok(())
    }

    fn relocate(&mut self, alloc: &mut impl Allocator, new_ref: Ref) -> Result<(), AllocError> {
        if new_ref == self.ref_ {
            return Ok(());
        }
        self.ref_ = new_ref;
        if let Some(p) = self.parent {
            let mut parent_array = Array {
                ref_: p.parent_ref,
                parent: None,
            };
            // Only one hop: this writes the new ref into the parent's slot
            // but does not itself chase the parent's parent. A caller
            // recursing through several levels (tables/columns) must
            // re-fetch and write back its own child ref after each call —
            // see the `children.set_ref(alloc, idx, child.ref_())` calls in
            // column/int.rs and column/string.rs.
            parent_array.set_ref(alloc, p.index_in_parent, new_ref)?;
        }
        Ok(())
    }

    fn ensure_capacity(
        &mut self,
        alloc: &mut impl Allocator,
        h: ArrayHeader,
        new_count: usize,
        new_width: Width,
    ) -> Result<ArrayHeader, AllocError> {
        let needed = payload_bytes_for(new_width, new_count);
        if needed <= h.capacity as usize && new_width == h.width {
            return Ok(h);
        }
        let values = unpack_all(&self.payload(alloc, h), h.width, h.count as usize);
        let new_capacity = needed.max((h.capacity as usize) * 2).max(needed);
        let old_total = HEADER_LEN + h.capacity as usize;
        let new_total = HEADER_LEN + new_capacity;
        let new_ref = alloc.realloc(self.ref_, old_total, new_total)?;
        self.relocate(alloc, new_ref)?;
        let repacked = pack_all(new_width, &values);
        let mut padded = vec![0u8; new_capacity];
        padded[..repacked.len()].copy_from_slice(&repacked);
        alloc.write(self.ref_ + HEADER_LEN as Ref, &padded);
        let new_header = ArrayHeader {
            width: new_width,
            capacity: new_capacity as u32,
            ..h
        };
        self.write_header(alloc, new_header);
        Ok(new_header)
    }

    pub fn set(&mut self, alloc: &mut impl Allocator, i: usize, v: i64) -> Result<(), AllocError> {
        self.ensure_writable(alloc)?;
        let h = self.header(alloc);
        debug_assert!(i < h.count as usize, "Array::set index out of bounds");
        let new_width = h.width.max(Width::min_for_value(v));
        let h = self.ensure_capacity(alloc, h, h.count as usize, new_width)?;
        let mut payload = self.payload(alloc, h);
        set_packed(&mut payload, h.width, i, v);
        alloc.write(self.ref_ + HEADER_LEN as Ref, &payload);
        Ok(())
    }

    pub fn set_ref(&mut self, alloc: &mut impl Allocator, i: usize, r: Ref) -> Result<(), AllocError> {
        debug_assert!(self.header(alloc).has_refs, "set_ref on a non-refs array");
        self.set(alloc, i, r as i64)
    }

    pub fn insert(&mut self, alloc: &mut impl Allocator, i: usize, v: i64) -> Result<(), AllocError> {
        self.ensure_writable(alloc)?;
        let h = self.header(alloc);
        debug_assert!(i <= h.count as usize, "Array::insert index out of bounds");
        let new_width = h.width.max(Width::min_for_value(v));
        let mut values = unpack_all(&self.payload(alloc, h), h.width, h.count as usize);
        values.insert(i, v);
        let h = self.ensure_capacity(alloc, h, values.len(), new_width)?;
        let packed = pack_all(h.width, &values);
        let mut padded = vec![0u8; h.capacity as usize];
        padded[..packed.len()].copy_from_slice(&packed);
        alloc.write(self.ref_ + HEADER_LEN as Ref, &padded);
        self.write_header(
            alloc,
            ArrayHeader {
                count: values.len() as u32,
                ..h
            },
        );
        Ok(())
    }

    pub fn insert_ref(&mut self, alloc: &mut impl Allocator, i: usize, r: Ref) -> Result<(), AllocError> {
        debug_assert!(self.header(alloc).has_refs, "insert_ref on a non-refs array");
        self.insert(alloc, i, r as i64)
    }

    pub fn add(&mut self, alloc: &mut impl Allocator, v: i64) -> Result<(), AllocError> {
        let n = self.size(alloc);
        self.insert(alloc, n, v)
    }

    pub fn add_ref(&mut self, alloc: &mut impl Allocator, r: Ref) -> Result<(), AllocError> {
        let n = self.size(alloc);
        self.insert_ref(alloc, n, r)
    }

    /// Remove the element at `i`. Per spec.md §8 invariant 2, width is
    /// *not* shrunk on erase — only `clear` resets it.
    pub fn erase(&mut self, alloc: &mut impl Allocator, i: usize) -> Result<(), AllocError> {
        self.ensure_writable(alloc)?;
        let h = self.header(alloc);
        debug_assert!(i < h.count as usize, "Array::erase index out of bounds");
        let mut values = unpack_all(&self.payload(alloc, h), h.width, h.count as usize);
        values.remove(i);
        let packed = pack_all(h.width, &values);
        let mut padded = vec![0u8; h.capacity as usize];
        padded[..packed.len()].copy_from_slice(&packed);
        alloc.write(self.ref_ + HEADER_LEN as Ref, &padded);
        self.write_header(
            alloc,
            ArrayHeader {
                count: values.len() as u32,
                ..h
            },
        );
        Ok(())
    }

    pub fn clear(&mut self, alloc: &mut impl Allocator) -> Result<(), AllocError> {
        self.ensure_writable(alloc)?;
        let h = self.header(alloc);
        self.write_header(
            alloc,
            ArrayHeader {
                width: Width::W0,
                count: 0,
                ..h
            },
        );
        Ok(())
    }

    /// Free this array, recursing into every live child ref when
    /// `has_refs` is set (spec.md §3.2).
    pub fn destroy(&self, alloc: &mut impl Allocator) {
        let h = self.header(alloc);
        if h.has_refs {
            for i in 0..h.count as usize {
                let child_ref = self.get(alloc, i);
                if child_ref != 0 {
                    let child = Array {
                        ref_: child_ref as Ref,
                        parent: None,
                    };
                    child.destroy(alloc);
                }
            }
        }
        alloc.free(self.ref_, HEADER_LEN + h.capacity as usize);
    }

    /// Overwrite the whole logical contents in one pass, computing the
    /// minimal width up front instead of growing element by element. Used
    /// by leaf-splitting code (column/int.rs, column/string.rs) so
    /// rebuilding a half-leaf after a split is O(n) rather than O(n^2).
    /// `has_refs` arrays keep their fixed ref width regardless of value.
    pub fn reset_with(&mut self, alloc: &mut impl Allocator, values: &[i64]) -> Result<(), AllocError> {
        self.ensure_writable(alloc)?;
        let h = self.header(alloc);
        let width = if h.has_refs {
            Width::W64
        } else {
            values
                .iter()
                .fold(Width::W0, |acc, &v| acc.max(Width::min_for_value(v)))
        };
        let h = self.ensure_capacity(alloc, h, values.len(), width)?;
        let packed = pack_all(h.width, values);
        let mut padded = vec![0u8; h.capacity as usize];
        padded[..packed.len()].copy_from_slice(&packed);
        alloc.write(self.ref_ + HEADER_LEN as Ref, &padded);
        self.write_header(
            alloc,
            ArrayHeader {
                count: values.len() as u32,
                ..h
            },
        );
        Ok(())
    }

    pub fn to_vec(&self, alloc: &impl Allocator) -> Vec<i64> {
        let h = self.header(alloc);
        unpack_all(&self.payload(alloc, h), h.width, h.count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;

    #[test]
    fn widens_on_negative_insert() {
        let mut alloc = HeapAllocator::new();
        let mut arr = Array::create(&mut alloc, false).unwrap();
        arr.add(&mut alloc, 0).unwrap();
        arr.add(&mut alloc, 1).unwrap();
        assert_eq!(arr.header(&alloc).width, Width::W1);
        arr.add(&mut alloc, -1).unwrap();
        assert!(arr.header(&alloc).width.bits() >= 8);
        assert_eq!(arr.to_vec(&alloc), vec![0, 1, -1]);
    }

    #[test]
    fn widens_on_large_value() {
        let mut alloc = HeapAllocator::new();
        let mut arr = Array::create(&mut alloc, false).unwrap();
        arr.add(&mut alloc, 1 << 40).unwrap();
        assert_eq!(arr.header(&alloc).width, Width::W64);
        assert_eq!(arr.get(&alloc, 0), 1 << 40);
    }

    #[test]
    fn erase_does_not_shrink_width() {
        let mut alloc = HeapAllocator::new();
        let mut arr = Array::create(&mut alloc, false).unwrap();
        arr.add(&mut alloc, 1 << 40).unwrap();
        arr.add(&mut alloc, 2).unwrap();
        arr.erase(&mut alloc, 0).unwrap();
        assert_eq!(arr.header(&alloc).width, Width::W64);
        assert_eq!(arr.to_vec(&alloc), vec![2]);
    }

    #[test]
    fn clear_resets_width_and_count() {
        let mut alloc = HeapAllocator::new();
        let mut arr = Array::create(&mut alloc, false).unwrap();
        arr.add(&mut alloc, 1 << 40).unwrap();
        arr.clear(&mut alloc).unwrap();
        assert_eq!(arr.size(&alloc), 0);
        assert_eq!(arr.header(&alloc).width, Width::W0);
    }

    #[test]
    fn insert_in_middle_shifts_tail() {
        let mut alloc = HeapAllocator::new();
        let mut arr = Array::create(&mut alloc, false).unwrap();
        for v in [0, 1, 2, 3] {
            arr.add(&mut alloc, v).unwrap();
        }
        arr.insert(&mut alloc, 2, 99).unwrap();
        assert_eq!(arr.to_vec(&alloc), vec![0, 1, 99, 2, 3]);
    }

    #[test]
    fn zero_width_array_has_no_payload_bytes() {
        assert_eq!(payload_bytes_for(Width::W0, 1000), 0);
        assert_eq!(get_packed(&[], Width::W0, 500), 0);
    }

    #[test]
    fn bit_packing_round_trips_every_width() {
        let mut alloc = HeapAllocator::new();
        for &v in &[0i64, 1, -1, 127, -128, 32767, -32768, i32::MAX as i64, i64::MIN] {
            let mut arr = Array::create(&mut alloc, false).unwrap();
            arr.add(&mut alloc, v).unwrap();
            assert_eq!(arr.get(&alloc, 0), v, "round trip failed for {v}");
        }
    }

    #[test]
    fn copy_on_write_leaves_mapped_bytes_untouched() {
        use crate::region::Region;
        let mut header_and_payload = encode_header(ArrayHeader {
            is_node: false,
            has_refs: false,
            is_index_node: false,
            width: Width::W8,
            count: 1,
            capacity: 1,
        })
        .to_vec();
        header_and_payload.push(42u8);
        let original = header_and_payload.clone();
        let region = Region::from_buffer(header_and_payload);
        let mut alloc = crate::alloc::RegionAllocator::new(region);
        let mut arr = Array::open(&alloc, 0, None).unwrap();
        arr.set(&mut alloc, 0, 100).unwrap();
        assert_eq!(alloc.region().read(0, original.len()), &original[..]);
        assert_eq!(arr.get(&alloc, 0), 100);
    }
}
