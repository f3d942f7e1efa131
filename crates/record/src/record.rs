//! In-memory record buffer.
//!
//! A `Record` owns exactly `record_size` bytes, never fewer than the fixed
//! header. Attributes are addressed by [`AttrRef`], a byte offset into the
//! buffer. Any insert, remove, resize or run pack may move everything after
//! the mutation point, so an `AttrRef` must not be reused across a mutation;
//! re-locate the attribute instead.

use crate::layout::{
    self, attr, get_u16, get_u32, get_u64, hdr, put_u16, put_u32, put_u64, ATTR_FLAG_COMPRESSED,
    ATTR_FLAG_SPARSE, FILE_SIGNATURE, HEADER_SIZE, RECORD_FLAG_IN_USE, RESIDENT_FLAG_INDEXED,
    SECTOR_SIZE,
};
use mftrec_core::{AttrId, AttrType, RecordError, RecordId, Result, VolumeConfig};
use smallvec::SmallVec;

fn buffer_len(config: &VolumeConfig) -> usize {
    (config.record_size as usize).max(SECTOR_SIZE)
}

/// Offset of an attribute entry inside a record buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrRef(pub(crate) usize);

impl AttrRef {
    /// Byte offset of the entry within the record
    pub fn offset(&self) -> usize {
        self.0
    }
}

/// Inline name storage; most attribute names are short.
pub type AttrName = SmallVec<[u16; 16]>;

/// One fixed-size record and its in-memory state.
#[derive(Clone)]
pub struct Record {
    id: RecordId,
    pub(crate) buf: Box<[u8]>,
    pub(crate) max_attr_type: u32,
    dirty: bool,
    attached: bool,
}

impl Record {
    /// Wrap raw bytes read for record `id`.
    ///
    /// The buffer is taken as-is; [`Record::validate`] reports whether it is
    /// structurally sound.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Corruption` if the buffer cannot hold the fixed
    /// header.
    pub fn from_bytes(id: RecordId, bytes: Vec<u8>, config: &VolumeConfig) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(RecordError::corruption(format!(
                "record {} buffer is {} bytes, header needs {}",
                id,
                bytes.len(),
                HEADER_SIZE
            )));
        }
        Ok(Self::wrap(id, bytes, config))
    }

    fn wrap(id: RecordId, bytes: Vec<u8>, config: &VolumeConfig) -> Self {
        Self {
            id,
            buf: bytes.into_boxed_slice(),
            max_attr_type: config.max_attr_type,
            dirty: false,
            attached: false,
        }
    }

    /// A zero-filled buffer of the configured record size.
    ///
    /// Sizes below one sector are raised to a sector; a validated
    /// configuration never has them.
    pub fn zeroed(id: RecordId, config: &VolumeConfig) -> Self {
        Self::wrap(id, vec![0u8; buffer_len(config)], config)
    }

    /// A canonical empty record, marked in use, sequence 1, not dirty.
    pub fn formatted(id: RecordId, config: &VolumeConfig) -> Self {
        let mut record = Self::wrap(id, layout::empty_record(buffer_len(config)), config);
        record.set_sequence_number(1);
        record.set_flags(RECORD_FLAG_IN_USE);
        record
    }

    /// Record number
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Raw buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Capacity of the buffer in bytes
    pub fn record_size(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer differs from what storage holds
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the buffer for the next persist
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Whether backing storage has been associated with this record
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn set_attached(&mut self) {
        self.attached = true;
    }

    pub(crate) fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    // ------------------------------------------------------------------
    // Header fields
    // ------------------------------------------------------------------

    /// Whether the buffer carries the "FILE" signature
    pub fn has_signature(&self) -> bool {
        self.buf[hdr::SIGNATURE..hdr::SIGNATURE + 4] == FILE_SIGNATURE
    }

    /// Declared capacity
    pub fn total(&self) -> u32 {
        get_u32(&self.buf, hdr::TOTAL)
    }

    /// Bytes occupied by header, attributes and END marker
    pub fn used(&self) -> u32 {
        get_u32(&self.buf, hdr::USED)
    }

    pub(crate) fn set_used(&mut self, used: usize) {
        put_u32(&mut self.buf, hdr::USED, used as u32);
    }

    /// Offset of the first attribute
    pub fn attr_offset(&self) -> u16 {
        get_u16(&self.buf, hdr::ATTR_OFFSET)
    }

    /// Next candidate attribute id
    pub fn next_attr_id(&self) -> u16 {
        get_u16(&self.buf, hdr::NEXT_ATTR_ID)
    }

    /// Overwrite the id counter
    pub fn set_next_attr_id(&mut self, next: u16) {
        put_u16(&mut self.buf, hdr::NEXT_ATTR_ID, next);
    }

    /// Reuse counter of this slot
    pub fn sequence_number(&self) -> u16 {
        get_u16(&self.buf, hdr::SEQUENCE)
    }

    pub(crate) fn set_sequence_number(&mut self, seq: u16) {
        put_u16(&mut self.buf, hdr::SEQUENCE, seq);
    }

    /// Record flags
    pub fn flags(&self) -> u16 {
        get_u16(&self.buf, hdr::FLAGS)
    }

    pub(crate) fn set_flags(&mut self, flags: u16) {
        put_u16(&mut self.buf, hdr::FLAGS, flags);
    }

    /// Whether the slot holds a live object
    pub fn is_in_use(&self) -> bool {
        self.flags() & RECORD_FLAG_IN_USE != 0
    }

    pub(crate) fn clear_in_use(&mut self) {
        let flags = self.flags() & !RECORD_FLAG_IN_USE;
        self.set_flags(flags);
    }

    /// Bytes available for growth
    pub fn free_space(&self) -> usize {
        (self.total() as usize)
            .min(self.buf.len())
            .saturating_sub(self.used() as usize)
    }

    // ------------------------------------------------------------------
    // Attribute access
    // ------------------------------------------------------------------

    /// Read view of an attribute.
    ///
    /// `r` must come from this record and must not predate a mutation.
    pub fn attr(&self, r: AttrRef) -> Attr<'_> {
        Attr {
            buf: &self.buf[..],
            off: r.0,
        }
    }

    /// Mutable view of an attribute; marks the record dirty.
    ///
    /// `r` must come from this record and must not predate a mutation.
    pub fn attr_mut(&mut self, r: AttrRef) -> AttrMut<'_> {
        self.dirty = true;
        AttrMut {
            buf: &mut self.buf[..],
            off: r.0,
        }
    }

    /// Move `[from, from + len)` to start at `to`; overlap-safe.
    pub(crate) fn shift(&mut self, from: usize, to: usize, len: usize) {
        self.buf.copy_within(from..from + len, to);
    }

    pub(crate) fn zero(&mut self, start: usize, len: usize) {
        self.buf[start..start + len].fill(0);
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id)
            .field("used", &self.used())
            .field("total", &self.total())
            .field("seq", &self.sequence_number())
            .field("flags", &self.flags())
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Read view over one attribute entry.
#[derive(Clone, Copy)]
pub struct Attr<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> Attr<'a> {
    fn u8_at(&self, field: usize) -> u8 {
        self.buf[self.off + field]
    }

    fn u16_at(&self, field: usize) -> u16 {
        get_u16(self.buf, self.off + field)
    }

    fn u32_at(&self, field: usize) -> u32 {
        get_u32(self.buf, self.off + field)
    }

    fn u64_at(&self, field: usize) -> u64 {
        get_u64(self.buf, self.off + field)
    }

    /// Reference to this entry
    pub fn attr_ref(&self) -> AttrRef {
        AttrRef(self.off)
    }

    /// Type code
    pub fn attr_type(&self) -> AttrType {
        AttrType::new(self.u32_at(attr::TYPE))
    }

    /// Entry size in bytes
    pub fn size(&self) -> u32 {
        self.u32_at(attr::SIZE)
    }

    /// Whether the payload lives inside the record
    pub fn is_resident(&self) -> bool {
        self.u8_at(attr::NON_RESIDENT) == 0
    }

    /// Name length in UTF-16 units
    pub fn name_len(&self) -> u8 {
        self.u8_at(attr::NAME_LEN)
    }

    /// Name offset within the entry
    pub fn name_offset(&self) -> u16 {
        self.u16_at(attr::NAME_OFFSET)
    }

    /// Raw name bytes (UTF-16LE)
    pub fn name_bytes(&self) -> &'a [u8] {
        let start = self.off + self.name_offset() as usize;
        &self.buf[start..start + 2 * self.name_len() as usize]
    }

    /// Name as UTF-16 code units
    pub fn name(&self) -> AttrName {
        self.name_bytes()
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Exact comparison against `name`, unit by unit
    pub fn name_eq(&self, name: &[u16]) -> bool {
        self.name_len() as usize == name.len()
            && self
                .name_bytes()
                .chunks_exact(2)
                .zip(name)
                .all(|(pair, unit)| u16::from_le_bytes([pair[0], pair[1]]) == *unit)
    }

    /// Attribute flags
    pub fn flags(&self) -> u16 {
        self.u16_at(attr::FLAGS)
    }

    /// Attribute id
    pub fn id(&self) -> AttrId {
        AttrId::new(self.u16_at(attr::ID))
    }

    /// Compressed or sparse; such entries carry the extended header
    pub fn is_ext(&self) -> bool {
        self.flags() & (ATTR_FLAG_COMPRESSED | ATTR_FLAG_SPARSE) != 0
    }

    /// Resident and flagged indexed
    pub fn is_indexed(&self) -> bool {
        self.is_resident() && self.u8_at(attr::RES_FLAGS) & RESIDENT_FLAG_INDEXED != 0
    }

    /// Resident payload size
    pub fn data_size(&self) -> u32 {
        self.u32_at(attr::RES_DATA_SIZE)
    }

    /// Resident payload offset within the entry
    pub fn data_offset(&self) -> u16 {
        self.u16_at(attr::RES_DATA_OFFSET)
    }

    /// Resident payload
    pub fn data(&self) -> &'a [u8] {
        let start = self.off + self.data_offset() as usize;
        &self.buf[start..start + self.data_size() as usize]
    }

    /// First cluster covered by this entry
    pub fn svcn(&self) -> i64 {
        self.u64_at(attr::NR_SVCN) as i64
    }

    /// Last cluster covered by this entry
    pub fn evcn(&self) -> i64 {
        self.u64_at(attr::NR_EVCN) as i64
    }

    /// Offset of the packed run list within the entry
    pub fn run_offset(&self) -> u16 {
        self.u16_at(attr::NR_RUN_OFFSET)
    }

    /// Compression unit
    pub fn compression_unit(&self) -> u16 {
        self.u16_at(attr::NR_C_UNIT)
    }

    /// Allocated bytes of a non-resident payload
    pub fn alloc_size(&self) -> u64 {
        self.u64_at(attr::NR_ALLOC_SIZE)
    }

    /// Logical bytes of a non-resident payload
    pub fn nonresident_data_size(&self) -> u64 {
        self.u64_at(attr::NR_DATA_SIZE)
    }

    /// Initialized bytes of a non-resident payload
    pub fn valid_size(&self) -> u64 {
        self.u64_at(attr::NR_VALID_SIZE)
    }

    /// Packed run-list bytes, including any alignment padding
    pub fn run_bytes(&self) -> &'a [u8] {
        let start = self.off + self.run_offset() as usize;
        &self.buf[start..self.off + self.size() as usize]
    }
}

impl std::fmt::Debug for Attr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attr")
            .field("offset", &self.off)
            .field("type", &self.attr_type())
            .field("size", &self.size())
            .field("resident", &self.is_resident())
            .field("name_len", &self.name_len())
            .field("id", &self.id())
            .finish()
    }
}

/// Mutable view over one attribute entry.
pub struct AttrMut<'a> {
    buf: &'a mut [u8],
    off: usize,
}

impl AttrMut<'_> {
    /// Read view of the same entry
    pub fn as_attr(&self) -> Attr<'_> {
        Attr {
            buf: &*self.buf,
            off: self.off,
        }
    }

    /// Set attribute flags
    pub fn set_flags(&mut self, flags: u16) {
        put_u16(self.buf, self.off + attr::FLAGS, flags);
    }

    pub(crate) fn set_size(&mut self, size: usize) {
        put_u32(self.buf, self.off + attr::SIZE, size as u32);
    }

    /// Lay out a resident payload of `data_size` bytes at `data_offset`.
    ///
    /// The caller keeps `data_offset + data_size` within the entry size.
    pub fn set_resident(&mut self, data_offset: u16, data_size: u32) {
        self.buf[self.off + attr::NON_RESIDENT] = 0;
        put_u16(self.buf, self.off + attr::RES_DATA_OFFSET, data_offset);
        put_u32(self.buf, self.off + attr::RES_DATA_SIZE, data_size);
    }

    /// Set or clear the indexed flag of a resident entry
    pub fn set_indexed(&mut self, indexed: bool) {
        let flags = &mut self.buf[self.off + attr::RES_FLAGS];
        if indexed {
            *flags |= RESIDENT_FLAG_INDEXED;
        } else {
            *flags &= !RESIDENT_FLAG_INDEXED;
        }
    }

    /// Mutable resident payload
    pub fn data_mut(&mut self) -> &mut [u8] {
        let view = self.as_attr();
        let start = self.off + view.data_offset() as usize;
        let len = view.data_size() as usize;
        &mut self.buf[start..start + len]
    }

    /// Turn the entry into a non-resident header whose run list starts at
    /// `run_offset` and covers clusters from `svcn`.
    pub fn set_nonresident(&mut self, svcn: i64, run_offset: u16) {
        self.buf[self.off + attr::NON_RESIDENT] = 1;
        put_u64(self.buf, self.off + attr::NR_SVCN, svcn as u64);
        put_u64(self.buf, self.off + attr::NR_EVCN, (svcn - 1) as u64);
        put_u16(self.buf, self.off + attr::NR_RUN_OFFSET, run_offset);
    }

    pub(crate) fn set_evcn(&mut self, evcn: i64) {
        put_u64(self.buf, self.off + attr::NR_EVCN, evcn as u64);
    }

    /// Set the non-resident byte sizes
    pub fn set_nonresident_sizes(&mut self, alloc_size: u64, data_size: u64, valid_size: u64) {
        put_u64(self.buf, self.off + attr::NR_ALLOC_SIZE, alloc_size);
        put_u64(self.buf, self.off + attr::NR_DATA_SIZE, data_size);
        put_u64(self.buf, self.off + attr::NR_VALID_SIZE, valid_size);
    }

    /// Set the compression unit
    pub fn set_compression_unit(&mut self, unit: u16) {
        put_u16(self.buf, self.off + attr::NR_C_UNIT, unit);
    }
}
