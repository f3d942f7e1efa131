//! On-disk layout of a record and its attribute entries.
//!
//! # Record header
//!
//! ```text
//! 0x00 signature "FILE" (4)   0x04 fixup_offset (2)  0x06 fixup_count (2)
//! 0x08 lsn (8)                0x10 sequence (2)      0x12 hard_links (2)
//! 0x14 attr_offset (2)        0x16 flags (2)         0x18 used (4)
//! 0x1C total (4)              0x20 parent_ref (8)    0x28 next_attr_id (2)
//! ```
//!
//! # Attribute entry
//!
//! ```text
//! 0x00 type (4)  0x04 size (4)  0x08 non_resident (1)  0x09 name_len (1)
//! 0x0A name_offset (2)  0x0C flags (2)  0x0E id (2)
//!
//! resident:      0x10 data_size (4)  0x14 data_offset (2)  0x16 flags (1)
//! non-resident:  0x10 svcn (8)  0x18 evcn (8)  0x20 run_offset (2)
//!                0x22 compression unit (2)  0x28 alloc_size (8)
//!                0x30 data_size (8)  0x38 valid_size (8)  0x40 total_size (8)
//! ```
//!
//! All fields are little-endian. The attribute list ends with an 8-byte
//! END marker whose end coincides with `used`.

/// Record signature
pub const FILE_SIGNATURE: [u8; 4] = *b"FILE";

/// Record header field offsets
pub mod hdr {
    /// Signature
    pub const SIGNATURE: usize = 0x00;
    /// Offset of the fixup array
    pub const FIXUP_OFFSET: usize = 0x04;
    /// Number of fixup entries
    pub const FIXUP_COUNT: usize = 0x06;
    /// Log sequence number
    pub const LSN: usize = 0x08;
    /// Reuse counter
    pub const SEQUENCE: usize = 0x10;
    /// Hard link count
    pub const HARD_LINKS: usize = 0x12;
    /// Offset of the first attribute
    pub const ATTR_OFFSET: usize = 0x14;
    /// Record flags
    pub const FLAGS: usize = 0x16;
    /// Bytes in use
    pub const USED: usize = 0x18;
    /// Declared capacity
    pub const TOTAL: usize = 0x1C;
    /// Base record reference
    pub const PARENT_REF: usize = 0x20;
    /// Next attribute id counter
    pub const NEXT_ATTR_ID: usize = 0x28;
}

/// Attribute entry field offsets
pub mod attr {
    /// Type code
    pub const TYPE: usize = 0x00;
    /// Entry size
    pub const SIZE: usize = 0x04;
    /// Non-resident flag
    pub const NON_RESIDENT: usize = 0x08;
    /// Name length in UTF-16 units
    pub const NAME_LEN: usize = 0x09;
    /// Name offset within the entry
    pub const NAME_OFFSET: usize = 0x0A;
    /// Attribute flags
    pub const FLAGS: usize = 0x0C;
    /// Attribute id
    pub const ID: usize = 0x0E;

    /// Resident payload size
    pub const RES_DATA_SIZE: usize = 0x10;
    /// Resident payload offset within the entry
    pub const RES_DATA_OFFSET: usize = 0x14;
    /// Resident flags
    pub const RES_FLAGS: usize = 0x16;

    /// First cluster covered by this entry
    pub const NR_SVCN: usize = 0x10;
    /// Last cluster covered by this entry
    pub const NR_EVCN: usize = 0x18;
    /// Offset of the packed run list within the entry
    pub const NR_RUN_OFFSET: usize = 0x20;
    /// Compression unit
    pub const NR_C_UNIT: usize = 0x22;
    /// Allocated bytes
    pub const NR_ALLOC_SIZE: usize = 0x28;
    /// Logical bytes
    pub const NR_DATA_SIZE: usize = 0x30;
    /// Initialized bytes
    pub const NR_VALID_SIZE: usize = 0x38;
    /// Bytes actually allocated (compressed/sparse only)
    pub const NR_TOTAL_SIZE: usize = 0x40;
}

/// Smallest offset the first attribute may start at
pub const MIN_ATTR_OFFSET: usize = 0x2A;

/// Bytes of fixed header every record buffer must hold
pub const HEADER_SIZE: usize = hdr::NEXT_ATTR_ID + 2;

/// Size of the END marker
pub const END_MARKER_SIZE: usize = 8;

/// Minimum size of a resident entry
pub const SIZEOF_RESIDENT: usize = 0x18;
/// Minimum size of a non-resident entry
pub const SIZEOF_NONRESIDENT: usize = 0x40;
/// Minimum size of a compressed or sparse non-resident entry
pub const SIZEOF_NONRESIDENT_EX: usize = 0x48;

/// Record flag: slot holds a live object
pub const RECORD_FLAG_IN_USE: u16 = 0x0001;
/// Record flag: object is a directory
pub const RECORD_FLAG_DIR: u16 = 0x0002;
/// Record flag: system file
pub const RECORD_FLAG_SYSTEM: u16 = 0x0004;

/// Attribute flag: compressed
pub const ATTR_FLAG_COMPRESSED: u16 = 0x0001;
/// Attribute flag: encrypted
pub const ATTR_FLAG_ENCRYPTED: u16 = 0x4000;
/// Attribute flag: sparse
pub const ATTR_FLAG_SPARSE: u16 = 0x8000;

/// Resident flag: attribute is indexed and may share (type, name)
pub const RESIDENT_FLAG_INDEXED: u8 = 0x01;

/// Smallest record size, one sector
pub const SECTOR_SIZE: usize = 512;

/// Round up to a multiple of 8.
#[inline]
pub const fn quad_align(n: usize) -> usize {
    (n + 7) & !7
}

#[inline]
pub(crate) fn get_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

#[inline]
pub(crate) fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(b)
}

#[inline]
pub(crate) fn get_u64(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(b)
}

#[inline]
pub(crate) fn put_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

#[inline]
pub(crate) fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

#[inline]
pub(crate) fn put_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

/// Offset of the first attribute in an empty record of `record_size` bytes.
pub fn empty_attr_offset(record_size: usize) -> usize {
    let fixup_count = record_size / SECTOR_SIZE + 1;
    quad_align(MIN_ATTR_OFFSET + 2 * fixup_count)
}

/// Canonical empty record: header, fixup slots, END marker, nothing else.
///
/// The in-use flag and sequence number are left clear for the caller.
pub fn empty_record(record_size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; record_size];
    let fixup_count = record_size / SECTOR_SIZE + 1;
    let attr_off = empty_attr_offset(record_size);

    buf[hdr::SIGNATURE..hdr::SIGNATURE + 4].copy_from_slice(&FILE_SIGNATURE);
    put_u16(&mut buf, hdr::FIXUP_OFFSET, MIN_ATTR_OFFSET as u16);
    put_u16(&mut buf, hdr::FIXUP_COUNT, fixup_count as u16);
    put_u16(&mut buf, hdr::ATTR_OFFSET, attr_off as u16);
    put_u32(&mut buf, hdr::USED, (attr_off + END_MARKER_SIZE) as u32);
    put_u32(&mut buf, hdr::TOTAL, record_size as u32);
    put_u32(&mut buf, attr_off + attr::TYPE, u32::MAX);
    buf
}
