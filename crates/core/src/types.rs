//! Identifier types for records and attributes
//!
//! - RecordId: position of a record in the metadata file
//! - AttrId: per-record attribute identifier
//! - AttrType: attribute-type code; defines the primary ordering of
//!   attributes inside a record

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a record in the metadata file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(u64);

impl RecordId {
    /// Record of the metadata file itself.
    pub const MFT: RecordId = RecordId(0);

    /// Create a RecordId from a record number
    pub const fn new(number: u64) -> Self {
        Self(number)
    }

    /// Raw record number
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The record immediately following this one
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for RecordId {
    fn from(number: u64) -> Self {
        Self(number)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Attribute identifier, unique within a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrId(u16);

impl AttrId {
    /// Largest counter value the fast allocation path hands out (exclusive).
    pub const LIMIT: u16 = 0x7FFF;

    /// Wrap a raw id
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw on-disk value
    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for AttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attribute-type code.
///
/// Real codes are multiples of 16. [`AttrType::END`] terminates the
/// attribute list and is never a real attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttrType(u32);

impl AttrType {
    /// $STANDARD_INFORMATION
    pub const STD_INFO: AttrType = AttrType(0x10);
    /// $ATTRIBUTE_LIST
    pub const LIST: AttrType = AttrType(0x20);
    /// $FILE_NAME
    pub const FILE_NAME: AttrType = AttrType(0x30);
    /// $OBJECT_ID
    pub const OBJECT_ID: AttrType = AttrType(0x40);
    /// $SECURITY_DESCRIPTOR
    pub const SECURITY: AttrType = AttrType(0x50);
    /// $VOLUME_NAME
    pub const VOLUME_NAME: AttrType = AttrType(0x60);
    /// $VOLUME_INFORMATION
    pub const VOLUME_INFO: AttrType = AttrType(0x70);
    /// $DATA
    pub const DATA: AttrType = AttrType(0x80);
    /// $INDEX_ROOT
    pub const INDEX_ROOT: AttrType = AttrType(0x90);
    /// $INDEX_ALLOCATION
    pub const INDEX_ALLOCATION: AttrType = AttrType(0xA0);
    /// $BITMAP
    pub const BITMAP: AttrType = AttrType(0xB0);
    /// $REPARSE_POINT
    pub const REPARSE: AttrType = AttrType(0xC0);
    /// $EA_INFORMATION
    pub const EA_INFO: AttrType = AttrType(0xD0);
    /// $EA
    pub const EA: AttrType = AttrType(0xE0);
    /// $PROPERTY_SET
    pub const PROPERTY_SET: AttrType = AttrType(0xF0);
    /// $LOGGED_UTILITY_STREAM
    pub const LOGGED_UTILITY_STREAM: AttrType = AttrType(0x100);
    /// End-of-list sentinel
    pub const END: AttrType = AttrType(0xFFFF_FFFF);

    /// Wrap a raw type code
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw on-disk value
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Whether this is the END sentinel
    pub const fn is_end(&self) -> bool {
        self.0 == Self::END.0
    }

    /// Whether the code is a well-formed type no greater than `max`.
    ///
    /// Codes must be multiples of 16.
    pub const fn is_valid(&self, max: u32) -> bool {
        self.0 & 0xF == 0 && self.0 <= max
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
