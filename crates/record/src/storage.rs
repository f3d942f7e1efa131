//! Collaborators the record layer depends on.
//!
//! The record layer never touches a device directly. Raw record I/O,
//! extent resolution for the metadata file, and the record bitmap are
//! supplied by the surrounding volume through these traits.

use mftrec_core::{RecordId, StorageError};

/// How a successful read came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Bytes read as stored
    Clean,
    /// Sector protection had to repair the image; the record should be
    /// written back
    Repaired,
}

/// Block I/O for records of the metadata file.
///
/// Implementations apply and strip sector fixups themselves.
pub trait RecordStorage: Send + Sync {
    /// Fill `buf` with the image of record `id`.
    ///
    /// Returns `StorageError::NotFound` when no extent is mapped for the
    /// record yet.
    fn read_record(&self, id: RecordId, buf: &mut [u8]) -> Result<ReadStatus, StorageError>;

    /// Write the image of record `id`. With `wait` the call returns only
    /// once the write is durable; otherwise it may be deferred.
    fn write_record(&self, id: RecordId, buf: &[u8], wait: bool) -> Result<(), StorageError>;

    /// Load the extent of the metadata file covering logical cluster `vcn`.
    fn resolve_extent(&self, vcn: u64) -> Result<(), StorageError>;

    /// Associate backing storage with record `id` ahead of its first write.
    fn attach(&self, id: RecordId) -> Result<(), StorageError>;

    /// Clear the on-disk images of records in `[from, to)`.
    fn clear_tail(&self, from: RecordId, to: RecordId) -> Result<(), StorageError>;

    /// Number of records covered by the initialized part of the metadata
    /// file. Slots at or beyond this have never held a record.
    fn initialized_records(&self) -> u64;
}

/// Record bitmap of the metadata file.
pub trait RecordAllocator: Send + Sync {
    /// Return a slot to the free pool
    fn mark_free(&self, id: RecordId);
}
