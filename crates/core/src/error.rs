//! Error types for mftrec
//!
//! Two layers, both derived with `thiserror`:
//! - `StorageError`: failures reported by the block I/O collaborator
//! - `RecordError`: failures of record-level operations
//!
//! Attribute enumeration and lookup never produce errors; a structurally bad
//! record simply yields no (more) attributes.

use crate::types::RecordId;
use std::io;
use thiserror::Error;

/// Result type alias for record operations
pub type Result<T> = std::result::Result<T, RecordError>;

/// Errors reported by the storage collaborator
#[derive(Debug, Error)]
pub enum StorageError {
    /// No extent is mapped for this record yet
    #[error("record {record} is not mapped")]
    NotFound {
        /// Record that could not be located
        record: RecordId,
    },

    /// The logical cluster has no backing extent
    #[error("no extent backs vcn {vcn}")]
    Unmapped {
        /// Logical cluster number that failed to resolve
        vcn: u64,
    },

    /// Underlying read/write failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors for record-level operations
#[derive(Debug, Error)]
pub enum RecordError {
    /// Header or attribute fields violate a layout invariant
    #[error("record corruption: {0}")]
    Corruption(String),

    /// Operation does not fit within the record's capacity
    #[error("capacity exceeded: need {needed} bytes, {available} available")]
    CapacityExceeded {
        /// Bytes the operation required
        needed: usize,
        /// Bytes that were available
        available: usize,
    },

    /// Record could not be located even after resolving its extent
    #[error("record {0} not found")]
    NotFound(RecordId),

    /// Storage collaborator failure, surfaced unchanged
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Run list cannot be serialized as requested
    #[error("invalid run list: {0}")]
    InvalidRunList(String),

    /// Volume configuration is unusable
    #[error("configuration error: {0}")]
    Config(String),
}

impl RecordError {
    /// Shorthand for [`RecordError::Corruption`]
    pub fn corruption(msg: impl Into<String>) -> Self {
        RecordError::Corruption(msg.into())
    }

    /// Whether this error means the record layout itself is bad
    pub fn is_corruption(&self) -> bool {
        matches!(self, RecordError::Corruption(_))
    }
}

impl From<io::Error> for RecordError {
    fn from(e: io::Error) -> Self {
        RecordError::Storage(StorageError::Io(e))
    }
}
