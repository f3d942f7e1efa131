//! Core types for mftrec
//!
//! This crate defines the foundational types shared by the record layer:
//! - RecordId / AttrId: identifiers for records and attributes within them
//! - AttrType: ordered attribute-type codes, including the END sentinel
//! - Error: error hierarchy for storage collaborators and record operations
//! - VolumeConfig: per-volume geometry and validation bounds (TOML)
//! - UpcaseTable: volume-wide case folding used for attribute-name collation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;
pub mod upcase;

pub use config::{VolumeConfig, CONFIG_FILE_NAME};
pub use error::{RecordError, Result, StorageError};
pub use types::{AttrId, AttrType, RecordId};
pub use upcase::UpcaseTable;
