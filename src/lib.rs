//! mftrec - record layer of an NTFS-style master file table
//!
//! Each file on the volume is described by one or more fixed-size records
//! holding a header and a packed, ordered sequence of attributes. This crate
//! reads, validates, edits and writes those records.
//!
//! # Quick Start
//!
//! ```ignore
//! use mftrec::{AttrType, MetadataFile, RecordId};
//!
//! let mft = MetadataFile::new(config, upcase, storage, allocator)?;
//! let mut record = mft.format_new(RecordId::new(40), 0, false)?;
//! let upcase = mft.upcase();
//! record.insert(upcase, AttrType::DATA, &[], 0x18, 0x18);
//! mft.persist(&mut record, true)?;
//! ```
//!
//! The pieces live in two crates, both re-exported here:
//! - `mftrec-core`: identifiers, errors, configuration, upcase table
//! - `mftrec-record`: record editing and lifecycle

pub use mftrec_core::*;
pub use mftrec_record::*;
