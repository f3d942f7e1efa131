//! Testing utilities for the record layer
//!
//! In-memory stand-ins for the volume collaborators, with fault injection:
//!
//! - **MemoryStorage**: record images in a map, unmapped records, repaired
//!   reads, failing writes and extent resolution
//! - **MemoryAllocator**: logs which slots were freed
//!
//! # Example
//!
//! ```ignore
//! use mftrec_record::testing::{MemoryAllocator, MemoryStorage};
//!
//! let storage = MemoryStorage::new(&config);
//! storage.unmap(RecordId::new(40));
//! ```

mod memory;

pub use memory::{MemoryAllocator, MemoryStorage};
