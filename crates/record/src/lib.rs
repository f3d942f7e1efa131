//! Record layer for mftrec
//!
//! Operations on single fixed-size records of an NTFS-style master file
//! table:
//!
//! - Attribute enumeration with structural validation (`enumerate`)
//! - Ordered lookup by type, name and id (`locate`)
//! - Attribute id allocation (`id_alloc`)
//! - Insert, remove and resize inside the fixed buffer (`space`)
//! - Mapping-pairs encoding of run lists into non-resident headers
//!   (`runlist`, `pack`)
//! - Load, format, persist and retire against storage (`mft`)
//!
//! Records are plain owned buffers. Anything that touches a device goes
//! through the [`RecordStorage`] and [`RecordAllocator`] traits.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod enumerate;
pub mod id_alloc;
pub mod layout;
pub mod locate;
pub mod mft;
pub mod pack;
pub mod record;
pub mod runlist;
pub mod space;
pub mod storage;
pub mod testing;

pub use enumerate::Attrs;
pub use locate::compare_attr;
pub use mft::MetadataFile;
pub use record::{Attr, AttrMut, AttrName, AttrRef, Record};
pub use runlist::{MappingPairs, Packed, Run, RunEncoder, RunList};
pub use storage::{ReadStatus, RecordAllocator, RecordStorage};
