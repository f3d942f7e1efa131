//! Record lifecycle: load, format, persist, retire.
//!
//! `MetadataFile` is the per-mount context every record operation that
//! touches storage goes through. It owns the volume geometry, the upcase
//! table, the storage and allocator collaborators, and the lock guarding the
//! metadata file's own extent map.
//!
//! # Locking
//!
//! Loading a record of an ordinary file takes the extent lock shared, only
//! around the raw read. When storage reports the record as unmapped the
//! extent has to be resolved first; that path takes the object lock and the
//! extent lock exclusively, resolves, releases both, and retries the read
//! once. Reads on behalf of the metadata file itself take no lock: its
//! caller already holds the extent lock.

use crate::layout::RECORD_FLAG_IN_USE;
use crate::record::Record;
use crate::storage::{ReadStatus, RecordAllocator, RecordStorage};
use mftrec_core::{RecordError, RecordId, Result, StorageError, UpcaseTable, VolumeConfig};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-mount record lifecycle controller.
pub struct MetadataFile {
    config: VolumeConfig,
    upcase: Arc<UpcaseTable>,
    storage: Arc<dyn RecordStorage>,
    allocator: Arc<dyn RecordAllocator>,
    /// Guards the extent map of the metadata file
    run_lock: RwLock<()>,
    /// Object lock of the metadata file's inode
    object_lock: Mutex<()>,
    mounted: AtomicBool,
}

impl MetadataFile {
    /// Create a controller for a volume.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Config` if the configuration is invalid.
    pub fn new(
        config: VolumeConfig,
        upcase: Arc<UpcaseTable>,
        storage: Arc<dyn RecordStorage>,
        allocator: Arc<dyn RecordAllocator>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            upcase,
            storage,
            allocator,
            run_lock: RwLock::new(()),
            object_lock: Mutex::new(()),
            mounted: AtomicBool::new(false),
        })
    }

    /// Volume geometry
    pub fn config(&self) -> &VolumeConfig {
        &self.config
    }

    /// Upcase table used for attribute ordering
    pub fn upcase(&self) -> &UpcaseTable {
        &self.upcase
    }

    /// Switch to mounted operation, where extent locking applies.
    pub fn mount(&self) {
        self.mounted.store(true, Ordering::Release);
        info!(record_size = self.config.record_size, "metadata file mounted");
    }

    /// Leave mounted operation
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::Release);
    }

    /// Whether the volume is mounted
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Load an ordinary record.
    pub fn get(&self, id: RecordId) -> Result<Record> {
        self.load(id, false)
    }

    /// Read record `id` from storage and check its declared size.
    ///
    /// A read that storage had to repair is accepted and the record marked
    /// dirty. An unmapped record triggers extent resolution and one retry.
    ///
    /// # Errors
    ///
    /// - `RecordError::NotFound` if the record is still unmapped after
    ///   resolving its extent
    /// - `RecordError::Storage` for I/O and resolution failures
    /// - `RecordError::Corruption` if `total` differs from the record size
    pub fn load(&self, id: RecordId, is_primary: bool) -> Result<Record> {
        let mut record = Record::zeroed(id, &self.config);
        self.read_into(&mut record, is_primary)?;
        debug!(record = %id, used = record.used(), "loaded record");
        Ok(record)
    }

    fn read_into(&self, record: &mut Record, is_primary: bool) -> Result<()> {
        let id = record.id();
        let shared = self.is_mounted() && !is_primary;

        let status = match self.read_raw(record, shared) {
            Err(StorageError::NotFound { .. }) => {
                let vcn = self.config.record_vcn(id);
                debug!(record = %id, vcn, "record unmapped, resolving extent");
                {
                    let _object = shared.then(|| self.object_lock.lock());
                    let _runs = shared.then(|| self.run_lock.write());
                    self.storage.resolve_extent(vcn)?;
                }
                match self.read_raw(record, shared) {
                    Err(StorageError::NotFound { .. }) => {
                        return Err(RecordError::NotFound(id))
                    }
                    other => other?,
                }
            }
            other => other?,
        };

        if status == ReadStatus::Repaired {
            warn!(record = %id, "record repaired on read, will be rewritten");
            record.mark_dirty();
        }

        if record.total() != self.config.record_size {
            return Err(RecordError::corruption(format!(
                "record {} declares total {}, record size is {}",
                id,
                record.total(),
                self.config.record_size
            )));
        }
        record.set_attached();
        Ok(())
    }

    fn read_raw(
        &self,
        record: &mut Record,
        shared: bool,
    ) -> std::result::Result<ReadStatus, StorageError> {
        let id = record.id();
        let _runs = shared.then(|| self.run_lock.read());
        self.storage.read_record(id, record.buf_mut())
    }

    /// Sequence number a freshly formatted record `id` should carry.
    fn next_sequence(&self, record: &mut Record, is_primary: bool) -> u16 {
        let number = record.id().as_u64();
        if record.id() == RecordId::MFT {
            return 1;
        }
        if number < self.config.first_free_record {
            return number as u16;
        }
        if number >= self.storage.initialized_records() {
            return 1;
        }
        match self.read_into(record, is_primary) {
            Ok(()) if record.has_signature() => match record.sequence_number().wrapping_add(1) {
                0 => 1,
                seq => seq,
            },
            Ok(()) => 1,
            Err(e) => {
                debug!(record = %record.id(), error = %e, "previous occupant unreadable");
                1
            }
        }
    }

    /// Build an empty, in-use record for slot `id`.
    ///
    /// A slot that held a record before gets that record's sequence number
    /// plus one so stale references to the old object can be detected.
    /// The record is dirty and has backing storage attached.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Storage` if backing storage cannot be attached.
    pub fn format_new(&self, id: RecordId, flags: u16, is_primary: bool) -> Result<Record> {
        let mut record = Record::zeroed(id, &self.config);
        let seq = self.next_sequence(&mut record, is_primary);
        let attached = record.is_attached();

        let mut record = Record::formatted(id, &self.config);
        record.set_sequence_number(seq);
        record.set_flags(RECORD_FLAG_IN_USE | flags);
        record.mark_dirty();

        if attached {
            record.set_attached();
        } else {
            let _runs = (self.is_mounted() && !is_primary).then(|| self.run_lock.read());
            self.storage.attach(id)?;
            record.set_attached();
        }

        debug!(record = %id, seq, flags, "formatted record");
        Ok(record)
    }

    /// Write a dirty record back; no-op when clean.
    ///
    /// The dirty flag is cleared only after a successful write.
    pub fn persist(&self, record: &mut Record, wait: bool) -> Result<()> {
        if !record.is_dirty() {
            return Ok(());
        }
        self.storage.write_record(record.id(), record.as_bytes(), wait)?;
        record.clear_dirty();
        debug!(record = %record.id(), wait, "persisted record");
        Ok(())
    }

    /// Release a record whose object has been deleted.
    ///
    /// Reserved system slots are cleared in bulk by storage. Any other
    /// record loses its in-use flag, is written synchronously, and its slot
    /// is returned to the allocator.
    pub fn retire(&self, record: &mut Record) {
        let id = record.id();
        if self.config.is_reserved(id) {
            if let Err(e) = self.storage.clear_tail(id, id.next()) {
                warn!(record = %id, error = %e, "failed to clear reserved record");
            }
            record.clear_dirty();
            debug!(record = %id, "cleared reserved record");
            return;
        }

        record.clear_in_use();
        record.mark_dirty();
        if let Err(e) = self.persist(record, true) {
            warn!(record = %id, error = %e, "failed to write retired record");
        }
        self.allocator.mark_free(id);
        debug!(record = %id, "retired record");
    }
}

impl std::fmt::Debug for MetadataFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataFile")
            .field("config", &self.config)
            .field("mounted", &self.is_mounted())
            .finish()
    }
}
