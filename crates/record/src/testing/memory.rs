use crate::storage::{ReadStatus, RecordAllocator, RecordStorage};
use mftrec_core::{RecordId, StorageError, VolumeConfig};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Records covered by the initialized part of a fresh `MemoryStorage`
pub const DEFAULT_INITIALIZED_RECORDS: u64 = 1024;

/// In-memory record storage with fault injection.
///
/// Records never written read back zero-filled.
#[derive(Debug)]
pub struct MemoryStorage {
    config: VolumeConfig,
    records: Mutex<HashMap<RecordId, Vec<u8>>>,
    unmapped: Mutex<HashSet<RecordId>>,
    repaired: Mutex<HashSet<RecordId>>,
    attached: Mutex<HashSet<RecordId>>,
    writes: Mutex<Vec<(RecordId, bool)>>,
    resolved: Mutex<Vec<u64>>,
    cleared: Mutex<Vec<(RecordId, RecordId)>>,
    initialized: AtomicU64,
    fail_writes: AtomicBool,
    fail_resolve: AtomicBool,
    keep_unmapped: AtomicBool,
}

impl MemoryStorage {
    /// Empty storage for a volume with this geometry
    pub fn new(config: &VolumeConfig) -> Self {
        Self {
            config: config.clone(),
            records: Mutex::new(HashMap::new()),
            unmapped: Mutex::new(HashSet::new()),
            repaired: Mutex::new(HashSet::new()),
            attached: Mutex::new(HashSet::new()),
            writes: Mutex::new(Vec::new()),
            resolved: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
            initialized: AtomicU64::new(DEFAULT_INITIALIZED_RECORDS),
            fail_writes: AtomicBool::new(false),
            fail_resolve: AtomicBool::new(false),
            keep_unmapped: AtomicBool::new(false),
        }
    }

    /// Store a raw image without going through `write_record`.
    pub fn put_raw(&self, id: RecordId, image: Vec<u8>) {
        self.records.lock().insert(id, image);
    }

    /// Stored image of record `id`, if any
    pub fn get_raw(&self, id: RecordId) -> Option<Vec<u8>> {
        self.records.lock().get(&id).cloned()
    }

    /// Report `id` as unmapped until its extent is resolved.
    pub fn unmap(&self, id: RecordId) {
        self.unmapped.lock().insert(id);
    }

    /// Report the next read of `id` as repaired.
    pub fn repair_next_read(&self, id: RecordId) {
        self.repaired.lock().insert(id);
    }

    /// Make every write fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make extent resolution fail.
    pub fn fail_resolve(&self, fail: bool) {
        self.fail_resolve.store(fail, Ordering::SeqCst);
    }

    /// Let extent resolution succeed without mapping anything.
    pub fn keep_unmapped(&self, keep: bool) {
        self.keep_unmapped.store(keep, Ordering::SeqCst);
    }

    /// Move the end of the initialized region.
    pub fn set_initialized_records(&self, count: u64) {
        self.initialized.store(count, Ordering::SeqCst);
    }

    /// Whether `attach` was called for `id`
    pub fn is_attached(&self, id: RecordId) -> bool {
        self.attached.lock().contains(&id)
    }

    /// Every successful write as `(record, wait)`, in order
    pub fn writes(&self) -> Vec<(RecordId, bool)> {
        self.writes.lock().clone()
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// Every vcn passed to `resolve_extent`, in order
    pub fn resolved_vcns(&self) -> Vec<u64> {
        self.resolved.lock().clone()
    }

    /// Every range passed to `clear_tail`, in order
    pub fn cleared_ranges(&self) -> Vec<(RecordId, RecordId)> {
        self.cleared.lock().clone()
    }
}

impl RecordStorage for MemoryStorage {
    fn read_record(&self, id: RecordId, buf: &mut [u8]) -> Result<ReadStatus, StorageError> {
        if self.unmapped.lock().contains(&id) {
            return Err(StorageError::NotFound { record: id });
        }
        match self.records.lock().get(&id) {
            Some(image) => {
                let n = image.len().min(buf.len());
                buf[..n].copy_from_slice(&image[..n]);
                buf[n..].fill(0);
            }
            None => buf.fill(0),
        }
        if self.repaired.lock().remove(&id) {
            Ok(ReadStatus::Repaired)
        } else {
            Ok(ReadStatus::Clean)
        }
    }

    fn write_record(&self, id: RecordId, buf: &[u8], wait: bool) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        self.records.lock().insert(id, buf.to_vec());
        self.writes.lock().push((id, wait));
        Ok(())
    }

    fn resolve_extent(&self, vcn: u64) -> Result<(), StorageError> {
        self.resolved.lock().push(vcn);
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(StorageError::Unmapped { vcn });
        }
        if !self.keep_unmapped.load(Ordering::SeqCst) {
            let config = &self.config;
            self.unmapped
                .lock()
                .retain(|id| config.record_vcn(*id) != vcn);
        }
        Ok(())
    }

    fn attach(&self, id: RecordId) -> Result<(), StorageError> {
        self.attached.lock().insert(id);
        Ok(())
    }

    fn clear_tail(&self, from: RecordId, to: RecordId) -> Result<(), StorageError> {
        self.cleared.lock().push((from, to));
        self.records
            .lock()
            .retain(|id, _| id.as_u64() < from.as_u64() || id.as_u64() >= to.as_u64());
        Ok(())
    }

    fn initialized_records(&self) -> u64 {
        self.initialized.load(Ordering::SeqCst)
    }
}

/// Record bitmap that only remembers which slots were freed.
#[derive(Debug, Default)]
pub struct MemoryAllocator {
    freed: Mutex<Vec<RecordId>>,
}

impl MemoryAllocator {
    /// Empty allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots returned through `mark_free`, in order
    pub fn freed(&self) -> Vec<RecordId> {
        self.freed.lock().clone()
    }
}

impl RecordAllocator for MemoryAllocator {
    fn mark_free(&self, id: RecordId) {
        self.freed.lock().push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritten_reads_zero() {
        let storage = MemoryStorage::new(&VolumeConfig::default());
        let mut buf = vec![0xAAu8; 1024];
        let status = storage.read_record(RecordId::new(30), &mut buf).unwrap();
        assert_eq!(status, ReadStatus::Clean);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_resolve_maps_whole_cluster() {
        let config = VolumeConfig::default();
        let storage = MemoryStorage::new(&config);
        // 4 records per 4K cluster
        storage.unmap(RecordId::new(40));
        storage.unmap(RecordId::new(43));
        storage.unmap(RecordId::new(44));
        storage.resolve_extent(config.record_vcn(RecordId::new(40))).unwrap();

        let mut buf = vec![0u8; 1024];
        assert!(storage.read_record(RecordId::new(43), &mut buf).is_ok());
        assert!(matches!(
            storage.read_record(RecordId::new(44), &mut buf),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_repaired_is_one_shot() {
        let storage = MemoryStorage::new(&VolumeConfig::default());
        let id = RecordId::new(20);
        storage.repair_next_read(id);
        let mut buf = vec![0u8; 1024];
        assert_eq!(storage.read_record(id, &mut buf).unwrap(), ReadStatus::Repaired);
        assert_eq!(storage.read_record(id, &mut buf).unwrap(), ReadStatus::Clean);
    }

    #[test]
    fn test_clear_tail_drops_range() {
        let storage = MemoryStorage::new(&VolumeConfig::default());
        for n in 10..14 {
            storage.put_raw(RecordId::new(n), vec![1u8; 1024]);
        }
        storage.clear_tail(RecordId::new(11), RecordId::new(13)).unwrap();
        assert!(storage.get_raw(RecordId::new(10)).is_some());
        assert!(storage.get_raw(RecordId::new(11)).is_none());
        assert!(storage.get_raw(RecordId::new(12)).is_none());
        assert!(storage.get_raw(RecordId::new(13)).is_some());
    }
}
