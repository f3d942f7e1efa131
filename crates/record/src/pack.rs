//! Packing a run list into a non-resident attribute.
//!
//! The run list sits at the end of the attribute entry, so how much of it
//! fits depends on the free space in the whole record. Packing first pushes
//! everything after the attribute to the very end of the buffer, lets the
//! encoder use the whole gap, then pulls the tail back to sit right after
//! the bytes actually written.

use crate::layout::quad_align;
use crate::record::{AttrRef, Record};
use crate::runlist::{Packed, RunEncoder, RunList};
use mftrec_core::{RecordError, Result};
use tracing::debug;

impl Record {
    /// Encode up to `len` clusters of `runs`, starting at the attribute's
    /// `svcn`, into non-resident attribute `r`.
    ///
    /// On success the attribute size, its `evcn` and the record's `used`
    /// reflect the packed run list. `Packed::clusters` may be less than
    /// `len`; the remainder belongs in another record. On failure the
    /// record is left as it was.
    ///
    /// `r` and every reference after it are invalid afterwards.
    pub fn pack_runs(
        &mut self,
        r: AttrRef,
        encoder: &impl RunEncoder,
        runs: &RunList,
        len: u64,
    ) -> Result<Packed> {
        let used = self.used() as usize;
        let record_size = self.record_size();
        let off = r.offset();
        let view = self.attr(r);
        if used > record_size || off >= used {
            return Err(RecordError::corruption(format!(
                "attribute at {:#x} outside used {:#x}",
                off, used
            )));
        }
        if view.is_resident() {
            return Err(RecordError::InvalidRunList(
                "attribute is resident".to_string(),
            ));
        }
        let size = view.size() as usize;
        let run_off = view.run_offset() as usize;
        let svcn = view.svcn();
        if off + size > used || run_off > size || svcn < 0 {
            return Err(RecordError::corruption(format!(
                "non-resident attribute at {:#x} is malformed",
                off
            )));
        }

        let next = off + size;
        let tail = used - next;
        let run_size = size - run_off;
        let gap = record_size - used;
        let run_start = off + run_off;
        let saved_runs = self.as_bytes()[run_start..next].to_vec();

        self.shift(next, next + gap, tail);
        self.zero(run_start, run_size + gap);

        let encoded = {
            let dst = &mut self.buf_mut()[run_start..run_start + run_size + gap];
            encoder.encode(runs, svcn as u64, len, dst)
        };
        let packed = match encoded {
            Ok(packed) if quad_align(packed.bytes) <= run_size + gap => packed,
            Ok(packed) => {
                self.undo_pack(run_start, &saved_runs, next, gap, tail);
                return Err(RecordError::CapacityExceeded {
                    needed: quad_align(packed.bytes),
                    available: run_size + gap,
                });
            }
            Err(e) => {
                self.undo_pack(run_start, &saved_runs, next, gap, tail);
                return Err(e);
            }
        };

        let new_run_size = quad_align(packed.bytes);
        let new_next = run_start + new_run_size;
        self.shift(next + gap, new_next, tail);
        let new_used = new_next + tail;
        self.zero(new_used, record_size - new_used);

        let mut attr = self.attr_mut(r);
        attr.set_size(size - run_size + new_run_size);
        attr.set_evcn(svcn + packed.clusters as i64 - 1);
        self.set_used(new_used);
        self.mark_dirty();

        debug!(
            record = %self.id(),
            svcn,
            requested = len,
            packed = packed.clusters,
            bytes = packed.bytes,
            "packed run list"
        );
        Ok(packed)
    }

    fn undo_pack(&mut self, run_start: usize, saved: &[u8], next: usize, gap: usize, tail: usize) {
        self.shift(next + gap, next, tail);
        self.buf_mut()[run_start..next].copy_from_slice(saved);
        let used = next + tail;
        let record_size = self.record_size();
        self.zero(used, record_size - used);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runlist::MappingPairs;
    use mftrec_core::{AttrType, RecordId, UpcaseTable, VolumeConfig};

    struct FailingEncoder;

    impl RunEncoder for FailingEncoder {
        fn encode(&self, _: &RunList, _: u64, _: u64, dst: &mut [u8]) -> Result<Packed> {
            dst.fill(0xEE);
            Err(RecordError::InvalidRunList("boom".to_string()))
        }
    }

    struct GreedyEncoder;

    impl RunEncoder for GreedyEncoder {
        fn encode(&self, _: &RunList, _: u64, len: u64, dst: &mut [u8]) -> Result<Packed> {
            Ok(Packed {
                bytes: dst.len() + 1,
                clusters: len,
            })
        }
    }

    fn with_nonresident() -> (Record, AttrRef) {
        let upcase = UpcaseTable::generated();
        let mut record = Record::formatted(RecordId::new(60), &VolumeConfig::default());
        record
            .insert(&upcase, AttrType::STD_INFO, &[], 0x60, 0x18)
            .unwrap();
        record
            .insert(&upcase, AttrType::BITMAP, &[], 0x20, 0x18)
            .unwrap();
        let r = record
            .insert(&upcase, AttrType::DATA, &[], 0x48, 0x40)
            .unwrap();
        record.attr_mut(r).set_nonresident(0, 0x40);
        (record, r)
    }

    fn contiguous(len: u64) -> RunList {
        let mut runs = RunList::new();
        runs.push(Some(0x2000), len);
        runs
    }

    #[test]
    fn test_pack_small_list() {
        let (mut record, r) = with_nonresident();
        let used = record.used();
        let packed = record
            .pack_runs(r, &MappingPairs, &contiguous(100), 100)
            .unwrap();
        assert_eq!(packed.clusters, 100);
        assert_eq!(packed.bytes, 5);

        let data = record.find(None, AttrType::DATA, &[], None).unwrap();
        let attr = record.attr(data);
        // 8 bytes of run area became quad_align(5) = 8
        assert_eq!(attr.size(), 0x48);
        assert_eq!(attr.evcn(), 99);
        assert_eq!(record.used(), used);
        assert_eq!(
            MappingPairs::decode(attr.run_bytes(), 0).unwrap(),
            contiguous(100)
        );
        record.validate().unwrap();
    }

    #[test]
    fn test_pack_grows_attribute_and_keeps_tail() {
        let (mut record, r) = with_nonresident();
        let bitmap_id = {
            let b = record.find(None, AttrType::BITMAP, &[], None).unwrap();
            record.attr(b).id()
        };
        // DATA sorts before BITMAP, so growing it must move BITMAP along
        let mut runs = RunList::new();
        for i in 0..10 {
            runs.push(Some(0x10_0000 + i * 0x1000), 1);
        }
        let used = record.used();
        let packed = record.pack_runs(r, &MappingPairs, &runs, 10).unwrap();
        assert_eq!(packed.clusters, 10);

        let data = record.find(None, AttrType::DATA, &[], None).unwrap();
        let grown = quad_align(packed.bytes) as u32 - 8;
        assert_eq!(record.attr(data).size(), 0x48 + grown);
        assert_eq!(record.used(), used + grown);
        assert!(record
            .find(None, AttrType::BITMAP, &[], Some(bitmap_id))
            .is_some());
        record.validate().unwrap();
    }

    #[test]
    fn test_pack_failure_restores_record() {
        let (mut record, r) = with_nonresident();
        let before = record.as_bytes().to_vec();
        let err = record
            .pack_runs(r, &FailingEncoder, &contiguous(4), 4)
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidRunList(_)));
        assert_eq!(record.as_bytes(), before.as_slice());
    }

    #[test]
    fn test_pack_overreporting_encoder_rejected() {
        let (mut record, r) = with_nonresident();
        let before = record.as_bytes().to_vec();
        let err = record
            .pack_runs(r, &GreedyEncoder, &contiguous(4), 4)
            .unwrap_err();
        assert!(matches!(err, RecordError::CapacityExceeded { .. }));
        assert_eq!(record.as_bytes(), before.as_slice());
    }

    #[test]
    fn test_pack_resident_rejected() {
        let (mut record, _) = with_nonresident();
        let std = record.find(None, AttrType::STD_INFO, &[], None).unwrap();
        assert!(matches!(
            record.pack_runs(std, &MappingPairs, &contiguous(4), 4),
            Err(RecordError::InvalidRunList(_))
        ));
    }

    #[test]
    fn test_pack_everything_from_nonzero_svcn() {
        let (mut record, r) = with_nonresident();
        record.attr_mut(r).set_nonresident(1, 0x40);
        let packed = record
            .pack_runs(r, &MappingPairs, &contiguous(100), u64::MAX)
            .unwrap();
        assert_eq!(packed.clusters, 99);

        let data = record.find(None, AttrType::DATA, &[], None).unwrap();
        assert_eq!(record.attr(data).evcn(), 99);
        record.validate().unwrap();
    }
}
