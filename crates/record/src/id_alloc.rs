//! Attribute id allocation.

use crate::record::Record;
use mftrec_core::AttrId;
use smallvec::SmallVec;
use tracing::warn;

impl Record {
    /// Hand out an attribute id not used by any attribute in the record.
    ///
    /// Normally the `next_attr_id` counter. Once the counter reaches
    /// [`AttrId::LIMIT`] the lowest id not present in the record is reused
    /// and the counter restarts just above both the highest id present and
    /// the id handed out.
    pub fn allocate_id(&mut self) -> AttrId {
        let next = self.next_attr_id();
        self.mark_dirty();
        if next < AttrId::LIMIT {
            self.set_next_attr_id(next + 1);
            return AttrId::new(next);
        }

        // a record holds a few dozen attributes at most
        let mut ids: SmallVec<[u16; 64]> = self
            .attrs()
            .map(|r| self.attr(r).id().as_u16())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let free = ids
            .iter()
            .enumerate()
            .find(|(expected, id)| **id != *expected as u16)
            .map_or(ids.len() as u16, |(expected, _)| expected as u16);
        let max = ids.last().copied().unwrap_or(0);

        warn!(record = %self.id(), free, max, "attribute id counter exhausted, reclaiming");
        self.set_next_attr_id(max.max(free).saturating_add(1));
        AttrId::new(free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{attr, put_u16};
    use mftrec_core::{AttrType, RecordId, UpcaseTable, VolumeConfig};

    #[test]
    fn test_fast_path_counts_up() {
        let mut record = Record::formatted(RecordId::new(20), &VolumeConfig::default());
        assert_eq!(record.allocate_id(), AttrId::new(0));
        assert_eq!(record.allocate_id(), AttrId::new(1));
        assert_eq!(record.next_attr_id(), 2);
        assert!(record.is_dirty());
    }

    #[test]
    fn test_exhausted_reclaims_lowest_gap() {
        let upcase = UpcaseTable::generated();
        let mut record = Record::formatted(RecordId::new(20), &VolumeConfig::default());
        for ty in [AttrType::STD_INFO, AttrType::FILE_NAME, AttrType::DATA, AttrType::BITMAP] {
            record.insert(&upcase, ty, &[], 0x18, 0x18).unwrap();
        }
        // rewrite ids to {0, 1, 3, 4}
        let refs: Vec<_> = record.attrs().collect();
        for (r, id) in refs.iter().zip([0u16, 1, 3, 4]) {
            put_u16(record.buf_mut(), r.offset() + attr::ID, id);
        }
        record.set_next_attr_id(AttrId::LIMIT);

        assert_eq!(record.allocate_id(), AttrId::new(2));
        assert_eq!(record.next_attr_id(), 5);
        // counter is usable again
        assert_eq!(record.allocate_id(), AttrId::new(5));
    }

    #[test]
    fn test_exhausted_without_gaps() {
        let upcase = UpcaseTable::generated();
        let mut record = Record::formatted(RecordId::new(20), &VolumeConfig::default());
        record.insert(&upcase, AttrType::STD_INFO, &[], 0x18, 0x18).unwrap();
        record.insert(&upcase, AttrType::DATA, &[], 0x18, 0x18).unwrap();
        record.set_next_attr_id(0xFFFF);

        assert_eq!(record.allocate_id(), AttrId::new(2));
        assert_eq!(record.next_attr_id(), 3);
    }

    #[test]
    fn test_inserts_after_exhaustion_stay_unique() {
        let upcase = UpcaseTable::generated();
        let mut record = Record::formatted(RecordId::new(20), &VolumeConfig::default());
        record.insert(&upcase, AttrType::STD_INFO, &[], 0x18, 0x18).unwrap();
        record.insert(&upcase, AttrType::FILE_NAME, &[], 0x18, 0x18).unwrap();
        record.set_next_attr_id(AttrId::LIMIT);
        record.insert(&upcase, AttrType::DATA, &[], 0x18, 0x18).unwrap();
        record.insert(&upcase, AttrType::BITMAP, &[], 0x18, 0x18).unwrap();

        let mut ids: Vec<u16> = record
            .attrs()
            .map(|r| record.attr(r).id().as_u16())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_exhausted_empty_record() {
        let mut record = Record::formatted(RecordId::new(20), &VolumeConfig::default());
        record.set_next_attr_id(AttrId::LIMIT);
        assert_eq!(record.allocate_id(), AttrId::new(0));
        assert_eq!(record.next_attr_id(), 1);
    }
}
