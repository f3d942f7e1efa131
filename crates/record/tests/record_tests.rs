//! Record editing tests for mftrec-record
//!
//! Exercises insert/remove/resize/pack through the public API only:
//!
//! 1. **Fixed scenarios** - insert into an empty record, capacity rejection,
//!    run packing with little slack
//! 2. **Properties** - ordering, capacity conservation, resize idempotence
//!    under random operation sequences

use mftrec_core::{AttrType, RecordId, UpcaseTable, VolumeConfig};
use mftrec_record::layout::{empty_attr_offset, END_MARKER_SIZE};
use mftrec_record::{compare_attr, AttrRef, MappingPairs, Record, RunList};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

// ============================================================================
// Test Helpers
// ============================================================================

fn utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn fresh() -> Record {
    Record::formatted(RecordId::new(64), &VolumeConfig::default())
}

fn header_size() -> u32 {
    (empty_attr_offset(1024) + END_MARKER_SIZE) as u32
}

fn assert_consistent(record: &Record, upcase: &UpcaseTable) {
    record.validate().unwrap();
    assert!(record.used() <= record.total());

    let sizes: u32 = record.attrs().map(|r| record.attr(r).size()).sum();
    assert_eq!(
        record.used(),
        record.attr_offset() as u32 + sizes + END_MARKER_SIZE as u32
    );

    let refs: Vec<AttrRef> = record.attrs().collect();
    for pair in refs.windows(2) {
        let (a, b) = (record.attr(pair[0]), record.attr(pair[1]));
        assert_ne!(
            compare_attr(&a, b.attr_type(), &b.name(), upcase),
            Ordering::Greater,
            "attributes out of order"
        );
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_insert_into_empty_record() {
    let upcase = UpcaseTable::generated();
    let mut record = fresh();
    assert_eq!(record.used(), header_size());
    assert_eq!(record.total(), 1024);

    let name = utf16("$I30");
    let r = record
        .insert(&upcase, AttrType::INDEX_ROOT, &name, 64, 24)
        .unwrap();
    assert_eq!(record.used(), header_size() + 64);
    assert_eq!(record.attr(r).id().as_u16(), 0);
    assert_eq!(record.attrs().count(), 1);
    assert_consistent(&record, &upcase);
}

#[test]
fn test_capacity_rejection_leaves_record_untouched() {
    let upcase = UpcaseTable::generated();
    let mut record = fresh();
    record
        .insert(&upcase, AttrType::STD_INFO, &[], 0x60, 0x18)
        .unwrap();
    let before = record.as_bytes().to_vec();

    let too_big = (record.total() - record.used()) as usize + 8;
    assert!(record
        .insert(&upcase, AttrType::DATA, &[], too_big, 0x18)
        .is_none());
    assert_eq!(record.as_bytes(), before.as_slice());
}

#[test]
fn test_pack_with_little_slack() {
    let upcase = UpcaseTable::generated();
    let mut record = fresh();

    // filler that leaves 32 free bytes once DATA is in place
    let data_size = 0x48;
    let filler = 1024 - header_size() as usize - data_size - 32;
    record
        .insert(&upcase, AttrType::STD_INFO, &[], filler, 0x18)
        .unwrap();
    let r = record
        .insert(&upcase, AttrType::DATA, &[], data_size, 0x40)
        .unwrap();
    record.attr_mut(r).set_nonresident(0, 0x40);
    assert_eq!(record.free_space(), 32);

    // 1000 single-cluster fragments, none adjacent
    let mut runs = RunList::new();
    for i in 0..1000u64 {
        runs.push(Some(0x1000 + 2 * i), 1);
    }

    let packed = record.pack_runs(r, &MappingPairs, &runs, 1000).unwrap();
    assert!(packed.clusters > 0);
    assert!(packed.clusters < 1000);
    assert!(packed.bytes <= 40);

    let data = record.find(None, AttrType::DATA, &[], None).unwrap();
    let attr = record.attr(data);
    assert_eq!(attr.svcn(), 0);
    assert_eq!(attr.evcn(), attr.svcn() + packed.clusters as i64 - 1);

    let decoded = MappingPairs::decode(attr.run_bytes(), 0).unwrap();
    assert_eq!(decoded.next_vcn(), packed.clusters);
    assert_eq!(decoded.lcn_of(0), Some(Some(0x1000)));
    assert_consistent(&record, &upcase);
}

#[test]
fn test_continuation_packs_from_svcn() {
    let upcase = UpcaseTable::generated();
    let mut record = fresh();
    let r = record
        .insert(&upcase, AttrType::DATA, &[], 0x48, 0x40)
        .unwrap();
    record.attr_mut(r).set_nonresident(100, 0x40);

    let mut runs = RunList::new();
    runs.push(Some(0x4000), 150);
    runs.push(None, 50);
    let packed = record.pack_runs(r, &MappingPairs, &runs, 100).unwrap();
    assert_eq!(packed.clusters, 100);

    let data = record.find(None, AttrType::DATA, &[], None).unwrap();
    let attr = record.attr(data);
    assert_eq!(attr.evcn(), 199);
    let decoded = MappingPairs::decode(attr.run_bytes(), 100).unwrap();
    assert_eq!(decoded.lcn_of(100), Some(Some(0x4000 + 100)));
    assert_eq!(decoded.lcn_of(160), Some(None));
    assert_consistent(&record, &upcase);
}

#[test]
fn test_pack_random_fragments_decodes_to_prefix() {
    let upcase = UpcaseTable::generated();
    let mut rng = StdRng::seed_from_u64(0x4d46_5452);

    for _ in 0..50 {
        let mut record = fresh();
        let r = record
            .insert(&upcase, AttrType::DATA, &[], 0x48, 0x40)
            .unwrap();
        record.attr_mut(r).set_nonresident(0, 0x40);

        let mut runs = RunList::new();
        for _ in 0..rng.gen_range(1..400) {
            let lcn = if rng.gen_bool(0.1) {
                None
            } else {
                Some(rng.gen_range(0..1u64 << 32))
            };
            runs.push(lcn, rng.gen_range(1..5000));
        }
        let total = runs.next_vcn();

        let packed = record.pack_runs(r, &MappingPairs, &runs, total).unwrap();
        assert!(packed.clusters > 0 && packed.clusters <= total);

        let data = record.find(None, AttrType::DATA, &[], None).unwrap();
        let decoded = MappingPairs::decode(record.attr(data).run_bytes(), 0).unwrap();
        assert_eq!(decoded.next_vcn(), packed.clusters);
        assert_eq!(decoded.runs(), &runs.runs()[..decoded.len()]);
        assert_consistent(&record, &upcase);
    }
}

#[test]
fn test_remove_then_reinsert_reuses_space() {
    let upcase = UpcaseTable::generated();
    let mut record = fresh();
    record
        .insert(&upcase, AttrType::STD_INFO, &[], 0x48, 0x18)
        .unwrap();
    let name = record
        .insert(&upcase, AttrType::FILE_NAME, &[], 0x68, 0x18)
        .unwrap();
    record
        .insert(&upcase, AttrType::DATA, &[], 0x18, 0x18)
        .unwrap();
    let used = record.used();

    assert!(record.remove(name));
    assert_eq!(record.used(), used - 0x68);
    assert!(record.find(None, AttrType::FILE_NAME, &[], None).is_none());
    assert_consistent(&record, &upcase);

    let again = record
        .insert(&upcase, AttrType::FILE_NAME, &[], 0x68, 0x18)
        .unwrap();
    assert_eq!(record.used(), used);
    // ids are never handed out twice while the counter has room
    assert_eq!(record.attr(again).id().as_u16(), 3);
    assert_consistent(&record, &upcase);
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Insert { ty: u32, name: &'static str, size: usize },
    Remove { pick: usize },
    Resize { pick: usize, delta: isize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let types = prop::sample::select(vec![0x10u32, 0x30, 0x50, 0x80, 0x90, 0xB0]);
    let names = prop::sample::select(vec!["", "a", "B", "$I30", "stream"]);
    prop_oneof![
        (types, names, 3usize..20).prop_map(|(ty, name, q)| Op::Insert {
            ty,
            name,
            size: q * 8
        }),
        (0usize..16).prop_map(|pick| Op::Remove { pick }),
        (0usize..16, -40isize..40).prop_map(|(pick, delta)| Op::Resize { pick, delta }),
    ]
}

fn nth_attr(record: &Record, pick: usize) -> Option<AttrRef> {
    let count = record.attrs().count();
    if count == 0 {
        return None;
    }
    record.attrs().nth(pick % count)
}

proptest! {
    #[test]
    fn prop_edits_keep_order_and_accounting(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let upcase = UpcaseTable::generated();
        let mut record = fresh();

        for op in ops {
            match op {
                Op::Insert { ty, name, size } => {
                    let name = utf16(name);
                    let name_offset = 0x18u16;
                    if name_offset as usize + 2 * name.len() > size {
                        continue;
                    }
                    let used = record.used();
                    if let Some(r) = record.insert(&upcase, AttrType::new(ty), &name, size, name_offset) {
                        let id = record.attr(r).id();
                        prop_assert_eq!(record.used(), used + size as u32);
                        let found = record.find(None, AttrType::new(ty), &name, Some(id));
                        prop_assert_eq!(found, Some(r));
                        prop_assert_eq!(record.attr(r).size() as usize, size);
                    } else {
                        prop_assert_eq!(record.used(), used);
                    }
                }
                Op::Remove { pick } => {
                    if let Some(r) = nth_attr(&record, pick) {
                        prop_assert!(record.remove(r));
                    }
                }
                Op::Resize { pick, delta } => {
                    if let Some(r) = nth_attr(&record, pick) {
                        record.resize(r, delta);
                    }
                }
            }
            assert_consistent(&record, &upcase);
        }
    }

    #[test]
    fn prop_resize_round_trip(n in 1isize..200, filler in 0usize..110) {
        let upcase = UpcaseTable::generated();
        let mut record = fresh();
        record
            .insert(&upcase, AttrType::STD_INFO, &[], 0x18 + filler * 8, 0x18)
            .unwrap();
        let r = record
            .insert(&upcase, AttrType::DATA, &[], 0x20, 0x18)
            .unwrap();
        record.attr_mut(r).set_resident(0x18, 8);
        record
            .insert(&upcase, AttrType::BITMAP, &[], 0x20, 0x18)
            .unwrap();

        let used = record.used();
        let before = record.as_bytes().to_vec();
        let step = ((n + 7) / 8) * 8;

        if record.resize(r, n) {
            prop_assert_eq!(record.used(), used + step as u32);
            prop_assert!(record.resize(r, -step));
            prop_assert_eq!(record.used(), used);
            prop_assert_eq!(record.attr(r).size(), 0x20);
            prop_assert_eq!(record.attr(r).data_size(), 8);
            prop_assert_eq!(record.as_bytes(), before.as_slice());
        } else {
            prop_assert!(used as usize + step as usize > record.record_size());
            prop_assert_eq!(record.as_bytes(), before.as_slice());
        }
    }
}
