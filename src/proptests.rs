use super::*;

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

// page_bits = 3, cell_bits = 3: keys 0..64 are valid, 64..80 are out of range.
const PAGE_BITS: u8 = 3;
const CELL_BITS: u8 = 3;
const KEY_LIMIT: u32 = 1 << (PAGE_BITS + CELL_BITS);

#[derive(Clone, Debug)]
enum Op {
    Set(u32, u64),
    Delete(u32),
    Get(u32),
    Clear,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = 0u32..KEY_LIMIT + 16;
    let op = prop_oneof![
        50 => (key.clone(), any::<u64>()).prop_map(|(k, v)| Op::Set(k, v)),
        30 => key.clone().prop_map(Op::Delete),
        19 => key.prop_map(Op::Get),
        1 => Just(Op::Clear),
    ];
    prop::collection::vec(op, 0..=500)
}

fn policy_strategy() -> impl Strategy<Value = ReclaimPolicy> {
    prop_oneof![Just(ReclaimPolicy::Retain), Just(ReclaimPolicy::ReleaseEmpty)]
}

fn live_pages(model: &HashMap<u32, u64>) -> usize {
    model
        .keys()
        .map(|k| k >> CELL_BITS)
        .collect::<HashSet<_>>()
        .len()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_typed(ops in ops_strategy(), reclaim in policy_strategy()) {
        let config = PagedMapConfig::new(PAGE_BITS, CELL_BITS).reclaim(reclaim);
        let mut map = PagedMap::with_config(config).unwrap();
        let mut model: HashMap<u32, u64> = HashMap::new();
        let mut touched: HashSet<u32> = HashSet::new();

        for op in ops {
            match op {
                Op::Set(key, value) => {
                    let res = map.set(key, value);
                    if key < KEY_LIMIT {
                        prop_assert!(res.is_ok());
                        model.insert(key, value);
                        touched.insert(key >> CELL_BITS);
                    } else {
                        let is_out_of_range = matches!(res, Err(PagedMapError::KeyOutOfRange { .. }));
                        prop_assert!(is_out_of_range);
                    }
                }
                Op::Delete(key) => {
                    prop_assert_eq!(map.delete(key), model.remove(&key).is_some());
                }
                Op::Get(key) => {
                    prop_assert_eq!(map.get(key), model.get(&key));
                }
                Op::Clear => {
                    map.clear();
                    model.clear();
                    touched.clear();
                }
            }

            prop_assert_eq!(map.len(), model.len());
            match reclaim {
                ReclaimPolicy::Retain => prop_assert_eq!(map.allocated_pages(), touched.len()),
                ReclaimPolicy::ReleaseEmpty => prop_assert_eq!(map.allocated_pages(), live_pages(&model)),
            }
        }

        for key in 0..KEY_LIMIT + 16 {
            prop_assert_eq!(map.get(key), model.get(&key));
        }
    }

    #[test]
    fn prop_equivalence_raw(ops in ops_strategy(), reclaim in policy_strategy()) {
        let config = PagedMapConfig::new(PAGE_BITS, CELL_BITS).reclaim(reclaim);
        let mut map = RawPagedMap::with_config(config, 8).unwrap();
        let mut model: HashMap<u32, u64> = HashMap::new();

        for op in ops {
            match op {
                Op::Set(key, value) => {
                    let res = map.set(key, &value.to_le_bytes());
                    prop_assert_eq!(res.is_ok(), key < KEY_LIMIT);
                    if key < KEY_LIMIT {
                        model.insert(key, value);
                    }
                }
                Op::Delete(key) => {
                    prop_assert_eq!(map.delete(key), model.remove(&key).is_some());
                }
                Op::Get(key) => {
                    let got = map.get(key).map(|b| u64::from_le_bytes(b.try_into().unwrap()));
                    prop_assert_eq!(got, model.get(&key).copied());
                }
                Op::Clear => {
                    map.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(map.len(), model.len());
            if reclaim == ReclaimPolicy::ReleaseEmpty {
                prop_assert_eq!(map.allocated_pages(), live_pages(&model));
            }
        }
    }

    #[test]
    fn prop_equivalence_sharded(ops in ops_strategy(), shard_bits in 0u32..=PAGE_BITS as u32) {
        let map = ShardedPagedMap::with_shard_amount(PAGE_BITS, CELL_BITS, 1 << shard_bits).unwrap();
        let mut model: HashMap<u32, u64> = HashMap::new();

        for op in ops {
            match op {
                Op::Set(key, value) => {
                    prop_assert_eq!(map.set(key, value).is_ok(), key < KEY_LIMIT);
                    if key < KEY_LIMIT {
                        model.insert(key, value);
                    }
                }
                Op::Delete(key) => {
                    prop_assert_eq!(map.delete(key), model.remove(&key).is_some());
                }
                Op::Get(key) => {
                    let got = map.get(key).map(|r| *r);
                    prop_assert_eq!(got, model.get(&key).copied());
                }
                Op::Clear => {
                    map.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(map.len(), model.len());
        }
    }
}

#[test]
fn every_key_of_a_small_geometry_round_trips() {
    let mut map = PagedMap::new(PAGE_BITS, CELL_BITS).unwrap();

    for key in 0..KEY_LIMIT {
        map.set(key, u64::from(key) * 3).unwrap();
        assert_eq!(map.allocated_pages() as u32, (key >> CELL_BITS) + 1);
    }
    for key in 0..KEY_LIMIT {
        assert_eq!(map.get(key), Some(&(u64::from(key) * 3)));
    }
    for key in (0..KEY_LIMIT).rev() {
        assert!(map.delete(key));
        assert!(!map.delete(key));
    }
    assert!(map.is_empty());
    assert_eq!(map.allocated_pages(), 1 << PAGE_BITS);
}
