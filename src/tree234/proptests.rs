use super::*;
use crate::error::JoinError;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

fn relation() -> impl Strategy<Value = Relation> {
    prop_oneof![
        Just(Relation::Eq),
        Just(Relation::Lt),
        Just(Relation::Le),
        Just(Relation::Gt),
        Just(Relation::Ge),
    ]
}

#[derive(Clone, Debug, Arbitrary)]
enum SortedOp {
    #[proptest(weight = 5)]
    Insert(#[proptest(strategy = "0u16..400")] u16),
    #[proptest(weight = 3)]
    Remove(#[proptest(strategy = "0u16..400")] u16),
    RemoveAt(usize),
    #[proptest(weight = 2)]
    Find(
        #[proptest(strategy = "0u16..400")] u16,
        #[proptest(strategy = "relation()")] Relation,
    ),
}

#[derive(Clone, Debug, Arbitrary)]
enum SeqOp {
    #[proptest(weight = 5)]
    InsertAt(usize, u32),
    #[proptest(weight = 3)]
    RemoveAt(usize),
    Get(usize),
}

/// Where `relation` lands for `key` in a sorted, duplicate-free slice.
fn model_relative(model: &[u16], key: u16, relation: Relation) -> Option<(u16, usize)> {
    let index = match (model.binary_search(&key), relation) {
        (Ok(i), Relation::Eq | Relation::Le | Relation::Ge) => i,
        (Ok(i), Relation::Lt) => i.checked_sub(1)?,
        (Ok(i), Relation::Gt) => i + 1,
        (Err(_), Relation::Eq) => return None,
        (Err(i), Relation::Lt | Relation::Le) => i.checked_sub(1)?,
        (Err(i), Relation::Gt | Relation::Ge) => i,
    };
    model.get(index).map(|&v| (v, index))
}

fn sorted_from(values: &[u16]) -> Tree234<u16> {
    let mut t = Tree234::ordered();
    for &v in values {
        t.insert(v);
    }
    t
}

fn positional_from(values: &[u32]) -> Tree234<u32> {
    let mut t = Tree234::unsorted();
    for (i, &v) in values.iter().enumerate() {
        t.insert_at(i, v).unwrap();
    }
    t
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_sorted_matches_model(ops in prop::collection::vec(any::<SortedOp>(), 0..=400)) {
        let mut t = Tree234::ordered();
        let mut model: Vec<u16> = Vec::new();

        for op in ops {
            match op {
                SortedOp::Insert(v) => {
                    prop_assert_eq!(*t.insert(v), v);
                    if let Err(at) = model.binary_search(&v) {
                        model.insert(at, v);
                    }
                }
                SortedOp::Remove(v) => {
                    let expected = model.binary_search(&v).ok().map(|at| model.remove(at));
                    prop_assert_eq!(t.remove(&v), expected);
                }
                SortedOp::RemoveAt(i) => {
                    let at = i % (model.len() + 1);
                    let expected = (at < model.len()).then(|| model.remove(at));
                    prop_assert_eq!(t.remove_at(at), expected);
                }
                SortedOp::Find(v, rel) => {
                    let got = t.find_relative(Some(&v), rel).map(|(e, i)| (*e, i));
                    prop_assert_eq!(got, model_relative(&model, v, rel));
                }
            }
            prop_assert_eq!(t.len(), model.len());
        }

        t.assert_valid();
        for (i, v) in model.iter().enumerate() {
            prop_assert_eq!(t.get(i), Some(v));
        }
        prop_assert_eq!(t.get(model.len()), None);
        prop_assert_eq!(t.iter().copied().collect::<Vec<_>>(), model);
    }

    #[test]
    fn prop_positional_matches_vec(ops in prop::collection::vec(any::<SeqOp>(), 0..=400)) {
        let mut t = Tree234::unsorted();
        let mut model: Vec<u32> = Vec::new();

        for op in ops {
            match op {
                SeqOp::InsertAt(i, v) => {
                    let at = i % (model.len() + 2);
                    if at <= model.len() {
                        prop_assert_eq!(t.insert_at(at, v), Ok(&v));
                        model.insert(at, v);
                    } else {
                        prop_assert_eq!(t.insert_at(at, v), Err(v));
                    }
                }
                SeqOp::RemoveAt(i) => {
                    let at = i % (model.len() + 1);
                    let expected = (at < model.len()).then(|| model.remove(at));
                    prop_assert_eq!(t.remove_at(at), expected);
                }
                SeqOp::Get(i) => {
                    let at = i % (model.len() + 1);
                    prop_assert_eq!(t.get(at), model.get(at));
                }
            }
            prop_assert_eq!(t.len(), model.len());
        }

        t.assert_valid();
        prop_assert_eq!(t.iter().copied().collect::<Vec<_>>(), model);
    }

    #[test]
    fn prop_split_then_join_restores(
        values in prop::collection::vec(any::<u32>(), 0..=300),
        at in any::<prop::sample::Index>(),
    ) {
        let t = positional_from(&values);
        let k = at.index(values.len() + 1);

        let (mut left, mut right) = t.split_at(k);
        left.assert_valid();
        right.assert_valid();
        prop_assert_eq!(left.iter().copied().collect::<Vec<_>>(), &values[..k]);
        prop_assert_eq!(right.iter().copied().collect::<Vec<_>>(), &values[k..]);

        left.join(&mut right).unwrap();
        left.assert_valid();
        prop_assert!(right.is_empty());
        prop_assert_eq!(left.iter().copied().collect::<Vec<_>>(), values);
    }

    #[test]
    fn prop_split_join_on_mixed_shapes(
        ops in prop::collection::vec((any::<bool>(), any::<prop::sample::Index>(), any::<u32>()), 0..=250),
    ) {
        let mut t = Tree234::unsorted();
        let mut model: Vec<u32> = Vec::new();
        for (grow, at, v) in ops {
            if grow || model.is_empty() {
                let at = at.index(model.len() + 1);
                t.insert_at(at, v).unwrap();
                model.insert(at, v);
            } else {
                let at = at.index(model.len());
                prop_assert_eq!(t.remove_at(at), Some(model.remove(at)));
            }
        }
        t.assert_valid();

        for k in 0..=model.len() {
            let (mut left, mut right) = t.clone().split_at(k);
            left.assert_valid();
            right.assert_valid();
            prop_assert_eq!(left.iter().copied().collect::<Vec<_>>(), &model[..k]);
            prop_assert_eq!(right.iter().copied().collect::<Vec<_>>(), &model[k..]);

            if k % 2 == 0 {
                left.join(&mut right).unwrap();
                left.assert_valid();
                prop_assert_eq!(left.iter().copied().collect::<Vec<_>>(), &model[..]);
            } else {
                right.join_reversed(&mut left).unwrap();
                right.assert_valid();
                prop_assert_eq!(right.iter().copied().collect::<Vec<_>>(), &model[..]);
            }
        }
    }

    #[test]
    fn prop_sorted_split_by_partitions(
        values in prop::collection::btree_set(0u16..1000, 0..=200),
        key in 0u16..1000,
        rel in relation().prop_filter("split needs an inequality", |r| *r != Relation::Eq),
    ) {
        let values: Vec<u16> = values.into_iter().collect();
        let mut rest = sorted_from(&values);
        let taken = rest.split_by(&key, rel);
        taken.assert_valid();
        rest.assert_valid();

        let satisfies = |v: u16| match rel {
            Relation::Lt => v < key,
            Relation::Le => v <= key,
            Relation::Gt => v > key,
            Relation::Ge => v >= key,
            Relation::Eq => unreachable!(),
        };
        let expected_taken: Vec<u16> = values.iter().copied().filter(|&v| satisfies(v)).collect();
        let expected_rest: Vec<u16> = values.iter().copied().filter(|&v| !satisfies(v)).collect();
        prop_assert_eq!(taken.iter().copied().collect::<Vec<_>>(), expected_taken);
        prop_assert_eq!(rest.iter().copied().collect::<Vec<_>>(), expected_rest);
    }

    #[test]
    fn prop_sorted_join_checks_order(
        a in prop::collection::btree_set(0u16..500, 0..=100),
        b in prop::collection::btree_set(0u16..500, 0..=100),
    ) {
        let a: Vec<u16> = a.into_iter().collect();
        let b: Vec<u16> = b.into_iter().collect();
        let mut left = sorted_from(&a);
        let mut right = sorted_from(&b);

        let ordered = match (a.last(), b.first()) {
            (Some(x), Some(y)) => x < y,
            _ => true,
        };
        let result = left.join(&mut right);
        left.assert_valid();
        right.assert_valid();
        if ordered {
            prop_assert!(result.is_ok());
            let expected: Vec<u16> = a.iter().chain(b.iter()).copied().collect();
            prop_assert_eq!(left.iter().copied().collect::<Vec<_>>(), expected);
            prop_assert!(right.is_empty());
        } else {
            prop_assert_eq!(result, Err(JoinError::Unordered));
            prop_assert_eq!(left.iter().copied().collect::<Vec<_>>(), a);
            prop_assert_eq!(right.iter().copied().collect::<Vec<_>>(), b);
        }
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = [3u8, 1, 4, 5, 9, 2, 6];
    for_each_permutation(&keys, |perm| {
        let mut t = Tree234::ordered();
        for (i, k) in perm.iter().enumerate() {
            t.insert(*k);
            assert_eq!(t.len(), i + 1);
        }
        t.assert_valid();
        assert_eq!(t.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6, 9]);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys = [10u16, 20, 30, 40, 50, 60, 70];
    let base = sorted_from(&keys);

    for_each_permutation(&keys, |perm| {
        let mut t = base.clone();
        let mut remaining = keys.to_vec();
        for k in perm {
            assert_eq!(t.remove(&k), Some(k));
            remaining.retain(|&r| r != k);
            t.assert_valid();
            assert_eq!(t.iter().copied().collect::<Vec<_>>(), remaining);
        }
        assert!(t.is_empty());
    });
}

#[test]
fn split_join_round_trip_degenerate_sizes() {
    for n in 0..=12u32 {
        let values: Vec<u32> = (0..n).collect();
        for k in 0..=n as usize {
            let mut t = positional_from(&values);
            let mut front = t.split_off_front(k);
            front.assert_valid();
            t.assert_valid();
            t.join_reversed(&mut front).unwrap();
            t.assert_valid();
            assert_eq!(t.iter().copied().collect::<Vec<_>>(), values);
        }
    }
}
