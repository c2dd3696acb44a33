//! Properties of the posting-list algebra.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use trigrep::error::Result;
use trigrep::index::{DocId, Trigram};
use trigrep::query::{intersect, union, PostingSource, Query, SetFolder};

fn sorted_set() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::btree_set(0i32..500, 0..100).prop_map(|s| s.into_iter().collect())
}

#[derive(Debug)]
struct Postings(BTreeMap<Trigram, Vec<DocId>>);

impl PostingSource for Postings {
    fn postings(&self, trigram: Trigram) -> Result<Vec<DocId>> {
        Ok(self.0.get(&trigram).cloned().unwrap_or_default())
    }
}

/// Reference evaluation on ordered sets
fn model(query: &Query, source: &Postings) -> BTreeSet<DocId> {
    match query {
        Query::Contains(t) => source.0.get(t).into_iter().flatten().copied().collect(),
        Query::And(ops) if ops.is_empty() => BTreeSet::new(),
        Query::And(ops) => ops
            .iter()
            .map(|q| model(q, source))
            .reduce(|a, b| a.intersection(&b).copied().collect())
            .unwrap_or_default(),
        Query::Or(ops) => ops.iter().flat_map(|q| model(q, source)).collect(),
    }
}

fn query_tree() -> impl Strategy<Value = Query> {
    let leaf = (0u32..8).prop_map(|v| Query::Contains(Trigram::new(v)));
    leaf.prop_recursive(4, 32, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Query::And),
            prop::collection::vec(inner, 0..5).prop_map(Query::Or),
        ]
    })
}

fn postings() -> impl Strategy<Value = Postings> {
    prop::collection::btree_map(
        (0u32..8).prop_map(Trigram::new),
        prop::collection::btree_set(0i32..64, 0..40).prop_map(|s| s.into_iter().collect::<Vec<_>>()),
        0..8,
    )
    .prop_map(Postings)
}

proptest! {
    #[test]
    fn prop_intersect_matches_set(a in sorted_set(), b in sorted_set()) {
        let sa: BTreeSet<_> = a.iter().copied().collect();
        let sb: BTreeSet<_> = b.iter().copied().collect();
        let expected: Vec<_> = sa.intersection(&sb).copied().collect();
        prop_assert_eq!(intersect(&a, &b), expected);
    }

    #[test]
    fn prop_union_matches_set(a in sorted_set(), b in sorted_set()) {
        let sa: BTreeSet<_> = a.iter().copied().collect();
        let sb: BTreeSet<_> = b.iter().copied().collect();
        let expected: Vec<_> = sa.union(&sb).copied().collect();
        prop_assert_eq!(union(&a, &b), expected);
    }

    #[test]
    fn prop_folder_matches_pairwise(first in sorted_set(), rest in prop::collection::vec((any::<bool>(), sorted_set()), 0..6)) {
        let mut folder = SetFolder::new(first.clone());
        let mut expected = first;
        for (and, other) in &rest {
            if *and {
                folder.intersect(other);
                expected = intersect(&expected, other);
            } else {
                folder.union(other);
                expected = union(&expected, other);
            }
        }
        prop_assert_eq!(folder.finish(), expected);
    }

    #[test]
    fn prop_evaluate_matches_model(query in query_tree(), source in postings()) {
        let result = query.evaluate(&source).unwrap();
        let expected: Vec<DocId> = model(&query, &source).into_iter().collect();
        prop_assert_eq!(result, expected);
    }
}

#[test]
fn test_empty_operands() {
    let source = Postings(BTreeMap::from([(Trigram::new(1), vec![1, 2])]));
    assert!(Query::And(vec![]).evaluate(&source).unwrap().is_empty());
    assert!(Query::Or(vec![]).evaluate(&source).unwrap().is_empty());
    assert_eq!(
        Query::Or(vec![Query::Contains(Trigram::new(1)), Query::And(vec![])])
            .evaluate(&source)
            .unwrap(),
        vec![1, 2]
    );
}
