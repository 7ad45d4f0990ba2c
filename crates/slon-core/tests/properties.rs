//! Property tests for matching, interning and entry ids

use proptest::prelude::*;
use slon_core::{pairs_match, symbols_match, Context, Entry, NodeTerm, Slon, SlonConfig, WILDCARD};
use std::collections::BTreeSet;

fn symbol() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => Just(WILDCARD.to_string()),
        4 => "[a-z0-9@ ]{0,6}",
    ]
}

/// Symbols the store accepts: never blank
fn storable() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => Just(WILDCARD.to_string()),
        4 => "[a-z0-9@][a-z0-9@ ]{0,5}",
    ]
}

fn atom() -> impl Strategy<Value = String> {
    "[a-z0-9@]{1,6}"
}

#[derive(Debug, Clone)]
enum Op {
    Insert(String),
    Delete(String),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => atom().prop_map(Op::Insert),
        1 => prop_oneof![atom(), Just(WILDCARD.to_string())].prop_map(Op::Delete),
    ]
}

proptest! {
    #[test]
    fn symbol_matching_is_symmetric(a in symbol(), b in symbol()) {
        prop_assert_eq!(symbols_match(&a, &b), symbols_match(&b, &a));
    }

    #[test]
    fn wildcard_matches_everything(a in symbol()) {
        prop_assert!(symbols_match(&a, WILDCARD));
        prop_assert!(symbols_match(&a, &a));
    }

    #[test]
    fn pair_matching_is_componentwise(
        a in symbol(), b in symbol(), c in symbol(), d in symbol()
    ) {
        prop_assert_eq!(
            pairs_match((a.as_str(), b.as_str()), (c.as_str(), d.as_str())),
            symbols_match(&a, &c) && symbols_match(&b, &d)
        );
    }

    #[test]
    fn interning_returns_the_same_row(texts in prop::collection::vec(storable(), 1..12)) {
        let slon = Slon::open_in_memory().unwrap();
        let first: Vec<_> = texts.iter().map(|t| slon.intern(t).unwrap()).collect();
        let again: Vec<_> = texts.iter().map(|t| slon.intern(t).unwrap()).collect();
        prop_assert_eq!(&first, &again);

        let distinct: std::collections::BTreeSet<&String> = texts.iter().collect();
        prop_assert_eq!(slon.stats().unwrap()["symbols"].as_u64(), Some(distinct.len() as u64));
    }

    #[test]
    fn displayed_nodes_parse_back_to_a_matching_pattern(
        a in atom(), b in atom(), c in atom(), d in atom(), binary in any::<bool>()
    ) {
        let slon = Slon::open_in_memory().unwrap();
        let node = if binary {
            slon.compose_with((a.as_str(), b.as_str()), (c.as_str(), d.as_str())).unwrap()
        } else {
            slon.compose((a.as_str(), b.as_str())).unwrap()
        };

        let term: NodeTerm = node.to_string().parse().unwrap();
        let pattern = slon.pattern(&term).unwrap();
        prop_assert!(pattern.matches(&node));
        prop_assert_eq!(slon.node(term).unwrap(), node);
    }

    #[test]
    fn delete_removes_exactly_what_find_returns(
        texts in prop::collection::vec(atom(), 1..16),
        target in prop_oneof![atom(), Just(WILDCARD.to_string())],
    ) {
        let slon = Slon::open_in_memory().unwrap();
        slon.insert_all(texts.iter().map(|t| ("n", t.as_str())), ()).unwrap();

        let found = slon.find(("n", target.as_str()), ()).unwrap();
        let removed = slon.delete(("n", target.as_str()), ()).unwrap();
        prop_assert_eq!(&found, &removed);

        let left = slon.entries().count();
        prop_assert_eq!(left + removed.len(), texts.len());
        prop_assert!(slon.find(("n", target.as_str()), ()).unwrap().is_empty());
    }

    #[test]
    fn delete_leaves_other_entries_and_links_untouched(
        parents in prop::collection::vec(atom(), 1..5),
        children in prop::collection::vec(
            (atom(), prop::collection::btree_set(0usize..5, 1..3)),
            1..12,
        ),
        scope in prop::collection::btree_set(0usize..5, 1..3),
        target in prop_oneof![atom(), Just(WILDCARD.to_string())],
    ) {
        let slon = Slon::open_in_memory().unwrap();
        let parent_ids: Vec<_> = parents
            .iter()
            .map(|p| slon.insert(("p", p.as_str()), ()).unwrap()[0].id())
            .collect();
        let pick = |picked: &BTreeSet<usize>| {
            picked
                .iter()
                .map(|i| parent_ids[i % parent_ids.len()])
                .collect::<Context>()
        };

        for (name, under) in &children {
            slon.insert(("c", name.as_str()), pick(under)).unwrap();
        }

        let before: Vec<Entry> = slon.entries().collect::<slon_core::Result<_>>().unwrap();
        let scope = pick(&scope);

        let found = slon.find(("c", target.as_str()), scope.clone()).unwrap();
        let removed = slon.delete(("c", target.as_str()), scope).unwrap();
        prop_assert_eq!(&found, &removed);

        let removed_ids: BTreeSet<_> = removed.iter().map(Entry::id).collect();
        let expected: Vec<Entry> = before
            .into_iter()
            .filter(|e| !removed_ids.contains(&e.id()))
            .collect();
        let after: Vec<Entry> = slon.entries().collect::<slon_core::Result<_>>().unwrap();
        prop_assert_eq!(&after, &expected);

        let links: usize = after.iter().map(|e| e.context().len()).sum();
        prop_assert_eq!(slon.stats().unwrap()["context_links"].as_u64(), Some(links as u64));
    }

    #[test]
    fn entry_ids_strictly_increase(ops in prop::collection::vec(op(), 1..24)) {
        let slon = Slon::open(SlonConfig::new().with_page_size(3)).unwrap();
        let mut last = 0;

        for op in ops {
            match op {
                Op::Insert(text) => {
                    let entry = slon.insert(("n", text.as_str()), ()).unwrap().remove(0);
                    prop_assert!(entry.id().get() > last);
                    last = entry.id().get();
                }
                Op::Delete(text) => {
                    slon.delete(("n", text.as_str()), ()).unwrap();
                }
            }

            let ids: Vec<i64> = slon
                .entries()
                .map(|e| e.map(|e| e.id().get()))
                .collect::<slon_core::Result<_>>()
                .unwrap();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
