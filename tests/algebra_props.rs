// tests/algebra_props.rs

//! Property tests for the interval algebra.

use proptest::prelude::*;
use trigflow::segments::{Segment, SegmentList};

fn seglist_strategy() -> impl Strategy<Value = SegmentList> {
    proptest::collection::vec((0u64..500, 0u64..50), 0..20).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(start, len)| Segment::new(start, start + len))
            .collect()
    })
}

proptest! {
    #[test]
    fn lists_are_sorted_disjoint_and_non_empty(list in seglist_strategy()) {
        let segs: Vec<Segment> = list.iter().copied().collect();
        for seg in &segs {
            prop_assert!(seg.start < seg.end);
        }
        // Coalescing also merges touching neighbours, so gaps are strict.
        for pair in segs.windows(2) {
            prop_assert!(pair[0].end < pair[1].start);
        }
    }

    #[test]
    fn intersection_is_contained_in_both(a in seglist_strategy(), b in seglist_strategy()) {
        let i = a.intersect(&b);
        prop_assert!(i.subtract(&a).is_empty());
        prop_assert!(i.subtract(&b).is_empty());
    }

    #[test]
    fn subtraction_is_disjoint_from_subtrahend(a in seglist_strategy(), b in seglist_strategy()) {
        let d = a.subtract(&b);
        prop_assert!(d.intersect(&b).is_empty());
        prop_assert!(d.subtract(&a).is_empty());
    }

    #[test]
    fn union_covers_both_operands(a in seglist_strategy(), b in seglist_strategy()) {
        let u = a.union(&b);
        prop_assert!(a.subtract(&u).is_empty());
        prop_assert!(b.subtract(&u).is_empty());
        prop_assert_eq!(u.total_duration(),
            a.total_duration() + b.subtract(&a).total_duration());
    }

    #[test]
    fn contraction_never_grows(list in seglist_strategy(), pad in 0u64..30) {
        let c = list.contract(pad);
        prop_assert!(c.subtract(&list).is_empty());
        for seg in c.iter() {
            prop_assert!(seg.duration() <= list.extent().map(|e| e.duration()).unwrap_or(0));
        }
    }
}
