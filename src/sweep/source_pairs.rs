//! Candidate source tuple enumeration with a minimum pairwise distance.

use log::debug;

/// Enumerate all `tuple_size`-combinations of `locations` whose members are
/// pairwise at least `min_distance` metres apart, given `spacing` metres per
/// cell. Output order is the combinatorial order of the input; singletons
/// skip the distance check.
pub fn tuples_with_min_distance(
    locations: &[(usize, usize, usize)],
    tuple_size: usize,
    spacing: f64,
    min_distance: f64,
) -> Vec<Vec<(usize, usize, usize)>> {
    if tuple_size == 1 {
        return locations.iter().map(|&position| vec![position]).collect();
    }
    if tuple_size == 0 || tuple_size > locations.len() {
        return Vec::new();
    }

    let relative = min_distance / spacing;
    let threshold = relative * relative;

    let mut accepted = Vec::new();
    let mut considered = 0usize;
    let mut indices: Vec<usize> = (0..tuple_size).collect();
    loop {
        considered += 1;
        let combination: Vec<(usize, usize, usize)> =
            indices.iter().map(|&i| locations[i]).collect();
        if pairwise_distance_ok(&combination, threshold) {
            accepted.push(combination);
        }

        // Advance to the next combination in lexicographic index order.
        let mut slot = tuple_size;
        loop {
            if slot == 0 {
                debug!(
                    "{} locations -> {}/{} tuples",
                    locations.len(),
                    accepted.len(),
                    considered
                );
                return accepted;
            }
            slot -= 1;
            if indices[slot] != slot + locations.len() - tuple_size {
                break;
            }
        }
        indices[slot] += 1;
        for i in slot + 1..tuple_size {
            indices[i] = indices[i - 1] + 1;
        }
    }
}

fn pairwise_distance_ok(combination: &[(usize, usize, usize)], threshold: f64) -> bool {
    for (i, &(w1, h1, d1)) in combination.iter().enumerate() {
        for &(w2, h2, d2) in &combination[i + 1..] {
            let dw = w2 as f64 - w1 as f64;
            let dh = h2 as f64 - h1 as f64;
            let dd = d2 as f64 - d1 as f64;
            if dw * dw + dh * dh + dd * dd < threshold {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_singletons_bypass_distance() {
        let locations = [(0, 0, 0), (1, 0, 0)];
        let tuples = tuples_with_min_distance(&locations, 1, 0.1, 100.0);
        assert_eq!(tuples, vec![vec![(0, 0, 0)], vec![(1, 0, 0)]]);
    }

    #[test]
    fn test_wide_spacing_keeps_all_pairs() {
        let locations = [(0, 0, 0), (10, 0, 0), (0, 10, 0)];
        let tuples = tuples_with_min_distance(&locations, 2, 0.1, 0.5);

        assert_eq!(
            tuples,
            vec![
                vec![(0, 0, 0), (10, 0, 0)],
                vec![(0, 0, 0), (0, 10, 0)],
                vec![(10, 0, 0), (0, 10, 0)],
            ]
        );
    }

    #[test]
    fn test_tight_spacing_rejects_all_pairs() {
        let locations = [(0, 0, 0), (10, 0, 0), (0, 10, 0)];
        let tuples = tuples_with_min_distance(&locations, 2, 0.1, 1.5);
        assert!(tuples.is_empty());
    }

    #[test]
    fn test_exact_distance_is_accepted() {
        // 10 cells at 0.1 m spacing is exactly 1.0 m.
        let locations = [(0, 0, 0), (10, 0, 0)];
        let tuples = tuples_with_min_distance(&locations, 2, 0.1, 1.0);
        assert_eq!(tuples.len(), 1);
    }

    #[test]
    fn test_triples() {
        let locations = [(0, 0, 0), (10, 0, 0), (0, 10, 0), (10, 10, 0)];
        let tuples = tuples_with_min_distance(&locations, 3, 0.1, 0.9);
        // All four 3-combinations survive: the closest members are 10 cells
        // (1.0 m) apart.
        assert_eq!(tuples.len(), 4);
        assert_eq!(tuples[0], vec![(0, 0, 0), (10, 0, 0), (0, 10, 0)]);
    }

    #[test]
    fn test_oversized_tuple_yields_nothing() {
        let locations = [(0, 0, 0), (10, 0, 0)];
        assert!(tuples_with_min_distance(&locations, 3, 0.1, 0.1).is_empty());
    }

    proptest! {
        #[test]
        fn prop_accepted_tuples_satisfy_constraint(
            location_set in proptest::collection::btree_set((0usize..20, 0usize..20, 0usize..20), 1..8),
            tuple_size in 2usize..4,
            min_distance in 0.1f64..2.0,
        ) {
            let locations: Vec<_> = location_set.into_iter().collect();
            let spacing = 0.1;
            let tuples =
                tuples_with_min_distance(&locations, tuple_size, spacing, min_distance);

            for tuple in &tuples {
                prop_assert_eq!(tuple.len(), tuple_size);
                for (i, a) in tuple.iter().enumerate() {
                    for b in &tuple[i + 1..] {
                        let dw = (a.0 as f64 - b.0 as f64) * spacing;
                        let dh = (a.1 as f64 - b.1 as f64) * spacing;
                        let dd = (a.2 as f64 - b.2 as f64) * spacing;
                        let distance = (dw * dw + dh * dh + dd * dd).sqrt();
                        prop_assert!(distance >= min_distance - 1e-9);
                    }
                }
            }

            // No tuple appears twice.
            for i in 0..tuples.len() {
                for j in (i + 1)..tuples.len() {
                    prop_assert_ne!(&tuples[i], &tuples[j]);
                }
            }
        }
    }
}
