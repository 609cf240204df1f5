use rand::Rng;

use crate::block::Combinator;

/// Number of distinct candidates a combinator yields over children with
/// `counts` candidates each.
pub(crate) fn natural_count(combinator: Combinator, counts: &[usize]) -> usize {
    match combinator {
        Combinator::Product => counts
            .iter()
            .fold(1usize, |product, &count| product.saturating_mul(count.max(1))),
        Combinator::Diagonal | Combinator::Random => counts.iter().copied().max().unwrap_or(1).max(1),
    }
}

/// Per-child candidate indices for draw `index`.
pub(crate) fn select<R: Rng + ?Sized>(
    combinator: Combinator,
    counts: &[usize],
    index: usize,
    rng: &mut R,
) -> Vec<usize> {
    match combinator {
        Combinator::Product => {
            let mut rest = index % natural_count(combinator, counts);
            let mut indices = vec![0; counts.len()];
            for (slot, &count) in indices.iter_mut().zip(counts).rev() {
                let count = count.max(1);
                *slot = rest % count;
                rest /= count;
            }
            indices
        }
        Combinator::Diagonal => counts.iter().map(|&count| index % count.max(1)).collect(),
        Combinator::Random => counts
            .iter()
            .map(|&count| rng.gen_range(0..count.max(1)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{natural_count, select};
    use crate::block::Combinator;

    #[test]
    fn product_varies_the_last_child_fastest() {
        let mut rng = StdRng::seed_from_u64(0);
        let counts = [2, 3];
        let all: Vec<_> = (0..6)
            .map(|i| select(Combinator::Product, &counts, i, &mut rng))
            .collect();
        assert_eq!(
            all,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2]
            ]
        );
        assert_eq!(select(Combinator::Product, &counts, 6, &mut rng), vec![0, 0]);
    }

    #[test]
    fn diagonal_cycles_shorter_children() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(natural_count(Combinator::Diagonal, &[2, 3]), 3);
        assert_eq!(select(Combinator::Diagonal, &[2, 3], 2, &mut rng), vec![0, 2]);
    }

    proptest! {
        #[test]
        fn product_enumerates_each_tuple_once(counts in prop::collection::vec(1usize..4, 1..4)) {
            let mut rng = StdRng::seed_from_u64(0);
            let total = natural_count(Combinator::Product, &counts);
            let mut seen: Vec<Vec<usize>> = (0..total)
                .map(|i| select(Combinator::Product, &counts, i, &mut rng))
                .collect();
            seen.sort();
            seen.dedup();
            prop_assert_eq!(seen.len(), total);
        }

        #[test]
        fn random_indices_stay_in_bounds(counts in prop::collection::vec(1usize..6, 1..5), seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = select(Combinator::Random, &counts, 0, &mut rng);
            for (index, count) in picked.iter().zip(&counts) {
                prop_assert!(index < count);
            }
        }
    }
}
