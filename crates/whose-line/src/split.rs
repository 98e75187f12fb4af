//! Seeded train/test split over document ids.

use ahash::HashSet;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;
use whose_line_pre_processing::corpus::DocumentId;

/// Disjoint train/test id sets. Membership is by key, so stages downstream
/// never depend on the order documents arrived in.
#[derive(Clone, Debug)]
pub struct TrainTestSplit {
    pub train_ids: HashSet<DocumentId>,
    pub test_ids: HashSet<DocumentId>,
}

/// Shuffle the ids with a seeded generator and split at `train_fraction`.
/// Identical inputs and seed give an identical split.
pub fn split_documents(ids: &[DocumentId], train_fraction: f64, seed: u64) -> TrainTestSplit {
    let mut shuffled = ids.to_vec();
    shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

    let total = shuffled.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;
    let split_at = split_at.min(total);

    let test = shuffled.split_off(split_at);
    debug!(
        train = split_at,
        test = test.len(),
        "Documents split into train and test"
    );
    TrainTestSplit {
        train_ids: shuffled.into_iter().collect(),
        test_ids: test.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u32) -> Vec<DocumentId> {
        (0..n).map(DocumentId).collect()
    }

    #[test]
    fn split_sizes_follow_the_fraction() {
        let split = split_documents(&ids(100), 0.75, 42);
        assert_eq!(split.train_ids.len(), 75);
        assert_eq!(split.test_ids.len(), 25);
    }

    #[test]
    fn no_id_is_lost_or_duplicated() {
        let all = ids(53);
        let split = split_documents(&all, 0.7, 3);
        assert_eq!(split.train_ids.len() + split.test_ids.len(), 53);
        for id in &all {
            assert_ne!(
                split.train_ids.contains(id),
                split.test_ids.contains(id),
                "{id} must be in exactly one side"
            );
        }
    }

    #[test]
    fn same_seed_same_split() {
        let all = ids(40);
        let first = split_documents(&all, 0.5, 11);
        let second = split_documents(&all, 0.5, 11);
        assert_eq!(first.train_ids, second.train_ids);
    }

    #[test]
    fn different_seed_usually_differs() {
        let all = ids(40);
        let first = split_documents(&all, 0.5, 11);
        let second = split_documents(&all, 0.5, 12);
        assert_ne!(first.train_ids, second.train_ids);
    }

    #[test]
    fn full_fraction_sends_everything_to_training() {
        let split = split_documents(&ids(10), 1.0, 0);
        assert_eq!(split.train_ids.len(), 10);
        assert!(split.test_ids.is_empty());
    }

    #[test]
    fn empty_input_splits_empty() {
        let split = split_documents(&[], 0.8, 0);
        assert!(split.train_ids.is_empty());
        assert!(split.test_ids.is_empty());
    }
}
