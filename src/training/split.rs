//! Seeded train/test splitting

use crate::error::{PrazoError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Shuffle `0..n_samples` with a seeded RNG and split off a test fraction.
///
/// Returns `(train_indices, test_indices)`. Failing to produce a non-empty
/// side is a configuration error: a model evaluated on nothing (or trained
/// on nothing) must not be produced.
pub fn train_test_split(
    n_samples: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(PrazoError::ValidationError(format!(
            "test_fraction must be in [0, 1), got {test_fraction}"
        )));
    }

    let n_test = ((n_samples as f64) * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(PrazoError::ValidationError(format!(
            "cannot split {n_samples} samples into train/test with test_fraction {test_fraction}"
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_indices = indices.split_off(n_samples - n_test);
    Ok((indices, test_indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_split_sizes_and_disjointness() {
        let (train, test) = train_test_split(100, 0.2, 42).unwrap();

        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);

        let train_set: HashSet<usize> = train.iter().copied().collect();
        let test_set: HashSet<usize> = test.iter().copied().collect();
        assert!(train_set.is_disjoint(&test_set));
        assert_eq!(train_set.len() + test_set.len(), 100);
    }

    #[test]
    fn test_split_is_reproducible() {
        let a = train_test_split(50, 0.2, 42).unwrap();
        let b = train_test_split(50, 0.2, 42).unwrap();
        assert_eq!(a, b);

        let c = train_test_split(50, 0.2, 43).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_too_few_samples_is_fatal() {
        assert!(train_test_split(1, 0.2, 42).is_err());
        assert!(train_test_split(0, 0.2, 42).is_err());
    }

    #[test]
    fn test_bad_fraction_is_fatal() {
        assert!(train_test_split(100, 1.0, 42).is_err());
        assert!(train_test_split(100, -0.1, 42).is_err());
    }
}
