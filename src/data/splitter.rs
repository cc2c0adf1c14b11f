// ============================================================
// Layer 4 — Train/Test Splitter
// ============================================================
// Seeded shuffling and splitting of row indices:
//
//   train_test_split — one shuffled holdout split
//   k_fold           — K contiguous folds over a shuffled order,
//                      used by the grid search for CV scores
//
// Splits work on indices rather than rows so the caller can apply
// the same split to features and targets.
//
// Both use a seeded StdRng so a run is reproducible: the same
// table and seed always give the same split.
//
// Reference: rand crate documentation (SeedableRng, SliceRandom)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `0..n` with `seed` and split off `test_fraction` of it.
///
/// The test side gets `ceil(n * test_fraction)` indices, as
/// scikit-learn does, but always leaves at least one training row
/// when `n > 0`.
///
/// # Returns
/// A tuple (train_indices, test_indices)
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);

    let n_test = ((n as f64) * test_fraction.clamp(0.0, 1.0)).ceil() as usize;
    let n_test = n_test.min(n.saturating_sub(1));

    // split_off(n) removes elements [n..] from the Vec and returns them
    let test = idx.split_off(n - n_test);

    tracing::debug!(
        "Dataset split: {} training, {} test ({}% / {}%)",
        idx.len(),
        test.len(),
        (idx.len()  * 100) / n.max(1),
        (test.len() * 100) / n.max(1),
    );

    (idx, test)
}

/// One CV fold: positions into the caller's index list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train:      Vec<usize>,
    pub validation: Vec<usize>,
}

/// Shuffle `0..n` and cut it into `k` folds whose sizes differ by at
/// most one. Each position appears in exactly one validation set.
pub fn k_fold(n: usize, k: usize, seed: u64) -> Vec<Fold> {
    let k = k.clamp(1, n.max(1));
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let base  = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for f in 0..k {
        let size = base + usize::from(f < extra);
        let validation = order[start..start + size].to_vec();
        let train = order[..start]
            .iter()
            .chain(order[start + size..].iter())
            .copied()
            .collect();
        folds.push(Fold { train, validation });
        start += size;
    }
    folds
}
