//! Sampler
//!
//! Stratified partitioning of records on a discretized continuous target, for the
//! cross-validation folds of the search and for the random train/test split. All
//! randomness comes from a seeded `StdRng`, so partitions are reproducible.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Discretize a continuous target into quantile bins.
///
/// Cut points are the `i / n_bins` quantiles of `y`; repeated cut points are collapsed, so
/// heavily tied targets yield fewer bins. Bins are right closed, the first one also
/// contains the minimum.
///
/// * `y` - Target values.
/// * `n_bins` - Requested number of bins.
pub fn stratification_bins(y: &[f64], n_bins: usize) -> Vec<usize> {
    let mut sorted: Vec<f64> = y.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n_bins = n_bins.max(1);
    let mut edges: Vec<f64> = (0..=n_bins)
        .map(|i| {
            let pos = (i as f64 / n_bins as f64) * (sorted.len().saturating_sub(1)) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            match sorted.get(lo) {
                Some(v) => v + (sorted[hi] - v) * (pos - lo as f64),
                None => 0.0,
            }
        })
        .collect();
    edges.dedup();
    if edges.len() < 2 {
        return vec![0; y.len()];
    }
    let n_out = edges.len() - 1;
    let inner = &edges[1..];
    y.iter()
        .map(|v| inner.partition_point(|e| e < v).min(n_out - 1))
        .collect()
}

/// Group record indices by stratum, in increasing stratum order.
fn group_by_stratum(strata: &[usize]) -> Vec<Vec<usize>> {
    let n_strata = strata.iter().max().map_or(0, |m| m + 1);
    let mut groups = vec![Vec::new(); n_strata];
    for (i, s) in strata.iter().enumerate() {
        groups[*s].push(i);
    }
    groups
}

/// Stratified k-fold assignment.
pub struct StratifiedKFold {
    n_folds: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_folds: usize, seed: u64) -> Self {
        StratifiedKFold { n_folds, seed }
    }

    /// Split the records into `(train, validation)` index pairs, one per fold.
    ///
    /// Members of each stratum are shuffled and dealt round robin over the folds, the deal
    /// continuing from one stratum to the next so the folds stay balanced in size.
    pub fn split(&self, strata: &[usize]) -> Vec<(Vec<usize>, Vec<usize>)> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut fold_of = vec![0; strata.len()];
        let mut offset = 0;
        for mut members in group_by_stratum(strata) {
            members.shuffle(&mut rng);
            for (pos, i) in members.iter().enumerate() {
                fold_of[*i] = (offset + pos) % self.n_folds;
            }
            offset += members.len();
        }
        (0..self.n_folds)
            .map(|k| {
                let (valid, train): (Vec<usize>, Vec<usize>) = (0..strata.len()).partition(|i| fold_of[*i] == k);
                (train, valid)
            })
            .collect()
    }
}

/// Stratified random train/test split.
pub struct StratifiedSplit {
    test_fraction: f64,
    seed: u64,
}

impl StratifiedSplit {
    pub fn new(test_fraction: f64, seed: u64) -> Self {
        StratifiedSplit { test_fraction, seed }
    }

    /// Split the records into sorted `(train, test)` indices.
    ///
    /// The test set holds `ceil(n * test_fraction)` records, allocated to strata in
    /// proportion to their size; leftover slots go to the largest remainders, ties to the
    /// lower stratum.
    pub fn split(&self, strata: &[usize]) -> (Vec<usize>, Vec<usize>) {
        let n = strata.len();
        let n_test = ((n as f64 * self.test_fraction).ceil() as usize).min(n);
        let groups = group_by_stratum(strata);

        let shares: Vec<f64> = groups.iter().map(|g| g.len() as f64 * n_test as f64 / n as f64).collect();
        let mut alloc: Vec<usize> = shares.iter().map(|s| s.floor() as usize).collect();
        let mut leftover = n_test - alloc.iter().sum::<usize>();
        let mut by_remainder: Vec<usize> = (0..groups.len()).collect();
        by_remainder.sort_by(|a, b| (shares[*b] - shares[*b].floor()).total_cmp(&(shares[*a] - shares[*a].floor())));
        for g in by_remainder {
            if leftover == 0 {
                break;
            }
            if alloc[g] < groups[g].len() {
                alloc[g] += 1;
                leftover -= 1;
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut train = Vec::with_capacity(n - n_test);
        let mut test = Vec::with_capacity(n_test);
        for (mut members, take) in groups.into_iter().zip(alloc) {
            members.shuffle(&mut rng);
            test.extend_from_slice(&members[..take]);
            train.extend_from_slice(&members[take..]);
        }
        train.sort_unstable();
        test.sort_unstable();
        (train, test)
    }
}
