use crate::binning::BinnedData;

/// Gradient statistics of the rows falling in one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bin {
    pub g_folded: f64,
    pub h_folded: f64,
    pub counts: usize,
}

/// Per-feature bucket statistics of the rows in a node.
#[derive(Debug)]
pub struct NodeHistogram {
    pub data: Vec<Vec<Bin>>,
}

impl NodeHistogram {
    /// Accumulate the histogram of the rows in `index`.
    ///
    /// * `data` - Binned features.
    /// * `index` - Rows of the node.
    /// * `grad` - Gradient of every training row.
    /// * `hess` - Hessian of every training row.
    pub fn from_index(data: &BinnedData, index: &[usize], grad: &[f64], hess: &[f64]) -> Self {
        let hist = (0..data.cuts.len())
            .map(|j| {
                let mut bins = vec![Bin::default(); data.n_bins(j)];
                for i in index {
                    let b = &mut bins[data.get(*i, j) as usize];
                    b.g_folded += grad[*i];
                    b.h_folded += hess[*i];
                    b.counts += 1;
                }
                bins
            })
            .collect();
        NodeHistogram { data: hist }
    }
}
