use crate::binning::BinnedData;
use crate::histogram::NodeHistogram;
use crate::node::Node;
use crate::splitter::Splitter;
use crate::utils::weighted_quantile;
use serde::{Deserialize, Serialize};
use std::cmp::max;
use std::fmt::{self, Display};

/// Targets of the leaf renewal step.
pub struct LeafRenewal<'a> {
    /// Current residuals `y - yhat` of every training row.
    pub residual: &'a [f64],
    pub sample_weight: &'a [f64],
    pub quantile: f64,
    pub learning_rate: f64,
}

impl LeafRenewal<'_> {
    /// Weighted quantile of the residuals in a leaf, shrunk by the learning rate.
    fn leaf_value(&self, index: &[usize]) -> f64 {
        let r: Vec<f64> = index.iter().map(|i| self.residual[*i]).collect();
        let w: Vec<f64> = index.iter().map(|i| self.sample_weight[*i]).collect();
        self.learning_rate * weighted_quantile(&r, &w, self.quantile)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Tree {
    pub nodes: Vec<Node>,
    pub depth: usize,
    pub n_leaves: usize,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    /// Grow the tree depth first on the binned training rows.
    ///
    /// Splits maximize the second order gain of the gradients; leaf outputs are then
    /// renewed to the quantile of the residuals they hold, and added to `yhat` for the
    /// rows of each leaf.
    ///
    /// * `data` - Binned training features.
    /// * `index` - Training rows to grow on.
    /// * `grad` - Gradient of every row.
    /// * `hess` - Hessian of every row.
    /// * `splitter` - Split finder.
    /// * `max_depth` - Maximum depth of a leaf.
    /// * `renewal` - Leaf renewal targets.
    /// * `yhat` - Current predictions, updated in place.
    #[allow(clippy::too_many_arguments)]
    pub fn fit(
        &mut self,
        data: &BinnedData,
        index: Vec<usize>,
        grad: &[f64],
        hess: &[f64],
        splitter: &Splitter,
        max_depth: usize,
        renewal: &LeafRenewal,
        yhat: &mut [f64],
    ) {
        self.nodes.clear();
        self.depth = 0;
        self.n_leaves = 0;

        let root_hess: f64 = index.iter().map(|i| hess[*i]).sum();
        self.nodes.push(Node::new_leaf(0, 0, root_hess));
        let mut growable = vec![(0_usize, index)];

        while let Some((num, index)) = growable.pop() {
            let depth = self.nodes[num].depth;
            let split = if depth < max_depth {
                let hist = NodeHistogram::from_index(data, &index, grad, hess);
                splitter.best_split(&hist, &data.cuts)
            } else {
                None
            };

            match split {
                Some(info) => {
                    let (left_index, right_index): (Vec<usize>, Vec<usize>) = index
                        .into_iter()
                        .partition(|i| data.get(*i, info.split_feature) <= info.split_bin);
                    let left = self.nodes.len();
                    let right = left + 1;
                    let left_hess = left_index.iter().map(|i| hess[*i]).sum();
                    let right_hess = right_index.iter().map(|i| hess[*i]).sum();
                    self.nodes.push(Node::new_leaf(left, depth + 1, left_hess));
                    self.nodes.push(Node::new_leaf(right, depth + 1, right_hess));
                    self.nodes[num].make_parent(info.split_feature, info.split_value, info.split_gain, left, right);
                    self.depth = max(self.depth, depth + 1);
                    growable.push((right, right_index));
                    growable.push((left, left_index));
                }
                None => {
                    let value = renewal.leaf_value(&index);
                    for i in &index {
                        yhat[*i] += value;
                    }
                    self.nodes[num].weight_value = value;
                    self.n_leaves += 1;
                }
            }
        }
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut print_buffer: Vec<usize> = vec![0];
        let mut r = String::new();
        while let Some(idx) = print_buffer.pop() {
            let node = match self.nodes.get(idx) {
                Some(n) => n,
                None => continue,
            };
            r += format!("{}{}\n", "      ".repeat(node.depth).as_str(), node).as_str();
            if !node.is_leaf {
                print_buffer.push(node.right_child);
                print_buffer.push(node.left_child);
            }
        }
        write!(f, "{}", r)
    }
}
