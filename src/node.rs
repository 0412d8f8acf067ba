use serde::{Deserialize, Serialize};
use std::fmt;

/// A node of a quantile regression tree.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Node {
    pub num: usize,
    /// Leaf output, already scaled by the learning rate. Zero for split nodes.
    pub weight_value: f64,
    pub hessian_sum: f64,
    pub depth: usize,
    pub split_value: f64,
    pub split_feature: usize,
    pub split_gain: f64,
    pub left_child: usize,
    pub right_child: usize,
    pub is_leaf: bool,
}

impl Node {
    /// A new leaf, turned into a split node by [`Node::make_parent`].
    pub fn new_leaf(num: usize, depth: usize, hessian_sum: f64) -> Self {
        Node {
            num,
            weight_value: 0.0,
            hessian_sum,
            depth,
            split_value: 0.0,
            split_feature: 0,
            split_gain: 0.0,
            left_child: 0,
            right_child: 0,
            is_leaf: true,
        }
    }

    pub fn make_parent(&mut self, split_feature: usize, split_value: f64, split_gain: f64, left_child: usize, right_child: usize) {
        self.is_leaf = false;
        self.split_feature = split_feature;
        self.split_value = split_value;
        self.split_gain = split_gain;
        self.left_child = left_child;
        self.right_child = right_child;
    }

    /// Child to descend into for a feature value; missing values go left.
    #[inline]
    pub fn get_child_idx(&self, v: &f64) -> usize {
        if *v > self.split_value {
            self.right_child
        } else {
            self.left_child
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf {
            write!(f, "{}:leaf={},cover={}", self.num, self.weight_value, self.hessian_sum)
        } else {
            write!(
                f,
                "{}:[{} <= {}] yes={},no={},gain={},cover={}",
                self.num,
                self.split_feature,
                self.split_value,
                self.left_child,
                self.right_child,
                self.split_gain,
                self.hessian_sum
            )
        }
    }
}
