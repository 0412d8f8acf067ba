use super::tree::Tree;
use crate::Matrix;

impl Tree {
    /// Leaf output for one row of a feature matrix.
    pub fn predict_row(&self, data: &Matrix<f64>, row: usize) -> f64 {
        let mut node_idx = 0;
        loop {
            let node = match self.nodes.get(node_idx) {
                Some(n) => n,
                None => return 0.0,
            };
            if node.is_leaf {
                return node.weight_value;
            }
            node_idx = node.get_child_idx(data.get(row, node.split_feature));
        }
    }

    pub fn predict(&self, data: &Matrix<f64>) -> Vec<f64> {
        (0..data.rows).map(|i| self.predict_row(data, i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::node::Node;
    use crate::tree::Tree;
    use crate::Matrix;

    #[test]
    fn test_predict_follows_splits() {
        let mut root = Node::new_leaf(0, 0, 3.);
        root.make_parent(1, 2.0, 1.0, 1, 2);
        let mut left = Node::new_leaf(1, 1, 2.);
        left.weight_value = -1.;
        let mut right = Node::new_leaf(2, 1, 1.);
        right.weight_value = 4.;
        let tree = Tree {
            nodes: vec![root, left, right],
            depth: 1,
            n_leaves: 2,
        };
        let data = vec![0., 0., 0., 0., 1., 2., 3., f64::NAN];
        let m = Matrix::new(&data, 4, 2);
        assert_eq!(tree.predict(&m), vec![-1., -1., 4., -1.]);
    }
}
