pub mod predict;
pub mod tree;

pub use tree::Tree;
