pub mod common;
pub mod fix;
pub mod tree;

pub use fix::{fix, FixStatus};
pub use tree::show_tree;
