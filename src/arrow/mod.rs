mod builder;

pub use builder::{BatchError, TupleBatchBuilder};
