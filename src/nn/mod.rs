/// Convolution layers.
pub mod conv;

/// Pooling layers.
pub mod pool;

mod relu;
pub use relu::*;
