mod max_pool2d;

pub use max_pool2d::*;
