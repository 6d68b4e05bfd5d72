mod conv2d;
mod line_buffer;

pub use conv2d::*;
