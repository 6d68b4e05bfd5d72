use crate::element::Fixed;

/// Applies the rectified linear unit function element-wise:
///
/// `y = max(0, x)`
#[derive(Clone, Copy, Debug, Default)]
pub struct Relu;

impl Relu {
    /// Create the module.
    pub fn new() -> Self {
        Self
    }

    /// Applies the forward pass on one sample.
    pub fn forward(&self, input: Fixed) -> Fixed {
        input.max(Fixed::ZERO)
    }
}
