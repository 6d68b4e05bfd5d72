use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::element::Fixed;
use crate::nn::Relu;
use crate::stream::{StreamError, StreamReader, StreamWriter};

use super::line_buffer::LineBuffer;

/// Configuration to create a [streaming 2D convolution](Conv2d) layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conv2dConfig {
    /// Height and width of the input feature map.
    pub input_size: [usize; 2],
    /// The size of the kernel.
    pub kernel_size: [usize; 2],
}

impl Conv2dConfig {
    /// Create the configuration with the default 5x5 kernel.
    pub fn new(input_size: [usize; 2]) -> Self {
        Self {
            input_size,
            kernel_size: [5, 5],
        }
    }

    /// The size of the kernel.
    pub fn with_kernel_size(mut self, kernel_size: [usize; 2]) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    /// Initialize a [Conv2d] with the given row-major `kh * kw` kernel weights.
    ///
    /// The weights are fixed for the lifetime of the module.
    ///
    /// # Panics
    ///
    /// Panics when the kernel does not fit the input or `weight` has the
    /// wrong length.
    pub fn init(&self, weight: Vec<Fixed>) -> Conv2d {
        let [height, width] = self.input_size;
        let [kh, kw] = self.kernel_size;

        assert!(
            kh >= 1 && kw >= 1 && kh <= height && kw <= width,
            "kernel size {:?} does not fit input {:?}",
            self.kernel_size,
            self.input_size,
        );
        assert_eq!(
            weight.len(),
            kh * kw,
            "expected {} kernel weights, got {}",
            kh * kw,
            weight.len(),
        );

        Conv2d {
            weight,
            input_size: self.input_size,
            kernel_size: self.kernel_size,
            activation: Relu::new(),
        }
    }
}

impl Config for Conv2dConfig {}

/// Applies a valid (no padding, stride 1) 2D convolution with ReLU over a
/// row-major stream of samples.
///
/// The layer keeps a line buffer of the last `kh - 1` input rows so each
/// input sample is read from the stream exactly once. Multiply-accumulate
/// uses wrapping Q8.8 arithmetic in a fixed row-major order, making wrapped
/// sums reproducible across runs.
#[derive(Clone, Debug)]
pub struct Conv2d {
    weight: Vec<Fixed>,
    input_size: [usize; 2],
    kernel_size: [usize; 2],
    activation: Relu,
}

impl Conv2d {
    /// Output feature-map size, `input - kernel + 1` per axis.
    pub fn output_size(&self) -> [usize; 2] {
        let [height, width] = self.input_size;
        let [kh, kw] = self.kernel_size;
        [height - kh + 1, width - kw + 1]
    }

    /// Samples consumed from the input stream per pass.
    pub fn input_len(&self) -> usize {
        self.input_size[0] * self.input_size[1]
    }

    /// Samples written to the output stream per pass.
    pub fn output_len(&self) -> usize {
        let [oh, ow] = self.output_size();
        oh * ow
    }

    /// Consumes one input feature map from `input` and writes the convolved,
    /// activated feature map to `output`, row-major.
    ///
    /// Exactly [input_len](Self::input_len) samples are read and
    /// [output_len](Self::output_len) written. The line buffer is rebuilt
    /// from scratch on every call, so passes are independent. Errors only
    /// when a stream peer is dropped before the pass completes.
    pub fn process(
        &self,
        input: &StreamReader<Fixed>,
        output: &StreamWriter<Fixed>,
    ) -> Result<(), StreamError> {
        let [_, width] = self.input_size;
        let [kh, kw] = self.kernel_size;
        let [oh, ow] = self.output_size();

        let mut lines = LineBuffer::new(kh - 1, width);
        for _ in 0..kh - 1 {
            lines.shift(self.read_row(input, width)?);
        }

        for _ in 0..oh {
            let mut incoming = Vec::with_capacity(width);
            for j in 0..ow {
                // One fresh sample per output column; the first column of a
                // row pulls in the full kw-wide window tail.
                while incoming.len() < j + kw {
                    incoming.push(input.read()?);
                }

                let sum = self.accumulate(&lines, &incoming, j);
                output.write(self.activation.forward(sum))?;
            }
            while incoming.len() < width {
                incoming.push(input.read()?);
            }
            lines.shift(incoming);
        }

        Ok(())
    }

    /// Multiply-accumulate over the window anchored at column `j`.
    fn accumulate(&self, lines: &LineBuffer, incoming: &[Fixed], j: usize) -> Fixed {
        let [kh, kw] = self.kernel_size;

        let mut sum = Fixed::ZERO;
        for ki in 0..kh {
            let window_row = if ki + 1 < kh {
                &lines.row(ki)[j..j + kw]
            } else {
                &incoming[j..j + kw]
            };
            for (kj, &sample) in window_row.iter().enumerate() {
                sum = sum + sample * self.weight[ki * kw + kj];
            }
        }
        sum
    }

    fn read_row(
        &self,
        input: &StreamReader<Fixed>,
        width: usize,
    ) -> Result<Vec<Fixed>, StreamError> {
        (0..width).map(|_| input.read()).collect()
    }
}
