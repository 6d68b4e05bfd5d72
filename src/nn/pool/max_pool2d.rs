use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::element::Fixed;
use crate::stream::{StreamError, StreamReader, StreamWriter};

/// Configuration to create a [streaming 2D max pooling](MaxPool2d) layer.
///
/// The stride equals the kernel size: tiles never overlap.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaxPool2dConfig {
    /// Height and width of the input feature map.
    pub input_size: [usize; 2],
    /// The size of the pooling tile.
    pub kernel_size: [usize; 2],
}

impl MaxPool2dConfig {
    /// Create the configuration with the default 2x2 tile.
    pub fn new(input_size: [usize; 2]) -> Self {
        Self {
            input_size,
            kernel_size: [2, 2],
        }
    }

    /// The size of the pooling tile.
    pub fn with_kernel_size(mut self, kernel_size: [usize; 2]) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    /// Initialize a [MaxPool2d] module.
    ///
    /// # Panics
    ///
    /// Panics when the input does not divide evenly into tiles.
    pub fn init(&self) -> MaxPool2d {
        let [height, width] = self.input_size;
        let [ph, pw] = self.kernel_size;

        assert!(
            ph >= 1 && pw >= 1 && height % ph == 0 && width % pw == 0,
            "input {:?} does not tile evenly into {:?} blocks",
            self.input_size,
            self.kernel_size,
        );

        MaxPool2d {
            input_size: self.input_size,
            kernel_size: self.kernel_size,
        }
    }
}

impl Config for MaxPool2dConfig {}

/// Applies a non-overlapping 2D max pooling over a row-major stream of
/// samples.
///
/// Should be created with [MaxPool2dConfig].
#[derive(Clone, Debug)]
pub struct MaxPool2d {
    input_size: [usize; 2],
    kernel_size: [usize; 2],
}

impl MaxPool2d {
    /// Output feature-map size, `input / kernel` per axis.
    pub fn output_size(&self) -> [usize; 2] {
        let [height, width] = self.input_size;
        let [ph, pw] = self.kernel_size;
        [height / ph, width / pw]
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

    /// Consumes one input feature map from `input` and writes the maximum of
    /// each tile to `output`, in row-major tile order.
    ///
    /// A tile spans `ph` consecutive input rows, so the rows of one tile band
    /// are buffered before the band's maxima are emitted. Errors only when a
    /// stream peer is dropped before the pass completes.
    pub fn process(
        &self,
        input: &StreamReader<Fixed>,
        output: &StreamWriter<Fixed>,
    ) -> Result<(), StreamError> {
        let [_, width] = self.input_size;
        let [ph, pw] = self.kernel_size;
        let [oh, ow] = self.output_size();

        for _ in 0..oh {
            let mut band = Vec::with_capacity(ph);
            for _ in 0..ph {
                let row: Result<Vec<_>, _> = (0..width).map(|_| input.read()).collect();
                band.push(row?);
            }

            for tile in 0..ow {
                // Seeded below every representable sample.
                let mut best = Fixed::MIN;
                for row in &band {
                    for &sample in &row[tile * pw..(tile + 1) * pw] {
                        if sample > best {
                            best = sample;
                        }
                    }
                }
                output.write(best)?;
            }
        }

        Ok(())
    }
}
