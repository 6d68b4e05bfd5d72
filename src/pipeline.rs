use std::thread;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::element::Fixed;
use crate::nn::conv::{Conv2d, Conv2dConfig};
use crate::nn::pool::{MaxPool2d, MaxPool2dConfig};
use crate::stream::{self, StreamError, StreamReader, StreamWriter};

/// Default bound on in-flight samples per connecting stream.
const MAX_QUEUED_SAMPLES: usize = 64;

/// Error surfaced by [Pipeline] orchestration.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A stage stopped consuming or producing before the frame geometry was
    /// satisfied.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// A stage worker thread panicked.
    #[error("stage worker panicked")]
    Worker,
}

/// Configuration to create a [Pipeline].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The convolution stage configuration.
    pub conv: Conv2dConfig,
    /// The pooling tile size applied to the convolution output.
    pub pool_size: [usize; 2],
    /// Bound on in-flight samples per connecting stream.
    pub capacity: usize,
}

impl PipelineConfig {
    /// Create the configuration with the default 2x2 pooling tile and stream
    /// capacity.
    pub fn new(conv: Conv2dConfig) -> Self {
        Self {
            conv,
            pool_size: [2, 2],
            capacity: MAX_QUEUED_SAMPLES,
        }
    }

    /// The pooling tile size.
    pub fn with_pool_size(mut self, pool_size: [usize; 2]) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// The bound on in-flight samples per connecting stream.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Initialize both stages with the given convolution kernel, wiring the
    /// pool input size to the convolution output size.
    ///
    /// # Panics
    ///
    /// Panics when the stage geometries are inconsistent, see
    /// [Conv2dConfig::init] and [MaxPool2dConfig::init].
    pub fn init(&self, weight: Vec<Fixed>) -> Pipeline {
        let conv = self.conv.init(weight);
        let pool = MaxPool2dConfig::new(conv.output_size())
            .with_kernel_size(self.pool_size)
            .init();

        Pipeline {
            conv,
            pool,
            capacity: self.capacity,
        }
    }
}

impl Config for PipelineConfig {}

/// The convolution and pooling stages, ready to be spawned as dataflow
/// workers.
///
/// Should be created with [PipelineConfig].
pub struct Pipeline {
    conv: Conv2d,
    pool: MaxPool2d,
    capacity: usize,
}

impl Pipeline {
    /// Spawns one long-lived worker thread per stage, connected by bounded
    /// streams.
    ///
    /// Workers carry no start/stop handshake: each one processes frames back
    /// to back, idling on its input stream between frames, and retires once
    /// the stream disconnects. Dropping the handle's input side therefore
    /// shuts the whole pipeline down in stage order.
    pub fn spawn(self) -> PipelineHandle {
        let (input, conv_in) = stream::channel(self.capacity);
        let (conv_out, pool_in) = stream::channel(self.capacity);
        let (pool_out, output) = stream::channel(self.capacity);

        let input_len = self.conv.input_len();
        let output_len = self.pool.output_len();

        let conv = self.conv;
        let conv_worker = thread::spawn(move || {
            while conv.process(&conv_in, &conv_out).is_ok() {
                log::debug!("convolution frame complete");
            }
            log::debug!("convolution worker retiring");
        });

        let pool = self.pool;
        let pool_worker = thread::spawn(move || {
            while pool.process(&pool_in, &pool_out).is_ok() {
                log::debug!("pooling frame complete");
            }
            log::debug!("pooling worker retiring");
        });

        log::info!(
            "pipeline spawned: {input_len} samples in, {output_len} samples out per frame"
        );

        PipelineHandle {
            input,
            output,
            input_len,
            output_len,
            workers: vec![conv_worker, pool_worker],
        }
    }
}

/// Boundary streams and worker handles of a running [Pipeline].
pub struct PipelineHandle {
    input: StreamWriter<Fixed>,
    output: StreamReader<Fixed>,
    input_len: usize,
    output_len: usize,
    workers: Vec<thread::JoinHandle<()>>,
}

impl PipelineHandle {
    /// Samples consumed on the input boundary per frame.
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// Samples produced on the output boundary per frame.
    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// Writes one sample to the pipeline input, blocking while the stream is
    /// full.
    pub fn write(&self, sample: Fixed) -> Result<(), StreamError> {
        self.input.write(sample)
    }

    /// Reads one pooled sample from the pipeline output, blocking while the
    /// stream is empty.
    pub fn read(&self) -> Result<Fixed, StreamError> {
        self.output.read()
    }

    /// Pushes one full input frame through the pipeline and collects the
    /// pooled output frame.
    ///
    /// The frame is fed from a scoped producer thread while the calling
    /// thread drains the output, so the call completes regardless of the
    /// stream capacity.
    ///
    /// # Panics
    ///
    /// Panics when `frame` does not hold exactly
    /// [input_len](Self::input_len) samples.
    pub fn process(&self, frame: Vec<Fixed>) -> Result<Vec<Fixed>, PipelineError> {
        assert_eq!(
            frame.len(),
            self.input_len,
            "expected {} samples per input frame, got {}",
            self.input_len,
            frame.len(),
        );

        let result = thread::scope(|scope| {
            let input = &self.input;
            scope.spawn(move || {
                for sample in frame {
                    if input.write(sample).is_err() {
                        // The conv worker is gone; the output side below
                        // reports the disconnect.
                        break;
                    }
                }
            });

            (0..self.output_len)
                .map(|_| self.output.read())
                .collect::<Result<Vec<_>, _>>()
        })?;

        Ok(result)
    }

    /// Disconnects the input boundary and waits for both workers to retire.
    pub fn shutdown(self) -> Result<(), PipelineError> {
        drop(self.input);

        for worker in self.workers {
            worker.join().map_err(|_| PipelineError::Worker)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_default(weight: Vec<Fixed>) -> PipelineHandle {
        PipelineConfig::new(Conv2dConfig::new([28, 28]))
            .init(weight)
            .spawn()
    }

    #[test]
    fn uniform_averaging_kernel_preserves_uniform_input() {
        // All samples 1.0 and all 25 weights 1/25: every convolution output
        // is ~1.0 (up to quantization of 0.04), and pooling equal values
        // changes nothing.
        let handle = spawn_default(vec![Fixed::from_f32(0.04); 25]);
        let frame = vec![Fixed::from_f32(1.0); handle.input_len()];

        let out = handle.process(frame).unwrap();

        assert_eq!(out.len(), 144);
        for sample in out {
            assert_eq!(sample.to_bits(), 250);
            assert!((sample.to_f32() - 1.0).abs() < 0.04);
        }
        handle.shutdown().unwrap();
    }

    #[test]
    fn wrapped_positive_sums_flow_through() {
        // 70.0 * 4.0 = 280.0 wraps to 24.0, which survives both ReLU and
        // pooling bit-exactly.
        let mut weight = vec![Fixed::ZERO; 25];
        weight[2 * 5 + 2] = Fixed::from_f32(4.0);
        let handle = spawn_default(weight);
        let frame = vec![Fixed::from_f32(70.0); handle.input_len()];

        let out = handle.process(frame).unwrap();

        assert!(out.iter().all(|&v| v == Fixed::from_f32(24.0)));
        handle.shutdown().unwrap();
    }

    #[test]
    fn manual_streaming_matches_frame_processing() {
        let mut weight = vec![Fixed::ZERO; 25];
        weight[2 * 5 + 2] = Fixed::from_f32(1.0);

        // A capacity larger than the frame lets a single thread feed the
        // whole input boundary before draining the output boundary.
        let handle = PipelineConfig::new(Conv2dConfig::new([28, 28]))
            .with_capacity(1024)
            .init(weight)
            .spawn();

        let frame: Vec<Fixed> = (0..handle.input_len())
            .map(|index| Fixed::from_bits(index as i16))
            .collect();

        for &sample in &frame {
            handle.write(sample).unwrap();
        }
        let streamed: Vec<Fixed> = (0..handle.output_len())
            .map(|_| handle.read().unwrap())
            .collect();

        // The same workers then take a second frame; both boundaries agree.
        let processed = handle.process(frame).unwrap();

        assert_eq!(streamed, processed);
        handle.shutdown().unwrap();
    }

    #[test]
    fn shutdown_joins_idle_workers() {
        let handle = spawn_default(vec![Fixed::ZERO; 25]);
        handle.shutdown().unwrap();
    }
}
