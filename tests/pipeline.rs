use convpipe::nn::conv::Conv2dConfig;
use convpipe::pipeline::PipelineConfig;
use convpipe::Fixed;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Direct nested-loop convolution + ReLU over a materialized frame, with the
/// same accumulation order and wrapping arithmetic as the streaming stage.
fn reference_conv(
    frame: &[Fixed],
    input_size: [usize; 2],
    weight: &[Fixed],
    kernel_size: [usize; 2],
) -> Vec<Fixed> {
    let [height, width] = input_size;
    let [kh, kw] = kernel_size;
    let mut out = Vec::new();

    for i in 0..height - kh + 1 {
        for j in 0..width - kw + 1 {
            let mut sum = Fixed::ZERO;
            for ki in 0..kh {
                for kj in 0..kw {
                    sum = sum + frame[(i + ki) * width + (j + kj)] * weight[ki * kw + kj];
                }
            }
            out.push(sum.max(Fixed::ZERO));
        }
    }
    out
}

/// Direct non-overlapping tile maxima over a materialized frame.
fn reference_pool(frame: &[Fixed], input_size: [usize; 2], tile: [usize; 2]) -> Vec<Fixed> {
    let [height, width] = input_size;
    let [ph, pw] = tile;
    let mut out = Vec::new();

    for i in 0..height / ph {
        for j in 0..width / pw {
            let mut best = Fixed::MIN;
            for r in 0..ph {
                for c in 0..pw {
                    let sample = frame[(i * ph + r) * width + (j * pw + c)];
                    if sample > best {
                        best = sample;
                    }
                }
            }
            out.push(best);
        }
    }
    out
}

fn random_bits(rng: &mut StdRng, len: usize, range: std::ops::RangeInclusive<i16>) -> Vec<Fixed> {
    (0..len)
        .map(|_| Fixed::from_bits(rng.random_range(range.clone())))
        .collect()
}

#[test]
fn matches_reference_across_consecutive_frames() {
    let mut rng = StdRng::seed_from_u64(17);
    let weight = random_bits(&mut rng, 25, i16::MIN..=i16::MAX);

    let handle = PipelineConfig::new(Conv2dConfig::new([28, 28]))
        .init(weight.clone())
        .spawn();
    assert_eq!(handle.input_len(), 784);
    assert_eq!(handle.output_len(), 144);

    // The same long-lived workers take every frame; each result must match
    // the composed reference, which shows that no state leaks between passes.
    for _ in 0..3 {
        let frame = random_bits(&mut rng, handle.input_len(), i16::MIN..=i16::MAX);
        let expected = reference_pool(
            &reference_conv(&frame, [28, 28], &weight, [5, 5]),
            [24, 24],
            [2, 2],
        );

        assert_eq!(handle.process(frame).unwrap(), expected);
    }
    handle.shutdown().unwrap();
}

#[test]
fn supports_non_default_geometry_end_to_end() {
    let mut rng = StdRng::seed_from_u64(18);
    let weight = random_bits(&mut rng, 9, i16::MIN..=i16::MAX);

    let handle = PipelineConfig::new(Conv2dConfig::new([12, 12]).with_kernel_size([3, 3]))
        .init(weight.clone())
        .spawn();
    assert_eq!(handle.input_len(), 144);
    assert_eq!(handle.output_len(), 25);

    let frame = random_bits(&mut rng, handle.input_len(), i16::MIN..=i16::MAX);
    let expected = reference_pool(
        &reference_conv(&frame, [12, 12], &weight, [3, 3]),
        [10, 10],
        [2, 2],
    );

    assert_eq!(handle.process(frame).unwrap(), expected);
    handle.shutdown().unwrap();
}

#[test]
fn positive_scaling_preserves_activation_pattern() {
    // Integer-valued weights and small samples make doubling exact in Q8.8,
    // so no term wraps or loses fraction bits: the scaled run must produce
    // exactly doubled outputs with the same ReLU zero pattern.
    let mut rng = StdRng::seed_from_u64(19);
    let weight: Vec<Fixed> = (0..25)
        .map(|_| Fixed::from_f32([-2.0, -1.0, 1.0, 2.0][rng.random_range(0..4)]))
        .collect();
    let frame = random_bits(&mut rng, 784, -64..=64);
    let doubled: Vec<Fixed> = frame
        .iter()
        .map(|&v| v * Fixed::from_f32(2.0))
        .collect();

    let handle = PipelineConfig::new(Conv2dConfig::new([28, 28]))
        .init(weight)
        .spawn();

    let base = handle.process(frame).unwrap();
    let scaled = handle.process(doubled).unwrap();

    for (b, s) in base.iter().zip(&scaled) {
        assert_eq!(s.to_bits(), b.to_bits() * 2);
        assert_eq!(*s > Fixed::ZERO, *b > Fixed::ZERO);
    }
    handle.shutdown().unwrap();
}

#[test]
fn all_ones_with_uniform_kernel_stays_near_one() {
    let handle = PipelineConfig::new(Conv2dConfig::new([28, 28]))
        .init(vec![Fixed::from_f32(0.04); 25])
        .spawn();

    let out = handle
        .process(vec![Fixed::from_f32(1.0); handle.input_len()])
        .unwrap();

    assert!(out
        .iter()
        .all(|sample| (sample.to_f32() - 1.0).abs() < 0.04));
    handle.shutdown().unwrap();
}
