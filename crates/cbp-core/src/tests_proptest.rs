use proptest::prelude::*;

// Property-based checks for the sketch-and-convolve pipeline

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CbpOptions, MAX_SEED};
    use crate::hashing::HashMapping;
    use crate::layer::CompactBilinearPooling;
    use crate::pooling::Pooling;
    use ndarray::Array4;

    fn feature_map(dims: (usize, usize, usize, usize), values: &[f32]) -> Array4<f32> {
        Array4::from_shape_fn(dims, |(b, c, h, w)| {
            let flat = ((b * dims.1 + c) * dims.2 + h) * dims.3 + w;
            values[flat % values.len()]
        })
    }

    fn max_abs(values: impl Iterator<Item = f32>) -> f32 {
        values.fold(0.0f32, |m, v| m.max(v.abs()))
    }

    // =========================================================================
    // Linearity in each argument
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn test_scaling_one_input_scales_output(
            seed in 0u64..1_000,
            k in -4.0f32..4.0f32,
            values in prop::collection::vec(-2.0f32..2.0f32, 1..64),
            dense in any::<bool>(),
        ) {
            let pooling = if dense { Pooling::None } else { Pooling::Sum };
            let layer = CompactBilinearPooling::new(
                5,
                3,
                16,
                CbpOptions::default().with_seed(seed).with_pooling(pooling),
            ).unwrap();

            let x1 = feature_map((2, 5, 2, 3), &values);
            let x2 = feature_map((2, 3, 2, 3), &values.iter().rev().copied().collect::<Vec<_>>());
            let scaled = x1.mapv(|v| v * k);

            let base = layer.forward(x1.view(), x2.view()).unwrap().into_dyn();
            let out = layer.forward(scaled.view(), x2.view()).unwrap().into_dyn();

            let tolerance = 1e-4 * (1.0 + k.abs()) * (1.0 + max_abs(base.iter().copied()));
            for (o, b) in out.iter().zip(base.iter()) {
                prop_assert!((o - k * b).abs() <= tolerance, "{} vs {} * {}", o, k, b);
            }
        }
    }

    // =========================================================================
    // Zero input gives a zero descriptor
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_zero_input_zero_output(
            seed in 0..=MAX_SEED,
            output_dim in 1usize..48,
            values in prop::collection::vec(-5.0f32..5.0f32, 1..32),
            zero_first in any::<bool>(),
        ) {
            let layer = CompactBilinearPooling::new(
                4,
                6,
                output_dim,
                CbpOptions::default().with_seed(seed).with_pooling(Pooling::None),
            ).unwrap();

            let mut x1 = feature_map((1, 4, 3, 2), &values);
            let mut x2 = feature_map((1, 6, 3, 2), &values);
            if zero_first {
                x1.fill(0.0);
            } else {
                x2.fill(0.0);
            }

            let out = layer.forward(x1.view(), x2.view()).unwrap();
            prop_assert!(out.view().iter().all(|&v| v.abs() < 1e-6));
        }
    }

    // =========================================================================
    // Determinism and shape contract
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_same_seed_same_layer(
            seed in 0..=MAX_SEED,
            c1 in 1usize..20,
            c2 in 1usize..20,
            output_dim in 1usize..64,
            batch in 0usize..3,
            height in 1usize..4,
            width in 1usize..4,
        ) {
            let options = CbpOptions::default().with_seed(seed);
            let a = CompactBilinearPooling::new(c1, c2, output_dim, options.clone()).unwrap();
            let b = CompactBilinearPooling::new(c1, c2, output_dim, options).unwrap();
            prop_assert_eq!(a.mapping1(), b.mapping1());
            prop_assert_eq!(a.mapping2(), b.mapping2());

            let x1 = feature_map((batch, c1, height, width), &[0.5, -1.25, 2.0]);
            let x2 = feature_map((batch, c2, height, width), &[1.5, 0.75, -0.5, 3.0]);
            let out_a = a.forward(x1.view(), x2.view()).unwrap();
            let out_b = b.forward(x1.view(), x2.view()).unwrap();
            prop_assert_eq!(out_a.shape(), &[batch, output_dim][..]);
            prop_assert_eq!(&out_a, &out_b);

            let dense = a.forward_per_location(x1.view(), x2.view()).unwrap();
            prop_assert_eq!(dense.shape(), &[batch, output_dim, height, width][..]);
        }
    }

    // =========================================================================
    // Generated mappings keep their invariants
    // =========================================================================
    proptest! {
        #[test]
        fn test_mapping_invariants(
            seed in any::<u64>(),
            input_dim in 1usize..200,
            output_dim in 1usize..100,
        ) {
            let mapping = HashMapping::from_seed(input_dim, output_dim, seed).unwrap();
            prop_assert_eq!(mapping.indices().len(), input_dim);
            prop_assert!(mapping.indices().iter().all(|&i| i < output_dim));
            prop_assert!(mapping.signs().iter().all(|&s| s == 1 || s == -1));
            let grouped: usize = mapping.buckets().iter().map(|b| b.len()).sum();
            prop_assert_eq!(grouped, input_dim);
        }
    }
}
