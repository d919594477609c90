//! Frequency-Domain Convolver
//!
//! Circular convolution of two count sketches along the D axis via the
//! convolution theorem:
//!
//! ```text
//! out[b, :, h, w] = Re(IFFT(FFT(s1[b, :, h, w]) ⊙ FFT(s2[b, :, h, w])))
//! ```
//!
//! The forward transform is unnormalized and the inverse is scaled by `1/D`,
//! so forward followed by inverse is the identity.

use crate::error::CbpError;
use ndarray::{Array4, ArrayViewMut1, Axis, Zip};
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// FFT plans for one sketch dimension, shared across forward calls.
pub struct FrequencyConvolver {
    output_dim: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Normalization factor for IFFT (1/D)
    norm_factor: f32,
}

impl std::fmt::Debug for FrequencyConvolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencyConvolver")
            .field("output_dim", &self.output_dim)
            .field("norm_factor", &self.norm_factor)
            .finish_non_exhaustive()
    }
}

impl FrequencyConvolver {
    /// Plan forward and inverse FFTs of length `output_dim`.
    pub fn new(output_dim: usize) -> Result<Self, CbpError> {
        if output_dim == 0 {
            return Err(CbpError::config("output_dim must be positive"));
        }

        let mut planner = FftPlanner::new();
        Ok(Self {
            output_dim,
            fft: planner.plan_fft_forward(output_dim),
            ifft: planner.plan_fft_inverse(output_dim),
            norm_factor: 1.0 / (output_dim as f32),
        })
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// DFT of every D-lane of a (B, D, H, W) sketch.
    pub fn forward_transform(&self, sketch: &Array4<f32>) -> Result<Array4<Complex32>, CbpError> {
        self.check_lane_len("forward_transform", sketch.len_of(Axis(1)))?;

        let mut spectrum = sketch.mapv(|v| Complex32::new(v, 0.0));
        transform_lanes(&mut spectrum, self.fft.as_ref());
        Ok(spectrum)
    }

    /// Inverse DFT of every D-lane, keeping the real part.
    ///
    /// The imaginary residue from round-off is discarded, not checked.
    pub fn inverse_transform(
        &self,
        spectrum: &Array4<Complex32>,
    ) -> Result<Array4<f32>, CbpError> {
        self.check_lane_len("inverse_transform", spectrum.len_of(Axis(1)))?;

        let mut buffer = spectrum.clone();
        transform_lanes(&mut buffer, self.ifft.as_ref());
        let norm = self.norm_factor;
        Ok(buffer.mapv(|c| c.re * norm))
    }

    /// Circular convolution of two (B, D, H, W) sketches along D.
    ///
    /// # Errors
    /// `CbpError::ShapeMismatch` if the sketches differ in shape or their D
    /// axis does not match the planned length.
    pub fn convolve(
        &self,
        sketch1: &Array4<f32>,
        sketch2: &Array4<f32>,
    ) -> Result<Array4<f32>, CbpError> {
        if sketch1.shape() != sketch2.shape() {
            return Err(CbpError::shape_mismatch(
                "convolve",
                format!(
                    "sketch shapes differ: {:?} vs {:?}",
                    sketch1.shape(),
                    sketch2.shape()
                ),
            ));
        }

        let mut product = self.forward_transform(sketch1)?;
        let other = self.forward_transform(sketch2)?;

        // Complex Hadamard product, not a real elementwise product
        Zip::from(&mut product)
            .and(&other)
            .for_each(|p, &o| *p = *p * o);

        self.inverse_transform(&product)
    }

    fn check_lane_len(&self, operation: &str, len: usize) -> Result<(), CbpError> {
        if len != self.output_dim {
            return Err(CbpError::shape_mismatch(
                operation,
                format!("D axis has length {}, FFT planned for {}", len, self.output_dim),
            ));
        }
        Ok(())
    }
}

fn transform_lanes(data: &mut Array4<Complex32>, plan: &dyn Fft<f32>) {
    let run = |mut lane: ArrayViewMut1<'_, Complex32>| {
        let mut buffer = lane.to_vec();
        plan.process(&mut buffer);
        for (dst, src) in lane.iter_mut().zip(buffer) {
            *dst = src;
        }
    };

    let zip = Zip::from(data.lanes_mut(Axis(1)));
    #[cfg(feature = "parallel")]
    zip.par_for_each(run);
    #[cfg(not(feature = "parallel"))]
    zip.for_each(run);
}

/// Direct O(D²) circular convolution, for reference.
///
/// `out[k] = Σ_i a[i] · b[(k - i) mod D]`
pub fn circular_convolve(a: &[f32], b: &[f32]) -> Result<Vec<f32>, CbpError> {
    if a.len() != b.len() {
        return Err(CbpError::shape_mismatch(
            "circular_convolve",
            format!("a.len()={}, b.len()={}", a.len(), b.len()),
        ));
    }
    let n = a.len();
    let mut out = vec![0.0f32; n];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0.0 {
            continue;
        }
        for (j, &bj) in b.iter().enumerate() {
            out[(i + j) % n] += ai * bj;
        }
    }
    Ok(out)
}
