//! Hash Parameter Generator
//!
//! Random channel-to-bucket mappings for the count sketch. Each input stream
//! gets its own mapping `c -> (index[c], sign[c])`, generated once and never
//! mutated afterwards.

use crate::error::CbpError;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Immutable count-sketch parameters for one input stream.
///
/// # Invariants
/// - `indices.len() == signs.len() == input_dim > 0`
/// - every index is in `[0, output_dim)`
/// - every sign is exactly `-1` or `+1`
/// - `buckets[d]` lists, in ascending order, the channels with `index[c] == d`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashMapping {
    indices: Vec<usize>,
    signs: Vec<i8>,
    output_dim: usize,
    /// Channels grouped by output bucket, precomputed for the scatter-add
    buckets: Vec<Vec<usize>>,
}

impl HashMapping {
    /// Draw a mapping from `rng`: indices first, then signs.
    ///
    /// Indices are uniform over `[0, output_dim)`, signs uniform over `{-1, +1}`.
    pub fn generate<R: Rng + ?Sized>(
        input_dim: usize,
        output_dim: usize,
        rng: &mut R,
    ) -> Result<Self, CbpError> {
        check_dims(input_dim, output_dim)?;

        let indices: Vec<usize> = (0..input_dim)
            .map(|_| rng.gen_range(0..output_dim))
            .collect();
        let signs: Vec<i8> = (0..input_dim)
            .map(|_| if rng.gen::<bool>() { 1 } else { -1 })
            .collect();

        Ok(Self::build(indices, signs, output_dim))
    }

    /// Reproducible mapping from a single seed.
    pub fn from_seed(input_dim: usize, output_dim: usize, seed: u64) -> Result<Self, CbpError> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::generate(input_dim, output_dim, &mut rng)
    }

    /// Build a mapping from caller-supplied hash parameters.
    ///
    /// # Errors
    /// Returns `CbpError::Config` if the arrays are empty or differ in length,
    /// an index falls outside `[0, output_dim)`, or a sign is not ±1.
    pub fn from_parts(
        indices: Vec<usize>,
        signs: Vec<i8>,
        output_dim: usize,
    ) -> Result<Self, CbpError> {
        if indices.len() != signs.len() {
            return Err(CbpError::config(format!(
                "hash parameter length mismatch: indices.len()={}, signs.len()={}",
                indices.len(),
                signs.len()
            )));
        }
        check_dims(indices.len(), output_dim)?;

        if let Some((c, &idx)) = indices.iter().enumerate().find(|&(_, &i)| i >= output_dim) {
            return Err(CbpError::config(format!(
                "hash index {} for channel {} is outside [0, {})",
                idx, c, output_dim
            )));
        }
        if let Some((c, &s)) = signs
            .iter()
            .enumerate()
            .find(|&(_, &s)| s != 1 && s != -1)
        {
            return Err(CbpError::config(format!(
                "hash sign {} for channel {} must be -1 or +1",
                s, c
            )));
        }

        Ok(Self::build(indices, signs, output_dim))
    }

    fn build(indices: Vec<usize>, signs: Vec<i8>, output_dim: usize) -> Self {
        let mut buckets = vec![Vec::new(); output_dim];
        for (c, &idx) in indices.iter().enumerate() {
            buckets[idx].push(c);
        }
        Self {
            indices,
            signs,
            output_dim,
            buckets,
        }
    }

    /// Number of input channels this mapping accepts
    pub fn input_dim(&self) -> usize {
        self.indices.len()
    }

    /// Sketch dimension D
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn signs(&self) -> &[i8] {
        &self.signs
    }

    /// Sign of channel `c` as a multiplier.
    #[inline]
    pub fn sign(&self, c: usize) -> f32 {
        f32::from(self.signs[c])
    }

    /// Channels that land in each output bucket.
    pub fn buckets(&self) -> &[Vec<usize>] {
        &self.buckets
    }

    /// Dense `(input_dim, output_dim)` sketch matrix.
    ///
    /// Row `c` holds `sign[c]` at column `index[c]` and zeros elsewhere, so a
    /// channel vector times this matrix is its count sketch.
    pub fn to_dense_matrix(&self) -> Array2<f32> {
        let mut matrix = Array2::<f32>::zeros((self.input_dim(), self.output_dim));
        for (c, &idx) in self.indices.iter().enumerate() {
            matrix[[c, idx]] = self.sign(c);
        }
        matrix
    }
}

/// Generate the two independent mappings of a layer from one seed.
///
/// Both mappings are drawn from the same `StdRng` stream, mapping 1 first.
pub fn generate_pair(
    input_dim1: usize,
    input_dim2: usize,
    output_dim: usize,
    seed: u64,
) -> Result<(HashMapping, HashMapping), CbpError> {
    check_dims(input_dim1, output_dim)?;
    check_dims(input_dim2, output_dim)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let first = HashMapping::generate(input_dim1, output_dim, &mut rng)?;
    let second = HashMapping::generate(input_dim2, output_dim, &mut rng)?;
    Ok((first, second))
}

fn check_dims(input_dim: usize, output_dim: usize) -> Result<(), CbpError> {
    if output_dim == 0 {
        return Err(CbpError::config("output_dim must be positive"));
    }
    if input_dim == 0 {
        return Err(CbpError::config("input channel count must be positive"));
    }
    Ok(())
}
