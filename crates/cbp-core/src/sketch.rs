//! Sketch Projector
//!
//! Applies a [`HashMapping`] to the channel axis of a (B, C, H, W) feature
//! map, producing a (B, D, H, W) count sketch. Colliding channels accumulate.

use crate::error::CbpError;
use crate::hashing::HashMapping;
use ndarray::{Array4, ArrayView3, ArrayView4, ArrayViewMut3, Axis, Zip};

/// Count-sketch projection for one input stream.
#[derive(Debug, Clone)]
pub struct SketchProjector {
    mapping: HashMapping,
}

impl SketchProjector {
    pub fn new(mapping: HashMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &HashMapping {
        &self.mapping
    }

    pub fn input_dim(&self) -> usize {
        self.mapping.input_dim()
    }

    pub fn output_dim(&self) -> usize {
        self.mapping.output_dim()
    }

    /// Project `x` of shape (B, C, H, W) into a sketch of shape (B, D, H, W).
    ///
    /// For every channel `c`, `sign[c] * x[b, c, h, w]` is added into
    /// `out[b, index[c], h, w]`.
    ///
    /// # Errors
    /// `CbpError::ShapeMismatch` if `C` differs from the mapping's input dimension.
    pub fn project(&self, x: ArrayView4<'_, f32>) -> Result<Array4<f32>, CbpError> {
        let (batch, channels, height, width) = x.dim();
        if channels != self.mapping.input_dim() {
            return Err(CbpError::shape_mismatch(
                "sketch_projection",
                format!(
                    "feature map has {} channels, hash mapping expects {}",
                    channels,
                    self.mapping.input_dim()
                ),
            ));
        }

        let mut sketch = Array4::<f32>::zeros((batch, self.output_dim(), height, width));
        let mapping = &self.mapping;
        let scatter = |mut out: ArrayViewMut3<'_, f32>, input: ArrayView3<'_, f32>| {
            for (bucket, members) in mapping.buckets().iter().enumerate() {
                if members.is_empty() {
                    continue;
                }
                let mut dst = out.index_axis_mut(Axis(0), bucket);
                for &c in members {
                    dst.scaled_add(mapping.sign(c), &input.index_axis(Axis(0), c));
                }
            }
        };

        let zip = Zip::from(sketch.axis_iter_mut(Axis(0))).and(x.axis_iter(Axis(0)));
        #[cfg(feature = "parallel")]
        zip.par_for_each(scatter);
        #[cfg(not(feature = "parallel"))]
        zip.for_each(scatter);

        Ok(sketch)
    }
}
