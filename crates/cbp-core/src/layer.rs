//! Compact Bilinear Pooling layer
//!
//! Ties the four stages together:
//!
//! ```text
//! x1 (B,C1,H,W) ─ SketchProjector(h1,s1) ─┐
//!                                          ├─ FrequencyConvolver ─ pool ─ normalize ─ Descriptor
//! x2 (B,C2,H,W) ─ SketchProjector(h2,s2) ─┘
//! ```
//!
//! # Invariants
//! - Both mappings share the same D, fixed at construction
//! - Hash mappings are never mutated after construction
//! - `forward` validates every shape before doing any work
//!
//! # Thread Safety
//! The layer is `Send + Sync` and `forward` takes `&self`; all temporaries
//! are owned by the call.

use crate::config::{CbpConfig, CbpOptions, MAX_SEED};
use crate::convolve::FrequencyConvolver;
use crate::error::CbpError;
use crate::hashing::{generate_pair, HashMapping};
use crate::pooling::{pool, Descriptor};
use crate::sketch::SketchProjector;
use ndarray::{Array4, ArrayView4};
use rand::Rng;

#[derive(Debug)]
pub struct CompactBilinearPooling {
    projector1: SketchProjector,
    projector2: SketchProjector,
    convolver: FrequencyConvolver,
    options: CbpOptions,
    /// Seed the mappings were drawn from; `None` for caller-supplied mappings
    seed: Option<u64>,
}

impl CompactBilinearPooling {
    /// Create a layer for inputs with `input_dim1` and `input_dim2` channels
    /// and sketch dimension `output_dim`.
    ///
    /// # Errors
    /// `CbpError::Config` if any dimension is zero or the seed exceeds
    /// [`MAX_SEED`]. Nothing is generated in that case.
    pub fn new(
        input_dim1: usize,
        input_dim2: usize,
        output_dim: usize,
        options: CbpOptions,
    ) -> Result<Self, CbpError> {
        CbpConfig {
            input_dim1,
            input_dim2,
            output_dim,
            options: options.clone(),
        }
        .validate()?;

        let seed = match options.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::thread_rng().gen_range(0..=MAX_SEED);
                log::debug!("CompactBilinearPooling: no seed configured, drew {}", seed);
                seed
            }
        };

        let (mapping1, mapping2) = generate_pair(input_dim1, input_dim2, output_dim, seed)?;
        let mut layer = Self::assemble(mapping1, mapping2, options)?;
        layer.seed = Some(seed);
        Ok(layer)
    }

    /// Create a layer from a validated [`CbpConfig`].
    pub fn from_config(config: &CbpConfig) -> Result<Self, CbpError> {
        Self::new(
            config.input_dim1,
            config.input_dim2,
            config.output_dim,
            config.options.clone(),
        )
    }

    /// Create a layer from explicit hash mappings.
    ///
    /// `options.seed` is ignored.
    ///
    /// # Errors
    /// `CbpError::Config` if the mappings disagree on D.
    pub fn with_mappings(
        mapping1: HashMapping,
        mapping2: HashMapping,
        options: CbpOptions,
    ) -> Result<Self, CbpError> {
        Self::assemble(mapping1, mapping2, options)
    }

    fn assemble(
        mapping1: HashMapping,
        mapping2: HashMapping,
        options: CbpOptions,
    ) -> Result<Self, CbpError> {
        if mapping1.output_dim() != mapping2.output_dim() {
            return Err(CbpError::config(format!(
                "hash mappings disagree on output_dim: {} vs {}",
                mapping1.output_dim(),
                mapping2.output_dim()
            )));
        }

        let convolver = FrequencyConvolver::new(mapping1.output_dim())?;
        log::debug!(
            "CompactBilinearPooling: C1={} C2={} D={} pooling={} normalization={}",
            mapping1.input_dim(),
            mapping2.input_dim(),
            mapping1.output_dim(),
            options.pooling,
            options.normalization
        );

        Ok(Self {
            projector1: SketchProjector::new(mapping1),
            projector2: SketchProjector::new(mapping2),
            convolver,
            options,
            seed: None,
        })
    }

    /// Compute the descriptor of `x1` (B, C1, H, W) and `x2` (B, C2, H, W).
    ///
    /// Returns (B, D) when pooled, (B, D, H, W) with `Pooling::None`.
    ///
    /// # Errors
    /// `CbpError::ShapeMismatch` if a channel count does not match its mapping
    /// or the inputs disagree on batch or spatial size.
    pub fn forward(
        &self,
        x1: ArrayView4<'_, f32>,
        x2: ArrayView4<'_, f32>,
    ) -> Result<Descriptor, CbpError> {
        let per_location = self.forward_per_location(x1, x2)?;
        let (batch, _, height, width) = x1.dim();
        log::trace!(
            "CompactBilinearPooling::forward batch={} height={} width={}",
            batch,
            height,
            width
        );

        let mut descriptor = pool(per_location, self.options.pooling);
        descriptor.normalize(self.options.normalization);

        if !descriptor.is_finite() {
            log::warn!("CompactBilinearPooling: descriptor contains NaN/Inf values");
        }
        Ok(descriptor)
    }

    /// Unpooled, unnormalized (B, D, H, W) result.
    pub fn forward_per_location(
        &self,
        x1: ArrayView4<'_, f32>,
        x2: ArrayView4<'_, f32>,
    ) -> Result<Array4<f32>, CbpError> {
        self.check_inputs(&x1, &x2)?;

        let sketch1 = self.projector1.project(x1)?;
        let sketch2 = self.projector2.project(x2)?;
        self.convolver.convolve(&sketch1, &sketch2)
    }

    fn check_inputs(&self, x1: &ArrayView4<'_, f32>, x2: &ArrayView4<'_, f32>) -> Result<(), CbpError> {
        let (b1, c1, h1, w1) = x1.dim();
        let (b2, c2, h2, w2) = x2.dim();

        if c1 != self.input_dim1() {
            return Err(CbpError::shape_mismatch(
                "forward",
                format!("x1 has {} channels, layer expects {}", c1, self.input_dim1()),
            ));
        }
        if c2 != self.input_dim2() {
            return Err(CbpError::shape_mismatch(
                "forward",
                format!("x2 has {} channels, layer expects {}", c2, self.input_dim2()),
            ));
        }
        if b1 != b2 {
            return Err(CbpError::shape_mismatch(
                "forward",
                format!("batch sizes differ: {} vs {}", b1, b2),
            ));
        }
        if (h1, w1) != (h2, w2) {
            return Err(CbpError::shape_mismatch(
                "forward",
                format!("spatial sizes differ: {}x{} vs {}x{}", h1, w1, h2, w2),
            ));
        }
        Ok(())
    }

    pub fn input_dim1(&self) -> usize {
        self.projector1.input_dim()
    }

    pub fn input_dim2(&self) -> usize {
        self.projector2.input_dim()
    }

    pub fn output_dim(&self) -> usize {
        self.convolver.output_dim()
    }

    pub fn mapping1(&self) -> &HashMapping {
        self.projector1.mapping()
    }

    pub fn mapping2(&self) -> &HashMapping {
        self.projector2.mapping()
    }

    pub fn options(&self) -> &CbpOptions {
        &self.options
    }

    /// Effective seed of the hash mappings.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}
