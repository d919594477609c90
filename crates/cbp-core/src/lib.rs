//! # cbp-core
//!
//! Compact Bilinear Pooling (CBP) for pairs of multi-channel feature maps.
//!
//! Bilinear pooling of two channel vectors `x ∈ R^C1`, `y ∈ R^C2` is their
//! outer product, `C1 × C2` values per location. CBP approximates it in `D`
//! dimensions without ever forming it:
//!
//! - **Hash mappings**: one random `(index, sign)` pair per channel and input
//! - **Count sketch**: scatter-add of signed channels into `D` buckets
//! - **FFT convolution**: circular convolution of the two sketches, which is
//!   the count sketch of the outer product
//! - **Pooling**: sum / average over H and W, or per-location output
//!
//! Inner products of descriptors approximate inner products of the full
//! outer products, in expectation over the hash mappings.
//!
//! ## Example
//!
//! ```ignore
//! use cbp_core::{CbpOptions, CompactBilinearPooling};
//! use ndarray::Array4;
//!
//! let layer = CompactBilinearPooling::new(512, 512, 8000, CbpOptions::default().with_seed(1))?;
//!
//! let x1 = Array4::<f32>::zeros((8, 512, 14, 14));
//! let x2 = Array4::<f32>::zeros((8, 512, 14, 14));
//! let descriptor = layer.forward(x1.view(), x2.view())?;
//! assert_eq!(descriptor.shape(), &[8, 8000]);
//! ```

#![allow(clippy::derivable_impls)]

pub mod config;
pub mod convolve;
pub mod error;
pub mod hashing;
pub mod layer;
pub mod pooling;
pub mod sketch;

#[cfg(test)]
pub mod tests_config;
#[cfg(test)]
pub mod tests_proptest;

pub use config::{CbpConfig, CbpOptions, MAX_SEED};
pub use convolve::{circular_convolve, FrequencyConvolver};
pub use error::CbpError;
pub use hashing::{generate_pair, HashMapping};
pub use layer::CompactBilinearPooling;
pub use pooling::{pool, Descriptor, Normalization, Pooling};
pub use sketch::SketchProjector;
