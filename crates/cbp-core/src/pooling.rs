//! Spatial Pooler / Output Assembler
//!
//! Reduces the per-location (B, D, H, W) result to the final [`Descriptor`]
//! and applies the optional post-processing normalization.

use crate::error::CbpError;
use ndarray::{Array2, Array4, ArrayD, ArrayViewD, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Spatial aggregation applied to the per-location result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    /// Sum over H and W, giving (B, D). Unnormalized magnitude.
    Sum,
    /// Mean over H and W, giving (B, D).
    Average,
    /// No aggregation; (B, D, H, W) is returned as-is.
    None,
}

impl Default for Pooling {
    fn default() -> Self {
        Self::Sum
    }
}

impl Pooling {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Pooling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pooling {
    type Err = CbpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sum" => Ok(Self::Sum),
            "average" => Ok(Self::Average),
            "none" => Ok(Self::None),
            other => Err(CbpError::config(format!(
                "unsupported pooling mode '{}' (expected sum, average or none)",
                other
            ))),
        }
    }
}

/// Post-processing applied to each D-vector of the descriptor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    None,
    /// `sign(x) * sqrt(|x|)`
    SignedSqrt,
    /// Divide by the Euclidean norm; zero vectors stay zero.
    L2,
    /// Signed square root followed by L2.
    SignedSqrtL2,
}

impl Default for Normalization {
    fn default() -> Self {
        Self::None
    }
}

impl Normalization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SignedSqrt => "signed_sqrt",
            Self::L2 => "l2",
            Self::SignedSqrtL2 => "signed_sqrt_l2",
        }
    }

    /// Normalize one D-vector in place.
    pub fn apply(&self, mut lane: ArrayViewMut1<'_, f32>) {
        if matches!(self, Self::SignedSqrt | Self::SignedSqrtL2) {
            lane.mapv_inplace(|v| v.signum() * v.abs().sqrt());
        }
        if matches!(self, Self::L2 | Self::SignedSqrtL2) {
            let norm = lane.dot(&lane).sqrt();
            if norm > 0.0 && norm.is_finite() {
                lane.mapv_inplace(|v| v / norm);
            }
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Normalization {
    type Err = CbpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Self::None),
            "signed_sqrt" => Ok(Self::SignedSqrt),
            "l2" => Ok(Self::L2),
            "signed_sqrt_l2" => Ok(Self::SignedSqrtL2),
            other => Err(CbpError::config(format!(
                "unsupported normalization '{}' (expected none, signed_sqrt, l2 or signed_sqrt_l2)",
                other
            ))),
        }
    }
}

/// Final output of the layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    /// Spatially pooled, shape (B, D)
    Pooled(Array2<f32>),
    /// Per-location, shape (B, D, H, W)
    Dense(Array4<f32>),
}

impl Descriptor {
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Pooled(a) => a.shape(),
            Self::Dense(a) => a.shape(),
        }
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self, Self::Pooled(_))
    }

    pub fn batch_size(&self) -> usize {
        self.shape()[0]
    }

    pub fn output_dim(&self) -> usize {
        self.shape()[1]
    }

    pub fn pooled(&self) -> Option<&Array2<f32>> {
        match self {
            Self::Pooled(a) => Some(a),
            Self::Dense(_) => None,
        }
    }

    pub fn dense(&self) -> Option<&Array4<f32>> {
        match self {
            Self::Pooled(_) => None,
            Self::Dense(a) => Some(a),
        }
    }

    pub fn view(&self) -> ArrayViewD<'_, f32> {
        match self {
            Self::Pooled(a) => a.view().into_dyn(),
            Self::Dense(a) => a.view().into_dyn(),
        }
    }

    pub fn into_dyn(self) -> ArrayD<f32> {
        match self {
            Self::Pooled(a) => a.into_dyn(),
            Self::Dense(a) => a.into_dyn(),
        }
    }

    /// True when no element is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.view().iter().all(|v| v.is_finite())
    }

    /// Apply `normalization` to every D-vector (axis 1).
    pub fn normalize(&mut self, normalization: Normalization) {
        if normalization == Normalization::None {
            return;
        }
        match self {
            Self::Pooled(a) => a
                .lanes_mut(Axis(1))
                .into_iter()
                .for_each(|lane| normalization.apply(lane)),
            Self::Dense(a) => a
                .lanes_mut(Axis(1))
                .into_iter()
                .for_each(|lane| normalization.apply(lane)),
        }
    }
}

/// Aggregate a (B, D, H, W) per-location tensor according to `pooling`.
pub fn pool(per_location: Array4<f32>, pooling: Pooling) -> Descriptor {
    match pooling {
        Pooling::None => Descriptor::Dense(per_location),
        Pooling::Sum => Descriptor::Pooled(spatial_sum(&per_location)),
        Pooling::Average => {
            let (_, _, height, width) = per_location.dim();
            let mut pooled = spatial_sum(&per_location);
            let locations = height * width;
            if locations > 0 {
                pooled.mapv_inplace(|v| v / locations as f32);
            }
            Descriptor::Pooled(pooled)
        }
    }
}

fn spatial_sum(per_location: &Array4<f32>) -> Array2<f32> {
    per_location.sum_axis(Axis(3)).sum_axis(Axis(2))
}
