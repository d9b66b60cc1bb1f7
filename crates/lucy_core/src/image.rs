//! Floating-point image buffer shared by every stage of the pipeline.
//!
//! Samples are stored as an `ndarray::Array3` with shape
//! `(height, width, channels)`, so a row-major interleaved buffer (the layout
//! image decoders hand out) maps onto it without reordering.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, ArrayViewMut3, Axis};

use crate::error::DeconvError;
use crate::float_trait::LucyFloat;

/// A 2D grid of real-valued samples with 1 (gray) or 3 (color) channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<F: LucyFloat> {
    data: Array3<F>,
}

fn check_channels(channels: usize) -> Result<(), DeconvError> {
    match channels {
        1 | 3 => Ok(()),
        other => Err(DeconvError::UnsupportedChannels(other)),
    }
}

impl<F: LucyFloat> Image<F> {
    /// Wrap an existing `(height, width, channels)` array.
    pub fn from_array(data: Array3<F>) -> Result<Self, DeconvError> {
        check_channels(data.dim().2)?;
        Ok(Self { data })
    }

    /// Build an image from an interleaved, row-major sample buffer.
    pub fn from_vec(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<F>,
    ) -> Result<Self, DeconvError> {
        check_channels(channels)?;
        let actual = data.len();
        // An overflowing shape can never match, so it reports as `usize::MAX`.
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .unwrap_or(usize::MAX);
        let data = Array3::from_shape_vec((height, width, channels), data)
            .map_err(|_| DeconvError::ShapeMismatch { expected, actual })?;
        Ok(Self { data })
    }

    /// Single-channel image from a `(height, width)` plane.
    pub fn from_plane(plane: Array2<F>) -> Self {
        Self {
            data: plane.insert_axis(Axis(2)),
        }
    }

    /// Image with every sample set to `value`.
    pub fn filled(
        width: usize,
        height: usize,
        channels: usize,
        value: F,
    ) -> Result<Self, DeconvError> {
        check_channels(channels)?;
        Ok(Self {
            data: Array3::from_elem((height, width, channels), value),
        })
    }

    /// All-zero image with the same shape as `self`.
    pub fn zeros_like(&self) -> Self {
        Self {
            data: Array3::zeros(self.data.raw_dim()),
        }
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// Total number of samples across all channels.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when both images have identical width, height and channels.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.data.dim() == other.data.dim()
    }

    pub fn view(&self) -> ArrayView3<'_, F> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut3<'_, F> {
        self.data.view_mut()
    }

    pub fn as_array(&self) -> &Array3<F> {
        &self.data
    }

    pub(crate) fn as_array_mut(&mut self) -> &mut Array3<F> {
        &mut self.data
    }

    pub fn into_array(self) -> Array3<F> {
        self.data
    }

    /// Borrow one channel as a `(height, width)` plane.
    ///
    /// # Panics
    /// Panics if `c >= self.channels()`.
    pub fn channel(&self, c: usize) -> ArrayView2<'_, F> {
        self.data.index_axis(Axis(2), c)
    }

    /// Smallest and largest finite sample, or `None` if there are none.
    pub fn finite_min_max(&self) -> Option<(F, F)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((if v < lo { v } else { lo }, if v > hi { v } else { hi })),
            })
    }

    /// Sum of `self ⊙ other` over every sample, accumulated in memory order.
    ///
    /// # Panics
    /// Panics if the shapes differ.
    pub fn dot(&self, other: &Self) -> F {
        assert!(self.same_shape(other), "dot product of mismatched images");
        self.data
            .iter()
            .zip(other.data.iter())
            .fold(F::zero(), |acc, (&a, &b)| acc + a * b)
    }

    /// Map every sample through `f`, producing a new image of the same shape.
    pub fn map(&self, f: impl Fn(F) -> F) -> Self {
        Self {
            data: self.data.mapv(f),
        }
    }
}
