//! Min-max normalization for display and snapshots.

use crate::float_trait::LucyFloat;
use crate::image::Image;

/// Linearly rescale `image` so its minimum maps to 0 and its maximum to 1.
///
/// Min and max are taken jointly over all channels. A constant image (or one
/// without a finite, positive range) maps to all zeros.
pub fn normalize<F: LucyFloat>(image: &Image<F>) -> Image<F> {
    normalize_range(image, F::zero(), F::one())
}

/// Linearly rescale `image` into `[lo, hi]`.
///
/// Degenerate inputs (empty, constant, or without finite samples) map to an
/// image filled with `lo`. Non-finite samples are replaced by `lo`.
pub fn normalize_range<F: LucyFloat>(image: &Image<F>, lo: F, hi: F) -> Image<F> {
    let (d_min, d_max) = match image.finite_min_max() {
        Some(bounds) => bounds,
        None => return image.map(|_| lo),
    };

    let range = d_max - d_min;
    if !(range.is_finite() && range > F::zero()) {
        return image.map(|_| lo);
    }

    // Dividing first keeps `d_max` exactly at `hi` and makes a second pass
    // over `[0, 1]` data the identity.
    let span = hi - lo;
    image.map(|x| {
        if x.is_finite() {
            lo + (x - d_min) / range * span
        } else {
            lo
        }
    })
}
