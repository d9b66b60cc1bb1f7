//! Richardson–Lucy Deconvolution Core Library
//!
//! Pure Rust implementation of accelerated Richardson–Lucy deconvolution with
//! a Gaussian point-spread function. This crate contains all algorithm logic
//! without any image file or display handling.

pub mod convolution;
pub mod engine;
pub mod error;
pub mod float_trait;
pub mod image;
pub mod normalize;
pub mod snapshot;

// Re-export commonly used types at the crate root
pub use convolution::{gaussian_blur, gaussian_blur_1d, gaussian_blur_plane, KernelSpec};
pub use engine::{deconvolve, DeconvConfig, Deconvolution, RichardsonLucy};
pub use error::DeconvError;
pub use float_trait::LucyFloat;
pub use image::Image;
pub use normalize::{normalize, normalize_range};
pub use snapshot::{Snapshot, SnapshotSchedule};
