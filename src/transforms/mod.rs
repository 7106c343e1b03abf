//! Per-view intensity and appearance transforms.
//!
//! All transforms take a patch view and a random stream and return a new
//! patch of the same shape (rotation in a non-square plane excepted).

pub mod appearance;
pub mod augment;
pub mod filters;
pub mod rotate;

pub use appearance::{
    in_painting, local_pixel_shuffling, nonlinear_transformation, out_painting,
    AppearanceTransform,
};
pub use augment::{gaussian_noise, get_rng, scale_window, IntensityAugment, WindowConfig};
pub use filters::{gaussian_filter, gaussian_sharpen};
pub use rotate::{rotate_90, shape_preserving_turns};
