/*!
 * Layout-preserving reconstruction.
 *
 * - `fitting`: shrink, wrap and truncate translated text into a box
 * - `resources`: fonts, images and imported pages of the output file
 * - `reconstruct`: page assembly in replacement or side-by-side mode
 */

pub mod fitting;
pub mod reconstruct;
pub mod resources;

pub use fitting::{FitResult, TextFitter};
pub use reconstruct::{OverflowWarning, ReconstructOutput, Reconstructor};
