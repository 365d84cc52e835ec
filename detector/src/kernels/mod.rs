//! Stage kernels applied to every frame.
//!
//! Each kernel takes a helper thread count. A count of 0 or 1 runs on the
//! calling thread; larger counts split the frame into contiguous row blocks
//! (see [`rows`]). The output never depends on the count.

pub mod diff;
pub mod grayscale;
pub mod rows;
pub mod smooth;

pub use diff::{differing_pixels, differs_from_background};
pub use grayscale::{grayscale, to_grayscale};
pub use smooth::{smooth, smoothed};
