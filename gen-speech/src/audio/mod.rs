//! Audio assembly module: WAV fragment stitching and output encoding.

pub mod encoder;
pub mod fragment;
pub mod stitcher;

pub use encoder::{OutputFormat, encode};
pub use fragment::into_wav;
pub use stitcher::{StitchError, stitch};
