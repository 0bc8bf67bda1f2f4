pub mod annotator;
pub mod area_mask;
pub mod color;
pub mod corner_finder;
pub mod coverage;
pub mod frame_mask;
pub mod normalizer;
pub mod utils;
pub mod vegetation_mask;
