//! Raster data structures: metadata, affine transform and decoded bands

mod element;
mod geotransform;
mod pixels;
mod source;

pub use element::RasterElement;
pub use geotransform::{GeoTransform, ROTATION_TOLERANCE};
pub use pixels::PixelBuffer;
pub use source::{BandLayout, RasterSource, SampleType};
