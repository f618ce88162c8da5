//! I/O operations for reading and writing GeoTIFF rasters

mod native;

pub use native::{read_geotiff, write_geotiff, GeoTiffReader, TiffSample};
