//! # geokmz Core
//!
//! Core types and I/O for converting georeferenced rasters into ground overlays.
//!
//! This crate provides:
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling and reprojection to WGS84
//! - `RasterSource` / `PixelBuffer<T>`: raster metadata and decoded bands
//! - `Footprint` / `GeoFootprint`: ground corners in source and geographic frames
//! - GeoTIFF reading (and a minimal writer)

pub mod crs;
pub mod error;
pub mod footprint;
pub mod io;
pub mod raster;

pub use crs::{reproject_footprint, CRS};
pub use error::{Error, Result};
pub use footprint::{extract_footprint, Footprint, GeoFootprint, LatLonBox, Orientation, Quad};
pub use raster::{BandLayout, GeoTransform, PixelBuffer, RasterElement, RasterSource, SampleType};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{reproject_footprint, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::footprint::{
        extract_footprint, Footprint, GeoFootprint, LatLonBox, Orientation, Quad,
    };
    pub use crate::io::GeoTiffReader;
    pub use crate::raster::{
        BandLayout, GeoTransform, PixelBuffer, RasterElement, RasterSource, SampleType,
    };
}
