//! Raster metadata record

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::GeoTransform;

/// Numeric type of the stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl SampleType {
    /// Bits per sample
    pub fn bits(&self) -> u32 {
        match self {
            SampleType::U8 | SampleType::I8 => 8,
            SampleType::U16 | SampleType::I16 => 16,
            SampleType::U32 | SampleType::I32 | SampleType::F32 => 32,
            SampleType::U64 | SampleType::I64 | SampleType::F64 => 64,
        }
    }

    /// Whether this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, SampleType::F32 | SampleType::F64)
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleType::U8 => "uint8",
            SampleType::U16 => "uint16",
            SampleType::U32 => "uint32",
            SampleType::U64 => "uint64",
            SampleType::I8 => "int8",
            SampleType::I16 => "int16",
            SampleType::I32 => "int32",
            SampleType::I64 => "int64",
            SampleType::F32 => "float32",
            SampleType::F64 => "float64",
        };
        f.write_str(name)
    }
}

/// How the bands of a raster map onto colour channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandLayout {
    /// One grey band
    Gray,
    /// Grey plus alpha
    GrayAlpha,
    /// Red, green, blue
    Rgb,
    /// Red, green, blue, alpha
    Rgba,
    /// Any other band count; the first three bands are displayed as RGB
    Multiband(usize),
}

impl BandLayout {
    /// Layout for a plain band count, assuming no explicit alpha band.
    pub fn from_band_count(bands: usize) -> Self {
        match bands {
            1 => BandLayout::Gray,
            3 => BandLayout::Rgb,
            n => BandLayout::Multiband(n),
        }
    }

    /// Number of bands
    pub fn band_count(&self) -> usize {
        match self {
            BandLayout::Gray => 1,
            BandLayout::GrayAlpha => 2,
            BandLayout::Rgb => 3,
            BandLayout::Rgba => 4,
            BandLayout::Multiband(n) => *n,
        }
    }

    /// Index of the alpha band, if the layout carries one
    pub fn alpha_band(&self) -> Option<usize> {
        match self {
            BandLayout::GrayAlpha => Some(1),
            BandLayout::Rgba => Some(3),
            _ => None,
        }
    }

    /// Indices of the bands displayed as colour (1 for grey, 3 for RGB)
    pub fn color_bands(&self) -> &'static [usize] {
        match self {
            BandLayout::Gray | BandLayout::GrayAlpha => &[0],
            BandLayout::Multiband(n) if *n < 3 => &[0],
            _ => &[0, 1, 2],
        }
    }
}

/// Immutable metadata for one input raster.
///
/// Every field is required; [`RasterSource::validate`] is run when the
/// record is built from a file so a missing piece fails up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterSource {
    /// Path the raster was opened from
    pub path: PathBuf,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Band arrangement (implies band count)
    pub layout: BandLayout,
    /// Sample type shared by all bands
    pub sample_type: SampleType,
    /// Source coordinate reference system
    pub crs: CRS,
    /// Pixel-to-CRS affine transform
    pub transform: GeoTransform,
    /// Declared no-data value
    pub nodata: Option<f64>,
}

impl RasterSource {
    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.layout.band_count()
    }

    /// Dimensions as (width, height)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Check that the georeference is usable.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidGeoreference(format!(
                "raster has no extent: {}x{}",
                self.width, self.height
            )));
        }
        if self.transform.is_degenerate() {
            return Err(Error::InvalidGeoreference(format!(
                "degenerate affine transform {:?}",
                self.transform.to_gdal()
            )));
        }
        Ok(())
    }
}
