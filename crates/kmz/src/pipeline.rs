//! Single-file GeoTIFF → KMZ conversion

use std::path::{Path, PathBuf};

use geokmz_core::io::GeoTiffReader;
use geokmz_core::{
    extract_footprint, reproject_footprint, Error, GeoFootprint, Orientation, PixelBuffer,
    RasterElement, Result, SampleType,
};
use geokmz_palette::{encode_image, EncodedImage, PaletteOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::archive::write_kmz;
use crate::kml::OverlayDescriptor;
use crate::naming::{base_name, image_entry_name};

/// Options for converting one raster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertOptions {
    pub palette: PaletteOptions,
}

/// Outcome of a successful conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub width: usize,
    pub height: usize,
    pub palette_len: usize,
    pub orientation: Orientation,
    pub footprint: GeoFootprint,
    /// Size of the finished archive in bytes
    pub archive_bytes: u64,
}

/// Convert `input` into a KMZ written at `output`.
///
/// Stages run strictly in order; the first failure aborts the file and
/// nothing is left at `output`.
pub fn convert_file(input: &Path, output: &Path, options: &ConvertOptions) -> Result<ConversionReport> {
    options.palette.validate()?;

    let reader = GeoTiffReader::open(input)?;
    let source = reader.source().clone();
    debug!(
        "{}: {}x{} {:?} {} ({})",
        input.display(),
        source.width,
        source.height,
        source.layout,
        source.sample_type,
        source.crs.identifier()
    );

    let footprint = extract_footprint(&source)?;
    let geo = reproject_footprint(&footprint, &source.crs)?;
    debug!("{}: {:?} footprint {:?}", input.display(), geo.orientation, geo.lat_lon_box());

    // The reader is consumed here, closing the file before packaging.
    // Samples keep their stored type so no-data matches at that precision.
    let nodata = source.nodata;
    let palette = &options.palette;
    let image = match source.sample_type {
        SampleType::U8 => encode(reader.read_pixels::<u8>(), nodata, palette)?,
        SampleType::U16 => encode(reader.read_pixels::<u16>(), nodata, palette)?,
        SampleType::I16 => encode(reader.read_pixels::<i16>(), nodata, palette)?,
        SampleType::U32 => encode(reader.read_pixels::<u32>(), nodata, palette)?,
        SampleType::I32 => encode(reader.read_pixels::<i32>(), nodata, palette)?,
        SampleType::F32 => encode(reader.read_pixels::<f32>(), nodata, palette)?,
        _ => encode(reader.read_pixels::<f64>(), nodata, palette)?,
    };
    if image.width != source.width || image.height != source.height {
        return Err(Error::ImageDecode(format!(
            "encoded {}x{} image for a {}x{} raster",
            image.width, image.height, source.width, source.height
        )));
    }

    let base = base_name(input);
    if base.is_empty() {
        return Err(Error::Packaging(format!("{} has no file name", input.display())));
    }
    let descriptor = OverlayDescriptor::new(base.clone(), image_entry_name(&base), &geo);
    write_kmz(output, &descriptor, &image)?;

    let archive_bytes = std::fs::metadata(output)?.len();
    info!(
        "Converted {} -> {} ({} colors, {} bytes)",
        input.display(),
        output.display(),
        image.palette_len,
        archive_bytes
    );

    Ok(ConversionReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        width: image.width,
        height: image.height,
        palette_len: image.palette_len,
        orientation: geo.orientation,
        footprint: geo,
        archive_bytes,
    })
}

fn encode<T: RasterElement>(
    pixels: Result<PixelBuffer<T>>,
    nodata: Option<f64>,
    options: &PaletteOptions,
) -> Result<EncodedImage> {
    encode_image(&pixels?, nodata, options)
}
