//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate for TIFF I/O and decodes the GeoTIFF tags needed
//! to place a raster on the ground: model transformation, CRS and no-data.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{BandLayout, GeoTransform, PixelBuffer, RasterElement, RasterSource, SampleType};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::debug;

/// GTModelTypeGeoKey
const KEY_MODEL_TYPE: u32 = 1024;
/// GTRasterTypeGeoKey
const KEY_RASTER_TYPE: u32 = 1025;
/// GeographicTypeGeoKey
const KEY_GEOGRAPHIC_TYPE: u32 = 2048;
/// ProjectedCSTypeGeoKey
const KEY_PROJECTED_TYPE: u32 = 3072;
/// Code for "user-defined" in GeoKey values
const USER_DEFINED: u32 = 32767;
/// GTRasterTypeGeoKey value for RasterPixelIsPoint
const RASTER_PIXEL_IS_POINT: u32 = 2;

/// An open GeoTIFF with its validated metadata.
///
/// The file handle lives as long as the reader; [`GeoTiffReader::read_pixels`]
/// consumes the reader, so the handle is released as soon as the pixels are
/// decoded.
pub struct GeoTiffReader<R: Read + Seek> {
    decoder: Decoder<R>,
    source: RasterSource,
}

impl GeoTiffReader<BufReader<File>> {
    /// Open a GeoTIFF file and read its georeferencing metadata
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), path.to_path_buf())
    }
}

impl<R: Read + Seek> GeoTiffReader<R> {
    /// Read GeoTIFF metadata from any `Read + Seek` source
    ///
    /// `path` is only recorded in the resulting [`RasterSource`].
    pub fn from_reader(reader: R, path: PathBuf) -> Result<Self> {
        let mut decoder = Decoder::new(reader)
            .map_err(|e| Error::ImageDecode(format!("TIFF decode error: {}", e)))?
            .with_limits(Limits::unlimited());

        let (width, height) = decoder
            .dimensions()
            .map_err(|e| Error::ImageDecode(format!("Cannot read dimensions: {}", e)))?;

        let layout = read_layout(&mut decoder)?;
        let sample_type = read_sample_type(&mut decoder)?;
        let geokeys = read_geokeys(&mut decoder)?;
        let mut transform = read_geotransform(&mut decoder)?;
        if geokeys.raster_type == Some(RASTER_PIXEL_IS_POINT) {
            // Tiepoints address pixel centres; shift to the outer corner.
            transform.origin_x -= 0.5 * (transform.pixel_width + transform.row_rotation);
            transform.origin_y -= 0.5 * (transform.col_rotation + transform.pixel_height);
        }
        let crs = geokeys.crs(&mut decoder)?;
        let nodata = read_nodata(&mut decoder);

        let source = RasterSource {
            path,
            width: width as usize,
            height: height as usize,
            layout,
            sample_type,
            crs,
            transform,
            nodata,
        };
        source.validate()?;

        debug!(
            "Opened {}: {}x{} {:?} {} {}",
            source.path.display(),
            source.width,
            source.height,
            source.layout,
            source.sample_type,
            source.crs
        );

        Ok(Self { decoder, source })
    }

    /// Validated raster metadata
    pub fn source(&self) -> &RasterSource {
        &self.source
    }

    /// Decode all bands, casting samples to `T`, and release the file
    pub fn read_pixels<T: RasterElement>(mut self) -> Result<PixelBuffer<T>> {
        let result = self
            .decoder
            .read_image()
            .map_err(|e| Error::ImageDecode(format!("Cannot read image data: {}", e)))?;

        let samples: Vec<T> = match result {
            DecodingResult::U8(buf) => cast_all(buf),
            DecodingResult::U16(buf) => cast_all(buf),
            DecodingResult::U32(buf) => cast_all(buf),
            DecodingResult::U64(buf) => cast_all(buf),
            DecodingResult::I8(buf) => cast_all(buf),
            DecodingResult::I16(buf) => cast_all(buf),
            DecodingResult::I32(buf) => cast_all(buf),
            DecodingResult::I64(buf) => cast_all(buf),
            DecodingResult::F32(buf) => cast_all(buf),
            DecodingResult::F64(buf) => cast_all(buf),
            #[allow(unreachable_patterns)]
            _ => {
                return Err(Error::ImageDecode(
                    "Unsupported TIFF pixel format".to_string(),
                ))
            }
        };

        PixelBuffer::from_interleaved(
            samples,
            self.source.width,
            self.source.height,
            self.source.layout,
        )
    }
}

/// Read a GeoTIFF file: metadata plus all bands cast to `T`
pub fn read_geotiff<T, P>(path: P) -> Result<(RasterSource, PixelBuffer<T>)>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let reader = GeoTiffReader::open(path)?;
    let source = reader.source().clone();
    let pixels = reader.read_pixels()?;
    Ok((source, pixels))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    // Values the target type cannot hold saturate to zero rather than abort.
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::zero))
        .collect()
}

fn read_layout<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<BandLayout> {
    let samples = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1) as usize;
    if samples == 0 {
        return Err(Error::ImageDecode("raster has no bands".into()));
    }

    // ExtraSamples: 1 = associated alpha, 2 = unassociated alpha
    let extra = decoder.get_tag_u32_vec(Tag::ExtraSamples).unwrap_or_default();
    let has_alpha = matches!(extra.first(), Some(1) | Some(2));

    Ok(match (samples, has_alpha) {
        (2, true) => BandLayout::GrayAlpha,
        (4, true) => BandLayout::Rgba,
        (n, _) => BandLayout::from_band_count(n),
    })
}

fn read_sample_type<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<SampleType> {
    // Missing tags take their TIFF defaults: 1 bit, unsigned integer.
    let bits = decoder
        .get_tag_u32_vec(Tag::BitsPerSample)
        .ok()
        .and_then(|v| v.first().copied())
        .unwrap_or(1);
    let format = decoder
        .get_tag_u32_vec(Tag::SampleFormat)
        .ok()
        .and_then(|v| v.first().copied())
        .unwrap_or(1);

    match (format, bits) {
        (1, 8) => Ok(SampleType::U8),
        (1, 16) => Ok(SampleType::U16),
        (1, 32) => Ok(SampleType::U32),
        (1, 64) => Ok(SampleType::U64),
        (2, 8) => Ok(SampleType::I8),
        (2, 16) => Ok(SampleType::I16),
        (2, 32) => Ok(SampleType::I32),
        (2, 64) => Ok(SampleType::I64),
        (3, 32) => Ok(SampleType::F32),
        (3, 64) => Ok(SampleType::F64),
        _ => Err(Error::ImageDecode(format!(
            "Unsupported data type: sample_format={}, bits_per_sample={}",
            format, bits
        ))),
    }
}

/// GeoKeyDirectory entries relevant to georeferencing
#[derive(Debug, Default)]
struct GeoKeys {
    model_type: Option<u32>,
    raster_type: Option<u32>,
    geographic: Option<u32>,
    projected: Option<u32>,
}

impl GeoKeys {
    /// Resolve the CRS, preferring the projected system
    fn crs<R: Read + Seek>(&self, decoder: &mut Decoder<R>) -> Result<CRS> {
        let code = self.projected.filter(|&c| c > 0).or(self.geographic.filter(|&c| c > 0));
        match code {
            Some(USER_DEFINED) => {
                let citation = decoder
                    .get_tag_ascii_string(Tag::GeoAsciiParamsTag)
                    .map(|s| s.trim_end_matches(['|', '\0']).to_string())
                    .unwrap_or_else(|_| "user-defined".to_string());
                Ok(CRS::user_defined(citation))
            }
            Some(code) => Ok(CRS::from_epsg(code)),
            None => Err(Error::InvalidGeoreference(format!(
                "GeoKeyDirectory declares no CRS (model type {:?})",
                self.model_type
            ))),
        }
    }
}

fn read_geokeys<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoKeys> {
    let dir = decoder
        .get_tag_u32_vec(Tag::GeoKeyDirectoryTag)
        .map_err(|_| Error::InvalidGeoreference("No GeoKeyDirectory tag".into()))?;

    // Header: [version, revision, minor, count], then 4 shorts per key:
    // [key_id, tiff_tag_location, count, value_or_index]
    if dir.len() < 4 {
        return Err(Error::InvalidGeoreference("Truncated GeoKeyDirectory".into()));
    }

    let mut keys = GeoKeys::default();
    for entry in dir[4..].chunks_exact(4).take(dir[3] as usize) {
        // Only keys stored inline (location 0) are plain values.
        if entry[1] != 0 {
            continue;
        }
        match entry[0] {
            KEY_MODEL_TYPE => keys.model_type = Some(entry[3]),
            KEY_RASTER_TYPE => keys.raster_type = Some(entry[3]),
            KEY_GEOGRAPHIC_TYPE => keys.geographic = Some(entry[3]),
            KEY_PROJECTED_TYPE => keys.projected = Some(entry[3]),
            _ => {}
        }
    }

    Ok(keys)
}

/// Read the GeoTransform from ModelPixelScale + ModelTiepoint, or from the
/// ModelTransformation matrix (which may carry rotation).
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    if let (Some(scale), Some(tiepoint)) = (&scale, &tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z]
            // scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            let pixel_width = scale[0];
            let pixel_height = -scale[1]; // Negative for north-up

            return Ok(GeoTransform::new(origin_x, origin_y, pixel_width, pixel_height));
        }
    }

    if let Ok(t) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if t.len() >= 16 {
            // Row-major 4x4:
            // x = t[3] + col * t[0] + row * t[1]
            // y = t[7] + col * t[4] + row * t[5]
            return Ok(GeoTransform {
                origin_x: t[3],
                origin_y: t[7],
                pixel_width: t[0],
                pixel_height: t[5],
                row_rotation: t[1],
                col_rotation: t[4],
            });
        }
    }

    Err(Error::InvalidGeoreference(
        "Cannot determine geotransform: no usable model tags".into(),
    ))
}

/// GDAL_NODATA is stored as ASCII text
fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .parse::<f64>()
        .ok()
}

/// Sample types the writer can emit
pub trait TiffSample: RasterElement {
    #[doc(hidden)]
    fn encode<W: Write + Seek>(
        encoder: &mut TiffEncoder<W>,
        source: &RasterSource,
        layout: BandLayout,
        data: &[Self],
    ) -> Result<()>;
}

macro_rules! impl_tiff_sample {
    ($t:ty, $gray:ty, $rgb:ty, $rgba:ty) => {
        impl TiffSample for $t {
            fn encode<W: Write + Seek>(
                encoder: &mut TiffEncoder<W>,
                source: &RasterSource,
                layout: BandLayout,
                data: &[Self],
            ) -> Result<()> {
                let (w, h) = (source.width as u32, source.height as u32);
                match layout {
                    BandLayout::Gray => {
                        let mut image = encoder.new_image::<$gray>(w, h).map_err(tiff_err)?;
                        write_geo_tags(image.encoder(), source)?;
                        image.write_data(data).map_err(tiff_err)
                    }
                    BandLayout::Rgb => {
                        let mut image = encoder.new_image::<$rgb>(w, h).map_err(tiff_err)?;
                        write_geo_tags(image.encoder(), source)?;
                        image.write_data(data).map_err(tiff_err)
                    }
                    BandLayout::Rgba => {
                        let mut image = encoder.new_image::<$rgba>(w, h).map_err(tiff_err)?;
                        image
                            .encoder()
                            .write_tag(Tag::ExtraSamples, &[2u16][..])
                            .map_err(tiff_err)?;
                        write_geo_tags(image.encoder(), source)?;
                        image.write_data(data).map_err(tiff_err)
                    }
                    other => Err(Error::ImageDecode(format!(
                        "Cannot write {:?} layout",
                        other
                    ))),
                }
            }
        }
    };
}

impl_tiff_sample!(u8, colortype::Gray8, colortype::RGB8, colortype::RGBA8);
impl_tiff_sample!(u16, colortype::Gray16, colortype::RGB16, colortype::RGBA16);
impl_tiff_sample!(f32, colortype::Gray32Float, colortype::RGB32Float, colortype::RGBA32Float);

/// Write a raster to a GeoTIFF file.
///
/// Georeferencing comes from `source` (transform, EPSG code, no-data);
/// rotated transforms are written as a ModelTransformation matrix.
pub fn write_geotiff<T, P>(path: P, source: &RasterSource, pixels: &PixelBuffer<T>) -> Result<()>
where
    T: TiffSample,
    P: AsRef<Path>,
{
    if pixels.shape() != (source.height, source.width) {
        return Err(Error::ImageDecode(format!(
            "pixel buffer is {}x{}, metadata says {}x{}",
            pixels.cols(),
            pixels.rows(),
            source.width,
            source.height
        )));
    }

    let band_count = pixels.band_count();
    let mut data = Vec::with_capacity(pixels.len() * band_count);
    for (row, col) in (0..pixels.rows()).flat_map(|r| (0..pixels.cols()).map(move |c| (r, c))) {
        for band in pixels.bands() {
            data.push(band[(row, col)]);
        }
    }

    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(tiff_err)?;
    T::encode(&mut encoder, source, pixels.layout(), &data)
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    source: &RasterSource,
) -> Result<()> {
    let gt = &source.transform;

    if gt.is_rotated() || gt.pixel_height > 0.0 {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::ModelTransformationTag, &matrix[..])
            .map_err(tiff_err)?;
    } else {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])
            .map_err(tiff_err)?;
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])
            .map_err(tiff_err)?;
    }

    let mut geokeys: Vec<u16> = vec![1, 1, 0, 0];
    let mut push_key = |id: u32, value: u32| {
        geokeys.extend_from_slice(&[id as u16, 0, 1, value as u16]);
        geokeys[3] += 1;
    };
    match source.crs.epsg() {
        Some(code) if (4000..5000).contains(&code) => {
            push_key(KEY_MODEL_TYPE, 2); // ModelTypeGeographic
            push_key(KEY_RASTER_TYPE, 1); // RasterPixelIsArea
            push_key(KEY_GEOGRAPHIC_TYPE, code);
        }
        Some(code) if code <= u16::MAX as u32 => {
            push_key(KEY_MODEL_TYPE, 1); // ModelTypeProjected
            push_key(KEY_RASTER_TYPE, 1);
            push_key(KEY_PROJECTED_TYPE, code);
        }
        _ => {
            push_key(KEY_MODEL_TYPE, 1);
            push_key(KEY_RASTER_TYPE, 1);
        }
    }
    dir.write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
        .map_err(tiff_err)?;

    if let Some(nodata) = source.nodata {
        dir.write_tag(Tag::GdalNodata, nodata.to_string().as_str())
            .map_err(tiff_err)?;
    }

    Ok(())
}

fn tiff_err(e: tiff::TiffError) -> Error {
    Error::ImageDecode(format!("TIFF encoder error: {}", e))
}
