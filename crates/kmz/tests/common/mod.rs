#![allow(dead_code)]

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use geokmz_core::io::{write_geotiff, TiffSample};
use geokmz_core::{BandLayout, GeoTransform, PixelBuffer, RasterSource, SampleType, CRS};
use ndarray::Array2;

pub fn source(width: usize, height: usize, crs: CRS, transform: GeoTransform) -> RasterSource {
    RasterSource {
        path: PathBuf::from("fixture.tif"),
        width,
        height,
        layout: BandLayout::Gray,
        sample_type: SampleType::U16,
        crs,
        transform,
        nodata: None,
    }
}

/// Single-band u16 gradient with plenty of distinct values
pub fn gradient(width: usize, height: usize) -> PixelBuffer<u16> {
    let band = Array2::from_shape_fn((height, width), |(r, c)| (r * 37 + c * 11) as u16);
    PixelBuffer::from_bands(vec![band], BandLayout::Gray).unwrap()
}

pub fn write_fixture<T: TiffSample>(path: &Path, meta: &RasterSource, pixels: &PixelBuffer<T>) {
    let mut meta = meta.clone();
    meta.sample_type = T::SAMPLE_TYPE;
    write_geotiff(path, &meta, pixels).unwrap();
}

pub struct Kmz {
    pub entries: Vec<String>,
    pub kml: String,
    pub png_name: String,
    pub png: Vec<u8>,
}

pub fn open_kmz(path: &Path) -> Kmz {
    let mut zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let entries: Vec<String> = zip.file_names().map(str::to_string).collect();

    let mut kml = String::new();
    zip.by_name("doc.kml").unwrap().read_to_string(&mut kml).unwrap();

    let png_name = entries.iter().find(|n| n.ends_with(".png")).unwrap().clone();
    let mut png = Vec::new();
    zip.by_name(&png_name).unwrap().read_to_end(&mut png).unwrap();

    Kmz {
        entries,
        kml,
        png_name,
        png,
    }
}

pub struct DecodedPng {
    pub width: u32,
    pub height: u32,
    pub color_type: png::ColorType,
    pub indices: Vec<u8>,
    pub palette: Vec<[u8; 4]>,
}

impl DecodedPng {
    pub fn alpha(&self, i: usize) -> u8 {
        self.palette[self.indices[i] as usize][3]
    }
}

pub fn decode_png(bytes: &[u8]) -> DecodedPng {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info().unwrap();
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).unwrap();
    buf.truncate(frame.buffer_size());

    let info = reader.info();
    let plte = info.palette.as_deref().map(<[u8]>::to_vec).unwrap_or_default();
    let trns = info.trns.as_deref().map(<[u8]>::to_vec).unwrap_or_default();
    let palette = plte
        .chunks_exact(3)
        .enumerate()
        .map(|(i, c)| [c[0], c[1], c[2], trns.get(i).copied().unwrap_or(255)])
        .collect();

    DecodedPng {
        width: frame.width,
        height: frame.height,
        color_type: frame.color_type,
        indices: buf,
        palette,
    }
}

/// Text between the first `<tag>` and `</tag>`
pub fn tag_text<'a>(kml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = kml.find(&open)? + open.len();
    let end = kml[start..].find(&close)? + start;
    Some(&kml[start..end])
}

pub fn tag_f64(kml: &str, tag: &str) -> f64 {
    tag_text(kml, tag).unwrap().trim().parse().unwrap()
}

/// `lon,lat,alt` tuples of a `gx:LatLonQuad`
pub fn quad_coordinates(kml: &str) -> Vec<(f64, f64)> {
    let quad = tag_text(kml, "gx:LatLonQuad").unwrap();
    tag_text(quad, "coordinates")
        .unwrap()
        .split_whitespace()
        .map(|t| {
            let parts: Vec<f64> = t.split(',').map(|v| v.parse().unwrap()).collect();
            assert_eq!(parts.len(), 3);
            (parts[0], parts[1])
        })
        .collect()
}
