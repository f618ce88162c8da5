//! Alpha mask derivation

use geokmz_core::{Error, PixelBuffer, RasterElement, Result};

/// Build a per-pixel 8-bit alpha mask (row-major, one byte per pixel).
///
/// A pixel is fully transparent when every colour band equals `nodata`
/// or any colour sample is NaN. Otherwise the alpha band, if the layout
/// has one, supplies the value; without an alpha band the pixel is opaque.
///
/// Alpha samples are scaled to 0..=255 from the smallest full scale that
/// covers them: 1.0 for floats that never exceed it, then 255, then 65535.
pub fn derive_alpha<T: RasterElement>(
    pixels: &PixelBuffer<T>,
    nodata: Option<f64>,
) -> Result<Vec<u8>> {
    let layout = pixels.layout();
    let color = layout.color_bands();
    if color.iter().any(|&b| b >= pixels.band_count()) {
        return Err(Error::ImageDecode(format!(
            "layout {:?} needs {} colour bands, buffer has {}",
            layout,
            color.len(),
            pixels.band_count()
        )));
    }

    let mut alpha = match layout.alpha_band() {
        Some(idx) => scale_alpha_band(pixels, idx)?,
        None => vec![255u8; pixels.len()],
    };

    let bands = pixels.bands();
    let cols = pixels.cols();
    for (i, a) in alpha.iter_mut().enumerate() {
        if *a == 0 {
            continue;
        }
        let (row, col) = (i / cols, i % cols);
        let mut all_nodata = nodata.is_some();
        for &b in color {
            let v = bands[b][[row, col]];
            if v.to_f64().map_or(true, f64::is_nan) {
                all_nodata = true;
                break;
            }
            if !v.is_nodata(nodata) {
                all_nodata = false;
            }
        }
        if all_nodata {
            *a = 0;
        }
    }

    Ok(alpha)
}

fn scale_alpha_band<T: RasterElement>(pixels: &PixelBuffer<T>, idx: usize) -> Result<Vec<u8>> {
    let band = pixels.band(idx)?;
    let max = band
        .iter()
        .filter_map(|v| v.to_f64())
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);

    let full_scale = if T::SAMPLE_TYPE.is_float() && max <= 1.0 {
        1.0
    } else if max <= 255.0 {
        255.0
    } else if max <= 65535.0 {
        65535.0
    } else {
        max
    };

    Ok(band
        .iter()
        .map(|v| match v.to_f64() {
            Some(a) if a.is_finite() => ((a / full_scale).clamp(0.0, 1.0) * 255.0).round() as u8,
            _ => 0,
        })
        .collect())
}
