//! Band-to-RGBA rendering

use geokmz_core::{Error, PixelBuffer, RasterElement, Result, SampleType};

/// Linear value range mapped onto 0..=255.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchRange {
    /// Value rendered as 0
    pub min: f64,
    /// Value rendered as 255
    pub max: f64,
}

impl StretchRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Map a value into 0..=255, clamping outside the range
    pub fn apply(&self, v: f64) -> u8 {
        let range = self.max - self.min;
        let inv = if range.abs() > f64::EPSILON { 1.0 / range } else { 1.0 };
        (((v - self.min) * inv).clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

/// Detect the value range of the colour bands over opaque pixels.
///
/// All colour bands share one range so relative channel balance survives.
/// An empty or constant range falls back to a unit-wide one.
pub fn auto_range<T: RasterElement>(pixels: &PixelBuffer<T>, alpha: &[u8]) -> StretchRange {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for &b in pixels.layout().color_bands() {
        let Some(band) = pixels.bands().get(b) else {
            continue;
        };
        for (val, &a) in band.iter().zip(alpha) {
            if a == 0 {
                continue;
            }
            if let Some(v) = val.to_f64() {
                if v.is_finite() {
                    min = min.min(v);
                    max = max.max(v);
                }
            }
        }
    }

    if !min.is_finite() || !max.is_finite() {
        min = 0.0;
        max = 1.0;
    } else if (max - min).abs() < f64::EPSILON {
        max = min + 1.0;
    }

    StretchRange::new(min, max)
}

/// Render a pixel buffer to row-major RGBA bytes (`rows * cols * 4`).
///
/// 8-bit data is used as-is; anything wider is stretched with
/// [`auto_range`]. Single-band data is replicated to grey. Pixels whose
/// alpha is zero come out as `[0, 0, 0, 0]`.
pub fn render_rgba<T: RasterElement>(pixels: &PixelBuffer<T>, alpha: &[u8]) -> Result<Vec<u8>> {
    if alpha.len() != pixels.len() {
        return Err(Error::ImageDecode(format!(
            "alpha mask has {} entries for {} pixels",
            alpha.len(),
            pixels.len()
        )));
    }

    let color = pixels.layout().color_bands();
    let bands = color
        .iter()
        .map(|&b| pixels.band(b))
        .collect::<Result<Vec<_>>>()?;

    let stretch = (T::SAMPLE_TYPE != SampleType::U8).then(|| auto_range(pixels, alpha));
    let to_byte = |v: T| -> u8 {
        match (stretch, v.to_f64()) {
            (Some(range), Some(f)) => range.apply(f),
            (None, Some(f)) => f.clamp(0.0, 255.0) as u8,
            _ => 0,
        }
    };

    let cols = pixels.cols();
    let mut rgba = vec![0u8; pixels.len() * 4];
    for (i, px) in rgba.chunks_exact_mut(4).enumerate() {
        let a = alpha[i];
        if a == 0 {
            continue;
        }
        let (row, col) = (i / cols, i % cols);
        match bands.as_slice() {
            [gray] => {
                let g = to_byte(gray[[row, col]]);
                px.copy_from_slice(&[g, g, g, a]);
            }
            [r, g, b, ..] => {
                px.copy_from_slice(&[
                    to_byte(r[[row, col]]),
                    to_byte(g[[row, col]]),
                    to_byte(b[[row, col]]),
                    a,
                ]);
            }
            _ => {}
        }
    }

    Ok(rgba)
}
