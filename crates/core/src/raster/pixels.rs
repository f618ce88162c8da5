//! Decoded band data

use crate::error::{Error, Result};
use crate::raster::{BandLayout, RasterElement};
use ndarray::{Array2, ArrayView2};

/// Decoded pixel data for one raster, one 2D array per band.
///
/// All bands share the same `(rows, cols)` shape; the constructors refuse
/// anything else.
///
/// # Example
///
/// ```ignore
/// use geokmz_core::PixelBuffer;
/// use geokmz_core::BandLayout;
///
/// let pixels = PixelBuffer::from_interleaved(vec![0u8; 2 * 3 * 3], 3, 2, BandLayout::Rgb)?;
/// assert_eq!(pixels.shape(), (2, 3));
/// ```
#[derive(Debug, Clone)]
pub struct PixelBuffer<T: RasterElement> {
    /// Band data stored in row-major order (row, col)
    bands: Vec<Array2<T>>,
    /// Colour interpretation of the bands
    layout: BandLayout,
}

impl<T: RasterElement> PixelBuffer<T> {
    /// Create a buffer from already separated bands
    pub fn from_bands(bands: Vec<Array2<T>>, layout: BandLayout) -> Result<Self> {
        let first = bands
            .first()
            .ok_or_else(|| Error::ImageDecode("raster has no bands".into()))?;
        let shape = first.dim();

        if shape.0 == 0 || shape.1 == 0 {
            return Err(Error::ImageDecode(format!(
                "raster has zero-sized bands: {}x{}",
                shape.1, shape.0
            )));
        }
        if let Some(bad) = bands.iter().position(|b| b.dim() != shape) {
            let (rows, cols) = bands[bad].dim();
            return Err(Error::ImageDecode(format!(
                "band {} is {}x{}, expected {}x{}",
                bad + 1,
                cols,
                rows,
                shape.1,
                shape.0
            )));
        }
        if layout.band_count() != bands.len() {
            return Err(Error::ImageDecode(format!(
                "layout {:?} expects {} bands, found {}",
                layout,
                layout.band_count(),
                bands.len()
            )));
        }

        Ok(Self { bands, layout })
    }

    /// Create a buffer from pixel-interleaved samples (chunky TIFF layout)
    pub fn from_interleaved(
        samples: Vec<T>,
        cols: usize,
        rows: usize,
        layout: BandLayout,
    ) -> Result<Self> {
        let band_count = layout.band_count();
        if band_count == 0 {
            return Err(Error::ImageDecode("raster has no bands".into()));
        }
        let expected = rows * cols * band_count;
        if samples.len() != expected {
            return Err(Error::ImageDecode(format!(
                "expected {} samples for {}x{}x{}, got {}",
                expected,
                cols,
                rows,
                band_count,
                samples.len()
            )));
        }

        let bands = if band_count == 1 {
            vec![Array2::from_shape_vec((rows, cols), samples)
                .map_err(|e| Error::ImageDecode(e.to_string()))?]
        } else {
            (0..band_count)
                .map(|b| {
                    let band: Vec<T> = samples.iter().skip(b).step_by(band_count).copied().collect();
                    Array2::from_shape_vec((rows, cols), band)
                        .map_err(|e| Error::ImageDecode(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?
        };

        Self::from_bands(bands, layout)
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.bands[0].nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.bands[0].ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].dim()
    }

    /// Pixels per band
    pub fn len(&self) -> usize {
        self.bands[0].len()
    }

    /// Always false: zero-sized buffers cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.bands[0].is_empty()
    }

    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Colour interpretation of the bands
    pub fn layout(&self) -> BandLayout {
        self.layout
    }

    // Data access

    /// View of one band
    pub fn band(&self, index: usize) -> Result<ArrayView2<'_, T>> {
        self.bands
            .get(index)
            .map(|b| b.view())
            .ok_or_else(|| Error::ImageDecode(format!("band {} out of range", index + 1)))
    }

    /// All bands
    pub fn bands(&self) -> &[Array2<T>] {
        &self.bands
    }

    /// Mutable access to all bands
    pub fn bands_mut(&mut self) -> &mut [Array2<T>] {
        &mut self.bands
    }

    /// Sample at (band, row, col)
    pub fn get(&self, band: usize, row: usize, col: usize) -> Option<T> {
        self.bands.get(band)?.get((row, col)).copied()
    }

    /// Consume the buffer and return the band arrays
    pub fn into_bands(self) -> Vec<Array2<T>> {
        self.bands
    }
}
