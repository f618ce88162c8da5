//! # geokmz Palette
//!
//! Turns decoded raster bands into a compact, palette-indexed PNG suitable
//! for a ground overlay.
//!
//! The stages run in a fixed order so that masked pixels never reach the
//! palette:
//! 1. [`derive_alpha`]: alpha mask from an alpha band and/or the no-data value
//! 2. [`render_rgba`]: 8-bit RGBA, stretching wider sample types over opaque pixels
//! 3. [`quantize`]: adaptive median-cut palette of at most `max_colors` entries
//! 4. [`encode_indexed_png`]: 8-bit indexed PNG with a `tRNS` chunk
//!
//! ## Usage
//!
//! ```ignore
//! use geokmz_palette::{encode_image, PaletteOptions};
//!
//! let image = encode_image(&pixels, source.nodata, &PaletteOptions::default())?;
//! std::fs::write("overlay.png", &image.bytes)?;
//! ```

mod alpha;
mod encode;
mod quantize;
mod render;

pub use alpha::derive_alpha;
pub use encode::{encode_indexed_png, EncodedImage};
pub use quantize::{quantize, IndexedImage};
pub use render::{auto_range, render_rgba, StretchRange};

use geokmz_core::{Error, PixelBuffer, RasterElement, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest palette an 8-bit indexed PNG can hold.
pub const MAX_PALETTE_COLORS: usize = 256;

/// Deflate effort for the PNG encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PngCompression {
    Fast,
    Default,
    Best,
}

/// Parameters for palette reduction and encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteOptions {
    /// Upper bound on palette entries, transparent entry included (2..=256)
    pub max_colors: usize,
    /// Floyd–Steinberg error diffusion when the palette is lossy
    pub dither: bool,
    /// PNG deflate effort
    pub compression: PngCompression,
}

impl Default for PaletteOptions {
    fn default() -> Self {
        Self {
            max_colors: MAX_PALETTE_COLORS,
            dither: true,
            compression: PngCompression::Best,
        }
    }
}

impl PaletteOptions {
    /// Options with a different palette size
    pub fn with_max_colors(max_colors: usize) -> Self {
        Self {
            max_colors,
            ..Self::default()
        }
    }

    /// Reject palette sizes an indexed PNG cannot represent
    pub fn validate(&self) -> Result<()> {
        if !(2..=MAX_PALETTE_COLORS).contains(&self.max_colors) {
            return Err(Error::InvalidParameter {
                name: "max_colors",
                value: self.max_colors.to_string(),
                reason: format!("must be between 2 and {}", MAX_PALETTE_COLORS),
            });
        }
        Ok(())
    }
}

/// Run the whole mask → render → quantize → encode chain for one raster.
pub fn encode_image<T: RasterElement>(
    pixels: &PixelBuffer<T>,
    nodata: Option<f64>,
    options: &PaletteOptions,
) -> Result<EncodedImage> {
    options.validate()?;
    let (rows, cols) = pixels.shape();

    let alpha = derive_alpha(pixels, nodata)?;
    let transparent = alpha.iter().filter(|&&a| a == 0).count();
    debug!("Alpha mask: {} of {} pixels transparent", transparent, alpha.len());

    let rgba = render_rgba(pixels, &alpha)?;
    let indexed = quantize(&rgba, cols, rows, options)?;
    debug!(
        "Quantized to {} palette entries (transparent index: {:?})",
        indexed.palette.len(),
        indexed.transparent_index
    );

    encode_indexed_png(&indexed, options.compression)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let opts = PaletteOptions::default();
        assert_eq!(opts.max_colors, 256);
        assert!(opts.dither);
        assert_eq!(opts.compression, PngCompression::Best);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn palette_size_bounds() {
        assert!(PaletteOptions::with_max_colors(2).validate().is_ok());
        assert!(matches!(
            PaletteOptions::with_max_colors(1).validate(),
            Err(Error::InvalidParameter { name: "max_colors", .. })
        ));
        assert!(PaletteOptions::with_max_colors(257).validate().is_err());
    }
}
