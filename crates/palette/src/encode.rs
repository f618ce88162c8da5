//! Indexed PNG encoding

use geokmz_core::{Error, Result};
use png::{BitDepth, ColorType, Compression, Encoder, FilterType};

use crate::quantize::IndexedImage;
use crate::PngCompression;

/// An encoded overlay image.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    /// Complete PNG file contents
    pub bytes: Vec<u8>,
    pub width: usize,
    pub height: usize,
    /// Number of palette entries written to `PLTE`
    pub palette_len: usize,
    /// Whether a `tRNS` chunk marks any entry as non-opaque
    pub has_transparency: bool,
}

impl EncodedImage {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn png_err(e: impl std::fmt::Display) -> Error {
    Error::ImageDecode(format!("PNG encoding failed: {}", e))
}

/// Encode an indexed image as an 8-bit palette PNG.
///
/// Per-entry alpha goes into `tRNS`, with trailing opaque entries
/// trimmed; the chunk is omitted when every entry is opaque.
pub fn encode_indexed_png(image: &IndexedImage, compression: PngCompression) -> Result<EncodedImage> {
    if image.palette.is_empty() || image.palette.len() > crate::MAX_PALETTE_COLORS {
        return Err(Error::ImageDecode(format!(
            "palette must hold 1..={} entries, got {}",
            crate::MAX_PALETTE_COLORS,
            image.palette.len()
        )));
    }
    if image.indices.len() != image.width * image.height {
        return Err(Error::ImageDecode(format!(
            "expected {} indices, got {}",
            image.width * image.height,
            image.indices.len()
        )));
    }
    let width = u32::try_from(image.width).map_err(png_err)?;
    let height = u32::try_from(image.height).map_err(png_err)?;

    let plte: Vec<u8> = image.palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    let mut trns: Vec<u8> = image.palette.iter().map(|c| c[3]).collect();
    while trns.last() == Some(&255) {
        trns.pop();
    }
    let has_transparency = !trns.is_empty();

    let mut bytes = Vec::new();
    {
        let mut encoder = Encoder::new(&mut bytes, width, height);
        encoder.set_color(ColorType::Indexed);
        encoder.set_depth(BitDepth::Eight);
        encoder.set_palette(plte);
        if has_transparency {
            encoder.set_trns(trns);
        }
        encoder.set_compression(match compression {
            PngCompression::Fast => Compression::Fast,
            PngCompression::Default => Compression::Default,
            PngCompression::Best => Compression::Best,
        });
        encoder.set_filter(FilterType::Paeth);
        encoder.set_adaptive_filter(png::AdaptiveFilterType::Adaptive);

        let mut writer = encoder.write_header().map_err(png_err)?;
        writer.write_image_data(&image.indices).map_err(png_err)?;
        writer.finish().map_err(png_err)?;
    }

    Ok(EncodedImage {
        bytes,
        width: image.width,
        height: image.height,
        palette_len: image.palette.len(),
        has_transparency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> (png::OutputInfo, Vec<u8>, png::Info<'static>) {
        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(png::Transformations::IDENTITY);
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf).unwrap();
        buf.truncate(frame.buffer_size());
        let info = reader.info().clone();
        (frame, buf, info)
    }

    #[test]
    fn writes_palette_and_trns() {
        let image = IndexedImage {
            width: 2,
            height: 1,
            palette: vec![[0, 0, 0, 0], [10, 20, 30, 255]],
            indices: vec![0, 1],
            transparent_index: Some(0),
        };
        let encoded = encode_indexed_png(&image, PngCompression::Best).unwrap();
        assert!(encoded.has_transparency);
        assert_eq!(&encoded.bytes[..8], b"\x89PNG\r\n\x1a\n");

        let (frame, data, info) = decode(&encoded.bytes);
        assert_eq!(frame.color_type, ColorType::Indexed);
        assert_eq!(frame.bit_depth, BitDepth::Eight);
        assert_eq!(data, vec![0, 1]);
        assert_eq!(info.palette.as_deref(), Some(&[0, 0, 0, 10, 20, 30][..]));
        assert_eq!(info.trns.as_deref(), Some(&[0][..]));
    }

    #[test]
    fn opaque_palette_has_no_trns() {
        let image = IndexedImage {
            width: 1,
            height: 1,
            palette: vec![[1, 2, 3, 255]],
            indices: vec![0],
            transparent_index: None,
        };
        let encoded = encode_indexed_png(&image, PngCompression::Fast).unwrap();
        assert!(!encoded.has_transparency);
        let (_, _, info) = decode(&encoded.bytes);
        assert!(info.trns.is_none());
    }

    #[test]
    fn index_count_mismatch() {
        let image = IndexedImage {
            width: 2,
            height: 2,
            palette: vec![[1, 2, 3, 255]],
            indices: vec![0],
            transparent_index: None,
        };
        assert!(encode_indexed_png(&image, PngCompression::Best).is_err());
    }
}
