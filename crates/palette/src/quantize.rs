//! Adaptive palette reduction (weighted median cut)

use std::collections::HashMap;

use geokmz_core::{Error, Result};

use crate::PaletteOptions;

/// Perceptual channel weights (R, G, B, A) for box selection and matching.
const CHANNEL_WEIGHTS: [f64; 4] = [0.299, 0.587, 0.114, 0.587];

/// Palette-indexed image ready for PNG encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedImage {
    pub width: usize,
    pub height: usize,
    /// RGBA palette entries, at most `max_colors`
    pub palette: Vec<[u8; 4]>,
    /// One palette index per pixel, row-major
    pub indices: Vec<u8>,
    /// Entry reserved for fully transparent pixels, when any exist
    pub transparent_index: Option<u8>,
}

impl IndexedImage {
    /// Resolve the RGBA colour of one pixel
    pub fn color_at(&self, col: usize, row: usize) -> Option<[u8; 4]> {
        let idx = *self.indices.get(row * self.width + col)?;
        self.palette.get(idx as usize).copied()
    }
}

/// Reduce RGBA pixels to at most `options.max_colors` palette entries.
///
/// Fully transparent pixels all map to a single reserved entry at index 0
/// and never contribute to the colour histogram. When the image already
/// has few enough distinct colours the palette is exact and no dithering
/// happens; otherwise a weighted median cut builds the palette and
/// Floyd–Steinberg diffusion (if enabled) spreads the error across opaque
/// neighbours only.
pub fn quantize(
    rgba: &[u8],
    width: usize,
    height: usize,
    options: &PaletteOptions,
) -> Result<IndexedImage> {
    options.validate()?;
    if width == 0 || height == 0 {
        return Err(Error::ImageDecode(format!("empty image {}x{}", width, height)));
    }
    if rgba.len() != width * height * 4 {
        return Err(Error::ImageDecode(format!(
            "expected {} RGBA bytes for {}x{}, got {}",
            width * height * 4,
            width,
            height,
            rgba.len()
        )));
    }

    let pixels: Vec<[u8; 4]> = rgba
        .chunks_exact(4)
        .map(|p| [p[0], p[1], p[2], p[3]])
        .collect();

    let has_transparency = pixels.iter().any(|p| p[3] == 0);
    let histogram = build_histogram(&pixels);
    let budget = options.max_colors - usize::from(has_transparency);

    let mut palette = Vec::with_capacity(options.max_colors);
    if has_transparency {
        palette.push([0, 0, 0, 0]);
    }
    let offset = palette.len();
    let transparent_index = has_transparency.then_some(0u8);

    let indices = if histogram.len() <= budget {
        let lookup: HashMap<[u8; 4], u8> = histogram
            .iter()
            .enumerate()
            .map(|(i, &(color, _))| (color, (i + offset) as u8))
            .collect();
        palette.extend(histogram.iter().map(|&(color, _)| color));
        pixels
            .iter()
            .map(|p| if p[3] == 0 { 0 } else { lookup.get(p).copied().unwrap_or(0) })
            .collect()
    } else {
        palette.extend(median_cut(histogram, budget));
        let mut matcher = Matcher::new(&palette, offset);
        if options.dither {
            dither(&pixels, width, height, &mut matcher)
        } else {
            pixels
                .iter()
                .map(|p| if p[3] == 0 { 0 } else { matcher.nearest(*p) })
                .collect()
        }
    };

    Ok(IndexedImage {
        width,
        height,
        palette,
        indices,
        transparent_index,
    })
}

/// Distinct visible colours with their pixel counts, sorted by colour.
fn build_histogram(pixels: &[[u8; 4]]) -> Vec<([u8; 4], u32)> {
    let mut counts: HashMap<[u8; 4], u32> = HashMap::new();
    for p in pixels.iter().filter(|p| p[3] > 0) {
        *counts.entry(*p).or_insert(0) += 1;
    }
    let mut histogram: Vec<_> = counts.into_iter().collect();
    histogram.sort_unstable_by_key(|&(color, _)| color);
    histogram
}

struct ColorBox {
    colors: Vec<([u8; 4], u32)>,
    population: u64,
}

impl ColorBox {
    fn new(colors: Vec<([u8; 4], u32)>) -> Self {
        let population = colors.iter().map(|&(_, n)| u64::from(n)).sum();
        Self { colors, population }
    }

    /// Channel with the widest weighted extent, and that extent
    fn widest_channel(&self) -> (usize, f64) {
        (0..4)
            .map(|ch| {
                let (lo, hi) = self
                    .colors
                    .iter()
                    .fold((u8::MAX, u8::MIN), |(lo, hi), (c, _)| (lo.min(c[ch]), hi.max(c[ch])));
                (ch, f64::from(hi.saturating_sub(lo)) * CHANNEL_WEIGHTS[ch])
            })
            .fold((0, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best })
    }

    fn score(&self) -> f64 {
        if self.colors.len() < 2 {
            return -1.0;
        }
        let (_, extent) = self.widest_channel();
        extent * extent * self.population as f64
    }

    fn split(mut self) -> (ColorBox, ColorBox) {
        let (ch, _) = self.widest_channel();
        self.colors.sort_unstable_by_key(|&(c, _)| (c[ch], c));

        let half = self.population / 2;
        let mut cumulative = 0u64;
        let mut cut = self.colors.len() / 2;
        for (i, &(_, n)) in self.colors.iter().enumerate() {
            cumulative += u64::from(n);
            if cumulative >= half {
                cut = i + 1;
                break;
            }
        }
        let cut = cut.clamp(1, self.colors.len() - 1);
        let upper = self.colors.split_off(cut);
        (ColorBox::new(self.colors), ColorBox::new(upper))
    }

    /// Count-weighted mean colour
    fn average(&self) -> [u8; 4] {
        let mut sums = [0u64; 4];
        for &(c, n) in &self.colors {
            for ch in 0..4 {
                sums[ch] += u64::from(c[ch]) * u64::from(n);
            }
        }
        let pop = self.population.max(1);
        let mut out = [0u8; 4];
        for ch in 0..4 {
            out[ch] = ((sums[ch] + pop / 2) / pop) as u8;
        }
        out[3] = out[3].max(1);
        out
    }
}

fn median_cut(histogram: Vec<([u8; 4], u32)>, budget: usize) -> Vec<[u8; 4]> {
    let mut boxes = vec![ColorBox::new(histogram)];
    while boxes.len() < budget {
        let Some((best, score)) = boxes
            .iter()
            .map(ColorBox::score)
            .enumerate()
            .fold(None, |acc: Option<(usize, f64)>, (i, s)| match acc {
                Some((_, best)) if best >= s => acc,
                _ => Some((i, s)),
            })
        else {
            break;
        };
        if score < 0.0 {
            break;
        }
        let (lo, hi) = boxes.swap_remove(best).split();
        boxes.push(lo);
        boxes.push(hi);
    }

    let mut palette: Vec<[u8; 4]> = boxes.iter().map(ColorBox::average).collect();
    palette.sort_unstable();
    palette.dedup();
    palette
}

/// Nearest-entry search over the opaque part of a palette, memoised.
struct Matcher<'a> {
    palette: &'a [[u8; 4]],
    offset: usize,
    cache: HashMap<[u8; 4], u8>,
}

impl<'a> Matcher<'a> {
    fn new(palette: &'a [[u8; 4]], offset: usize) -> Self {
        Self {
            palette,
            offset,
            cache: HashMap::new(),
        }
    }

    fn nearest(&mut self, color: [u8; 4]) -> u8 {
        if let Some(&idx) = self.cache.get(&color) {
            return idx;
        }
        let mut best = self.offset;
        let mut best_dist = f64::INFINITY;
        for (i, entry) in self.palette.iter().enumerate().skip(self.offset) {
            let dist: f64 = (0..4)
                .map(|ch| {
                    let d = f64::from(color[ch]) - f64::from(entry[ch]);
                    CHANNEL_WEIGHTS[ch] * d * d
                })
                .sum();
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        let idx = best as u8;
        self.cache.insert(color, idx);
        idx
    }
}

/// Floyd–Steinberg error diffusion restricted to opaque pixels.
fn dither(pixels: &[[u8; 4]], width: usize, height: usize, matcher: &mut Matcher) -> Vec<u8> {
    let mut work: Vec<[f64; 4]> = pixels
        .iter()
        .map(|p| [p[0], p[1], p[2], p[3]].map(f64::from))
        .collect();
    let mut indices = vec![0u8; pixels.len()];

    for row in 0..height {
        for col in 0..width {
            let i = row * width + col;
            if pixels[i][3] == 0 {
                continue;
            }
            let wanted = work[i];
            let mut color = wanted.map(|v| v.round().clamp(0.0, 255.0) as u8);
            color[3] = color[3].max(1);

            let idx = matcher.nearest(color);
            indices[i] = idx;
            let chosen = matcher.palette[idx as usize];

            let err: [f64; 4] = std::array::from_fn(|ch| wanted[ch] - f64::from(chosen[ch]));
            let mut spread = |c: isize, r: usize, weight: f64| {
                if c < 0 || c as usize >= width || r >= height {
                    return;
                }
                let j = r * width + c as usize;
                if pixels[j][3] == 0 {
                    return;
                }
                for ch in 0..4 {
                    work[j][ch] += err[ch] * weight;
                }
            };
            let c = col as isize;
            spread(c + 1, row, 7.0 / 16.0);
            spread(c - 1, row + 1, 3.0 / 16.0);
            spread(c, row + 1, 5.0 / 16.0);
            spread(c + 1, row + 1, 1.0 / 16.0);
        }
    }

    indices
}
