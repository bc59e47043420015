//! # Logo Palette Extraction
//!
//! Derives a handful of representative colors from an uploaded logo so the
//! designer can offer primary/accent suggestions.
//!
//! ## Tiers
//!
//! 1. [`MedianCut`]: median-cut quantization on a thumbnail, refined with a
//!    few k-means passes, ordered by how many pixels each color covers.
//! 2. [`fallback_palette`]: average of every 10th pixel on both axes, plus a
//!    darker and a lighter shade and a fixed text color.
//!
//! [`extract_palette`] never fails. Anything that goes wrong in tier 1
//! (nothing opaque, decode failure, an empty result) yields the tier 2
//! palette, which is a pure function of the pixels.

use image::{DynamicImage, GenericImageView};
use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::color::Rgb;

/// Upper bound on colors returned by the preferred extractor.
pub const MAX_COLORS: usize = 6;

/// Fallback sampling stride, in pixels, on both axes.
pub const FALLBACK_STEP: usize = 10;

/// Per-channel shift used for the fallback's darker and lighter shades.
pub const FALLBACK_DELTA: u8 = 30;

/// Fixed dark text color paired with the fallback palette.
pub const TEXT_COLOR: Rgb = Rgb::new(0x1f, 0x29, 0x37);

/// Average used when there is nothing to sample.
const NEUTRAL: Rgb = Rgb::new(0x80, 0x80, 0x80);

/// Pixels with alpha below this are ignored.
const ALPHA_CUTOFF: u8 = 128;

/// Colors closer than this (RGB distance) are merged.
const MERGE_DISTANCE: u32 = 24;

/// Errors from a palette extractor. Never surfaced past [`extract_palette`].
#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("image has no opaque pixels")]
    NoPixels,

    #[error("extractor produced no colors")]
    Empty,

    #[error("could not decode image: {0}")]
    Decode(String),
}

/// A dominant-color extractor.
pub trait ColorExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Up to `max` colors, most prevalent first.
    fn extract(&self, image: &DynamicImage, max: usize) -> Result<Vec<Rgb>, PaletteError>;
}

/// Median-cut quantizer with k-means refinement.
#[derive(Debug, Clone)]
pub struct MedianCut {
    /// Longest thumbnail edge the image is reduced to before quantizing.
    pub thumbnail: u32,
    /// Number of k-means refinement passes.
    pub passes: usize,
}

impl Default for MedianCut {
    fn default() -> Self {
        Self {
            thumbnail: 96,
            passes: 4,
        }
    }
}

impl ColorExtractor for MedianCut {
    fn name(&self) -> &'static str {
        "median-cut"
    }

    fn extract(&self, image: &DynamicImage, max: usize) -> Result<Vec<Rgb>, PaletteError> {
        let (w, h) = image.dimensions();
        let thumb = if w > self.thumbnail || h > self.thumbnail {
            image.thumbnail(self.thumbnail, self.thumbnail).to_rgba8()
        } else {
            image.to_rgba8()
        };
        let pixels: Vec<[u8; 3]> = thumb
            .pixels()
            .filter(|p| p[3] >= ALPHA_CUTOFF)
            .map(|p| [p[0], p[1], p[2]])
            .collect();
        if pixels.is_empty() {
            return Err(PaletteError::NoPixels);
        }

        let seeds = median_cut(pixels.clone(), max.max(1));
        let clusters = refine(&pixels, seeds, self.passes);
        let colors = merge_similar(clusters);
        if colors.is_empty() {
            return Err(PaletteError::Empty);
        }
        Ok(colors.into_iter().take(max).collect())
    }
}

/// Extract a palette with the default extractor. Never fails.
pub fn extract_palette(image: &DynamicImage) -> Vec<Rgb> {
    extract_palette_with(&MedianCut::default(), image)
}

/// Extract a palette with a specific extractor, falling back on any failure.
pub fn extract_palette_with(extractor: &dyn ColorExtractor, image: &DynamicImage) -> Vec<Rgb> {
    match extractor.extract(image, MAX_COLORS) {
        Ok(colors) if !colors.is_empty() => {
            debug!("{} extracted {} colors", extractor.name(), colors.len());
            colors
        }
        Ok(_) => {
            warn!("{} returned no colors, using fallback palette", extractor.name());
            fallback_palette(image)
        }
        Err(e) => {
            warn!("{} failed ({}), using fallback palette", extractor.name(), e);
            fallback_palette(image)
        }
    }
}

/// Decode and extract. Undecodable input gets the neutral fallback palette.
pub fn extract_palette_from_bytes(bytes: &[u8]) -> Vec<Rgb> {
    match image::load_from_memory(bytes) {
        Ok(image) => extract_palette(&image),
        Err(e) => {
            warn!("palette: {}", PaletteError::Decode(e.to_string()));
            palette_around(NEUTRAL)
        }
    }
}

/// Deterministic 4-color palette from the sampled pixel average.
///
/// Order: average, darker, lighter, text color.
pub fn fallback_palette(image: &DynamicImage) -> Vec<Rgb> {
    let (width, height) = image.dimensions();
    let mut sum = [0u64; 3];
    let mut count = 0u64;

    for y in (0..height).step_by(FALLBACK_STEP) {
        for x in (0..width).step_by(FALLBACK_STEP) {
            let p = image.get_pixel(x, y);
            if p[3] < ALPHA_CUTOFF {
                continue;
            }
            sum[0] += p[0] as u64;
            sum[1] += p[1] as u64;
            sum[2] += p[2] as u64;
            count += 1;
        }
    }

    let average = if count == 0 {
        NEUTRAL
    } else {
        let mean = |s: u64| ((s + count / 2) / count) as u8;
        Rgb::new(mean(sum[0]), mean(sum[1]), mean(sum[2]))
    };
    palette_around(average)
}

fn palette_around(average: Rgb) -> Vec<Rgb> {
    vec![
        average,
        average.darken(FALLBACK_DELTA),
        average.lighten(FALLBACK_DELTA),
        TEXT_COLOR,
    ]
}

/// Hex strings, the form the settings and the HTTP API use.
pub fn to_hex_list(palette: &[Rgb]) -> Vec<String> {
    palette.iter().map(|c| c.to_hex()).collect()
}

/// A theme suggestion picked from a palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeChoice {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
}

impl ThemeChoice {
    /// Rotate through `palette` so repeated clicks offer new combinations
    /// without re-running extraction. Returns `None` for an empty palette.
    pub fn cycle(palette: &[Rgb], index: usize) -> Option<Self> {
        if palette.is_empty() {
            return None;
        }
        let n = palette.len();
        let pick = |k: usize| palette[(index + k) % n].to_hex();
        Some(Self {
            primary: pick(0),
            secondary: pick(1),
            accent: pick(2),
        })
    }
}

// ============================================================================
// QUANTIZATION
// ============================================================================

/// A cluster of pixels: summed channels and population.
#[derive(Debug, Clone, Copy, Default)]
struct Cluster {
    sum: [u64; 3],
    count: u64,
}

impl Cluster {
    fn mean(&self) -> Rgb {
        let c = self.count.max(1);
        let m = |s: u64| ((s + c / 2) / c) as u8;
        Rgb::new(m(self.sum[0]), m(self.sum[1]), m(self.sum[2]))
    }

    fn add(&mut self, p: &[u8; 3]) {
        self.sum[0] += p[0] as u64;
        self.sum[1] += p[1] as u64;
        self.sum[2] += p[2] as u64;
        self.count += 1;
    }

    fn merge(&mut self, other: &Cluster) {
        for i in 0..3 {
            self.sum[i] += other.sum[i];
        }
        self.count += other.count;
    }
}

/// Split the pixel set into up to `target` boxes along their widest channel.
fn median_cut(pixels: Vec<[u8; 3]>, target: usize) -> Vec<Rgb> {
    let mut boxes: Vec<Vec<[u8; 3]>> = vec![pixels];

    while boxes.len() < target {
        let widest = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.len() > 1)
            .map(|(i, b)| (i, channel_range(b)))
            .filter(|(_, (_, range))| *range > 0)
            .max_by_key(|(i, (_, range))| (*range, std::cmp::Reverse(*i)));

        let Some((index, (channel, _))) = widest else {
            break;
        };

        let mut b = boxes.swap_remove(index);
        b.sort_unstable_by_key(|p| (p[channel], p[0], p[1], p[2]));
        let upper = b.split_off(b.len() / 2);
        boxes.push(b);
        boxes.push(upper);
    }

    boxes
        .iter()
        .map(|b| {
            let mut c = Cluster::default();
            b.iter().for_each(|p| c.add(p));
            c.mean()
        })
        .collect()
}

/// (channel index, max - min) of the widest channel.
fn channel_range(pixels: &[[u8; 3]]) -> (usize, u8) {
    (0..3)
        .map(|ch| {
            let (lo, hi) = pixels
                .iter()
                .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[ch]), hi.max(p[ch])));
            (ch, hi.saturating_sub(lo))
        })
        .max_by_key(|&(ch, range)| (range, std::cmp::Reverse(ch)))
        .unwrap_or((0, 0))
}

fn nearest(centroids: &[Rgb], p: &[u8; 3]) -> usize {
    let color = Rgb::new(p[0], p[1], p[2]);
    centroids
        .iter()
        .enumerate()
        .min_by_key(|(i, c)| (c.distance_sq(color), *i))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Lloyd iterations seeded with the median-cut colors.
///
/// Assignment runs in parallel; the integer sums make the result independent
/// of how rayon splits the work.
fn refine(pixels: &[[u8; 3]], seeds: Vec<Rgb>, passes: usize) -> Vec<Cluster> {
    let mut centroids = seeds;
    let mut clusters = Vec::new();

    for _ in 0..passes.max(1) {
        let k = centroids.len();
        clusters = pixels
            .par_iter()
            .fold(
                || vec![Cluster::default(); k],
                |mut acc, p| {
                    acc[nearest(&centroids, p)].add(p);
                    acc
                },
            )
            .reduce(
                || vec![Cluster::default(); k],
                |mut a, b| {
                    a.iter_mut().zip(b.iter()).for_each(|(x, y)| x.merge(y));
                    a
                },
            );
        clusters.retain(|c| c.count > 0);
        centroids = clusters.iter().map(Cluster::mean).collect();
    }

    clusters
}

/// Order clusters by population and fold near-duplicates into their
/// more prevalent neighbour.
fn merge_similar(mut clusters: Vec<Cluster>) -> Vec<Rgb> {
    clusters.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.mean().to_hex().cmp(&b.mean().to_hex()))
    });

    let mut kept: Vec<Cluster> = Vec::new();
    for c in clusters {
        let mean = c.mean();
        match kept
            .iter_mut()
            .find(|k| k.mean().distance_sq(mean) < MERGE_DISTANCE * MERGE_DISTANCE)
        {
            Some(k) => k.merge(&c),
            None => kept.push(c),
        }
    }
    kept.sort_by(|a, b| b.count.cmp(&a.count));
    kept.iter().map(Cluster::mean).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn two_tone(width: u32, height: u32, split: u32) -> DynamicImage {
        let img = RgbaImage::from_fn(width, height, |x, _| {
            if x < split {
                Rgba([200, 30, 30, 255])
            } else {
                Rgba([20, 40, 160, 255])
            }
        });
        DynamicImage::ImageRgba8(img)
    }

    struct Broken;

    impl ColorExtractor for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn extract(&self, _: &DynamicImage, _: usize) -> Result<Vec<Rgb>, PaletteError> {
            Err(PaletteError::Empty)
        }
    }

    #[test]
    fn test_dominant_color_first() {
        let palette = extract_palette(&two_tone(60, 40, 42));
        assert!(!palette.is_empty() && palette.len() <= MAX_COLORS);
        assert_eq!(palette[0], Rgb::new(200, 30, 30));
        assert!(palette.contains(&Rgb::new(20, 40, 160)));
    }

    #[test]
    fn test_solid_image_single_color() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(30, 30, Rgba([5, 150, 105, 255])));
        assert_eq!(extract_palette(&img), vec![Rgb::new(5, 150, 105)]);
    }

    #[test]
    fn test_transparent_image_falls_back() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 0])));
        let palette = extract_palette(&img);
        assert_eq!(palette, vec![NEUTRAL, NEUTRAL.darken(30), NEUTRAL.lighten(30), TEXT_COLOR]);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let img = two_tone(64, 64, 20);
        let first = extract_palette_with(&Broken, &img);
        let second = extract_palette_with(&Broken, &img);
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
        assert_eq!(first[3], TEXT_COLOR);
    }

    #[test]
    fn test_fallback_average_and_shades() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(25, 25, Rgba([100, 240, 10, 255])));
        let palette = fallback_palette(&img);
        assert_eq!(
            palette,
            vec![
                Rgb::new(100, 240, 10),
                Rgb::new(70, 210, 0),
                Rgb::new(130, 255, 40),
                TEXT_COLOR,
            ]
        );
    }

    #[test]
    fn test_undecodable_bytes() {
        let palette = extract_palette_from_bytes(b"definitely not a png");
        assert_eq!(palette.len(), 4);
    }

    #[test]
    fn test_theme_cycle_rotates() {
        let palette = vec![Rgb::new(1, 1, 1), Rgb::new(2, 2, 2), Rgb::new(3, 3, 3)];
        let a = ThemeChoice::cycle(&palette, 0).unwrap();
        let b = ThemeChoice::cycle(&palette, 1).unwrap();
        assert_eq!(a.primary, "#010101");
        assert_eq!(a.accent, "#030303");
        assert_eq!(b.primary, "#020202");
        assert_eq!(b.accent, "#010101");
        assert_eq!(ThemeChoice::cycle(&palette, 3), Some(a));
        assert!(ThemeChoice::cycle(&[], 0).is_none());
    }
}
