//! Pixel accumulation, row blocks and critical pixel detection.

use octa_core::sampling::gaussian;
use octa_core::Color;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Running-mean color accumulator.
///
/// `sum` holds the channel sums of `samples` color samples. A primary
/// pixel has one sample; antialiasing adds more without rescaling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    pub sum: Color,
    pub samples: u32,
}

impl Pixel {
    /// No samples yet.
    pub const EMPTY: Pixel = Pixel {
        sum: Color::ZERO,
        samples: 0,
    };

    /// A pixel holding one sample.
    pub fn new(color: Color) -> Self {
        Self {
            sum: color,
            samples: 1,
        }
    }

    pub fn add_sample(&mut self, color: Color) {
        self.sum += color;
        self.samples += 1;
    }

    /// Fold in every sample of `other`.
    pub fn merge(&mut self, other: &Pixel) {
        self.sum += other.sum;
        self.samples += other.samples;
    }

    /// Mean color, black when empty.
    pub fn color(&self) -> Color {
        if self.samples == 0 {
            Color::ZERO
        } else {
            self.sum / self.samples as f64
        }
    }

    pub fn to_rgb8(&self) -> [u8; 3] {
        let c = self.color();
        [to_byte(c.x), to_byte(c.y), to_byte(c.z)]
    }
}

/// Scale to 0-255, truncating and clamping.
#[inline]
pub fn to_byte(c: f64) -> u8 {
    (c * 255.0).clamp(0.0, 255.0) as u8
}

/// A contiguous run of full-width rows, row-major.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowBlock {
    pub y_offset: u32,
    pub width: u32,
    pub pixels: Vec<Pixel>,
}

impl RowBlock {
    pub fn new(y_offset: u32, width: u32, rows: u32, fill: Pixel) -> Self {
        Self {
            y_offset,
            width,
            pixels: vec![fill; width as usize * rows as usize],
        }
    }

    pub fn rows(&self) -> u32 {
        if self.width == 0 {
            0
        } else {
            (self.pixels.len() / self.width as usize) as u32
        }
    }

    /// Pixel at column `x` of block-local row `row`.
    pub fn get_mut(&mut self, x: u32, row: u32) -> &mut Pixel {
        &mut self.pixels[(row * self.width + x) as usize]
    }
}

/// A unit of row work for an external coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowJob {
    pub id: u64,
    pub y_offset: u32,
    pub rows: u32,
    /// Supersample critical pixels instead of tracing primary rays.
    #[serde(default)]
    pub antialias: bool,
}

/// Finished [`RowJob`], keyed by the job id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowResult {
    pub id: u64,
    pub block: RowBlock,
}

/// Full-frame pixel storage.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Pixel>,
}

impl ImageBuffer {
    /// Create a new image buffer with no samples.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Pixel::EMPTY; width as usize * height as usize],
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> Pixel {
        self.pixels[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let i = self.index(x, y);
        self.pixels[i] = Pixel::new(color);
    }

    /// Mean color at (x, y).
    pub fn color(&self, x: u32, y: u32) -> Color {
        self.get(x, y).color()
    }

    /// Overwrite the rows covered by `block`. Rows past the bottom edge
    /// are ignored.
    pub fn write_block(&mut self, block: &RowBlock) {
        self.apply_block(block, |dst, src| *dst = *src);
    }

    /// Add the samples of `block` to the rows it covers.
    pub fn merge_block(&mut self, block: &RowBlock) {
        self.apply_block(block, |dst, src| dst.merge(src));
    }

    fn apply_block<F>(&mut self, block: &RowBlock, mut apply: F)
    where
        F: FnMut(&mut Pixel, &Pixel),
    {
        let width = self.width.min(block.width) as usize;
        for row in 0..block.rows() {
            let y = block.y_offset + row;
            if y >= self.height {
                break;
            }
            let src = &block.pixels[row as usize * block.width as usize..][..width];
            let start = self.index(0, y);
            for (dst, src) in self.pixels[start..start + width].iter_mut().zip(src) {
                apply(dst, src);
            }
        }
    }

    /// Convert to packed 8-bit RGB (for saving).
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| p.to_rgb8()).collect()
    }
}

/// Pixels that sit on a color edge and deserve extra samples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CriticalMap {
    width: u32,
    height: u32,
    flags: Vec<bool>,
}

impl CriticalMap {
    /// A map with nothing marked.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            flags: vec![false; width as usize * height as usize],
        }
    }

    /// Mark edges in a rendered image. `color_delta` is in 8-bit steps.
    pub fn find(image: &ImageBuffer, color_delta: f64) -> Self {
        let tolerance = color_delta / 255.0;
        let colors: Vec<Color> = image.pixels.iter().map(Pixel::color).collect();

        Self::detect(image.width, image.height, |a, b| {
            let d = (colors[a] - colors[b]).abs();
            d.x > tolerance || d.y > tolerance || d.z > tolerance
        })
    }

    /// Mark edges in packed 8-bit RGB. `rgb` must hold `width * height * 3`
    /// bytes; a short buffer yields an empty map.
    pub fn from_rgb8(width: u32, height: u32, rgb: &[u8], color_delta: f64) -> Self {
        let expected = width as usize * height as usize * 3;
        if rgb.len() < expected {
            log::warn!(
                "Critical pixel search got {} bytes for {}x{}, expected {}",
                rgb.len(),
                width,
                height,
                expected
            );
            return Self::new(width, height);
        }

        Self::detect(width, height, |a, b| {
            (0..3).any(|c| (rgb[a * 3 + c] as f64 - rgb[b * 3 + c] as f64).abs() > color_delta)
        })
    }

    /// Compare each pixel to its left and upper neighbors; when they
    /// differ, mark the pixel and its eight neighbors. Marks do not chain.
    fn detect<F>(width: u32, height: u32, differs: F) -> Self
    where
        F: Fn(usize, usize) -> bool,
    {
        let mut map = Self::new(width, height);
        let w = width as usize;

        for y in 1..height as usize {
            for x in 1..w {
                let i = y * w + x;
                if differs(i, i - 1) || differs(i, i - w) {
                    map.mark_neighborhood(x as u32, y as u32);
                }
            }
        }
        map
    }

    fn mark_neighborhood(&mut self, x: u32, y: u32) {
        for ny in y.saturating_sub(1)..=(y + 1).min(self.height - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(self.width - 1) {
                let i = ny as usize * self.width as usize + nx as usize;
                self.flags[i] = true;
            }
        }
    }

    /// Out-of-range coordinates are never critical.
    pub fn is_critical(&self, x: u32, y: u32) -> bool {
        x < self.width
            && y < self.height
            && self.flags[y as usize * self.width as usize + x as usize]
    }

    pub fn count(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }
}

/// Sub-pixel sample offsets for `n` antialiasing rays.
///
/// Up to 16 rays use an ordered grid of `ceil(sqrt n)^2` offsets;
/// beyond that, `n` Gaussian offsets with deviation 0.5.
pub fn subpixel_offsets(n: u32, rng: &mut dyn RngCore) -> Vec<(f64, f64)> {
    if n == 0 {
        return Vec::new();
    }

    if n <= 16 {
        let sq = (n as f64).sqrt();
        let cells = sq.ceil() as u32;
        let offset = |r: u32| (r as f64 - 0.5 * sq) / sq;

        let mut out = Vec::with_capacity((cells * cells) as usize);
        for rx in 0..cells {
            for ry in 0..cells {
                out.push((offset(rx), offset(ry)));
            }
        }
        out
    } else {
        (0..n)
            .map(|_| (gaussian(rng) * 0.5, gaussian(rng) * 0.5))
            .collect()
    }
}
