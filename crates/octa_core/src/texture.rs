//! Texture loading and caching for materials.
//!
//! Images are decoded with the `image` crate and kept as plain RGB in
//! [0, 1] (channel byte / 255, no color space conversion).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::Color;

/// Errors that can occur during texture loading.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to load texture {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Texture {0} has no pixels")]
    Empty(String),
}

pub type TextureResult<T> = Result<T, TextureError>;

/// A decoded texture, row-major with row 0 at the top of the image.
#[derive(Clone, Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
    /// Original file path (for debugging)
    pub path: String,
}

impl Texture {
    /// Create a new texture from pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<Color>, path: impl Into<String>) -> Self {
        Self {
            width,
            height,
            pixels,
            path: path.into(),
        }
    }

    /// Create a solid color texture (1x1).
    pub fn solid_color(color: Color) -> Self {
        Self::new(1, 1, vec![color], "<solid>")
    }

    /// Build a texture from 8-bit RGB data.
    pub fn from_rgb8(width: u32, height: u32, data: &[u8], path: impl Into<String>) -> Self {
        let pixels = data
            .chunks_exact(3)
            .map(|p| Color::new(p[0] as f64, p[1] as f64, p[2] as f64) / 255.0)
            .collect();
        Self::new(width, height, pixels, path)
    }

    /// Sample at `(u, v)`, v pointing up.
    ///
    /// Coordinates outside [0, 1] clamp to the border. Bilinear filtering
    /// is used when a full 2x2 neighborhood exists; on the last row or
    /// column the nearest texel is returned.
    pub fn sample(&self, u: f64, v: f64) -> Color {
        let real_x = u.clamp(0.0, 1.0) * self.width as f64;
        let real_y = (1.0 - v.clamp(0.0, 1.0)) * self.height as f64;

        let max_x = self.width.saturating_sub(1) as i64;
        let max_y = self.height.saturating_sub(1) as i64;
        let rw = (real_x as i64).clamp(0, max_x);
        let rh = (real_y as i64).clamp(0, max_y);

        if rw < max_x && rh < max_y {
            let fx = real_x - rw as f64;
            let fy = real_y - rh as f64;
            let (x, y) = (rw as u32, rh as u32);

            let top = self.get_pixel(x, y) * (1.0 - fx) + self.get_pixel(x + 1, y) * fx;
            let bottom = self.get_pixel(x, y + 1) * (1.0 - fx) + self.get_pixel(x + 1, y + 1) * fx;
            top * (1.0 - fy) + bottom * fy
        } else {
            self.get_pixel(rw as u32, rh as u32)
        }
    }

    /// Get pixel at integer coordinates.
    fn get_pixel(&self, x: u32, y: u32) -> Color {
        let idx = (y as usize) * (self.width as usize) + x as usize;
        self.pixels.get(idx).copied().unwrap_or(Color::ZERO)
    }

    /// Get total size in bytes (approximate).
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<Color>()
    }
}

/// Cache for loaded textures.
///
/// Several materials may name the same file; each file is decoded once.
#[derive(Default)]
pub struct TextureCache {
    /// Cached textures by file path
    textures: HashMap<String, Arc<Texture>>,

    /// Base directory for resolving relative paths
    base_dir: Option<PathBuf>,
}

impl TextureCache {
    /// Create a new empty texture cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a texture cache with a base directory for relative paths.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            textures: HashMap::new(),
            base_dir: Some(base_dir.into()),
        }
    }

    /// Set the base directory for resolving relative paths.
    pub fn set_base_dir(&mut self, base_dir: impl Into<PathBuf>) {
        self.base_dir = Some(base_dir.into());
    }

    /// Load a texture from file, using cache if available.
    pub fn load(&mut self, path: &str) -> TextureResult<Arc<Texture>> {
        if let Some(texture) = self.textures.get(path) {
            return Ok(texture.clone());
        }

        let full_path = self.resolve_path(path);
        let texture = Arc::new(load_texture_file(&full_path)?);
        self.textures.insert(path.to_string(), texture.clone());

        log::debug!(
            "Loaded texture: {} ({}x{}, {:.1} KB)",
            path,
            texture.width,
            texture.height,
            texture.size_bytes() as f32 / 1024.0
        );

        Ok(texture)
    }

    /// Put an already decoded texture under `path`.
    pub fn insert(&mut self, path: impl Into<String>, texture: Texture) -> Arc<Texture> {
        let texture = Arc::new(texture);
        self.textures.insert(path.into(), texture.clone());
        texture
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Resolve a path relative to the base directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);

        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(base) = &self.base_dir {
            base.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

/// Load a texture from a file path.
fn load_texture_file(path: &Path) -> TextureResult<Texture> {
    let name = path.to_string_lossy().to_string();
    let img = image::open(path).map_err(|source| TextureError::Load {
        path: name.clone(),
        source,
    })?;

    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(TextureError::Empty(name));
    }

    Ok(Texture::from_rgb8(width, height, rgb.as_raw(), name))
}
