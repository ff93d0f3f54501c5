//! Octa Core - materials, lights, meshes and image output.
//!
//! This crate provides the scene content the renderer consumes:
//!
//! - **Materials**: uniform, procedural (`Pattern`) and texture surfaces
//! - **Lights**: point, sphere (area) and headlight, with the local
//!   illumination model
//! - **Meshes**: OBJ and OFF loading into `TriangleMesh`
//! - **Settings**: `RenderSettings` and octree parameters
//! - **Output**: a minimal big-endian RGB TIFF writer
//!
//! # Example
//!
//! ```ignore
//! use octa_core::{MaterialDesc, TextureCache, Color};
//!
//! let mut textures = TextureCache::with_base_dir("scenes");
//! let glass = MaterialDesc::uniform("glass", Color::new(0.9, 0.9, 1.0))
//!     .with_transparency(0.8, 1.5)
//!     .resolve(&mut textures)?;
//! ```

pub mod light;
pub mod material;
pub mod mesh;
pub mod pattern;
pub mod sampling;
pub mod settings;
pub mod texture;
pub mod tiff;

use octa_math::Vec3;

/// Linear RGB color, nominally in [0, 1] per channel.
pub type Color = Vec3;

// Re-export commonly used types
pub use light::{Light, LightKind};
pub use material::{Diffuse, Material, MaterialDesc, MaterialProps, Surface};
pub use mesh::{load_obj, load_off, MeshError, MeshResult, TriangleMesh};
pub use pattern::Pattern;
pub use settings::{BvtParams, FakeShadow, RenderSettings};
pub use texture::{Texture, TextureCache, TextureError, TextureResult};
