//! Octa Renderer - recursive CPU ray tracing
//!
//! A Whitted-style ray tracer with glossy reflection, cloudy refraction,
//! depth of field and adaptive antialiasing.
//!
//! - Primitives: spheres, triangles, blobs, Mandelbulbs and quaternion
//!   Julia sets, all behind [`Hittable`]
//! - An octree bounding volume tree ([`Bvt`]) for intersection and
//!   shadow transmission queries
//! - A [`WorkerPool`] that renders row ranges in parallel, then finds
//!   critical pixels and antialiases only those
//!
//! # Example
//!
//! ```ignore
//! use octa_renderer::{SceneDescription, WorkerPool};
//!
//! let scene = SceneDescription::load("demos/spheres.json")?.prepare()?;
//! let pool = WorkerPool::from_settings(&scene.settings)?;
//! let image = pool.render_all(&scene)?;
//! octa_core::tiff::save_rgb("out.tif", image.width, image.height, &image.to_rgb8())?;
//! ```

mod blob;
mod bvt;
mod camera;
mod error;
mod hit;
mod image;
mod julia;
mod mandelbulb;
mod scene;
mod shading;
mod sphere;
mod triangle;
mod workers;

pub use blob::{Blob, BlobParams, Charge};
pub use bvt::{transmission_linear, Bvt};
pub use camera::{Camera, CameraDesc};
pub use error::{RenderError, RenderResult, SceneError, SceneResult};
pub use hit::{nearest_linear, Hit, Hittable, MaterialId, Primitive};
pub use image::{
    subpixel_offsets, to_byte, CriticalMap, ImageBuffer, Pixel, RowBlock, RowJob, RowResult,
};
pub use julia::{Julia, JuliaParams};
pub use mandelbulb::{Mandelbulb, MandelbulbParams};
pub use scene::{mesh_triangles, ObjectDesc, Scene, SceneDescription};
pub use shading::{reflect, refract};
pub use sphere::Sphere;
pub use triangle::Triangle;
pub use workers::{Phase, RenderProgress, WorkerPool};

pub use octa_core::{Color, Light, Material, RenderSettings};
pub use octa_math::{Aabb, Ray, Vec3};
