//! Hittable trait and the closed set of scene primitives.

use octa_math::{Aabb, Ray, Vec2, Vec3};

use crate::blob::Blob;
use crate::julia::Julia;
use crate::mandelbulb::Mandelbulb;
use crate::sphere::Sphere;
use crate::triangle::Triangle;

/// Index into the scene's material table.
pub type MaterialId = usize;

/// Record of a ray-object intersection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub point: Vec3,
    /// Unit surface normal. Not flipped toward the ray: shading decides
    /// entering vs leaving from its sign.
    pub normal: Vec3,
    /// Ray parameter of the hit.
    pub distance: f64,
    pub material: MaterialId,
    /// Texture coordinates, for primitives that have them.
    pub uv: Option<Vec2>,
    /// Replacement lookup point for procedural materials.
    pub pattern_point: Option<Vec3>,
}

impl Hit {
    pub fn new(point: Vec3, normal: Vec3, distance: f64, material: MaterialId) -> Self {
        Self {
            point,
            normal,
            distance,
            material,
            uv: None,
            pattern_point: None,
        }
    }
}

/// Trait for objects that can be hit by rays.
pub trait Hittable: Send + Sync {
    /// Nearest intersection in front of the ray origin.
    fn hit(&self, ray: &Ray) -> Option<Hit>;

    /// Get the axis-aligned bounding box of this object.
    fn bounding_box(&self) -> Aabb;
}

/// Every kind of geometry a scene can hold.
#[derive(Clone, Debug)]
pub enum Primitive {
    Sphere(Sphere),
    Triangle(Triangle),
    Blob(Blob),
    Mandelbulb(Mandelbulb),
    Julia(Julia),
}

impl Primitive {
    pub fn material(&self) -> MaterialId {
        match self {
            Primitive::Sphere(p) => p.material,
            Primitive::Triangle(p) => p.material,
            Primitive::Blob(p) => p.material,
            Primitive::Mandelbulb(p) => p.material,
            Primitive::Julia(p) => p.material,
        }
    }
}

impl Hittable for Primitive {
    fn hit(&self, ray: &Ray) -> Option<Hit> {
        match self {
            Primitive::Sphere(p) => p.hit(ray),
            Primitive::Triangle(p) => p.hit(ray),
            Primitive::Blob(p) => p.hit(ray),
            Primitive::Mandelbulb(p) => p.hit(ray),
            Primitive::Julia(p) => p.hit(ray),
        }
    }

    fn bounding_box(&self) -> Aabb {
        match self {
            Primitive::Sphere(p) => p.bounding_box(),
            Primitive::Triangle(p) => p.bounding_box(),
            Primitive::Blob(p) => p.bounding_box(),
            Primitive::Mandelbulb(p) => p.bounding_box(),
            Primitive::Julia(p) => p.bounding_box(),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ident),*) => {
        $(
            impl From<$ty> for Primitive {
                fn from(p: $ty) -> Self {
                    Primitive::$ty(p)
                }
            }
        )*
    };
}

impl_from_primitive!(Sphere, Triangle, Blob, Mandelbulb, Julia);

/// Closest hit over all primitives, by brute force.
pub fn nearest_linear(primitives: &[Primitive], ray: &Ray) -> Option<Hit> {
    primitives
        .iter()
        .filter_map(|p| p.hit(ray))
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}
