//! Sphere primitive for ray tracing.

use octa_math::{Aabb, Ray, Vec2, Vec3};
use std::f64::consts::PI;

use crate::hit::{Hit, Hittable, MaterialId};

/// A sphere primitive.
#[derive(Clone, Debug)]
pub struct Sphere {
    center: Vec3,
    radius: f64,
    pub material: MaterialId,
    bbox: Aabb,
}

impl Sphere {
    /// Create a new sphere.
    pub fn new(center: Vec3, radius: f64, material: MaterialId) -> Self {
        let radius = radius.max(0.0);
        Self {
            center,
            radius,
            material,
            bbox: Aabb::new(center, Vec3::splat(radius)),
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Spherical texture coordinates of a unit normal.
    fn sphere_uv(n: Vec3) -> Vec2 {
        Vec2::new(
            n.x.atan2(n.z) / (2.0 * PI) + 0.5,
            n.y.clamp(-1.0, 1.0).asin() / PI + 0.5,
        )
    }
}

impl Hittable for Sphere {
    fn hit(&self, ray: &Ray) -> Option<Hit> {
        // Closest approach of the ray line to the center
        let alpha = -ray.direction.dot(ray.origin - self.center);
        let q = ray.at(alpha);
        let dist_sq = (q - self.center).length_squared();
        let r_sq = self.radius * self.radius;
        if dist_sq > r_sq {
            return None;
        }

        let a = (r_sq - dist_sq).sqrt();
        let t = if alpha >= a {
            alpha - a
        } else if alpha + a > 0.0 {
            alpha + a
        } else {
            return None;
        };

        let point = ray.at(t);
        let normal = (point - self.center) / self.radius;
        let mut hit = Hit::new(point, normal, t, self.material);
        hit.uv = Some(Self::sphere_uv(normal));
        Some(hit)
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}
