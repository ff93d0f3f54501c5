//! Triangle primitive for ray tracing.
//!
//! Plane intersection followed by a barycentric inside test. The
//! barycentric basis is precomputed from the inverse Gram matrix of the
//! two edges, so the test is two dot products.

use octa_math::{Aabb, Ray, Vec2, Vec3};

use crate::hit::{Hit, Hittable, MaterialId};

/// A triangle primitive.
#[derive(Clone, Debug)]
pub struct Triangle {
    v0: Vec3,
    /// Unit plane normal `normalize(e1 x e2)`.
    normal: Vec3,
    /// Plane offset `normal . v0`.
    d: f64,
    u_beta: Vec3,
    u_gamma: Vec3,
    /// Zero area; never hit.
    degenerate: bool,
    vertex_normals: Option<[Vec3; 3]>,
    uvs: Option<[Vec2; 3]>,
    pub material: MaterialId,
    bbox: Aabb,
}

impl Triangle {
    /// Create a flat-shaded triangle.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, material: MaterialId) -> Self {
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let normal = e1.cross(e2).normalize_or_zero();

        let a = e1.dot(e1);
        let b = e1.dot(e2);
        let c = e2.dot(e2);
        let det = a * c - b * b;
        let degenerate = normal == Vec3::ZERO || det == 0.0 || !det.is_finite();

        let (u_beta, u_gamma) = if degenerate {
            (Vec3::ZERO, Vec3::ZERO)
        } else {
            let (ia, ib, ic) = (a / det, b / det, c / det);
            (e1 * ic - e2 * ib, e2 * ia - e1 * ib)
        };

        Self {
            v0,
            normal,
            d: normal.dot(v0),
            u_beta,
            u_gamma,
            degenerate,
            vertex_normals: None,
            uvs: None,
            material,
            bbox: Aabb::from_points(v0.min(v1).min(v2), v0.max(v1).max(v2)),
        }
    }

    /// Interpolate these per-vertex normals (smooth shading).
    pub fn with_normals(mut self, normals: [Vec3; 3]) -> Self {
        self.vertex_normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: [Vec2; 3]) -> Self {
        self.uvs = Some(uvs);
        self
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }
}

impl Hittable for Triangle {
    fn hit(&self, ray: &Ray) -> Option<Hit> {
        if self.degenerate {
            return None;
        }

        let c = ray.direction.dot(self.normal);
        if c == 0.0 {
            return None;
        }

        let t = (self.d - ray.origin.dot(self.normal)) / c;
        if t <= 0.0 {
            return None;
        }

        let q = ray.at(t);
        let q2 = q - self.v0;

        let beta = self.u_beta.dot(q2);
        if beta < 0.0 {
            return None;
        }
        let gamma = self.u_gamma.dot(q2);
        if gamma < 0.0 {
            return None;
        }
        let alpha = 1.0 - beta - gamma;
        if alpha < 0.0 {
            return None;
        }

        let normal = match &self.vertex_normals {
            Some([n0, n1, n2]) => (*n0 * alpha + *n1 * beta + *n2 * gamma).normalize_or_zero(),
            None => self.normal,
        };
        let normal = if normal == Vec3::ZERO {
            self.normal
        } else {
            normal
        };

        let mut hit = Hit::new(q, normal, t, self.material);
        hit.uv = self
            .uvs
            .map(|[t0, t1, t2]| t0 * alpha + t1 * beta + t2 * gamma);
        Some(hit)
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Triangle {
        Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            0,
        )
    }

    #[test]
    fn test_triangle_hit() {
        let tri = unit_triangle();
        let ray = Ray::new(Vec3::new(0.25, 0.25, 2.0), -Vec3::Z);

        let hit = tri.hit(&ray).unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-6);
        assert!((hit.point - Vec3::new(0.25, 0.25, 0.0)).length() < 1e-9);
        assert_eq!(hit.normal, Vec3::Z);
    }

    #[test]
    fn test_triangle_hit_from_behind() {
        let tri = unit_triangle();
        let ray = Ray::new(Vec3::new(0.25, 0.25, -2.0), Vec3::Z);

        let hit = tri.hit(&ray).unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-6);
        assert_eq!(hit.normal, Vec3::Z);
    }

    #[test]
    fn test_triangle_miss() {
        let tri = unit_triangle();

        // Outside the triangle (beyond the hypotenuse)
        assert!(tri.hit(&Ray::new(Vec3::new(0.8, 0.8, 1.0), -Vec3::Z)).is_none());
        // Parallel to the plane
        assert!(tri.hit(&Ray::new(Vec3::new(0.2, 0.2, 1.0), Vec3::X)).is_none());
        // Plane behind the ray
        assert!(tri.hit(&Ray::new(Vec3::new(0.2, 0.2, 1.0), Vec3::Z)).is_none());
    }

    #[test]
    fn test_degenerate_never_hits() {
        let tri = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0, 0);
        assert!(tri.is_degenerate());
        assert!(tri.hit(&Ray::new(Vec3::new(0.5, 0.0, 1.0), -Vec3::Z)).is_none());
    }

    #[test]
    fn test_smooth_normals_and_uvs() {
        let tri = unit_triangle()
            .with_normals([Vec3::Z, Vec3::X, Vec3::Y])
            .with_uvs([Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)]);

        // At vertex 1 the interpolated normal is that vertex's normal
        let hit = tri.hit(&Ray::new(Vec3::new(1.0, 0.0, 1.0), -Vec3::Z)).unwrap();
        assert!((hit.normal - Vec3::X).length() < 1e-6);

        let hit = tri.hit(&Ray::new(Vec3::new(0.2, 0.3, 1.0), -Vec3::Z)).unwrap();
        let uv = hit.uv.unwrap();
        assert!((uv - Vec2::new(0.2, 0.3)).length() < 1e-9);
        assert!((hit.normal.length() - 1.0).abs() < 1e-12);
    }
}
