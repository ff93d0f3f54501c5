//! Quaternion Julia set `z -> z^2 + c`, sliced at w = 0.
//!
//! Quaternions are stored in a `DVec4` with the real part in `x` and the
//! i, j, k parts in `y`, `z`, `w`.

use octa_math::{Aabb, DVec4, Ray, Vec3};
use serde::{Deserialize, Serialize};

use crate::hit::{Hit, Hittable, MaterialId};

/// Squared magnitude at which an orbit counts as escaped.
const ESCAPE_SQ: f64 = 32.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JuliaParams {
    /// The constant `c`, real part first.
    pub c: DVec4,
    pub nmax_surface: u32,
    pub nmax_normal: u32,
    /// Distance below which a point counts as on the surface.
    pub eps_surface: f64,
    pub eps_normal: f64,
    /// Fixed step used while marching through the interior.
    pub delta_transp: f64,
}

impl Default for JuliaParams {
    fn default() -> Self {
        Self {
            c: DVec4::new(-0.2, 0.8, 0.0, 0.0),
            nmax_surface: 100,
            nmax_normal: 8,
            eps_surface: 1e-3,
            eps_normal: 1e-2,
            delta_transp: 1e-2,
        }
    }
}

/// Hamilton product.
#[inline]
pub fn quat_mul(a: DVec4, b: DVec4) -> DVec4 {
    DVec4::new(
        a.x * b.x - a.y * b.y - a.z * b.z - a.w * b.w,
        a.x * b.y + a.y * b.x + a.z * b.w - a.w * b.z,
        a.x * b.z - a.y * b.w + a.z * b.x + a.w * b.y,
        a.x * b.w + a.y * b.z - a.z * b.y + a.w * b.x,
    )
}

/// `q * q`, cheaper than the general product.
#[inline]
pub fn quat_sq(q: DVec4) -> DVec4 {
    DVec4::new(
        q.x * q.x - q.y * q.y - q.z * q.z - q.w * q.w,
        2.0 * q.x * q.y,
        2.0 * q.x * q.z,
        2.0 * q.x * q.w,
    )
}

/// Quaternion Julia primitive, centered at the origin.
#[derive(Clone, Debug)]
pub struct Julia {
    params: JuliaParams,
    pub material: MaterialId,
    bbox: Aabb,
}

impl Julia {
    pub fn new(params: JuliaParams, material: MaterialId) -> Self {
        Self {
            params,
            material,
            bbox: Aabb::new(Vec3::ZERO, Vec3::splat(2.0)),
        }
    }

    /// Distance estimate `|z| / (2|z'|) * ln|z|`.
    ///
    /// Orbits that collapse to zero produce NaN; those are deep inside and
    /// report 0.
    fn distance(&self, p: Vec3) -> f64 {
        let c = self.params.c;
        let mut z = DVec4::new(p.x, p.y, p.z, 0.0);
        let mut dz = DVec4::new(1.0, 0.0, 0.0, 0.0);

        for _ in 0..self.params.nmax_surface {
            dz = quat_mul(z, dz) * 2.0;
            z = quat_sq(z) + c;
            if z.length_squared() >= ESCAPE_SQ {
                break;
            }
        }

        let len = z.length();
        let d = len / (2.0 * dz.length()) * len.ln();
        if d.is_nan() {
            0.0
        } else {
            d
        }
    }

    /// Gradient of the orbit magnitude after `nmax_normal` iterations.
    fn normal(&self, p: Vec3) -> Vec3 {
        let c = self.params.c;
        let e = self.params.eps_normal;
        let q = DVec4::new(p.x, p.y, p.z, 0.0);
        let offsets = [
            DVec4::new(e, 0.0, 0.0, 0.0),
            DVec4::new(0.0, e, 0.0, 0.0),
            DVec4::new(0.0, 0.0, e, 0.0),
        ];

        let orbit = |mut g: DVec4| {
            for _ in 0..self.params.nmax_normal {
                g = quat_sq(g) + c;
            }
            g.length()
        };

        let grad = offsets.map(|o| orbit(q + o) - orbit(q - o));
        Vec3::from_array(grad).normalize_or_zero()
    }
}

impl Hittable for Julia {
    fn hit(&self, ray: &Ray) -> Option<Hit> {
        let span = self.bbox.entry_exit(ray)?;
        let eps = self.params.eps_surface;

        let mut alpha = span.min + 0.01;
        let mut first = true;
        let mut inner = false;

        while alpha < span.max {
            let point = ray.at(alpha);
            let d = self.distance(point);

            // Starting on the surface means we are leaving the set
            if first && d < eps {
                inner = true;
            }

            if (!inner && d < eps) || (inner && d >= eps) {
                let normal = self.normal(point);
                let normal = if inner { -normal } else { normal };
                return Some(Hit::new(point, normal, alpha, self.material));
            }

            alpha += if inner { self.params.delta_transp } else { d };
            first = false;
        }

        None
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// With c = 0 the set is the unit ball.
    fn unit_ball() -> Julia {
        Julia::new(
            JuliaParams {
                c: DVec4::ZERO,
                ..Default::default()
            },
            0,
        )
    }

    #[test]
    fn test_quat_sq_matches_mul() {
        let q = DVec4::new(0.3, -1.2, 0.7, 2.0);
        assert!((quat_sq(q) - quat_mul(q, q)).length() < 1e-12);
    }

    #[test]
    fn test_quat_mul_units() {
        let i = DVec4::new(0.0, 1.0, 0.0, 0.0);
        let j = DVec4::new(0.0, 0.0, 1.0, 0.0);
        let k = DVec4::new(0.0, 0.0, 0.0, 1.0);

        assert_eq!(quat_mul(i, j), k);
        assert_eq!(quat_mul(j, i), -k);
        assert_eq!(quat_mul(i, i), DVec4::new(-1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_hit_unit_ball_from_outside() {
        let julia = unit_ball();
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z);

        let hit = julia.hit(&ray).unwrap();
        let r = hit.point.length();
        assert!(r > 1.0 && r < 1.01);
        assert!((hit.normal - Vec3::Z).length() < 1e-3);
    }

    #[test]
    fn test_hit_unit_ball_from_inside() {
        let julia = unit_ball();
        let ray = Ray::new(Vec3::new(0.3, 0.0, 0.0), Vec3::X);

        let hit = julia.hit(&ray).unwrap();
        assert!(hit.point.x > 1.0 && hit.point.x < 1.02);
        // Normal flipped to face back inside
        assert!(hit.normal.x < 0.0);
    }

    #[test]
    fn test_hit_from_center_is_ahead() {
        // The orbit of the center collapses to zero; still inside
        let julia = unit_ball();
        let ray = Ray::new(Vec3::ZERO, Vec3::Y);

        let hit = julia.hit(&ray).unwrap();
        assert!(hit.distance > 0.0);
        assert!(hit.point.y > 1.0 && hit.point.y < 1.02);
    }

    #[test]
    fn test_rays_from_surface_go_forward() {
        // Real c inside the main cardioid: a solid of revolution about x
        let params = JuliaParams {
            c: DVec4::new(-0.5, 0.0, 0.0, 0.0),
            ..Default::default()
        };
        let julia = Julia::new(params, 0);
        let incoming = Ray::new(Vec3::new(0.1, 0.05, 3.0), -Vec3::Z);
        let surface = julia.hit(&incoming).unwrap();
        assert!(surface.point.z > 0.0);

        // Transmission and shadow rays leave from the hit point
        for dir in [-Vec3::Z, Vec3::Z, Vec3::X, Vec3::new(0.3, -0.5, -0.8).normalize()] {
            let ray = Ray::new(surface.point, dir);
            if let Some(hit) = julia.hit(&ray) {
                assert!(hit.distance > 0.0, "dir {:?}: {}", dir, hit.distance);
                assert!((ray.at(hit.distance) - hit.point).length() < 1e-12);
            }
        }
    }

    #[test]
    fn test_miss() {
        let julia = unit_ball();

        // Crosses the box but passes the ball
        let ray = Ray::new(Vec3::new(1.5, 1.5, 5.0), -Vec3::Z);
        assert!(julia.hit(&ray).is_none());

        assert_eq!(julia.bounding_box().radii(), Vec3::splat(2.0));
    }
}
