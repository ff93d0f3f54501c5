//! Mandelbulb (and its Julia variant) rendered by distance-estimated
//! ray marching inside a clipping sphere.
//!
//! The power map `z -> z^order + c` on triplex numbers is evaluated without
//! trig calls: the sines and cosines of the two angles come straight from
//! the coordinates and are multiplied up with double-angle formulas, so
//! the order is always a power of two (`2^cascade`).

use octa_math::{Aabb, Interval, Ray, Vec3};
use serde::{Deserialize, Serialize};

use crate::hit::{Hit, Hittable, MaterialId};

/// Guards the angle ratios against division by zero.
const MIN_EPS: f64 = 1e-14;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MandelbulbParams {
    /// Push applied when the ray starts inside the clipping sphere.
    pub first_step: f64,
    /// Iteration budget; a point that survives it is inside.
    pub nmax: u32,
    pub normal_eps: f64,
    pub bailout: f64,
    pub accuracy: f64,
    /// Number of angle doublings; the power is `2^cascade`.
    pub cascade: u32,
    /// Fixed `c` for Julia mode. `None` iterates the classic set.
    pub julia: Option<Vec3>,
    pub clip_radius: f64,
    /// Bisect after a crossing; otherwise report the first sample past it.
    pub refine: bool,
}

impl Default for MandelbulbParams {
    fn default() -> Self {
        Self {
            first_step: 0.01,
            nmax: 10,
            normal_eps: 1e-8,
            bailout: 2.0,
            accuracy: 1e-5,
            cascade: 3,
            julia: None,
            clip_radius: 1.2,
            refine: true,
        }
    }
}

/// Result of iterating one point.
#[derive(Clone, Copy, Debug)]
struct Orbit {
    /// Iterations before escape; `nmax` means the point did not escape.
    iterations: u32,
    /// Last escape radius `|z|`.
    radius: f64,
    /// Distance estimate to the surface.
    distance: f64,
}

/// Mandelbulb primitive, centered at the origin.
#[derive(Clone, Debug)]
pub struct Mandelbulb {
    params: MandelbulbParams,
    order: u32,
    pub material: MaterialId,
    bbox: Aabb,
}

impl Mandelbulb {
    pub fn new(params: MandelbulbParams, material: MaterialId) -> Self {
        let cascade = params.cascade.min(16);
        Self {
            order: 1 << cascade,
            params: MandelbulbParams { cascade, ..params },
            material,
            bbox: Aabb::new(Vec3::ZERO, Vec3::splat(params.clip_radius)),
        }
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    fn evaluate(&self, p: Vec3) -> Orbit {
        let c = self.params.julia.unwrap_or(p);
        let order = self.order as f64;

        let mut z = p;
        let mut dr = 1.0;
        let mut r = 0.0;
        let mut n = 1;

        while n < self.params.nmax {
            r = z.length();
            if r >= self.params.bailout {
                n -= 1;
                break;
            }

            let plane_xy = (z.x * z.x + z.y * z.y).sqrt() + MIN_EPS;
            let r_eps = r + MIN_EPS;

            // phi is the horizontal angle, theta the vertical one
            let mut sin_phi = z.y / plane_xy;
            let mut cos_phi = z.x / plane_xy;
            let mut sin_the = plane_xy / r_eps;
            let mut cos_the = z.z / r_eps;

            for _ in 0..self.params.cascade {
                (sin_phi, cos_phi) = (2.0 * sin_phi * cos_phi, 2.0 * cos_phi * cos_phi - 1.0);
                (sin_the, cos_the) = (2.0 * sin_the * cos_the, 2.0 * cos_the * cos_the - 1.0);
            }

            let mut r_pow = r.powi(self.order as i32 - 1);
            dr = r_pow * dr * order + 1.0;
            r_pow *= r;

            z = Vec3::new(
                r_pow * sin_the * cos_phi,
                r_pow * sin_the * sin_phi,
                r_pow * cos_the,
            ) + c;
            n += 1;
        }

        Orbit {
            iterations: n,
            radius: r,
            distance: 0.5 * r.ln() * r / dr,
        }
    }

    fn is_inside(&self, orbit: &Orbit) -> bool {
        orbit.iterations == self.params.nmax
    }

    /// Central differences of the escape radius.
    fn normal(&self, p: Vec3) -> Vec3 {
        let e = self.params.normal_eps;
        let radius = |q: Vec3| self.evaluate(q).radius;
        Vec3::new(
            radius(p + Vec3::new(e, 0.0, 0.0)) - radius(p - Vec3::new(e, 0.0, 0.0)),
            radius(p + Vec3::new(0.0, e, 0.0)) - radius(p - Vec3::new(0.0, e, 0.0)),
            radius(p + Vec3::new(0.0, 0.0, e)) - radius(p - Vec3::new(0.0, 0.0, e)),
        )
        .normalize_or_zero()
    }

    /// Ray span inside the clipping sphere, entry clamped to the origin.
    fn clip_span(&self, ray: &Ray) -> Option<Interval> {
        let r2 = self.params.clip_radius * self.params.clip_radius;
        let alpha = -ray.direction.dot(ray.origin);
        let dist2 = ray.at(alpha).length_squared();
        if dist2 > r2 {
            return None;
        }

        let a = (r2 - dist2).sqrt();
        let exit = alpha + a;
        if exit < 0.0 {
            return None;
        }
        Some(Interval::new((alpha - a).max(0.0), exit))
    }

    /// Radial lookup vector for procedural materials.
    fn color_vector(p: Vec3) -> Vec3 {
        let len = p.length();
        let band = |f: f64| (len * f).sin().powi(2).max(0.2);
        Vec3::new(band(19.0), 0.2, band(23.0))
    }

    fn make_hit(&self, point: Vec3, alpha: f64) -> Hit {
        let mut hit = Hit::new(point, self.normal(point), alpha, self.material);
        hit.pattern_point = Some(Self::color_vector(point));
        hit
    }
}

impl Hittable for Mandelbulb {
    fn hit(&self, ray: &Ray) -> Option<Hit> {
        let span = self.clip_span(ray)?;
        let accuracy = self.params.accuracy;
        let fixed_step = self.params.first_step.max(accuracy);

        // A ray starting inside the sphere most likely leaves this surface
        let mut alpha = if span.min == 0.0 { fixed_step } else { span.min };

        // The distance estimate only bounds the way in from outside, so a
        // ray leaving the set walks in fixed steps
        let start_inside = self.is_inside(&self.evaluate(ray.at(alpha)));
        let mut step = f64::INFINITY;

        while alpha < span.max {
            let mut point = ray.at(alpha);
            let orbit = self.evaluate(point);
            let crossed = self.is_inside(&orbit) != start_inside;
            let converged = !start_inside && step <= accuracy;

            if converged || crossed {
                if self.params.refine && crossed {
                    let mut a1 = alpha - step;
                    while step > accuracy {
                        step *= 0.5;
                        alpha = a1 + step;
                        point = ray.at(alpha);
                        if self.is_inside(&self.evaluate(point)) == start_inside {
                            a1 = alpha;
                        }
                    }
                }
                return (alpha > 0.0).then(|| self.make_hit(point, alpha));
            }

            step = if start_inside {
                fixed_step
            } else {
                orbit.distance.max(accuracy)
            };
            alpha += step;
        }

        None
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}
