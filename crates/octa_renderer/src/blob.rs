//! Metaballs: an isosurface of summed inverse-square charges.

use octa_math::{Aabb, Ray, Vec3};
use serde::{Deserialize, Serialize};

use crate::hit::{Hit, Hittable, MaterialId};

/// Field value at which the surface lies.
const THRESHOLD: f64 = 1.0;

/// One field source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub center: Vec3,
    pub weight: f64,
}

/// Ray marching parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobParams {
    /// Bisection stops once the step is this small.
    pub accuracy: f64,
    /// Fixed marching step.
    pub start_step: f64,
    /// Central difference offset for the normal.
    pub normal_delta: f64,
    /// Bisect after a crossing; otherwise report the first sample past it.
    pub refine: bool,
}

impl Default for BlobParams {
    fn default() -> Self {
        Self {
            accuracy: 1e-8,
            start_step: 0.2,
            normal_delta: 0.01,
            refine: true,
        }
    }
}

/// Blob primitive.
#[derive(Clone, Debug)]
pub struct Blob {
    charges: Vec<Charge>,
    params: BlobParams,
    pub material: MaterialId,
    bbox: Aabb,
}

impl Blob {
    pub fn new(charges: Vec<Charge>, params: BlobParams, material: MaterialId) -> Self {
        // A cube of half-size 1.5 * weight around each charge
        let bbox = Aabb::enclosing(
            charges
                .iter()
                .map(|c| Aabb::new(c.center, Vec3::splat(c.weight * 1.5))),
        );
        Self {
            charges,
            params,
            material,
            bbox,
        }
    }

    /// Field strength `sum(w^2 / |c - p|^2)`.
    pub fn field(&self, p: Vec3) -> f64 {
        self.charges
            .iter()
            .map(|c| c.weight * c.weight / (c.center - p).length_squared())
            .sum()
    }

    fn inside(&self, p: Vec3) -> bool {
        self.field(p) >= THRESHOLD
    }

    /// Negated field gradient, normalized.
    fn normal(&self, p: Vec3) -> Vec3 {
        let h = self.params.normal_delta;
        let dx = Vec3::new(h, 0.0, 0.0);
        let dy = Vec3::new(0.0, h, 0.0);
        let dz = Vec3::new(0.0, 0.0, h);
        Vec3::new(
            self.field(p - dx) - self.field(p + dx),
            self.field(p - dy) - self.field(p + dy),
            self.field(p - dz) - self.field(p + dz),
        )
        .normalize_or_zero()
    }
}

impl Hittable for Blob {
    fn hit(&self, ray: &Ray) -> Option<Hit> {
        let span = self.bbox.entry_exit(ray)?;

        // The ray may start inside the surface
        let start = self.inside(ray.origin);
        let mut alpha = span.min;
        let mut step = self.params.start_step;

        while alpha < span.max {
            alpha += step;
            let mut p = ray.at(alpha);
            if self.inside(p) == start {
                continue;
            }

            if self.params.refine {
                let mut a1 = alpha - step;
                while step > self.params.accuracy {
                    step *= 0.5;
                    alpha = a1 + step;
                    p = ray.at(alpha);
                    if self.inside(p) == start {
                        a1 = alpha;
                    }
                }
            }

            return Some(Hit::new(p, self.normal(p), alpha, self.material));
        }

        None
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }
}
