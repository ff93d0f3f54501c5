//! Random sampling helpers shared by shading, lights and patterns.

use octa_math::Vec3;
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};

/// Draw one standard normal sample.
#[inline]
pub fn gaussian(rng: &mut dyn RngCore) -> f64 {
    StandardNormal.sample(rng)
}

/// `v` with each component pushed by `N(0, 1) * 0.5 * amount`.
pub fn jittered(v: Vec3, amount: f64, rng: &mut dyn RngCore) -> Vec3 {
    Vec3::new(
        v.x + gaussian(rng) * 0.5 * amount,
        v.y + gaussian(rng) * 0.5 * amount,
        v.z + gaussian(rng) * 0.5 * amount,
    )
}
