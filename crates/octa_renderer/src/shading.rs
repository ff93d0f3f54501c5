//! Recursive shading: direct light through shadow feelers, then
//! reflection and transmission rays.

use octa_core::sampling::jittered;
use octa_core::{Color, LightKind, Material};
use octa_math::{Ray, Vec3};
use rand::RngCore;

use crate::hit::Hit;
use crate::scene::Scene;

/// Snell transmission direction for a ray arriving against `-v`.
///
/// `v` points back along the incoming ray and `n` is the normal on the
/// incoming side; `ior` is the ratio of the new to the old index. Returns
/// `None` on total internal reflection.
pub fn refract(v: Vec3, n: Vec3, ior: f64) -> Option<Vec3> {
    let t_lat = (n * n.dot(v) - v) / ior;
    let sin_sq = t_lat.length_squared();
    if sin_sq > 1.0 {
        return None;
    }
    Some(t_lat - n * (1.0 - sin_sq).sqrt())
}

/// Mirror `v` about `n`: `2(n.v)n - v`.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    n * (2.0 * n.dot(v)) - v
}

impl Scene {
    /// Color seen along `ray`, spawning up to `depth` more bounces.
    pub fn trace_ray(&self, ray: &Ray, depth: u32, rng: &mut dyn RngCore) -> Color {
        let Some(hit) = self.intersect(ray) else {
            return self.settings.environment;
        };

        let material = self.material(hit.material);
        let props = &material.props;
        let diffuse = material.diffuse_color(hit.point, hit.uv, hit.pattern_point, rng);

        let n = hit.normal;
        let v = -ray.direction;
        let r = reflect(v, n);

        let mut out = if self.settings.no_lighting {
            diffuse
        } else {
            self.direct_light(&hit, material, diffuse, r, rng)
        };

        if depth == 0 {
            return out;
        }

        if props.specularity > 0.0 {
            let reflected =
                self.spawn(hit.point, r, props.roughness, props.rough_rays, depth, rng);
            out += reflected * props.specularity * material.specular;
        }

        if !material.is_opaque() {
            // Leaving the object flips both the normal and the index ratio
            let t = if n.dot(v) < 0.0 {
                refract(v, -n, 1.0 / props.ior)
            } else {
                refract(v, n, props.ior)
            };

            if let Some(t) = t {
                let transmitted =
                    self.spawn(hit.point, t, props.cloudiness, props.cloudy_rays, depth, rng);
                out += transmitted * props.transparency * material.transparent;
            }
        }

        out
    }

    /// One secondary ray, or the mean of `rays` rays jittered by `spread`.
    fn spawn(
        &self,
        origin: Vec3,
        dir: Vec3,
        spread: f64,
        rays: u32,
        depth: u32,
        rng: &mut dyn RngCore,
    ) -> Color {
        if spread <= 0.0 {
            return self.trace_ray(&Ray::new(origin, dir), depth - 1, rng);
        }

        let rays = rays.max(1);
        let mut sum = Color::ZERO;
        for _ in 0..rays {
            let ray = Ray::new(origin, jittered(dir, spread, rng));
            sum += self.trace_ray(&ray, depth - 1, rng);
        }
        sum / rays as f64
    }

    /// Diffuse and specular light reaching `hit` from every light.
    fn direct_light(
        &self,
        hit: &Hit,
        material: &Material,
        diffuse: Color,
        reflected: Vec3,
        rng: &mut dyn RngCore,
    ) -> Color {
        let props = &material.props;
        let surface = (1.0 - props.transparency) * (1.0 - props.specularity);
        let mut out = Color::ZERO;

        for light in self.lights() {
            match light.kind {
                LightKind::Sphere { radius, num_rays } => {
                    let num_rays = num_rays.max(1);
                    let mut sum_d = 0.0;
                    let mut sum_s = 0.0;

                    // Intensity is taken from the jittered position as well
                    for _ in 0..num_rays {
                        let to_light = jittered(light.origin, radius, rng) - hit.point;
                        let res = self.feel_shadow(hit.point, to_light);
                        if res > 0.0 {
                            let (d, s) = light.lighting(props, to_light, reflected, hit.normal);
                            sum_d += res * d;
                            sum_s += res * s;
                        }
                    }

                    let scale = 1.0 / num_rays as f64;
                    let (sum_d, sum_s) = (sum_d * scale, sum_s * scale);
                    if sum_d > 0.0 {
                        out += diffuse * (sum_d * surface) * light.color;
                        out += material.specular * sum_s * light.color;
                    }
                }
                LightKind::Point | LightKind::Head { .. } => {
                    let to_light = light.position(self.camera.origin()) - hit.point;
                    let res = self.feel_shadow(hit.point, to_light);
                    if res > 0.0 {
                        let (d, s) = light.lighting(props, to_light, reflected, hit.normal);
                        out += diffuse * (res * d * surface) * light.color;
                        out += material.specular * (res * s) * light.color;
                    }
                }
            }
        }

        out
    }

    /// Shadow feeler from `point` along `to_light`, up to its length.
    fn feel_shadow(&self, point: Vec3, to_light: Vec3) -> f64 {
        let distance = to_light.length();
        if distance <= 0.0 {
            return 0.0;
        }
        self.shadow_factor(&Ray::new(point, to_light), distance)
    }
}
