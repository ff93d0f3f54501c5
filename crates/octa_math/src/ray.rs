use crate::Vec3;

/// Offset applied to every ray origin along its direction.
///
/// Secondary rays start exactly on the surface they leave; the nudge keeps
/// them from hitting that surface again at t = 0.
pub const ORIGIN_NUDGE: f64 = 1e-7;

/// A ray in 3D space.
///
/// The direction is normalized on construction and its component-wise
/// reciprocal is cached for slab tests. Reciprocals of zero components are
/// infinite, which the box test relies on.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub inv_direction: Vec3,
}

impl Ray {
    /// Create a new ray. `direction` does not need to be normalized.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let direction = direction.normalize();
        Self {
            origin: origin + direction * ORIGIN_NUDGE,
            direction,
            inv_direction: direction.recip(),
        }
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_creation() {
        let ray = Ray::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 4.0, 0.0));

        assert_eq!(ray.direction, Vec3::Y);
        assert!((ray.origin - Vec3::new(1.0, 2.0 + ORIGIN_NUDGE, 3.0)).length() < 1e-12);
    }

    #[test]
    fn test_ray_reciprocal() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, -2.0, 0.0));

        assert!(ray.inv_direction.x.is_infinite());
        assert_eq!(ray.inv_direction.y, -1.0);
        assert!(ray.inv_direction.z.is_infinite());
    }

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let start = ray.origin;

        assert_eq!(ray.at(0.0), start);
        assert!((ray.at(2.0) - (start + Vec3::new(2.0, 0.0, 0.0))).length() < 1e-12);
        assert!((ray.at(-1.0) - (start - Vec3::X)).length() < 1e-12);
    }

    #[test]
    fn test_ray_copy() {
        let ray1 = Ray::new(Vec3::ZERO, Vec3::Y);
        let ray2 = ray1; // Copy, not move

        assert_eq!(ray1.origin, ray2.origin);
        assert_eq!(ray1.at(1.0), ray2.at(1.0));
    }
}
