use crate::{Interval, Ray, Vec3};

/// Axis-aligned bounding box stored as center and half-extents ("radii").
///
/// The corners are derived once on construction, so the box is immutable:
/// `upper == center + radii` and `lower == center - radii` always hold.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    center: Vec3,
    radii: Vec3,
    lower: Vec3,
    upper: Vec3,
}

impl Aabb {
    /// Create a box from its center and half-extents.
    pub fn new(center: Vec3, radii: Vec3) -> Self {
        Self {
            center,
            radii,
            lower: center - radii,
            upper: center + radii,
        }
    }

    /// Create an AABB from two corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self::new((max + min) * 0.5, (max - min) * 0.5)
    }

    /// Smallest box enclosing all `boxes`.
    ///
    /// An empty iterator yields a zero-sized box at the origin.
    pub fn enclosing<I>(boxes: I) -> Self
    where
        I: IntoIterator<Item = Aabb>,
    {
        let mut min = Vec3::splat(f64::INFINITY);
        let mut max = Vec3::splat(f64::NEG_INFINITY);
        let mut any = false;

        for b in boxes {
            min = min.min(b.lower);
            max = max.max(b.upper);
            any = true;
        }

        if !any {
            return Self::new(Vec3::ZERO, Vec3::ZERO);
        }
        Self::from_points(min, max)
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radii(&self) -> Vec3 {
        self.radii
    }

    pub fn lower(&self) -> Vec3 {
        self.lower
    }

    pub fn upper(&self) -> Vec3 {
        self.upper
    }

    /// The same box stretched to a cube using its largest radius, then
    /// scaled by `scale`.
    pub fn cubed(&self, scale: f64) -> Self {
        let r = self.radii.max_element();
        Self::new(self.center, Vec3::splat(r * scale))
    }

    /// Split into eight equal octants.
    ///
    /// Children are ordered x-major, then y, then z, negative half first, so
    /// the index of the octant containing `p` is
    /// `4 * (p.x >= c.x) + 2 * (p.y >= c.y) + (p.z >= c.z)`.
    pub fn subdivide(&self) -> [Aabb; 8] {
        let half = self.radii * 0.5;
        let mut out = [*self; 8];
        let mut index = 0;

        for a in [-1.0, 1.0] {
            for b in [-1.0, 1.0] {
                for c in [-1.0, 1.0] {
                    let center = self.center + Vec3::new(a, b, c) * half;
                    out[index] = Aabb::new(center, half);
                    index += 1;
                }
            }
        }

        out
    }

    /// Do the two boxes overlap (touching counts)?
    pub fn intersects(&self, other: &Aabb) -> bool {
        let dist = (self.center - other.center).abs();
        let reach = self.radii + other.radii;
        dist.x <= reach.x && dist.y <= reach.y && dist.z <= reach.z
    }

    /// Inclusive point containment.
    pub fn contains(&self, p: Vec3) -> bool {
        !(p.x < self.lower.x
            || p.x > self.upper.x
            || p.y < self.lower.y
            || p.y > self.upper.y
            || p.z < self.lower.z
            || p.z > self.upper.z)
    }

    /// Ray parameters where `r` enters and leaves the box.
    ///
    /// Slab test using the ray's reciprocal direction. The entry is clamped
    /// to 0 when the origin is inside. Returns `None` on a miss or when the
    /// box lies entirely behind the ray.
    pub fn entry_exit(&self, r: &Ray) -> Option<Interval> {
        let (mut tmin, mut tmax) = self.slab(r, 0);

        let (tymin, tymax) = self.slab(r, 1);
        if tmin > tymax || tymin > tmax {
            return None;
        }
        if tymin > tmin {
            tmin = tymin;
        }
        if tymax < tmax {
            tmax = tymax;
        }

        let (tzmin, tzmax) = self.slab(r, 2);
        if tmin > tzmax || tzmin > tmax {
            return None;
        }
        if tzmin > tmin {
            tmin = tzmin;
        }
        if tzmax < tmax {
            tmax = tzmax;
        }

        if tmax > 0.0 {
            Some(Interval::new(if tmin < 0.0 { 0.0 } else { tmin }, tmax))
        } else {
            None
        }
    }

    /// Exit parameter only, assuming the ray is known to cross the box.
    pub fn exit(&self, r: &Ray) -> f64 {
        let tx = self.slab(r, 0).1;
        let ty = self.slab(r, 1).1;
        let tz = self.slab(r, 2).1;

        let t = if ty < tx { ty } else { tx };
        if tz < t {
            tz
        } else {
            t
        }
    }

    /// Near and far plane parameters on one axis.
    #[inline]
    fn slab(&self, r: &Ray, axis: usize) -> (f64, f64) {
        let inv = r.inv_direction[axis];
        let o = r.origin[axis];
        if inv >= 0.0 {
            ((self.lower[axis] - o) * inv, (self.upper[axis] - o) * inv)
        } else {
            ((self.upper[axis] - o) * inv, (self.lower[axis] - o) * inv)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::ZERO, Vec3::ONE)
    }

    #[test]
    fn test_aabb_corners() {
        let aabb = Aabb::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.5, 1.0, 2.0));

        assert_eq!(aabb.lower(), Vec3::new(0.5, 1.0, 1.0));
        assert_eq!(aabb.upper(), Vec3::new(1.5, 3.0, 5.0));
    }

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(Vec3::new(10.0, 0.0, 10.0), Vec3::new(0.0, 10.0, 0.0));

        assert_eq!(aabb.center(), Vec3::splat(5.0));
        assert_eq!(aabb.radii(), Vec3::splat(5.0));
    }

    #[test]
    fn test_aabb_enclosing() {
        let a = Aabb::from_points(Vec3::ZERO, Vec3::splat(5.0));
        let b = Aabb::from_points(Vec3::splat(3.0), Vec3::new(10.0, 4.0, 4.0));
        let all = Aabb::enclosing([a, b]);

        assert_eq!(all.lower(), Vec3::ZERO);
        assert_eq!(all.upper(), Vec3::new(10.0, 5.0, 5.0));

        let none = Aabb::enclosing(std::iter::empty());
        assert_eq!(none.center(), Vec3::ZERO);
        assert_eq!(none.radii(), Vec3::ZERO);
    }

    #[test]
    fn test_aabb_cubed() {
        let aabb = Aabb::new(Vec3::ONE, Vec3::new(1.0, 3.0, 2.0)).cubed(2.0);

        assert_eq!(aabb.center(), Vec3::ONE);
        assert_eq!(aabb.radii(), Vec3::splat(6.0));
    }

    #[test]
    fn test_entry_exit_hit() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let span = unit_box().entry_exit(&ray).unwrap();

        assert!(span.min <= span.max);
        assert!((span.min - 4.0).abs() < 1e-6);
        assert!((span.max - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_entry_exit_misses() {
        // Passing beside the box
        let ray = Ray::new(Vec3::new(3.0, 0.0, -5.0), Vec3::Z);
        assert!(unit_box().entry_exit(&ray).is_none());

        // Box behind the ray
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), -Vec3::Z);
        assert!(unit_box().entry_exit(&ray).is_none());

        // Diagonal ray whose path stays outside
        let ray = Ray::new(Vec3::new(-5.0, 3.0, 0.0), Vec3::new(1.0, 0.1, 0.0));
        assert!(unit_box().entry_exit(&ray).is_none());
    }

    #[test]
    fn test_entry_exit_from_inside() {
        let ray = Ray::new(Vec3::new(0.2, -0.3, 0.1), Vec3::new(1.0, 1.0, 0.0));
        let span = unit_box().entry_exit(&ray).unwrap();

        assert_eq!(span.min, 0.0);
        assert!(span.max > 0.0);
        assert!((span.max - unit_box().exit(&ray)).abs() < 1e-12);
    }

    #[test]
    fn test_subdivide_partitions_parent() {
        let parent = Aabb::new(Vec3::new(1.0, -2.0, 0.5), Vec3::new(2.0, 1.0, 4.0));
        let children = parent.subdivide();

        let volume = |b: &Aabb| {
            let r = b.radii() * 2.0;
            r.x * r.y * r.z
        };
        let total: f64 = children.iter().map(volume).sum();
        assert!((total - volume(&parent)).abs() < 1e-9);

        for (i, child) in children.iter().enumerate() {
            // Every child has the parent's center as one of its corners
            let c = parent.center();
            let shares_center = (0..3).all(|a| {
                (child.lower()[a] - c[a]).abs() < 1e-12 || (child.upper()[a] - c[a]).abs() < 1e-12
            });
            assert!(shares_center);

            // Octant index matches the documented ordering
            let p = child.center();
            let expected = 4 * (p.x >= c.x) as usize + 2 * (p.y >= c.y) as usize + (p.z >= c.z) as usize;
            assert_eq!(expected, i);

            // Pairwise overlap has zero volume
            for other in children.iter().skip(i + 1) {
                let lo = child.lower().max(other.lower());
                let hi = child.upper().min(other.upper());
                let ext = (hi - lo).max(Vec3::ZERO);
                assert!(ext.x * ext.y * ext.z < 1e-12);
            }
        }
    }

    #[test]
    fn test_intersects_and_contains() {
        let a = unit_box();
        let touching = Aabb::new(Vec3::new(2.0, 0.0, 0.0), Vec3::ONE);
        let apart = Aabb::new(Vec3::new(2.5, 0.0, 0.0), Vec3::ONE);

        assert!(a.intersects(&touching));
        assert!(!a.intersects(&apart));

        assert!(a.contains(Vec3::ONE));
        assert!(a.contains(Vec3::ZERO));
        assert!(!a.contains(Vec3::new(1.0, 1.0, 1.0001)));
    }
}
