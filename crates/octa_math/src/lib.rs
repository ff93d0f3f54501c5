//! Math types shared by the octa crates.
//!
//! Everything works in double precision: `Vec3` here is glam's `DVec3`.

// Re-export glam for convenience
pub use glam::*;

pub use glam::DVec2 as Vec2;
pub use glam::DVec3 as Vec3;

mod aabb;
mod interval;
mod ray;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::{Ray, ORIGIN_NUDGE};
