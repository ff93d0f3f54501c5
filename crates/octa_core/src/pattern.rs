//! Procedural diffuse patterns.
//!
//! A pattern maps a lookup point to a color. The point is usually the hit
//! position; some primitives substitute their own lookup vector.

use octa_math::Vec3;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::sampling::gaussian;
use crate::Color;

/// A procedural color source for `Surface::Procedural` materials.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pattern {
    /// 3D checkerboard of unit cells.
    Checker {
        #[serde(default = "black")]
        color1: Color,
        #[serde(default = "white")]
        color2: Color,
        #[serde(default)]
        offset: Vec3,
        #[serde(default = "one")]
        scale: f64,
    },
    /// Random per-lookup blend of three colors.
    Noise {
        #[serde(default = "red")]
        color1: Color,
        #[serde(default = "green")]
        color2: Color,
        #[serde(default = "blue")]
        color3: Color,
        #[serde(default = "one")]
        amplify: f64,
    },
    /// Thin lines along integer coordinates.
    Grid {
        #[serde(default = "black")]
        color1: Color,
        #[serde(default = "white")]
        color2: Color,
        #[serde(default = "grid_width")]
        width: f64,
    },
    /// The lookup point itself, interpreted as RGB.
    Hatch,
}

fn black() -> Color {
    Color::ZERO
}

fn white() -> Color {
    Color::ONE
}

fn red() -> Color {
    Color::X
}

fn green() -> Color {
    Color::Y
}

fn blue() -> Color {
    Color::Z
}

fn one() -> f64 {
    1.0
}

fn grid_width() -> f64 {
    0.01
}

impl Pattern {
    /// Checker with the default black and white cells.
    pub fn checker() -> Self {
        Pattern::Checker {
            color1: black(),
            color2: white(),
            offset: Vec3::ZERO,
            scale: 1.0,
        }
    }

    /// Color at `p`. Only `Noise` consumes randomness.
    pub fn color(&self, p: Vec3, rng: &mut dyn RngCore) -> Color {
        match self {
            Pattern::Checker {
                color1,
                color2,
                offset,
                scale,
            } => {
                let c = checker_value((p + *offset) * *scale);
                *color1 * c + *color2 * (1.0 - c)
            }
            Pattern::Noise {
                color1,
                color2,
                color3,
                amplify,
            } => {
                let out = *color1 * ((gaussian(rng) + 1.0) / 2.0)
                    + *color2 * ((gaussian(rng) + 1.0) / 2.0)
                    + *color3 * ((gaussian(rng) + 1.0) / 2.0);
                out * (*amplify / 3.0)
            }
            Pattern::Grid {
                color1,
                color2,
                width,
            } => {
                let c = grid_value(p, *width);
                *color2 * c + *color1 * (1.0 - c)
            }
            Pattern::Hatch => p,
        }
    }
}

/// 1.0 or 0.0 depending on which checker cell `p` falls in.
fn checker_value(p: Vec3) -> f64 {
    // Truncating remainders, so cells mirror across the axes. The sign
    // rules below undo that.
    let a = (p.x % 2.0) as i64;
    let b = (p.y % 2.0) as i64;
    let c = (p.z % 2.0) as i64;

    let opposite = p.x * p.z < 0.0;
    let mut value = match (b == 0, opposite) {
        (true, true) => (-a == c) as u8,
        (true, false) => (a != c) as u8,
        (false, true) => (-a != c) as u8,
        (false, false) => (a == c) as u8,
    };

    if p.y < 0.0 {
        value = 1 - value;
    }
    value as f64
}

/// 1.0 inside a cell, 0.0 on a grid line.
///
/// Offsets are signed, so only the positive side of each line is drawn.
fn grid_value(p: Vec3, width: f64) -> f64 {
    let d = 0.5 - width;
    let a = p.x - p.x.round_ties_even();
    let b = p.y - p.y.round_ties_even();
    let c = p.z - p.z.round_ties_even();

    if a < d && b < d && c < d {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_checker_alternates() {
        let mut rng = StdRng::seed_from_u64(42);
        let checker = Pattern::checker();

        let here = checker.color(Vec3::new(0.5, 0.5, 0.5), &mut rng);
        let next_x = checker.color(Vec3::new(1.5, 0.5, 0.5), &mut rng);
        let next_z = checker.color(Vec3::new(0.5, 0.5, 1.5), &mut rng);

        assert_ne!(here, next_x);
        assert_ne!(here, next_z);
        assert_eq!(next_x, next_z);

        // Only ever one of the two colors
        for c in [here, next_x, next_z] {
            assert!(c == Color::ZERO || c == Color::ONE);
        }
    }

    #[test]
    fn test_checker_flips_below_ground() {
        let mut rng = StdRng::seed_from_u64(42);
        let checker = Pattern::checker();

        let above = checker.color(Vec3::new(0.5, 0.5, 0.5), &mut rng);
        let below = checker.color(Vec3::new(0.5, -0.5, 0.5), &mut rng);
        assert_ne!(above, below);
    }

    #[test]
    fn test_grid_lines() {
        let mut rng = StdRng::seed_from_u64(42);
        let grid = Pattern::Grid {
            color1: Color::ZERO,
            color2: Color::ONE,
            width: 0.1,
        };

        // Cell interior takes color2
        assert_eq!(grid.color(Vec3::new(0.2, 0.1, 0.3), &mut rng), Color::ONE);
        // Just below the next integer on x is a line
        assert_eq!(grid.color(Vec3::new(0.45, 0.1, 0.3), &mut rng), Color::ZERO);
    }

    #[test]
    fn test_hatch_is_position() {
        let mut rng = StdRng::seed_from_u64(42);
        let p = Vec3::new(0.1, 0.2, 0.3);
        assert_eq!(Pattern::Hatch.color(p, &mut rng), p);
    }

    #[test]
    fn test_noise_average() {
        let mut rng = StdRng::seed_from_u64(42);
        let noise = Pattern::Noise {
            color1: Color::X,
            color2: Color::Y,
            color3: Color::Z,
            amplify: 3.0,
        };

        let n = 4000;
        let mean = (0..n)
            .map(|_| noise.color(Vec3::ZERO, &mut rng))
            .fold(Color::ZERO, |acc, c| acc + c)
            / n as f64;

        // E[(g + 1) / 2] = 0.5 per channel
        assert!((mean - Color::splat(0.5)).length() < 0.05);
    }

    #[test]
    fn test_pattern_from_json() {
        let p: Pattern = serde_json::from_str(r#"{"type": "grid", "width": 0.05}"#).unwrap();
        assert_eq!(
            p,
            Pattern::Grid {
                color1: Color::ZERO,
                color2: Color::ONE,
                width: 0.05
            }
        );

        let h: Pattern = serde_json::from_str(r#"{"type": "hatch"}"#).unwrap();
        assert_eq!(h, Pattern::Hatch);
    }
}
