//! Light sources and the local illumination model.

use octa_math::Vec3;
use serde::{Deserialize, Serialize};

use crate::material::MaterialProps;
use crate::Color;

/// What kind of emitter a [`Light`] is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LightKind {
    Point,
    /// Area light sampled with `num_rays` jittered shadow feelers.
    Sphere {
        #[serde(default = "default_radius")]
        radius: f64,
        #[serde(default = "default_num_rays")]
        num_rays: u32,
    },
    /// Follows the camera origin.
    Head {
        #[serde(default = "default_true")]
        use_decay: bool,
    },
}

fn default_radius() -> f64 {
    0.3
}

fn default_num_rays() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_intensity() -> f64 {
    1.0
}

fn default_decay() -> f64 {
    0.1
}

fn white() -> Color {
    Color::ONE
}

/// A light source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Light {
    #[serde(default)]
    pub origin: Vec3,
    #[serde(default = "white")]
    pub color: Color,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
    #[serde(default = "default_decay")]
    pub decay_rate: f64,
    #[serde(flatten)]
    pub kind: LightKind,
}

impl Light {
    pub fn point(origin: Vec3, color: Color) -> Self {
        Self {
            origin,
            color,
            intensity: default_intensity(),
            decay_rate: default_decay(),
            kind: LightKind::Point,
        }
    }

    pub fn sphere(origin: Vec3, color: Color, radius: f64, num_rays: u32) -> Self {
        Self {
            kind: LightKind::Sphere { radius, num_rays },
            ..Self::point(origin, color)
        }
    }

    pub fn headlight(color: Color, use_decay: bool) -> Self {
        Self {
            kind: LightKind::Head { use_decay },
            ..Self::point(Vec3::ZERO, color)
        }
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_decay(mut self, decay_rate: f64) -> Self {
        self.decay_rate = decay_rate;
        self
    }

    /// Replace invalid values with their defaults.
    pub fn sanitized(mut self) -> Self {
        if self.intensity < 0.0 {
            log::warn!("Light intensity {} < 0, using 1", self.intensity);
            self.intensity = default_intensity();
        }
        if self.decay_rate < 0.0 {
            log::warn!("Light decay rate {} < 0, using 0.1", self.decay_rate);
            self.decay_rate = default_decay();
        }
        if let LightKind::Sphere { radius, num_rays } = &mut self.kind {
            if *radius < 0.0 {
                log::warn!("Sphere light radius {} < 0, using 0", radius);
                *radius = 0.0;
            }
            *num_rays = (*num_rays).max(1);
        }
        self
    }

    /// Where the light sits for a camera at `eye`.
    pub fn position(&self, eye: Vec3) -> Vec3 {
        match self.kind {
            LightKind::Head { .. } => eye,
            _ => self.origin,
        }
    }

    fn decays(&self) -> bool {
        let enabled = match self.kind {
            LightKind::Head { use_decay } => use_decay,
            _ => true,
        };
        enabled && self.decay_rate > 0.0
    }

    /// Diffuse and specular intensity for one light sample.
    ///
    /// `to_light` runs from the surface point to the light and keeps its
    /// length; `reflected` and `normal` are unit vectors. A zero-length
    /// light vector contributes nothing.
    pub fn lighting(
        &self,
        props: &MaterialProps,
        to_light: Vec3,
        reflected: Vec3,
        normal: Vec3,
    ) -> (f64, f64) {
        let distance = to_light.length();
        if distance <= 0.0 {
            return (0.0, 0.0);
        }
        let l = to_light / distance;

        let diffuse = l.dot(normal).max(0.0);
        let specular = l
            .dot(reflected)
            .max(0.0)
            .powf(props.shininess_sharpness * 30.0);
        let shiny_amount = props.shininess * 2.0;

        let falloff = if self.decays() {
            distance * self.decay_rate
        } else {
            1.0
        };

        (
            self.intensity * diffuse / falloff,
            self.intensity * specular * shiny_amount / falloff,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shiny() -> MaterialProps {
        MaterialProps {
            shininess: 0.5,
            shininess_sharpness: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_point_light_lighting() {
        let light = Light::point(Vec3::new(0.0, 10.0, 0.0), Color::ONE);
        let (d, s) = light.lighting(&shiny(), Vec3::new(0.0, 10.0, 0.0), Vec3::Y, Vec3::Y);

        // Head-on: cos = 1, divided by distance * decay = 1
        assert!((d - 1.0).abs() < 1e-12);
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_lighting_back_facing() {
        let light = Light::point(Vec3::ZERO, Color::ONE);
        let (d, s) = light.lighting(&shiny(), Vec3::new(0.0, -2.0, 0.0), Vec3::Y, Vec3::Y);

        assert_eq!(d, 0.0);
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_lighting_zero_length() {
        let light = Light::point(Vec3::ZERO, Color::ONE);
        assert_eq!(
            light.lighting(&shiny(), Vec3::ZERO, Vec3::Y, Vec3::Y),
            (0.0, 0.0)
        );
    }

    #[test]
    fn test_headlight_without_decay() {
        let light = Light::headlight(Color::ONE, false).with_intensity(2.0);
        let (d, _) = light.lighting(&shiny(), Vec3::new(0.0, 0.0, 50.0), Vec3::Z, Vec3::Z);
        assert!((d - 2.0).abs() < 1e-12);

        assert_eq!(light.position(Vec3::new(1.0, 2.0, 3.0)), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_sanitized() {
        let light = Light::sphere(Vec3::ZERO, Color::ONE, -1.0, 0)
            .with_intensity(-3.0)
            .with_decay(-0.5)
            .sanitized();

        assert_eq!(light.intensity, 1.0);
        assert_eq!(light.decay_rate, 0.1);
        assert_eq!(
            light.kind,
            LightKind::Sphere {
                radius: 0.0,
                num_rays: 1
            }
        );
    }

    #[test]
    fn test_light_from_json() {
        let light: Light =
            serde_json::from_str(r#"{"type": "sphere", "origin": [1, 2, 3], "radius": 0.5}"#)
                .unwrap();

        assert_eq!(light.origin, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(light.intensity, 1.0);
        assert_eq!(
            light.kind,
            LightKind::Sphere {
                radius: 0.5,
                num_rays: 3
            }
        );

        let head: Light = serde_json::from_str(r#"{"type": "head"}"#).unwrap();
        assert_eq!(head.kind, LightKind::Head { use_decay: true });
    }
}
