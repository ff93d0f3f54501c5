//! Surface materials.
//!
//! A material is described in the scene file by a [`MaterialDesc`]: shared
//! scalar properties plus a color source. Resolving the description loads
//! any texture and yields a render-ready [`Material`].

use std::sync::Arc;

use octa_math::{Vec2, Vec3};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::pattern::Pattern;
use crate::texture::{Texture, TextureCache, TextureResult};
use crate::Color;

/// Scalar material properties shared by every color source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialProps {
    /// How much light passes through [0, 1].
    pub transparency: f64,
    /// How strongly the surroundings are mirrored [0, 1].
    pub specularity: f64,
    /// Strength of light source highlights [0, 1].
    pub shininess: f64,
    /// Tightness of light source highlights [0, 100].
    pub shininess_sharpness: f64,
    /// Blur of mirrored reflections [0, 1].
    pub roughness: f64,
    pub rough_rays: u32,
    /// Blur of transmitted light [0, 1].
    pub cloudiness: f64,
    pub cloudy_rays: u32,
    /// Index of refraction.
    pub ior: f64,
}

impl Default for MaterialProps {
    fn default() -> Self {
        Self {
            transparency: 0.0,
            specularity: 0.0,
            shininess: 0.0,
            shininess_sharpness: 0.0,
            roughness: 0.0,
            rough_rays: 3,
            cloudiness: 0.0,
            cloudy_rays: 3,
            ior: 1.0,
        }
    }
}

impl MaterialProps {
    /// Every property forced into its valid range.
    pub fn clamped(&self) -> Self {
        Self {
            transparency: self.transparency.clamp(0.0, 1.0),
            specularity: self.specularity.clamp(0.0, 1.0),
            shininess: self.shininess.clamp(0.0, 1.0),
            shininess_sharpness: self.shininess_sharpness.clamp(0.0, 100.0),
            roughness: self.roughness.clamp(0.0, 1.0),
            rough_rays: self.rough_rays.max(1),
            cloudiness: self.cloudiness.clamp(0.0, 1.0),
            cloudy_rays: self.cloudy_rays.max(1),
            ior: self.ior.clamp(0.001, 10.0),
        }
    }
}

fn white() -> Color {
    Color::ONE
}

/// Where a material's colors come from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Surface {
    Uniform {
        #[serde(default = "white")]
        diffuse: Color,
        #[serde(default = "white")]
        specular: Color,
        #[serde(default = "white")]
        transparent: Color,
    },
    /// Diffuse color from a pattern; black without one.
    Procedural {
        #[serde(default)]
        pattern: Option<Pattern>,
        #[serde(default = "white")]
        specular: Color,
        #[serde(default = "white")]
        transparent: Color,
    },
    /// Diffuse color from an image file.
    Texture {
        file: String,
        #[serde(default = "white")]
        specular: Color,
        #[serde(default = "white")]
        transparent: Color,
    },
}

impl Default for Surface {
    fn default() -> Self {
        Surface::Uniform {
            diffuse: white(),
            specular: white(),
            transparent: white(),
        }
    }
}

/// A named material as written in a scene file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialDesc {
    pub name: String,
    #[serde(flatten)]
    pub props: MaterialProps,
    #[serde(flatten)]
    pub surface: Surface,
}

impl MaterialDesc {
    /// Uniform material with the given diffuse color.
    pub fn uniform(name: impl Into<String>, diffuse: Color) -> Self {
        Self {
            name: name.into(),
            props: MaterialProps::default(),
            surface: Surface::Uniform {
                diffuse,
                specular: white(),
                transparent: white(),
            },
        }
    }

    /// Procedural material driven by `pattern`.
    pub fn procedural(name: impl Into<String>, pattern: Pattern) -> Self {
        Self {
            name: name.into(),
            props: MaterialProps::default(),
            surface: Surface::Procedural {
                pattern: Some(pattern),
                specular: white(),
                transparent: white(),
            },
        }
    }

    /// Texture material reading `file` (relative to the scene directory).
    pub fn texture(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            props: MaterialProps::default(),
            surface: Surface::Texture {
                file: file.into(),
                specular: white(),
                transparent: white(),
            },
        }
    }

    pub fn with_transparency(mut self, transparency: f64, ior: f64) -> Self {
        self.props.transparency = transparency;
        self.props.ior = ior;
        self
    }

    pub fn with_specularity(mut self, specularity: f64) -> Self {
        self.props.specularity = specularity;
        self
    }

    pub fn with_shininess(mut self, shininess: f64, sharpness: f64) -> Self {
        self.props.shininess = shininess;
        self.props.shininess_sharpness = sharpness;
        self
    }

    pub fn with_roughness(mut self, roughness: f64, rays: u32) -> Self {
        self.props.roughness = roughness;
        self.props.rough_rays = rays;
        self
    }

    pub fn with_cloudiness(mut self, cloudiness: f64, rays: u32) -> Self {
        self.props.cloudiness = cloudiness;
        self.props.cloudy_rays = rays;
        self
    }

    /// Clamp the properties and load any texture through `textures`.
    pub fn resolve(&self, textures: &mut TextureCache) -> TextureResult<Material> {
        let (diffuse, specular, transparent) = match &self.surface {
            Surface::Uniform {
                diffuse,
                specular,
                transparent,
            } => (Diffuse::Uniform(*diffuse), *specular, *transparent),
            Surface::Procedural {
                pattern,
                specular,
                transparent,
            } => (Diffuse::Pattern(pattern.clone()), *specular, *transparent),
            Surface::Texture {
                file,
                specular,
                transparent,
            } => (Diffuse::Texture(textures.load(file)?), *specular, *transparent),
        };

        let props = self.props.clamped();
        if props != self.props {
            log::warn!("Material {}: properties clamped to valid range", self.name);
        }

        Ok(Material {
            name: self.name.clone(),
            props,
            diffuse,
            specular,
            transparent,
        })
    }
}

/// Diffuse color source of a resolved material.
#[derive(Clone, Debug)]
pub enum Diffuse {
    Uniform(Color),
    Pattern(Option<Pattern>),
    Texture(Arc<Texture>),
}

/// A render-ready material.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub props: MaterialProps,
    pub diffuse: Diffuse,
    pub specular: Color,
    pub transparent: Color,
}

impl Material {
    /// Diffuse color at a hit.
    ///
    /// Textures read `uv`, falling back to the point's x and y. Patterns
    /// read `pattern_point` when the primitive supplies one.
    pub fn diffuse_color(
        &self,
        point: Vec3,
        uv: Option<Vec2>,
        pattern_point: Option<Vec3>,
        rng: &mut dyn RngCore,
    ) -> Color {
        match &self.diffuse {
            Diffuse::Uniform(c) => *c,
            Diffuse::Pattern(Some(pattern)) => pattern.color(pattern_point.unwrap_or(point), rng),
            Diffuse::Pattern(None) => Color::ZERO,
            Diffuse::Texture(texture) => {
                let uv = uv.unwrap_or(Vec2::new(point.x, point.y));
                texture.sample(uv.x, uv.y)
            }
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.props.transparency <= 0.0
    }
}
