//! Render configuration.

use serde::{Deserialize, Serialize};

use crate::Color;

/// Octree construction and traversal parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvtParams {
    /// A node with at most this many primitives becomes a leaf.
    pub threshold: usize,
    pub max_depth: u32,
    /// Trees with fewer nodes are discarded in favor of a linear scan.
    pub node_threshold: usize,
    /// Step past a node's exit when walking to the next leaf.
    pub epsilon: f64,
}

impl Default for BvtParams {
    fn default() -> Self {
        Self {
            threshold: 10,
            max_depth: 12,
            node_threshold: 5,
            epsilon: 1e-6,
        }
    }
}

/// Replaces shadow feelers with `scale / distance_from_eye^exponent`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FakeShadow {
    pub scale: f64,
    pub exponent: f64,
}

impl Default for FakeShadow {
    fn default() -> Self {
        Self {
            scale: 1.0,
            exponent: 1.0,
        }
    }
}

/// Everything that controls a render besides the scene content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    /// Recursion budget for reflection and refraction rays.
    pub max_depth: u32,
    /// Extra samples per critical pixel; 0 disables antialiasing.
    pub aa_rays: u32,
    pub threads: usize,
    /// Rows claimed by a worker at a time.
    pub rowstep: u32,
    /// Per-channel tolerance in 8-bit steps for edge detection.
    pub color_delta: f64,
    pub use_bvt: bool,
    /// Use the diffuse color as-is, without lights.
    pub no_lighting: bool,
    /// Treat every light as unoccluded.
    pub no_shadow_feelers: bool,
    pub fake_distance_shadow: Option<FakeShadow>,
    pub environment: Color,
    pub seed: u64,
    pub bvt: BvtParams,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            max_depth: 4,
            aa_rays: 0,
            threads: 2,
            rowstep: 6,
            color_delta: 2.0,
            use_bvt: true,
            no_lighting: false,
            no_shadow_feelers: false,
            fake_distance_shadow: None,
            environment: Color::ZERO,
            seed: 0,
            bvt: BvtParams::default(),
        }
    }
}

impl RenderSettings {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_aa_rays(mut self, aa_rays: u32) -> Self {
        self.aa_rays = aa_rays;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Settings with unusable values replaced.
    pub fn sanitized(mut self) -> Self {
        if self.width == 0 || self.height == 0 {
            log::warn!(
                "Image size {}x{} is empty, using 1x1 minimum",
                self.width,
                self.height
            );
            self.width = self.width.max(1);
            self.height = self.height.max(1);
        }
        if self.threads == 0 {
            log::warn!("threads = 0, using 1");
            self.threads = 1;
        }
        if self.rowstep == 0 {
            log::warn!("rowstep = 0, using 1");
            self.rowstep = 1;
        }
        if self.color_delta.is_nan() || self.color_delta < 0.0 {
            log::warn!("color_delta {} invalid, using 2", self.color_delta);
            self.color_delta = 2.0;
        }
        if self.bvt.epsilon.is_nan() || self.bvt.epsilon <= 0.0 {
            log::warn!("BVT epsilon {} invalid, using 1e-6", self.bvt.epsilon);
            self.bvt.epsilon = BvtParams::default().epsilon;
        }
        self
    }
}
