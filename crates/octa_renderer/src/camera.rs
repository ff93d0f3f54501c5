//! Pinhole camera with optional depth of field.

use octa_core::sampling::gaussian;
use octa_math::{Ray, Vec3};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Camera as written in a scene file.
///
/// When `look_at` is set it overrides `view_dir`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDesc {
    pub origin: Vec3,
    pub view_dir: Vec3,
    pub up_dir: Vec3,
    pub look_at: Option<Vec3>,
    /// Vertical field of view in degrees.
    pub fov: f64,
    /// Distance to the plane of perfect focus; 0 disables depth of field.
    pub focal_distance: f64,
    pub dof_amount: f64,
    pub dof_rays: u32,
}

impl Default for CameraDesc {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            view_dir: -Vec3::Z,
            up_dir: Vec3::Y,
            look_at: None,
            fov: 60.0,
            focal_distance: 0.0,
            dof_amount: 0.25,
            dof_rays: 3,
        }
    }
}

impl CameraDesc {
    pub fn build(&self) -> Camera {
        let camera = match self.look_at {
            Some(target) => Camera::new().with_position(self.origin, target, self.up_dir),
            None => Camera::new().with_orientation(self.origin, self.view_dir, self.up_dir),
        };
        camera
            .with_fov(self.fov)
            .with_depth_of_field(self.focal_distance, self.dof_amount, self.dof_rays)
    }
}

/// Camera for generating primary rays.
///
/// Pixel coordinates are in image space: x grows to the right, y grows
/// downward, and the image center maps to the view direction. Coordinates
/// may be fractional for antialiasing.
#[derive(Clone, Debug)]
pub struct Camera {
    origin: Vec3,
    view_dir: Vec3,
    up_dir: Vec3,
    right_dir: Vec3,
    /// Vertical field of view in radians.
    fov: f64,

    focal_distance: f64,
    dof_amount: f64,
    dof_rays: u32,
    /// Focal plane offset along `-view_dir`.
    dof_lambda: f64,

    // Set by initialize()
    width: u32,
    height: u32,
    plane_vec: Vec3,
}

impl Camera {
    /// Camera at the origin looking down -Z.
    pub fn new() -> Self {
        Self {
            origin: Vec3::ZERO,
            view_dir: -Vec3::Z,
            up_dir: Vec3::Y,
            right_dir: Vec3::X,
            fov: 60f64.to_radians(),
            focal_distance: 0.0,
            dof_amount: 0.25,
            dof_rays: 3,
            dof_lambda: 0.0,
            width: 0,
            height: 0,
            plane_vec: Vec3::ZERO,
        }
    }

    /// Place the camera at `origin` looking at `target`. `up` sets the roll.
    pub fn with_position(self, origin: Vec3, target: Vec3, up: Vec3) -> Self {
        self.with_orientation(origin, target - origin, up)
    }

    /// Place the camera at `origin` looking along `view_dir`.
    ///
    /// The basis is re-orthonormalized: right is `view x up`, and up is
    /// recomputed as `right x view`.
    pub fn with_orientation(mut self, origin: Vec3, view_dir: Vec3, up: Vec3) -> Self {
        let view = view_dir.normalize_or_zero();
        let view = if view == Vec3::ZERO { -Vec3::Z } else { view };

        let mut right = view.cross(up.normalize_or_zero()).normalize_or_zero();
        if right == Vec3::ZERO {
            // `up` parallel to the view direction; pick any perpendicular
            right = view.any_orthonormal_vector();
        }

        self.origin = origin;
        self.view_dir = view;
        self.right_dir = right;
        self.up_dir = right.cross(view).normalize();
        self.update_dof_plane();
        self
    }

    /// Set the vertical field of view in degrees.
    pub fn with_fov(mut self, degrees: f64) -> Self {
        self.fov = degrees.to_radians();
        self
    }

    pub fn with_depth_of_field(mut self, focal_distance: f64, amount: f64, rays: u32) -> Self {
        self.focal_distance = focal_distance;
        self.dof_amount = amount;
        self.dof_rays = rays.max(1);
        self.update_dof_plane();
        self
    }

    fn update_dof_plane(&mut self) {
        self.dof_lambda = if self.focal_distance != 0.0 {
            (self.origin + self.view_dir * self.focal_distance).dot(-self.view_dir)
        } else {
            0.0
        };
    }

    /// Set the image resolution. Must be called before casting rays.
    pub fn initialize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.plane_vec = self.view_dir * ((0.5 * height as f64) / (0.5 * self.fov).tan());
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn view_dir(&self) -> Vec3 {
        self.view_dir
    }

    pub fn up_dir(&self) -> Vec3 {
        self.up_dir
    }

    pub fn right_dir(&self) -> Vec3 {
        self.right_dir
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_depth_of_field(&self) -> bool {
        self.focal_distance != 0.0
    }

    pub fn dof_rays(&self) -> u32 {
        self.dof_rays
    }

    /// Ray through image position (x, y).
    pub fn cast_ray(&self, x: f64, y: f64) -> Ray {
        let up_steps = -y + 0.5 * self.height as f64;
        let right_steps = x - 0.5 * self.width as f64;

        let dir = self.plane_vec + self.up_dir * up_steps + self.right_dir * right_steps;
        Ray::new(self.origin, dir)
    }

    /// Where `clear` pierces the focal plane.
    pub fn focal_point(&self, clear: &Ray) -> Vec3 {
        let inv = -self.view_dir;
        let c = clear.direction.dot(inv);
        let alpha = (self.dof_lambda - clear.origin.dot(inv)) / c;
        clear.at(alpha)
    }

    /// A ray from a jittered lens position through `focal_point`.
    pub fn dof_ray(&self, focal_point: Vec3, rng: &mut dyn RngCore) -> Ray {
        let offset_x = gaussian(rng) * 0.5 * self.dof_amount;
        let offset_y = gaussian(rng) * 0.5 * self.dof_amount;

        let origin = self.origin + self.up_dir * offset_y + self.right_dir * offset_x;
        Ray::new(origin, focal_point - origin)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
