//! Scene description, preparation and the row-level render entry points.
//!
//! A [`SceneDescription`] is what a scene file holds: settings, a camera,
//! named materials, objects referring to materials by name, and lights.
//! [`SceneDescription::prepare`] turns it into an immutable [`Scene`] with
//! resolved materials, loaded meshes and textures, and the octree. A
//! prepared scene is shared read-only between render workers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use octa_core::{
    load_obj, load_off, Color, Light, Material, MaterialDesc, RenderSettings, TextureCache,
    TriangleMesh,
};
use octa_math::{Ray, Vec2, Vec3};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::blob::{Blob, BlobParams, Charge};
use crate::bvt::{transmission_linear, Bvt};
use crate::camera::{Camera, CameraDesc};
use crate::error::{SceneError, SceneResult};
use crate::hit::{nearest_linear, Hit, MaterialId, Primitive};
use crate::image::{
    subpixel_offsets, CriticalMap, ImageBuffer, Pixel, RowBlock, RowJob, RowResult,
};
use crate::julia::{Julia, JuliaParams};
use crate::mandelbulb::{Mandelbulb, MandelbulbParams};
use crate::sphere::Sphere;
use crate::triangle::Triangle;

/// One object in a scene file. Meshes expand into many triangles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectDesc {
    Sphere {
        center: Vec3,
        radius: f64,
        material: String,
    },
    Triangle {
        vertices: [Vec3; 3],
        #[serde(default)]
        normals: Option<[Vec3; 3]>,
        #[serde(default)]
        uvs: Option<[Vec2; 3]>,
        material: String,
    },
    Blob {
        charges: Vec<Charge>,
        #[serde(flatten)]
        params: BlobParams,
        material: String,
    },
    Mandelbulb {
        #[serde(flatten)]
        params: MandelbulbParams,
        material: String,
    },
    Julia {
        #[serde(flatten)]
        params: JuliaParams,
        material: String,
    },
    ObjMesh {
        file: String,
        #[serde(default)]
        origin: Vec3,
        /// Interpolate vertex normals, computing them if the file has none.
        #[serde(default)]
        smooth: bool,
        material: String,
    },
    OffMesh {
        file: String,
        #[serde(default)]
        origin: Vec3,
        material: String,
    },
}

impl ObjectDesc {
    pub fn material(&self) -> &str {
        match self {
            ObjectDesc::Sphere { material, .. }
            | ObjectDesc::Triangle { material, .. }
            | ObjectDesc::Blob { material, .. }
            | ObjectDesc::Mandelbulb { material, .. }
            | ObjectDesc::Julia { material, .. }
            | ObjectDesc::ObjMesh { material, .. }
            | ObjectDesc::OffMesh { material, .. } => material,
        }
    }

    pub fn sphere(center: Vec3, radius: f64, material: impl Into<String>) -> Self {
        ObjectDesc::Sphere {
            center,
            radius,
            material: material.into(),
        }
    }

    pub fn triangle(vertices: [Vec3; 3], material: impl Into<String>) -> Self {
        ObjectDesc::Triangle {
            vertices,
            normals: None,
            uvs: None,
            material: material.into(),
        }
    }
}

/// Everything a scene file holds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    pub settings: RenderSettings,
    pub camera: Option<CameraDesc>,
    pub materials: Vec<MaterialDesc>,
    pub objects: Vec<ObjectDesc>,
    pub lights: Vec<Light>,
    /// Directory that relative mesh and texture paths resolve against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl SceneDescription {
    pub fn new(camera: CameraDesc) -> Self {
        Self {
            camera: Some(camera),
            ..Default::default()
        }
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_material(mut self, material: MaterialDesc) -> Self {
        self.materials.push(material);
        self
    }

    pub fn with_object(mut self, object: ObjectDesc) -> Self {
        self.objects.push(object);
        self
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    pub fn from_json_str(json: &str) -> SceneResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a scene file. Relative paths inside it resolve against the
    /// file's directory.
    pub fn load(path: impl AsRef<Path>) -> SceneResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut desc = Self::from_json_str(&text)?;
        desc.base_dir = path.parent().map(Path::to_path_buf);
        log::info!(
            "Loaded scene {}: {} materials, {} objects, {} lights",
            path.display(),
            desc.materials.len(),
            desc.objects.len(),
            desc.lights.len()
        );
        Ok(desc)
    }

    fn resolve_path(&self, file: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) if Path::new(file).is_relative() => dir.join(file),
            _ => PathBuf::from(file),
        }
    }

    /// Resolve every reference and build the render-ready scene.
    pub fn prepare(&self) -> SceneResult<Scene> {
        let camera_desc = self.camera.as_ref().ok_or(SceneError::MissingCamera)?;
        let settings = self.settings.clone().sanitized();

        let mut textures = match &self.base_dir {
            Some(dir) => TextureCache::with_base_dir(dir),
            None => TextureCache::new(),
        };

        let mut materials = Vec::with_capacity(self.materials.len());
        let mut by_name: HashMap<&str, MaterialId> = HashMap::new();
        for desc in &self.materials {
            if by_name.insert(desc.name.as_str(), materials.len()).is_some() {
                return Err(SceneError::DuplicateMaterial(desc.name.clone()));
            }
            materials.push(desc.resolve(&mut textures)?);
        }

        let mut primitives = Vec::new();
        for (index, object) in self.objects.iter().enumerate() {
            let name = object.material();
            let material = *by_name
                .get(name)
                .ok_or_else(|| SceneError::UnknownMaterial {
                    name: name.to_string(),
                    object: index,
                })?;
            self.expand_object(object, material, &mut primitives)?;
        }

        let mut camera = camera_desc.build();
        camera.initialize(settings.width, settings.height);

        let lights = self
            .lights
            .iter()
            .map(|l| {
                let mut light = l.clone().sanitized();
                light.origin = light.position(camera.origin());
                light
            })
            .collect();

        Scene::new(settings, camera, primitives, materials, lights)
    }

    fn expand_object(
        &self,
        object: &ObjectDesc,
        material: MaterialId,
        out: &mut Vec<Primitive>,
    ) -> SceneResult<()> {
        match object {
            ObjectDesc::Sphere { center, radius, .. } => {
                out.push(Sphere::new(*center, *radius, material).into());
            }
            ObjectDesc::Triangle {
                vertices: [a, b, c],
                normals,
                uvs,
                ..
            } => {
                let mut tri = Triangle::new(*a, *b, *c, material);
                if let Some(n) = normals {
                    tri = tri.with_normals(*n);
                }
                if let Some(uv) = uvs {
                    tri = tri.with_uvs(*uv);
                }
                out.push(tri.into());
            }
            ObjectDesc::Blob {
                charges, params, ..
            } => {
                out.push(Blob::new(charges.clone(), *params, material).into());
            }
            ObjectDesc::Mandelbulb { params, .. } => {
                out.push(Mandelbulb::new(*params, material).into());
            }
            ObjectDesc::Julia { params, .. } => {
                out.push(Julia::new(*params, material).into());
            }
            ObjectDesc::ObjMesh {
                file,
                origin,
                smooth,
                ..
            } => {
                let mesh = load_obj(&self.resolve_path(file), *origin, *smooth)?;
                extend_with_mesh(out, &mesh, material, file);
            }
            ObjectDesc::OffMesh { file, origin, .. } => {
                let mesh = load_off(&self.resolve_path(file), *origin)?;
                extend_with_mesh(out, &mesh, material, file);
            }
        }
        Ok(())
    }
}

/// One triangle primitive per face, carrying normals and uvs when the mesh
/// has them. Zero-area faces are left out.
pub fn mesh_triangles(
    mesh: &TriangleMesh,
    material: MaterialId,
) -> impl Iterator<Item = Primitive> + '_ {
    mesh.faces().filter_map(move |[a, b, c]| {
        let p = &mesh.positions;
        let mut tri = Triangle::new(p[a], p[b], p[c], material);
        if tri.is_degenerate() {
            return None;
        }
        if let Some(n) = &mesh.normals {
            tri = tri.with_normals([n[a], n[b], n[c]]);
        }
        if let Some(uv) = &mesh.uvs {
            tri = tri.with_uvs([uv[a], uv[b], uv[c]]);
        }
        Some(tri.into())
    })
}

fn extend_with_mesh(
    out: &mut Vec<Primitive>,
    mesh: &TriangleMesh,
    material: MaterialId,
    file: &str,
) {
    let before = out.len();
    out.extend(mesh_triangles(mesh, material));
    let skipped = mesh.triangle_count() - (out.len() - before);
    if skipped > 0 {
        log::warn!("{}: skipped {} degenerate triangles", file, skipped);
    }
}

/// A prepared, immutable scene.
#[derive(Debug)]
pub struct Scene {
    pub settings: RenderSettings,
    pub camera: Camera,
    primitives: Vec<Primitive>,
    materials: Vec<Material>,
    lights: Vec<Light>,
    bvt: Option<Bvt>,
}

impl Scene {
    /// Assemble a scene and build its octree.
    ///
    /// Every primitive must refer to an index in `materials`. The camera is
    /// re-initialized if its resolution differs from the settings.
    pub fn new(
        settings: RenderSettings,
        mut camera: Camera,
        primitives: Vec<Primitive>,
        materials: Vec<Material>,
        lights: Vec<Light>,
    ) -> SceneResult<Self> {
        if let Some((index, p)) = primitives
            .iter()
            .enumerate()
            .find(|(_, p)| p.material() >= materials.len())
        {
            return Err(SceneError::UnknownMaterial {
                name: format!("#{}", p.material()),
                object: index,
            });
        }

        if camera.resolution() != (settings.width, settings.height) {
            camera.initialize(settings.width, settings.height);
        }

        let bvt = if settings.use_bvt {
            let start = Instant::now();
            let tree = Bvt::build(&primitives, &settings.bvt);
            log::info!("BVT built in {:.2?}", start.elapsed());
            tree
        } else {
            None
        };

        log::info!(
            "Scene ready: {} primitives, {} materials, {} lights, {}x{}",
            primitives.len(),
            materials.len(),
            lights.len(),
            settings.width,
            settings.height
        );

        Ok(Self {
            settings,
            camera,
            primitives,
            materials,
            lights,
            bvt,
        })
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn bvt(&self) -> Option<&Bvt> {
        self.bvt.as_ref()
    }

    pub fn width(&self) -> u32 {
        self.settings.width
    }

    pub fn height(&self) -> u32 {
        self.settings.height
    }

    pub(crate) fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id]
    }

    /// Nearest hit, through the octree when there is one.
    pub fn intersect(&self, ray: &Ray) -> Option<Hit> {
        match &self.bvt {
            Some(tree) => tree.nearest_hit(&self.primitives, ray),
            None => nearest_linear(&self.primitives, ray),
        }
    }

    /// Fraction of light that reaches `max_dist` along `ray`.
    pub fn shadow_factor(&self, ray: &Ray, max_dist: f64) -> f64 {
        if self.settings.no_shadow_feelers {
            return 1.0;
        }

        if let Some(fake) = self.settings.fake_distance_shadow {
            let distance = (ray.origin - self.camera.origin()).length();
            return fake.scale / distance.powf(fake.exponent);
        }

        let transparency = |m: MaterialId| self.materials[m].props.transparency;
        match &self.bvt {
            Some(tree) => tree.transmission(&self.primitives, ray, max_dist, transparency),
            None => transmission_linear(&self.primitives, ray, max_dist, transparency),
        }
    }

    /// Color of image position (x, y), which may be fractional.
    pub fn render_pixel(&self, x: f64, y: f64, rng: &mut dyn RngCore) -> Color {
        let depth = self.settings.max_depth;
        let clear = self.camera.cast_ray(x, y);

        if !self.camera.has_depth_of_field() {
            return self.trace_ray(&clear, depth, rng);
        }

        let focus = self.camera.focal_point(&clear);
        let mut pixel = Pixel::EMPTY;
        for _ in 0..self.camera.dof_rays() {
            let ray = self.camera.dof_ray(focus, rng);
            pixel.add_sample(self.trace_ray(&ray, depth, rng));
        }
        pixel.color()
    }

    /// Rows actually available from `y_offset`, clipped to the image.
    fn clip_rows(&self, y_offset: u32, rows: u32) -> u32 {
        rows.min(self.height().saturating_sub(y_offset))
    }

    /// Primary rays for `rows` rows starting at `y_offset`.
    pub fn render_rows(&self, y_offset: u32, rows: u32, rng: &mut dyn RngCore) -> RowBlock {
        let rows = self.clip_rows(y_offset, rows);
        let mut block = RowBlock::new(y_offset, self.width(), rows, Pixel::EMPTY);

        for row in 0..rows {
            let y = (y_offset + row) as f64;
            for x in 0..self.width() {
                *block.get_mut(x, row) = Pixel::new(self.render_pixel(x as f64, y, rng));
            }
        }
        block
    }

    /// Extra samples for the critical pixels among `rows` rows starting at
    /// `y_offset`. Other pixels come back empty, ready to merge.
    pub fn render_rows_antialiased(
        &self,
        y_offset: u32,
        rows: u32,
        critical: &CriticalMap,
        rng: &mut dyn RngCore,
    ) -> RowBlock {
        let rows = self.clip_rows(y_offset, rows);
        let mut block = RowBlock::new(y_offset, self.width(), rows, Pixel::EMPTY);

        for row in 0..rows {
            let y = y_offset + row;
            for x in 0..self.width() {
                if !critical.is_critical(x, y) {
                    continue;
                }
                for (ox, oy) in subpixel_offsets(self.settings.aa_rays, rng) {
                    let color = self.render_pixel(x as f64 + ox, y as f64 + oy, rng);
                    block.get_mut(x, row).add_sample(color);
                }
            }
        }
        block
    }

    pub fn find_critical_pixels(&self, image: &ImageBuffer) -> CriticalMap {
        CriticalMap::find(image, self.settings.color_delta)
    }

    /// Run one coordinator job. Antialiasing jobs without a critical map
    /// have nothing to supersample.
    pub fn run_job(
        &self,
        job: &RowJob,
        critical: Option<&CriticalMap>,
        rng: &mut dyn RngCore,
    ) -> RowResult {
        let block = if job.antialias {
            match critical {
                Some(map) => self.render_rows_antialiased(job.y_offset, job.rows, map, rng),
                None => RowBlock::new(
                    job.y_offset,
                    self.width(),
                    self.clip_rows(job.y_offset, job.rows),
                    Pixel::EMPTY,
                ),
            }
        } else {
            self.render_rows(job.y_offset, job.rows, rng)
        };
        RowResult { id: job.id, block }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octa_core::{BvtParams, LightKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn settings(width: u32, height: u32) -> RenderSettings {
        RenderSettings::default().with_size(width, height)
    }

    fn camera_at_z(z: f64) -> CameraDesc {
        CameraDesc {
            origin: Vec3::new(0.0, 0.0, z),
            ..Default::default()
        }
    }

    #[test]
    fn test_scene_json() {
        let json = r#"{
            "settings": { "width": 32, "height": 24, "aa_rays": 4 },
            "camera": { "origin": [0, 0, 5], "look_at": [0, 0, 0], "fov": 50 },
            "materials": [
                { "name": "red", "type": "uniform", "diffuse": [1, 0, 0] },
                { "name": "glass", "type": "uniform", "transparency": 0.8, "ior": 1.5 },
                { "name": "checks", "type": "procedural", "pattern": { "type": "checker" } }
            ],
            "objects": [
                { "type": "sphere", "center": [0, 0, 0], "radius": 1, "material": "red" },
                { "type": "triangle", "vertices": [[-5, -1, -5], [5, -1, -5], [0, -1, 5]], "material": "checks" },
                { "type": "blob", "charges": [{ "center": [2, 0, 0], "weight": 0.5 }], "material": "glass" },
                { "type": "mandelbulb", "cascade": 2, "material": "red" },
                { "type": "julia", "c": [-0.2, 0.8, 0, 0], "material": "glass" }
            ],
            "lights": [
                { "type": "point", "origin": [5, 5, 5] },
                { "type": "sphere", "origin": [-5, 5, 5], "radius": 0.5, "num_rays": 4 },
                { "type": "head", "use_decay": false }
            ]
        }"#;

        let desc = SceneDescription::from_json_str(json).unwrap();
        assert_eq!(desc.settings.aa_rays, 4);
        let scene = desc.prepare().unwrap();

        assert_eq!(scene.primitives().len(), 5);
        assert_eq!(scene.materials()[1].props.transparency, 0.8);
        assert_eq!((scene.width(), scene.height()), (32, 24));
        // Headlight placed at the camera
        let head = &scene.lights()[2];
        assert!(matches!(head.kind, LightKind::Head { use_decay: false }));
        assert_eq!(head.origin, Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_prepare_errors() {
        let no_camera = SceneDescription::default();
        assert!(matches!(no_camera.prepare(), Err(SceneError::MissingCamera)));

        let unknown = SceneDescription::new(CameraDesc::default())
            .with_material(MaterialDesc::uniform("red", Color::X))
            .with_object(ObjectDesc::sphere(Vec3::ZERO, 1.0, "blue"));
        match unknown.prepare() {
            Err(SceneError::UnknownMaterial { name, object }) => {
                assert_eq!(name, "blue");
                assert_eq!(object, 0);
            }
            other => panic!("expected unknown material, got {:?}", other.map(|_| ())),
        }

        let duplicate = SceneDescription::new(CameraDesc::default())
            .with_material(MaterialDesc::uniform("red", Color::X))
            .with_material(MaterialDesc::uniform("red", Color::Y));
        assert!(matches!(
            duplicate.prepare(),
            Err(SceneError::DuplicateMaterial(_))
        ));

        let missing_mesh = SceneDescription::new(CameraDesc::default())
            .with_material(MaterialDesc::uniform("red", Color::X))
            .with_object(ObjectDesc::OffMesh {
                file: "no/such/mesh.off".into(),
                origin: Vec3::ZERO,
                material: "red".into(),
            });
        assert!(matches!(missing_mesh.prepare(), Err(SceneError::Mesh(_))));

        assert!(matches!(
            SceneDescription::from_json_str("{ \"objects\": 3 }"),
            Err(SceneError::Json(_))
        ));
    }

    #[test]
    fn test_off_mesh_relative_to_scene_file() {
        let dir = std::env::temp_dir().join("octa_scene_off_test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("quad.off"),
            "OFF\n4 1 0\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n4 0 1 2 3\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("scene.json"),
            r#"{
                "camera": {},
                "materials": [{ "name": "m", "type": "uniform" }],
                "objects": [{ "type": "off_mesh", "file": "quad.off", "origin": [0, 0, -1], "material": "m" }]
            }"#,
        )
        .unwrap();

        let scene = SceneDescription::load(dir.join("scene.json"))
            .unwrap()
            .prepare()
            .unwrap();
        // The quad is fan-triangulated
        assert_eq!(scene.primitives().len(), 2);
        let hit = scene
            .intersect(&Ray::new(Vec3::new(0.5, 0.5, 5.0), -Vec3::Z))
            .unwrap();
        assert!((hit.point.z + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mesh_skips_degenerate_faces() {
        let mesh = TriangleMesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::X * 2.0],
            vec![0, 1, 2, 0, 1, 3],
        );
        let mut out = Vec::new();
        extend_with_mesh(&mut out, &mesh, 0, "line.off");

        assert_eq!(out.len(), 1);
        assert_eq!(mesh_triangles(&mesh, 0).count(), 1);
    }

    #[test]
    fn test_new_matches_camera_to_settings() {
        let camera = CameraDesc::default().build();
        let scene = Scene::new(settings(16, 8), camera, vec![], vec![], vec![]).unwrap();
        assert_eq!(scene.camera.resolution(), (16, 8));

        // Center of the image looks straight down the view direction
        let ray = scene.camera.cast_ray(8.0, 4.0);
        assert!((ray.direction - scene.camera.view_dir()).length() < 1e-12);
    }

    #[test]
    fn test_intersect_with_and_without_bvt() {
        let mut desc = SceneDescription::new(camera_at_z(10.0))
            .with_settings(settings(16, 16))
            .with_material(MaterialDesc::uniform("m", Color::ONE))
            .with_light(Light::point(Vec3::new(2.0, 3.0, 10.0), Color::ONE));
        for i in 0..40 {
            let x = (i % 8) as f64 - 3.5;
            let y = (i / 8) as f64 - 2.0;
            desc = desc.with_object(ObjectDesc::sphere(Vec3::new(x, y, -(i as f64 * 0.1)), 0.3, "m"));
        }
        desc.settings.bvt = BvtParams {
            threshold: 2,
            node_threshold: 1,
            ..Default::default()
        };

        let with_tree = desc.prepare().unwrap();
        assert!(with_tree.bvt().is_some());

        desc.settings.use_bvt = false;
        let linear = desc.prepare().unwrap();
        assert!(linear.bvt().is_none());

        let mut rng = StdRng::seed_from_u64(42);
        for y in 0..16 {
            for x in 0..16 {
                let a = with_tree.render_pixel(x as f64, y as f64, &mut rng);
                let b = linear.render_pixel(x as f64, y as f64, &mut rng);
                assert!((a - b).length() < 1e-9, "pixel ({}, {})", x, y);
            }
        }
    }

    fn edge_scene(aa_rays: u32) -> Scene {
        // White quad on black. Its left edge falls a quarter pixel left of
        // pixel column 8, so column 8 is white and column 7 black.
        let edge = -0.09;
        let right_half = [
            Vec3::new(edge, -10.0, 0.0),
            Vec3::new(10.0, -10.0, 0.0),
            Vec3::new(10.0, 10.0, 0.0),
        ];
        let upper = [
            Vec3::new(edge, -10.0, 0.0),
            Vec3::new(10.0, 10.0, 0.0),
            Vec3::new(edge, 10.0, 0.0),
        ];
        let mut settings = settings(16, 16).with_aa_rays(aa_rays);
        settings.no_lighting = true;

        SceneDescription::new(camera_at_z(5.0))
            .with_settings(settings)
            .with_material(MaterialDesc::uniform("white", Color::ONE))
            .with_object(ObjectDesc::triangle(right_half, "white"))
            .with_object(ObjectDesc::triangle(upper, "white"))
            .prepare()
            .unwrap()
    }

    fn render_primary(scene: &Scene, rng: &mut StdRng) -> ImageBuffer {
        let mut image = ImageBuffer::new(scene.width(), scene.height());
        image.write_block(&scene.render_rows(0, scene.height(), rng));
        image
    }

    #[test]
    fn test_render_rows_edge() {
        let scene = edge_scene(4);
        let mut rng = StdRng::seed_from_u64(42);
        let image = render_primary(&scene, &mut rng);

        // Pixel columns right of center see the quad
        assert_eq!(image.color(7, 8), Color::ZERO);
        assert_eq!(image.color(8, 8), Color::ONE);
        assert_eq!(image.color(12, 8), Color::ONE);

        let critical = scene.find_critical_pixels(&image);
        assert!(critical.count() > 0);
        assert!(critical.is_critical(8, 8));
        assert!(!critical.is_critical(2, 8));
        assert!(!critical.is_critical(13, 8));
    }

    #[test]
    fn test_antialiasing_blends_edge() {
        let scene = edge_scene(4);
        let mut rng = StdRng::seed_from_u64(42);
        let mut image = render_primary(&scene, &mut rng);
        let critical = scene.find_critical_pixels(&image);

        let extra = scene.render_rows_antialiased(0, 16, &critical, &mut rng);
        // Only critical pixels gain samples
        assert_eq!(extra.pixels[2 + 8 * 16].samples, 0);
        assert_eq!(extra.pixels[8 + 8 * 16].samples, 4);

        image.merge_block(&extra);
        assert_eq!(image.get(8, 8).samples, 5);
        // Two of the four extra samples land left of the edge
        assert!((image.color(8, 8).x - 0.6).abs() < 1e-12);
        // Far from the edge nothing changes
        assert_eq!(image.color(12, 8), Color::ONE);
    }

    #[test]
    fn test_uniform_scene_no_critical_pixels() {
        let mut settings = settings(12, 10).with_aa_rays(9);
        settings.no_lighting = true;
        let scene = SceneDescription::new(camera_at_z(5.0))
            .with_settings(settings)
            .with_material(MaterialDesc::uniform("gray", Color::splat(0.5)))
            .with_object(ObjectDesc::sphere(Vec3::ZERO, 100.0, "gray"))
            .prepare()
            .unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        let image = render_primary(&scene, &mut rng);
        let critical = scene.find_critical_pixels(&image);
        assert_eq!(critical.count(), 0);

        let extra = scene.render_rows_antialiased(0, 10, &critical, &mut rng);
        assert!(extra.pixels.iter().all(|p| p.samples == 0));
    }

    #[test]
    fn test_run_job() {
        let scene = edge_scene(4);
        let mut rng = StdRng::seed_from_u64(42);

        let job = RowJob {
            id: 3,
            y_offset: 12,
            rows: 6,
            antialias: false,
        };
        let result = scene.run_job(&job, None, &mut rng);
        assert_eq!(result.id, 3);
        // Clipped at the bottom edge
        assert_eq!(result.block.rows(), 4);
        assert_eq!(result.block.y_offset, 12);

        let aa = RowJob {
            antialias: true,
            ..job
        };
        let result = scene.run_job(&aa, None, &mut rng);
        assert!(result.block.pixels.iter().all(|p| p.samples == 0));
        assert_eq!(result.block.rows(), 4);
    }

    #[test]
    fn test_depth_of_field_focus() {
        let mut settings = settings(9, 9);
        settings.no_lighting = true;
        let mut camera = camera_at_z(5.0);
        camera.focal_distance = 5.0;
        camera.dof_amount = 0.5;
        camera.dof_rays = 8;

        let scene = SceneDescription::new(camera)
            .with_settings(settings)
            .with_material(MaterialDesc::uniform("white", Color::ONE))
            .with_object(ObjectDesc::sphere(Vec3::ZERO, 1.0, "white"))
            .prepare()
            .unwrap();

        // The sphere center is in focus: every lens sample converges on it
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(scene.render_pixel(4.5, 4.5, &mut rng), Color::ONE);
    }
}
