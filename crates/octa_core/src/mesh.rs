//! Triangle meshes loaded from OBJ and OFF files.
//!
//! A mesh is only an intermediate: the renderer turns each face into an
//! independent triangle primitive.

use std::path::Path;

use octa_math::{Vec2, Vec3};
use thiserror::Error;

/// Errors that can occur while loading a mesh.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("OFF parse error: {0}")]
    Off(String),

    #[error("No geometry in {0}")]
    Empty(String),
}

pub type MeshResult<T> = Result<T, MeshError>;

/// Vertex positions with optional per-vertex normals and texture
/// coordinates; every three indices form a triangle.
#[derive(Clone, Debug, Default)]
pub struct TriangleMesh {
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub uvs: Option<Vec<Vec2>>,
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            ..Default::default()
        }
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex indices of each triangle.
    pub fn faces(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|f| [f[0] as usize, f[1] as usize, f[2] as usize])
    }

    /// Compute smooth vertex normals by averaging face normals.
    ///
    /// Face normals follow counter-clockwise winding (`e1 x e2`) and are
    /// weighted by face area.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for [i0, i1, i2] in self.faces() {
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = self.positions[i0];
            let edge1 = self.positions[i1] - p0;
            let edge2 = self.positions[i2] - p0;
            let face_normal = edge1.cross(edge2);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            let len = normal.length();
            if len > 0.0 {
                *normal /= len;
            } else {
                *normal = Vec3::Y;
            }
        }

        self.normals = Some(normals);
    }

    fn translate(&mut self, origin: Vec3) {
        for p in &mut self.positions {
            *p += origin;
        }
    }
}

/// Load the first model of an OBJ file, translated by `origin`.
///
/// Polygons are triangulated. With `smooth`, file normals are normalized
/// (or computed when the file has none); otherwise normals are dropped and
/// triangles shade flat.
pub fn load_obj(path: &Path, origin: Vec3, smooth: bool) -> MeshResult<TriangleMesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )?;

    let name = path.display().to_string();
    if models.len() > 1 {
        log::warn!("{}: {} models found, using the first", name, models.len());
    }
    let model = models.into_iter().next().ok_or_else(|| MeshError::Empty(name.clone()))?;
    let mesh = model.mesh;

    let triples = |data: &[f32]| -> Vec<Vec3> {
        data.chunks_exact(3)
            .map(|c| Vec3::new(c[0] as f64, c[1] as f64, c[2] as f64))
            .collect()
    };

    let mut out = TriangleMesh::new(triples(&mesh.positions), mesh.indices);
    if out.triangle_count() == 0 {
        return Err(MeshError::Empty(name));
    }
    out.translate(origin);

    if !mesh.texcoords.is_empty() {
        out.uvs = Some(
            mesh.texcoords
                .chunks_exact(2)
                .map(|c| Vec2::new(c[0] as f64, c[1] as f64))
                .collect(),
        );
    }

    if smooth {
        if mesh.normals.is_empty() {
            log::info!("{}: no normals in file, computing smooth normals", name);
            out.compute_normals();
        } else {
            out.normals = Some(
                triples(&mesh.normals)
                    .into_iter()
                    .map(|n| n.normalize_or_zero())
                    .collect(),
            );
        }
    }

    log::info!(
        "Loaded OBJ {}: {} vertices, {} triangles",
        name,
        out.positions.len(),
        out.triangle_count()
    );
    Ok(out)
}

/// Load an OFF file, translated by `origin`.
pub fn load_off(path: &Path, origin: Vec3) -> MeshResult<TriangleMesh> {
    let text = std::fs::read_to_string(path)?;
    let mesh = parse_off(&text, origin)?;
    log::info!(
        "Loaded OFF {}: {} vertices, {} triangles",
        path.display(),
        mesh.positions.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

fn off_token<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> MeshResult<&'a str> {
    tokens
        .next()
        .ok_or_else(|| MeshError::Off(format!("unexpected end of file reading {}", what)))
}

fn off_number<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> MeshResult<f64> {
    let tok = off_token(tokens, what)?;
    tok.parse::<f64>()
        .map_err(|_| MeshError::Off(format!("invalid {} '{}'", what, tok)))
}

/// A non-negative integer that fits the index type.
fn off_count<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> MeshResult<usize> {
    let tok = off_token(tokens, what)?;
    tok.parse::<u32>()
        .map(|n| n as usize)
        .map_err(|_| MeshError::Off(format!("invalid {} '{}'", what, tok)))
}

/// Parse OFF text: `OFF`, counts `nv nf ne`, `nv` vertex lines, then `nf`
/// faces `k i0 .. ik-1`. Faces with more than three vertices are split
/// into a fan; faces with fewer are skipped.
pub fn parse_off(text: &str, origin: Vec3) -> MeshResult<TriangleMesh> {
    let mut tokens = text
        .lines()
        .map(|l| l.split('#').next().unwrap_or(""))
        .flat_map(str::split_whitespace);

    match tokens.next() {
        Some("OFF") => {}
        other => {
            return Err(MeshError::Off(format!(
                "expected OFF header, found {:?}",
                other
            )))
        }
    }

    let num_vertices = off_count(&mut tokens, "vertex count")?;
    let num_faces = off_count(&mut tokens, "face count")?;
    let _num_edges = off_count(&mut tokens, "edge count")?;

    // Counts are untrusted; vectors grow only with data actually read
    let mut positions = Vec::new();
    for _ in 0..num_vertices {
        let x = off_number(&mut tokens, "vertex")?;
        let y = off_number(&mut tokens, "vertex")?;
        let z = off_number(&mut tokens, "vertex")?;
        positions.push(Vec3::new(x, y, z) + origin);
    }

    let mut indices = Vec::new();
    let mut face = Vec::new();
    let mut skipped = 0;
    for _ in 0..num_faces {
        let count = off_count(&mut tokens, "face size")?;
        face.clear();
        for _ in 0..count {
            let i = off_count(&mut tokens, "face index")?;
            if i >= num_vertices {
                return Err(MeshError::Off(format!(
                    "face index {} out of range ({} vertices)",
                    i, num_vertices
                )));
            }
            face.push(i as u32);
        }

        if count < 3 {
            skipped += 1;
            continue;
        }
        for k in 1..count - 1 {
            indices.extend_from_slice(&[face[0], face[k], face[k + 1]]);
        }
    }

    if skipped > 0 {
        log::warn!("OFF: skipped {} faces with fewer than 3 vertices", skipped);
    }

    Ok(TriangleMesh::new(positions, indices))
}
