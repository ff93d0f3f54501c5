//! Error types for scene preparation and rendering.

use thiserror::Error;

use octa_core::{MeshError, TextureError};

/// Errors that can occur while loading or preparing a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Scene has no camera")]
    MissingCamera,

    #[error("Unknown material '{name}' referenced by object {object}")]
    UnknownMaterial { name: String, object: usize },

    #[error("Duplicate material name '{0}'")]
    DuplicateMaterial(String),

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Errors that can occur while running render phases.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("A render phase is already running")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;
