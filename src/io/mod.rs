//! Surface mesh and image volume file I/O
//!
//! Meshes are read and written as OFF (`.off`) or PLY (`.ply`), chosen by
//! extension. Volumes are only ever read.

pub mod off;
pub mod ply;
pub mod volume;

use crate::errors::DeformError;
use crate::surface::Surface;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use volume::{VolumeImage, read_volume};

/// Result alias for file I/O.
pub type IoResult<T> = Result<T, IoError>;

/// Mesh and image I/O errors.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("std::io::Error: {0}")]
    StdIo(#[from] std::io::Error),

    /// Filesystem failure on a known path
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A token that should be a number is not
    #[error("{}:{line}: could not parse {token:?} as a number", path.display())]
    ParseNumber {
        path: PathBuf,
        line: usize,
        token: String,
    },

    #[error("{}: input is malformed: {reason}", path.display())]
    MalformedInput { path: PathBuf, reason: String },

    /// Extension not recognised
    #[error("{}: unsupported file format (expected .off, .ply, .nii or .nii.gz)", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The file parsed but does not describe a valid surface
    #[error("invalid surface: {0}")]
    InvalidSurface(#[from] DeformError),

    #[error("PLY error: {0}")]
    Ply(String),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),
}

impl IoError {
    pub(crate) fn file(path: &Path, source: std::io::Error) -> Self {
        Self::File {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Surface mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Off,
    Ply,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| match ext.as_str() {
                "off" => Some(MeshFormat::Off),
                "ply" => Some(MeshFormat::Ply),
                _ => None,
            })
    }
}

/// Read a surface, format chosen by extension. Vertex order, comments and
/// per-vertex color are kept.
pub fn read_surface(path: impl AsRef<Path>) -> IoResult<Surface> {
    let path = path.as_ref();
    let format =
        MeshFormat::from_path(path).ok_or_else(|| IoError::UnsupportedFormat(path.to_path_buf()))?;
    debug!("reading surface {} ({format:?})", path.display());

    let surface = match format {
        MeshFormat::Off => off::read_off(path)?,
        MeshFormat::Ply => ply::read_ply(path)?,
    };

    info!(
        "loaded {}: {} vertices, {} faces",
        path.display(),
        surface.vertex_count(),
        surface.face_count()
    );
    Ok(surface)
}

/// Write a surface, format chosen by extension.
pub fn write_surface(path: impl AsRef<Path>, surface: &Surface) -> IoResult<()> {
    let path = path.as_ref();
    let format =
        MeshFormat::from_path(path).ok_or_else(|| IoError::UnsupportedFormat(path.to_path_buf()))?;

    match format {
        MeshFormat::Off => off::write_off(path, surface)?,
        MeshFormat::Ply => ply::write_ply(path, surface)?,
    }

    info!(
        "saved {}: {} vertices, {} faces",
        path.display(),
        surface.vertex_count(),
        surface.face_count()
    );
    Ok(())
}
