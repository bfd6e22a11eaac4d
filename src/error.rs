//! Error types for the fallible, construction-time-only parts of the mesh.
//!
//! Per-sample operations (`step`, `read_value`, `write_value`) are total and
//! never fail; see §7 of the design notes. Only construction and parameter
//! setters can fail.

use thiserror::Error;

/// Mesh construction failed.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum MeshError {
    /// One of the mesh dimensions or the sample rate was not strictly
    /// positive.
    #[error(
        "invalid mesh geometry: width={width}, height={height}, depth={depth}, sample_rate={sample_rate} (all must be > 0)"
    )]
    InvalidGeometry {
        width: f32,
        height: f32,
        depth: f32,
        sample_rate: f32,
    },
}

/// A host parameter get/set request referenced an unknown parameter index.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unknown parameter index: {0}")]
pub struct UnknownParameter(pub usize);
