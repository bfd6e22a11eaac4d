//! Convenience re-exports for consumers who just want the common types in
//! scope.

pub use crate::boundary::{AdmittanceLowpass, AdmittanceLowpassParams, Anechoic, BoundaryFilter};
pub use crate::config::{EffectParams, MeshConfig, PARAM_COUNT};
pub use crate::driver::RealtimeDriver;
pub use crate::error::{MeshError, UnknownParameter};
pub use crate::junction::BoundaryJunction;
pub use crate::listener::Listener;
pub use crate::mesh::{FaceParams, Mesh3D};
pub use crate::source::{global_writer, source_channel, take_global_reader, SourceRecord, SourceTable, SourceWriter, BLOCK, MAX_SOURCES};
