//! Realtime 3-D rectilinear K-DWM acoustic mesh simulator.
//!
//! A rectangular room is modeled as a grid of digital waveguide junctions
//! scattering pressure between six neighbors every sample. Junctions that
//! touch a face of the room terminate into a [`boundary::BoundaryFilter`]
//! instead of a neighbor, giving each face an independently tunable
//! reflectivity. Sound sources and a listener are injected and read back
//! via trilinear interpolation against continuous world coordinates, so
//! callers never deal with junction indices directly.
//!
//! [`driver::RealtimeDriver`] ties a mesh, a [`source::SourceTable`] and a
//! [`config::EffectParams`] bank together into the per-block algorithm a
//! host audio callback runs.

pub mod boundary;
pub mod config;
pub mod driver;
pub mod error;
pub mod junction;
pub mod listener;
pub mod math;
pub mod mesh;
pub mod prelude;
pub mod source;
