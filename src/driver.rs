//! The realtime per-block driver: injects active sources, advances the
//! mesh by one block, and taps ear positions into an output buffer.

use crate::boundary::AdmittanceLowpass;
use crate::config::{EffectParams, MeshConfig};
use crate::error::MeshError;
use crate::listener::Listener;
use crate::math::db_amp;
use crate::mesh::Mesh3D;
use crate::source::SourceTable;

type LossyMesh = Mesh3D<AdmittanceLowpass, AdmittanceLowpass, AdmittanceLowpass, AdmittanceLowpass, AdmittanceLowpass, AdmittanceLowpass>;

/// Owns the mesh and drives it one audio block at a time.
///
/// A block is processed in four steps, matching the host driver loop the
/// original plugin glue implements per-sample: drain pending source
/// updates, inject every active source's current sample before each mesh
/// step, advance the mesh, and tap listener ear positions into the output
/// buffer. Active flags are cleared at the end of the block so a source
/// must be rewritten every block to keep contributing.
pub struct RealtimeDriver {
    mesh: LossyMesh,
    config: MeshConfig,
}

impl RealtimeDriver {
    pub fn new(config: MeshConfig) -> Result<Self, MeshError> {
        let mesh = LossyMesh::new(config.width, config.height, config.depth, config.sample_rate)?;
        Ok(Self { mesh, config })
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn mesh(&self) -> &LossyMesh {
        &self.mesh
    }

    /// Process one block, writing interleaved stereo samples into
    /// `out_left` / `out_right` (each of length `num_samples`).
    pub fn process_block_stereo(
        &mut self,
        sources: &mut SourceTable,
        params: &EffectParams,
        listener: Listener,
        num_samples: usize,
        out_left: &mut [f32],
        out_right: &mut [f32],
    ) {
        sources.drain_updates();
        let face_params = params.face_params();
        let gain = db_amp(params.raw_gain_db());

        for n in 0..num_samples {
            for source in 0..sources.records().len() {
                if let Some(sample) = sources.take_sample(source, n) {
                    let record = sources.records()[source];
                    self.mesh.write_value(record.px, record.py, record.pz, sample * gain);
                }
            }

            self.mesh.step(&face_params);

            out_left[n] = self.mesh.read_value(listener.left[0], listener.left[1], listener.left[2]);
            out_right[n] = self.mesh.read_value(listener.right[0], listener.right[1], listener.right[2]);
        }

        sources.clear_active();
    }

    /// Process one block to a single mono channel: the average of the two
    /// ear taps.
    pub fn process_block_mono(
        &mut self,
        sources: &mut SourceTable,
        params: &EffectParams,
        listener: Listener,
        num_samples: usize,
        out: &mut [f32],
    ) {
        sources.drain_updates();
        let face_params = params.face_params();
        let gain = db_amp(params.raw_gain_db());

        for n in 0..num_samples {
            for source in 0..sources.records().len() {
                if let Some(sample) = sources.take_sample(source, n) {
                    let record = sources.records()[source];
                    self.mesh.write_value(record.px, record.py, record.pz, sample * gain);
                }
            }

            self.mesh.step(&face_params);

            let left = self.mesh.read_value(listener.left[0], listener.left[1], listener.left[2]);
            let right = self.mesh.read_value(listener.right[0], listener.right[1], listener.right[2]);
            out[n] = (left + right) * 0.5;
        }

        sources.clear_active();
    }
}
