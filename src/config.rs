//! Host-facing configuration: compile/construction-time mesh geometry and
//! the flat, indexed parameter bank a host automation system addresses by
//! number.

use crate::boundary::AdmittanceLowpassParams;
use crate::error::UnknownParameter;
use crate::mesh::FaceParams;

/// Geometry and host-introspection scalars fixed for the lifetime of a
/// mesh instance: the host queries these once at load time (the analogue
/// of `GetSampleRate` / `GetBufferSize` / `GetMaxSourceCount` /
/// `GetMeshWidth` / `GetMeshHeight` / `GetMeshDepth` / `GetEarsDistance`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshConfig {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
    pub sample_rate: f32,
    pub block_size: usize,
    pub max_source_count: usize,
    pub ears_distance: f32,
}

impl MeshConfig {
    pub fn new(width: f32, height: f32, depth: f32, sample_rate: f32) -> Self {
        Self {
            width,
            height,
            depth,
            sample_rate,
            block_size: crate::source::BLOCK,
            max_source_count: crate::source::MAX_SOURCES,
            ears_distance: 0.2,
        }
    }
}

/// Number of indexable automation parameters: raw gain, HRTF blend gain,
/// and an `(admittance, cutoff)` pair per mesh face.
pub const PARAM_COUNT: usize = 14;

const GAIN: usize = 0;
const HRTF_GAIN: usize = 1;
const XP_ADMITTANCE: usize = 2;
const XP_CUTOFF: usize = 3;
const XN_ADMITTANCE: usize = 4;
const XN_CUTOFF: usize = 5;
const YP_ADMITTANCE: usize = 6;
const YP_CUTOFF: usize = 7;
const YN_ADMITTANCE: usize = 8;
const YN_CUTOFF: usize = 9;
const ZP_ADMITTANCE: usize = 10;
const ZP_CUTOFF: usize = 11;
const ZN_ADMITTANCE: usize = 12;
const ZN_CUTOFF: usize = 13;

/// The flat, host-addressable effect parameter bank: a dry/HRTF gain pair
/// and the six faces' normalized `(admittance, cutoff)` knobs, all in
/// `[0, 1]` except the two gains which are in decibels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    values: [f32; PARAM_COUNT],
}

impl Default for EffectParams {
    /// Unity raw gain, no HRTF blend, and every face fully absorbing
    /// (admittance = cutoff = 0, the lossless-limit admittance-lowpass
    /// boundary).
    fn default() -> Self {
        let mut values = [0.0f32; PARAM_COUNT];
        values[GAIN] = 0.0;
        values[HRTF_GAIN] = 0.0;
        Self { values }
    }
}

impl EffectParams {
    /// Set parameter `index` to `value`. Values for the two gain
    /// parameters are in decibels; all other parameters are clamped into
    /// `[0, 1]` by the boundary constructor when consumed, not here.
    pub fn set_parameter(&mut self, index: usize, value: f32) -> Result<(), UnknownParameter> {
        let Some(slot) = self.values.get_mut(index) else {
            log::debug!("rejected set_parameter: index {index} is out of range (0..{PARAM_COUNT})");
            return Err(UnknownParameter(index));
        };
        *slot = value;
        Ok(())
    }

    /// Read back parameter `index` as last set (or its default).
    pub fn get_parameter(&self, index: usize) -> Result<f32, UnknownParameter> {
        self.values.get(index).copied().ok_or_else(|| {
            log::debug!("rejected get_parameter: index {index} is out of range (0..{PARAM_COUNT})");
            UnknownParameter(index)
        })
    }

    pub fn raw_gain_db(&self) -> f32 {
        self.values[GAIN]
    }

    pub fn hrtf_gain_db(&self) -> f32 {
        self.values[HRTF_GAIN]
    }

    /// Resolve the six faces' normalized knobs into concrete boundary
    /// filter parameters, ready to hand to [`crate::mesh::Mesh3D::step`].
    pub fn face_params(&self) -> FaceParams<AdmittanceLowpassParams, AdmittanceLowpassParams, AdmittanceLowpassParams, AdmittanceLowpassParams, AdmittanceLowpassParams, AdmittanceLowpassParams> {
        FaceParams {
            xp: AdmittanceLowpassParams::new(self.values[XP_ADMITTANCE], self.values[XP_CUTOFF]),
            xn: AdmittanceLowpassParams::new(self.values[XN_ADMITTANCE], self.values[XN_CUTOFF]),
            yp: AdmittanceLowpassParams::new(self.values[YP_ADMITTANCE], self.values[YP_CUTOFF]),
            yn: AdmittanceLowpassParams::new(self.values[YN_ADMITTANCE], self.values[YN_CUTOFF]),
            zp: AdmittanceLowpassParams::new(self.values[ZP_ADMITTANCE], self.values[ZP_CUTOFF]),
            zn: AdmittanceLowpassParams::new(self.values[ZN_ADMITTANCE], self.values[ZN_CUTOFF]),
        }
    }
}
