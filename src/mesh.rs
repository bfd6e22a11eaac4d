//! The 3-D rectilinear K-DWM mesh: interior scattering, boundary handling,
//! and trilinear read/write sampling between world and junction coordinates.

use crate::boundary::BoundaryFilter;
use crate::error::MeshError;
use crate::junction::BoundaryJunction;
use crate::math::{clamp, lerp, SPEED_OF_SOUND};

/// Per-step boundary parameters, one per face, in `(x+, x-, y+, y-, z+, z-)`
/// order — the same order `Mesh3D::step` takes them in.
pub struct FaceParams<XP, XN, YP, YN, ZP, ZN> {
    pub xp: XP,
    pub xn: XN,
    pub yp: YP,
    pub yn: YN,
    pub zp: ZP,
    pub zn: ZN,
}

/// A 3-D rectilinear K-DWM mesh, generic over the six (independently typed)
/// boundary filters terminating its faces.
///
/// Owns both pressure buffers and all six boundary face arrays; nothing
/// external holds references into them. All allocation happens in
/// [`Mesh3D::new`]; `reset`, `read_value`, `write_value` and `step` never
/// allocate.
pub struct Mesh3D<FXP, FXN, FYP, FYN, FZP, FZN>
where
    FXP: BoundaryFilter,
    FXN: BoundaryFilter,
    FYP: BoundaryFilter,
    FYN: BoundaryFilter,
    FZP: BoundaryFilter,
    FZN: BoundaryFilter,
{
    width: f32,
    height: f32,
    depth: f32,
    sample_rate: f32,
    /// Junctions per meter, derived from the sample rate and speed of sound.
    density: f32,
    nx: usize,
    ny: usize,
    nz: usize,

    p_cur: Vec<f32>,
    p_prev: Vec<f32>,

    face_xp: Vec<BoundaryJunction<FXP>>,
    face_xn: Vec<BoundaryJunction<FXN>>,
    face_yp: Vec<BoundaryJunction<FYP>>,
    face_yn: Vec<BoundaryJunction<FYN>>,
    face_zp: Vec<BoundaryJunction<FZP>>,
    face_zn: Vec<BoundaryJunction<FZN>>,
}

/// Eight linearized junction indices and three fractional weights
/// surrounding a continuous world coordinate.
struct Stencil {
    i000: usize,
    i100: usize,
    i010: usize,
    i110: usize,
    i001: usize,
    i101: usize,
    i011: usize,
    i111: usize,
    ax: f32,
    ay: f32,
    az: f32,
}

impl<FXP, FXN, FYP, FYN, FZP, FZN> Mesh3D<FXP, FXN, FYP, FYN, FZP, FZN>
where
    FXP: BoundaryFilter,
    FXN: BoundaryFilter,
    FYP: BoundaryFilter,
    FYN: BoundaryFilter,
    FZP: BoundaryFilter,
    FZN: BoundaryFilter,
{
    /// Construct a mesh spanning `width x height x depth` meters, driven at
    /// `sample_rate` Hz. Fails only if any of the four inputs is not
    /// strictly positive.
    pub fn new(width: f32, height: f32, depth: f32, sample_rate: f32) -> Result<Self, MeshError> {
        if width <= 0.0 || height <= 0.0 || depth <= 0.0 || sample_rate <= 0.0 {
            return Err(MeshError::InvalidGeometry {
                width,
                height,
                depth,
                sample_rate,
            });
        }

        let density = sample_rate / (3.0_f32.sqrt() * SPEED_OF_SOUND);
        let nx = (width * density).ceil().max(1.0) as usize;
        let ny = (height * density).ceil().max(1.0) as usize;
        let nz = (depth * density).ceil().max(1.0) as usize;

        log::debug!(
            "mesh created: {width}x{height}x{depth}m at {sample_rate}Hz -> {nx}x{ny}x{nz} junctions ({} total)",
            nx * ny * nz
        );

        let n = nx * ny * nz;
        let mut mesh = Self {
            width,
            height,
            depth,
            sample_rate,
            density,
            nx,
            ny,
            nz,
            p_cur: vec![0.0; n],
            p_prev: vec![0.0; n],
            face_xp: (0..ny * nz).map(|_| BoundaryJunction::new()).collect(),
            face_xn: (0..ny * nz).map(|_| BoundaryJunction::new()).collect(),
            face_yp: (0..nx * nz).map(|_| BoundaryJunction::new()).collect(),
            face_yn: (0..nx * nz).map(|_| BoundaryJunction::new()).collect(),
            face_zp: (0..nx * ny).map(|_| BoundaryJunction::new()).collect(),
            face_zn: (0..nx * ny).map(|_| BoundaryJunction::new()).collect(),
        };
        mesh.reset();
        Ok(mesh)
    }

    /// Junction counts `(nx, ny, nz)`.
    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    /// Junctions per meter.
    pub fn density(&self) -> f32 {
        self.density
    }

    /// Zero both pressure buffers and reinitialize every boundary junction
    /// and its embedded filter to its zero state.
    pub fn reset(&mut self) {
        log::debug!("mesh reset: {}x{}x{} junctions zeroed", self.nx, self.ny, self.nz);
        self.p_cur.fill(0.0);
        self.p_prev.fill(0.0);
        for j in self.face_xp.iter_mut() {
            j.reset();
        }
        for j in self.face_xn.iter_mut() {
            j.reset();
        }
        for j in self.face_yp.iter_mut() {
            j.reset();
        }
        for j in self.face_yn.iter_mut() {
            j.reset();
        }
        for j in self.face_zp.iter_mut() {
            j.reset();
        }
        for j in self.face_zn.iter_mut() {
            j.reset();
        }
    }

    #[inline]
    fn linear(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.ny + y) * self.nx + x
    }

    #[inline]
    fn stencil(&self, x: f32, y: f32, z: f32) -> Stencil {
        let xs = clamp(0.0, self.width, x) * self.density;
        let ys = clamp(0.0, self.height, y) * self.density;
        let zs = clamp(0.0, self.depth, z) * self.density;

        let x0 = clamp(0.0, (self.nx - 1) as f32, xs.floor()) as usize;
        let y0 = clamp(0.0, (self.ny - 1) as f32, ys.floor()) as usize;
        let z0 = clamp(0.0, (self.nz - 1) as f32, zs.floor()) as usize;
        let x1 = clamp(0.0, (self.nx - 1) as f32, xs.ceil()) as usize;
        let y1 = clamp(0.0, (self.ny - 1) as f32, ys.ceil()) as usize;
        let z1 = clamp(0.0, (self.nz - 1) as f32, zs.ceil()) as usize;

        Stencil {
            i000: self.linear(x0, y0, z0),
            i100: self.linear(x1, y0, z0),
            i010: self.linear(x0, y1, z0),
            i110: self.linear(x1, y1, z0),
            i001: self.linear(x0, y0, z1),
            i101: self.linear(x1, y0, z1),
            i011: self.linear(x0, y1, z1),
            i111: self.linear(x1, y1, z1),
            ax: xs.fract(),
            ay: ys.fract(),
            az: zs.fract(),
        }
    }

    /// Trilinear read at a continuous world coordinate. Coordinates outside
    /// `[0,W] x [0,H] x [0,D]` are clamped to the mesh extent; this never
    /// reads out of bounds.
    #[inline]
    pub fn read_value(&self, x: f32, y: f32, z: f32) -> f32 {
        let s = self.stencil(x, y, z);
        let p = &self.p_cur;
        let c00 = lerp(p[s.i000], p[s.i100], s.ax);
        let c10 = lerp(p[s.i010], p[s.i110], s.ax);
        let c01 = lerp(p[s.i001], p[s.i101], s.ax);
        let c11 = lerp(p[s.i011], p[s.i111], s.ax);
        let c0 = lerp(c00, c10, s.ay);
        let c1 = lerp(c01, c11, s.ay);
        lerp(c0, c1, s.az)
    }

    /// Trilinear weighted-overwrite write at a continuous world coordinate:
    /// each of the eight surrounding junctions is blended towards `v` by its
    /// trilinear weight. This is a "set this region to v" operation, not an
    /// additive injection — writing `v = 0` at full weight mutes the corner.
    #[inline]
    pub fn write_value(&mut self, x: f32, y: f32, z: f32, v: f32) {
        let s = self.stencil(x, y, z);
        let p = &mut self.p_cur;
        p[s.i000] = lerp(p[s.i000], v, (1.0 - s.ax) * (1.0 - s.ay) * (1.0 - s.az));
        p[s.i100] = lerp(p[s.i100], v, s.ax * (1.0 - s.ay) * (1.0 - s.az));
        p[s.i010] = lerp(p[s.i010], v, (1.0 - s.ax) * s.ay * (1.0 - s.az));
        p[s.i110] = lerp(p[s.i110], v, s.ax * s.ay * (1.0 - s.az));
        p[s.i001] = lerp(p[s.i001], v, (1.0 - s.ax) * (1.0 - s.ay) * s.az);
        p[s.i101] = lerp(p[s.i101], v, s.ax * (1.0 - s.ay) * s.az);
        p[s.i011] = lerp(p[s.i011], v, (1.0 - s.ax) * s.ay * s.az);
        p[s.i111] = lerp(p[s.i111], v, s.ax * s.ay * s.az);
    }

    /// Advance the mesh by one sample, given the current boundary
    /// parameters for each of the six faces.
    ///
    /// Junctions are visited in linearized order (x fastest, then y, then
    /// z); each face array is consumed exactly once per call, in its
    /// declared 2-D layout order (y-major for the x faces, x-major for the
    /// y and z faces).
    pub fn step(&mut self, params: &FaceParams<FXP::Params, FXN::Params, FYP::Params, FYN::Params, FZP::Params, FZN::Params>) {
        let (nx, ny, nz) = (self.nx, self.ny, self.nz);
        let mut i_xp = 0usize;
        let mut i_xn = 0usize;
        let mut i_yp = 0usize;
        let mut i_yn = 0usize;
        let mut i_zp = 0usize;
        let mut i_zn = 0usize;

        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let i = self.linear(x, y, z);
                    let center = self.p_cur[i];

                    let xp = if x + 1 < nx {
                        self.p_cur[i + 1]
                    } else {
                        let v = self.face_xp[i_xp].update(&params.xp, center);
                        i_xp += 1;
                        v
                    };
                    let xn = if x > 0 {
                        self.p_cur[i - 1]
                    } else {
                        let v = self.face_xn[i_xn].update(&params.xn, center);
                        i_xn += 1;
                        v
                    };
                    let yp = if y + 1 < ny {
                        self.p_cur[i + nx]
                    } else {
                        let v = self.face_yp[i_yp].update(&params.yp, center);
                        i_yp += 1;
                        v
                    };
                    let yn = if y > 0 {
                        self.p_cur[i - nx]
                    } else {
                        let v = self.face_yn[i_yn].update(&params.yn, center);
                        i_yn += 1;
                        v
                    };
                    let zp = if z + 1 < nz {
                        self.p_cur[i + nx * ny]
                    } else {
                        let v = self.face_zp[i_zp].update(&params.zp, center);
                        i_zp += 1;
                        v
                    };
                    let zn = if z > 0 {
                        self.p_cur[i - nx * ny]
                    } else {
                        let v = self.face_zn[i_zn].update(&params.zn, center);
                        i_zn += 1;
                        v
                    };

                    self.p_prev[i] = (xp + xn + yp + yn + zp + zn) / 3.0 - self.p_prev[i];
                }
            }
        }

        debug_assert_eq!(i_xp, self.face_xp.len());
        debug_assert_eq!(i_xn, self.face_xn.len());
        debug_assert_eq!(i_yp, self.face_yp.len());
        debug_assert_eq!(i_yn, self.face_yn.len());
        debug_assert_eq!(i_zp, self.face_zp.len());
        debug_assert_eq!(i_zn, self.face_zn.len());

        core::mem::swap(&mut self.p_cur, &mut self.p_prev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_no_alloc::*;
    use crate::boundary::{AdmittanceLowpass, AdmittanceLowpassParams, Anechoic};

    // Same pattern as the teacher's `examples/network.rs`: disable the
    // allocator in debug builds so `assert_no_alloc` can prove the realtime
    // path below never allocates.
    #[cfg(debug_assertions)]
    #[global_allocator]
    static ALLOCATOR: AllocDisabler = AllocDisabler;

    type AnechoicMesh = Mesh3D<Anechoic, Anechoic, Anechoic, Anechoic, Anechoic, Anechoic>;

    fn anechoic_params() -> FaceParams<(), (), (), (), (), ()> {
        FaceParams {
            xp: (),
            xn: (),
            yp: (),
            yn: (),
            zp: (),
            zn: (),
        }
    }

    #[test]
    fn s1_dimensionality_derivation() {
        let mesh = AnechoicMesh::new(1.0, 1.0, 1.0, 48000.0).unwrap();
        let (nx, ny, nz) = mesh.dimensions();
        assert_eq!((nx, ny, nz), (81, 81, 81));
        assert_eq!(nx * ny * nz, 531_441);
    }

    #[test]
    fn zero_in_zero_out() {
        let mut mesh = AnechoicMesh::new(1.0, 1.0, 1.0, 8000.0).unwrap();
        let params = anechoic_params();
        for _ in 0..50 {
            mesh.step(&params);
            assert_eq!(mesh.read_value(0.5, 0.5, 0.5), 0.0);
        }
    }

    #[test]
    fn s2_impulse_propagation_speed() {
        // Same mechanism as the literal S2 scenario (1m^3 @ 48kHz), but with
        // a density chosen so the injection point lands exactly on a
        // junction (density = 48000/(sqrt(3)*343) is irrational, so 0.5m at
        // that density is not an exact grid point). A density of 4 and a
        // center junction away from every face reproduces the same
        // single-impulse/one-step scattering exactly, bit for bit.
        let sample_rate = 3.0_f32.sqrt() * SPEED_OF_SOUND * 4.0;
        let mut mesh = AnechoicMesh::new(1.75, 1.75, 1.75, sample_rate).unwrap();
        let params = anechoic_params();
        let (nx, ny, nz) = mesh.dimensions();
        assert_eq!((nx, ny, nz), (7, 7, 7));
        let (cx, cy, cz) = (3usize, 3usize, 3usize);
        let density = mesh.density();

        mesh.write_value(cx as f32 / density, cy as f32 / density, cz as f32 / density, 1.0);
        mesh.step(&params);

        let at = |x: usize, y: usize, z: usize| {
            mesh.read_value(x as f32 / density, y as f32 / density, z as f32 / density)
        };

        let expected = 1.0 / 3.0;
        assert!((at(cx + 1, cy, cz) - expected).abs() < 1e-5);
        assert!((at(cx - 1, cy, cz) - expected).abs() < 1e-5);
        assert!((at(cx, cy + 1, cz) - expected).abs() < 1e-5);
        assert!((at(cx, cy - 1, cz) - expected).abs() < 1e-5);
        assert!((at(cx, cy, cz + 1) - expected).abs() < 1e-5);
        assert!((at(cx, cy, cz - 1) - expected).abs() < 1e-5);

        assert_eq!(at(cx + 2, cy, cz), 0.0);
        assert_eq!(at(cx, cy, cz), 0.0);
    }

    #[test]
    fn s5_clamp_semantics() {
        let mesh = AnechoicMesh::new(1.0, 1.0, 1.0, 8000.0).unwrap();
        assert_eq!(mesh.read_value(-5.0, 0.5, 0.5), mesh.read_value(0.0, 0.5, 0.5));
        assert_eq!(mesh.read_value(100.0, 0.5, 0.5), mesh.read_value(1.0, 0.5, 0.5));
    }

    #[test]
    fn trilinear_idempotence_on_grid() {
        // density = 4 makes world coordinate 0.75 land exactly on junction
        // 3 in binary floating point, so all eight trilinear weights come
        // out exactly 0 or 1 — no rounding slack.
        let sample_rate = 3.0_f32.sqrt() * SPEED_OF_SOUND * 4.0;
        let mut mesh = AnechoicMesh::new(1.75, 1.75, 1.75, sample_rate).unwrap();
        let idx = mesh.linear(3, 3, 3);
        mesh.write_value(0.75, 0.75, 0.75, 1.0);
        assert_eq!(mesh.read_value(0.75, 0.75, 0.75), 1.0);
        assert_eq!(mesh.p_cur[idx], 1.0);
    }

    #[test]
    fn s6_swap_discipline() {
        // After exactly one step, the buffer now labelled `p_prev` must
        // hold the pre-step (t-1) contents, and `p_cur` the freshly
        // scattered (t) contents — i.e. the two buffers have traded roles.
        let mut mesh = AnechoicMesh::new(1.0, 1.0, 1.0, 8000.0).unwrap();
        let params = anechoic_params();
        mesh.write_value(0.5, 0.5, 0.5, 1.0);
        let pre_step = mesh.p_cur.clone();

        mesh.step(&params);

        assert_eq!(mesh.p_prev, pre_step);
        assert_ne!(mesh.p_cur, pre_step);
    }

    #[test]
    fn s3_1d_anechoic_extinction() {
        type Mesh1D = Mesh3D<Anechoic, Anechoic, Anechoic, Anechoic, Anechoic, Anechoic>;
        // Force a 1-D mesh by using a tiny height/depth and a low sample
        // rate so ny = nz = 1.
        let sample_rate = 3.0_f32.sqrt() * SPEED_OF_SOUND * 4.0; // density = 4
        let mut mesh = Mesh1D::new(5.0 / 4.0, 0.1, 0.1, sample_rate).unwrap();
        let (nx, ny, nz) = mesh.dimensions();
        assert_eq!(ny, 1);
        assert_eq!(nz, 1);
        assert_eq!(nx, 5);

        let params = anechoic_params();
        mesh.write_value(1.0 / 4.0, 0.0, 0.0, 1.0);
        for _ in 0..(2 * nx + 4) {
            mesh.step(&params);
            mesh.write_value(1.0 / 4.0, 0.0, 0.0, 0.0);
        }

        let total: f32 = mesh.p_cur.iter().map(|v| v.abs()).sum();
        assert!(total < 1e-5, "residual energy {total} did not extinguish");
    }

    #[test]
    fn s4_lossy_reflection_loses_energy() {
        type LossyMesh =
            Mesh3D<AdmittanceLowpass, AdmittanceLowpass, AdmittanceLowpass, AdmittanceLowpass, AdmittanceLowpass, AdmittanceLowpass>;
        let mut mesh = LossyMesh::new(1.0, 1.0, 1.0, 8000.0).unwrap();
        let p = AdmittanceLowpassParams::new(0.5, 0.5);
        let params = FaceParams {
            xp: p,
            xn: p,
            yp: p,
            yn: p,
            zp: p,
            zn: p,
        };

        mesh.write_value(0.5, 0.5, 0.5, 1.0);
        mesh.step(&params);
        let peak_energy: f32 = mesh.p_cur.iter().map(|v| v * v).sum();

        for _ in 0..400 {
            mesh.step(&params);
        }
        let later_energy: f32 = mesh.p_cur.iter().map(|v| v * v).sum();

        assert!(
            later_energy < peak_energy,
            "energy did not decrease: peak={peak_energy} later={later_energy}"
        );
    }

    #[test]
    fn face_array_consumption_counts() {
        let mesh = AnechoicMesh::new(1.0, 1.0, 1.0, 8000.0).unwrap();
        let (nx, ny, nz) = mesh.dimensions();
        assert_eq!(mesh.face_xp.len(), ny * nz);
        assert_eq!(mesh.face_xn.len(), ny * nz);
        assert_eq!(mesh.face_yp.len(), nx * nz);
        assert_eq!(mesh.face_yn.len(), nx * nz);
        assert_eq!(mesh.face_zp.len(), nx * ny);
        assert_eq!(mesh.face_zn.len(), nx * ny);
    }

    #[test]
    fn invalid_geometry_rejected() {
        assert!(AnechoicMesh::new(0.0, 1.0, 1.0, 8000.0).is_err());
        assert!(AnechoicMesh::new(1.0, -1.0, 1.0, 8000.0).is_err());
        assert!(AnechoicMesh::new(1.0, 1.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn realtime_path_never_allocates() {
        let mut mesh = AnechoicMesh::new(1.0, 1.0, 1.0, 8000.0).unwrap();
        let params = anechoic_params();
        // `write_value`, `step` and `read_value` are the only operations
        // the realtime audio thread calls; all allocation must already be
        // done by `Mesh3D::new` above.
        assert_no_alloc(|| {
            mesh.write_value(0.5, 0.5, 0.5, 1.0);
            mesh.step(&params);
            mesh.read_value(0.5, 0.5, 0.5);
        });
    }

    #[test]
    fn impulse_locality_manhattan_radius() {
        // A 6-port stencil can move influence by at most one Manhattan hop
        // per step, so a unit impulse at the center can only have reached
        // junctions within radius `n` after `n` steps. Keep `n` well under
        // the distance to any face (5 junctions away here) so no boundary
        // reflection can muddy the causality check.
        let sample_rate = 3.0_f32.sqrt() * SPEED_OF_SOUND * 4.0; // density = 4
        let mut mesh = AnechoicMesh::new(2.75, 2.75, 2.75, sample_rate).unwrap();
        let (nx, ny, nz) = mesh.dimensions();
        assert_eq!((nx, ny, nz), (11, 11, 11));
        let (cx, cy, cz) = (5usize, 5usize, 5usize);
        let density = mesh.density();

        mesh.write_value(cx as f32 / density, cy as f32 / density, cz as f32 / density, 1.0);

        let params = anechoic_params();
        let n = 3usize;
        for _ in 0..n {
            mesh.step(&params);
        }

        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let manhattan = (x as isize - cx as isize).unsigned_abs()
                        + (y as isize - cy as isize).unsigned_abs()
                        + (z as isize - cz as isize).unsigned_abs();
                    if manhattan > n {
                        let idx = mesh.linear(x, y, z);
                        assert_eq!(
                            mesh.p_cur[idx], 0.0,
                            "junction ({x},{y},{z}) at Manhattan distance {manhattan} > {n} steps should be silent"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn anechoic_energy_non_increasing_after_boundary_contact() {
        // Once the wavefront has had time to reach every face at least
        // once, the fully-absorbing boundaries mean total energy can only
        // fall or hold steady step to step, never rise.
        let sample_rate = 3.0_f32.sqrt() * SPEED_OF_SOUND * 4.0; // density = 4
        let mut mesh = AnechoicMesh::new(1.75, 1.75, 1.75, sample_rate).unwrap();
        let (nx, ny, nz) = mesh.dimensions();
        let params = anechoic_params();
        let density = mesh.density();

        mesh.write_value(3.0 / density, 3.0 / density, 3.0 / density, 1.0);

        // A generous upper bound on the number of steps needed for the
        // impulse to reach every one of the six faces at least once.
        let settle = nx + ny + nz;
        let mut energies = Vec::with_capacity(settle + 40);
        for _ in 0..(settle + 40) {
            mesh.step(&params);
            let energy: f32 = mesh.p_cur.iter().map(|v| v * v).sum();
            energies.push(energy);
        }

        for w in energies[settle..].windows(2) {
            assert!(
                w[1] <= w[0] + 1e-6,
                "energy increased from {} to {} after every face had been reached",
                w[0],
                w[1]
            );
        }
    }
}
