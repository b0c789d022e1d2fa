//! Per-box transform plans.
//!
//! Each owned box gets at most one plan per direction per stage: a
//! real↔complex plan bound to the unit-stride axis (optionally covering the
//! second axis too in slab mode), and complex↔complex line plans for the
//! other axis orderings. Plans execute in place over the slices the engine
//! hands them and assume the bound box shape is unchanged since construction.

use rustfft::FftDirection;

use crate::backend::{Complex64, PlanHandle, RustFftBackend, TransformBackend};
use parfft_grid::IndexBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlanKind {
    /// 1-D r2c/c2r lines along axis 0.
    R2cLines,
    /// 2-D r2c/c2r over axes 0 and 1, one plane at a time (slab decomposition
    /// owns whole planes).
    R2cSlab,
    /// 1-D c2c lines along axis 0.
    C2cLines,
    /// Whole-domain transform for the single-process fast path.
    AllDim,
}

/// A plan bound to one local box and direction.
pub(crate) struct Plan {
    kind: PlanKind,
    dir: FftDirection,
    /// Local box lengths in storage order; real lengths for r2c kinds,
    /// complex lengths for c2c.
    shape: [usize; 3],
    /// Truncated unit-stride length (r2c kinds only).
    nxc: usize,
    /// Transformed plane range along axis 2 (restricted by the half-domain
    /// optimization; full range otherwise).
    k0: usize,
    nk: usize,
    hx: PlanHandle,
    hy: Option<PlanHandle>,
    hz: Option<PlanHandle>,
    scratch: Vec<Complex64>,
    line: Vec<Complex64>,
}

/// The forward/backward pair for one box. Only the directions the engine's
/// capability parameter requests are built; `Empty` stands in for a box this
/// plan does not cover and executes as a no-op.
pub(crate) enum PlanPair {
    Empty,
    FwdOnly(Plan),
    BwdOnly(Plan),
    Both { fwd: Plan, bwd: Plan },
}

impl PlanPair {
    pub(crate) fn fwd_mut(&mut self) -> Option<&mut Plan> {
        match self {
            PlanPair::FwdOnly(p) => Some(p),
            PlanPair::Both { fwd, .. } => Some(fwd),
            _ => None,
        }
    }

    pub(crate) fn bwd_mut(&mut self) -> Option<&mut Plan> {
        match self {
            PlanPair::BwdOnly(p) => Some(p),
            PlanPair::Both { bwd, .. } => Some(bwd),
            _ => None,
        }
    }
}

/// Build a pair for the requested directions out of a per-direction factory.
pub(crate) fn make_pair(
    want_fwd: bool,
    want_bwd: bool,
    mut make: impl FnMut(FftDirection) -> Plan,
) -> PlanPair {
    match (want_fwd, want_bwd) {
        (true, true) => PlanPair::Both {
            fwd: make(FftDirection::Forward),
            bwd: make(FftDirection::Inverse),
        },
        (true, false) => PlanPair::FwdOnly(make(FftDirection::Forward)),
        (false, true) => PlanPair::BwdOnly(make(FftDirection::Inverse)),
        (false, false) => PlanPair::Empty,
    }
}

fn shape_of(b: IndexBox) -> [usize; 3] {
    [
        b.length(0) as usize,
        b.length(1) as usize,
        b.length(2) as usize,
    ]
}

impl Plan {
    /// r2c plan over `real_box`; `slab` additionally transforms axis 1.
    /// `planes` restricts the transformed axis-2 range (local indices).
    pub(crate) fn r2c(
        backend: &mut RustFftBackend,
        real_box: IndexBox,
        nxc: usize,
        slab: bool,
        planes: Option<(usize, usize)>,
        dir: FftDirection,
    ) -> Plan {
        let shape = shape_of(real_box);
        let hx = backend.plan_line(shape[0], dir);
        let hy = (slab && shape[1] > 1).then(|| backend.plan_line(shape[1], dir));
        let (k0, nk) = planes.unwrap_or((0, shape[2]));
        let mut plan = Plan {
            kind: if slab { PlanKind::R2cSlab } else { PlanKind::R2cLines },
            dir,
            shape,
            nxc,
            k0,
            nk,
            hx,
            hy,
            hz: None,
            scratch: Vec::new(),
            line: Vec::new(),
        };
        plan.size_buffers();
        plan
    }

    /// c2c line plan along axis 0 of `cbox`.
    pub(crate) fn c2c(backend: &mut RustFftBackend, cbox: IndexBox, dir: FftDirection) -> Plan {
        let shape = shape_of(cbox);
        let hx = backend.plan_line(shape[0], dir);
        let mut plan = Plan {
            kind: PlanKind::C2cLines,
            dir,
            shape,
            nxc: 0,
            k0: 0,
            nk: shape[2],
            hx,
            hy: None,
            hz: None,
            scratch: Vec::new(),
            line: Vec::new(),
        };
        plan.size_buffers();
        plan
    }

    /// Whole-domain plan for the single-process fast path; axes of length 1
    /// are skipped.
    pub(crate) fn all_dim(
        backend: &mut RustFftBackend,
        real_box: IndexBox,
        nxc: usize,
        dir: FftDirection,
    ) -> Plan {
        let shape = shape_of(real_box);
        let hx = backend.plan_line(shape[0], dir);
        let hy = (shape[1] > 1).then(|| backend.plan_line(shape[1], dir));
        let hz = (shape[2] > 1).then(|| backend.plan_line(shape[2], dir));
        let mut plan = Plan {
            kind: PlanKind::AllDim,
            dir,
            shape,
            nxc,
            k0: 0,
            nk: shape[2],
            hx,
            hy,
            hz,
            scratch: Vec::new(),
            line: Vec::new(),
        };
        plan.size_buffers();
        plan
    }

    fn size_buffers(&mut self) {
        let mut scratch = RustFftBackend::scratch_len(&self.hx);
        let mut line = self.shape[0];
        for h in [&self.hy, &self.hz].into_iter().flatten() {
            scratch = scratch.max(RustFftBackend::scratch_len(h));
            line = line.max(h.len());
        }
        self.scratch = vec![Complex64::default(); scratch];
        self.line = vec![Complex64::default(); line];
    }

    /// Forward execution for r2c kinds: `real` in, `cplx` overwritten.
    pub(crate) fn execute_r2c_forward(&mut self, real: &[f64], cplx: &mut [Complex64]) {
        debug_assert_eq!(self.dir, FftDirection::Forward);
        let ny = self.shape[1];
        match self.kind {
            PlanKind::R2cLines => {
                for k in self.k0..self.k0 + self.nk {
                    for j in 0..ny {
                        self.r2c_line(real, cplx, j, k);
                    }
                }
            }
            PlanKind::R2cSlab => {
                for k in self.k0..self.k0 + self.nk {
                    for j in 0..ny {
                        self.r2c_line(real, cplx, j, k);
                    }
                    self.strided_pass_plane(cplx, k);
                }
            }
            PlanKind::AllDim => {
                for k in 0..self.shape[2] {
                    for j in 0..ny {
                        self.r2c_line(real, cplx, j, k);
                    }
                    self.strided_pass_plane(cplx, k);
                }
                self.strided_pass_axis2(cplx);
            }
            PlanKind::C2cLines => unreachable!("c2c plan driven through execute_c2c"),
        }
    }

    /// Backward execution for r2c kinds: `cplx` consumed (and scrambled),
    /// `real` overwritten.
    pub(crate) fn execute_r2c_backward(&mut self, real: &mut [f64], cplx: &mut [Complex64]) {
        debug_assert_eq!(self.dir, FftDirection::Inverse);
        let ny = self.shape[1];
        match self.kind {
            PlanKind::R2cLines => {
                for k in self.k0..self.k0 + self.nk {
                    for j in 0..ny {
                        self.c2r_line(real, cplx, j, k);
                    }
                }
            }
            PlanKind::R2cSlab => {
                for k in self.k0..self.k0 + self.nk {
                    self.strided_pass_plane(cplx, k);
                    for j in 0..ny {
                        self.c2r_line(real, cplx, j, k);
                    }
                }
            }
            PlanKind::AllDim => {
                self.strided_pass_axis2(cplx);
                for k in 0..self.shape[2] {
                    self.strided_pass_plane(cplx, k);
                }
                for k in 0..self.shape[2] {
                    for j in 0..ny {
                        self.c2r_line(real, cplx, j, k);
                    }
                }
            }
            PlanKind::C2cLines => unreachable!("c2c plan driven through execute_c2c"),
        }
    }

    /// In-place c2c over every contiguous axis-0 line of the bound box.
    pub(crate) fn execute_c2c(&mut self, data: &mut [Complex64]) {
        debug_assert_eq!(self.kind, PlanKind::C2cLines);
        debug_assert_eq!(data.len() % self.shape[0], 0);
        self.hx.process_with_scratch(data, &mut self.scratch);
    }

    fn r2c_line(&mut self, real: &[f64], cplx: &mut [Complex64], j: usize, k: usize) {
        let [nx, ny, _] = self.shape;
        let nxc = self.nxc;
        let rbase = nx * (j + ny * k);
        for (slot, &v) in self.line[..nx].iter_mut().zip(&real[rbase..rbase + nx]) {
            *slot = Complex64::new(v, 0.0);
        }
        self.hx
            .process_with_scratch(&mut self.line[..nx], &mut self.scratch);
        let cbase = nxc * (j + ny * k);
        cplx[cbase..cbase + nxc].copy_from_slice(&self.line[..nxc]);
    }

    fn c2r_line(&mut self, real: &mut [f64], cplx: &[Complex64], j: usize, k: usize) {
        let [nx, ny, _] = self.shape;
        let nxc = self.nxc;
        let cbase = nxc * (j + ny * k);
        self.line[..nxc].copy_from_slice(&cplx[cbase..cbase + nxc]);
        for i in nxc..nx {
            self.line[i] = self.line[nx - i].conj();
        }
        self.hx
            .process_with_scratch(&mut self.line[..nx], &mut self.scratch);
        let rbase = nx * (j + ny * k);
        for (r, c) in real[rbase..rbase + nx].iter_mut().zip(&self.line[..nx]) {
            *r = c.re;
        }
    }

    /// Axis-1 line pass over plane `k` of the truncated complex layout
    /// (lanes have stride `nxc`).
    fn strided_pass_plane(&mut self, cplx: &mut [Complex64], k: usize) {
        let Some(hy) = self.hy.clone() else { return };
        let [_, ny, _] = self.shape;
        let nxc = self.nxc;
        for i in 0..nxc {
            for j in 0..ny {
                self.line[j] = cplx[i + nxc * (j + ny * k)];
            }
            hy.process_with_scratch(&mut self.line[..ny], &mut self.scratch);
            for j in 0..ny {
                cplx[i + nxc * (j + ny * k)] = self.line[j];
            }
        }
    }

    /// Axis-2 line pass over the truncated complex layout (lanes have stride
    /// `nxc * ny`).
    fn strided_pass_axis2(&mut self, cplx: &mut [Complex64]) {
        let Some(hz) = self.hz.clone() else { return };
        let [_, ny, nz] = self.shape;
        let nxc = self.nxc;
        for j in 0..ny {
            for i in 0..nxc {
                for k in 0..nz {
                    self.line[k] = cplx[i + nxc * (j + ny * k)];
                }
                hz.process_with_scratch(&mut self.line[..nz], &mut self.scratch);
                for k in 0..nz {
                    cplx[i + nxc * (j + ny * k)] = self.line[k];
                }
            }
        }
    }
}
