#![forbid(unsafe_code)]

//! Distributed real-to-complex DFT engine over block-decomposed grids.
//!
//! The engine transforms a real field tiled across a process group into its
//! truncated complex spectrum and back, as the kernel inside
//! elliptic/convolution solvers. A forward pass runs the unit-stride
//! real-to-complex stage, then up to two global transposes interleaved with
//! complex line stages; a backward pass reverses the sequence. Which stages
//! exist is decided once at construction from the domain shape, the process
//! count, and the decomposition strategy.
//!
//! Direction capability is part of the type: `R2c<Forward>` has no backward
//! surface at all, `R2c<Backward>` no forward surface, and `R2c<Both>` (the
//! default) carries both. Misdirected calls fail to compile instead of
//! failing at run time.
//!
//! ```no_run
//! use parfft_engine::{Info, R2c};
//! use parfft_grid::{decompose, DistributionMapping, FabArray, IndexBox, IntVect, ProcGroup};
//!
//! let domain = IndexBox::from_lengths(32, 32, 32);
//! let group = ProcGroup::new(4);
//! let mut engine: R2c = R2c::new(domain, Info::default(), group)?;
//! let ba = decompose(domain, 4, [false, true, true]);
//! let dm = DistributionMapping::iota(ba.len());
//! let mut field = FabArray::<f64>::new(ba, dm, IntVect::zero());
//! let mut out = field.clone();
//! engine.forward_then_backward(&field, &mut out, |_i, _j, _k, _c| {})?;
//! # Ok::<(), parfft_engine::ConfigError>(())
//! ```

mod alias;
mod backend;
mod decomp;
mod openbc;
mod plan;
mod sub;
mod trace;
mod transpose;

use std::marker::PhantomData;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use parfft_grid::{
    BoxArray, DistributionMapping, FabArray, IndexBox, IntVect, Periodicity, ProcGroup,
};

use crate::alias::{pool_len, Field, PoolId};
use crate::decomp::{Decomp, DecompOutcome};
use crate::plan::{make_pair, Plan, PlanPair};
use crate::sub::SubHelper;
use crate::transpose::{CommMetaData, Permutation, TransposeCache};

pub use crate::backend::{Complex64, DefaultBackend, PlanHandle, TransformBackend};
pub use crate::trace::{take_stage_traces, StageTrace};

/// Fatal configuration errors, raised at construction or prepare time. There
/// is no recoverable category beyond these; violated internal invariants
/// panic.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("transform domain {0:?} has at most one point")]
    DegenerateDomain(IndexBox),
    #[error("batch mode needs at least two non-degenerate axes, domain {0:?}")]
    BatchModeNeedsTwoAxes(IndexBox),
    #[error("requested rank cap must be at least one")]
    ZeroRankCap,
    #[error("open-boundary optimization unavailable: {0}")]
    OpenBcUnsupported(&'static str),
    #[error("spectral post-processing hook is unsupported in batch mode")]
    BatchHookUnsupported,
}

/// How a 3-D domain splits across ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DomainStrategy {
    /// Split the trailing axis only; whole planes stay rank-local.
    #[default]
    Slab,
    /// Split the two trailing axes.
    Pencil,
}

/// Engine configuration. Builder-style setters; the default is a
/// slab-preferring, non-batch transform over the whole process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// Cap on the ranks given work; `None` uses the whole group.
    pub nprocs: Option<usize>,
    /// Treat the trailing non-degenerate axis as an untransformed batch axis.
    pub batch_mode: bool,
    pub strategy: DomainStrategy,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            nprocs: None,
            batch_mode: false,
            strategy: DomainStrategy::default(),
        }
    }
}

impl Info {
    #[must_use]
    pub fn with_nprocs(mut self, nprocs: usize) -> Self {
        self.nprocs = Some(nprocs);
        self
    }

    #[must_use]
    pub fn with_batch_mode(mut self, batch_mode: bool) -> Self {
        self.batch_mode = batch_mode;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: DomainStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Compile-time direction capability of an engine instance.
pub trait Direction: sealed::Sealed + 'static {
    const FORWARD: bool;
    const BACKWARD: bool;
}

/// Forward-only capability marker.
pub enum Forward {}
/// Backward-only capability marker.
pub enum Backward {}
/// Both-directions capability marker (the default).
pub enum Both {}

impl sealed::Sealed for Forward {}
impl sealed::Sealed for Backward {}
impl sealed::Sealed for Both {}

impl Direction for Forward {
    const FORWARD: bool = true;
    const BACKWARD: bool = false;
}
impl Direction for Backward {
    const FORWARD: bool = false;
    const BACKWARD: bool = true;
}
impl Direction for Both {
    const FORWARD: bool = true;
    const BACKWARD: bool = true;
}

/// Markers whose engines expose the forward surface.
pub trait ForwardCapable: Direction {}
impl ForwardCapable for Forward {}
impl ForwardCapable for Both {}

/// Markers whose engines expose the backward surface.
pub trait BackwardCapable: Direction {}
impl BackwardCapable for Backward {}
impl BackwardCapable for Both {}

/// Read-only view of the internal spectral buffer in its storage ordering.
///
/// `order()[d]` names the global axis stored along storage axis `d`; storage
/// axis 0 is unit stride. Use [`R2c::spectral_data_layout`] for a
/// standard-ordered tiling suitable for caller-owned containers.
pub struct SpectralData<'a> {
    field: &'a Field,
    pool: &'a [Complex64],
    order: [usize; 3],
}

impl SpectralData<'_> {
    #[must_use]
    pub fn boxarray(&self) -> &BoxArray {
        &self.field.ba
    }

    #[must_use]
    pub fn dist_map(&self) -> &DistributionMapping {
        &self.field.dm
    }

    #[must_use]
    pub fn order(&self) -> [usize; 3] {
        self.order
    }

    /// The coefficients of box `i`, Fortran order over the storage box.
    #[must_use]
    pub fn fab_data(&self, i: usize) -> &[Complex64] {
        &self.pool[self.field.range(i)]
    }
}

/// The distributed r2c/c2r transform engine.
///
/// Built once over an immutable domain; repeated forward/backward calls flow
/// data through the frozen decomposition, plans, and transpose schedules.
/// Calls on one instance must be externally serialized; independent instances
/// are fully independent.
pub struct R2c<D: Direction = Both> {
    body: Body<D>,
}

enum Body<D: Direction> {
    Direct(Box<Core>, PhantomData<D>),
    /// The domain had an interior degenerate axis; a nested engine over the
    /// squeezed domain owns all real state.
    Reduced {
        helper: SubHelper,
        inner: Box<R2c<D>>,
    },
}

type Hook<'a> = &'a (dyn Fn(i32, i32, i32, &mut Complex64) + Sync);

impl<D: Direction> R2c<D> {
    /// Plan the transform of `domain` across `group`.
    pub fn new(domain: IndexBox, info: Info, group: ProcGroup) -> Result<Self, ConfigError> {
        let body = match SubHelper::try_new(domain) {
            Some(helper) => {
                let inner = R2c::new(helper.squeeze_box(domain), info, group)?;
                // A squeezed domain is canonical; the nesting ends here.
                debug_assert!(matches!(inner.body, Body::Direct(..)));
                Body::Reduced {
                    helper,
                    inner: Box::new(inner),
                }
            }
            None => Body::Direct(
                Box::new(Core::new(domain, info, group, D::FORWARD, D::BACKWARD)?),
                PhantomData,
            ),
        };
        Ok(Self { body })
    }

    /// Reciprocal of the divisor a forward-then-backward pass applies: the
    /// domain point count, or the transformed-axes product in batch mode.
    #[must_use]
    pub fn scaling_factor(&self) -> f64 {
        match &self.body {
            Body::Direct(core, _) => core.scaling_factor(),
            Body::Reduced { inner, .. } => inner.scaling_factor(),
        }
    }

    /// The internal spectral buffer with its storage-order triple, in the
    /// original domain's axis labels.
    #[must_use]
    pub fn spectral_data(&self) -> SpectralData<'_> {
        match &self.body {
            Body::Direct(core, _) => core.spectral_view(),
            Body::Reduced { helper, inner } => {
                let mut view = inner.spectral_data();
                view.order = helper.expand_order(view.order);
                view
            }
        }
    }

    /// Standard-(x,y,z)-ordered tiling of the spectral domain, for building
    /// caller-owned spectral containers.
    #[must_use]
    pub fn spectral_data_layout(&self) -> (BoxArray, DistributionMapping) {
        let view = self.spectral_data();
        let order = view.order();
        let mut pos = [0usize; 3];
        for (d, &axis) in order.iter().enumerate() {
            pos[axis] = d;
        }
        (
            view.boxarray().map(|b| b.permuted(pos)),
            view.dist_map().clone(),
        )
    }

    /// Engage the Hermitian half-domain optimization. Fails on reduced,
    /// single-process, non-3-D, batched, or pencil-decomposed problems.
    pub fn prepare_open_bc(&mut self) -> Result<(), ConfigError> {
        match &mut self.body {
            Body::Direct(core, _) => core.prepare_open_bc(),
            Body::Reduced { .. } => Err(ConfigError::OpenBcUnsupported(
                "reduced (degenerate-axis) domain",
            )),
        }
    }
}

impl<D: ForwardCapable> R2c<D> {
    /// Transform `input` into the internal spectral buffer.
    pub fn forward(&mut self, input: &FabArray<f64>) {
        match &mut self.body {
            Body::Direct(core, _) => core.forward_doit(input),
            Body::Reduced { helper, inner } => {
                let sub_in = helper.to_sub(input);
                inner.forward(&sub_in);
            }
        }
    }

    /// Transform `input` and deposit the spectrum into `out`, which must tile
    /// (part of) the standard-ordered spectral domain.
    pub fn forward_into(&mut self, input: &FabArray<f64>, out: &mut FabArray<Complex64>) {
        match &mut self.body {
            Body::Direct(core, _) => {
                core.forward_doit(input);
                core.copy_spectral_out(out);
            }
            Body::Reduced { helper, inner } => {
                let sub_in = helper.to_sub(input);
                let mut sub_out = helper.to_sub(out);
                inner.forward_into(&sub_in, &mut sub_out);
                helper.from_sub(out, &sub_out);
            }
        }
    }
}

impl<D: BackwardCapable> R2c<D> {
    /// Inverse-transform the internal spectral buffer into `out`. The result
    /// is unscaled; multiply by [`R2c::scaling_factor`] to recover the input.
    pub fn backward(&mut self, out: &mut FabArray<f64>) {
        match &mut self.body {
            Body::Direct(core, _) => {
                core.backward_doit(out, IntVect::zero(), Periodicity::non_periodic());
            }
            Body::Reduced { helper, inner } => {
                let mut sub_out = helper.to_sub(out);
                inner.backward(&mut sub_out);
                helper.from_sub(out, &sub_out);
            }
        }
    }

    /// Inverse-transform caller-provided spectral data. `ngout` limits how
    /// many ghost cells of `out` are filled (elementwise min with the
    /// container's own width); `periodicity` enables wraparound images during
    /// the final redistribution.
    pub fn backward_from(
        &mut self,
        spectral: &FabArray<Complex64>,
        out: &mut FabArray<f64>,
        ngout: IntVect,
        periodicity: Periodicity,
    ) {
        match &mut self.body {
            Body::Direct(core, _) => {
                core.copy_spectral_in(spectral);
                core.backward_doit(out, ngout, periodicity);
            }
            Body::Reduced { helper, inner } => {
                let sub_spectrum = helper.to_sub(spectral);
                let mut sub_out = helper.to_sub(out);
                inner.backward_from(
                    &sub_spectrum,
                    &mut sub_out,
                    helper.squeeze_iv(ngout),
                    helper.squeeze_periodicity(periodicity),
                );
                helper.from_sub(out, &sub_out);
            }
        }
    }
}

impl<D: ForwardCapable + BackwardCapable> R2c<D> {
    /// Forward transform, apply `hook` to every retained spectral
    /// coefficient, backward transform. The hook receives `(i, j, k)` in the
    /// original axis order regardless of internal storage ordering.
    ///
    /// Unsupported in batch mode (the batch axis carries untransformed data
    /// the hook's index contract cannot describe).
    pub fn forward_then_backward(
        &mut self,
        input: &FabArray<f64>,
        out: &mut FabArray<f64>,
        hook: impl Fn(i32, i32, i32, &mut Complex64) + Sync,
    ) -> Result<(), ConfigError> {
        self.forward_then_backward_dyn(input, out, &hook)
    }

    fn forward_then_backward_dyn(
        &mut self,
        input: &FabArray<f64>,
        out: &mut FabArray<f64>,
        hook: Hook<'_>,
    ) -> Result<(), ConfigError> {
        match &mut self.body {
            Body::Direct(core, _) => {
                if core.info.batch_mode {
                    return Err(ConfigError::BatchHookUnsupported);
                }
                core.forward_doit(input);
                core.post_forward(hook);
                core.backward_doit(out, IntVect::zero(), Periodicity::non_periodic());
                Ok(())
            }
            Body::Reduced { helper, inner } => {
                let sub_in = helper.to_sub(input);
                let mut sub_out = helper.to_sub(out);
                let h = *helper;
                let translated = move |i: i32, j: i32, k: i32, c: &mut Complex64| {
                    let g = h.expand_point(IntVect::new(i, j, k));
                    hook(g[0], g[1], g[2], c);
                };
                inner.forward_then_backward_dyn(&sub_in, &mut sub_out, &translated)?;
                helper.from_sub(out, &sub_out);
                Ok(())
            }
        }
    }
}

/// All real state of a non-reduced engine.
pub(crate) struct Core {
    pub(crate) info: Info,
    pub(crate) outcome: DecompOutcome,
    pub(crate) slab: bool,
    pub(crate) real_domain: IndexBox,
    pub(crate) sd_x: IndexBox,
    pub(crate) sd_y: IndexBox,
    pub(crate) sd_z: IndexBox,
    pub(crate) nxc: i32,
    pub(crate) rx: Field,
    pub(crate) cx: Field,
    pub(crate) cy: Option<Field>,
    pub(crate) cz: Option<Field>,
    pub(crate) pool_r: Vec<f64>,
    pub(crate) pool_a: Vec<Complex64>,
    pub(crate) pool_b: Vec<Complex64>,
    pub(crate) plans_x: Vec<PlanPair>,
    pub(crate) plans_y: Vec<PlanPair>,
    pub(crate) plans_z: Vec<PlanPair>,
    /// Half-plane replacements for `plans_x`, built by `prepare_open_bc`.
    pub(crate) plans_x_half: Vec<PlanPair>,
    pub(crate) cmds: TransposeCache,
    pub(crate) openbc: bool,
    pub(crate) backend: DefaultBackend,
    pub(crate) want_fwd: bool,
    pub(crate) want_bwd: bool,
}

impl Core {
    fn new(
        domain: IndexBox,
        info: Info,
        group: ProcGroup,
        want_fwd: bool,
        want_bwd: bool,
    ) -> Result<Core, ConfigError> {
        let d = Decomp::new(domain, &info, group)?;
        debug_assert!(d.rx.len() <= d.nprocs);
        let nxc = domain.length(0) / 2 + 1;

        // One owner map per box count; later stages reuse an earlier map of
        // matching length so equal-size tilings land on the same ranks.
        let dm_x = DistributionMapping::iota(d.rx.len());
        fn reuse(ba: &BoxArray, prior: &[&DistributionMapping]) -> DistributionMapping {
            prior
                .iter()
                .find(|dm| dm.len() == ba.len())
                .map_or_else(|| DistributionMapping::iota(ba.len()), |dm| (*dm).clone())
        }
        let rx = Field::new(d.rx, dm_x.clone(), PoolId::Real);
        let cx = Field::new(d.cx, dm_x.clone(), PoolId::B);
        let cy = d.cy.map(|ba| {
            let dm = reuse(&ba, &[&dm_x]);
            Field::new(ba, dm, PoolId::A)
        });
        // The z stage shares storage with whichever family is dead by the
        // time it fills: the y stage's pool under slab (no y stage exists),
        // the x stage's pool under pencil.
        let cz_pool = if d.slab { PoolId::A } else { PoolId::B };
        let cz = d.cz.map(|ba| {
            let mut prior = vec![&dm_x];
            if let Some(f) = &cy {
                prior.push(&f.dm);
            }
            let dm = reuse(&ba, &prior);
            Field::new(ba, dm, cz_pool)
        });

        let pool_r = vec![0.0; rx.total()];
        let complex_fields = [Some(&cx), cy.as_ref(), cz.as_ref()];
        let pool_a = vec![
            Complex64::default();
            pool_len(complex_fields.into_iter().flatten(), PoolId::A)
        ];
        let pool_b = vec![
            Complex64::default();
            pool_len(complex_fields.into_iter().flatten(), PoolId::B)
        ];

        let mut backend = DefaultBackend::new();
        let mut plans_x = Vec::with_capacity(rx.ba.len());
        for i in 0..rx.ba.len() {
            let b = rx.ba.get(i);
            let pair = match d.outcome {
                DecompOutcome::AllDim => make_pair(want_fwd, want_bwd, |dir| {
                    Plan::all_dim(&mut backend, b, nxc as usize, dir)
                }),
                _ => make_pair(want_fwd, want_bwd, |dir| {
                    Plan::r2c(&mut backend, b, nxc as usize, d.slab, None, dir)
                }),
            };
            plans_x.push(pair);
        }
        let mut plans_y = Vec::new();
        if let Some(f) = &cy {
            for i in 0..f.ba.len() {
                let b = f.ba.get(i);
                plans_y.push(make_pair(want_fwd, want_bwd, |dir| {
                    Plan::c2c(&mut backend, b, dir)
                }));
            }
        }
        let mut plans_z = Vec::new();
        if let Some(f) = &cz {
            for i in 0..f.ba.len() {
                let b = f.ba.get(i);
                plans_z.push(make_pair(want_fwd, want_bwd, |dir| {
                    Plan::c2c(&mut backend, b, dir)
                }));
            }
        }

        Ok(Core {
            info,
            outcome: d.outcome,
            slab: d.slab,
            real_domain: domain,
            sd_x: d.sd_x,
            sd_y: d.sd_y,
            sd_z: d.sd_z,
            nxc,
            rx,
            cx,
            cy,
            cz,
            pool_r,
            pool_a,
            pool_b,
            plans_x,
            plans_y,
            plans_z,
            plans_x_half: Vec::new(),
            cmds: TransposeCache::default(),
            openbc: false,
            backend,
            want_fwd,
            want_bwd,
        })
    }

    pub(crate) fn scaling_factor(&self) -> f64 {
        let (nx, ny, nz) = (
            self.real_domain.length(0) as f64,
            self.real_domain.length(1) as f64,
            self.real_domain.length(2),
        );
        if self.info.batch_mode {
            if nz > 1 {
                1.0 / (nx * ny)
            } else {
                1.0 / nx
            }
        } else {
            1.0 / self.real_domain.num_pts() as f64
        }
    }

    /// Storage-order triple of the final spectral stage.
    pub(crate) fn spectral_order(&self) -> [usize; 3] {
        match self.outcome {
            DecompOutcome::AllDim | DecompOutcome::XOnly => [0, 1, 2],
            DecompOutcome::XY => [1, 0, 2],
            DecompOutcome::XYZSlab | DecompOutcome::XYZPencil => [2, 0, 1],
        }
    }

    fn final_field(&self) -> &Field {
        match self.outcome {
            DecompOutcome::AllDim | DecompOutcome::XOnly => &self.cx,
            DecompOutcome::XY => self.cy.as_ref().unwrap_or(&self.cx),
            DecompOutcome::XYZSlab | DecompOutcome::XYZPencil => {
                self.cz.as_ref().unwrap_or(&self.cx)
            }
        }
    }

    fn pool_of(&self, pool: PoolId) -> &[Complex64] {
        match pool {
            PoolId::A => &self.pool_a,
            PoolId::B => &self.pool_b,
            PoolId::Real => unreachable!("real pool holds no complex data"),
        }
    }

    pub(crate) fn spectral_view(&self) -> SpectralData<'_> {
        let field = self.final_field();
        SpectralData {
            field,
            pool: self.pool_of(field.pool),
            order: self.spectral_order(),
        }
    }

    // ---- forward / backward stage sequences -------------------------------

    pub(crate) fn forward_doit(&mut self, input: &FabArray<f64>) {
        let op = trace::next_operation_id();
        self.copy_real_in(input, &op);
        match self.outcome {
            DecompOutcome::AllDim | DecompOutcome::XOnly => {
                self.stage_fft_x(&op, true);
            }
            DecompOutcome::XY => {
                self.stage_fft_x(&op, true);
                self.transpose_x2y(&op);
                self.stage_fft_line(&op, true, Stage::Y);
            }
            DecompOutcome::XYZSlab => {
                if self.openbc {
                    self.forward_half(&op);
                } else {
                    self.stage_fft_x(&op, true);
                    self.transpose_x2z(&op);
                }
                self.stage_fft_line(&op, true, Stage::Z);
            }
            DecompOutcome::XYZPencil => {
                self.stage_fft_x(&op, true);
                self.transpose_x2y(&op);
                self.stage_fft_line(&op, true, Stage::Y);
                self.transpose_y2z(&op);
                self.stage_fft_line(&op, true, Stage::Z);
            }
        }
    }

    pub(crate) fn backward_doit(
        &mut self,
        out: &mut FabArray<f64>,
        ngout: IntVect,
        periodicity: Periodicity,
    ) {
        let op = trace::next_operation_id();
        match self.outcome {
            DecompOutcome::AllDim | DecompOutcome::XOnly => {
                self.stage_fft_x(&op, false);
            }
            DecompOutcome::XY => {
                self.stage_fft_line(&op, false, Stage::Y);
                self.transpose_y2x(&op);
                self.stage_fft_x(&op, false);
            }
            DecompOutcome::XYZSlab => {
                self.stage_fft_line(&op, false, Stage::Z);
                if self.openbc {
                    self.backward_half(&op);
                } else {
                    self.transpose_z2x(&op);
                    self.stage_fft_x(&op, false);
                }
            }
            DecompOutcome::XYZPencil => {
                self.stage_fft_line(&op, false, Stage::Z);
                self.transpose_z2y(&op);
                self.stage_fft_line(&op, false, Stage::Y);
                self.transpose_y2x(&op);
                self.stage_fft_x(&op, false);
            }
        }
        self.copy_real_out(out, ngout, periodicity, &op);
    }

    /// Apply `hook` to every coefficient of the final spectral buffer,
    /// passing global `(i, j, k)` in original axis order.
    pub(crate) fn post_forward(&mut self, hook: Hook<'_>) {
        let order = self.spectral_order();
        let field = match self.outcome {
            DecompOutcome::AllDim | DecompOutcome::XOnly => &self.cx,
            DecompOutcome::XY => self.cy.as_ref().unwrap_or(&self.cx),
            DecompOutcome::XYZSlab | DecompOutcome::XYZPencil => {
                self.cz.as_ref().unwrap_or(&self.cx)
            }
        };
        let pool = match field.pool {
            PoolId::A => &mut self.pool_a,
            PoolId::B => &mut self.pool_b,
            PoolId::Real => unreachable!("real pool holds no complex data"),
        };
        for i in 0..field.ba.len() {
            let b = field.ba.get(i);
            let (n0, n1) = (b.length(0) as usize, b.length(1) as usize);
            let lo = b.lo();
            let slice = &mut pool[field.range(i)];
            slice.par_iter_mut().enumerate().for_each(|(idx, c)| {
                let s = IntVect::new(
                    lo[0] + (idx % n0) as i32,
                    lo[1] + ((idx / n0) % n1) as i32,
                    lo[2] + (idx / (n0 * n1)) as i32,
                );
                // Storage axis d holds global axis order[d].
                let mut g = IntVect::zero();
                for d in 0..3 {
                    g[order[d]] = s[d];
                }
                hook(g[0], g[1], g[2], c);
            });
        }
    }

    // ---- transform stages -------------------------------------------------

    pub(crate) fn stage_fft_x(&mut self, op: &str, forward: bool) {
        let t = Instant::now();
        let mut points = 0;
        let plans = if self.openbc && !self.plans_x_half.is_empty() {
            &mut self.plans_x_half
        } else {
            &mut self.plans_x
        };
        for (i, pair) in plans.iter_mut().enumerate() {
            let rslice = &mut self.pool_r[self.rx.range(i)];
            let cslice = &mut self.pool_b[self.cx.range(i)];
            if forward {
                if let Some(p) = pair.fwd_mut() {
                    p.execute_r2c_forward(rslice, cslice);
                    points += self.rx.ba.get(i).num_pts();
                }
            } else if let Some(p) = pair.bwd_mut() {
                p.execute_r2c_backward(rslice, cslice);
                points += self.rx.ba.get(i).num_pts();
            }
        }
        record_stage(op, "fft-x", forward, plans.len(), points, t);
    }

    fn stage_fft_line(&mut self, op: &str, forward: bool, stage: Stage) {
        let t = Instant::now();
        let mut points = 0;
        let (field, plans, name) = match stage {
            Stage::Y => (self.cy.as_ref(), &mut self.plans_y, "fft-y"),
            Stage::Z => (self.cz.as_ref(), &mut self.plans_z, "fft-z"),
        };
        let Some(field) = field else {
            unreachable!("line stage without a stage buffer")
        };
        let pool = match field.pool {
            PoolId::A => &mut self.pool_a,
            PoolId::B => &mut self.pool_b,
            PoolId::Real => unreachable!("real pool holds no complex data"),
        };
        for (i, pair) in plans.iter_mut().enumerate() {
            let plan = if forward { pair.fwd_mut() } else { pair.bwd_mut() };
            if let Some(p) = plan {
                p.execute_c2c(&mut pool[field.range(i)]);
                points += field.ba.get(i).num_pts();
            }
        }
        record_stage(op, name, forward, plans.len(), points, t);
    }

    // ---- transpose stages -------------------------------------------------

    fn transpose_x2y(&mut self, op: &str) {
        let Some(cy) = &self.cy else {
            unreachable!("x2y without a y-stage buffer")
        };
        run_transpose(
            &mut self.cmds.x2y,
            &self.cx,
            &self.pool_b,
            cy,
            &mut self.pool_a,
            Permutation::Swap01,
            self.sd_y,
            op,
            "transpose-x2y",
            true,
        );
    }

    fn transpose_y2x(&mut self, op: &str) {
        let Some(cy) = &self.cy else {
            unreachable!("y2x without a y-stage buffer")
        };
        run_transpose(
            &mut self.cmds.y2x,
            cy,
            &self.pool_a,
            &self.cx,
            &mut self.pool_b,
            Permutation::Swap01,
            self.sd_x,
            op,
            "transpose-y2x",
            false,
        );
    }

    fn transpose_y2z(&mut self, op: &str) {
        let (Some(cy), Some(cz)) = (&self.cy, &self.cz) else {
            unreachable!("y2z without stage buffers")
        };
        run_transpose(
            &mut self.cmds.y2z,
            cy,
            &self.pool_a,
            cz,
            &mut self.pool_b,
            Permutation::Swap02,
            self.sd_z,
            op,
            "transpose-y2z",
            true,
        );
    }

    fn transpose_z2y(&mut self, op: &str) {
        let (Some(cy), Some(cz)) = (&self.cy, &self.cz) else {
            unreachable!("z2y without stage buffers")
        };
        run_transpose(
            &mut self.cmds.z2y,
            cz,
            &self.pool_b,
            cy,
            &mut self.pool_a,
            Permutation::Swap02,
            self.sd_y,
            op,
            "transpose-z2y",
            false,
        );
    }

    fn transpose_x2z(&mut self, op: &str) {
        let Some(cz) = &self.cz else {
            unreachable!("x2z without a z-stage buffer")
        };
        run_transpose(
            &mut self.cmds.x2z,
            &self.cx,
            &self.pool_b,
            cz,
            &mut self.pool_a,
            Permutation::RotateFwd,
            self.sd_z,
            op,
            "transpose-x2z",
            true,
        );
    }

    fn transpose_z2x(&mut self, op: &str) {
        let Some(cz) = &self.cz else {
            unreachable!("z2x without a z-stage buffer")
        };
        run_transpose(
            &mut self.cmds.z2x,
            cz,
            &self.pool_a,
            &self.cx,
            &mut self.pool_b,
            Permutation::RotateBwd,
            self.sd_x,
            op,
            "transpose-z2x",
            false,
        );
    }

    // ---- boundary copies --------------------------------------------------

    fn copy_real_in(&mut self, input: &FabArray<f64>, op: &str) {
        let t = Instant::now();
        let mut points = 0;
        for i in 0..self.rx.ba.len() {
            let b = self.rx.ba.get(i);
            let base = self.rx.range(i).start;
            for j in 0..input.nfabs() {
                let fab = input.fab(j);
                let isect = b.intersect(&fab.valid_box());
                if !isect.ok() {
                    continue;
                }
                for p in isect.iter() {
                    self.pool_r[base + b.linear_index(p)] = *fab.get(p);
                }
                points += isect.num_pts();
            }
        }
        record_stage(op, "copy-in", true, self.rx.ba.len(), points, t);
    }

    fn copy_real_out(
        &mut self,
        out: &mut FabArray<f64>,
        ngout: IntVect,
        periodicity: Periodicity,
        op: &str,
    ) {
        let t = Instant::now();
        let mut points = 0;
        let ng = ngout.min(out.ngrow());
        let shifts = periodicity.shifts();
        for j in 0..out.nfabs() {
            let dregion = out.fab(j).valid_box().grown(ng);
            for i in 0..self.rx.ba.len() {
                let b = self.rx.ba.get(i);
                let base = self.rx.range(i).start;
                for &s in &shifts {
                    let isect = dregion.intersect(&b.shifted(s));
                    if !isect.ok() {
                        continue;
                    }
                    let fab = out.fab_mut(j);
                    for p in isect.iter() {
                        *fab.get_mut(p) = self.pool_r[base + b.linear_index(p - s)];
                    }
                    points += isect.num_pts();
                }
            }
        }
        record_stage(op, "copy-out", false, out.nfabs(), points, t);
    }

    /// Deposit the final spectral buffer into a standard-ordered container.
    fn copy_spectral_out(&self, out: &mut FabArray<Complex64>) {
        let order = self.spectral_order();
        let mut pos = [0usize; 3];
        for (d, &axis) in order.iter().enumerate() {
            pos[axis] = d;
        }
        let field = self.final_field();
        let pool = self.pool_of(field.pool);
        for j in 0..out.nfabs() {
            let dbox = out.fab(j).valid_box();
            for i in 0..field.ba.len() {
                let sb = field.ba.get(i);
                let isect = dbox.intersect(&sb.permuted(pos));
                if !isect.ok() {
                    continue;
                }
                let base = field.range(i).start;
                let fab = out.fab_mut(j);
                for g in isect.iter() {
                    let s = g.permuted(order);
                    *fab.get_mut(g) = pool[base + sb.linear_index(s)];
                }
            }
        }
    }

    /// Load caller spectral data into the final stage buffer.
    fn copy_spectral_in(&mut self, spectral: &FabArray<Complex64>) {
        let order = self.spectral_order();
        let mut pos = [0usize; 3];
        for (d, &axis) in order.iter().enumerate() {
            pos[axis] = d;
        }
        let field = match self.outcome {
            DecompOutcome::AllDim | DecompOutcome::XOnly => &self.cx,
            DecompOutcome::XY => self.cy.as_ref().unwrap_or(&self.cx),
            DecompOutcome::XYZSlab | DecompOutcome::XYZPencil => {
                self.cz.as_ref().unwrap_or(&self.cx)
            }
        };
        let pool = match field.pool {
            PoolId::A => &mut self.pool_a,
            PoolId::B => &mut self.pool_b,
            PoolId::Real => unreachable!("real pool holds no complex data"),
        };
        for i in 0..field.ba.len() {
            let sb = field.ba.get(i);
            let base = field.range(i).start;
            for j in 0..spectral.nfabs() {
                let fab = spectral.fab(j);
                let isect = fab.valid_box().intersect(&sb.permuted(pos));
                if !isect.ok() {
                    continue;
                }
                for g in isect.iter() {
                    let s = g.permuted(order);
                    pool[base + sb.linear_index(s)] = *fab.get(g);
                }
            }
        }
    }
}

enum Stage {
    Y,
    Z,
}

#[allow(clippy::too_many_arguments)]
fn run_transpose(
    slot: &mut Option<CommMetaData>,
    src: &Field,
    src_pool: &[Complex64],
    dst: &Field,
    dst_pool: &mut [Complex64],
    perm: Permutation,
    dst_subdomain: IndexBox,
    op: &str,
    stage: &'static str,
    forward: bool,
) {
    let cmd = slot.get_or_insert_with(|| CommMetaData::build(src, dst, perm, dst_subdomain));
    let t = Instant::now();
    cmd.execute(src, src_pool, dst, dst_pool);
    record_stage(op, stage, forward, dst.ba.len(), cmd.points(), t);
}

pub(crate) fn record_stage(op: &str, stage: &'static str, forward: bool, boxes: usize, points: u64, t: Instant) {
    trace::record(StageTrace {
        operation_id: op.to_owned(),
        stage,
        direction: if forward { "forward" } else { "backward" },
        boxes,
        points,
        timing_ns: t.elapsed().as_nanos(),
    });
}
