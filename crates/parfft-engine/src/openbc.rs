//! Hermitian half-domain optimization.
//!
//! Open-boundary convolution solves double the domain along z and place all
//! source support in the lower half. The upper half of the z-major spectral
//! input is then redundant: the restricted pipeline transforms and
//! communicates only the lower-half planes and zero-fills the rest of the
//! destination while the transfer is in flight. Only the slab decomposition
//! supports this; the pencil analogue is deliberately not provided.

use std::time::Instant;

use rayon::prelude::*;

use crate::decomp::DecompOutcome;
use crate::plan::{make_pair, Plan, PlanPair};
use crate::transpose::{CommMetaData, Permutation};
use crate::{record_stage, ConfigError, Complex64, Core};

impl Core {
    pub(crate) fn prepare_open_bc(&mut self) -> Result<(), ConfigError> {
        if self.outcome == DecompOutcome::AllDim {
            return Err(ConfigError::OpenBcUnsupported(
                "single-process all-dimension path",
            ));
        }
        if self.real_domain.length(2) == 1 {
            return Err(ConfigError::OpenBcUnsupported("non-3-D domain"));
        }
        if self.info.batch_mode {
            return Err(ConfigError::OpenBcUnsupported("batched transform"));
        }
        if self.outcome == DecompOutcome::XYZPencil {
            return Err(ConfigError::OpenBcUnsupported("pencil decomposition"));
        }
        debug_assert_eq!(self.outcome, DecompOutcome::XYZSlab);

        let lower = self
            .real_domain
            .grown_hi(2, -self.real_domain.length(2) / 2);
        let mut plans = Vec::with_capacity(self.rx.ba.len());
        for i in 0..self.rx.ba.len() {
            let b = self.rx.ba.get(i);
            let pb = b.intersect(&lower);
            if !pb.ok() {
                plans.push(PlanPair::Empty);
                continue;
            }
            let planes = (
                (pb.lo()[2] - b.lo()[2]) as usize,
                pb.length(2) as usize,
            );
            let nxc = self.nxc as usize;
            plans.push(make_pair(self.want_fwd, self.want_bwd, |dir| {
                Plan::r2c(&mut self.backend, b, nxc, true, Some(planes), dir)
            }));
        }
        self.plans_x_half = plans;
        self.openbc = true;
        Ok(())
    }

    /// Restricted x stage, then the x→z transfer overlapped with the
    /// upper-half zero fill of the destination.
    pub(crate) fn forward_half(&mut self, op: &str) {
        self.stage_fft_x(op, true);

        let Some(cz) = &self.cz else {
            unreachable!("half transfer without a z-stage buffer")
        };
        let nz = self.sd_z.length(0);
        let kept = self.sd_z.grown_hi(0, -(nz / 2));
        let cmd = self
            .cmds
            .x2z_half
            .get_or_insert_with(|| CommMetaData::build(&self.cx, cz, Permutation::RotateFwd, kept));

        let t = Instant::now();
        let packed = cmd.pack(&self.cx, &self.pool_b);
        // z lines are contiguous and never split; blank the redundant tail of
        // every lane while the packed data is notionally in flight.
        let lane = nz as usize;
        let lower = kept.length(0) as usize;
        let zt = Instant::now();
        self.pool_a
            .par_chunks_mut(lane)
            .for_each(|chunk| chunk[lower..].fill(Complex64::default()));
        let zeroed = (self.pool_a.len() / lane * (lane - lower)) as u64;
        record_stage(op, "zero-fill", true, cz.ba.len(), zeroed, zt);
        cmd.unpack(&packed, cz, &mut self.pool_a);
        record_stage(op, "transpose-x2z", true, cz.ba.len(), cmd.points(), t);
    }

    /// Restricted z→x transfer and x stage; only the lower-half planes of the
    /// real output carry the inverse transform.
    pub(crate) fn backward_half(&mut self, op: &str) {
        let Some(cz) = &self.cz else {
            unreachable!("half transfer without a z-stage buffer")
        };
        let nz = self.sd_z.length(0);
        let kept = self.sd_x.grown_hi(2, -(nz / 2));
        let cmd = self
            .cmds
            .z2x_half
            .get_or_insert_with(|| CommMetaData::build(cz, &self.cx, Permutation::RotateBwd, kept));
        let t = Instant::now();
        cmd.execute(cz, &self.pool_a, &self.cx, &mut self.pool_b);
        record_stage(op, "transpose-z2x", false, self.cx.ba.len(), cmd.points(), t);

        self.stage_fft_x(op, false);
    }
}
