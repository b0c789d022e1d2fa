//! Stage decomposition.
//!
//! Given the real domain, the process group, and the caller's options, decide
//! once which transform stages exist and how each stage's domain tiles across
//! ranks. Everything downstream (buffer layout, plans, transposes) is driven
//! off the [`DecompOutcome`] chosen here.
//!
//! Stage domains and their storage orders:
//! * real / x stage: `(nx, ny, nz)`, axes `(x, y, z)`, x unit stride
//! * y stage: `(ny, nx/2+1, nz)`, axes `(y, x, z)`, y unit stride
//! * z stage: `(nz, nx/2+1, ny)`, axes `(z, x, y)`, z unit stride
//!
//! The x axis is never split. The slab strategy keeps whole `(x, y)` planes
//! local and splits only z; the pencil strategy splits both y and z.

use parfft_grid::{decompose, BoxArray, IndexBox, ProcGroup};

use crate::{ConfigError, DomainStrategy, Info};

/// Which transform stages run, decided once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecompOutcome {
    /// Single process, no batch: one local all-axes transform.
    AllDim,
    /// Only the x stage runs. Covers 1-D domains, 2-D batch (y is the batch
    /// axis), flat non-batch slab (the plan absorbs y locally), and 3-D slab
    /// batch.
    XOnly,
    /// x and y stages. Covers 2-D domains and 3-D pencil batch.
    XY,
    /// x+y absorbed into per-plane slab plans, then the z stage.
    XYZSlab,
    /// All three stages as separate line passes.
    XYZPencil,
}

/// The frozen decomposition: stage domains and per-stage tilings.
pub(crate) struct Decomp {
    /// Ranks that actually own boxes; `min(group, requested)`.
    pub(crate) nprocs: usize,
    pub(crate) outcome: DecompOutcome,
    /// The r2c stage plan also covers the y axis.
    pub(crate) slab: bool,
    pub(crate) real_domain: IndexBox,
    pub(crate) sd_x: IndexBox,
    pub(crate) sd_y: IndexBox,
    pub(crate) sd_z: IndexBox,
    pub(crate) rx: BoxArray,
    pub(crate) cx: BoxArray,
    pub(crate) cy: Option<BoxArray>,
    pub(crate) cz: Option<BoxArray>,
}

impl Decomp {
    pub(crate) fn new(domain: IndexBox, info: &Info, group: ProcGroup) -> Result<Self, ConfigError> {
        if domain.num_pts() <= 1 {
            return Err(ConfigError::DegenerateDomain(domain));
        }
        if info.nprocs == Some(0) {
            return Err(ConfigError::ZeroRankCap);
        }
        let (nx, ny, nz) = (domain.length(0), domain.length(1), domain.length(2));
        if info.batch_mode && i32::from(nx > 1) + i32::from(ny > 1) + i32::from(nz > 1) < 2 {
            return Err(ConfigError::BatchModeNeedsTwoAxes(domain));
        }

        let nprocs = group.nprocs().min(info.nprocs.unwrap_or(group.nprocs()));
        let nxc = nx / 2 + 1;
        let sd_x = IndexBox::from_lengths(nxc, ny, nz);
        let sd_y = IndexBox::from_lengths(ny, nxc, nz);
        let sd_z = IndexBox::from_lengths(nz, nxc, ny);

        // The slab plan absorbs the y axis locally. A batched trailing y axis
        // is never transformed, so a 2-D-effective batch run keeps plain x
        // lines instead.
        let slab =
            info.strategy == DomainStrategy::Slab && ny > 1 && !(info.batch_mode && nz == 1);

        let outcome = if nprocs == 1 && !info.batch_mode {
            DecompOutcome::AllDim
        } else if ny == 1 && nz == 1 {
            DecompOutcome::XOnly
        } else if info.batch_mode && nz == 1 {
            // y is the batch axis.
            DecompOutcome::XOnly
        } else if nz == 1 {
            // A flat slab has nothing to split; the whole transform is local.
            if slab {
                DecompOutcome::XOnly
            } else {
                DecompOutcome::XY
            }
        } else if info.batch_mode {
            // z is the batch axis; slab plans already cover y locally.
            if slab {
                DecompOutcome::XOnly
            } else {
                DecompOutcome::XY
            }
        } else if slab {
            DecompOutcome::XYZSlab
        } else {
            DecompOutcome::XYZPencil
        };

        let rx_split = if outcome == DecompOutcome::AllDim {
            [false, false, false]
        } else if slab {
            [false, false, true]
        } else {
            [false, true, true]
        };
        let rx = decompose(domain, nprocs, rx_split);
        // x is never split, so the truncated tiling is the real tiling with
        // the x extent clipped.
        let cx = rx.map(|b| b.with_big(0, nxc - 1));

        let cy = matches!(outcome, DecompOutcome::XY | DecompOutcome::XYZPencil)
            .then(|| decompose(sd_y, nprocs, [false, true, true]));
        let cz = matches!(outcome, DecompOutcome::XYZSlab | DecompOutcome::XYZPencil)
            .then(|| decompose(sd_z, nprocs, [false, true, true]));

        Ok(Decomp {
            nprocs,
            outcome,
            slab,
            real_domain: domain,
            sd_x,
            sd_y,
            sd_z,
            rx,
            cx,
            cy,
            cz,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Decomp, DecompOutcome};
    use crate::{ConfigError, DomainStrategy, Info};
    use parfft_grid::{IndexBox, ProcGroup};

    fn mk(domain: IndexBox, info: &Info, nprocs: usize) -> Decomp {
        Decomp::new(domain, info, ProcGroup::new(nprocs)).unwrap()
    }

    #[test]
    fn single_process_takes_the_local_fast_path() {
        let d = mk(IndexBox::from_lengths(8, 8, 8), &Info::default(), 1);
        assert_eq!(d.outcome, DecompOutcome::AllDim);
        assert_eq!(d.rx.len(), 1);
        assert!(d.cy.is_none() && d.cz.is_none());
    }

    #[test]
    fn pencil_runs_all_three_stages() {
        let info = Info::default().with_strategy(DomainStrategy::Pencil);
        let d = mk(IndexBox::from_lengths(8, 8, 8), &info, 4);
        assert_eq!(d.outcome, DecompOutcome::XYZPencil);
        assert!(!d.slab);
        assert!(d.cy.is_some() && d.cz.is_some());
        // x never split.
        for b in d.rx.iter() {
            assert_eq!(b.length(0), 8);
        }
        for b in d.cx.iter() {
            assert_eq!(b.length(0), 5);
        }
    }

    #[test]
    fn slab_splits_only_z_and_skips_the_y_stage() {
        let info = Info::default().with_strategy(DomainStrategy::Slab);
        let d = mk(IndexBox::from_lengths(8, 8, 8), &info, 4);
        assert_eq!(d.outcome, DecompOutcome::XYZSlab);
        assert!(d.slab);
        assert!(d.cy.is_none());
        for b in d.rx.iter() {
            assert_eq!(b.length(0), 8);
            assert_eq!(b.length(1), 8);
        }
    }

    #[test]
    fn flat_domain_keeps_the_slab_plan_local() {
        let info = Info::default().with_strategy(DomainStrategy::Slab);
        let d = mk(IndexBox::from_lengths(8, 8, 1), &info, 4);
        assert_eq!(d.outcome, DecompOutcome::XOnly);
        assert!(d.slab);
        // Nothing to split; the slab plan covers y on one rank.
        assert_eq!(d.rx.len(), 1);
        assert!(d.cy.is_none() && d.cz.is_none());
    }

    #[test]
    fn flat_domain_under_pencil_splits_across_y() {
        let info = Info::default().with_strategy(DomainStrategy::Pencil);
        let d = mk(IndexBox::from_lengths(8, 8, 1), &info, 4);
        assert_eq!(d.outcome, DecompOutcome::XY);
        assert!(!d.slab);
        assert!(d.rx.len() > 1);
    }

    #[test]
    fn zero_rank_cap_is_rejected() {
        let info = Info::default().with_nprocs(0);
        let err = Decomp::new(IndexBox::from_lengths(8, 8, 8), &info, ProcGroup::new(4));
        assert!(matches!(err, Err(ConfigError::ZeroRankCap)));
    }

    #[test]
    fn slab_batch_needs_no_transpose() {
        let info = Info::default()
            .with_strategy(DomainStrategy::Slab)
            .with_batch_mode(true);
        let d = mk(IndexBox::from_lengths(8, 8, 8), &info, 4);
        assert_eq!(d.outcome, DecompOutcome::XOnly);
        assert!(d.slab);
        assert!(d.cy.is_none() && d.cz.is_none());
    }

    #[test]
    fn pencil_batch_stops_after_y() {
        let info = Info::default()
            .with_strategy(DomainStrategy::Pencil)
            .with_batch_mode(true);
        let d = mk(IndexBox::from_lengths(8, 8, 8), &info, 4);
        assert_eq!(d.outcome, DecompOutcome::XY);
        assert!(d.cz.is_none());
    }

    #[test]
    fn batch_mode_rejects_a_single_long_axis() {
        let info = Info::default().with_batch_mode(true);
        let err = Decomp::new(IndexBox::from_lengths(64, 1, 1), &info, ProcGroup::new(2));
        assert!(err.is_err());
    }

    #[test]
    fn requested_rank_cap_is_honored() {
        let info = Info::default().with_nprocs(2);
        let d = mk(IndexBox::from_lengths(8, 8, 8), &info, 8);
        assert_eq!(d.nprocs, 2);
        assert!(d.rx.len() <= 2);
    }

    #[test]
    fn oversubscribed_group_leaves_ranks_idle() {
        let d = mk(IndexBox::from_lengths(4, 2, 2), &Info::default(), 64);
        assert!(d.rx.len() <= 4);
    }
}
