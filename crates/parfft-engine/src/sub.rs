//! Degenerate-axis reduction.
//!
//! A domain with an interior length-1 axis (for example `(1, ny, nz)`) cannot
//! feed the stage pipeline directly: the unit-stride transform would run over
//! a single cell. The helper computes the squeeze permutation that moves
//! every length-1 axis behind the non-degenerate ones, preserving their
//! relative order, and translates boxes, ghost widths, periodicity, and
//! storage orders between the two labelings. The engine then nests a second
//! instance over the squeezed domain and forwards every operation to it.
//!
//! A squeezed domain is canonical (no interior degenerate axis), so the
//! nesting never goes deeper than one level.

use parfft_grid::{BoxArray, Fab, FabArray, IndexBox, IntVect, Periodicity};

/// Axis translation between an outer domain and its squeezed form.
/// Squeezed axis `d` is outer axis `perm[d]`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SubHelper {
    perm: [usize; 3],
    iperm: [usize; 3],
    outer_domain: IndexBox,
}

impl SubHelper {
    /// `None` when the squeeze is the identity (already canonical).
    pub(crate) fn try_new(domain: IndexBox) -> Option<SubHelper> {
        let mut perm = [0usize; 3];
        let mut n = 0;
        for d in 0..3 {
            if domain.length(d) > 1 {
                perm[n] = d;
                n += 1;
            }
        }
        for d in 0..3 {
            if domain.length(d) <= 1 {
                perm[n] = d;
                n += 1;
            }
        }
        if perm == [0, 1, 2] {
            return None;
        }
        let mut iperm = [0usize; 3];
        for d in 0..3 {
            iperm[perm[d]] = d;
        }
        Some(SubHelper {
            perm,
            iperm,
            outer_domain: domain,
        })
    }

    pub(crate) fn squeeze_box(&self, b: IndexBox) -> IndexBox {
        b.permuted(self.perm)
    }

    pub(crate) fn squeeze_iv(&self, v: IntVect) -> IntVect {
        v.permuted(self.perm)
    }

    pub(crate) fn squeeze_boxarray(&self, ba: &BoxArray) -> BoxArray {
        ba.map(|b| b.permuted(self.perm))
    }

    pub(crate) fn squeeze_periodicity(&self, p: Periodicity) -> Periodicity {
        p.permuted(self.perm)
    }

    /// Translate a squeezed storage order to outer axis labels.
    pub(crate) fn expand_order(&self, order: [usize; 3]) -> [usize; 3] {
        [
            self.perm[order[0]],
            self.perm[order[1]],
            self.perm[order[2]],
        ]
    }

    /// Translate a squeezed index triple to the outer labeling.
    pub(crate) fn expand_point(&self, p: IntVect) -> IntVect {
        p.permuted(self.iperm)
    }

    /// A fab's linear storage is identical in both labelings exactly when no
    /// squeezed (outer length-1) axis carries ghost cells: the storage-length
    /// sequences then differ only by trailing 1s.
    pub(crate) fn ghost_safe(&self, ngrow: IntVect) -> bool {
        (0..3).all(|d| self.outer_domain.length(d) > 1 || ngrow[d] == 0)
    }

    /// Squeezed copy of `outer`'s data. Ghost cells survive when the squeeze
    /// is layout-preserving; otherwise the copy drops to a zero-ghost
    /// container holding the valid regions.
    pub(crate) fn to_sub<T: Clone + Default>(&self, outer: &FabArray<T>) -> FabArray<T> {
        let ba = self.squeeze_boxarray(outer.boxarray());
        let dm = outer.dist_map().clone();
        if self.ghost_safe(outer.ngrow()) {
            let mut sub = FabArray::new(ba, dm, self.squeeze_iv(outer.ngrow()));
            for i in 0..sub.nfabs() {
                sub.fab_mut(i)
                    .data_mut()
                    .clone_from_slice(outer.fab(i).data());
            }
            sub
        } else {
            let mut sub = FabArray::new(ba, dm, IntVect::zero());
            for i in 0..sub.nfabs() {
                self.gather_valid(outer.fab(i), sub.fab_mut(i));
            }
            sub
        }
    }

    /// Write a squeezed container's data back into `outer`.
    pub(crate) fn from_sub<T: Clone + Default>(&self, outer: &mut FabArray<T>, sub: &FabArray<T>) {
        assert_eq!(outer.nfabs(), sub.nfabs());
        if self.ghost_safe(outer.ngrow()) && sub.ngrow() == self.squeeze_iv(outer.ngrow()) {
            for i in 0..outer.nfabs() {
                outer
                    .fab_mut(i)
                    .data_mut()
                    .clone_from_slice(sub.fab(i).data());
            }
        } else {
            for i in 0..outer.nfabs() {
                self.scatter_valid(sub.fab(i), outer.fab_mut(i));
            }
        }
    }

    fn gather_valid<T: Clone + Default>(&self, outer: &Fab<T>, sub: &mut Fab<T>) {
        for p in outer.valid_box().iter() {
            *sub.get_mut(self.squeeze_iv(p)) = outer.get(p).clone();
        }
    }

    fn scatter_valid<T: Clone + Default>(&self, sub: &Fab<T>, outer: &mut Fab<T>) {
        for p in outer.valid_box().iter() {
            *outer.get_mut(p) = sub.get(self.squeeze_iv(p)).clone();
        }
    }
}
