//! Dense per-box buffers and their array-of-fabs container.

use crate::boxarray::BoxArray;
use crate::distribution::DistributionMapping;
use crate::index::{IndexBox, IntVect};

/// A dense single-component array over one (possibly ghost-grown) box,
/// Fortran order with axis 0 unit stride.
#[derive(Debug, Clone)]
pub struct Fab<T> {
    valid: IndexBox,
    grown: IndexBox,
    data: Vec<T>,
}

impl<T: Clone + Default> Fab<T> {
    #[must_use]
    pub fn new(valid: IndexBox, ngrow: IntVect) -> Self {
        let grown = valid.grown(ngrow);
        let n = grown.num_pts() as usize;
        Self {
            valid,
            grown,
            data: vec![T::default(); n],
        }
    }

    #[must_use]
    pub fn valid_box(&self) -> IndexBox {
        self.valid
    }

    #[must_use]
    pub fn grown_box(&self) -> IndexBox {
        self.grown
    }

    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[must_use]
    pub fn get(&self, p: IntVect) -> &T {
        &self.data[self.grown.linear_index(p)]
    }

    pub fn get_mut(&mut self, p: IntVect) -> &mut T {
        let idx = self.grown.linear_index(p);
        &mut self.data[idx]
    }

    /// Fill `region ∩ grown box` with `value`.
    pub fn set_val(&mut self, value: T, region: IndexBox) {
        let r = self.grown.intersect(&region);
        if !r.ok() {
            return;
        }
        for p in r.iter() {
            *self.get_mut(p) = value.clone();
        }
    }
}

/// An ordered collection of fabs, one per box of a [`BoxArray`], with the
/// owning rank of each box recorded in a [`DistributionMapping`].
///
/// All fabs are resident in this address space regardless of owner; the
/// mapping drives the communication schedule, not placement.
#[derive(Debug, Clone)]
pub struct FabArray<T> {
    ba: BoxArray,
    dm: DistributionMapping,
    ngrow: IntVect,
    fabs: Vec<Fab<T>>,
}

impl<T: Clone + Default> FabArray<T> {
    /// Build and zero-initialize one fab per box.
    ///
    /// Panics when the map length disagrees with the box array; the pair is
    /// meaningless otherwise.
    #[must_use]
    pub fn new(ba: BoxArray, dm: DistributionMapping, ngrow: IntVect) -> Self {
        assert_eq!(
            ba.len(),
            dm.len(),
            "box array and distribution map must have equal length"
        );
        let fabs = ba.iter().map(|&b| Fab::new(b, ngrow)).collect();
        Self { ba, dm, ngrow, fabs }
    }

    #[must_use]
    pub fn boxarray(&self) -> &BoxArray {
        &self.ba
    }

    #[must_use]
    pub fn dist_map(&self) -> &DistributionMapping {
        &self.dm
    }

    #[must_use]
    pub fn ngrow(&self) -> IntVect {
        self.ngrow
    }

    #[must_use]
    pub fn nfabs(&self) -> usize {
        self.fabs.len()
    }

    #[must_use]
    pub fn fab(&self, i: usize) -> &Fab<T> {
        &self.fabs[i]
    }

    pub fn fab_mut(&mut self, i: usize) -> &mut Fab<T> {
        &mut self.fabs[i]
    }

    pub fn set_val(&mut self, value: T) {
        for fab in &mut self.fabs {
            let region = fab.grown_box();
            fab.set_val(value.clone(), region);
        }
    }

    /// Same-rank copy from a container over the same box array, limited to
    /// `ng` ghost cells beyond each valid box.
    pub fn local_copy_from(&mut self, src: &FabArray<T>, ng: IntVect) {
        assert_eq!(self.nfabs(), src.nfabs(), "local copy needs matching tilings");
        let ng = ng.min(self.ngrow).min(src.ngrow);
        for (dst, s) in self.fabs.iter_mut().zip(&src.fabs) {
            let region = dst
                .valid
                .grown(ng)
                .intersect(&s.grown_box())
                .intersect(&dst.grown_box());
            if !region.ok() {
                continue;
            }
            for p in region.iter() {
                *dst.get_mut(p) = s.get(p).clone();
            }
        }
    }
}
