//! Global transposes between stage layouts.
//!
//! A transpose is an axis permutation of the global index space plus a
//! redistribution of ownership. The schedule ([`CommMetaData`]) is built once
//! per transition from the box intersections of the two tilings and then
//! replayed for every transform; with a virtual process group the replay is a
//! deterministic sequence of pack/unpack copies on the control thread.
//!
//! Schedules are built lazily: a direction that is never exercised (for
//! example the backward path of a forward-only engine) never pays for its
//! metadata.

use parfft_grid::{IndexBox, IntVect};

use crate::alias::Field;
use crate::backend::Complex64;

/// Axis permutation of the global index space, as `out[d] = in[arr[d]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Permutation {
    /// x stage -> y stage (and back): swap axes 0 and 1.
    Swap01,
    /// y stage -> z stage (and back): swap axes 0 and 2.
    Swap02,
    /// x stage -> z stage: `(x, y, z)` to `(z, x, y)`.
    RotateFwd,
    /// z stage -> x stage: inverse of [`Permutation::RotateFwd`].
    RotateBwd,
}

impl Permutation {
    pub(crate) fn arr(self) -> [usize; 3] {
        match self {
            Permutation::Swap01 => [1, 0, 2],
            Permutation::Swap02 => [2, 1, 0],
            Permutation::RotateFwd => [2, 0, 1],
            Permutation::RotateBwd => [1, 2, 0],
        }
    }

    pub(crate) fn inverse(self) -> Permutation {
        match self {
            Permutation::Swap01 => Permutation::Swap01,
            Permutation::Swap02 => Permutation::Swap02,
            Permutation::RotateFwd => Permutation::RotateBwd,
            Permutation::RotateBwd => Permutation::RotateFwd,
        }
    }

}

/// One contiguous-in-index-space copy of a transpose schedule. `sbox` is in
/// the source index space; destination cells follow from the permutation.
#[derive(Debug, Clone)]
struct CopyItem {
    src_fab: usize,
    dst_fab: usize,
    src_rank: usize,
    dst_rank: usize,
    sbox: IndexBox,
}

/// The frozen schedule for one layout transition.
pub(crate) struct CommMetaData {
    perm: Permutation,
    items: Vec<CopyItem>,
}

/// Packed source data awaiting [`CommMetaData::unpack`]. Splitting the two
/// halves lets the caller overwrite destination regions (the open-boundary
/// zero fill) while the packed data is in flight.
pub(crate) struct Packed {
    buffers: Vec<Vec<Complex64>>,
}

impl CommMetaData {
    /// Build the schedule moving `src` onto `dst` under `perm`, restricted to
    /// destination cells inside `dst_subdomain`.
    pub(crate) fn build(
        src: &Field,
        dst: &Field,
        perm: Permutation,
        dst_subdomain: IndexBox,
    ) -> CommMetaData {
        let inv = perm.inverse().arr();
        let mut items = Vec::new();
        for dj in 0..dst.ba.len() {
            let wanted = dst.ba.get(dj).intersect(&dst_subdomain);
            if !wanted.ok() {
                continue;
            }
            let wanted_src = wanted.permuted(inv);
            for si in 0..src.ba.len() {
                let sbox = wanted_src.intersect(&src.ba.get(si));
                if sbox.ok() {
                    items.push(CopyItem {
                        src_fab: si,
                        dst_fab: dj,
                        src_rank: src.dm.owner(si),
                        dst_rank: dst.dm.owner(dj),
                        sbox,
                    });
                }
            }
        }
        // Deterministic exchange order regardless of tiling order.
        items.sort_by_key(|it| (it.dst_rank, it.src_rank, it.dst_fab, it.src_fab));
        CommMetaData { perm, items }
    }

    pub(crate) fn execute(&self, src: &Field, src_pool: &[Complex64], dst: &Field, dst_pool: &mut [Complex64]) {
        let packed = self.pack(src, src_pool);
        self.unpack(&packed, dst, dst_pool);
    }

    /// Gather every item's source region into per-item buffers, in the
    /// source's Fortran order.
    pub(crate) fn pack(&self, src: &Field, src_pool: &[Complex64]) -> Packed {
        let mut buffers = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let storage = src.ba.get(item.src_fab);
            let slice = &src_pool[src.range(item.src_fab)];
            let mut buf = Vec::with_capacity(item.sbox.num_pts() as usize);
            buf.extend(item.sbox.iter().map(|s| slice[storage.linear_index(s)]));
            buffers.push(buf);
        }
        Packed { buffers }
    }

    /// Scatter packed buffers into the destination, applying the permutation.
    pub(crate) fn unpack(&self, packed: &Packed, dst: &Field, dst_pool: &mut [Complex64]) {
        let arr = self.perm.arr();
        for (item, buf) in self.items.iter().zip(&packed.buffers) {
            let storage = dst.ba.get(item.dst_fab);
            let range = dst.range(item.dst_fab);
            let slice = &mut dst_pool[range];
            for (s, &v) in item.sbox.iter().zip(buf) {
                slice[storage.linear_index(s.permuted(arr))] = v;
            }
        }
    }

    /// Total cells moved; feeds the stage trace.
    pub(crate) fn points(&self) -> u64 {
        self.items.iter().map(|it| it.sbox.num_pts()).sum()
    }
}

/// Lazily built schedules for every transition an engine can take. Slots for
/// transitions the decomposition never uses stay `None` forever.
#[derive(Default)]
pub(crate) struct TransposeCache {
    pub(crate) x2y: Option<CommMetaData>,
    pub(crate) y2x: Option<CommMetaData>,
    pub(crate) y2z: Option<CommMetaData>,
    pub(crate) z2y: Option<CommMetaData>,
    pub(crate) x2z: Option<CommMetaData>,
    pub(crate) z2x: Option<CommMetaData>,
    /// Half-domain variants restricted to the lower spectral half.
    pub(crate) x2z_half: Option<CommMetaData>,
    pub(crate) z2x_half: Option<CommMetaData>,
}
