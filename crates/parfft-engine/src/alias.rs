//! Stage buffer layout.
//!
//! Every transpose stage reads one pool and writes another, so stages whose
//! lifetimes never overlap can share an allocation. The real input stage gets
//! its own pool (element type differs); the complex stages split across two
//! pools such that no transition has source and destination in the same pool.
//! A [`Field`] is a descriptor over a pool: a box array, an owner map, and
//! per-box offsets. All boxes of all ranks are resident in the pool, in box
//! order.

use std::ops::Range;

use parfft_grid::{BoxArray, DistributionMapping};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolId {
    Real,
    A,
    B,
}

/// A distributed stage variable laid out inside one pool.
pub(crate) struct Field {
    pub(crate) ba: BoxArray,
    pub(crate) dm: DistributionMapping,
    pub(crate) pool: PoolId,
    offsets: Vec<usize>,
    total: usize,
}

impl Field {
    pub(crate) fn new(ba: BoxArray, dm: DistributionMapping, pool: PoolId) -> Self {
        assert_eq!(ba.len(), dm.len());
        let mut offsets = Vec::with_capacity(ba.len());
        let mut total = 0usize;
        for b in ba.iter() {
            offsets.push(total);
            total += b.num_pts() as usize;
        }
        Field {
            ba,
            dm,
            pool,
            offsets,
            total,
        }
    }

    /// Pool range holding box `i`.
    pub(crate) fn range(&self, i: usize) -> Range<usize> {
        self.offsets[i]..self.offsets[i] + self.ba.get(i).num_pts() as usize
    }

    /// Pool length this field requires.
    pub(crate) fn total(&self) -> usize {
        self.total
    }
}

/// Required length of `pool` across the fields laid out in it.
pub(crate) fn pool_len<'a>(fields: impl IntoIterator<Item = &'a Field>, pool: PoolId) -> usize {
    fields
        .into_iter()
        .filter(|f| f.pool == pool)
        .map(Field::total)
        .max()
        .unwrap_or(0)
}
