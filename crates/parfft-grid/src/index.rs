//! Integer index vectors and axis-aligned integer boxes.

use serde::{Deserialize, Serialize};

/// A point in the 3-D integer index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IntVect(pub [i32; 3]);

impl IntVect {
    #[must_use]
    pub const fn new(i: i32, j: i32, k: i32) -> Self {
        Self([i, j, k])
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self([0, 0, 0])
    }

    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self([
            self.0[0].min(other.0[0]),
            self.0[1].min(other.0[1]),
            self.0[2].min(other.0[2]),
        ])
    }

    /// Reorder components so that `out[d] = self[perm[d]]`.
    #[must_use]
    pub fn permuted(self, perm: [usize; 3]) -> Self {
        Self([self.0[perm[0]], self.0[perm[1]], self.0[perm[2]]])
    }
}

impl std::ops::Index<usize> for IntVect {
    type Output = i32;
    fn index(&self, d: usize) -> &i32 {
        &self.0[d]
    }
}

impl std::ops::IndexMut<usize> for IntVect {
    fn index_mut(&mut self, d: usize) -> &mut i32 {
        &mut self.0[d]
    }
}

impl std::ops::Add for IntVect {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self([
            self.0[0] + rhs.0[0],
            self.0[1] + rhs.0[1],
            self.0[2] + rhs.0[2],
        ])
    }
}

impl std::ops::Sub for IntVect {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self([
            self.0[0] - rhs.0[0],
            self.0[1] - rhs.0[1],
            self.0[2] - rhs.0[2],
        ])
    }
}

/// Centering tag carried by a box. The transform engine only ever works with
/// cell-centered boxes; the tag exists so layouts with mixed centerings fail
/// equality checks loudly instead of silently misaligning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexType {
    #[default]
    Cell,
    Node,
}

/// An immutable axis-aligned integer box with inclusive bounds.
///
/// A box with any `hi < lo` component is empty; [`IndexBox::empty`] is the
/// canonical empty value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexBox {
    lo: IntVect,
    hi: IntVect,
    tag: IndexType,
}

impl IndexBox {
    #[must_use]
    pub const fn new(lo: IntVect, hi: IntVect) -> Self {
        Self {
            lo,
            hi,
            tag: IndexType::Cell,
        }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self::new(IntVect::new(0, 0, 0), IntVect::new(-1, -1, -1))
    }

    /// Box spanning `[0, n-1]` along each axis.
    #[must_use]
    pub fn from_lengths(nx: i32, ny: i32, nz: i32) -> Self {
        Self::new(IntVect::zero(), IntVect::new(nx - 1, ny - 1, nz - 1))
    }

    #[must_use]
    pub const fn lo(&self) -> IntVect {
        self.lo
    }

    #[must_use]
    pub const fn hi(&self) -> IntVect {
        self.hi
    }

    #[must_use]
    pub const fn tag(&self) -> IndexType {
        self.tag
    }

    #[must_use]
    pub fn ok(&self) -> bool {
        self.hi[0] >= self.lo[0] && self.hi[1] >= self.lo[1] && self.hi[2] >= self.lo[2]
    }

    #[must_use]
    pub fn length(&self, d: usize) -> i32 {
        (self.hi[d] - self.lo[d] + 1).max(0)
    }

    #[must_use]
    pub fn lengths(&self) -> IntVect {
        IntVect::new(self.length(0), self.length(1), self.length(2))
    }

    #[must_use]
    pub fn num_pts(&self) -> u64 {
        if !self.ok() {
            return 0;
        }
        self.length(0) as u64 * self.length(1) as u64 * self.length(2) as u64
    }

    #[must_use]
    pub fn contains(&self, p: IntVect) -> bool {
        (0..3).all(|d| p[d] >= self.lo[d] && p[d] <= self.hi[d])
    }

    #[must_use]
    pub fn intersect(&self, other: &IndexBox) -> IndexBox {
        let lo = IntVect::new(
            self.lo[0].max(other.lo[0]),
            self.lo[1].max(other.lo[1]),
            self.lo[2].max(other.lo[2]),
        );
        let hi = IntVect::new(
            self.hi[0].min(other.hi[0]),
            self.hi[1].min(other.hi[1]),
            self.hi[2].min(other.hi[2]),
        );
        IndexBox::new(lo, hi)
    }

    #[must_use]
    pub fn shifted(&self, by: IntVect) -> IndexBox {
        IndexBox::new(self.lo + by, self.hi + by)
    }

    /// Move the high side of axis `d` by `n` (negative shrinks).
    #[must_use]
    pub fn grown_hi(&self, d: usize, n: i32) -> IndexBox {
        let mut hi = self.hi;
        hi[d] += n;
        IndexBox::new(self.lo, hi)
    }

    /// Move the low side of axis `d` by `n` (negative shrinks).
    #[must_use]
    pub fn grown_lo(&self, d: usize, n: i32) -> IndexBox {
        let mut lo = self.lo;
        lo[d] -= n;
        IndexBox::new(lo, self.hi)
    }

    /// Grow both sides of every axis by the per-axis widths in `ng`.
    #[must_use]
    pub fn grown(&self, ng: IntVect) -> IndexBox {
        IndexBox::new(self.lo - ng, self.hi + ng)
    }

    #[must_use]
    pub fn with_big(&self, d: usize, v: i32) -> IndexBox {
        let mut hi = self.hi;
        hi[d] = v;
        IndexBox::new(self.lo, hi)
    }

    /// Reorder axes so that `out` axis `d` is `self` axis `perm[d]`.
    #[must_use]
    pub fn permuted(&self, perm: [usize; 3]) -> IndexBox {
        IndexBox::new(self.lo.permuted(perm), self.hi.permuted(perm))
    }

    /// Fortran-order linear offset of `p` relative to this box's low corner.
    /// Axis 0 is unit stride.
    #[must_use]
    pub fn linear_index(&self, p: IntVect) -> usize {
        debug_assert!(self.contains(p));
        let n0 = self.length(0) as usize;
        let n1 = self.length(1) as usize;
        let i = (p[0] - self.lo[0]) as usize;
        let j = (p[1] - self.lo[1]) as usize;
        let k = (p[2] - self.lo[2]) as usize;
        i + n0 * (j + n1 * k)
    }

    /// Iterate all cells in Fortran order (axis 0 fastest).
    pub fn iter(&self) -> impl Iterator<Item = IntVect> + '_ {
        let (lo, hi) = (self.lo, self.hi);
        (lo[2]..=hi[2]).flat_map(move |k| {
            (lo[1]..=hi[1])
                .flat_map(move |j| (lo[0]..=hi[0]).map(move |i| IntVect::new(i, j, k)))
        })
    }
}

/// Periodic wraparound lengths used during redistribution; a zero component
/// means the axis is not periodic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Periodicity {
    period: IntVect,
}

impl Periodicity {
    #[must_use]
    pub const fn non_periodic() -> Self {
        Self {
            period: IntVect::zero(),
        }
    }

    #[must_use]
    pub const fn new(period: IntVect) -> Self {
        Self { period }
    }

    #[must_use]
    pub fn is_periodic(&self, d: usize) -> bool {
        self.period[d] != 0
    }

    #[must_use]
    pub fn period(&self) -> IntVect {
        self.period
    }

    /// All shift vectors (including zero) under which a source region may be
    /// imaged when filling a destination. Non-periodic axes contribute only
    /// the zero shift.
    #[must_use]
    pub fn shifts(&self) -> Vec<IntVect> {
        let choices = |d: usize| -> Vec<i32> {
            if self.is_periodic(d) {
                vec![-self.period[d], 0, self.period[d]]
            } else {
                vec![0]
            }
        };
        let mut out = Vec::new();
        for k in choices(2) {
            for j in choices(1) {
                for i in choices(0) {
                    out.push(IntVect::new(i, j, k));
                }
            }
        }
        out
    }

    /// Reorder the period vector alongside an axis permutation.
    #[must_use]
    pub fn permuted(&self, perm: [usize; 3]) -> Self {
        Self {
            period: self.period.permuted(perm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IndexBox, IntVect, Periodicity};

    #[test]
    fn intersect_of_disjoint_boxes_is_empty() {
        let a = IndexBox::from_lengths(4, 4, 4);
        let b = a.shifted(IntVect::new(8, 0, 0));
        assert!(!a.intersect(&b).ok());
    }

    #[test]
    fn linear_index_is_fortran_order() {
        let b = IndexBox::new(IntVect::new(1, 2, 3), IntVect::new(4, 5, 6));
        assert_eq!(b.linear_index(b.lo()), 0);
        assert_eq!(b.linear_index(IntVect::new(2, 2, 3)), 1);
        assert_eq!(b.linear_index(IntVect::new(1, 3, 3)), 4);
        assert_eq!(b.linear_index(IntVect::new(1, 2, 4)), 16);
        assert_eq!(b.linear_index(b.hi()) as u64, b.num_pts() - 1);
    }

    #[test]
    fn grown_hi_shrinks_with_negative_width() {
        let b = IndexBox::from_lengths(8, 8, 8);
        let half = b.grown_hi(2, -4);
        assert_eq!(half.length(2), 4);
        assert_eq!(half.length(0), 8);
    }

    #[test]
    fn permuted_box_round_trips_through_inverse() {
        let b = IndexBox::new(IntVect::new(0, 1, 2), IntVect::new(3, 5, 7));
        let p = b.permuted([2, 0, 1]);
        assert_eq!(p.lengths(), IntVect::new(6, 4, 5));
        assert_eq!(p.permuted([1, 2, 0]), b);
    }

    #[test]
    fn non_periodic_has_single_zero_shift() {
        assert_eq!(Periodicity::non_periodic().shifts(), vec![IntVect::zero()]);
        let p = Periodicity::new(IntVect::new(0, 0, 8));
        assert_eq!(p.shifts().len(), 3);
    }

    #[test]
    fn iter_visits_every_cell_once_in_order() {
        let b = IndexBox::from_lengths(2, 2, 2);
        let cells: Vec<_> = b.iter().collect();
        assert_eq!(cells.len(), 8);
        assert_eq!(cells[0], IntVect::new(0, 0, 0));
        assert_eq!(cells[1], IntVect::new(1, 0, 0));
        assert_eq!(cells[2], IntVect::new(0, 1, 0));
        assert_eq!(cells[7], IntVect::new(1, 1, 1));
    }
}
