//! Ordered tilings of a domain and the covering-box decomposition utility.

use crate::index::{IndexBox, IntVect};

/// An ordered collection of non-overlapping boxes tiling (part of) a domain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoxArray {
    boxes: Vec<IndexBox>,
}

impl BoxArray {
    #[must_use]
    pub fn new(boxes: Vec<IndexBox>) -> Self {
        Self { boxes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    #[must_use]
    pub fn get(&self, i: usize) -> IndexBox {
        self.boxes[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexBox> {
        self.boxes.iter()
    }

    #[must_use]
    pub fn total_pts(&self) -> u64 {
        self.boxes.iter().map(IndexBox::num_pts).sum()
    }

    /// Apply `f` to every box, producing a new array of the same length.
    #[must_use]
    pub fn map(&self, f: impl Fn(IndexBox) -> IndexBox) -> BoxArray {
        BoxArray::new(self.boxes.iter().copied().map(f).collect())
    }
}

/// Split `len` cells into `n` contiguous chunks, earlier chunks one longer
/// when the division is uneven. Returns per-chunk `(offset, len)`.
fn chunk_axis(len: i32, n: i32) -> Vec<(i32, i32)> {
    let base = len / n;
    let rem = len % n;
    let mut out = Vec::with_capacity(n as usize);
    let mut off = 0;
    for c in 0..n {
        let take = base + i32::from(c < rem);
        out.push((off, take));
        off += take;
    }
    out
}

/// Partition `domain` into at most `nboxes` covering boxes, splitting only
/// along axes flagged in `splittable`. Axes of length 1 never split. The
/// result never contains an empty box and its union is exactly `domain`.
///
/// With more than one splittable axis the split counts are the factorization
/// of the largest achievable box count with the smallest spread between axis
/// counts, so pencils and blocks stay roughly square.
#[must_use]
pub fn decompose(domain: IndexBox, nboxes: usize, splittable: [bool; 3]) -> BoxArray {
    assert!(domain.ok(), "decompose: empty domain");
    assert!(nboxes >= 1, "decompose: nboxes must be at least 1");
    let axes: Vec<usize> = (0..3)
        .filter(|&d| splittable[d] && domain.length(d) > 1)
        .collect();
    let nmax = nboxes as i32;

    let counts: [i32; 3] = match axes.as_slice() {
        [] => [1, 1, 1],
        [d] => {
            let mut c = [1, 1, 1];
            c[*d] = nmax.min(domain.length(*d));
            c
        }
        [d0, d1] => {
            let (l0, l1) = (domain.length(*d0), domain.length(*d1));
            let mut best = (1, 1);
            for c0 in 1..=l0.min(nmax) {
                let c1 = (nmax / c0).min(l1);
                let better = c0 * c1 > best.0 * best.1
                    || (c0 * c1 == best.0 * best.1
                        && (c0 - c1).abs() < (best.0 - best.1).abs());
                if better {
                    best = (c0, c1);
                }
            }
            let mut c = [1, 1, 1];
            c[*d0] = best.0;
            c[*d1] = best.1;
            c
        }
        [d0, d1, d2] => {
            let (l0, l1, l2) = (
                domain.length(*d0),
                domain.length(*d1),
                domain.length(*d2),
            );
            let spread = |a: i32, b: i32, c: i32| a.max(b).max(c) - a.min(b).min(c);
            let mut best = (1, 1, 1);
            for c0 in 1..=l0.min(nmax) {
                for c1 in 1..=l1.min(nmax / c0) {
                    let c2 = (nmax / (c0 * c1)).min(l2);
                    let better = c0 * c1 * c2 > best.0 * best.1 * best.2
                        || (c0 * c1 * c2 == best.0 * best.1 * best.2
                            && spread(c0, c1, c2) < spread(best.0, best.1, best.2));
                    if better {
                        best = (c0, c1, c2);
                    }
                }
            }
            let mut c = [1, 1, 1];
            c[*d0] = best.0;
            c[*d1] = best.1;
            c[*d2] = best.2;
            c
        }
        _ => unreachable!("at most three axes exist"),
    };

    let chunks: Vec<Vec<(i32, i32)>> = (0..3)
        .map(|d| chunk_axis(domain.length(d), counts[d]))
        .collect();

    let mut boxes = Vec::with_capacity((counts[0] * counts[1] * counts[2]) as usize);
    for &(oz, lz) in &chunks[2] {
        for &(oy, ly) in &chunks[1] {
            for &(ox, lx) in &chunks[0] {
                let lo = domain.lo() + IntVect::new(ox, oy, oz);
                let hi = lo + IntVect::new(lx - 1, ly - 1, lz - 1);
                boxes.push(IndexBox::new(lo, hi));
            }
        }
    }
    BoxArray::new(boxes)
}
