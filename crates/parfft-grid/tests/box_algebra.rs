use proptest::prelude::*;

use parfft_grid::{decompose, IndexBox, IntVect};

fn arb_box() -> impl Strategy<Value = IndexBox> {
    (
        -8i32..8,
        -8i32..8,
        -8i32..8,
        1i32..9,
        1i32..9,
        1i32..9,
    )
        .prop_map(|(x, y, z, nx, ny, nz)| {
            IndexBox::new(
                IntVect::new(x, y, z),
                IntVect::new(x + nx - 1, y + ny - 1, z + nz - 1),
            )
        })
}

proptest! {
    #[test]
    fn intersection_is_commutative_and_contained(a in arb_box(), b in arb_box()) {
        let ab = a.intersect(&b);
        prop_assert_eq!(ab, b.intersect(&a));
        if ab.ok() {
            for p in ab.iter() {
                prop_assert!(a.contains(p) && b.contains(p));
            }
        }
    }

    #[test]
    fn linear_index_enumerates_cells_in_order(b in arb_box()) {
        for (n, p) in b.iter().enumerate() {
            prop_assert_eq!(b.linear_index(p), n);
        }
    }

    #[test]
    fn permutation_round_trips(b in arb_box(), perm in prop::sample::select(vec![
        [0usize, 1, 2], [1, 0, 2], [2, 1, 0], [0, 2, 1], [1, 2, 0], [2, 0, 1],
    ])) {
        let mut inv = [0usize; 3];
        for d in 0..3 {
            inv[perm[d]] = d;
        }
        prop_assert_eq!(b.permuted(perm).permuted(inv), b);
        prop_assert_eq!(b.permuted(perm).num_pts(), b.num_pts());
    }

    #[test]
    fn decompose_tiles_the_domain_exactly(
        nx in 1i32..16,
        ny in 1i32..16,
        nz in 1i32..16,
        nboxes in 1usize..9,
        split in prop::array::uniform3(any::<bool>()),
    ) {
        let domain = IndexBox::from_lengths(nx, ny, nz);
        let ba = decompose(domain, nboxes, split);
        prop_assert!(ba.len() <= nboxes.max(1));
        prop_assert_eq!(ba.total_pts(), domain.num_pts());
        for b in ba.iter() {
            prop_assert!(b.ok());
            // Never splits a forbidden axis.
            for d in 0..3 {
                if !split[d] {
                    prop_assert_eq!(b.length(d), domain.length(d));
                }
            }
        }
        // Pairwise disjoint.
        for (i, a) in ba.iter().enumerate() {
            for b in ba.iter().skip(i + 1) {
                prop_assert!(!a.intersect(b).ok());
            }
        }
    }
}
