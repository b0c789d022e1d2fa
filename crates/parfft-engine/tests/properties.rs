use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use parfft_engine::{DomainStrategy, Info, R2c};
use parfft_grid::{decompose, DistributionMapping, FabArray, IndexBox, IntVect, ProcGroup};

fn random_field(domain: IndexBox, nboxes: usize, seed: u64) -> FabArray<f64> {
    let ba = decompose(domain, nboxes, [false, true, true]);
    let dm = DistributionMapping::iota(ba.len());
    let mut fa = FabArray::new(ba, dm, IntVect::zero());
    let mut rng = StdRng::seed_from_u64(seed);
    for i in 0..fa.nfabs() {
        let fab = fa.fab_mut(i);
        let b = fab.valid_box();
        for p in b.iter() {
            *fab.get_mut(p) = rng.gen_range(-1.0..1.0);
        }
    }
    fa
}

fn value_at(fa: &FabArray<f64>, p: IntVect) -> f64 {
    for i in 0..fa.nfabs() {
        if fa.fab(i).valid_box().contains(p) {
            return *fa.fab(i).get(p);
        }
    }
    panic!("point {p:?} not covered");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // Degenerate axes (length 1 anywhere, including leading) must reduce to
    // a lower-dimensional transform and still round-trip.
    #[test]
    fn round_trip_recovers_input(
        nx in 1usize..10,
        ny in 1usize..10,
        nz in 1usize..10,
        nprocs in 1usize..5,
        pencil in any::<bool>(),
        seed in any::<u64>(),
    ) {
        prop_assume!(nx * ny * nz > 1);
        let domain = IndexBox::from_lengths(nx as i32, ny as i32, nz as i32);
        let strategy = if pencil { DomainStrategy::Pencil } else { DomainStrategy::Slab };
        let info = Info::default().with_strategy(strategy);
        let mut engine: R2c = R2c::new(domain, info, ProcGroup::new(nprocs)).unwrap();
        let input = random_field(domain, nprocs, seed);
        let mut out = input.clone();
        out.set_val(0.0);
        engine.forward_then_backward(&input, &mut out, |_, _, _, _| {}).unwrap();
        let scale = engine.scaling_factor();
        for p in domain.iter() {
            let got = value_at(&out, p) * scale;
            let want = value_at(&input, p);
            prop_assert!((got - want).abs() < 1e-9, "at {p:?}: {got} vs {want}");
        }
    }

    // A transform over (1, ny, nz) is the transform over (ny, nz, 1) of the
    // same samples, reindexed.
    #[test]
    fn leading_degenerate_axis_matches_compacted_domain(
        ny in 2usize..9,
        nz in 2usize..9,
        seed in any::<u64>(),
    ) {
        let outer = IndexBox::from_lengths(1, ny as i32, nz as i32);
        let compact = IndexBox::from_lengths(ny as i32, nz as i32, 1);

        let mut rng = StdRng::seed_from_u64(seed);
        let samples: Vec<f64> = (0..ny * nz).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let fill = |fa: &mut FabArray<f64>, at: &dyn Fn(usize, usize) -> IntVect| {
            for j in 0..ny {
                for k in 0..nz {
                    let p = at(j, k);
                    for i in 0..fa.nfabs() {
                        if fa.fab(i).valid_box().contains(p) {
                            *fa.fab_mut(i).get_mut(p) = samples[j + ny * k];
                        }
                    }
                }
            }
        };

        let run = |domain: IndexBox, at: &dyn Fn(usize, usize) -> IntVect| -> (FabArray<f64>, f64) {
            let mut engine: R2c =
                R2c::new(domain, Info::default(), ProcGroup::new(2)).unwrap();
            let ba = decompose(domain, 2, [false, true, true]);
            let dm = DistributionMapping::iota(ba.len());
            let mut input = FabArray::new(ba, dm, IntVect::zero());
            fill(&mut input, at);
            let mut out = input.clone();
            out.set_val(0.0);
            engine
                .forward_then_backward(&input, &mut out, |_, _, _, c| *c *= 2.0)
                .unwrap();
            let scale = engine.scaling_factor();
            (out, scale)
        };

        let (out_outer, s_outer) =
            run(outer, &|j, k| IntVect::new(0, j as i32, k as i32));
        let (out_compact, s_compact) =
            run(compact, &|j, k| IntVect::new(j as i32, k as i32, 0));

        prop_assert_eq!(s_outer, s_compact);
        for j in 0..ny {
            for k in 0..nz {
                let a = value_at(&out_outer, IntVect::new(0, j as i32, k as i32));
                let b = value_at(&out_compact, IntVect::new(j as i32, k as i32, 0));
                prop_assert!((a - b).abs() < 1e-9, "({j},{k}): {a} vs {b}");
            }
        }
    }

    // Applying the hook twice with half the weight equals applying it once.
    #[test]
    fn hook_scaling_is_linear(
        nx in 2usize..8,
        ny in 1usize..8,
        nz in 1usize..8,
        seed in any::<u64>(),
    ) {
        let domain = IndexBox::from_lengths(nx as i32, ny as i32, nz as i32);
        let input = random_field(domain, 2, seed);

        let apply = |w: f64| {
            let mut engine: R2c =
                R2c::new(domain, Info::default(), ProcGroup::new(2)).unwrap();
            let mut out = input.clone();
            out.set_val(0.0);
            engine
                .forward_then_backward(&input, &mut out, move |_, _, _, c| *c *= w)
                .unwrap();
            out
        };

        let once = apply(3.0);
        let half_a = apply(1.5);
        for p in domain.iter() {
            let a = value_at(&once, p);
            let b = 2.0 * value_at(&half_a, p);
            prop_assert!((a - b).abs() < 1e-8, "at {p:?}: {a} vs {b}");
        }
    }
}
