use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use parfft_engine::{take_stage_traces, Complex64, Info, R2c};
use parfft_grid::{decompose, DistributionMapping, FabArray, IndexBox, IntVect, ProcGroup};

const N: i32 = 8;

fn domain() -> IndexBox {
    IndexBox::from_lengths(N, N, N)
}

// Random data supported on the lower half of z, zero above.
fn lower_half_field(nboxes: usize, seed: u64) -> FabArray<f64> {
    let ba = decompose(domain(), nboxes, [false, true, true]);
    let dm = DistributionMapping::iota(ba.len());
    let mut fa = FabArray::new(ba, dm, IntVect::zero());
    let mut rng = StdRng::seed_from_u64(seed);
    for i in 0..fa.nfabs() {
        let fab = fa.fab_mut(i);
        let b = fab.valid_box();
        for p in b.iter() {
            if p[2] < N / 2 {
                *fab.get_mut(p) = rng.gen_range(-1.0..1.0);
            }
        }
    }
    fa
}

// Random data on every plane.
fn full_field(nboxes: usize, seed: u64) -> FabArray<f64> {
    let ba = decompose(domain(), nboxes, [false, true, true]);
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

fn spectral_container(engine: &R2c) -> FabArray<Complex64> {
    let (ba, dm) = engine.spectral_data_layout();
    FabArray::new(ba, dm, IntVect::zero())
}

fn spectral_value(fa: &FabArray<Complex64>, p: IntVect) -> Complex64 {
    for i in 0..fa.nfabs() {
        if fa.fab(i).valid_box().contains(p) {
            return *fa.fab(i).get(p);
        }
    }
    panic!("point {p:?} not covered");
}

#[test]
fn half_plans_match_full_transform_on_supported_input() {
    let input = lower_half_field(2, 17);

    let mut plain: R2c = R2c::new(domain(), Info::default(), ProcGroup::new(2)).unwrap();
    let mut want = spectral_container(&plain);
    plain.forward_into(&input, &mut want);

    let mut half: R2c = R2c::new(domain(), Info::default(), ProcGroup::new(2)).unwrap();
    half.prepare_open_bc().unwrap();
    let mut got = spectral_container(&half);
    half.forward_into(&input, &mut got);

    let sd = IndexBox::from_lengths(N / 2 + 1, N, N);
    for p in sd.iter() {
        let a = spectral_value(&want, p);
        let b = spectral_value(&got, p);
        assert!((a - b).norm() < 1e-10, "spectra diverge at {p:?}: {a} vs {b}");
    }
}

#[test]
fn upper_half_of_the_input_is_ignored() {
    // The half pipeline never reads planes z >= nz/2; garbage there must not
    // leak into the spectrum.
    let mut dirty = lower_half_field(2, 23);
    let clean = dirty.clone();
    for i in 0..dirty.nfabs() {
        let fab = dirty.fab_mut(i);
        let b = fab.valid_box();
        for p in b.iter() {
            if p[2] >= N / 2 {
                *fab.get_mut(p) = 1e6;
            }
        }
    }

    let mut a: R2c = R2c::new(domain(), Info::default(), ProcGroup::new(2)).unwrap();
    a.prepare_open_bc().unwrap();
    let mut spec_a = spectral_container(&a);
    a.forward_into(&dirty, &mut spec_a);

    let mut b: R2c = R2c::new(domain(), Info::default(), ProcGroup::new(2)).unwrap();
    b.prepare_open_bc().unwrap();
    let mut spec_b = spectral_container(&b);
    b.forward_into(&clean, &mut spec_b);

    let sd = IndexBox::from_lengths(N / 2 + 1, N, N);
    for p in sd.iter() {
        let x = spectral_value(&spec_a, p);
        let y = spectral_value(&spec_b, p);
        assert!((x - y).norm() < 1e-10, "upper half leaked at {p:?}");
    }
}

#[test]
fn repeated_forwards_clear_stale_upper_lanes() {
    // A plain forward fills the z-stage buffer end to end; a later
    // half-domain forward on the same engine must not see that residue.
    let mut engine: R2c = R2c::new(domain(), Info::default(), ProcGroup::new(2)).unwrap();
    engine.forward(&full_field(2, 41));
    engine.prepare_open_bc().unwrap();
    let input = lower_half_field(2, 43);
    let mut got = spectral_container(&engine);
    engine.forward_into(&input, &mut got);

    let mut fresh: R2c = R2c::new(domain(), Info::default(), ProcGroup::new(2)).unwrap();
    fresh.prepare_open_bc().unwrap();
    let mut want = spectral_container(&fresh);
    fresh.forward_into(&input, &mut want);

    let sd = IndexBox::from_lengths(N / 2 + 1, N, N);
    for p in sd.iter() {
        let a = spectral_value(&got, p);
        let b = spectral_value(&want, p);
        assert!((a - b).norm() < 1e-12, "stale lane data at {p:?}: {a} vs {b}");
    }
}

#[test]
fn forward_emits_a_zero_fill_stage() {
    let input = lower_half_field(2, 3);
    let mut engine: R2c = R2c::new(domain(), Info::default(), ProcGroup::new(2)).unwrap();
    engine.prepare_open_bc().unwrap();
    let _ = take_stage_traces();
    engine.forward(&input);
    let traces = take_stage_traces();
    assert!(
        traces.iter().any(|t| t.stage == "zero-fill"),
        "expected a zero-fill stage, got {:?}",
        traces.iter().map(|t| t.stage.clone()).collect::<Vec<_>>()
    );
}

#[test]
fn round_trip_recovers_the_lower_half() {
    let input = lower_half_field(2, 29);
    let mut engine: R2c = R2c::new(domain(), Info::default(), ProcGroup::new(2)).unwrap();
    engine.prepare_open_bc().unwrap();
    let mut out = input.clone();
    out.set_val(0.0);
    engine
        .forward_then_backward(&input, &mut out, |_, _, _, _| {})
        .unwrap();
    let scale = engine.scaling_factor();
    for p in domain().iter() {
        if p[2] >= N / 2 {
            continue;
        }
        let mut got = f64::NAN;
        let mut want = f64::NAN;
        for i in 0..out.nfabs() {
            if out.fab(i).valid_box().contains(p) {
                got = *out.fab(i).get(p) * scale;
                want = *input.fab(i).get(p);
            }
        }
        assert!((got - want).abs() < 1e-9, "at {p:?}: {got} vs {want}");
    }
}
