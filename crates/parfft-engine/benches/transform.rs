use criterion::{criterion_group, criterion_main, Criterion};

use parfft_engine::{DomainStrategy, Info, R2c};
use parfft_grid::{decompose, DistributionMapping, FabArray, IndexBox, IntVect, ProcGroup};

fn plane_wave(domain: IndexBox, nboxes: usize) -> FabArray<f64> {
    let ba = decompose(domain, nboxes, [false, true, true]);
    let dm = DistributionMapping::iota(ba.len());
    let mut fa = FabArray::new(ba, dm, IntVect::zero());
    let n = domain.length(0) as f64;
    for i in 0..fa.nfabs() {
        let fab = fa.fab_mut(i);
        let b = fab.valid_box();
        for p in b.iter() {
            *fab.get_mut(p) =
                (2.0 * std::f64::consts::PI * f64::from(p[0]) / n).sin() + f64::from(p[1] + p[2]);
        }
    }
    fa
}

fn bench_round_trip(c: &mut Criterion) {
    let domain = IndexBox::from_lengths(32, 32, 32);
    for (name, strategy, nprocs) in [
        ("round_trip_32cube_slab_4ranks", DomainStrategy::Slab, 4),
        ("round_trip_32cube_pencil_4ranks", DomainStrategy::Pencil, 4),
        ("round_trip_32cube_single", DomainStrategy::Slab, 1),
    ] {
        let info = Info::default().with_strategy(strategy);
        let mut engine: R2c = match R2c::new(domain, info, ProcGroup::new(nprocs)) {
            Ok(e) => e,
            Err(err) => panic!("engine setup failed: {err}"),
        };
        let input = plane_wave(domain, nprocs);
        let mut out = input.clone();
        c.bench_function(name, |b| {
            b.iter(|| {
                engine
                    .forward_then_backward(&input, &mut out, |_, _, _, _| {})
                    .is_ok()
            });
        });
    }
}

fn bench_forward_only(c: &mut Criterion) {
    let domain = IndexBox::from_lengths(64, 64, 16);
    let mut engine: R2c = match R2c::new(domain, Info::default(), ProcGroup::new(8)) {
        Ok(e) => e,
        Err(err) => panic!("engine setup failed: {err}"),
    };
    let input = plane_wave(domain, 8);
    c.bench_function("forward_64x64x16_slab_8ranks", |b| {
        b.iter(|| engine.forward(&input));
    });
}

criterion_group!(benches, bench_round_trip, bench_forward_only);
criterion_main!(benches);
