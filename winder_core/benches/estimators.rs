use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use winder_core::mocks::{FixedSpan, ProfilePlant, XorShift64, excitation_profile};
use winder_core::{
    InertiaCfg, InertiaEstimator, NullSink, RadiusCalculator, RadiusCfg, TensionCfg, TensionInput,
    TensionObserver,
};

fn configure(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    // Allow quick tweaking without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p winder_core --bench estimators
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(10));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }
}

fn tracking_estimator() -> InertiaEstimator {
    let mut est = InertiaEstimator::new(InertiaCfg::default())
        .unwrap()
        .with_sink(Box::new(NullSink));
    let profile = excitation_profile(200, 0.01, ProfilePlant::default());
    for &(tau, w, a, t, r) in profile.iter().cycle().take(400) {
        est.update(tau, w, a, t, r);
    }
    est
}

pub fn bench_inertia(c: &mut Criterion) {
    let mut g = c.benchmark_group("inertia");
    configure(&mut g);
    let profile = excitation_profile(200, 0.01, ProfilePlant::default());

    // one RLS step per cycle once tracking
    g.bench_function("tracking_cycle", |b| {
        b.iter_batched(
            tracking_estimator,
            |mut est| {
                for &(tau, w, a, t, r) in &profile {
                    black_box(est.update(tau, w, a, t, r));
                }
            },
            BatchSize::SmallInput,
        )
    });

    // worst case: a full batch identification over a 500-sample window
    g.bench_function("identify_500", |b| {
        let cfg = InertiaCfg {
            min_samples: 500,
            ..InertiaCfg::default()
        };
        b.iter_batched(
            || {
                let mut est = InertiaEstimator::new(cfg.clone())
                    .unwrap()
                    .with_sink(Box::new(NullSink));
                for &(tau, w, a, t, r) in profile.iter().cycle().take(500) {
                    est.update(tau, w, a, t, r);
                }
                est
            },
            |mut est| black_box(est.update(1.0, 6.0, 0.0, 50.0, 0.1)),
            BatchSize::SmallInput,
        )
    });
    g.finish();
}

pub fn bench_radius_tension(c: &mut Criterion) {
    let mut g = c.benchmark_group("radius_tension");
    configure(&mut g);
    let mut rng = XorShift64::new(0xC0FFEE);
    let speeds: Vec<f64> = (0..1000).map(|_| rng.uniform(0.0, 8.0)).collect();

    g.bench_function("radius_1000", |b| {
        let mut calc = RadiusCalculator::new(RadiusCfg::default())
            .unwrap()
            .with_sink(Box::new(NullSink));
        b.iter(|| {
            for &w in &speeds {
                black_box(calc.estimate(black_box(w * 3.0), w, 50e-6, 0.01));
            }
        })
    });
    g.bench_function("tension_1000", |b| {
        let mut obs = TensionObserver::new(TensionCfg::default(), FixedSpan(80.0))
            .unwrap()
            .with_sink(Box::new(NullSink));
        b.iter(|| {
            for &w in &speeds {
                black_box(obs.update(&TensionInput::new(-5.0, w, 0.0, 0.1, 1.0, 1.0)));
            }
        })
    });
    g.finish();
}

criterion_group!(estimators, bench_inertia, bench_radius_tension);
criterion_main!(estimators);
