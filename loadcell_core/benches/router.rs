use std::time::{Duration, UNIX_EPOCH};

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use loadcell_core::config::RouterCfg;
use loadcell_core::router::{LegacyWeight, TelemetryRouter};

// Rich telemetry bodies with a slowly drifting weight
fn synth_bodies(n: usize) -> Vec<Vec<u8>> {
    (0..n)
        .map(|i| {
            let w = 20.0 + (i as f64 / 50.0).sin() * 5.0;
            format!(r#"{{"weight":{w:.3},"stable":{},"unit":"kg"}}"#, i % 7 != 0).into_bytes()
        })
        .collect()
}

pub fn bench_route(c: &mut Criterion) {
    let mut g = c.benchmark_group("router");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p loadcell_core --bench router
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(Duration::from_millis(ms_u64));
    }

    let bodies = synth_bodies(10_000);
    let at = UNIX_EPOCH + Duration::from_secs(1_767_225_600);

    g.bench_function("rich_telemetry_10k", |b| {
        b.iter_batched(
            || TelemetryRouter::new(RouterCfg::default()),
            |mut router| {
                for body in &bodies {
                    let _ = black_box(router.route(
                        "amanerve/loadcell/telemetry",
                        black_box(body),
                        at,
                    ));
                }
                black_box(router.statistics());
            },
            BatchSize::SmallInput,
        )
    });

    for raw in ["12.5kg", r#"{"value": 7}"#, "garbage"] {
        g.bench_function(format!("legacy_decode_{raw}"), |b| {
            b.iter(|| black_box(LegacyWeight::decode(black_box(raw)).weight()))
        });
    }
    g.finish();
}

criterion_group!(router, bench_route);
criterion_main!(router);
