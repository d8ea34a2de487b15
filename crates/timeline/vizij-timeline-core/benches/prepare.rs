use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::rc::Rc;
use vizij_timeline_core::{Config, Engine, ManualClock, NodeId};

/// Timeline of `n` staggered tweens, each overlapping the previous one.
fn build(engine: &mut Engine, n: usize) -> NodeId {
    let tl = engine.timeline();
    for _ in 0..n {
        let tw = engine.tween("null").unwrap();
        engine.set_duration(tw, 100.0).unwrap();
        engine.add(tl, tw, "-=60").unwrap();
    }
    tl
}

fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare");
    for n in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let clock = ManualClock::new();
            let mut engine = Engine::with_clock(Config::default(), Rc::new(clock));
            let tl = build(&mut engine, n);
            b.iter(|| {
                engine.set_yoyo(tl, false).unwrap();
                black_box(engine.total_duration(tl))
            });
        });
    }
    group.finish();
}

fn bench_playback(c: &mut Criterion) {
    c.bench_function("play_100_tweens", |b| {
        b.iter(|| {
            let clock = ManualClock::new();
            let mut engine = Engine::with_clock(Config::default(), Rc::new(clock.clone()));
            let tl = build(&mut engine, 100);
            engine.play(tl);
            while engine.tick() {
                clock.advance(16.0);
            }
            black_box(engine.progress(tl))
        });
    });
}

criterion_group!(benches, bench_prepare, bench_playback);
criterion_main!(benches);
