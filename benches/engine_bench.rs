use criterion::{black_box, criterion_group, criterion_main, Criterion};

use typeskill::{EngineConfig, KeystrokeEvent, LiveContext, WeaknessEngine};

fn populated_engine() -> WeaknessEngine {
    let config = EngineConfig {
        seed: Some(42),
        ..EngineConfig::default()
    };
    let mut engine = WeaknessEngine::new(config);
    let text = "the quick brown fox jumps over the lazy dog";
    let mut ts = 0i64;
    for _ in 0..50 {
        for (i, key) in text.chars().enumerate() {
            engine.record_keystroke(&KeystrokeEvent {
                key,
                expected: Some(key),
                timestamp_ms: ts,
                is_correct: i % 11 != 0,
                hesitation_ms: Some(180 + (i as i64 % 90)),
                finger: None,
                previous_key: None,
            });
            ts += 200;
        }
    }
    engine
}

fn bench_record_keystroke(c: &mut Criterion) {
    let mut engine = populated_engine();
    let mut ts = 10_000_000i64;
    c.bench_function("record_keystroke", |b| {
        b.iter(|| {
            ts += 200;
            engine.record_keystroke(black_box(&KeystrokeEvent {
                key: 'e',
                expected: Some('e'),
                timestamp_ms: ts,
                is_correct: true,
                hesitation_ms: Some(210),
                finger: None,
                previous_key: Some('h'),
            }));
        })
    });
}

fn bench_analyze(c: &mut Criterion) {
    let mut engine = populated_engine();
    c.bench_function("analyze", |b| {
        b.iter(|| black_box(engine.analyze(black_box('e'))))
    });
}

fn bench_predict_risk(c: &mut Criterion) {
    let engine = populated_engine();
    let ctx = LiveContext {
        upcoming: 'e',
        wpm: 42.0,
        accuracy: 0.93,
        session_minutes: 12.0,
        timestamp_ms: Some(1_700_000_000_000),
    };
    c.bench_function("predict_risk", |b| {
        b.iter(|| black_box(engine.predict_risk(black_box(&ctx))))
    });
}

fn bench_dashboard(c: &mut Criterion) {
    let engine = populated_engine();
    c.bench_function("dashboard", |b| b.iter(|| black_box(engine.dashboard())));
}

criterion_group!(
    benches,
    bench_record_keystroke,
    bench_analyze,
    bench_predict_risk,
    bench_dashboard
);
criterion_main!(benches);
