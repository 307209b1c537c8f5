//! Benchmark template compilation and rendering time.

use criterion::{criterion_group, criterion_main, Criterion};

use benches::context;
use benches::{Dry, Engine, Liquid};

criterion_main! { benches }
criterion_group! { benches, bench_init, bench_compile, bench_render }

const CATALOG: &str = include_str!("../benchdata/catalog.liquid");

/// Benchmarks the time taken to create a new instance of the engine.
fn bench_init(c: &mut Criterion) {
    let mut g = c.benchmark_group("init");

    macro_rules! bench {
        ($E:ty) => {{
            g.bench_function(<$E as Engine>::name(), |b| {
                b.iter(|| <$E as Engine>::new());
            });
        }};
    }

    bench!(Dry);
    bench!(Liquid);
}

/// Benchmarks the time taken to compile a template.
fn bench_compile(c: &mut Criterion) {
    let mut g = c.benchmark_group("compile");
    let source = CATALOG.repeat(50);

    macro_rules! bench {
        ($E:ty) => {{
            g.bench_function(<$E as Engine>::name(), |b| {
                let mut engine = <$E as Engine>::new();
                b.iter(|| engine.add_template("bench", &source));
            });
        }};
    }

    bench!(Dry);
    bench!(Liquid);
}

/// Benchmarks the time taken to render a template as a string.
fn bench_render(c: &mut Criterion) {
    let mut g = c.benchmark_group("render");
    let source = CATALOG.repeat(20);
    let ctx = context::random(150);

    macro_rules! bench {
        ($E:ty) => {{
            g.bench_function(<$E as Engine>::name(), |b| {
                let mut engine = <$E as Engine>::new();
                <$E as Engine>::add_template(&mut engine, "bench", &source);
                b.iter(|| <$E as Engine>::render(&engine, "bench", &ctx));
            });
        }};
    }

    bench!(Dry);
    bench!(Liquid);
}
