use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use statcube::aggregation::{aggregate, Reducer};
use statcube::analysis::{check_uniqueness, compacity};
use statcube::hypercube::{CompareOp, Criteria, Hypercube};
use statcube::index::StatsIndex;
use statcube::types::Stat;

const LABELS: [&str; 3] = ["geo", "sex", "time"];

/// Dense cube of roughly `size` stats over 3 dimensions
fn create_cube(size: usize) -> Hypercube {
    let geos = (size / 60).max(1);
    let mut hc = Hypercube::new(LABELS);
    for g in 0..geos {
        let geo = format!("G{:04}", g);
        for sex in ["F", "M", "T"] {
            for year in 2000..2020 {
                let time = year.to_string();
                let value = (g * 31 + year as usize) as f64 * 0.5;
                hc.add(Stat::with_dims(
                    value,
                    &[("geo", geo.as_str()), ("sex", sex), ("time", time.as_str())],
                ));
            }
        }
    }
    hc
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");

    for size in [600, 6000, 60000].iter() {
        let hc = create_cube(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(StatsIndex::build(&hc, &LABELS)));
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_lookup");

    for size in [600, 6000, 60000].iter() {
        let hc = create_cube(*size);
        let index = StatsIndex::build(&hc, &LABELS);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(index.single_value(&["G0000", "M", "2010"])));
        });
    }

    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for size in [600, 6000, 60000].iter() {
        let hc = create_cube(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(aggregate(&hc, "geo", "ALL", &Reducer::Sum).unwrap()));
        });
    }

    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let hc = create_cube(6000);
    let criteria = Criteria::and(vec![
        Criteria::dim_numeric("time", CompareOp::Ge, 2010.0),
        Criteria::value(CompareOp::Gt, 500.0),
    ]);

    c.bench_function("compacity", |b| b.iter(|| black_box(compacity(&hc))));
    c.bench_function("check_uniqueness", |b| b.iter(|| black_box(check_uniqueness(&hc))));
    c.bench_function("select", |b| b.iter(|| black_box(hc.select(&criteria))));
}

criterion_group!(benches, bench_build, bench_lookup, bench_aggregate, bench_analysis);
criterion_main!(benches);
