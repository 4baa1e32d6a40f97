use std::{collections::BTreeMap, iter::repeat_with};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rowkit::{batch::plan_batches, from_row, to_row, BatchOperation, TableEntity};

#[derive(TableEntity, Debug, Default)]
pub struct Reading {
    key: String,
    sensor: String,
    value: f64,
    sequence: i64,
    healthy: bool,
    labels: BTreeMap<String, String>,
}

fn random_string(len: usize) -> String {
    repeat_with(fastrand::alphanumeric).take(len).collect()
}

fn readings(count: usize, partitions: usize) -> Vec<Reading> {
    (0..count)
        .map(|i| Reading {
            key: format!("p{}/{}", i % partitions, random_string(16)),
            sensor: random_string(32),
            value: fastrand::f64(),
            sequence: i as i64,
            healthy: fastrand::bool(),
            labels: [("site".to_string(), random_string(8))].into(),
        })
        .collect()
}

fn mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapper");
    for count in [100, 1000] {
        let input = readings(count, 1);
        group.bench_with_input(BenchmarkId::new("to_row", count), &input, |b, input| {
            b.iter(|| {
                for reading in input {
                    black_box(to_row(reading).unwrap());
                }
            })
        });

        let rows = input.iter().map(|r| to_row(r).unwrap()).collect::<Vec<_>>();
        group.bench_with_input(BenchmarkId::new("from_row", count), &rows, |b, rows| {
            b.iter(|| {
                for row in rows {
                    black_box(from_row::<Reading>(row.clone()).unwrap());
                }
            })
        });
    }
    group.finish();
}

fn batching(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_batches");
    for partitions in [1, 8, 64] {
        let operations = readings(1000, partitions)
            .iter()
            .map(|r| BatchOperation::InsertOrReplace(to_row(r).unwrap()))
            .collect::<Vec<_>>();
        group.bench_with_input(
            BenchmarkId::from_parameter(partitions),
            &operations,
            |b, operations| b.iter(|| black_box(plan_batches(operations.clone(), 100))),
        );
    }
    group.finish();
}

criterion_group!(benches, mapping, batching);
criterion_main!(benches);
