//! Row differ and table merge benchmarks.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench three_way_diff
//! # With a custom filter:
//! cargo bench --bench three_way_diff -- diff
//! ```
//!
//! Each case derives ours and theirs from a base of `n` rows: ours edits
//! column `a` of every 10th row, theirs edits column `b` of every 7th row
//! (so every 70th row is a cell merge), each side deletes a few rows and
//! appends new ones.
//!
//! # Report
//!
//! HTML report is generated in `target/criterion/` by criterion.

use std::collections::BTreeMap;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use vtmerge::merge::diff::three_way_diff;
use vtmerge::merge::table::merge_table;
use vtmerge::merge::{MergeContext, MergeOptions, merge_roots};
use vtmerge_store::{
    Column, ColumnType, RootValue, RowSet, Schema, Table, TableName, Value,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn schema() -> Schema {
    Schema::new(
        vec![
            Column::new(1, "id", ColumnType::Int).not_null(),
            Column::new(2, "a", ColumnType::Int),
            Column::new(3, "b", ColumnType::Text),
        ],
        vec![1],
        vec![],
    )
    .expect("schema")
}

fn build(rows: impl Iterator<Item = (i64, i64, String)>) -> Table {
    let s = schema();
    let rows = rows.map(|(id, a, b)| vec![Value::Int(id), Value::Int(a), Value::Text(b)]);
    Table::new(s.clone(), RowSet::from_full_rows(&s, rows).expect("rows"))
}

/// Base, ours, and theirs tables of roughly `n` rows.
fn sides(n: i64) -> (Table, Table, Table) {
    let base = build((0..n).map(|i| (i, i, format!("row {i}"))));
    let ours = build(
        (0..n)
            .filter(|i| i % 97 != 1)
            .map(|i| (i, if i % 10 == 0 { -i } else { i }, format!("row {i}")))
            .chain((n..n + n / 20).map(|i| (i, i, "ours".to_owned()))),
    );
    let theirs = build(
        (0..n)
            .filter(|i| i % 89 != 2)
            .map(|i| {
                let b = if i % 7 == 0 { format!("edited {i}") } else { format!("row {i}") };
                (i, i, b)
            })
            .chain((n + n / 20..n + n / 10).map(|i| (i, i, "theirs".to_owned()))),
    );
    (base, ours, theirs)
}

// ---------------------------------------------------------------------------
// Benchmark: row differ
// ---------------------------------------------------------------------------

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");
    let s = schema();

    for &n in &[1_000i64, 10_000, 100_000] {
        let (base, ours, theirs) = sides(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("rows", n), &n, |b, _| {
            b.iter(|| three_way_diff(&s, &base, &ours, &theirs).count());
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: full table merge
// ---------------------------------------------------------------------------

fn bench_merge_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_table");
    let name = TableName::new("t").expect("name");
    let opts = MergeOptions::default();

    for &n in &[1_000i64, 10_000] {
        let (base, ours, theirs) = sides(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("rows", n), &n, |b, _| {
            b.iter(|| {
                merge_table(&name, Some(&base), Some(&ours), Some(&theirs), &opts).expect("merge")
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: worker count
// ---------------------------------------------------------------------------

/// Sixteen independent tables merged with 1 and 4 workers.
fn bench_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_roots");
    let mut roots = (BTreeMap::new(), BTreeMap::new(), BTreeMap::new());
    for i in 0..16 {
        let (b, o, t) = sides(5_000);
        let name = TableName::new(&format!("t{i}")).expect("name");
        roots.0.insert(name.clone(), b);
        roots.1.insert(name.clone(), o);
        roots.2.insert(name, t);
    }
    let base = RootValue::new(roots.0, vec![]);
    let ours = RootValue::new(roots.1, vec![]);
    let theirs = RootValue::new(roots.2, vec![]);

    for &workers in &[1usize, 4] {
        let opts = MergeOptions {
            concurrency: workers,
            ..MergeOptions::default()
        };
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, _| {
            b.iter(|| {
                merge_roots(&base, &ours, &theirs, &opts, &MergeContext::new()).expect("merge")
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_diff, bench_merge_table, bench_workers);
criterion_main!(benches);
