//! Performance benchmarks for EODB
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use eodb::index::dense::DenseMemIndex;
use eodb::index::sparse::SparseMemIndex;
use eodb::index::Offset;
use eodb::osm::{opl, record, Entity, EntityKind, Location, Member};

/// Ids spread like a planet extract: mostly increasing with gaps
fn sample_ids(count: u64) -> Vec<u64> {
    (1..=count).map(|i| i * 7 + (i % 13)).collect()
}

fn bench_dense_index(c: &mut Criterion) {
    let ids = sample_ids(100_000);
    let mut group = c.benchmark_group("dense_index");

    group.bench_function("set_100k", |b| {
        b.iter(|| {
            let mut index = DenseMemIndex::<Offset>::new();
            for (offset, &id) in ids.iter().enumerate() {
                index.set(id, offset as Offset).unwrap();
            }
            index
        })
    });

    let mut index = DenseMemIndex::<Offset>::new();
    for (offset, &id) in ids.iter().enumerate() {
        index.set(id, offset as Offset).unwrap();
    }
    group.bench_function("get_100k", |b| {
        b.iter(|| ids.iter().filter(|&&id| index.get(black_box(id)).is_found()).count())
    });

    group.finish();
}

fn bench_sparse_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_index");

    for count in [10_000u64, 100_000] {
        let mut ids = sample_ids(count);
        // Reverse so sorting has work to do
        ids.reverse();

        group.bench_with_input(BenchmarkId::new("set_and_sort", count), &ids, |b, ids| {
            b.iter(|| {
                let mut index = SparseMemIndex::<Offset>::new();
                for (offset, &id) in ids.iter().enumerate() {
                    index.set(id, offset as Offset).unwrap();
                }
                index.sort();
                index
            })
        });

        let mut index = SparseMemIndex::<Offset>::new();
        for (offset, &id) in ids.iter().enumerate() {
            index.set(id, offset as Offset).unwrap();
        }
        index.sort();
        group.bench_with_input(BenchmarkId::new("get", count), &ids, |b, ids| {
            b.iter(|| {
                ids.iter()
                    .filter(|&&id| matches!(index.get(black_box(id)), Ok(lookup) if lookup.is_found()))
                    .count()
            })
        });
    }

    group.finish();
}

fn sample_entities() -> Vec<Entity> {
    vec![
        Entity::node(17, Location::from_degrees(13.3777, 52.5162)).with_tag("name", "Brandenburger Tor"),
        Entity::way(100, (1..200).collect()).with_tag("highway", "residential"),
        Entity::relation(
            1000,
            vec![
                Member::new(EntityKind::Way, 100, "outer"),
                Member::new(EntityKind::Node, 17, "label"),
                Member::new(EntityKind::Relation, 999, "subarea"),
            ],
        )
        .with_tag("type", "multipolygon"),
    ]
}

fn bench_record_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_codec");

    for entity in sample_entities() {
        let name = entity.kind().name();
        let mut encoded = Vec::new();
        record::encode(&entity, &mut encoded).unwrap();

        group.bench_function(BenchmarkId::new("encode", name), |b| {
            let mut buf = Vec::with_capacity(encoded.len());
            b.iter(|| {
                buf.clear();
                record::encode(black_box(&entity), &mut buf).unwrap()
            })
        });

        group.bench_function(BenchmarkId::new("decode", name), |b| {
            b.iter(|| record::decode(black_box(&encoded)).unwrap())
        });
    }

    group.finish();
}

fn bench_opl_parsing(c: &mut Criterion) {
    let lines: Vec<String> = sample_entities().iter().map(opl::format_entity).collect();

    c.bench_function("opl_parse", |b| {
        b.iter(|| {
            for line in &lines {
                let _ = opl::parse_line(black_box(line));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_dense_index,
    bench_sparse_index,
    bench_record_codec,
    bench_opl_parsing,
);

criterion_main!(benches);
