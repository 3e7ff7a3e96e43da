use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use kvorm::{Entity, Fields, Manager, MemoryStore, ModelConfig, SystemRegistry, TaggedManager, Value};

fn registry() -> Arc<SystemRegistry> {
    Arc::new(SystemRegistry::new(Arc::new(MemoryStore::new())))
}

fn seeded_books(n: usize) -> (TaggedManager, Vec<String>) {
    let books = TaggedManager::new(ModelConfig::new("book").sweep_rate(0.0), registry());
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let mut fields = Fields::new();
        fields.insert("title".to_string(), Value::from(format!("book-{i}")));
        let mut book = Entity::with_id(format!("{i:08}"), fields);
        book.tags.insert("fiction".to_string());
        if i % 2 == 0 {
            book.tags.insert("hardcover".to_string());
        }
        books.save(&mut book, None).unwrap();
        ids.push(format!("{i:08}"));
    }
    (books, ids)
}

fn bench_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("ops/save");
    group.throughput(Throughput::Elements(1));
    group.bench_function("plain", |b| {
        let users = Manager::new(ModelConfig::new("user").sweep_rate(0.0), registry());
        let mut i = 0u64;
        b.iter(|| {
            let mut fields = Fields::new();
            fields.insert("age".to_string(), Value::from(30));
            let mut user = Entity::with_id(format!("{i}"), fields);
            users.save(&mut user, None).unwrap();
            i += 1;
        });
    });
    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let (books, ids) = seeded_books(1024);
    let mut group = c.benchmark_group("ops/get");
    group.throughput(Throughput::Elements(1));
    group.bench_function("tagged", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let id = &ids[i % ids.len()];
            let hit = books.get(id, None).unwrap();
            assert!(hit.is_some());
            i += 1;
        });
    });
    group.finish();
}

fn bench_find_intersection(c: &mut Criterion) {
    let (books, _) = seeded_books(1024);
    let mut group = c.benchmark_group("ops/find");
    group.bench_function("two_tag_intersection", |b| {
        b.iter(|| {
            let ids = books.find_ids(&["fiction", "hardcover"], None).unwrap();
            assert_eq!(ids.len(), 512);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_save, bench_get, bench_find_intersection);
criterion_main!(benches);
