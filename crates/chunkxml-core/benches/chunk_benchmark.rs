//! Benchmarks for incremental feeding at different chunk sizes
//!
//! Run with: cargo bench -p chunkxml-core --bench chunk_benchmark

use chunkxml_core::Parser;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn sample(items: usize) -> String {
    let mut out = String::from("<feed xmlns='urn:example'>\n");
    for i in 0..items {
        out.push_str(&format!(
            "  <entry id=\"{i}\" kind=item><title>Entry number {i}</title>\
             <summary>Some text &amp; more text for entry {i}.</summary></entry>\n"
        ));
    }
    out.push_str("</feed>\n");
    out
}

fn feed_in_chunks(input: &[u8], chunk_size: usize) -> usize {
    let mut parser = Parser::new();
    for chunk in input.chunks(chunk_size) {
        parser.feed(chunk).unwrap();
    }
    parser.finish().unwrap().len()
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_size");
    let content = sample(500);

    group.throughput(Throughput::Bytes(content.len() as u64));

    for size in [1usize, 7, 95, 4096, content.len()].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(feed_in_chunks(black_box(content.as_bytes()), size)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chunk_sizes);
criterion_main!(benches);
