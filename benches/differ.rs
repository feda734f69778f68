//! Frame differencing benchmarks.
//!
//! Benchmarks for the threshold engine and the cursor filter on
//! full-resolution frame pairs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use paint_timeline::extraction::{FrameDiffer, Rect, RectFilter, ThresholdDiffer};
use paint_timeline::Frame;

/// Uniform background frame.
fn create_background(width: u32, height: u32, sequence: u64) -> Frame {
    Frame::filled(width, height, 240, sequence)
}

/// Background with a few painted blocks, like a launch indicator and a content area.
fn create_painted(width: u32, height: u32, sequence: u64, blocks: &[Rect]) -> Frame {
    let mut frame = create_background(width, height, sequence);
    let stride = width as usize;
    let pixels = frame.pixels_mut();
    for block in blocks {
        for y in block.y..(block.y + block.height).min(height) {
            for x in block.x..(block.x + block.width).min(width) {
                pixels[y as usize * stride + x as usize] = 16;
            }
        }
    }
    frame
}

fn bench_threshold_differ(c: &mut Criterion) {
    let mut group = c.benchmark_group("threshold_differ");
    group.sample_size(20);

    let resolutions = [("720p", 1280, 720), ("1080p", 1920, 1080)];

    for (name, width, height) in resolutions {
        let blocks = [
            Rect::new(width - 37, height - 42, 23, 23),
            Rect::new(width / 6, height / 5, width / 2, height / 2),
            Rect::new(40, 40, 10, 31),
        ];
        let previous = create_background(width, height, 0);
        let current = create_painted(width, height, 1, &blocks);
        let mut differ = ThresholdDiffer::default();

        group.throughput(Throughput::Elements(width as u64 * height as u64));
        group.bench_with_input(BenchmarkId::new("changed", name), &(), |b, _| {
            b.iter(|| differ.compare(black_box(&previous), black_box(&current)));
        });

        let unchanged = create_background(width, height, 2);
        group.bench_with_input(BenchmarkId::new("unchanged", name), &(), |b, _| {
            b.iter(|| differ.compare(black_box(&previous), black_box(&unchanged)));
        });
    }

    group.finish();
}

fn bench_cursor_filter(c: &mut Criterion) {
    let filter = RectFilter::default();
    let rects: Vec<Rect> = (0..256)
        .map(|i| Rect::new(i * 7, i * 3, 8 + i % 6, 28 + i % 7))
        .collect();

    c.bench_function("cursor_filter_256", |b| {
        b.iter(|| {
            let mut batch = rects.clone();
            filter.retain(black_box(&mut batch));
            batch
        });
    });
}

criterion_group!(benches, bench_threshold_differ, bench_cursor_filter);
criterion_main!(benches);
