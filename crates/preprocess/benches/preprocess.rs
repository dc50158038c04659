use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use preprocess::{ChannelLayout, CpuPreProcessor, Normalization, Preprocess, TileGrid};

/// Create raw pixel buffer for benchmarking (gradient pattern)
fn create_test_pixels(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = vec![0u8; (width * height * 3) as usize];
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            pixels[idx] = (x % 256) as u8; // R
            pixels[idx + 1] = (y % 256) as u8; // G
            pixels[idx + 2] = ((x + y) % 256) as u8; // B
        }
    }
    pixels
}

fn benchmark_tile_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("tile_preprocess");

    let resolutions = [(1280, 720), (1920, 1080), (4000, 3000)];
    let tile_size = 256;

    for layout in [ChannelLayout::Nhwc, ChannelLayout::Nchw] {
        let mut preprocessor = CpuPreProcessor::new((224, 224), layout, Normalization::UnitRange);

        for (width, height) in resolutions.iter() {
            let pixels = create_test_pixels(*width, *height);
            let grid = TileGrid::for_image(*width, *height, tile_size);
            let tiles: Vec<_> = grid.tiles().map(|(_, _, t)| t).collect();

            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", layout), format!("{}x{}", width, height)),
                &pixels,
                |b, pixels| {
                    b.iter(|| {
                        preprocessor
                            .preprocess_tiles(
                                black_box(pixels),
                                black_box(*width),
                                black_box(*height),
                                black_box(&tiles),
                            )
                            .unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_tile_preprocess);
criterion_main!(benches);
