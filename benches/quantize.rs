#[macro_use]
extern crate bencher;
extern crate wu_quant;

use bencher::Bencher;
use wu_quant::WuQuantizer;

fn synthetic_pixels(n: usize) -> Vec<u32> {
    (0..n)
        .map(|i| {
            let r = (i * 7) as u32 & 0xFF;
            let g = (i * 13) as u32 & 0xFF;
            let b = (i * 29) as u32 & 0xFF;
            0xFF_00_00_00 | (r << 16) | (g << 8) | b
        })
        .collect()
}

fn accumulate_10k(bencher: &mut Bencher) {
    let pixels = synthetic_pixels(10_000);
    bencher.iter(|| {
        let mut q = WuQuantizer::new();
        q.prepare(pixels.len() as u32, 1).unwrap();
        for &p in &pixels {
            q.add_color(p).unwrap();
        }
    })
}

fn build_palette_256(bencher: &mut Bencher) {
    let pixels = synthetic_pixels(50_000);
    bencher.iter(|| {
        let mut q = WuQuantizer::new();
        q.prepare(pixels.len() as u32, 1).unwrap();
        for &p in &pixels {
            q.add_color(p).unwrap();
        }
        q.build_palette(256).unwrap();
    })
}

fn build_palette_16(bencher: &mut Bencher) {
    let pixels = synthetic_pixels(50_000);
    bencher.iter(|| {
        let mut q = WuQuantizer::new();
        q.prepare(pixels.len() as u32, 1).unwrap();
        for &p in &pixels {
            q.add_color(p).unwrap();
        }
        q.build_palette(16).unwrap();
    })
}

benchmark_group!(benches, accumulate_10k, build_palette_16, build_palette_256);
benchmark_main!(benches);
