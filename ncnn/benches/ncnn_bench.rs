use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use srvk_ncnn::{Backend, ImageMut, ImageRef, NativeEngine, ReferenceBackend};

fn model_files() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let param = dir.path().join("x4.param");
    let bin = dir.path().join("x4.bin");
    std::fs::write(&param, b"7767517").unwrap();
    std::fs::write(&bin, b"\0").unwrap();
    (dir, param, bin)
}

fn loaded_engine(scale: u32) -> (tempfile::TempDir, Box<dyn NativeEngine>) {
    let (dir, param, bin) = model_files();
    let mut engine = ReferenceBackend::new().create_engine(0, false).unwrap();
    engine.set_scale(scale);
    engine.load(&param, &bin).unwrap();
    (dir, engine)
}

fn bench_reference_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("reference_process");
    for (w, h) in [(64u32, 64u32), (256, 256)] {
        let (_dir, engine) = loaded_engine(4);
        let input: Vec<u8> = (0..(w * h * 3)).map(|i| (i % 251) as u8).collect();
        let mut output = vec![0u8; (w * h * 3 * 16) as usize];
        group.bench_function(format!("{w}x{h}_rgb_x4"), |b| {
            b.iter(|| {
                let i = ImageRef::new(black_box(&input), w, h, 3).unwrap();
                let mut o = ImageMut::new(&mut output, w * 4, h * 4, 3).unwrap();
                engine.process(&i, &mut o).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_concurrent_engines(c: &mut Criterion) {
    let input: Vec<u8> = vec![7u8; 128 * 128 * 4];

    c.bench_function("reference_concurrent_4threads", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let input = input.clone();
                    std::thread::spawn(move || {
                        let (_dir, engine) = loaded_engine(2);
                        let mut output = vec![0u8; input.len() * 4];
                        let i = ImageRef::new(&input, 128, 128, 4).unwrap();
                        let mut o = ImageMut::new(&mut output, 256, 256, 4).unwrap();
                        engine.process(&i, &mut o).unwrap();
                        black_box(output);
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
        });
    });
}

criterion_group!(benches, bench_reference_process, bench_concurrent_engines);
criterion_main!(benches);
