use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rconv_lib::prelude::*;
use rconv_lib::tensor;

struct BenchConfig {
    name: &'static str,
    channels: usize,
    maps: usize,
    side: usize,
}

const SIZES: &[BenchConfig] = &[
    BenchConfig { name: "mnist_like", channels: 1, maps: 8, side: 28 },
    BenchConfig { name: "cifar_like", channels: 3, maps: 16, side: 32 },
    BenchConfig { name: "wide", channels: 16, maps: 32, side: 16 },
];

fn bench_activate(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolution_activate");
    for cfg in SIZES {
        let kernel = 5;
        let out = cfg.side - kernel + 1;
        let conf = LayerConfig::builder()
            .n_in(cfg.channels)
            .n_out(cfg.maps)
            .kernel_size(kernel, kernel)
            .feature_map_size(out, out)
            .activation(Activation::Relu)
            .seed(1)
            .build()
            .unwrap();
        let layer = ConvolutionLayer::initialized(conf).unwrap();
        let input = tensor::ones(&[8, cfg.channels, cfg.side, cfg.side]);

        group.bench_with_input(BenchmarkId::from_parameter(cfg.name), &input, |b, input| {
            b.iter(|| layer.activate(black_box(input)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_activate);
criterion_main!(benches);
