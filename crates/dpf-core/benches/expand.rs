use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dpf_core::{DpfParameters, IncrementalDpf, PointFunctionEngine};

fn bench_expand(c: &mut Criterion) {
    let dpf = IncrementalDpf::new();
    let params: Vec<DpfParameters> = [8, 12, 16]
        .iter()
        .map(|&l| DpfParameters::new(l, 64))
        .collect();
    let (key, _) = dpf.generate_keys(&params, 0xbeef, &[1, 1, 1]).unwrap();

    c.bench_function("generate_keys_16bit", |b| {
        b.iter(|| dpf.generate_keys(black_box(&params), 0xbeef, &[1, 1, 1]).unwrap())
    });

    c.bench_function("expand_root_256", |b| {
        b.iter(|| {
            let mut ctx = dpf.create_context(&params, &key).unwrap();
            dpf.expand_level(&mut ctx, black_box::<&[u64]>(&[])).unwrap()
        })
    });

    c.bench_function("expand_three_levels", |b| {
        b.iter(|| {
            let mut ctx = dpf.create_context(&params, &key).unwrap();
            dpf.expand_level(&mut ctx, &[]).unwrap();
            dpf.expand_level(&mut ctx, &[0xbe, 0xbf]).unwrap();
            dpf.expand_level(&mut ctx, black_box::<&[u64]>(&[0xbee, 0xbef])).unwrap()
        })
    });
}

criterion_group!(benches, bench_expand);
criterion_main!(benches);
