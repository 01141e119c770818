use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use roialign_core::internal::*;
use roialign_core::ndarray::{Array2, Array4, ArrayD};

const ROIS: &[usize] = &[16, 128];

fn setup(n_rois: usize) -> (RoiAlign, ArrayD<f32>, ArrayD<f32>, ArrayD<f32>) {
    let params = RoiAlignParams::new(7, 7, 0.0625, 0, false, PoolMode::Avg);
    let fmap = Array4::from_shape_fn((1, 64, 38, 50), |(_, c, y, x)| (c + y * x) as f32 * 0.01);
    let rois = Array2::from_shape_fn((n_rois, 4), |(r, col)| {
        let origin = (r * 13 % 400) as f32;
        if col < 2 { origin } else { origin + 48.0 + (r % 5) as f32 * 32.0 }
    });
    let geometry = RoiAlignGeometry::from_shapes(&params, fmap.shape(), rois.shape()).unwrap();
    let output = ArrayD::zeros(&*geometry.output_shape());
    (RoiAlign::new(params, geometry), fmap.into_dyn(), rois.into_dyn(), output)
}

fn roi_align(c: &mut Criterion) {
    let mut group = c.benchmark_group("roi_align");
    #[allow(unused_mut)]
    let mut executors = vec![("single", Executor::SingleThread)];
    #[cfg(feature = "multithread")]
    executors.push(("pool4", Executor::multithread(4).unwrap()));
    for n_rois in ROIS {
        let (op, fmap, rois, mut output) = setup(*n_rois);
        for (name, executor) in &executors {
            group.bench_with_input(BenchmarkId::new(*name, n_rois), n_rois, |b, _| {
                b.iter(|| op.eval(fmap.view(), rois.view(), output.view_mut(), executor).unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, roi_align);
criterion_main!(benches);
