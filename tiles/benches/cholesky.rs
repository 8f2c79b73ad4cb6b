use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;
use tilegp_tiles::{cholesky::cholesky, TiledMatrix};

fn criterion_cholesky(c: &mut Criterion) {
    let n = 480;
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let m = Array2::random_using((n, n), Uniform::new(-1., 1.), &mut rng);
    let a = m.dot(&m.t()) + Array2::<f64>::eye(n) * n as f64;

    let mut group = c.benchmark_group("cholesky");
    group.sample_size(20);
    for n_tiles in [1, 4, 8, 16] {
        group.bench_function(format!("cholesky {n} / {n_tiles} tiles"), |b| {
            b.iter(|| {
                let tiles = TiledMatrix::from_dense(&a, n / n_tiles);
                cholesky(&tiles).expect("SPD matrix");
                black_box(tiles)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_cholesky);
criterion_main!(benches);
