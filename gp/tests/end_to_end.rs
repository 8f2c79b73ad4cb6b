use approx::assert_abs_diff_eq;
use linfa::ParamGuard;
use ndarray::{array, Array, Array1, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;
use tilegp_gp::metrics::error_norm;
use tilegp_gp::tiling::{compute_test_tiles, compute_train_tile_size};
use tilegp_gp::{AdamParams, ErrorKind, KernelParams, TiledGp, TrainableParams};

fn init_logger() {
    let env = env_logger::Env::new().filter_or("TILEGP_LOG", "info");
    env_logger::Builder::from_env(env)
        .is_test(true)
        .try_init()
        .ok();
}

#[test]
fn test_cholesky_of_four_samples() {
    init_logger();
    let gp = TiledGp::new(
        array![[0.], [1.], [2.], [3.]],
        array![0., 1., 0., -1.],
        2,
        2,
        KernelParams::new(1., 1., 0.1),
        TrainableParams::default(),
    )
    .unwrap();
    let l = gp.cholesky().unwrap();
    let expected = Array2::from_shape_fn((4, 4), |(i, j)| {
        let d = i as f64 - j as f64;
        (-0.5 * d * d).exp() + if i == j { 0.1 } else { 0. }
    });
    assert_abs_diff_eq!(l.dot(&l.t()), expected, epsilon = 1e-12);
    for i in 0..4 {
        for j in i + 1..4 {
            assert_eq!(l[[i, j]], 0.);
        }
    }
}

#[test]
fn test_train_optimize_predict() {
    init_logger();
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let n_train = 64;
    let xt = Array2::random_using((n_train, 2), Uniform::new(-1., 1.), &mut rng);
    let f = |x: &Array2<f64>| -> Array1<f64> {
        x.map_axis(Axis(1), |row| (3. * row[0]).sin() * row[1].cos())
    };
    let yt = f(&xt);

    let n_tile_size = compute_train_tile_size(n_train, 4).unwrap();
    let mut gp = TiledGp::new(
        xt,
        yt,
        4,
        n_tile_size,
        KernelParams::new(1., 1., 0.1),
        TrainableParams::default(),
    )
    .unwrap();
    let adam = AdamParams::new()
        .learning_rate(0.1)
        .opt_iter(25)
        .check()
        .unwrap();
    let losses = gp.optimize(&adam).unwrap();
    assert!(losses.last().unwrap() < losses.first().unwrap());

    let xtest = Array::linspace(-0.8, 0.8, 24)
        .insert_axis(Axis(1))
        .broadcast((24, 2))
        .unwrap()
        .to_owned();
    let (m_tiles, m_tile_size) = compute_test_tiles(24, 4, n_tile_size).unwrap();
    assert_eq!((m_tiles, m_tile_size), (4, 6));
    let (mean, variance) = gp
        .predict_with_uncertainty(&xtest, m_tiles, m_tile_size)
        .unwrap();
    assert!(variance.iter().all(|v| *v >= 0.));
    let error = error_norm(&f(&xtest), &mean) / (24f64).sqrt();
    assert!(error < 0.3, "rms error {error}");
}

#[test]
fn test_error_kinds() {
    let err = TiledGp::new(
        array![[0.], [1.], [2.]],
        array![0., 1., 0.],
        2,
        2,
        KernelParams::new(1., 1., 0.1),
        TrainableParams::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    // duplicated samples without noise: the covariance is singular
    let gp = TiledGp::new(
        array![[0.], [0.], [1.], [1.]],
        array![0., 0., 1., 1.],
        2,
        2,
        KernelParams::new(1., 1., 0.),
        TrainableParams::default(),
    )
    .unwrap();
    let err = gp.calculate_loss().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Numerical);
}
