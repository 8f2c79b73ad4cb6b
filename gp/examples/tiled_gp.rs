use linfa::ParamGuard;
use ndarray::{concatenate, Array, Array2, Axis};
use tilegp_gp::metrics::error_norm;
use tilegp_gp::{AdamParams, KernelParams, TiledGp, TrainableParams};

fn xsinx(x: &Array2<f64>) -> Array2<f64> {
    (x - 3.5) * ((x - 3.5) / std::f64::consts::PI).mapv(|v| v.sin())
}

fn main() {
    let env = env_logger::Env::new().filter_or("TILEGP_LOG", "info");
    let builder = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stdout)
        .try_init();
    if builder.is_ok() {
        log::info!("TILEGP_LOG environment variable enabled");
    }

    let xt = Array::linspace(0., 25., 40).insert_axis(Axis(1));
    let yt = xsinx(&xt).column(0).to_owned();

    let mut gp = TiledGp::new(
        xt,
        yt,
        4,
        10,
        KernelParams::new(1., 1., 0.1),
        TrainableParams::default(),
    )
    .expect("GP built");
    println!("Initial {}", gp);

    let adam = AdamParams::new()
        .learning_rate(0.1)
        .opt_iter(50)
        .check()
        .expect("Adam settings");
    let losses = gp.optimize(&adam).expect("GP optimization");
    println!(
        "Loss {:.6} -> {:.6}",
        losses.first().unwrap(),
        losses.last().unwrap()
    );
    println!("Optimized {}", gp);

    let xtest = Array::linspace(0., 25., 26).insert_axis(Axis(1));
    let ytest = xsinx(&xtest).column(0).to_owned();
    let (ypred, yvar) = gp
        .predict_with_uncertainty(&xtest, 2, 13)
        .expect("GP prediction");

    println!("Prediction error norm: {}", error_norm(&ytest, &ypred));
    println!("Compute prediction errors (x, err(x), sigma(x))");
    println!(
        "{}",
        concatenate![
            Axis(1),
            xtest,
            (ypred - ytest).insert_axis(Axis(1)),
            yvar.mapv(f64::sqrt).insert_axis(Axis(1))
        ]
    );
}
