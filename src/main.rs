use std::error::Error;

use nalgebra::{dmatrix, DMatrix, DVector};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lqr_control::control::{dlqr, lqr};
use lqr_control::simulation::{simulate_discrete, true_loss};
use lqr_control::utils::plot::{plot_loss, plot_paths, plot_states, plot_value_function};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Create output directory if it didnt exist
    std::fs::create_dir_all("./img")?;

    // three weakly coupled, slightly unstable nodes
    #[rustfmt::skip]
    let a = dmatrix![
        1.01, 0.01, 0.0;
        0.01, 1.01, 0.01;
        0.0, 0.01, 1.01
    ];
    let b = DMatrix::identity(3, 3);
    let q = DMatrix::identity(3, 3) * 1e-3;
    let r_cheap = DMatrix::identity(3, 3);
    let r_expensive = DMatrix::identity(3, 3) * 1000.0;
    let x0 = DVector::from_vec(vec![1.0, 0.0, -1.0]);
    let horizon = 100;

    let mut runs = Vec::new();
    for r in [&r_cheap, &r_expensive] {
        let solution = dlqr(&a, &b, &q, r)?;
        info!(
            control_weight = r[(0, 0)],
            stabilizing = solution.is_stabilizing(),
            "discrete LQR"
        );
        let trajectory = simulate_discrete(&a, &b, &solution.gain, &x0, horizon);
        plot_states(
            format!("img/states-r{}.svg", r[(0, 0)]),
            &trajectory.states,
            "State",
            r,
        )?;
        plot_states(
            format!("img/controls-r{}.svg", r[(0, 0)]),
            &trajectory.controls,
            "Control",
            r,
        )?;
        runs.push(trajectory);
    }
    plot_paths(
        "img/node1-paths.svg",
        &runs[0].state_series(0),
        &runs[1].state_series(0),
        "Node 1",
        &r_cheap,
        &r_expensive,
    )?;

    // continuous time counterpart x_dot = (A - I) x + u
    let continuous = lqr(&(&a - DMatrix::identity(3, 3)), &b, &q, &r_cheap)?;
    info!(
        eigenvalues = ?continuous.eigenvalues.as_slice(),
        stabilizing = continuous.is_stabilizing(),
        "continuous LQR"
    );

    // scalar system: the discounted optimal value s x^2 against the loss it
    // predicts, the discounted problem being the undiscounted one on
    // (sqrt(gamma) A, sqrt(gamma) B)
    let (sa, sb, sq, sr) = (dmatrix![0.9], dmatrix![1.0], dmatrix![1.0], dmatrix![1.0]);
    let (scalar_horizon, gamma): (usize, f64) = (50, 0.95);
    let scalar = dlqr(&(&sa * gamma.sqrt()), &(&sb * gamma.sqrt()), &sq, &sr)?;
    let s = scalar.riccati[(0, 0)];
    plot_value_function(
        "img/value-function.svg",
        |x| s * x * x,
        &sa,
        &sb,
        &sq,
        &sr,
        &scalar.gain,
        scalar_horizon,
        gamma,
        1.0,
        -1.0,
        1.0,
    )?;

    // gap between the truncated discounted loss and s x^2 at x = 1
    let x = DVector::from_vec(vec![1.0]);
    let gap = (0..=scalar_horizon)
        .map(|t| {
            true_loss(&sa, &sb, &sq, &sr, &scalar.gain, &x, t, gamma).map(|v| (v[0] - s).abs())
        })
        .collect::<Result<Vec<f64>, _>>()?;
    info!(final_gap = gap[scalar_horizon], "value function");
    plot_loss("img/loss.svg", &gap)?;

    Ok(())
}
