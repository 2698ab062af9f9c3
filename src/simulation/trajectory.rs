use nalgebra::{DMatrix, DVector};
use tracing::trace;

/// Closed loop rollout. Column `t` of `states` and `controls` holds the state
/// at step `t` and the action taken in that state.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// n x (T + 1)
    pub states: DMatrix<f64>,
    /// m x (T + 1)
    pub controls: DMatrix<f64>,
}

impl Trajectory {
    /// Number of transitions T
    pub fn horizon(&self) -> usize {
        self.states.ncols().saturating_sub(1)
    }

    pub fn state(&self, t: usize) -> DVector<f64> {
        self.states.column(t).clone_owned()
    }

    pub fn control(&self, t: usize) -> DVector<f64> {
        self.controls.column(t).clone_owned()
    }

    /// Time series of the `i`-th state component
    pub fn state_series(&self, i: usize) -> Vec<f64> {
        self.states.row(i).iter().copied().collect()
    }

    /// Time series of the `i`-th control component
    pub fn control_series(&self, i: usize) -> Vec<f64> {
        self.controls.row(i).iter().copied().collect()
    }
}

/// Simulates the linear system `(A, B)` with the static control law
/// `u(t) = -K x(t)` from `x0` for `horizon` time steps.
///
/// # Panics
/// If the shapes of `A`, `B`, `K` and `x0` are inconsistent.
pub fn simulate_discrete(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    k: &DMatrix<f64>,
    x0: &DVector<f64>,
    horizon: usize,
) -> Trajectory {
    let n = x0.len();
    let m = k.nrows();
    assert!(a.is_square());
    assert_eq!(a.nrows(), n);
    assert_eq!(b.shape(), (n, m));
    assert_eq!(k.ncols(), n);

    let mut states = DMatrix::zeros(n, horizon + 1);
    let mut controls = DMatrix::zeros(m, horizon + 1);

    let mut x = x0.clone();
    let mut u = -(k * &x);
    states.set_column(0, &x);
    controls.set_column(0, &u);

    for t in 1..=horizon {
        x = a * &x + b * &u;
        u = -(k * &x);
        states.set_column(t, &x);
        controls.set_column(t, &u);
        trace!(t, state_norm = x.norm(), "closed loop step");
    }

    Trajectory { states, controls }
}
