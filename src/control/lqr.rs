use nalgebra::{Complex, DMatrix, DVector};
use tracing::debug;

use crate::control::riccati::{
    care_residual, check_problem, dare_residual, solve_continuous_are, solve_discrete_are,
    RiccatiOptions,
};
use crate::control::stability::{
    closed_loop_eigenvalues, is_stable_continuous, is_stable_discrete,
};
use crate::error::{LqrError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeDomain {
    Continuous,
    Discrete,
}

#[derive(Debug, Clone)]
pub struct LqrSolution {
    /// Feedback gain, u = -K x
    pub gain: DMatrix<f64>,
    /// Solution of the algebraic Riccati equation
    pub riccati: DMatrix<f64>,
    /// Eigenvalues of A - BK
    pub eigenvalues: DVector<Complex<f64>>,
    pub domain: TimeDomain,
}

impl LqrSolution {
    pub fn control(&self, x: &DVector<f64>) -> DVector<f64> {
        -(&self.gain * x)
    }

    pub fn is_stabilizing(&self) -> bool {
        match self.domain {
            TimeDomain::Continuous => is_stable_continuous(&self.eigenvalues),
            TimeDomain::Discrete => is_stable_discrete(&self.eigenvalues),
        }
    }
}

pub trait LinearModel {
    fn a(&self) -> &DMatrix<f64>;
    fn b(&self) -> &DMatrix<f64>;
    fn q(&self) -> &DMatrix<f64>;
    fn r(&self) -> &DMatrix<f64>;

    fn step(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        self.a() * x + self.b() * u
    }

    fn lqr(&self) -> Result<LqrSolution> {
        lqr(self.a(), self.b(), self.q(), self.r())
    }

    fn dlqr(&self) -> Result<LqrSolution> {
        dlqr(self.a(), self.b(), self.q(), self.r())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    q: DMatrix<f64>,
    r: DMatrix<f64>,
}

impl LinearSystem {
    pub fn new(
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        q: DMatrix<f64>,
        r: DMatrix<f64>,
    ) -> Result<LinearSystem> {
        check_problem(&a, &b, &q, &r)?;
        Ok(LinearSystem { a, b, q, r })
    }

    /// Forward Euler discretization: A_d = I + dt A, B_d = dt B
    pub fn euler_discretized(&self, dt: f64) -> LinearSystem {
        let n = self.a.nrows();
        LinearSystem {
            a: DMatrix::identity(n, n) + &self.a * dt,
            b: &self.b * dt,
            q: self.q.clone(),
            r: self.r.clone(),
        }
    }

    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    pub fn input_dim(&self) -> usize {
        self.b.ncols()
    }
}

impl LinearModel for LinearSystem {
    fn a(&self) -> &DMatrix<f64> {
        &self.a
    }
    fn b(&self) -> &DMatrix<f64> {
        &self.b
    }
    fn q(&self) -> &DMatrix<f64> {
        &self.q
    }
    fn r(&self) -> &DMatrix<f64> {
        &self.r
    }
}

/// Optimal infinite horizon, continuous time LQR controller for the system
/// `(A, B)` and the cost parameterized by `(Q, R)`.
pub fn lqr(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<LqrSolution> {
    lqr_with(a, b, q, r, &RiccatiOptions::default())
}

pub fn lqr_with(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    options: &RiccatiOptions,
) -> Result<LqrSolution> {
    let s = solve_continuous_are(a, b, q, r, options)?;

    // K = R^-1 B'S
    let r_inv = r.clone().try_inverse().ok_or(LqrError::Singular("R"))?;
    let k = r_inv * b.transpose() * &s;

    let eigenvalues = closed_loop_eigenvalues(a, b, &k);
    let residual = care_residual(a, b, q, r, &s)?.norm();
    debug!(residual, "continuous LQR gain computed");
    Ok(LqrSolution {
        gain: k,
        riccati: s,
        eigenvalues,
        domain: TimeDomain::Continuous,
    })
}

/// Optimal infinite horizon, discrete time LQR controller for the system
/// `(A, B)` and the cost parameterized by `(Q, R)`.
pub fn dlqr(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<LqrSolution> {
    dlqr_with(a, b, q, r, &RiccatiOptions::default())
}

pub fn dlqr_with(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    options: &RiccatiOptions,
) -> Result<LqrSolution> {
    let s = solve_discrete_are(a, b, q, r, options)?;

    // F = (B'SB + R)^-1 B'SA
    let bt_s = b.transpose() * &s;
    let f = (&bt_s * b + r)
        .try_inverse()
        .ok_or(LqrError::Singular("B'SB + R"))?
        * (&bt_s * a);

    let eigenvalues = closed_loop_eigenvalues(a, b, &f);
    let residual = dare_residual(a, b, q, r, &s)?.norm();
    debug!(residual, "discrete LQR gain computed");
    Ok(LqrSolution {
        gain: f,
        riccati: s,
        eigenvalues,
        domain: TimeDomain::Discrete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::dmatrix;

    /// [x, x_dot, theta, theta_dot]
    fn inverted_pendulum() -> LinearSystem {
        let l_bar = 2.0; // length of bar
        let mass_cart = 1.0; // [kg]
        let mass_ball = 0.3; // [kg]
        let g = 9.8; // [m/s^2]

        #[rustfmt::skip]
        let a = dmatrix![
            0.0, 1.0, 0.0, 0.0;
            0.0, 0.0, mass_ball * g / mass_cart, 0.0;
            0.0, 0.0, 0.0, 1.0;
            0.0, 0.0, g * (mass_cart + mass_ball) / (l_bar * mass_cart), 0.0
        ];
        let b = dmatrix![0.0; 1.0 / mass_cart; 0.0; 1.0 / (l_bar * mass_cart)];
        let q = DMatrix::from_diagonal(&DVector::from_vec(vec![10.0, 1.0, 10.0, 1.0]));
        let r = dmatrix![0.01];
        LinearSystem::new(a, b, q, r).unwrap()
    }

    #[test]
    fn continuous_double_integrator() -> Result<()> {
        let a = dmatrix![0.0, 1.0;
                         0.0, 0.0];
        let b = dmatrix![0.0;
                         1.0];
        let q = DMatrix::identity(2, 2);
        let r = dmatrix![1.0];
        let solution = lqr(&a, &b, &q, &r)?;

        assert_abs_diff_eq!(solution.gain, dmatrix![1.0, 3.0_f64.sqrt()], epsilon = 1e-8);
        assert_eq!(solution.domain, TimeDomain::Continuous);
        assert!(solution.is_stabilizing());
        Ok(())
    }

    #[test]
    fn continuous_pendulum_is_stabilized() -> Result<()> {
        let model = inverted_pendulum();
        let solution = model.lqr()?;
        assert_eq!(solution.eigenvalues.len(), 4);
        assert!(solution.eigenvalues.iter().all(|lambda| lambda.re < 0.0));

        let residual = care_residual(model.a(), model.b(), model.q(), model.r(), &solution.riccati)?;
        assert_abs_diff_eq!(residual.norm() / solution.riccati.norm(), 0.0, epsilon = 1e-8);
        Ok(())
    }

    #[test]
    fn discrete_pendulum_is_stabilized() -> Result<()> {
        let model = inverted_pendulum().euler_discretized(0.01);
        let solution = model.dlqr()?;
        assert_eq!(solution.domain, TimeDomain::Discrete);
        assert!(solution.eigenvalues.iter().all(|lambda| lambda.norm_sqr() < 1.0));
        assert!(solution.is_stabilizing());

        let residual = dare_residual(model.a(), model.b(), model.q(), model.r(), &solution.riccati)?;
        assert_abs_diff_eq!(residual.norm() / solution.riccati.norm(), 0.0, epsilon = 1e-8);
        Ok(())
    }

    #[test]
    fn discrete_scalar_gain() -> Result<()> {
        let a = dmatrix![0.9];
        let one = dmatrix![1.0];
        let solution = dlqr(&a, &one, &one, &one)?;
        let s = solution.riccati[(0, 0)];
        assert_abs_diff_eq!(solution.gain[(0, 0)], 0.9 * s / (s + 1.0), epsilon = 1e-12);
        assert_abs_diff_eq!(
            solution.eigenvalues[0].re,
            0.9 - solution.gain[(0, 0)],
            epsilon = 1e-12
        );
        Ok(())
    }

    /// Unstable second mode that Q does not penalize
    fn unpenalized_mode(a_stable: f64, a_unstable: f64) -> LinearSystem {
        LinearSystem::new(
            dmatrix![a_stable, 0.0; 0.0, a_unstable],
            dmatrix![1.0; 1.0],
            dmatrix![1.0, 0.0; 0.0, 0.0],
            dmatrix![1.0],
        )
        .unwrap()
    }

    #[test]
    fn discrete_semidefinite_state_weight_is_stabilized() -> Result<()> {
        let (a, one, zero) = (dmatrix![2.0], dmatrix![1.0], dmatrix![0.0]);
        let solution = dlqr(&a, &one, &zero, &one)?;
        assert_abs_diff_eq!(solution.riccati[(0, 0)], 3.0, epsilon = 1e-9);
        // F = 2 * 3 / (1 + 3)
        assert_abs_diff_eq!(solution.gain[(0, 0)], 1.5, epsilon = 1e-9);
        assert!(solution.is_stabilizing());

        let model = unpenalized_mode(0.5, 1.5);
        let solution = model.dlqr()?;
        assert!(solution.is_stabilizing());
        let residual = dare_residual(model.a(), model.b(), model.q(), model.r(), &solution.riccati)?;
        assert_abs_diff_eq!(residual.norm(), 0.0, epsilon = 1e-8);
        Ok(())
    }

    #[test]
    fn continuous_semidefinite_state_weight_is_stabilized() -> Result<()> {
        let (one, zero) = (dmatrix![1.0], dmatrix![0.0]);
        let solution = lqr(&one, &one, &zero, &one)?;
        assert_abs_diff_eq!(solution.gain[(0, 0)], 2.0, epsilon = 1e-9);
        assert!(solution.is_stabilizing());

        let model = unpenalized_mode(-1.0, 2.0);
        let solution = model.lqr()?;
        assert!(solution.is_stabilizing());
        let residual = care_residual(model.a(), model.b(), model.q(), model.r(), &solution.riccati)?;
        assert_abs_diff_eq!(residual.norm(), 0.0, epsilon = 1e-8);
        Ok(())
    }

    #[test]
    fn control_law_is_negative_feedback() -> Result<()> {
        let one = dmatrix![1.0];
        let solution = lqr(&one, &one, &one, &one)?;
        let x = DVector::from_vec(vec![2.0]);
        assert_abs_diff_eq!(
            solution.control(&x)[0],
            -2.0 * (1.0 + 2.0_f64.sqrt()),
            epsilon = 1e-9
        );
        Ok(())
    }

    #[test]
    fn step_applies_dynamics() {
        let model = LinearSystem::new(
            dmatrix![1.0, 0.1; 0.0, 1.0],
            dmatrix![0.0; 0.1],
            DMatrix::identity(2, 2),
            dmatrix![1.0],
        )
        .unwrap();
        let x = model.step(&DVector::from_vec(vec![1.0, 2.0]), &DVector::from_vec(vec![3.0]));
        assert_abs_diff_eq!(x, DVector::from_vec(vec![1.2, 2.3]), epsilon = 1e-12);
        assert_eq!(model.state_dim(), 2);
        assert_eq!(model.input_dim(), 1);
    }

    #[test]
    fn rejects_bad_weights() {
        let err = LinearSystem::new(
            DMatrix::identity(2, 2),
            dmatrix![0.0; 1.0],
            DMatrix::identity(3, 3),
            dmatrix![1.0],
        )
        .unwrap_err();
        assert!(matches!(err, LqrError::DimensionMismatch { matrix: "Q", .. }));
    }
}
