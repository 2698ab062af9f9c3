use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::control::stability::{
    closed_loop_eigenvalues, is_stable_continuous, is_stable_discrete,
};
use crate::error::{LqrError, Result};

const SIGN_FUNCTION: &str = "matrix sign function";
const RICCATI_FLOW: &str = "Riccati differential equation";
const VALUE_ITERATION: &str = "Riccati value iteration";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiccatiMethod {
    /// Matrix sign function of the Hamiltonian (continuous) or of the Cayley
    /// transformed symplectic pencil (discrete). Converges quadratically.
    Direct,
    /// Euler integration of the Riccati differential equation (continuous) or
    /// Riccati value iteration (discrete), both started from P = Q. Only
    /// reaches the stabilizing solution when (Q, A) is detectable.
    Iterative,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiccatiOptions {
    pub method: RiccatiMethod,
    pub max_iter: usize,
    pub tolerance: f64,
    /// Euler step, only used by the continuous iterative method
    pub step: f64,
}

impl Default for RiccatiOptions {
    fn default() -> Self {
        RiccatiOptions {
            method: RiccatiMethod::Direct,
            max_iter: 100,
            tolerance: 1e-10,
            step: 1e-3,
        }
    }
}

impl RiccatiOptions {
    pub fn iterative() -> Self {
        RiccatiOptions {
            method: RiccatiMethod::Iterative,
            max_iter: 100_000,
            tolerance: 1e-10,
            step: 1e-3,
        }
    }
}

pub(crate) fn check_shape(
    matrix: &'static str,
    m: &DMatrix<f64>,
    expected: (usize, usize),
) -> Result<()> {
    if m.shape() != expected {
        return Err(LqrError::DimensionMismatch {
            matrix,
            expected,
            found: m.shape(),
        });
    }
    Ok(())
}

/// Checks `A: n x n`, `B: n x m`, `Q: n x n`, `R: m x m` and returns `(n, m)`
pub(crate) fn check_problem(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<(usize, usize)> {
    let n = a.nrows();
    let m = b.ncols();
    check_shape("A", a, (n, n))?;
    check_shape("B", b, (n, m))?;
    check_shape("Q", q, (n, n))?;
    check_shape("R", r, (m, m))?;
    Ok((n, m))
}

fn symmetrize(p: DMatrix<f64>) -> DMatrix<f64> {
    (&p + p.transpose()) * 0.5
}

/// Continuous time Algebraic Riccati Equation (CARE)
///
/// Returns the stabilizing solution `S` of `A'S + SA - SBR^-1B'S + Q = 0`, or
/// `NotStabilizing` when the chosen method settles on another solution.
pub fn solve_continuous_are(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    options: &RiccatiOptions,
) -> Result<DMatrix<f64>> {
    check_problem(a, b, q, r)?;
    let r_inv = r.clone().try_inverse().ok_or(LqrError::Singular("R"))?;
    let g = b * &r_inv * b.transpose();
    let (s, method) = match options.method {
        RiccatiMethod::Direct => (care_sign_function(a, &g, q, options)?, SIGN_FUNCTION),
        RiccatiMethod::Iterative => (care_euler(a, &g, q, options)?, RICCATI_FLOW),
    };

    let k = r_inv * b.transpose() * &s;
    if !is_stable_continuous(&closed_loop_eigenvalues(a, b, &k)) {
        return Err(LqrError::NotStabilizing { method });
    }
    Ok(s)
}

/// Discrete time Algebraic Riccati Equation (DARE)
///
/// Returns the stabilizing solution `S` of
/// `S = A'SA - A'SB(R + B'SB)^-1B'SA + Q`, or `NotStabilizing` when the chosen
/// method settles on another solution.
pub fn solve_discrete_are(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    options: &RiccatiOptions,
) -> Result<DMatrix<f64>> {
    check_problem(a, b, q, r)?;
    let (s, method) = match options.method {
        RiccatiMethod::Direct => (dare_sign_function(a, b, q, r, options)?, SIGN_FUNCTION),
        RiccatiMethod::Iterative => (
            dare_value_iteration(a, b, q, r, options)?,
            VALUE_ITERATION,
        ),
    };

    let bt_s = b.transpose() * &s;
    let f = (r + &bt_s * b)
        .try_inverse()
        .ok_or(LqrError::Singular("R + B'SB"))?
        * (&bt_s * a);
    if !is_stable_discrete(&closed_loop_eigenvalues(a, b, &f)) {
        return Err(LqrError::NotStabilizing { method });
    }
    Ok(s)
}

/// `A'S + SA - SBR^-1B'S + Q`
pub fn care_residual(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    s: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    let r_inv = r.clone().try_inverse().ok_or(LqrError::Singular("R"))?;
    Ok(a.transpose() * s + s * a - s * b * r_inv * b.transpose() * s + q)
}

/// `A'SA - A'SB(R + B'SB)^-1B'SA + Q - S`
pub fn dare_residual(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    s: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    let at = a.transpose();
    let inner = (r + b.transpose() * s * b)
        .try_inverse()
        .ok_or(LqrError::Singular("R + B'SB"))?;
    Ok(&at * s * a - &at * s * b * inner * b.transpose() * s * a + q - s)
}

/// Solves `(sign(Z) + I)[I; S] = 0` for `S`, where `[I; S]` spans the
/// invariant subspace of `Z` (2n x 2n) belonging to its eigenvalues in the open
/// left half plane.
fn stable_subspace(mut z: DMatrix<f64>, options: &RiccatiOptions) -> Result<DMatrix<f64>> {
    let dim = z.nrows();
    let n = dim / 2;

    let mut converged = false;
    for i in 0..options.max_iter {
        let z_inv = z
            .clone()
            .try_inverse()
            .ok_or(LqrError::Singular("sign function iterate"))?;
        // determinant scaling
        let det = z.determinant().abs();
        let c = if det.is_normal() {
            det.powf(-1.0 / dim as f64)
        } else {
            1.0
        };
        let next = (&z * c + z_inv * (1.0 / c)) * 0.5;
        let delta = (&next - &z).norm();
        z = next;
        if !delta.is_finite() {
            return Err(LqrError::NoConvergence {
                method: SIGN_FUNCTION,
                iterations: i + 1,
            });
        }
        if delta <= options.tolerance * z.norm() {
            debug!(iterations = i + 1, "matrix sign function converged");
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(LqrError::NoConvergence {
            method: SIGN_FUNCTION,
            iterations: options.max_iter,
        });
    }

    let identity = DMatrix::<f64>::identity(n, n);
    let w11 = z.view((0, 0), (n, n)).clone_owned();
    let w12 = z.view((0, n), (n, n)).clone_owned();
    let w21 = z.view((n, 0), (n, n)).clone_owned();
    let w22 = z.view((n, n), (n, n)).clone_owned();

    let mut lhs = DMatrix::<f64>::zeros(dim, n);
    lhs.view_mut((0, 0), (n, n)).copy_from(&w12);
    lhs.view_mut((n, 0), (n, n)).copy_from(&(w22 + &identity));

    let mut rhs = DMatrix::<f64>::zeros(dim, n);
    rhs.view_mut((0, 0), (n, n)).copy_from(&(-(w11 + &identity)));
    rhs.view_mut((n, 0), (n, n)).copy_from(&(-w21));

    let s = lhs
        .svd(true, true)
        .solve(&rhs, 1e-12)
        .map_err(LqrError::LeastSquares)?;
    Ok(symmetrize(s))
}

fn care_sign_function(
    a: &DMatrix<f64>,
    g: &DMatrix<f64>,
    q: &DMatrix<f64>,
    options: &RiccatiOptions,
) -> Result<DMatrix<f64>> {
    let n = a.nrows();

    // Hamiltonian
    // [ A  -G ]
    // [-Q  -A']
    let mut z = DMatrix::<f64>::zeros(2 * n, 2 * n);
    z.view_mut((0, 0), (n, n)).copy_from(a);
    z.view_mut((0, n), (n, n)).copy_from(&(-g));
    z.view_mut((n, 0), (n, n)).copy_from(&(-q));
    z.view_mut((n, n), (n, n)).copy_from(&(-a.transpose()));
    stable_subspace(z, options)
}

fn dare_sign_function(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    options: &RiccatiOptions,
) -> Result<DMatrix<f64>> {
    let n = a.nrows();
    let r_inv = r.clone().try_inverse().ok_or(LqrError::Singular("R"))?;
    let g = b * r_inv * b.transpose();

    // Symplectic pencil L - lambda N, deflating subspace [I; S] for the
    // closed loop eigenvalues inside the unit circle.
    // L = [ A  0 ]    N = [ I  G  ]
    //     [-Q  I ]        [ 0  A' ]
    // The Cayley transform (L + N)^-1 (L - N) maps them to the left half plane
    // and keeps the subspace. A may be singular.
    let mut l = DMatrix::<f64>::identity(2 * n, 2 * n);
    l.view_mut((0, 0), (n, n)).copy_from(a);
    l.view_mut((n, 0), (n, n)).copy_from(&(-q));

    let mut m = DMatrix::<f64>::identity(2 * n, 2 * n);
    m.view_mut((0, n), (n, n)).copy_from(&g);
    m.view_mut((n, n), (n, n)).copy_from(&a.transpose());

    let z = (&l + &m)
        .try_inverse()
        .ok_or(LqrError::Singular("L + N"))?
        * (&l - &m);
    stable_subspace(z, options)
}

fn care_euler(
    a: &DMatrix<f64>,
    g: &DMatrix<f64>,
    q: &DMatrix<f64>,
    options: &RiccatiOptions,
) -> Result<DMatrix<f64>> {
    let at = a.transpose();
    let mut p = q.clone();
    for i in 0..options.max_iter {
        let p_dot = &p * a + &at * &p - &p * g * &p + q;
        let next = &p + p_dot * options.step;
        let delta = (&next - &p).norm();
        p = next;
        if !delta.is_finite() {
            return Err(LqrError::NoConvergence {
                method: RICCATI_FLOW,
                iterations: i + 1,
            });
        }
        if delta < options.tolerance {
            debug!(iterations = i + 1, "Riccati differential equation converged");
            return Ok(symmetrize(p));
        }
    }
    Err(LqrError::NoConvergence {
        method: RICCATI_FLOW,
        iterations: options.max_iter,
    })
}

fn dare_value_iteration(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    options: &RiccatiOptions,
) -> Result<DMatrix<f64>> {
    let at = a.transpose();
    let bt = b.transpose();

    let mut p = q.clone();
    for i in 0..options.max_iter {
        let inner = (r + &bt * &p * b)
            .try_inverse()
            .ok_or(LqrError::Singular("R + B'PB"))?;
        let pn = &at * &p * a - &at * &p * b * inner * &bt * &p * a + q;
        let delta = (&pn - &p).abs().max();
        p = pn;
        if !delta.is_finite() {
            return Err(LqrError::NoConvergence {
                method: VALUE_ITERATION,
                iterations: i + 1,
            });
        }
        if delta < options.tolerance {
            debug!(iterations = i + 1, "Riccati value iteration converged");
            return Ok(symmetrize(p));
        }
    }
    Err(LqrError::NoConvergence {
        method: VALUE_ITERATION,
        iterations: options.max_iter,
    })
}
