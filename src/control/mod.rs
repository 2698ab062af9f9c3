pub mod lqr;
pub mod riccati;
pub mod stability;

pub use lqr::{dlqr, dlqr_with, lqr, lqr_with, LinearModel, LinearSystem, LqrSolution, TimeDomain};
pub use riccati::{
    care_residual, dare_residual, solve_continuous_are, solve_discrete_are, RiccatiMethod,
    RiccatiOptions,
};
pub use stability::{closed_loop_eigenvalues, is_stable_continuous, is_stable_discrete};
