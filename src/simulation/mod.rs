pub mod loss;
pub mod trajectory;

pub use loss::{scalar_loss, true_loss};
pub use trajectory::{simulate_discrete, Trajectory};
