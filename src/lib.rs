pub mod control;
pub mod error;
pub mod simulation;
pub mod utils;

pub use error::{LqrError, Result};
