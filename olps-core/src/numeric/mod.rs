//! Numeric primitives shared by every strategy.

pub mod linalg;
pub mod median;
pub mod optimize;
pub mod safe;
pub mod simplex;
pub mod stats;

pub use optimize::{maximize_log_wealth, SolverOutcome, SolverSettings};
pub use simplex::{finalize, project_euclidean, uniform, Projection};
