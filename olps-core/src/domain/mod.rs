//! Domain types: the price matrix and the causal history view over it.

pub mod history;
pub mod price_matrix;

pub use history::History;
pub use price_matrix::PriceMatrix;
