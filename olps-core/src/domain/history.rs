//! Causal view of the market up to the decision date.

/// Prices and price relatives for dates `0..=t`.
///
/// The orchestrator builds one per date by slicing the full matrix, so a
/// causal strategy structurally cannot read past its decision date.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    prices: &'a [Vec<f64>],
    relatives: &'a [Vec<f64>],
}

impl<'a> History<'a> {
    /// Both slices must have the same, non-zero length.
    pub fn new(prices: &'a [Vec<f64>], relatives: &'a [Vec<f64>]) -> Self {
        debug_assert_eq!(prices.len(), relatives.len());
        Self { prices, relatives }
    }

    /// Index of the decision date.
    pub fn t(&self) -> usize {
        self.prices.len().saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn n_assets(&self) -> usize {
        self.prices.first().map_or(0, Vec::len)
    }

    pub fn prices(&self) -> &'a [Vec<f64>] {
        self.prices
    }

    pub fn relatives(&self) -> &'a [Vec<f64>] {
        self.relatives
    }

    /// Price row at the decision date.
    pub fn latest_price(&self) -> &'a [f64] {
        self.prices.last().map_or(&[], Vec::as_slice)
    }

    /// Relative `price[t] / price[t-1]`; all ones at `t = 0`.
    pub fn latest_relative(&self) -> &'a [f64] {
        self.relatives.last().map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_accessors_track_slice_end() {
        let prices = vec![vec![1.0, 2.0], vec![2.0, 2.0]];
        let rel = vec![vec![1.0, 1.0], vec![2.0, 1.0]];
        let h = History::new(&prices, &rel);
        assert_eq!(h.t(), 1);
        assert_eq!(h.n_assets(), 2);
        assert_eq!(h.latest_price(), &[2.0, 2.0]);
        assert_eq!(h.latest_relative(), &[2.0, 1.0]);

        let early = History::new(&prices[..1], &rel[..1]);
        assert_eq!(early.t(), 0);
        assert_eq!(early.latest_relative(), &[1.0, 1.0]);
    }
}
