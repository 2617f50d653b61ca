//! Strategy registry: maps string identifiers to validated constructors.
//!
//! Built once and read concurrently by batch workers; construction never
//! mutates the registry.

use crate::error::ConfigError;

use super::baseline::{BuyAndHold, ConstantRebalanced, EqualWeight, BAH_INFO, CRP_INFO, EW_INFO};
use super::corn::{Corn, CornK, CornU, CORNK_INFO, CORNU_INFO, CORN_INFO};
use super::cwmr::{Cwmr, CWMR_INFO};
use super::dtc::{Dtc, DTC_INFO};
use super::follow_leader::{
    Bcrp, BestStock, FollowTheLeader, BCRP_INFO, BEST_STOCK_INFO, FTL_INFO, FTRL_INFO,
};
use super::momentum::{ExponentialGradient, UniversalPortfolio, EG_INFO, UP_INFO};
use super::olmar::{Olmar, OLMAR_INFO};
use super::pamr::{Pamr, PAMR_INFO};
use super::rmr::{Rmr, RMR_INFO};
use super::waeg::{Waeg, WAEG_INFO};
use super::{Strategy, StrategyInfo, StrategyParams};

/// Validates `params` for `n_assets` and returns fresh initial state.
pub type Constructor =
    fn(&StrategyParams, usize) -> Result<Box<dyn Strategy>, ConfigError>;

fn boxed<S: Strategy + 'static>(
    built: Result<S, ConfigError>,
) -> Result<Box<dyn Strategy>, ConfigError> {
    built.map(|s| Box::new(s) as Box<dyn Strategy>)
}

#[derive(Clone)]
pub struct StrategyRegistry {
    entries: Vec<(&'static StrategyInfo, Constructor)>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Every built-in strategy.
    pub fn standard() -> Self {
        let mut r = Self::empty();
        r.register(&EW_INFO, |p, n| boxed(EqualWeight::from_params(p, n)));
        r.register(&BAH_INFO, |p, n| boxed(BuyAndHold::from_params(p, n)));
        r.register(&CRP_INFO, |p, n| boxed(ConstantRebalanced::from_params(p, n)));
        r.register(&EG_INFO, |p, n| boxed(ExponentialGradient::from_params(p, n)));
        r.register(&UP_INFO, |p, n| boxed(UniversalPortfolio::from_params(p, n)));
        r.register(&WAEG_INFO, |p, n| boxed(Waeg::from_params(p, n)));
        r.register(&OLMAR_INFO, |p, n| boxed(Olmar::from_params(p, n)));
        r.register(&PAMR_INFO, |p, n| boxed(Pamr::from_params(p, n)));
        r.register(&CWMR_INFO, |p, n| boxed(Cwmr::from_params(p, n)));
        r.register(&RMR_INFO, |p, n| boxed(Rmr::from_params(p, n)));
        r.register(&DTC_INFO, |p, n| boxed(Dtc::from_params(p, n)));
        r.register(&CORN_INFO, |p, n| boxed(Corn::from_params(p, n)));
        r.register(&CORNK_INFO, |p, n| boxed(CornK::from_params(p, n)));
        r.register(&CORNU_INFO, |p, n| boxed(CornU::from_params(p, n)));
        r.register(&BCRP_INFO, |p, n| boxed(Bcrp::from_params(p, n)));
        r.register(&BEST_STOCK_INFO, |p, n| boxed(BestStock::from_params(p, n)));
        r.register(&FTL_INFO, |p, n| boxed(FollowTheLeader::ftl_from_params(p, n)));
        r.register(&FTRL_INFO, |p, n| boxed(FollowTheLeader::ftrl_from_params(p, n)));
        r
    }

    /// Adds a strategy, replacing any existing entry with the same id.
    pub fn register(&mut self, info: &'static StrategyInfo, constructor: Constructor) {
        match self.position(info.id) {
            Some(i) => self.entries[i] = (info, constructor),
            None => self.entries.push((info, constructor)),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(info, _)| info.id.eq_ignore_ascii_case(id))
    }

    /// Case-insensitive lookup.
    pub fn info(&self, id: &str) -> Option<&'static StrategyInfo> {
        self.position(id).map(|i| self.entries[i].0)
    }

    pub fn infos(&self) -> impl Iterator<Item = &'static StrategyInfo> + '_ {
        self.entries.iter().map(|(info, _)| *info)
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.infos().map(|info| info.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate `params` and build a strategy in its initial state.
    pub fn build(
        &self,
        id: &str,
        params: &StrategyParams,
        n_assets: usize,
    ) -> Result<Box<dyn Strategy>, ConfigError> {
        let i = self
            .position(id)
            .ok_or_else(|| ConfigError::UnknownStrategy(id.to_string()))?;
        (self.entries[i].1)(params, n_assets)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_has_every_strategy() {
        let r = StrategyRegistry::standard();
        assert_eq!(
            r.ids(),
            vec![
                "EW", "BAH", "CRP", "EG", "UP", "WAEG", "OLMAR", "PAMR", "CWMR", "RMR", "DTC",
                "CORN", "CORNK", "CORNU", "BCRP", "BestStock", "FTL", "FTRL"
            ]
        );
    }

    #[test]
    fn every_entry_builds_with_defaults() {
        let r = StrategyRegistry::standard();
        for id in r.ids() {
            let s = r.build(id, &StrategyParams::new(), 3).unwrap();
            assert_eq!(s.info().id, id);
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let r = StrategyRegistry::standard();
        assert_eq!(r.info("olmar").map(|i| i.id), Some("OLMAR"));
        assert!(r.build("beststock", &StrategyParams::new(), 2).is_ok());
    }

    #[test]
    fn unknown_strategy_is_an_error() {
        let r = StrategyRegistry::standard();
        assert!(matches!(
            r.build("NOPE", &StrategyParams::new(), 2),
            Err(ConfigError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn invalid_params_surface_from_build() {
        let r = StrategyRegistry::standard();
        let p = StrategyParams::new().with("epsilon", 0.5);
        assert!(matches!(
            r.build("RMR", &p, 3),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn register_replaces_same_id() {
        let mut r = StrategyRegistry::empty();
        r.register(&EW_INFO, |p, n| boxed(EqualWeight::from_params(p, n)));
        r.register(&EW_INFO, |p, n| boxed(EqualWeight::from_params(p, n)));
        assert_eq!(r.len(), 1);
    }
}
