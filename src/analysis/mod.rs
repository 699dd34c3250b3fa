// src/analysis/mod.rs - Report tables built from the aggregation pipeline
use serde::Serialize;

use crate::pipeline::aggregator::GroupAggregate;
use crate::pipeline::ranker::Ranked;

pub mod client_analysis;
pub mod partner_analysis;

/// Aggregate column names shared by the analyses and the renderers.
pub mod columns {
    pub const CLIENTS: &str = "clients";
    pub const HOLDINGS: &str = "holdings";
    pub const NET_WORTH: &str = "net_worth";
    pub const BROKERAGE: &str = "brokerage";
    pub const NET_PL: &str = "net_pl";
    pub const AGE: &str = "age";
    pub const ACTIVE: &str = "active";
    pub const EQUITY: &str = "equity";
    pub const MF_BOND: &str = "mf_bond";
    pub const EQUITY_PCT: &str = "equity_pct";
    pub const MF_BOND_PCT: &str = "mf_bond_pct";
    pub const ANNUAL_REVENUE: &str = "annual_revenue";
    pub const LIFETIME_VALUE: &str = "lifetime_value";
    pub const PARTNERS_WITH_CLIENTS: &str = "partners_with_clients";
}

/// Owned copy of a ranked group, kept in the analysis output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking<K> {
    pub group: GroupAggregate<K>,
    pub metric: f64,
}

pub(crate) fn owned<K: Clone>(ranked: Vec<Ranked<'_, K>>) -> Vec<Ranking<K>> {
    ranked
        .into_iter()
        .map(|r| Ranking {
            group: r.group.clone(),
            metric: r.metric,
        })
        .collect()
}
