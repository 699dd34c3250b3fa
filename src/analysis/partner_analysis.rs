// src/analysis/partner_analysis.rs - Partner book profile joined from client records
use log::debug;
use serde::Serialize;

use super::columns::*;
use super::{owned, Ranking};
use crate::analysis::client_analysis::Bin;
use crate::models::client::{is_known, ClientRecord};
use crate::models::partner::PartnerRecord;
use crate::pipeline::aggregator::{aggregate, GroupAggregate, Measure};
use crate::pipeline::derived::guarded_pct;
use crate::pipeline::ranker::{per_unit, rate, top_n_by, top_n_records};
use crate::utils::config::AnalysisConfig;
use crate::utils::constants::{
    AGGRESSIVE_EQUITY_PCT, CONSERVATIVE_MF_BOND_PCT, DIVERSE_CATEGORY_COUNT, PARTNER_TOP_STATES,
    SPECIALIST_CATEGORIES, SPECIALIST_SHARE,
};

mod client_fields {
    use crate::models::client::ClientRecord;

    pub fn holdings(c: &ClientRecord) -> f64 {
        c.holdings
    }
    pub fn brokerage(c: &ClientRecord) -> f64 {
        c.brokerage
    }
    pub fn equity(c: &ClientRecord) -> f64 {
        c.equity
    }
    pub fn mf_bond(c: &ClientRecord) -> f64 {
        c.mf_bond
    }
}

mod partner_fields {
    use super::PartnerProfile;

    pub fn clients(p: &PartnerProfile) -> f64 {
        p.metrics.map_or(0.0, |m| m.client_count as f64)
    }
    pub fn holdings(p: &PartnerProfile) -> f64 {
        p.metrics.map_or(0.0, |m| m.total_holdings)
    }
    pub fn equity(p: &PartnerProfile) -> f64 {
        p.metrics.map_or(0.0, |m| m.total_equity)
    }
    pub fn mf_bond(p: &PartnerProfile) -> f64 {
        p.metrics.map_or(0.0, |m| m.total_mf_bond)
    }
    pub fn equity_pct(p: &PartnerProfile) -> f64 {
        p.metrics.map_or(0.0, |m| m.equity_pct)
    }
    pub fn mf_bond_pct(p: &PartnerProfile) -> f64 {
        p.metrics.map_or(0.0, |m| m.mf_bond_pct)
    }
    pub fn with_clients(p: &PartnerProfile) -> f64 {
        if p.metrics.is_some() {
            1.0
        } else {
            0.0
        }
    }
}

/// Client-side totals for one partner code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PartnerMetrics {
    pub client_count: usize,
    pub total_holdings: f64,
    pub avg_holdings: f64,
    pub total_brokerage: f64,
    pub total_equity: f64,
    pub total_mf_bond: f64,
    pub equity_pct: f64,
    pub mf_bond_pct: f64,
}

impl PartnerMetrics {
    fn from_group<K>(group: &GroupAggregate<K>) -> Self {
        let total_holdings = group.sum(HOLDINGS);
        let total_equity = group.sum(EQUITY);
        let total_mf_bond = group.sum(MF_BOND);
        Self {
            client_count: group.count,
            total_holdings,
            avg_holdings: group.mean(HOLDINGS),
            total_brokerage: group.sum(BROKERAGE),
            total_equity,
            total_mf_bond,
            equity_pct: guarded_pct(total_equity, total_holdings),
            mf_bond_pct: guarded_pct(total_mf_bond, total_holdings),
        }
    }
}

/// A partner sheet row left-joined with its client metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerProfile<'a> {
    pub partner: &'a PartnerRecord,
    /// `None` when no categorised client maps to the partner.
    pub metrics: Option<PartnerMetrics>,
    /// Size segment from the declared client count.
    pub segment: Bin,
    /// Portfolio type from the equity share; `None` without metrics.
    pub portfolio_type: Bin,
    /// Distinct client categories served.
    pub category_diversity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPartner<'a> {
    pub profile: PartnerProfile<'a>,
    pub metric: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartnerOverview {
    pub total_partners: usize,
    pub partners_with_clients: usize,
    pub categorised_clients: usize,
    pub clients_mapped: usize,
    pub holdings_mapped: f64,
    pub total_equity: f64,
    pub total_mf_bond: f64,
    pub equity_share: f64,
    pub mf_bond_share: f64,
    pub avg_equity_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialistRow<'a> {
    pub partner_code: &'a str,
    pub state: &'a str,
    pub total_clients: usize,
    pub category_clients: usize,
    pub category_pct: f64,
    pub declared_holdings: f64,
}

/// Partners where one category holds more than half of their clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialistGroup<'a> {
    pub category: &'a str,
    pub partner_count: usize,
    pub top: Vec<SpecialistRow<'a>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerInsights<'a> {
    pub aggressive: usize,
    pub conservative: usize,
    pub diverse: usize,
    /// Largest category by holdings and its share of categorised clients.
    pub dominant_category: Option<(&'a str, f64)>,
    pub largest_segment_equity: Option<f64>,
    pub smallest_segment_equity: Option<f64>,
    pub top_states: Vec<Ranking<&'a str>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerAnalysis<'a> {
    pub overview: PartnerOverview,
    pub profiles: Vec<PartnerProfile<'a>>,
    pub segments: Vec<GroupAggregate<Bin>>,
    pub categories: Vec<Ranking<&'a str>>,
    pub most_diverse: Vec<RankedPartner<'a>>,
    pub portfolio_types: Vec<GroupAggregate<Bin>>,
    pub top_equity: Vec<RankedPartner<'a>>,
    pub top_mf_bond: Vec<RankedPartner<'a>>,
    pub segment_allocation: Vec<GroupAggregate<Bin>>,
    pub specialists: Vec<SpecialistGroup<'a>>,
    pub insights: PartnerInsights<'a>,
}

/// Average equity share over the partners of a group that have clients.
pub fn avg_equity_pct<K>(group: &GroupAggregate<K>) -> Option<f64> {
    let with_clients = group.sum(PARTNERS_WITH_CLIENTS) as usize;
    if with_clients == 0 {
        return None;
    }
    Some(per_unit(group.sum(EQUITY_PCT), with_clients))
}

pub fn analyze_partners<'a>(
    clients: &'a [ClientRecord],
    partners: &'a [PartnerRecord],
    config: &AnalysisConfig,
) -> PartnerAnalysis<'a> {
    let categorised: Vec<&'a ClientRecord> = clients
        .iter()
        .filter(|c| is_known(&c.client_category))
        .collect();
    debug!(
        "{} of {} clients carry a category",
        categorised.len(),
        clients.len()
    );

    let client_measures: [Measure<ClientRecord>; 6] = [
        Measure::count(CLIENTS),
        Measure::sum(HOLDINGS, client_fields::holdings),
        Measure::mean(HOLDINGS, client_fields::holdings),
        Measure::sum(BROKERAGE, client_fields::brokerage),
        Measure::sum(EQUITY, client_fields::equity),
        Measure::sum(MF_BOND, client_fields::mf_bond),
    ];

    let by_partner = aggregate(
        categorised.iter().copied(),
        |c: &'a ClientRecord| c.branch_code.as_str(),
        &client_measures,
    );
    let by_partner_category = aggregate(
        categorised.iter().copied(),
        |c: &'a ClientRecord| (c.branch_code.as_str(), c.client_category.as_str()),
        &client_measures,
    );

    let profiles = join_profiles(partners, &by_partner, &by_partner_category, config);
    let categories = owned(top_n_by(
        &aggregate(
            categorised.iter().copied(),
            |c: &'a ClientRecord| c.client_category.as_str(),
            &client_measures,
        ),
        |g| g.sum(HOLDINGS),
        usize::MAX,
    ));

    let n = config.top_n.partners;
    let with_metrics = || profiles.iter().filter(|p| p.metrics.is_some());
    let partner_key = |p: &PartnerProfile<'a>| p.partner.partner_code.as_str();

    let segments = profile_table(profiles.iter().filter(|p| p.segment.is_some()), |p| p.segment);
    let insights = insights(&profiles, &segments, &categories, categorised.len());

    PartnerAnalysis {
        overview: overview(&profiles, categorised.len()),
        most_diverse: ranked(top_n_records(
            &profiles,
            partner_key,
            |p| p.category_diversity as f64,
            n,
        )),
        portfolio_types: profile_table(
            profiles.iter().filter(|p| p.portfolio_type.is_some()),
            |p| p.portfolio_type,
        ),
        top_equity: ranked(top_n_records(
            with_metrics(),
            partner_key,
            partner_fields::equity_pct,
            n,
        )),
        top_mf_bond: ranked(top_n_records(
            with_metrics(),
            partner_key,
            partner_fields::mf_bond_pct,
            n,
        )),
        segment_allocation: aggregate(
            with_metrics().filter(|p| p.segment.is_some()),
            |p: &PartnerProfile<'a>| p.segment,
            &[
                Measure::count(CLIENTS),
                Measure::mean(EQUITY_PCT, partner_fields::equity_pct),
                Measure::mean(MF_BOND_PCT, partner_fields::mf_bond_pct),
                Measure::sum(EQUITY, partner_fields::equity),
                Measure::sum(MF_BOND, partner_fields::mf_bond),
            ],
        ),
        specialists: specialists(
            &profiles,
            &by_partner_category,
            &categories,
            config.top_n.specialists,
        ),
        segments,
        categories,
        insights,
        profiles,
    }
}

fn join_profiles<'a>(
    partners: &'a [PartnerRecord],
    by_partner: &[GroupAggregate<&'a str>],
    by_partner_category: &[GroupAggregate<(&'a str, &'a str)>],
    config: &AnalysisConfig,
) -> Vec<PartnerProfile<'a>> {
    partners
        .iter()
        .map(|partner| {
            let code = partner.partner_code.as_str();
            // Aggregates come back sorted by key.
            let metrics = by_partner
                .binary_search_by(|g| g.key.cmp(&code))
                .ok()
                .map(|i| PartnerMetrics::from_group(&by_partner[i]));
            PartnerProfile {
                partner,
                segment: config.partner_segments.bin(partner.declared_clients),
                portfolio_type: metrics.and_then(|m| config.portfolio_types.bin(m.equity_pct)),
                category_diversity: categories_of(by_partner_category, code).len(),
                metrics,
            }
        })
        .collect()
}

/// The (partner, category) groups belonging to `code`. Groups are sorted by
/// key, so they form one contiguous run.
fn categories_of<'g, 'a>(
    by_partner_category: &'g [GroupAggregate<(&'a str, &'a str)>],
    code: &str,
) -> &'g [GroupAggregate<(&'a str, &'a str)>] {
    let start = by_partner_category.partition_point(|g| g.key.0 < code);
    let end = by_partner_category.partition_point(|g| g.key.0 <= code);
    &by_partner_category[start..end]
}

/// Partner count, clients, holdings and average equity share per key.
fn profile_table<'a, 'p, I, F>(profiles: I, key: F) -> Vec<GroupAggregate<Bin>>
where
    'a: 'p,
    I: IntoIterator<Item = &'p PartnerProfile<'a>>,
    F: Fn(&PartnerProfile<'a>) -> Bin,
{
    aggregate(
        profiles,
        key,
        &[
            Measure::count(CLIENTS),
            Measure::sum(CLIENTS, partner_fields::clients),
            Measure::sum(HOLDINGS, partner_fields::holdings),
            Measure::sum(EQUITY_PCT, partner_fields::equity_pct),
            Measure::sum(PARTNERS_WITH_CLIENTS, partner_fields::with_clients),
        ],
    )
}

fn ranked<'a>(top: Vec<(&PartnerProfile<'a>, f64)>) -> Vec<RankedPartner<'a>> {
    top.into_iter()
        .map(|(profile, metric)| RankedPartner {
            profile: profile.clone(),
            metric,
        })
        .collect()
}

fn overview(profiles: &[PartnerProfile], categorised_clients: usize) -> PartnerOverview {
    let metrics: Vec<PartnerMetrics> = profiles.iter().filter_map(|p| p.metrics).collect();
    let holdings_mapped: f64 = metrics.iter().map(|m| m.total_holdings).sum();
    let total_equity: f64 = metrics.iter().map(|m| m.total_equity).sum();
    let total_mf_bond: f64 = metrics.iter().map(|m| m.total_mf_bond).sum();
    PartnerOverview {
        total_partners: profiles.len(),
        partners_with_clients: metrics.len(),
        categorised_clients,
        clients_mapped: metrics.iter().map(|m| m.client_count).sum(),
        holdings_mapped,
        total_equity,
        total_mf_bond,
        equity_share: rate(total_equity, holdings_mapped),
        mf_bond_share: rate(total_mf_bond, holdings_mapped),
        avg_equity_pct: per_unit(metrics.iter().map(|m| m.equity_pct).sum(), metrics.len()),
    }
}

fn specialists<'a>(
    profiles: &[PartnerProfile<'a>],
    by_partner_category: &[GroupAggregate<(&'a str, &'a str)>],
    categories: &[Ranking<&'a str>],
    top_n: usize,
) -> Vec<SpecialistGroup<'a>> {
    categories
        .iter()
        .take(SPECIALIST_CATEGORIES)
        .filter_map(|category| {
            let category = category.group.key;
            let mut rows: Vec<SpecialistRow<'a>> = profiles
                .iter()
                .filter_map(|profile| {
                    let metrics = profile.metrics?;
                    let code = profile.partner.partner_code.as_str();
                    let category_clients = by_partner_category
                        .binary_search_by(|g| g.key.cmp(&(code, category)))
                        .map_or(0, |i| by_partner_category[i].count);
                    let share = per_unit(category_clients as f64, metrics.client_count);
                    (share > SPECIALIST_SHARE).then(|| SpecialistRow {
                        partner_code: code,
                        state: profile.partner.state.as_str(),
                        total_clients: metrics.client_count,
                        category_clients,
                        category_pct: share * 100.0,
                        declared_holdings: profile.partner.declared_holdings,
                    })
                })
                .collect();
            if rows.is_empty() {
                return None;
            }
            rows.sort_by(|a, b| {
                b.category_pct
                    .total_cmp(&a.category_pct)
                    .then_with(|| a.partner_code.cmp(b.partner_code))
            });
            let partner_count = rows.len();
            rows.truncate(top_n);
            Some(SpecialistGroup {
                category,
                partner_count,
                top: rows,
            })
        })
        .collect()
}

fn insights<'a>(
    profiles: &[PartnerProfile<'a>],
    segments: &[GroupAggregate<Bin>],
    categories: &[Ranking<&'a str>],
    categorised_clients: usize,
) -> PartnerInsights<'a> {
    let count = |pred: &dyn Fn(&PartnerProfile) -> bool| {
        profiles.iter().filter(|p| pred(p)).count()
    };
    let segment_equity = |index: usize| {
        segments
            .iter()
            .find(|g| g.key == Some(index))
            .and_then(avg_equity_pct)
    };
    let last_segment = segments.iter().filter_map(|g| g.key).max();

    let states = profile_states(profiles);
    PartnerInsights {
        aggressive: count(&|p| p.metrics.map_or(false, |m| m.equity_pct >= AGGRESSIVE_EQUITY_PCT)),
        conservative: count(&|p| {
            p.metrics
                .map_or(false, |m| m.mf_bond_pct >= CONSERVATIVE_MF_BOND_PCT)
        }),
        diverse: count(&|p| p.category_diversity >= DIVERSE_CATEGORY_COUNT),
        dominant_category: categories.first().map(|top| {
            (
                top.group.key,
                rate(top.group.count as f64, categorised_clients as f64),
            )
        }),
        largest_segment_equity: last_segment.and_then(segment_equity),
        smallest_segment_equity: segment_equity(0),
        top_states: owned(top_n_by(&states, |g| g.sum(HOLDINGS), PARTNER_TOP_STATES)),
    }
}

fn profile_states<'a>(profiles: &[PartnerProfile<'a>]) -> Vec<GroupAggregate<&'a str>> {
    aggregate(
        profiles.iter().filter(|p| is_known(&p.partner.state)),
        |p: &PartnerProfile<'a>| p.partner.state.as_str(),
        &[
            Measure::count(CLIENTS),
            Measure::sum(HOLDINGS, partner_fields::holdings),
            Measure::sum(EQUITY_PCT, partner_fields::equity_pct),
            Measure::sum(PARTNERS_WITH_CLIENTS, partner_fields::with_clients),
        ],
    )
}

/// Total of the categorised clients in a partner table, for share columns.
pub fn categorised_total(categories: &[Ranking<&str>]) -> usize {
    categories.iter().map(|r| r.group.count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::client::fixtures::client;

    fn partner(code: &str, state: &str, declared_clients: f64) -> PartnerRecord {
        PartnerRecord {
            partner_code: code.to_string(),
            state: state.to_string(),
            declared_clients,
            declared_holdings: declared_clients * 1000.0,
        }
    }

    fn book_client(
        code: &str,
        partner: &str,
        category: &str,
        holdings: f64,
        equity: f64,
    ) -> ClientRecord {
        ClientRecord {
            branch_code: partner.to_string(),
            client_category: category.to_string(),
            equity,
            mf_bond: holdings - equity,
            ..client(code, holdings, 0.0)
        }
    }

    fn fixture() -> (Vec<ClientRecord>, Vec<PartnerRecord>) {
        let mut clients = Vec::new();
        for i in 0..6 {
            clients.push(book_client(&format!("A{}", i), "P1", "Individual", 100.0, 100.0));
        }
        for i in 0..2 {
            clients.push(book_client(&format!("B{}", i), "P1", "HUF", 100.0, 50.0));
        }
        for i in 0..4 {
            let category = ["Individual", "HUF", "Corporate", "Trust"][i];
            clients.push(book_client(&format!("C{}", i), "P2", category, 200.0, 100.0));
        }
        clients.push(book_client("U0", "P2", "unknown", 1e9, 0.0));
        let partners = vec![
            partner("P1", "Maharashtra", 8.0),
            partner("P2", "Gujarat", 600.0),
            partner("P3", "Gujarat", 25.0),
        ];
        (clients, partners)
    }

    #[test]
    fn test_left_join_keeps_partners_without_clients() {
        let (clients, partners) = fixture();
        let analysis = analyze_partners(&clients, &partners, &AnalysisConfig::default());
        assert_eq!(analysis.profiles.len(), 3);
        assert!(analysis.profiles[2].metrics.is_none());
        assert_eq!(analysis.profiles[2].portfolio_type, None);
        assert_eq!(analysis.overview.partners_with_clients, 2);
        // the uncategorised client is excluded everywhere
        assert_eq!(analysis.overview.clients_mapped, 12);
        assert_eq!(analysis.overview.categorised_clients, 12);
    }

    #[test]
    fn test_partner_metrics_and_types() {
        let (clients, partners) = fixture();
        let config = AnalysisConfig::default();
        let analysis = analyze_partners(&clients, &partners, &config);

        let p1 = &analysis.profiles[0];
        let m = p1.metrics.unwrap();
        assert_eq!(m.client_count, 8);
        assert!((m.equity_pct - 87.5).abs() < 1e-9);
        assert_eq!(config.portfolio_types.label(p1.portfolio_type.unwrap()), "Balanced (70-90%)");
        assert_eq!(config.partner_segments.label(p1.segment.unwrap()), "Micro (<10)");
        assert_eq!(p1.category_diversity, 2);
        assert_eq!(analysis.profiles[1].category_diversity, 4);
        assert_eq!(analysis.insights.diverse, 1);
    }

    #[test]
    fn test_segment_equity_ignores_partners_without_clients() {
        let (clients, mut partners) = fixture();
        partners[2].declared_clients = 5.0;
        let analysis = analyze_partners(&clients, &partners, &AnalysisConfig::default());
        let micro = analysis.segments.iter().find(|g| g.key == Some(0)).unwrap();
        assert_eq!(micro.count, 2);
        assert!((avg_equity_pct(micro).unwrap() - 87.5).abs() < 1e-9);
        assert!((analysis.insights.largest_segment_equity.unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_specialists_need_majority_share() {
        let (clients, partners) = fixture();
        let analysis = analyze_partners(&clients, &partners, &AnalysisConfig::default());
        let individual = analysis
            .specialists
            .iter()
            .find(|s| s.category == "Individual")
            .unwrap();
        assert_eq!(individual.partner_count, 1);
        assert_eq!(individual.top[0].partner_code, "P1");
        assert!((individual.top[0].category_pct - 75.0).abs() < 1e-9);
        assert!(analysis.specialists.iter().all(|s| s.category != "HUF"));
    }

    #[test]
    fn test_rankings_and_states() {
        let (clients, partners) = fixture();
        let analysis = analyze_partners(&clients, &partners, &AnalysisConfig::default());
        let diverse: Vec<&str> = analysis
            .most_diverse
            .iter()
            .map(|r| r.profile.partner.partner_code.as_str())
            .collect();
        assert_eq!(diverse, vec!["P2", "P1", "P3"]);
        assert_eq!(analysis.top_equity[0].profile.partner.partner_code, "P1");
        assert_eq!(analysis.top_mf_bond[0].profile.partner.partner_code, "P2");

        let states: Vec<&str> = analysis.insights.top_states.iter().map(|r| r.group.key).collect();
        assert_eq!(states, vec!["Gujarat", "Maharashtra"]);
        assert_eq!(categorised_total(&analysis.categories), 12);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let (clients, partners) = fixture();
        let config = AnalysisConfig::default();
        let first = serde_json::to_string(&analyze_partners(&clients, &partners, &config));
        let second = serde_json::to_string(&analyze_partners(&clients, &partners, &config));
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn test_categories_of_matches_whole_partner_codes() {
        let clients = vec![
            book_client("A0", "P1", "HUF", 10.0, 5.0),
            book_client("A1", "P1", "Individual", 10.0, 5.0),
            book_client("A2", "P1", "Individual", 10.0, 5.0),
            book_client("B0", "P10", "Trust", 10.0, 5.0),
            book_client("C0", "P2", "Corporate", 10.0, 5.0),
        ];
        fn partner_category(c: &ClientRecord) -> (&str, &str) {
            (c.branch_code.as_str(), c.client_category.as_str())
        }
        let groups = aggregate(&clients, partner_category, &[Measure::count(CLIENTS)]);
        let p1: Vec<&str> = categories_of(&groups, "P1").iter().map(|g| g.key.1).collect();
        assert_eq!(p1, vec!["HUF", "Individual"]);
        assert_eq!(categories_of(&groups, "P10").len(), 1);
        assert_eq!(categories_of(&groups, "P2").len(), 1);
        assert!(categories_of(&groups, "P3").is_empty());
    }
}
