// src/analysis/client_analysis.rs - Every table of the client profile
use log::debug;
use serde::Serialize;

use super::columns::*;
use super::{owned, Ranking};
use crate::models::client::{is_known, ClientRecord};
use crate::pipeline::aggregator::{aggregate, total_count, GroupAggregate, Measure};
use crate::pipeline::derived::{derive_clients, DerivedClient};
use crate::pipeline::ranker::{
    composite_scores, min_support, per_unit, rank, rate, top_n_by, ScoreTerm, TermScale,
};
use crate::utils::config::AnalysisConfig;
use crate::utils::constants::{
    BRANCH_CHANNEL_CODES, CITY_CALLOUT_ROWS, CITY_POTENTIAL_CANDIDATES, CITY_TIER_ROWS,
    EMERGING_CITY_MAX_CLIENTS, EMERGING_CITY_MIN_AVG_HOLDINGS, HIGH_POTENTIAL_SCORE,
    KNOWN_GENDER_CODES, LOW_ACTIVATION_RATE,
};

/// Index into a bin specification; `None` for values outside every bin.
pub type Bin = Option<usize>;

mod fields {
    use crate::pipeline::derived::DerivedClient;

    pub fn holdings(c: &DerivedClient) -> f64 {
        c.record.holdings
    }
    pub fn net_worth(c: &DerivedClient) -> f64 {
        c.record.net_worth
    }
    pub fn brokerage(c: &DerivedClient) -> f64 {
        c.record.brokerage
    }
    pub fn net_pl(c: &DerivedClient) -> f64 {
        c.record.net_pl
    }
    pub fn age(c: &DerivedClient) -> f64 {
        c.record.age
    }
    pub fn active(c: &DerivedClient) -> f64 {
        c.active_flag()
    }
    pub fn equity(c: &DerivedClient) -> f64 {
        c.record.equity
    }
    pub fn mf_bond(c: &DerivedClient) -> f64 {
        c.record.mf_bond
    }
    pub fn equity_pct(c: &DerivedClient) -> f64 {
        c.equity_pct
    }
    pub fn mf_bond_pct(c: &DerivedClient) -> f64 {
        c.mf_bond_pct
    }
    pub fn annual_revenue(c: &DerivedClient) -> f64 {
        c.annual_revenue
    }
    pub fn lifetime_value(c: &DerivedClient) -> f64 {
        c.lifetime_value
    }
}

/// Percentage of a group's clients that are active.
pub fn activation_rate<K>(group: &GroupAggregate<K>) -> f64 {
    rate(group.sum(ACTIVE), group.count as f64)
}

pub fn brokerage_per_client<K>(group: &GroupAggregate<K>) -> f64 {
    per_unit(group.sum(BROKERAGE), group.count)
}

/// Priority of an age band for lifetime-value work, from the band's lower
/// edge in years.
pub fn age_priority(lower_edge: f64) -> &'static str {
    if (25.0..45.0).contains(&lower_edge) {
        "**HIGH** (Long lifetime)"
    } else if (45.0..55.0).contains(&lower_edge) {
        "High (Peak wealth)"
    } else if (55.0..65.0).contains(&lower_edge) {
        "Medium (Pre-retirement)"
    } else {
        "Low"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub total_clients: usize,
    pub active_clients: usize,
    pub dormant_clients: usize,
    pub active_rate: f64,
    pub dormant_rate: f64,
    pub total_holdings: f64,
    pub total_net_worth: f64,
    pub total_brokerage: f64,
    pub total_net_pl: f64,
    pub avg_holdings_per_client: f64,
    pub avg_brokerage_per_active: f64,
}

/// Share of total holdings held by the largest and smallest accounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Concentration {
    pub top_1pct_clients: usize,
    pub top_1pct_holdings: f64,
    pub top_1pct_share: f64,
    pub top_10pct_clients: usize,
    pub top_10pct_holdings: f64,
    pub top_10pct_share: f64,
    pub bottom_50pct_clients: usize,
    pub bottom_50pct_holdings: f64,
    pub bottom_50pct_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeSummary {
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RmSummary<'a> {
    /// RMs with at least the minimum group size.
    pub eligible: usize,
    pub assigned_clients: usize,
    pub unassigned_clients: usize,
    pub by_aum: Vec<Ranking<&'a str>>,
    pub by_brokerage: Vec<Ranking<&'a str>>,
    pub by_activation: Vec<Ranking<&'a str>>,
    pub average_activation: f64,
    pub best_activation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClvSummary {
    pub by_segment: Vec<GroupAggregate<Bin>>,
    pub by_age: Vec<GroupAggregate<Bin>>,
    pub portfolio_total: f64,
    pub portfolio_mean: f64,
}

/// AUM-tier make-up of one city.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityTier<'a> {
    pub city: &'a str,
    pub clients: usize,
    /// Clients in the two highest AUM segments.
    pub hni_plus: usize,
    /// Clients between the two lowest and the two highest segments.
    pub affluent_plus: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityPotential<'a> {
    /// Cities ranked by composite potential score.
    pub ranked: Vec<Ranking<&'a str>>,
    pub tiers: Vec<CityTier<'a>>,
    pub high_potential: Vec<&'a str>,
    pub low_activation: Vec<&'a str>,
    pub emerging: Vec<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary<'a> {
    pub top: Vec<Ranking<&'a str>>,
    pub categorised: usize,
    pub uncategorised: usize,
    pub category_count: usize,
    pub top3_share: f64,
    pub average_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSummary {
    pub total_equity: f64,
    pub total_mf_bond: f64,
    pub total_allocated: f64,
    pub unallocated: f64,
    pub equity_pct_of_holdings: f64,
    pub mf_bond_pct_of_holdings: f64,
    pub allocated_pct_of_holdings: f64,
    pub unallocated_pct_of_holdings: f64,
    pub equity_pct_of_allocated: f64,
    pub mf_bond_pct_of_allocated: f64,
    pub by_segment: Vec<GroupAggregate<Bin>>,
    pub by_age: Vec<GroupAggregate<Bin>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortSummary {
    pub by_year: Vec<GroupAggregate<Option<i32>>>,
    pub unknown_dates: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataQuality {
    pub missing_age: usize,
    pub missing_gender: usize,
    pub missing_state: usize,
    pub missing_rm: usize,
    pub zero_holdings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientAnalysis<'a> {
    pub overview: Overview,
    pub concentration: Concentration,
    pub segments: Vec<GroupAggregate<Bin>>,
    pub age_bands: Vec<GroupAggregate<Bin>>,
    pub age_summary: Option<AgeSummary>,
    pub genders: Vec<GroupAggregate<&'a str>>,
    pub gender_occupations: Vec<(&'a str, Vec<Ranking<(&'a str, &'a str)>>)>,
    pub gender_ages: Vec<GroupAggregate<(&'a str, Bin)>>,
    pub occupations: Vec<Ranking<&'a str>>,
    pub states: Vec<Ranking<&'a str>>,
    pub cities: Vec<Ranking<&'a str>>,
    pub channels: Vec<GroupAggregate<&'a str>>,
    pub rms: RmSummary<'a>,
    pub clv: ClvSummary,
    pub city_potential: CityPotential<'a>,
    pub exchanges: Vec<Ranking<&'a str>>,
    pub categories: CategorySummary<'a>,
    pub allocation: AllocationSummary,
    pub cohorts: CohortSummary,
    pub data_quality: DataQuality,
}

/// Runs the derived-field, aggregation and ranking stages over the
/// normalized client records.
pub fn analyze_clients<'a>(
    records: &'a [ClientRecord],
    config: &AnalysisConfig,
) -> ClientAnalysis<'a> {
    let derived = derive_clients(records, &config.segmentation(), &config.value_model());
    debug!("Derived fields computed for {} clients", derived.len());

    let overview = overview(&derived);
    let cities = city_groups(&derived);
    let city_ranking = owned(top_n_by(&cities, |g| g.sum(HOLDINGS), config.top_n.cities));

    ClientAnalysis {
        concentration: concentration(records, overview.total_holdings),
        segments: segment_table(&derived),
        age_bands: age_table(&derived),
        age_summary: age_summary(records),
        genders: gender_table(&derived),
        gender_occupations: gender_occupations(&derived, config.top_n.gender_occupations),
        gender_ages: aggregate(
            derived
                .iter()
                .filter(|d| d.record.has_known_gender() && d.age_band.is_some()),
            |d: &DerivedClient<'a>| (d.record.gender.as_str(), d.age_band),
            &[Measure::count(CLIENTS), Measure::sum(HOLDINGS, fields::holdings)],
        ),
        occupations: occupation_ranking(&derived, config.top_n.occupations),
        states: state_ranking(&derived, config.top_n.states),
        channels: channel_table(&derived),
        rms: rm_summary(&derived, config),
        clv: clv_summary(&derived),
        city_potential: city_potential(&derived, &cities, &city_ranking, config),
        cities: city_ranking,
        exchanges: exchange_ranking(&derived, config.top_n.exchanges),
        categories: category_summary(&derived, overview.total_holdings, config.top_n.categories),
        allocation: allocation_summary(&derived, overview.total_holdings),
        cohorts: cohort_summary(&derived),
        data_quality: data_quality(records),
        overview,
    }
}

fn overview(derived: &[DerivedClient]) -> Overview {
    let total_clients = derived.len();
    let active_clients = derived.iter().filter(|d| d.is_active).count();
    let dormant_clients = total_clients - active_clients;
    let total_holdings: f64 = derived.iter().map(fields::holdings).sum();
    let total_brokerage: f64 = derived.iter().map(fields::brokerage).sum();
    Overview {
        total_clients,
        active_clients,
        dormant_clients,
        active_rate: rate(active_clients as f64, total_clients as f64),
        dormant_rate: rate(dormant_clients as f64, total_clients as f64),
        total_holdings,
        total_net_worth: derived.iter().map(fields::net_worth).sum(),
        total_brokerage,
        total_net_pl: derived.iter().map(fields::net_pl).sum(),
        avg_holdings_per_client: per_unit(total_holdings, total_clients),
        avg_brokerage_per_active: per_unit(total_brokerage, active_clients),
    }
}

fn concentration(records: &[ClientRecord], total_holdings: f64) -> Concentration {
    let mut holdings: Vec<f64> = records.iter().map(|r| r.holdings).collect();
    holdings.sort_by(|a, b| b.total_cmp(a));
    let n = holdings.len();
    let top_1pct_clients = n / 100;
    let top_10pct_clients = n / 10;
    let bottom_50pct_clients = n / 2;

    let top_1pct_holdings: f64 = holdings[..top_1pct_clients].iter().sum();
    let top_10pct_holdings: f64 = holdings[..top_10pct_clients].iter().sum();
    let bottom_50pct_holdings: f64 = holdings[n - bottom_50pct_clients..].iter().sum();

    Concentration {
        top_1pct_clients,
        top_1pct_holdings,
        top_1pct_share: rate(top_1pct_holdings, total_holdings),
        top_10pct_clients,
        top_10pct_holdings,
        top_10pct_share: rate(top_10pct_holdings, total_holdings),
        bottom_50pct_clients,
        bottom_50pct_holdings,
        bottom_50pct_share: rate(bottom_50pct_holdings, total_holdings),
    }
}

fn segment_table<'a>(derived: &[DerivedClient<'a>]) -> Vec<GroupAggregate<Bin>> {
    aggregate(
        derived,
        |d: &DerivedClient<'a>| d.aum_segment,
        &[
            Measure::count(CLIENTS),
            Measure::sum(HOLDINGS, fields::holdings),
            Measure::mean(HOLDINGS, fields::holdings),
            Measure::sum(BROKERAGE, fields::brokerage),
            Measure::sum(ACTIVE, fields::active),
        ],
    )
}

fn age_table<'a>(derived: &[DerivedClient<'a>]) -> Vec<GroupAggregate<Bin>> {
    aggregate(
        derived.iter().filter(|d| d.age_band.is_some()),
        |d: &DerivedClient<'a>| d.age_band,
        &[
            Measure::count(CLIENTS),
            Measure::sum(HOLDINGS, fields::holdings),
            Measure::mean(HOLDINGS, fields::holdings),
            Measure::sum(BROKERAGE, fields::brokerage),
        ],
    )
}

fn age_summary(records: &[ClientRecord]) -> Option<AgeSummary> {
    let mut ages: Vec<f64> = records
        .iter()
        .filter(|r| r.has_valid_age())
        .map(|r| r.age)
        .collect();
    if ages.is_empty() {
        return None;
    }
    ages.sort_by(f64::total_cmp);
    let mid = ages.len() / 2;
    let median = if ages.len() % 2 == 0 {
        (ages[mid - 1] + ages[mid]) / 2.0
    } else {
        ages[mid]
    };
    Some(AgeSummary {
        median,
        min: ages[0],
        max: ages[ages.len() - 1],
    })
}

fn gender_table<'a>(derived: &[DerivedClient<'a>]) -> Vec<GroupAggregate<&'a str>> {
    aggregate(
        derived.iter().filter(|d| d.record.has_known_gender()),
        |d: &DerivedClient<'a>| d.record.gender.as_str(),
        &[
            Measure::count(CLIENTS),
            Measure::sum(HOLDINGS, fields::holdings),
            Measure::mean(HOLDINGS, fields::holdings),
            Measure::sum(BROKERAGE, fields::brokerage),
            Measure::sum(ACTIVE, fields::active),
            Measure::mean(AGE, fields::age),
            Measure::sum(EQUITY, fields::equity),
            Measure::mean(EQUITY, fields::equity),
            Measure::sum(MF_BOND, fields::mf_bond),
            Measure::mean(MF_BOND, fields::mf_bond),
        ],
    )
}

fn gender_occupations<'a>(
    derived: &[DerivedClient<'a>],
    top_n: usize,
) -> Vec<(&'a str, Vec<Ranking<(&'a str, &'a str)>>)> {
    let groups = aggregate(
        derived
            .iter()
            .filter(|d| d.record.has_known_gender() && is_known(&d.record.occupation)),
        |d: &DerivedClient<'a>| (d.record.gender.as_str(), d.record.occupation.as_str()),
        &[Measure::count(CLIENTS), Measure::sum(HOLDINGS, fields::holdings)],
    );

    KNOWN_GENDER_CODES
        .iter()
        .filter(|code| groups.iter().any(|g| g.key.0 == **code))
        .map(|&gender| {
            let top = top_n_by(
                groups.iter().filter(|g| g.key.0 == gender),
                |g| g.sum(HOLDINGS),
                top_n,
            );
            (gender, owned(top))
        })
        .collect()
}

fn occupation_ranking<'a>(derived: &[DerivedClient<'a>], top_n: usize) -> Vec<Ranking<&'a str>> {
    let groups = aggregate(
        derived.iter().filter(|d| is_known(&d.record.occupation)),
        |d: &DerivedClient<'a>| d.record.occupation.as_str(),
        &[
            Measure::count(CLIENTS),
            Measure::sum(HOLDINGS, fields::holdings),
            Measure::mean(HOLDINGS, fields::holdings),
            Measure::sum(BROKERAGE, fields::brokerage),
        ],
    );
    owned(top_n_by(&groups, |g| g.sum(HOLDINGS), top_n))
}

fn state_ranking<'a>(derived: &[DerivedClient<'a>], top_n: usize) -> Vec<Ranking<&'a str>> {
    let groups = aggregate(
        derived.iter().filter(|d| is_known(&d.record.state)),
        |d: &DerivedClient<'a>| d.record.state.as_str(),
        &[
            Measure::count(CLIENTS),
            Measure::sum(HOLDINGS, fields::holdings),
            Measure::sum(BROKERAGE, fields::brokerage),
            Measure::sum(ACTIVE, fields::active),
        ],
    );
    owned(top_n_by(&groups, |g| g.sum(HOLDINGS), top_n))
}

fn city_groups<'a>(derived: &[DerivedClient<'a>]) -> Vec<GroupAggregate<&'a str>> {
    aggregate(
        derived.iter().filter(|d| is_known(&d.record.city)),
        |d: &DerivedClient<'a>| d.record.city.as_str(),
        &[
            Measure::count(CLIENTS),
            Measure::sum(HOLDINGS, fields::holdings),
            Measure::mean(HOLDINGS, fields::holdings),
            Measure::sum(BROKERAGE, fields::brokerage),
            Measure::sum(ACTIVE, fields::active),
            Measure::mean(AGE, fields::age),
        ],
    )
}

fn channel_table<'a>(derived: &[DerivedClient<'a>]) -> Vec<GroupAggregate<&'a str>> {
    aggregate(
        derived
            .iter()
            .filter(|d| BRANCH_CHANNEL_CODES.contains(&d.record.branch_channel.as_str())),
        |d: &DerivedClient<'a>| d.record.branch_channel.as_str(),
        &[
            Measure::count(CLIENTS),
            Measure::sum(HOLDINGS, fields::holdings),
            Measure::sum(BROKERAGE, fields::brokerage),
            Measure::sum(ACTIVE, fields::active),
        ],
    )
}

fn rm_summary<'a>(derived: &[DerivedClient<'a>], config: &AnalysisConfig) -> RmSummary<'a> {
    let groups = aggregate(
        derived.iter().filter(|d| d.record.has_rm()),
        |d: &DerivedClient<'a>| d.record.rm_name.as_str(),
        &[
            Measure::count(CLIENTS),
            Measure::sum(HOLDINGS, fields::holdings),
            Measure::mean(HOLDINGS, fields::holdings),
            Measure::sum(BROKERAGE, fields::brokerage),
            Measure::sum(ACTIVE, fields::active),
        ],
    );
    let assigned_clients = total_count(&groups);
    let eligible = min_support(&groups, config.min_group_size);
    let rates: Vec<f64> = eligible.iter().map(|g| activation_rate(*g)).collect();
    let n = config.top_n.rms;

    RmSummary {
        eligible: eligible.len(),
        assigned_clients,
        unassigned_clients: derived.len() - assigned_clients,
        by_aum: owned(top_n_by(eligible.iter().copied(), |g| g.sum(HOLDINGS), n)),
        by_brokerage: owned(top_n_by(eligible.iter().copied(), |g| g.sum(BROKERAGE), n)),
        by_activation: owned(top_n_by(eligible.iter().copied(), activation_rate, n)),
        average_activation: per_unit(rates.iter().sum(), rates.len()),
        best_activation: rates.iter().copied().fold(0.0, f64::max),
    }
}

fn clv_summary<'a>(derived: &[DerivedClient<'a>]) -> ClvSummary {
    let measures: [Measure<DerivedClient<'a>>; 4] = [
        Measure::count(CLIENTS),
        Measure::mean(ANNUAL_REVENUE, fields::annual_revenue),
        Measure::mean(LIFETIME_VALUE, fields::lifetime_value),
        Measure::sum(LIFETIME_VALUE, fields::lifetime_value),
    ];
    let portfolio_total: f64 = derived.iter().map(fields::lifetime_value).sum();
    ClvSummary {
        by_segment: aggregate(derived, |d: &DerivedClient<'a>| d.aum_segment, &measures),
        by_age: aggregate(
            derived.iter().filter(|d| d.age_band.is_some()),
            |d: &DerivedClient<'a>| d.age_band,
            &measures,
        ),
        portfolio_total,
        portfolio_mean: per_unit(portfolio_total, derived.len()),
    }
}

fn city_potential<'a>(
    derived: &[DerivedClient<'a>],
    cities: &[GroupAggregate<&'a str>],
    city_ranking: &[Ranking<&'a str>],
    config: &AnalysisConfig,
) -> CityPotential<'a> {
    let supported = min_support(cities, config.min_group_size);
    let candidates: Vec<&GroupAggregate<&'a str>> = top_n_by(
        supported.iter().copied(),
        |g| g.sum(HOLDINGS),
        CITY_POTENTIAL_CANDIDATES,
    )
    .into_iter()
    .map(|r| r.group)
    .collect();

    let weights = config.potential_weights;
    let terms: [ScoreTerm<&'a str>; 3] = [
        ScoreTerm {
            weight: weights.aum,
            scale: TermScale::RelativeToMax,
            value: |g| g.sum(HOLDINGS),
        },
        ScoreTerm {
            weight: weights.activation,
            scale: TermScale::Percent,
            value: activation_rate,
        },
        ScoreTerm {
            weight: weights.brokerage,
            scale: TermScale::RelativeToMax,
            value: |g| g.sum(BROKERAGE),
        },
    ];
    let ranked = rank(composite_scores(&candidates, &terms), config.top_n.city_potential);

    let high_potential = ranked
        .iter()
        .filter(|r| r.metric > HIGH_POTENTIAL_SCORE)
        .take(CITY_CALLOUT_ROWS)
        .map(|r| r.group.key)
        .collect();
    let low_activation = top_n_by(
        supported
            .iter()
            .copied()
            .filter(|g| activation_rate(*g) < LOW_ACTIVATION_RATE),
        |g| g.sum(HOLDINGS),
        CITY_CALLOUT_ROWS,
    )
    .into_iter()
    .map(|r| r.group.key)
    .collect();
    let emerging = top_n_by(
        cities.iter().filter(|g| {
            g.count < EMERGING_CITY_MAX_CLIENTS && g.mean(HOLDINGS) > EMERGING_CITY_MIN_AVG_HOLDINGS
        }),
        |g| g.mean(HOLDINGS),
        CITY_CALLOUT_ROWS,
    )
    .into_iter()
    .map(|r| r.group.key)
    .collect();

    CityPotential {
        ranked: owned(ranked),
        tiers: city_tiers(derived, city_ranking, config.aum_segments.len()),
        high_potential,
        low_activation,
        emerging,
    }
}

fn city_tiers<'a>(
    derived: &[DerivedClient<'a>],
    city_ranking: &[Ranking<&'a str>],
    segment_count: usize,
) -> Vec<CityTier<'a>> {
    let tier_cities: Vec<&'a str> = city_ranking
        .iter()
        .take(CITY_TIER_ROWS)
        .map(|r| r.group.key)
        .collect();
    let composition = aggregate(
        derived
            .iter()
            .filter(|d| tier_cities.contains(&d.record.city.as_str())),
        |d: &DerivedClient<'a>| (d.record.city.as_str(), d.aum_segment),
        &[Measure::count(CLIENTS)],
    );

    let hni_from = segment_count.saturating_sub(2);
    let affluent_from = hni_from.min(2);
    tier_cities
        .into_iter()
        .map(|city| {
            let mut tier = CityTier {
                city,
                clients: 0,
                hni_plus: 0,
                affluent_plus: 0,
            };
            for group in composition.iter().filter(|g| g.key.0 == city) {
                tier.clients += group.count;
                match group.key.1 {
                    Some(segment) if segment >= hni_from => tier.hni_plus += group.count,
                    Some(segment) if segment >= affluent_from => tier.affluent_plus += group.count,
                    _ => {}
                }
            }
            tier
        })
        .collect()
}

fn exchange_ranking<'a>(derived: &[DerivedClient<'a>], top_n: usize) -> Vec<Ranking<&'a str>> {
    let groups = aggregate(
        derived.iter().filter(|d| is_known(&d.record.exchanges)),
        |d: &DerivedClient<'a>| d.record.exchanges.as_str(),
        &[Measure::count(CLIENTS), Measure::sum(HOLDINGS, fields::holdings)],
    );
    owned(top_n_by(&groups, |g| g.count as f64, top_n))
}

fn category_summary<'a>(
    derived: &[DerivedClient<'a>],
    total_holdings: f64,
    top_n: usize,
) -> CategorySummary<'a> {
    let groups = aggregate(
        derived.iter().filter(|d| is_known(&d.record.client_category)),
        |d: &DerivedClient<'a>| d.record.client_category.as_str(),
        &[
            Measure::count(CLIENTS),
            Measure::sum(HOLDINGS, fields::holdings),
            Measure::mean(HOLDINGS, fields::holdings),
            Measure::sum(BROKERAGE, fields::brokerage),
            Measure::sum(ACTIVE, fields::active),
            Measure::sum(EQUITY, fields::equity),
            Measure::sum(MF_BOND, fields::mf_bond),
        ],
    );
    let categorised = total_count(&groups);
    let top = top_n_by(&groups, |g| g.sum(HOLDINGS), top_n);
    let top3_holdings: f64 = top.iter().take(3).map(|r| r.group.sum(HOLDINGS)).sum();

    CategorySummary {
        categorised,
        uncategorised: derived.len() - categorised,
        category_count: groups.len(),
        top3_share: rate(top3_holdings, total_holdings),
        average_size: per_unit(categorised as f64, groups.len()),
        top: owned(top),
    }
}

fn allocation_summary<'a>(derived: &[DerivedClient<'a>], total_holdings: f64) -> AllocationSummary {
    let measures: [Measure<DerivedClient<'a>>; 6] = [
        Measure::count(CLIENTS),
        Measure::sum(EQUITY, fields::equity),
        Measure::sum(MF_BOND, fields::mf_bond),
        Measure::sum(HOLDINGS, fields::holdings),
        Measure::mean(EQUITY_PCT, fields::equity_pct),
        Measure::mean(MF_BOND_PCT, fields::mf_bond_pct),
    ];
    let funded = || derived.iter().filter(|d| d.record.holdings > 0.0);

    let total_equity: f64 = derived.iter().map(fields::equity).sum();
    let total_mf_bond: f64 = derived.iter().map(fields::mf_bond).sum();
    let total_allocated = total_equity + total_mf_bond;
    let unallocated = total_holdings - total_allocated;

    AllocationSummary {
        total_equity,
        total_mf_bond,
        total_allocated,
        unallocated,
        equity_pct_of_holdings: rate(total_equity, total_holdings),
        mf_bond_pct_of_holdings: rate(total_mf_bond, total_holdings),
        allocated_pct_of_holdings: rate(total_allocated, total_holdings),
        unallocated_pct_of_holdings: rate(unallocated, total_holdings),
        equity_pct_of_allocated: rate(total_equity, total_allocated),
        mf_bond_pct_of_allocated: rate(total_mf_bond, total_allocated),
        by_segment: aggregate(funded(), |d: &DerivedClient<'a>| d.aum_segment, &measures),
        by_age: aggregate(
            funded().filter(|d| d.age_band.is_some()),
            |d: &DerivedClient<'a>| d.age_band,
            &measures,
        ),
    }
}

fn cohort_summary<'a>(derived: &[DerivedClient<'a>]) -> CohortSummary {
    let by_year = aggregate(
        derived.iter().filter(|d| d.record.activation_date.is_known()),
        |d: &DerivedClient<'a>| d.activation_year(),
        &[
            Measure::count(CLIENTS),
            Measure::sum(HOLDINGS, fields::holdings),
            Measure::sum(ACTIVE, fields::active),
        ],
    );
    CohortSummary {
        unknown_dates: derived.len() - total_count(&by_year),
        by_year,
    }
}

fn data_quality(records: &[ClientRecord]) -> DataQuality {
    let count = |pred: fn(&ClientRecord) -> bool| records.iter().filter(|r| pred(r)).count();
    DataQuality {
        missing_age: count(|r| !r.has_valid_age()),
        missing_gender: count(|r| !r.has_known_gender()),
        missing_state: count(|r| !is_known(&r.state)),
        missing_rm: count(|r| !r.has_rm()),
        zero_holdings: count(|r| r.holdings == 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::client::fixtures::{blank_client, client};
    use crate::models::client::ActivationDate;
    use chrono::NaiveDate;

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    fn city_client(code: &str, city: &str, holdings: f64, brokerage: f64) -> ClientRecord {
        ClientRecord {
            city: city.to_string(),
            ..client(code, holdings, brokerage)
        }
    }

    fn rm_client(code: usize, rm: &str, active: bool) -> ClientRecord {
        ClientRecord {
            rm_name: rm.to_string(),
            ..client(&format!("C{}", code), if active { 1000.0 } else { 0.0 }, 0.0)
        }
    }

    #[test]
    fn test_three_client_scenario() {
        let records = vec![
            client("A", 0.0, 0.0),
            client("B", 600_000.0, 100.0),
            client("C", 12_000_000.0, 0.0),
        ];
        let config = config();
        let analysis = analyze_clients(&records, &config);
        assert_eq!(analysis.overview.active_clients, 2);
        assert_eq!(analysis.overview.dormant_clients, 1);

        let labels: Vec<&str> = analysis
            .segments
            .iter()
            .map(|g| config.aum_segments.label(g.key.unwrap()))
            .collect();
        assert_eq!(labels, vec!["Micro (<₹5L)", "Small (₹5-20L)", "HNI (₹1-7Cr)"]);
        assert_eq!(total_count(&analysis.segments), 3);
    }

    #[test]
    fn test_segment_counts_partition_clients() {
        let records: Vec<ClientRecord> = (0..50)
            .map(|i| client(&format!("C{}", i), i as f64 * 1_700_000.0, 0.0))
            .collect();
        let analysis = analyze_clients(&records, &config());
        assert_eq!(total_count(&analysis.segments), records.len());
        for g in &analysis.segments {
            assert!((g.mean(HOLDINGS) * g.count as f64 - g.sum(HOLDINGS)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_small_rm_never_ranked() {
        let mut records: Vec<ClientRecord> = (0..5).map(|i| rm_client(i, "Tiny", true)).collect();
        records.extend((5..45).map(|i| rm_client(i, "Large", i % 4 == 0)));
        records.extend((45..55).map(|i| rm_client(i, "Edge", i % 2 == 0)));
        let analysis = analyze_clients(&records, &config());

        let rms = &analysis.rms;
        assert_eq!(rms.eligible, 2);
        for ranking in [&rms.by_aum, &rms.by_brokerage, &rms.by_activation] {
            assert!(ranking.iter().all(|r| r.group.key != "Tiny"));
        }
        assert_eq!(rms.assigned_clients, 55);
        assert_eq!(rms.unassigned_clients, 0);
        assert_eq!(rms.by_activation[0].group.key, "Edge");
        assert!((rms.best_activation - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_gender_tables_only_use_known_codes() {
        let mut records = vec![blank_client("A"), blank_client("B"), blank_client("C")];
        records[0].gender = "M".into();
        records[1].gender = "F".into();
        records[2].gender = "X".into();
        let analysis = analyze_clients(&records, &config());
        let keys: Vec<&str> = analysis.genders.iter().map(|g| g.key).collect();
        assert_eq!(keys, vec!["F", "M"]);
        assert_eq!(analysis.data_quality.missing_gender, 1);
    }

    #[test]
    fn test_city_potential_respects_support_and_bounds() {
        let mut records = Vec::new();
        for i in 0..20 {
            records.push(city_client(&format!("P{}", i), "Pune", 1_000_000.0, 50.0));
        }
        for i in 0..12 {
            let brokerage = if i < 3 { 10.0 } else { 0.0 };
            records.push(city_client(&format!("N{}", i), "Nashik", 0.0, brokerage));
        }
        for i in 0..3 {
            records.push(city_client(&format!("G{}", i), "Goa", 90_000_000.0, 0.0));
        }
        let analysis = analyze_clients(&records, &config());
        let potential = &analysis.city_potential;

        let ranked: Vec<&str> = potential.ranked.iter().map(|r| r.group.key).collect();
        assert_eq!(ranked, vec!["Pune", "Nashik"]);
        assert!(potential.ranked.iter().all(|r| r.metric <= 100.0 + 1e-9));
        assert!((potential.ranked[0].metric - 100.0).abs() < 1e-9);
        assert_eq!(potential.high_potential, vec!["Pune"]);
        assert_eq!(potential.low_activation, vec!["Nashik"]);
        assert_eq!(potential.emerging, vec!["Goa"]);

        let goa = potential.tiers.iter().find(|t| t.city == "Goa").unwrap();
        assert_eq!(goa.hni_plus, 3);
        let pune = potential.tiers.iter().find(|t| t.city == "Pune").unwrap();
        assert_eq!(pune.hni_plus, 0);
        assert_eq!(pune.affluent_plus, 0);
    }

    #[test]
    fn test_concentration_and_age_summary() {
        let mut records: Vec<ClientRecord> = (0..100)
            .map(|i| client(&format!("C{}", i), if i == 0 { 1000.0 } else { 1.0 }, 0.0))
            .collect();
        records[1].age = 30.0;
        records[2].age = 40.0;
        records[3].age = 60.0;
        records[4].age = 70.0;
        let analysis = analyze_clients(&records, &config());

        let c = &analysis.concentration;
        assert_eq!(c.top_1pct_clients, 1);
        assert_eq!(c.top_1pct_holdings, 1000.0);
        assert_eq!(c.bottom_50pct_clients, 50);
        assert_eq!(c.bottom_50pct_holdings, 50.0);

        let ages = analysis.age_summary.unwrap();
        assert_eq!(ages.median, 50.0);
        assert_eq!(ages.min, 30.0);
        assert_eq!(ages.max, 70.0);
        assert_eq!(analysis.data_quality.missing_age, 96);
    }

    #[test]
    fn test_cohorts_skip_unknown_dates() {
        let mut records = vec![
            client("A", 10.0, 0.0),
            client("B", 0.0, 0.0),
            client("C", 5.0, 0.0),
        ];
        let known = |m: u32| ActivationDate::Known(NaiveDate::from_ymd_opt(2019, m, 1).unwrap());
        records[0].activation_date = known(4);
        records[1].activation_date = known(9);
        let analysis = analyze_clients(&records, &config());
        assert_eq!(analysis.cohorts.unknown_dates, 1);
        assert_eq!(analysis.cohorts.by_year.len(), 1);
        let cohort = &analysis.cohorts.by_year[0];
        assert_eq!(cohort.key, Some(2019));
        assert_eq!(activation_rate(cohort), 50.0);
    }

    #[test]
    fn test_empty_input_has_no_division_errors() {
        let analysis = analyze_clients(&[], &config());
        assert_eq!(analysis.overview.total_clients, 0);
        assert_eq!(analysis.overview.active_rate, 0.0);
        assert!(analysis.age_summary.is_none());
        assert!(analysis.segments.is_empty());
        assert_eq!(analysis.rms.average_activation, 0.0);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let mut records: Vec<ClientRecord> = (0..40)
            .map(|i| {
                city_client(
                    &format!("C{}", i),
                    ["Pune", "Delhi", "Surat"][i % 3],
                    (i * 37_000) as f64,
                    (i % 5) as f64,
                )
            })
            .collect();
        for (i, r) in records.iter_mut().enumerate() {
            r.age = (20 + i) as f64;
            r.rm_name = format!("RM{}", i % 2);
        }
        let first = serde_json::to_string(&analyze_clients(&records, &config())).unwrap();
        let second = serde_json::to_string(&analyze_clients(&records, &config())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_age_priority() {
        assert_eq!(age_priority(25.0), "**HIGH** (Long lifetime)");
        assert_eq!(age_priority(45.0), "High (Peak wealth)");
        assert_eq!(age_priority(55.0), "Medium (Pre-retirement)");
        assert_eq!(age_priority(0.0), "Low");
        assert_eq!(age_priority(65.0), "Low");
    }
}
