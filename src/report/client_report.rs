// src/report/client_report.rs - Markdown rendering of the client profile
use chrono::NaiveDateTime;

use super::format::{bold, count, format_currency, pct, table};
use super::{bin_label, SourceSummary, TIMESTAMP_FORMAT};
use crate::analysis::client_analysis::{
    activation_rate, age_priority, brokerage_per_client, Bin, ClientAnalysis,
};
use crate::analysis::columns::*;
use crate::analysis::Ranking;
use crate::pipeline::aggregator::{column_total, total_count, GroupAggregate};
use crate::pipeline::derived::BinSpec;
use crate::pipeline::ranker::{rate, top_n_by};
use crate::utils::config::AnalysisConfig;
use crate::utils::constants::{
    CITY_POTENTIAL_CANDIDATES, EMERGING_CITY_MAX_CLIENTS, EMERGING_CITY_MIN_AVG_HOLDINGS,
    HIGH_POTENTIAL_SCORE, LOW_ACTIVATION_RATE, UNKNOWN_MARKER,
};

const NOT_AVAILABLE: &str = "N/A";

pub fn gender_label(code: &str) -> &str {
    match code {
        "M" => "Male",
        "F" => "Female",
        other => other,
    }
}

fn channel_label(code: &str) -> &str {
    match code {
        "BR" => "Regular Branch (BR)",
        "SB" => "Sub-Branch (SB)",
        other => other,
    }
}

/// Prefixes each row with its one-based rank.
fn ranked_rows<K, F>(rankings: &[Ranking<K>], cells: F) -> Vec<Vec<String>>
where
    F: Fn(&GroupAggregate<K>) -> Vec<String>,
{
    rankings
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut row = vec![(i + 1).to_string()];
            row.extend(cells(&r.group));
            row
        })
        .collect()
}

fn names(keys: &[&str]) -> String {
    if keys.is_empty() {
        "None".to_string()
    } else {
        keys.join(", ")
    }
}

/// Renders the full client profile. Identical analyses rendered with the
/// same timestamp produce identical text.
pub fn render_client_report(
    analysis: &ClientAnalysis,
    config: &AnalysisConfig,
    source: &SourceSummary,
    generated_at: NaiveDateTime,
) -> String {
    let mut md = String::with_capacity(64 * 1024);
    md.push_str("# 📊 Client Profile Analysis\n\n");
    md.push_str(&format!(
        "**Analysis Date:** {}  \n",
        generated_at.format(TIMESTAMP_FORMAT)
    ));
    md.push_str(&format!("**Data Source:** {}  \n", source.file_name()));
    md.push_str(&format!(
        "**Total Clients Analysed:** {}\n\n---\n\n",
        count(analysis.overview.total_clients)
    ));

    executive_summary(&mut md, analysis);
    key_findings(&mut md, analysis, config);
    segmentation(&mut md, analysis, config);
    demographics(&mut md, analysis, config);
    occupations(&mut md, analysis);
    geography(&mut md, analysis);
    channels(&mut md, analysis);
    relationship_managers(&mut md, analysis, config);
    lifetime_value(&mut md, analysis, config);
    city_potential(&mut md, analysis, config);
    exchanges(&mut md, analysis);
    categories(&mut md, analysis);
    allocation(&mut md, analysis, config);
    cohorts(&mut md, analysis);
    recommendations(&mut md, analysis, config);
    data_quality(&mut md, analysis, source);

    md.push_str(&format!(
        "---\n\n*Report generated on {} from {} ({} clients)*\n",
        generated_at.format(TIMESTAMP_FORMAT),
        source.file_name(),
        count(analysis.overview.total_clients)
    ));
    md
}

fn executive_summary(md: &mut String, a: &ClientAnalysis) {
    let o = &a.overview;
    md.push_str("## 📈 EXECUTIVE SUMMARY\n\n");
    md.push_str(&table(
        &["Metric", "Value"],
        vec![
            vec!["Total Clients".into(), count(o.total_clients)],
            vec![
                "Active Clients".into(),
                format!("{} ({})", count(o.active_clients), pct(o.active_rate)),
            ],
            vec![
                "Dormant Clients".into(),
                format!("{} ({})", count(o.dormant_clients), pct(o.dormant_rate)),
            ],
            vec!["Total AUM (Holdings)".into(), format_currency(o.total_holdings)],
            vec!["Total Net Worth".into(), format_currency(o.total_net_worth)],
            vec!["Total Brokerage Generated".into(), format_currency(o.total_brokerage)],
            vec!["Total Net P&L".into(), format_currency(o.total_net_pl)],
            vec![
                "Average Holdings per Client".into(),
                format_currency(o.avg_holdings_per_client),
            ],
            vec![
                "Average Brokerage per Active Client".into(),
                format_currency(o.avg_brokerage_per_active),
            ],
        ],
    ));
    md.push('\n');
}

fn key_findings(md: &mut String, a: &ClientAnalysis, config: &AnalysisConfig) {
    md.push_str("## 🎯 KEY FINDINGS\n\n");
    md.push_str(&format!(
        "1. **Activation:** {} of clients are active ({} of {})\n",
        pct(a.overview.active_rate),
        count(a.overview.active_clients),
        count(a.overview.total_clients)
    ));
    let located = |ranking: &[Ranking<&str>]| {
        ranking.first().map_or(NOT_AVAILABLE.to_string(), |r| {
            format!(
                "{} with {} clients and {} AUM",
                r.group.key,
                count(r.group.count),
                format_currency(r.group.sum(HOLDINGS))
            )
        })
    };
    md.push_str(&format!("2. **Top State:** {}\n", located(&a.states)));
    md.push_str(&format!("3. **Top City:** {}\n", located(&a.cities)));
    md.push_str(&format!(
        "4. **Median Age:** {}\n",
        a.age_summary
            .as_ref()
            .map_or(NOT_AVAILABLE.to_string(), |s| format!("{:.0} years", s.median))
    ));
    let peak_band = top_n_by(&a.age_bands, |g| g.count as f64, 1);
    md.push_str(&format!(
        "5. **Peak Age Band:** {}\n",
        peak_band.first().map_or(NOT_AVAILABLE.to_string(), |r| format!(
            "{} with {} clients",
            bin_label(&config.age_bands, r.group.key),
            count(r.group.count)
        ))
    ));
    md.push_str(&format!(
        "6. **Top Occupation:** {}\n\n",
        a.occupations.first().map_or(NOT_AVAILABLE.to_string(), |r| format!(
            "{} with {} AUM",
            r.group.key,
            format_currency(r.group.sum(HOLDINGS))
        ))
    ));
}

fn segmentation(md: &mut String, a: &ClientAnalysis, config: &AnalysisConfig) {
    let total = a.overview.total_clients as f64;
    md.push_str("## 📊 CLIENT SEGMENTATION BY AUM\n\n");
    md.push_str(&table(
        &[
            "Segment",
            "Clients",
            "% of Base",
            "Total Holdings",
            "Avg Holdings",
            "Brokerage",
            "Active Clients",
        ],
        a.segments.iter().map(|g| {
            vec![
                bin_label(&config.aum_segments, g.key).to_string(),
                count(g.count),
                pct(rate(g.count as f64, total)),
                format_currency(g.sum(HOLDINGS)),
                format_currency(g.mean(HOLDINGS)),
                format_currency(g.sum(BROKERAGE)),
                count(g.sum(ACTIVE) as usize),
            ]
        }),
    ));

    let c = &a.concentration;
    md.push_str("\n### AUM Concentration Analysis\n\n");
    md.push_str(&format!(
        "- **Top 1% of clients** ({}) hold {}, {} of total AUM\n",
        count(c.top_1pct_clients),
        format_currency(c.top_1pct_holdings),
        pct(c.top_1pct_share)
    ));
    md.push_str(&format!(
        "- **Top 10% of clients** ({}) hold {}, {} of total AUM\n",
        count(c.top_10pct_clients),
        format_currency(c.top_10pct_holdings),
        pct(c.top_10pct_share)
    ));
    md.push_str(&format!(
        "- **Bottom 50% of clients** ({}) hold {}, {} of total AUM\n\n",
        count(c.bottom_50pct_clients),
        format_currency(c.bottom_50pct_holdings),
        pct(c.bottom_50pct_share)
    ));
}

fn demographics(md: &mut String, a: &ClientAnalysis, config: &AnalysisConfig) {
    md.push_str("## 👥 DEMOGRAPHIC ANALYSIS\n\n### Age Distribution\n\n");
    if a.age_bands.is_empty() {
        md.push_str("No valid ages recorded.\n\n");
    } else {
        md.push_str(&table(
            &["Age Band", "Clients", "Total Holdings", "Brokerage", "Avg Holdings"],
            a.age_bands.iter().map(|g| {
                vec![
                    bin_label(&config.age_bands, g.key).to_string(),
                    count(g.count),
                    format_currency(g.sum(HOLDINGS)),
                    format_currency(g.sum(BROKERAGE)),
                    format_currency(g.mean(HOLDINGS)),
                ]
            }),
        ));
        md.push('\n');
        if let Some(peak) = top_n_by(&a.age_bands, |g| g.sum(HOLDINGS), 1).first() {
            md.push_str(&format!(
                "- **Peak AUM age band:** {} ({})\n",
                bin_label(&config.age_bands, peak.group.key),
                format_currency(peak.metric)
            ));
        }
        if let Some(ages) = &a.age_summary {
            md.push_str(&format!(
                "- **Median age:** {:.0} years (range {:.0} to {:.0})\n",
                ages.median, ages.min, ages.max
            ));
        }
        md.push('\n');
    }

    genders(md, a, &config.age_bands);
}

fn genders(md: &mut String, a: &ClientAnalysis, age_bands: &BinSpec) {
    md.push_str("### Gender Distribution\n\n");
    if a.genders.is_empty() {
        md.push_str("No gender data available.\n\n");
        return;
    }
    let known = total_count(&a.genders) as f64;
    md.push_str(&table(
        &[
            "Gender",
            "Clients",
            "% of Known",
            "Total Holdings",
            "Avg Holdings",
            "Brokerage",
            "Active",
            "Avg Age",
            "Avg Equity",
            "Avg MF/Bond",
        ],
        a.genders.iter().map(|g| {
            vec![
                gender_label(g.key).to_string(),
                count(g.count),
                pct(rate(g.count as f64, known)),
                format_currency(g.sum(HOLDINGS)),
                format_currency(g.mean(HOLDINGS)),
                format_currency(g.sum(BROKERAGE)),
                count(g.sum(ACTIVE) as usize),
                format!("{:.0} yrs", g.mean(AGE)),
                format_currency(g.mean(EQUITY)),
                format_currency(g.mean(MF_BOND)),
            ]
        }),
    ));
    md.push('\n');

    let find = |code: &str| a.genders.iter().find(|g| g.key == code);
    if let (Some(male), Some(female)) = (find("M"), find("F")) {
        let holdings = column_total(&a.genders, HOLDINGS);
        md.push_str("**Gender Insights:**\n\n");
        md.push_str(&format!(
            "- **Client split:** {} male, {} female\n",
            pct(rate(male.count as f64, known)),
            pct(rate(female.count as f64, known))
        ));
        md.push_str(&format!(
            "- **AUM split:** {} male, {} female\n",
            pct(rate(male.sum(HOLDINGS), holdings)),
            pct(rate(female.sum(HOLDINGS), holdings))
        ));
        let (male_avg, female_avg) = (male.mean(HOLDINGS), female.mean(HOLDINGS));
        md.push_str(&format!(
            "- **Average holdings:** {} male, {} female\n",
            format_currency(male_avg),
            format_currency(female_avg)
        ));
        if male_avg > female_avg && female_avg > 0.0 {
            md.push_str(&format!(
                "- **Gap ratio:** male clients hold {:.2}x the female average\n",
                male_avg / female_avg
            ));
        } else if female_avg > male_avg && male_avg > 0.0 {
            md.push_str(&format!(
                "- **Female advantage:** female clients hold {:.2}x the male average\n",
                female_avg / male_avg
            ));
        }
        md.push('\n');
    }

    md.push_str("### Gender × Occupation\n\n");
    for (gender, top) in &a.gender_occupations {
        md.push_str(&format!("#### {} - Top Occupations\n\n", gender_label(gender)));
        md.push_str(&table(
            &["Rank", "Occupation", "Clients", "Holdings"],
            ranked_rows(top, |g| {
                vec![
                    g.key.1.to_string(),
                    count(g.count),
                    format_currency(g.sum(HOLDINGS)),
                ]
            }),
        ));
        md.push('\n');
    }

    if !a.gender_ages.is_empty() {
        md.push_str("### Gender × Age Band\n\n");
        md.push_str(&table(
            &["Gender", "Age Band", "Clients", "Holdings"],
            a.gender_ages.iter().map(|g| {
                vec![
                    gender_label(g.key.0).to_string(),
                    bin_label(age_bands, g.key.1).to_string(),
                    count(g.count),
                    format_currency(g.sum(HOLDINGS)),
                ]
            }),
        ));
        md.push('\n');
    }
}

fn occupations(md: &mut String, a: &ClientAnalysis) {
    md.push_str("## 💼 OCCUPATION ANALYSIS\n\n");
    md.push_str(&table(
        &["Rank", "Occupation", "Clients", "Total Holdings", "Avg Holdings", "Brokerage"],
        ranked_rows(&a.occupations, |g| {
            vec![
                g.key.to_string(),
                count(g.count),
                format_currency(g.sum(HOLDINGS)),
                format_currency(g.mean(HOLDINGS)),
                format_currency(g.sum(BROKERAGE)),
            ]
        }),
    ));
    md.push('\n');
}

fn geography(md: &mut String, a: &ClientAnalysis) {
    md.push_str("## 📍 GEOGRAPHIC INTELLIGENCE\n\n### Top States by AUM\n\n");
    md.push_str(&table(
        &["Rank", "State", "Clients", "Total Holdings", "Brokerage", "Activation Rate"],
        ranked_rows(&a.states, |g| {
            vec![
                g.key.to_string(),
                count(g.count),
                format_currency(g.sum(HOLDINGS)),
                format_currency(g.sum(BROKERAGE)),
                pct(activation_rate(g)),
            ]
        }),
    ));
    md.push_str("\n### Top Cities by AUM\n\n");
    md.push_str(&table(
        &[
            "Rank",
            "City",
            "Clients",
            "Total Holdings",
            "Avg Holdings",
            "Brokerage",
            "Activation Rate",
        ],
        ranked_rows(&a.cities, |g| {
            vec![
                g.key.to_string(),
                count(g.count),
                format_currency(g.sum(HOLDINGS)),
                format_currency(g.mean(HOLDINGS)),
                format_currency(g.sum(BROKERAGE)),
                pct(activation_rate(g)),
            ]
        }),
    ));
    md.push('\n');
}

fn channels(md: &mut String, a: &ClientAnalysis) {
    md.push_str("## 🏦 BRANCH CHANNEL ANALYSIS\n\n");
    if a.channels.is_empty() {
        md.push_str("No branch channel data available.\n\n");
        return;
    }
    let total = total_count(&a.channels) as f64;
    md.push_str(&table(
        &["Channel", "Clients", "% of Channel Clients", "Total Holdings", "Brokerage", "Active"],
        a.channels.iter().map(|g| {
            vec![
                channel_label(g.key).to_string(),
                count(g.count),
                pct(rate(g.count as f64, total)),
                format_currency(g.sum(HOLDINGS)),
                format_currency(g.sum(BROKERAGE)),
                count(g.sum(ACTIVE) as usize),
            ]
        }),
    ));
    md.push('\n');
}

fn relationship_managers(md: &mut String, a: &ClientAnalysis, config: &AnalysisConfig) {
    let rms = &a.rms;
    let total = a.overview.total_clients as f64;
    md.push_str("## 👔 RELATIONSHIP MANAGER (RM) PERFORMANCE\n\n");
    md.push_str(&format!(
        "- **RMs with at least {} clients:** {}\n",
        config.min_group_size,
        count(rms.eligible)
    ));
    md.push_str(&format!(
        "- **Clients with an assigned RM:** {} ({})\n",
        count(rms.assigned_clients),
        pct(rate(rms.assigned_clients as f64, total))
    ));
    md.push_str(&format!(
        "- **Unassigned clients:** {} ({})\n\n",
        count(rms.unassigned_clients),
        pct(rate(rms.unassigned_clients as f64, total))
    ));
    if rms.eligible == 0 {
        md.push_str(&format!(
            "No RM manages at least {} clients.\n\n",
            config.min_group_size
        ));
        return;
    }

    md.push_str("### Top RMs by AUM\n\n");
    md.push_str(&table(
        &["Rank", "RM", "Clients", "Total AUM", "Avg AUM", "Brokerage"],
        ranked_rows(&rms.by_aum, |g| {
            vec![
                g.key.to_string(),
                count(g.count),
                format_currency(g.sum(HOLDINGS)),
                format_currency(g.mean(HOLDINGS)),
                format_currency(g.sum(BROKERAGE)),
            ]
        }),
    ));
    md.push_str("\n### Top RMs by Brokerage\n\n");
    md.push_str(&table(
        &["Rank", "RM", "Clients", "Brokerage", "Brokerage per Client"],
        ranked_rows(&rms.by_brokerage, |g| {
            vec![
                g.key.to_string(),
                count(g.count),
                format_currency(g.sum(BROKERAGE)),
                format_currency(brokerage_per_client(g)),
            ]
        }),
    ));
    md.push_str("\n### Top RMs by Activation Rate\n\n");
    md.push_str(&table(
        &["Rank", "RM", "Clients", "Active", "Activation Rate"],
        ranked_rows(&rms.by_activation, |g| {
            vec![
                g.key.to_string(),
                count(g.count),
                count(g.sum(ACTIVE) as usize),
                pct(activation_rate(g)),
            ]
        }),
    ));
    md.push_str(&format!(
        "\n- **Average activation rate across eligible RMs:** {}\n- **Best activation rate:** {}\n\n",
        pct(rms.average_activation),
        pct(rms.best_activation)
    ));
}

fn lifetime_value(md: &mut String, a: &ClientAnalysis, config: &AnalysisConfig) {
    let clv = &a.clv;
    md.push_str("## 💰 CLIENT LIFETIME VALUE (CLV) ANALYSIS\n\n");
    md.push_str(&format!(
        "**Model:** annual revenue = holdings × {:.2}% + brokerage; CLV = annual revenue × {} years\n\n",
        config.fee_rate * 100.0,
        config.horizon_years
    ));
    md.push_str("### CLV by AUM Segment\n\n");
    md.push_str(&table(
        &["Segment", "Clients", "Avg Annual Revenue", "Avg CLV", "Total CLV"],
        clv.by_segment.iter().map(|g| {
            vec![
                bin_label(&config.aum_segments, g.key).to_string(),
                count(g.count),
                format_currency(g.mean(ANNUAL_REVENUE)),
                format_currency(g.mean(LIFETIME_VALUE)),
                format_currency(g.sum(LIFETIME_VALUE)),
            ]
        }),
    ));
    md.push_str("\n### CLV by Age Band\n\n");
    md.push_str(&table(
        &["Age Band", "Clients", "Avg Annual Revenue", "Avg CLV", "Priority"],
        clv.by_age.iter().map(|g| {
            vec![
                bin_label(&config.age_bands, g.key).to_string(),
                count(g.count),
                format_currency(g.mean(ANNUAL_REVENUE)),
                format_currency(g.mean(LIFETIME_VALUE)),
                band_priority(&config.age_bands, g.key).to_string(),
            ]
        }),
    ));
    md.push_str(&format!(
        "\n- **Portfolio CLV:** {}\n- **Average CLV per client:** {}\n\n",
        format_currency(clv.portfolio_total),
        format_currency(clv.portfolio_mean)
    ));
}

fn band_priority(age_bands: &BinSpec, band: Bin) -> &'static str {
    band.and_then(|i| age_bands.edges().get(i))
        .map_or("Low", |lower| age_priority(*lower))
}

fn city_potential(md: &mut String, a: &ClientAnalysis, config: &AnalysisConfig) {
    let potential = &a.city_potential;
    let weights = config.potential_weights;
    md.push_str("## 🏙️ CITY-WISE TRENDS & POTENTIAL\n\n");
    md.push_str(&format!(
        "Potential score = {}% AUM (relative to the largest city) + {}% activation rate + {}% brokerage \
         (relative to the largest city), over the top {} cities by AUM with at least {} clients.\n\n",
        weights.aum,
        weights.activation,
        weights.brokerage,
        CITY_POTENTIAL_CANDIDATES,
        config.min_group_size
    ));
    md.push_str(&table(
        &[
            "Rank",
            "City",
            "Clients",
            "Activation Rate",
            "Avg AUM per Client",
            "Total AUM",
            "Potential Score",
        ],
        potential.ranked.iter().enumerate().map(|(i, r)| {
            let g = &r.group;
            vec![
                (i + 1).to_string(),
                g.key.to_string(),
                count(g.count),
                pct(activation_rate(g)),
                format_currency(g.mean(HOLDINGS)),
                format_currency(g.sum(HOLDINGS)),
                format!("{:.1}", r.metric),
            ]
        }),
    ));

    if !potential.tiers.is_empty() {
        md.push_str("\n### City AUM Tier Composition\n\n");
        md.push_str(&table(
            &["City", "Clients", "HNI+", "HNI+ %", "Affluent+", "Affluent+ %"],
            potential.tiers.iter().map(|t| {
                vec![
                    t.city.to_string(),
                    count(t.clients),
                    count(t.hni_plus),
                    pct(rate(t.hni_plus as f64, t.clients as f64)),
                    count(t.affluent_plus),
                    pct(rate(t.affluent_plus as f64, t.clients as f64)),
                ]
            }),
        ));
    }

    md.push_str(&format!(
        "\n- **High-potential cities (score > {:.0}):** {}\n",
        HIGH_POTENTIAL_SCORE,
        names(&potential.high_potential)
    ));
    md.push_str(&format!(
        "- **Reactivation targets (activation < {:.0}%):** {}\n",
        LOW_ACTIVATION_RATE,
        names(&potential.low_activation)
    ));
    md.push_str(&format!(
        "- **Emerging cities (< {} clients, avg holdings > {}):** {}\n\n",
        count(EMERGING_CITY_MAX_CLIENTS),
        format_currency(EMERGING_CITY_MIN_AVG_HOLDINGS),
        names(&potential.emerging)
    ));
}

fn exchanges(md: &mut String, a: &ClientAnalysis) {
    let total = a.overview.total_clients as f64;
    md.push_str("## 📈 EXCHANGE PARTICIPATION\n\n");
    md.push_str(&table(
        &["Rank", "Exchange(s)", "Clients", "% of Clients", "Total Holdings"],
        ranked_rows(&a.exchanges, |g| {
            vec![
                g.key.to_string(),
                count(g.count),
                pct(rate(g.count as f64, total)),
                format_currency(g.sum(HOLDINGS)),
            ]
        }),
    ));
    md.push('\n');
}

fn categories(md: &mut String, a: &ClientAnalysis) {
    let c = &a.categories;
    md.push_str("## 🏷️ CLIENT CATEGORY ANALYSIS\n\n");
    if c.top.is_empty() {
        md.push_str("No client category data available.\n\n");
        return;
    }
    let categorised = c.categorised as f64;
    md.push_str(&table(
        &[
            "Rank",
            "Category",
            "Clients",
            "% of Categorised",
            "Total Holdings",
            "Avg Holdings",
            "Brokerage",
            "Active",
            "Equity",
            "MF/Bond",
        ],
        ranked_rows(&c.top, |g| {
            vec![
                g.key.to_string(),
                count(g.count),
                pct(rate(g.count as f64, categorised)),
                format_currency(g.sum(HOLDINGS)),
                format_currency(g.mean(HOLDINGS)),
                format_currency(g.sum(BROKERAGE)),
                count(g.sum(ACTIVE) as usize),
                format_currency(g.sum(EQUITY)),
                format_currency(g.sum(MF_BOND)),
            ]
        }),
    ));
    md.push_str(&format!(
        "\n- **Categorised clients:** {} ({} of base)\n",
        count(c.categorised),
        pct(rate(categorised, a.overview.total_clients as f64))
    ));
    md.push_str(&format!("- **Uncategorised clients:** {}\n", count(c.uncategorised)));
    md.push_str(&format!("- **Distinct categories:** {}\n", count(c.category_count)));
    md.push_str(&format!("- **Top 3 categories hold:** {} of AUM\n", pct(c.top3_share)));
    md.push_str(&format!(
        "- **Average category size:** {:.0} clients\n\n",
        c.average_size
    ));
}

fn allocation(md: &mut String, a: &ClientAnalysis, config: &AnalysisConfig) {
    let al = &a.allocation;
    md.push_str("## 📊 ASSET ALLOCATION ANALYSIS\n\n");
    if al.total_allocated <= 0.0 {
        md.push_str("No asset allocation data available.\n\n");
        return;
    }
    md.push_str("### Overall Allocation\n\n");
    md.push_str(&table(
        &["Asset Class", "Amount", "% of Holdings", "% of Allocated"],
        vec![
            vec![
                "Equity".into(),
                format_currency(al.total_equity),
                pct(al.equity_pct_of_holdings),
                pct(al.equity_pct_of_allocated),
            ],
            vec![
                "MF/Bonds".into(),
                format_currency(al.total_mf_bond),
                pct(al.mf_bond_pct_of_holdings),
                pct(al.mf_bond_pct_of_allocated),
            ],
            vec![
                bold("Total Allocated"),
                format_currency(al.total_allocated),
                pct(al.allocated_pct_of_holdings),
                pct(100.0),
            ],
            vec![
                "Unallocated".into(),
                format_currency(al.unallocated),
                pct(al.unallocated_pct_of_holdings),
                "-".into(),
            ],
        ],
    ));
    let stance = if al.equity_pct_of_allocated > 60.0 {
        "aggressive (equity-heavy)"
    } else if al.equity_pct_of_allocated > 40.0 {
        "moderate (balanced)"
    } else {
        "conservative (debt-heavy)"
    };
    md.push_str(&format!("\n**Overall risk stance:** {}\n\n", stance));

    let headers = [
        "Clients",
        "Avg Equity %",
        "Avg MF/Bond %",
        "Equity",
        "MF/Bonds",
        "Holdings",
    ];
    let allocation_rows = |groups: &[GroupAggregate<Bin>], bins: &BinSpec| -> Vec<Vec<String>> {
        groups
            .iter()
            .map(|g| {
                vec![
                    bin_label(bins, g.key).to_string(),
                    count(g.count),
                    pct(g.mean(EQUITY_PCT)),
                    pct(g.mean(MF_BOND_PCT)),
                    format_currency(g.sum(EQUITY)),
                    format_currency(g.sum(MF_BOND)),
                    format_currency(g.sum(HOLDINGS)),
                ]
            })
            .collect()
    };

    md.push_str("### Allocation by AUM Segment\n\n");
    let segment_headers: Vec<&str> = std::iter::once("Segment").chain(headers).collect();
    md.push_str(&table(
        &segment_headers,
        allocation_rows(&al.by_segment, &config.aum_segments),
    ));
    md.push_str("\n### Allocation by Age Band\n\n");
    let age_headers: Vec<&str> = std::iter::once("Age Band").chain(headers).collect();
    md.push_str(&table(&age_headers, allocation_rows(&al.by_age, &config.age_bands)));
    md.push('\n');

    if let Some(top) = top_n_by(&al.by_segment, |g| g.mean(EQUITY_PCT), 1).first() {
        md.push_str(&format!(
            "- **Most equity-heavy segment:** {} ({} average equity)\n",
            bin_label(&config.aum_segments, top.group.key),
            pct(top.metric)
        ));
    }
    if let Some(top) = top_n_by(&al.by_age, |g| g.mean(EQUITY_PCT), 1).first() {
        md.push_str(&format!(
            "- **Most equity-heavy age band:** {} ({} average equity)\n",
            bin_label(&config.age_bands, top.group.key),
            pct(top.metric)
        ));
    }
    md.push_str(&format!(
        "- **Unallocated holdings:** {} ({} of AUM)\n\n",
        format_currency(al.unallocated),
        pct(al.unallocated_pct_of_holdings)
    ));
}

fn cohorts(md: &mut String, a: &ClientAnalysis) {
    md.push_str("## 📅 ACTIVATION COHORTS\n\n");
    if a.cohorts.by_year.is_empty() {
        md.push_str("No activation dates available.\n\n");
    } else {
        md.push_str(&table(
            &["Year", "Clients", "Holdings", "Active", "Activation Rate"],
            a.cohorts.by_year.iter().map(|g| {
                vec![
                    g.key.map_or(UNKNOWN_MARKER.to_string(), |y| y.to_string()),
                    count(g.count),
                    format_currency(g.sum(HOLDINGS)),
                    count(g.sum(ACTIVE) as usize),
                    pct(activation_rate(g)),
                ]
            }),
        ));
        md.push('\n');
    }
    md.push_str(&format!(
        "Clients without a usable activation date: {}\n\n",
        count(a.cohorts.unknown_dates)
    ));
}

fn recommendations(md: &mut String, a: &ClientAnalysis, config: &AnalysisConfig) {
    let o = &a.overview;
    let mut items = Vec::new();

    if o.dormant_clients > 0 {
        items.push(format!(
            "**Reactivate dormant clients:** {} clients ({}) hold nothing and trade nothing; \
             a targeted reactivation campaign is the cheapest growth lever.",
            count(o.dormant_clients),
            pct(o.dormant_rate)
        ));
    }
    if let Some(peak) = top_n_by(&a.age_bands, |g| g.sum(HOLDINGS), 1).first() {
        items.push(format!(
            "**Focus on peak-wealth investors:** the {} band holds the most AUM ({}).",
            bin_label(&config.age_bands, peak.group.key),
            format_currency(peak.metric)
        ));
    }
    if let Some(state) = a.states.first() {
        items.push(format!(
            "**Deepen the leading geography:** {} holds {} of total AUM.",
            state.group.key,
            pct(rate(state.group.sum(HOLDINGS), o.total_holdings))
        ));
    }
    if let Some(female) = a.genders.iter().find(|g| g.key == "F") {
        items.push(format!(
            "**Grow female participation:** women are {} of clients with a recorded gender.",
            pct(rate(female.count as f64, total_count(&a.genders) as f64))
        ));
    }
    if a.rms.unassigned_clients > 0 {
        items.push(format!(
            "**Extend RM coverage:** {} clients ({}) have no relationship manager.",
            count(a.rms.unassigned_clients),
            pct(rate(a.rms.unassigned_clients as f64, o.total_clients as f64))
        ));
    }
    if let Some(best) = top_n_by(&a.clv.by_segment, |g| g.mean(LIFETIME_VALUE), 1).first() {
        items.push(format!(
            "**Prioritise high-value segments:** {} clients carry the highest average CLV ({}).",
            bin_label(&config.aum_segments, best.group.key),
            format_currency(best.metric)
        ));
    }
    if !a.city_potential.high_potential.is_empty() {
        items.push(format!(
            "**Expand in high-potential cities:** {}.",
            a.city_potential.high_potential.join(", ")
        ));
    }
    if let Some(occupation) = a.occupations.first() {
        items.push(format!(
            "**Target leading professions:** {} clients hold {} of AUM.",
            occupation.group.key,
            format_currency(occupation.group.sum(HOLDINGS))
        ));
    }
    if let Some(sub_branch) = a.channels.iter().find(|g| g.key == "SB") {
        items.push(format!(
            "**Support the sub-branch channel:** sub-branches serve {} of channel clients.",
            pct(rate(sub_branch.count as f64, total_count(&a.channels) as f64))
        ));
    }

    md.push_str("## 💡 STRATEGIC RECOMMENDATIONS\n\n");
    if items.is_empty() {
        md.push_str("Not enough data for recommendations.\n\n");
        return;
    }
    for (i, item) in items.iter().enumerate() {
        md.push_str(&format!("{}. {}\n", i + 1, item));
    }
    md.push('\n');
}

fn data_quality(md: &mut String, a: &ClientAnalysis, source: &SourceSummary) {
    let q = &a.data_quality;
    let total = a.overview.total_clients as f64;
    let line = |label: &str, n: usize| {
        format!("- **{}:** {} ({})\n", label, count(n), pct(rate(n as f64, total)))
    };
    md.push_str("## 📋 DATA QUALITY NOTES\n\n");
    md.push_str(&line("Missing Age", q.missing_age));
    md.push_str(&line("Missing Gender", q.missing_gender));
    md.push_str(&line("Missing State", q.missing_state));
    md.push_str(&line("Missing RM", q.missing_rm));
    md.push_str(&line("Zero Holdings", q.zero_holdings));
    md.push_str("\n### Loading and Normalization\n\n");
    md.push_str(&source.quality_notes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::client_analysis::analyze_clients;
    use crate::models::client::fixtures::client;
    use crate::models::client::ClientRecord;
    use crate::models::stats_models::{LoadReport, NormalizationReport};
    use chrono::NaiveDate;
    use std::path::Path;

    fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 31)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn records() -> Vec<ClientRecord> {
        (0..40)
            .map(|i| ClientRecord {
                gender: if i % 3 == 0 { "F" } else { "M" }.to_string(),
                age: 25.0 + (i % 40) as f64,
                city: if i % 2 == 0 { "Pune" } else { "Surat" }.to_string(),
                state: if i % 2 == 0 { "Maharashtra" } else { "Gujarat" }.to_string(),
                occupation: "Business".to_string(),
                branch_channel: if i % 4 == 0 { "SB" } else { "BR" }.to_string(),
                equity: 10_000.0 * i as f64,
                mf_bond: 2_000.0 * i as f64,
                ..client(&format!("C{}", i), 50_000.0 * i as f64, 100.0 * (i % 5) as f64)
            })
            .collect()
    }

    fn render(records: &[ClientRecord]) -> String {
        let config = AnalysisConfig::default();
        let load = LoadReport {
            rows_seen: records.len(),
            rows_loaded: records.len(),
            skipped_rows: 0,
            encoding: Some("utf-8"),
        };
        let normalization = NormalizationReport::default();
        let source = SourceSummary {
            path: Path::new("clients.csv"),
            load: &load,
            normalization: &normalization,
        };
        let analysis = analyze_clients(records, &config);
        render_client_report(&analysis, &config, &source, generated_at())
    }

    #[test]
    fn test_render_is_deterministic() {
        let records = records();
        assert_eq!(render(&records), render(&records));
    }

    #[test]
    fn test_report_contains_every_section() {
        let report = render(&records());
        for heading in [
            "## 📈 EXECUTIVE SUMMARY",
            "## 🎯 KEY FINDINGS",
            "## 📊 CLIENT SEGMENTATION BY AUM",
            "### AUM Concentration Analysis",
            "## 👥 DEMOGRAPHIC ANALYSIS",
            "### Gender Distribution",
            "## 💼 OCCUPATION ANALYSIS",
            "## 📍 GEOGRAPHIC INTELLIGENCE",
            "## 🏦 BRANCH CHANNEL ANALYSIS",
            "## 👔 RELATIONSHIP MANAGER (RM) PERFORMANCE",
            "## 💰 CLIENT LIFETIME VALUE (CLV) ANALYSIS",
            "## 🏙️ CITY-WISE TRENDS & POTENTIAL",
            "## 📈 EXCHANGE PARTICIPATION",
            "## 🏷️ CLIENT CATEGORY ANALYSIS",
            "## 📊 ASSET ALLOCATION ANALYSIS",
            "## 📅 ACTIVATION COHORTS",
            "## 💡 STRATEGIC RECOMMENDATIONS",
            "## 📋 DATA QUALITY NOTES",
        ] {
            assert!(report.contains(heading), "missing {}", heading);
        }
        assert!(report.contains("**Analysis Date:** 2024-03-31 09:30:00"));
        assert!(report.contains("| Micro (<₹5L) |"));
        assert!(report.contains("Regular Branch (BR)"));
        assert!(report.contains("- **Client split:**"));
    }

    #[test]
    fn test_empty_input_renders_placeholders() {
        let report = render(&[]);
        assert!(report.contains("No gender data available."));
        assert!(report.contains("No asset allocation data available."));
        assert!(report.contains("**Top State:** N/A"));
    }

    #[test]
    fn test_band_priority_uses_lower_edge() {
        let config = AnalysisConfig::default();
        let band = config.age_bands.bin(30.0);
        assert_eq!(band_priority(&config.age_bands, band), "**HIGH** (Long lifetime)");
        assert_eq!(band_priority(&config.age_bands, None), "Low");
    }
}
