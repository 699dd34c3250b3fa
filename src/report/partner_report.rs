// src/report/partner_report.rs - Markdown rendering of the partner profile
use chrono::NaiveDateTime;

use super::format::{count, format_currency, pct, table};
use super::{bin_label, SourceSummary, TIMESTAMP_FORMAT};
use crate::analysis::columns::*;
use crate::analysis::partner_analysis::{
    avg_equity_pct, categorised_total, PartnerAnalysis, PartnerProfile, RankedPartner,
};
use crate::pipeline::aggregator::total_count;
use crate::pipeline::ranker::rate;
use crate::utils::config::AnalysisConfig;
use crate::utils::constants::{
    AGGRESSIVE_EQUITY_PCT, CONSERVATIVE_MF_BOND_PCT, DIVERSE_CATEGORY_COUNT, SPECIALIST_CATEGORIES,
    SPECIALIST_SHARE,
};

const NOT_AVAILABLE: &str = "N/A";

fn optional_pct(value: Option<f64>) -> String {
    value.map_or(NOT_AVAILABLE.to_string(), pct)
}

fn partner_rows<F>(ranked: &[RankedPartner], cells: F) -> Vec<Vec<String>>
where
    F: Fn(&PartnerProfile) -> Vec<String>,
{
    ranked
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut row = vec![
                (i + 1).to_string(),
                r.profile.partner.partner_code.clone(),
                r.profile.partner.state.clone(),
            ];
            row.extend(cells(&r.profile));
            row
        })
        .collect()
}

/// Clients, holdings and both allocation shares of a partner.
fn allocation_cells(profile: &PartnerProfile) -> Vec<String> {
    match profile.metrics {
        Some(m) => vec![
            count(m.client_count),
            format_currency(m.total_holdings),
            pct(m.equity_pct),
            pct(m.mf_bond_pct),
        ],
        None => vec!["0".into(), format_currency(0.0), NOT_AVAILABLE.into(), NOT_AVAILABLE.into()],
    }
}

/// Renders the partner profile from the joined partner analysis.
pub fn render_partner_report(
    analysis: &PartnerAnalysis,
    config: &AnalysisConfig,
    clients: &SourceSummary,
    partners: &SourceSummary,
    generated_at: NaiveDateTime,
) -> String {
    let mut md = String::with_capacity(32 * 1024);
    md.push_str("# 🤝 Partner Profile Analysis\n\n");
    md.push_str(&format!(
        "**Generated:** {}  \n",
        generated_at.format(TIMESTAMP_FORMAT)
    ));
    md.push_str(&format!(
        "**Data Sources:** {} (clients), {} (partners)\n\n---\n\n",
        clients.file_name(),
        partners.file_name()
    ));

    executive_summary(&mut md, analysis);
    segmentation(&mut md, analysis, config);
    categories(&mut md, analysis, config);
    diversity(&mut md, analysis);
    portfolio_types(&mut md, analysis, config);
    allocation_leaders(&mut md, analysis);
    segment_allocation(&mut md, analysis, config);
    specialization(&mut md, analysis);
    insights(&mut md, analysis, config);

    md.push_str("## 📋 DATA QUALITY NOTES\n\n");
    md.push_str(&clients.quality_notes());
    md.push_str(&partners.quality_notes());
    md.push_str(&format!(
        "---\n\n*Report generated on {} for {} partners*\n",
        generated_at.format(TIMESTAMP_FORMAT),
        count(analysis.overview.total_partners)
    ));
    md
}

fn executive_summary(md: &mut String, a: &PartnerAnalysis) {
    let o = &a.overview;
    md.push_str("## 📈 EXECUTIVE SUMMARY\n\n");
    md.push_str(&table(
        &["Metric", "Value"],
        vec![
            vec!["Total Partners".into(), count(o.total_partners)],
            vec![
                "Partners with Mapped Clients".into(),
                format!(
                    "{} ({})",
                    count(o.partners_with_clients),
                    pct(rate(o.partners_with_clients as f64, o.total_partners as f64))
                ),
            ],
            vec!["Categorised Clients".into(), count(o.categorised_clients)],
            vec!["Clients Mapped to Partners".into(), count(o.clients_mapped)],
            vec!["Holdings Mapped".into(), format_currency(o.holdings_mapped)],
            vec![
                "Equity".into(),
                format!("{} ({})", format_currency(o.total_equity), pct(o.equity_share)),
            ],
            vec![
                "MF/Bonds".into(),
                format!("{} ({})", format_currency(o.total_mf_bond), pct(o.mf_bond_share)),
            ],
            vec!["Average Partner Equity %".into(), pct(o.avg_equity_pct)],
        ],
    ));
    md.push('\n');
}

fn segmentation(md: &mut String, a: &PartnerAnalysis, config: &AnalysisConfig) {
    let partners = a.overview.total_partners as f64;
    md.push_str("## 📊 PARTNER SEGMENTATION\n\n");
    md.push_str("Segments follow the client count declared on the partner sheet.\n\n");
    md.push_str(&table(
        &[
            "Segment",
            "Partners",
            "% of Partners",
            "Mapped Clients",
            "Mapped Holdings",
            "Avg Equity %",
        ],
        a.segments.iter().map(|g| {
            vec![
                bin_label(&config.partner_segments, g.key).to_string(),
                count(g.count),
                pct(rate(g.count as f64, partners)),
                count(g.sum(CLIENTS) as usize),
                format_currency(g.sum(HOLDINGS)),
                optional_pct(avg_equity_pct(g)),
            ]
        }),
    ));
    md.push('\n');
}

fn categories(md: &mut String, a: &PartnerAnalysis, config: &AnalysisConfig) {
    md.push_str("## 🏷️ CLIENT CATEGORY DISTRIBUTION\n\n");
    if a.categories.is_empty() {
        md.push_str("No categorised clients mapped to partners.\n\n");
        return;
    }
    let categorised = categorised_total(&a.categories) as f64;
    md.push_str(&table(
        &[
            "Rank",
            "Category",
            "Clients",
            "% of Categorised",
            "Holdings",
            "Avg Holdings",
            "Brokerage",
            "Equity",
            "MF/Bonds",
        ],
        a.categories
            .iter()
            .take(config.top_n.categories)
            .enumerate()
            .map(|(i, r)| {
                let g = &r.group;
                vec![
                    (i + 1).to_string(),
                    g.key.to_string(),
                    count(g.count),
                    pct(rate(g.count as f64, categorised)),
                    format_currency(g.sum(HOLDINGS)),
                    format_currency(g.mean(HOLDINGS)),
                    format_currency(g.sum(BROKERAGE)),
                    format_currency(g.sum(EQUITY)),
                    format_currency(g.sum(MF_BOND)),
                ]
            }),
    ));
    md.push('\n');
}

fn diversity(md: &mut String, a: &PartnerAnalysis) {
    md.push_str("## 🌈 CATEGORY DIVERSITY\n\n");
    md.push_str(&table(
        &["Rank", "Partner", "State", "Categories", "Clients", "Holdings"],
        partner_rows(&a.most_diverse, |p| {
            vec![
                p.category_diversity.to_string(),
                count(p.metrics.map_or(0, |m| m.client_count)),
                format_currency(p.metrics.map_or(0.0, |m| m.total_holdings)),
            ]
        }),
    ));
    md.push('\n');
}

fn portfolio_types(md: &mut String, a: &PartnerAnalysis, config: &AnalysisConfig) {
    md.push_str("## ⚖️ PORTFOLIO RISK PROFILE\n\n");
    if a.portfolio_types.is_empty() {
        md.push_str("No partner has mapped clients.\n\n");
        return;
    }
    let typed = total_count(&a.portfolio_types) as f64;
    md.push_str(&table(
        &[
            "Portfolio Type",
            "Partners",
            "% of Partners with Clients",
            "Clients",
            "Holdings",
            "Avg Equity %",
        ],
        a.portfolio_types.iter().map(|g| {
            vec![
                bin_label(&config.portfolio_types, g.key).to_string(),
                count(g.count),
                pct(rate(g.count as f64, typed)),
                count(g.sum(CLIENTS) as usize),
                format_currency(g.sum(HOLDINGS)),
                optional_pct(avg_equity_pct(g)),
            ]
        }),
    ));
    md.push('\n');
}

fn allocation_leaders(md: &mut String, a: &PartnerAnalysis) {
    let headers = [
        "Rank",
        "Partner",
        "State",
        "Clients",
        "Holdings",
        "Equity %",
        "MF/Bond %",
    ];
    md.push_str("## 🔥 TOP AGGRESSIVE PARTNERS (Highest Equity %)\n\n");
    md.push_str(&table(&headers, partner_rows(&a.top_equity, allocation_cells)));
    md.push_str("\n## 🛡️ TOP CONSERVATIVE PARTNERS (Highest MF/Bond %)\n\n");
    md.push_str(&table(&headers, partner_rows(&a.top_mf_bond, allocation_cells)));
    md.push('\n');
}

fn segment_allocation(md: &mut String, a: &PartnerAnalysis, config: &AnalysisConfig) {
    md.push_str("## 📊 ASSET ALLOCATION BY PARTNER SEGMENT\n\n");
    md.push_str(&table(
        &[
            "Segment",
            "Partners with Clients",
            "Avg Equity %",
            "Avg MF/Bond %",
            "Equity",
            "MF/Bonds",
        ],
        a.segment_allocation.iter().map(|g| {
            vec![
                bin_label(&config.partner_segments, g.key).to_string(),
                count(g.count),
                pct(g.mean(EQUITY_PCT)),
                pct(g.mean(MF_BOND_PCT)),
                format_currency(g.sum(EQUITY)),
                format_currency(g.sum(MF_BOND)),
            ]
        }),
    ));
    md.push('\n');
}

fn specialization(md: &mut String, a: &PartnerAnalysis) {
    md.push_str("## 🎯 CATEGORY SPECIALIZATION\n\n");
    md.push_str(&format!(
        "Partners where one of the top {} categories makes up more than {:.0}% of their clients.\n\n",
        SPECIALIST_CATEGORIES,
        SPECIALIST_SHARE * 100.0
    ));
    if a.specialists.is_empty() {
        md.push_str("No category specialists found.\n\n");
        return;
    }
    for group in &a.specialists {
        md.push_str(&format!(
            "### {} Specialists ({} partners)\n\n",
            group.category,
            count(group.partner_count)
        ));
        md.push_str(&table(
            &[
                "Rank",
                "Partner",
                "State",
                "Total Clients",
                "Category Clients",
                "Category %",
                "Declared Holdings",
            ],
            group.top.iter().enumerate().map(|(i, row)| {
                vec![
                    (i + 1).to_string(),
                    row.partner_code.to_string(),
                    row.state.to_string(),
                    count(row.total_clients),
                    count(row.category_clients),
                    pct(row.category_pct),
                    format_currency(row.declared_holdings),
                ]
            }),
        ));
        md.push('\n');
    }
}

fn insights(md: &mut String, a: &PartnerAnalysis, config: &AnalysisConfig) {
    let i = &a.insights;
    let with_clients = a.overview.partners_with_clients as f64;
    md.push_str("## 💡 STRATEGIC INSIGHTS\n\n");

    md.push_str("### 1. Portfolio Risk\n\n");
    md.push_str(&format!(
        "- **{} partners** ({} of partners with clients) run books with at least {:.0}% equity\n",
        count(i.aggressive),
        pct(rate(i.aggressive as f64, with_clients)),
        AGGRESSIVE_EQUITY_PCT
    ));
    md.push_str(&format!(
        "- **{} partners** hold at least {:.0}% in mutual funds and bonds\n\n",
        count(i.conservative),
        CONSERVATIVE_MF_BOND_PCT
    ));

    md.push_str("### 2. Diversification\n\n");
    md.push_str(&format!(
        "- **{} partners** serve {} or more client categories\n",
        count(i.diverse),
        DIVERSE_CATEGORY_COUNT
    ));
    if let Some((category, share)) = i.dominant_category {
        md.push_str(&format!(
            "- **{}** is the largest category by holdings, with {} of categorised clients\n",
            category,
            pct(share)
        ));
    }
    md.push('\n');

    md.push_str("### 3. Segment Comparison\n\n");
    let largest = a.segments.iter().filter_map(|g| g.key).max();
    md.push_str(&format!(
        "- **{}** partners average {} equity\n",
        bin_label(&config.partner_segments, largest),
        optional_pct(i.largest_segment_equity)
    ));
    md.push_str(&format!(
        "- **{}** partners average {} equity\n\n",
        bin_label(&config.partner_segments, Some(0)),
        optional_pct(i.smallest_segment_equity)
    ));

    md.push_str("### 4. Geographic Spread\n\n");
    if i.top_states.is_empty() {
        md.push_str("No partner states recorded.\n\n");
        return;
    }
    md.push_str(&table(
        &["Rank", "State", "Partners", "Mapped Holdings", "Avg Equity %"],
        i.top_states.iter().enumerate().map(|(rank, r)| {
            let g = &r.group;
            vec![
                (rank + 1).to_string(),
                g.key.to_string(),
                count(g.count),
                format_currency(g.sum(HOLDINGS)),
                optional_pct(avg_equity_pct(g)),
            ]
        }),
    ));
    md.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::partner_analysis::analyze_partners;
    use crate::models::client::fixtures::client;
    use crate::models::client::ClientRecord;
    use crate::models::partner::PartnerRecord;
    use crate::models::stats_models::{LoadReport, NormalizationReport};
    use chrono::NaiveDate;
    use std::path::Path;

    fn book() -> (Vec<ClientRecord>, Vec<PartnerRecord>) {
        let clients = (0..12)
            .map(|i| ClientRecord {
                branch_code: if i < 8 { "P1" } else { "P2" }.to_string(),
                client_category: ["Individual", "HUF", "Corporate"][i % 3].to_string(),
                equity: 900.0,
                mf_bond: 100.0,
                ..client(&format!("C{}", i), 1000.0, 10.0)
            })
            .collect();
        let partners = vec![
            PartnerRecord {
                partner_code: "P1".into(),
                state: "Maharashtra".into(),
                declared_clients: 8.0,
                declared_holdings: 8000.0,
            },
            PartnerRecord {
                partner_code: "P2".into(),
                state: "Gujarat".into(),
                declared_clients: 650.0,
                declared_holdings: 4000.0,
            },
            PartnerRecord {
                partner_code: "P3".into(),
                state: "Gujarat".into(),
                declared_clients: 12.0,
                declared_holdings: 0.0,
            },
        ];
        (clients, partners)
    }

    fn render() -> String {
        let (clients, partners) = book();
        let config = AnalysisConfig::default();
        let analysis = analyze_partners(&clients, &partners, &config);
        let load = LoadReport::default();
        let normalization = NormalizationReport::default();
        let client_source = SourceSummary {
            path: Path::new("clients.csv"),
            load: &load,
            normalization: &normalization,
        };
        let partner_source = SourceSummary {
            path: Path::new("partners.xlsx"),
            load: &load,
            normalization: &normalization,
        };
        let generated_at = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        render_partner_report(&analysis, &config, &client_source, &partner_source, generated_at)
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(render(), render());
    }

    #[test]
    fn test_report_sections_and_values() {
        let report = render();
        for heading in [
            "## 📈 EXECUTIVE SUMMARY",
            "## 📊 PARTNER SEGMENTATION",
            "## 🏷️ CLIENT CATEGORY DISTRIBUTION",
            "## 🌈 CATEGORY DIVERSITY",
            "## ⚖️ PORTFOLIO RISK PROFILE",
            "## 🔥 TOP AGGRESSIVE PARTNERS (Highest Equity %)",
            "## 🛡️ TOP CONSERVATIVE PARTNERS (Highest MF/Bond %)",
            "## 📊 ASSET ALLOCATION BY PARTNER SEGMENT",
            "## 🎯 CATEGORY SPECIALIZATION",
            "## 💡 STRATEGIC INSIGHTS",
            "## 📋 DATA QUALITY NOTES",
        ] {
            assert!(report.contains(heading), "missing {}", heading);
        }
        assert!(report.contains(
            "**Data Sources:** clients.csv (clients), partners.xlsx (partners)"
        ));
        assert!(report.contains("| Total Partners | 3 |"));
        assert!(report.contains("| Growth (90-95%) |"));
        // P3 has no mapped clients, so its segment average is undefined
        assert!(report.contains("| Small (10-50) | 1 | 33.3% | 0 | ₹0 | N/A |"));
        assert!(report.contains("**Mega (500+)** partners average 90.0% equity"));
    }
}
