// src/pipeline/derived.rs - Per-record derived fields
use anyhow::{bail, Result};
use serde::Serialize;

use crate::models::client::ClientRecord;

/// Ordered bins over a continuous value. Bin `i` covers
/// `[edges[i], edges[i + 1])` and the last bin is unbounded, so a value on
/// an edge falls into the higher bin. Values below the first edge have no bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinSpec {
    edges: Vec<f64>,
    labels: Vec<String>,
}

impl BinSpec {
    pub fn new(edges: Vec<f64>, labels: Vec<String>) -> Result<Self> {
        if edges.is_empty() {
            bail!("bin specification needs at least one edge");
        }
        if edges.len() != labels.len() {
            bail!(
                "bin specification has {} edges but {} labels",
                edges.len(),
                labels.len()
            );
        }
        if edges.iter().any(|e| !e.is_finite()) {
            bail!("bin edges must be finite: {:?}", edges);
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            bail!("bin edges must be strictly increasing: {:?}", edges);
        }
        Ok(Self { edges, labels })
    }

    /// Builds a spec from constant tables known to be well formed.
    pub fn from_static(edges: &[f64], labels: &[&str]) -> Self {
        debug_assert!(!edges.is_empty() && edges.len() == labels.len());
        debug_assert!(edges.windows(2).all(|w| w[0] < w[1]));
        Self {
            edges: edges.to_vec(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Index of the bin holding `value`, if any.
    pub fn bin(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value < self.edges[0] {
            return None;
        }
        Some(self.edges.partition_point(|edge| *edge <= value) - 1)
    }

    pub fn label(&self, index: usize) -> &str {
        &self.labels[index]
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Revenue assumptions: an annual fee on holdings plus brokerage, held for
/// a fixed horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueModel {
    pub fee_rate: f64,
    pub horizon_years: f64,
}

impl ValueModel {
    pub fn annual_revenue(&self, holdings: f64, brokerage: f64) -> f64 {
        holdings * self.fee_rate + brokerage
    }

    pub fn lifetime_value(&self, annual_revenue: f64) -> f64 {
        annual_revenue * self.horizon_years
    }
}

/// Bin specifications used to derive client segments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSegmentation {
    pub aum: BinSpec,
    pub age: BinSpec,
}

/// A client record plus everything computed from it.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedClient<'a> {
    pub record: &'a ClientRecord,
    pub is_active: bool,
    /// Index into the AUM bin labels.
    pub aum_segment: Option<usize>,
    /// Index into the age bin labels; `None` when age is not positive.
    pub age_band: Option<usize>,
    pub equity_pct: f64,
    pub mf_bond_pct: f64,
    pub annual_revenue: f64,
    pub lifetime_value: f64,
}

impl DerivedClient<'_> {
    pub fn active_flag(&self) -> f64 {
        if self.is_active {
            1.0
        } else {
            0.0
        }
    }

    pub fn activation_year(&self) -> Option<i32> {
        self.record.activation_date.year()
    }
}

/// A client is active when it shows any holdings or any brokerage.
pub fn is_active(holdings: f64, brokerage: f64) -> bool {
    holdings > 0.0 || brokerage > 0.0
}

/// `part / whole * 100`, clamped to [0, 100]; zero for a zero whole or a
/// non-finite ratio.
pub fn guarded_pct(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let pct = part / whole * 100.0;
    if pct.is_finite() {
        pct.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

pub fn derive_client<'a>(
    record: &'a ClientRecord,
    segmentation: &ClientSegmentation,
    model: &ValueModel,
) -> DerivedClient<'a> {
    debug_assert!(
        record.holdings >= 0.0,
        "negative holdings must be excluded before segmentation"
    );
    let annual_revenue = model.annual_revenue(record.holdings, record.brokerage);
    DerivedClient {
        record,
        is_active: is_active(record.holdings, record.brokerage),
        aum_segment: segmentation.aum.bin(record.holdings),
        age_band: if record.has_valid_age() {
            segmentation.age.bin(record.age)
        } else {
            None
        },
        equity_pct: guarded_pct(record.equity, record.holdings),
        mf_bond_pct: guarded_pct(record.mf_bond, record.holdings),
        annual_revenue,
        lifetime_value: model.lifetime_value(annual_revenue),
    }
}

pub fn derive_clients<'a>(
    records: &'a [ClientRecord],
    segmentation: &ClientSegmentation,
    model: &ValueModel,
) -> Vec<DerivedClient<'a>> {
    records
        .iter()
        .map(|record| derive_client(record, segmentation, model))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::client::fixtures::client;
    use crate::utils::config::AnalysisConfig;

    fn segmentation() -> ClientSegmentation {
        let config = AnalysisConfig::default();
        ClientSegmentation {
            aum: config.aum_segments,
            age: config.age_bands,
        }
    }

    const MODEL: ValueModel = ValueModel {
        fee_rate: 0.02,
        horizon_years: 5.0,
    };

    #[test]
    fn test_bin_edges_belong_to_higher_bin() {
        let bins = BinSpec::new(
            vec![0.0, 10.0, 20.0],
            vec!["low".into(), "mid".into(), "high".into()],
        )
        .unwrap();
        assert_eq!(bins.bin(0.0), Some(0));
        assert_eq!(bins.bin(9.999), Some(0));
        assert_eq!(bins.bin(10.0), Some(1));
        assert_eq!(bins.bin(20.0), Some(2));
        assert_eq!(bins.bin(1e12), Some(2));
        assert_eq!(bins.bin(-1.0), None);
        assert_eq!(bins.bin(f64::NAN), None);
    }

    #[test]
    fn test_bin_spec_validation() {
        assert!(BinSpec::new(vec![0.0, 0.0], vec!["a".into(), "b".into()]).is_err());
        assert!(BinSpec::new(vec![0.0, 5.0], vec!["a".into()]).is_err());
        assert!(BinSpec::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_activity_flag_matches_definition() {
        for (h, b) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (5.0, 5.0)] {
            let record = client("C", h, b);
            let derived = derive_client(&record, &segmentation(), &MODEL);
            assert_eq!(derived.is_active, h > 0.0 || b > 0.0);
        }
    }

    #[test]
    fn test_three_client_scenario() {
        let seg = segmentation();
        let records = vec![
            client("A", 0.0, 0.0),
            client("B", 600_000.0, 100.0),
            client("C", 12_000_000.0, 0.0),
        ];
        let derived = derive_clients(&records, &seg, &MODEL);
        let labels: Vec<&str> = derived
            .iter()
            .map(|d| seg.aum.label(d.aum_segment.unwrap()))
            .collect();
        assert!(labels[0].starts_with("Micro"));
        assert!(labels[1].starts_with("Small"));
        assert!(labels[2].starts_with("HNI"));
        assert_eq!(derived.iter().filter(|d| d.is_active).count(), 2);
        assert_eq!(derived.iter().filter(|d| !d.is_active).count(), 1);
    }

    #[test]
    fn test_aum_edge_value_lands_in_higher_segment() {
        let seg = segmentation();
        assert!(seg.aum.label(seg.aum.bin(500_000.0).unwrap()).starts_with("Small"));
        assert!(seg.aum.label(seg.aum.bin(499_999.99).unwrap()).starts_with("Micro"));
        assert!(seg.aum.label(seg.aum.bin(70_000_000.0).unwrap()).starts_with("Ultra"));
    }

    #[test]
    fn test_percentages_guarded() {
        assert_eq!(guarded_pct(0.0, 0.0), 0.0);
        assert_eq!(guarded_pct(10.0, 0.0), 0.0);
        assert_eq!(guarded_pct(25.0, 100.0), 25.0);
        assert_eq!(guarded_pct(150.0, 100.0), 100.0);
        assert_eq!(guarded_pct(-5.0, 100.0), 0.0);
        assert_eq!(guarded_pct(1e308, 1e-10), 0.0);

        let record = client("Z", 0.0, 0.0);
        let derived = derive_client(&record, &segmentation(), &MODEL);
        assert_eq!(derived.equity_pct, 0.0);
        assert_eq!(derived.mf_bond_pct, 0.0);
    }

    #[test]
    fn test_age_band_requires_positive_age() {
        let seg = segmentation();
        let mut record = client("A", 10.0, 0.0);
        assert_eq!(derive_client(&record, &seg, &MODEL).age_band, None);
        record.age = 25.0;
        let band = derive_client(&record, &seg, &MODEL).age_band.unwrap();
        assert_eq!(seg.age.label(band), "25-35");
    }

    #[test]
    fn test_revenue_and_lifetime_value() {
        let record = client("A", 1_000_000.0, 500.0);
        let derived = derive_client(&record, &segmentation(), &MODEL);
        assert!((derived.annual_revenue - 20_500.0).abs() < 1e-9);
        assert!((derived.lifetime_value - 102_500.0).abs() < 1e-9);
    }
}
