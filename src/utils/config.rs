// src/utils/config.rs
use anyhow::{bail, Context, Result};
use log::info;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::pipeline::derived::{BinSpec, ClientSegmentation, ValueModel};
use crate::pipeline::ranker::validate_weights;

const AUM_EDGES: [f64; 6] = [0.0, 500_000.0, 2_000_000.0, 5_500_000.0, 10_000_000.0, 70_000_000.0];
const AUM_LABELS: [&str; 6] = [
    "Micro (<₹5L)",
    "Small (₹5-20L)",
    "Affluent (₹20-55L)",
    "Upper Affluent (₹55L-1Cr)",
    "HNI (₹1-7Cr)",
    "Ultra HNI (>₹7Cr)",
];
const AGE_EDGES: [f64; 6] = [0.0, 25.0, 35.0, 45.0, 55.0, 65.0];
const AGE_LABELS: [&str; 6] = ["<25", "25-35", "35-45", "45-55", "55-65", "65+"];
const PARTNER_EDGES: [f64; 5] = [0.0, 10.0, 50.0, 200.0, 500.0];
const PARTNER_LABELS: [&str; 5] = [
    "Micro (<10)",
    "Small (10-50)",
    "Medium (50-200)",
    "Large (200-500)",
    "Mega (500+)",
];
const PORTFOLIO_EDGES: [f64; 4] = [0.0, 70.0, 90.0, 95.0];
const PORTFOLIO_LABELS: [&str; 4] = [
    "Conservative (<70% Equity)",
    "Balanced (70-90%)",
    "Growth (90-95%)",
    "Aggressive (95%+)",
];

/// How many rows each ranked report section keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopN {
    pub occupations: usize,
    pub states: usize,
    pub cities: usize,
    pub rms: usize,
    pub exchanges: usize,
    pub categories: usize,
    pub city_potential: usize,
    pub gender_occupations: usize,
    pub partners: usize,
    pub specialists: usize,
}

impl Default for TopN {
    fn default() -> Self {
        Self {
            occupations: 15,
            states: 15,
            cities: 20,
            rms: 15,
            exchanges: 10,
            categories: 15,
            city_potential: 20,
            gender_occupations: 5,
            partners: 20,
            specialists: 10,
        }
    }
}

/// Weights of the city potential score. They must add up to 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PotentialWeights {
    pub aum: f64,
    pub activation: f64,
    pub brokerage: f64,
}

impl Default for PotentialWeights {
    fn default() -> Self {
        Self {
            aum: 40.0,
            activation: 30.0,
            brokerage: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub client_csv_path: PathBuf,
    pub partner_sheet_path: PathBuf,
    pub client_report_path: PathBuf,
    pub partner_report_path: PathBuf,

    pub aum_segments: BinSpec,
    pub age_bands: BinSpec,
    pub partner_segments: BinSpec,
    pub portfolio_types: BinSpec,

    pub fee_rate: f64,
    pub horizon_years: f64,
    pub min_group_size: usize,
    pub top_n: TopN,
    pub potential_weights: PotentialWeights,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            client_csv_path: PathBuf::from("data/cldetailnew_1.csv"),
            partner_sheet_path: PathBuf::from("data/ppdata.xlsx"),
            client_report_path: PathBuf::from("reports/CLIENT_PROFILE.md"),
            partner_report_path: PathBuf::from("reports/PARTNER_PROFILE.md"),
            aum_segments: BinSpec::from_static(&AUM_EDGES, &AUM_LABELS),
            age_bands: BinSpec::from_static(&AGE_EDGES, &AGE_LABELS),
            partner_segments: BinSpec::from_static(&PARTNER_EDGES, &PARTNER_LABELS),
            portfolio_types: BinSpec::from_static(&PORTFOLIO_EDGES, &PORTFOLIO_LABELS),
            fee_rate: 0.02,
            horizon_years: 5.0,
            min_group_size: 10,
            top_n: TopN::default(),
            potential_weights: PotentialWeights::default(),
        }
    }
}

impl AnalysisConfig {
    /// Reads the configuration from environment variables, falling back to
    /// the defaults for anything unset. Malformed values are errors.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, over an arbitrary variable source.
    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let path = |name: &str, default: PathBuf| {
            lookup(name).map(PathBuf::from).unwrap_or(default)
        };

        let top = defaults.top_n;
        let weights = defaults.potential_weights;

        let config = Self {
            client_csv_path: path("CLIENT_CSV_PATH", defaults.client_csv_path),
            partner_sheet_path: path("PARTNER_SHEET_PATH", defaults.partner_sheet_path),
            client_report_path: path("CLIENT_REPORT_PATH", defaults.client_report_path),
            partner_report_path: path("PARTNER_REPORT_PATH", defaults.partner_report_path),
            aum_segments: bins_var(&lookup, "AUM_SEGMENT", defaults.aum_segments)?,
            age_bands: bins_var(&lookup, "AGE_BAND", defaults.age_bands)?,
            partner_segments: bins_var(&lookup, "PARTNER_SEGMENT", defaults.partner_segments)?,
            portfolio_types: bins_var(&lookup, "PORTFOLIO_TYPE", defaults.portfolio_types)?,
            fee_rate: parsed_var(&lookup, "MANAGEMENT_FEE_RATE", defaults.fee_rate)?,
            horizon_years: parsed_var(&lookup, "CLV_HORIZON_YEARS", defaults.horizon_years)?,
            min_group_size: parsed_var(&lookup, "MIN_GROUP_SIZE", defaults.min_group_size)?,
            top_n: TopN {
                occupations: parsed_var(&lookup, "TOP_N_OCCUPATIONS", top.occupations)?,
                states: parsed_var(&lookup, "TOP_N_STATES", top.states)?,
                cities: parsed_var(&lookup, "TOP_N_CITIES", top.cities)?,
                rms: parsed_var(&lookup, "TOP_N_RMS", top.rms)?,
                exchanges: parsed_var(&lookup, "TOP_N_EXCHANGES", top.exchanges)?,
                categories: parsed_var(&lookup, "TOP_N_CATEGORIES", top.categories)?,
                city_potential: parsed_var(&lookup, "TOP_N_CITY_POTENTIAL", top.city_potential)?,
                gender_occupations: parsed_var(
                    &lookup,
                    "TOP_N_GENDER_OCCUPATIONS",
                    top.gender_occupations,
                )?,
                partners: parsed_var(&lookup, "TOP_N_PARTNERS", top.partners)?,
                specialists: parsed_var(&lookup, "TOP_N_SPECIALISTS", top.specialists)?,
            },
            potential_weights: PotentialWeights {
                aum: parsed_var(&lookup, "POTENTIAL_WEIGHT_AUM", weights.aum)?,
                activation: parsed_var(&lookup, "POTENTIAL_WEIGHT_ACTIVATION", weights.activation)?,
                brokerage: parsed_var(&lookup, "POTENTIAL_WEIGHT_BROKERAGE", weights.brokerage)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the analysis meaningless.
    pub fn validate(&self) -> Result<()> {
        if !self.fee_rate.is_finite() || self.fee_rate < 0.0 {
            bail!("management fee rate must be a non-negative number, got {}", self.fee_rate);
        }
        if !self.horizon_years.is_finite() || self.horizon_years <= 0.0 {
            bail!("lifetime value horizon must be positive, got {}", self.horizon_years);
        }
        if self.min_group_size == 0 {
            bail!("minimum group size must be at least 1");
        }
        // Zero holdings must land in the first segment.
        if let Some(first) = self.aum_segments.edges().first().filter(|e| **e > 0.0) {
            bail!("AUM segment edges must start at or below 0, got {}", first);
        }
        let w = self.potential_weights;
        validate_weights(&[w.aum, w.activation, w.brokerage])
            .context("invalid city potential weights")?;
        Ok(())
    }

    pub fn segmentation(&self) -> ClientSegmentation {
        ClientSegmentation {
            aum: self.aum_segments.clone(),
            age: self.age_bands.clone(),
        }
    }

    pub fn value_model(&self) -> ValueModel {
        ValueModel {
            fee_rate: self.fee_rate,
            horizon_years: self.horizon_years,
        }
    }

    pub fn log_config(&self) {
        info!("⚙️ Analysis configuration:");
        info!("   Client table: {}", self.client_csv_path.display());
        info!("   Partner table: {}", self.partner_sheet_path.display());
        info!("   AUM segments: {}", self.aum_segments.labels().join(", "));
        info!("   Age bands: {}", self.age_bands.labels().join(", "));
        info!(
            "   Fee rate: {:.2}%, CLV horizon: {} years",
            self.fee_rate * 100.0,
            self.horizon_years
        );
        info!("   Minimum group size for rankings: {}", self.min_group_size);
        let w = self.potential_weights;
        info!(
            "   City potential weights: AUM {}, activation {}, brokerage {}",
            w.aum, w.activation, w.brokerage
        );
    }
}

fn parsed_var<L, T>(lookup: &L, name: &str, default: T) -> Result<T>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value '{}'", name, raw)),
        None => Ok(default),
    }
}

/// Reads `<PREFIX>_EDGES` and `<PREFIX>_LABELS`, both comma separated. When
/// only one is set the other keeps its default and the pair must still agree.
fn bins_var<L>(lookup: &L, prefix: &str, default: BinSpec) -> Result<BinSpec>
where
    L: Fn(&str) -> Option<String>,
{
    let edges_var = format!("{}_EDGES", prefix);
    let labels_var = format!("{}_LABELS", prefix);
    let edges_raw = lookup(&edges_var);
    let labels_raw = lookup(&labels_var);
    if edges_raw.is_none() && labels_raw.is_none() {
        return Ok(default);
    }

    let edges = match edges_raw {
        Some(raw) => parse_edges(&raw)
            .with_context(|| format!("{} is not a list of numbers", edges_var))?,
        None => default.edges().to_vec(),
    };
    let labels = match labels_raw {
        Some(raw) => split_list(&raw),
        None => default.labels().to_vec(),
    };
    BinSpec::new(edges, labels)
        .with_context(|| format!("invalid {}_EDGES / {}_LABELS", prefix, prefix))
}

fn parse_edges(raw: &str) -> Result<Vec<f64>> {
    split_list(raw)
        .iter()
        .map(|item| {
            item.parse::<f64>()
                .with_context(|| format!("'{}' is not a number", item))
        })
        .collect()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<AnalysisConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AnalysisConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.aum_segments.len(), 6);
        assert_eq!(config.age_bands.label(5), "65+");
        assert_eq!(config.partner_segments.label(4), "Mega (500+)");
        assert_eq!(config.portfolio_types.edges(), &[0.0, 70.0, 90.0, 95.0]);
        assert_eq!(config.top_n.cities, 20);
    }

    #[test]
    fn test_empty_environment_matches_defaults() {
        assert_eq!(from_vars(&[]).unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = from_vars(&[
            ("CLIENT_CSV_PATH", "in/clients.csv"),
            ("MIN_GROUP_SIZE", "25"),
            ("MANAGEMENT_FEE_RATE", "0.01"),
            ("TOP_N_RMS", "3"),
            ("AGE_BAND_EDGES", "0, 40"),
            ("AGE_BAND_LABELS", "young,older"),
        ])
        .unwrap();
        assert_eq!(config.client_csv_path, PathBuf::from("in/clients.csv"));
        assert_eq!(config.min_group_size, 25);
        assert_eq!(config.fee_rate, 0.01);
        assert_eq!(config.top_n.rms, 3);
        assert_eq!(config.age_bands.labels(), &["young".to_string(), "older".to_string()]);
        assert_eq!(config.value_model().fee_rate, 0.01);
    }

    #[test]
    fn test_invalid_values_are_fatal() {
        assert!(from_vars(&[("MIN_GROUP_SIZE", "ten")]).is_err());
        assert!(from_vars(&[("AUM_SEGMENT_EDGES", "0,100,50,200,300,400")]).is_err());
        assert!(from_vars(&[("AGE_BAND_EDGES", "0,30")]).is_err());
        assert!(from_vars(&[("POTENTIAL_WEIGHT_AUM", "50")]).is_err());
        assert!(from_vars(&[("CLV_HORIZON_YEARS", "0")]).is_err());
        assert!(from_vars(&[("MANAGEMENT_FEE_RATE", "-0.1")]).is_err());
    }

    #[test]
    fn test_aum_segments_must_cover_zero_holdings() {
        let err = from_vars(&[
            ("AUM_SEGMENT_EDGES", "100,500000"),
            ("AUM_SEGMENT_LABELS", "small,large"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("AUM segment edges must start"));

        let config = from_vars(&[
            ("AUM_SEGMENT_EDGES", "0,500000"),
            ("AUM_SEGMENT_LABELS", "small,large"),
        ])
        .unwrap();
        assert_eq!(config.aum_segments.bin(0.0), Some(0));
    }

    #[test]
    fn test_blank_variables_fall_back() {
        let config = from_vars(&[("TOP_N_CITIES", "  ")]).unwrap();
        assert_eq!(config.top_n.cities, 20);
    }
}
