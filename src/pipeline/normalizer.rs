// src/pipeline/normalizer.rs - Field coercion from raw cells to typed records
//
// Every coercion degrades to a default instead of failing: numbers to 0,
// text to the unknown marker, dates to `ActivationDate::Unknown`. The only
// errors raised here are for tables missing a required column.
use anyhow::{bail, Result};
use chrono::{NaiveDate, NaiveDateTime};
use indicatif::ProgressBar;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::loading::RawTable;
use crate::models::client::{ActivationDate, ClientRecord};
use crate::models::partner::PartnerRecord;
use crate::models::stats_models::NormalizationReport;
use crate::utils::constants::UNKNOWN_MARKER;

/// Thousands separators, quotes and stray whitespace inside numbers.
static NUMERIC_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[,"'\s]"#).unwrap());

/// Textual spellings of "no value" produced by upstream exports.
const NULL_SPELLINGS: [&str; 4] = ["nan", "null", "none", "nat"];

const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d-%b-%y", "%d-%b-%Y", "%d %b %Y",
];
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M:%S",
];

/// Outcome of coercing one field. All variants carry a usable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced<T> {
    Parsed(T),
    Missing(T),
    Malformed(T),
}

impl<T> Coerced<T> {
    pub fn into_value(self) -> T {
        match self {
            Coerced::Parsed(v) | Coerced::Missing(v) | Coerced::Malformed(v) => v,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Coerced::Missing(_))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Coerced::Malformed(_))
    }
}

fn is_null_spelling(trimmed: &str) -> bool {
    trimmed.is_empty() || NULL_SPELLINGS.iter().any(|n| trimmed.eq_ignore_ascii_case(n))
}

/// Parses a decimal after stripping separators and quotes. Missing,
/// unparseable and non-finite inputs become exactly 0.
pub fn coerce_numeric(raw: Option<&str>) -> Coerced<f64> {
    let Some(raw) = raw else {
        return Coerced::Missing(0.0);
    };
    let cleaned = NUMERIC_NOISE.replace_all(raw, "");
    if is_null_spelling(&cleaned) {
        return Coerced::Missing(0.0);
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Coerced::Parsed(v),
        _ => Coerced::Malformed(0.0),
    }
}

/// Trims surrounding whitespace; missing values become the unknown marker.
pub fn coerce_text(raw: Option<&str>) -> Coerced<String> {
    match raw.map(str::trim) {
        Some(trimmed) if !is_null_spelling(trimmed) => Coerced::Parsed(trimmed.to_string()),
        _ => Coerced::Missing(UNKNOWN_MARKER.to_string()),
    }
}

/// Trimmed and upper-cased; the unknown marker is left as is.
pub fn coerce_code(raw: Option<&str>) -> Coerced<String> {
    match coerce_text(raw) {
        Coerced::Parsed(text) => Coerced::Parsed(text.to_uppercase()),
        other => other,
    }
}

/// Tolerant date parse over the supported formats.
pub fn coerce_date(raw: Option<&str>) -> Coerced<ActivationDate> {
    let trimmed = match raw.map(str::trim) {
        Some(t) if !is_null_spelling(t) => t,
        _ => return Coerced::Missing(ActivationDate::Unknown),
    };
    for fmt in DATETIME_FORMATS.iter() {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Coerced::Parsed(ActivationDate::Known(dt.date()));
        }
    }
    for fmt in DATE_FORMATS.iter() {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Coerced::Parsed(ActivationDate::Known(date));
        }
    }
    Coerced::Malformed(ActivationDate::Unknown)
}

/// Reads typed fields out of one raw row, counting degradations.
struct RowReader<'a> {
    row: &'a [Option<String>],
    report: &'a mut NormalizationReport,
}

impl<'a> RowReader<'a> {
    fn cell(&self, col: Option<usize>) -> Option<&'a str> {
        col.and_then(|i| self.row.get(i)).and_then(|c| c.as_deref())
    }

    fn numeric(&mut self, col: Option<usize>) -> f64 {
        let coerced = coerce_numeric(self.cell(col));
        if col.is_some() {
            if coerced.is_malformed() {
                self.report.numeric_malformed += 1;
            } else if coerced.is_missing() {
                self.report.numeric_missing += 1;
            }
        }
        coerced.into_value()
    }

    fn text(&mut self, col: Option<usize>) -> String {
        let coerced = coerce_text(self.cell(col));
        self.count_categorical(col, &coerced);
        coerced.into_value()
    }

    fn code(&mut self, col: Option<usize>) -> String {
        let coerced = coerce_code(self.cell(col));
        self.count_categorical(col, &coerced);
        coerced.into_value()
    }

    fn date(&mut self, col: Option<usize>) -> ActivationDate {
        let coerced = coerce_date(self.cell(col));
        if col.is_some() && !matches!(coerced, Coerced::Parsed(_)) {
            self.report.dates_unknown += 1;
        }
        coerced.into_value()
    }

    fn count_categorical(&mut self, col: Option<usize>, coerced: &Coerced<String>) {
        if col.is_some() && coerced.is_missing() {
            self.report.categorical_missing += 1;
        }
    }
}

/// Resolves a required column or fails the run.
fn required(table: &RawTable, aliases: &[&str]) -> Result<usize> {
    match table.resolve(aliases) {
        Some(i) => Ok(i),
        None => bail!(
            "required column {} is absent from the source header {:?}",
            aliases.join(" / "),
            table.headers
        ),
    }
}

/// Resolves an optional column, noting its absence in the report.
fn optional(table: &RawTable, aliases: &[&str], report: &mut NormalizationReport) -> Option<usize> {
    let found = table.resolve(aliases);
    if found.is_none() {
        warn!("Optional column {} not found; values default", aliases[0]);
        report.absent_columns.push(aliases[0].to_string());
    }
    found
}

struct ClientColumns {
    code: usize,
    holdings: usize,
    brokerage: usize,
    net_worth: Option<usize>,
    net_pl: Option<usize>,
    age: Option<usize>,
    equity: Option<usize>,
    mf_bond: Option<usize>,
    city: Option<usize>,
    state: Option<usize>,
    occupation: Option<usize>,
    gender: Option<usize>,
    status: Option<usize>,
    category: Option<usize>,
    branch_channel: Option<usize>,
    branch_code: Option<usize>,
    exchanges: Option<usize>,
    rm_name: Option<usize>,
    activation_date: Option<usize>,
}

impl ClientColumns {
    fn resolve(table: &RawTable, report: &mut NormalizationReport) -> Result<Self> {
        Ok(Self {
            code: required(table, &["OOWNCODE"])?,
            holdings: required(table, &["TOTALHOLDING"])?,
            brokerage: required(table, &["TOTALBRKG"])?,
            net_worth: optional(table, &["NETWORTH"], report),
            net_pl: optional(table, &["NETTOPL"], report),
            age: optional(table, &["AGE"], report),
            equity: optional(table, &["NVL(EQUITYHOLD,0)", "EQUITYHOLD"], report),
            mf_bond: optional(table, &["MF_BOND"], report),
            city: optional(table, &["CITY"], report),
            state: optional(table, &["STATE"], report),
            occupation: optional(table, &["COCCUPATION"], report),
            gender: optional(table, &["CGENDER"], report),
            status: optional(table, &["CSTATUS"], report),
            category: optional(table, &["CUCCCLIENTCATEGORY"], report),
            branch_channel: optional(table, &["BRHOSB"], report),
            branch_code: optional(table, &["BRCODE"], report),
            exchanges: optional(table, &["EXCHANGES"], report),
            rm_name: optional(table, &["RMNAME"], report),
            activation_date: optional(table, &["ACTIVATIONDATE"], report),
        })
    }
}

/// Builds typed client records from the raw table and drops records with
/// negative holdings. Fails only when a required column is absent.
pub fn normalize_clients(
    table: &RawTable,
    progress: Option<&ProgressBar>,
) -> Result<(Vec<ClientRecord>, NormalizationReport)> {
    let mut report = NormalizationReport::default();
    let cols = ClientColumns::resolve(table, &mut report)?;
    let mut seen_codes: HashSet<String> = HashSet::with_capacity(table.len());
    let mut records = Vec::with_capacity(table.len());

    for row in &table.rows {
        let mut rd = RowReader {
            row,
            report: &mut report,
        };
        let record = ClientRecord {
            client_code: rd.text(Some(cols.code)),
            holdings: rd.numeric(Some(cols.holdings)),
            net_worth: rd.numeric(cols.net_worth),
            brokerage: rd.numeric(Some(cols.brokerage)),
            net_pl: rd.numeric(cols.net_pl),
            age: rd.numeric(cols.age),
            equity: rd.numeric(cols.equity),
            mf_bond: rd.numeric(cols.mf_bond),
            city: rd.text(cols.city),
            state: rd.text(cols.state),
            occupation: rd.text(cols.occupation),
            gender: rd.code(cols.gender),
            status: rd.code(cols.status),
            client_category: rd.text(cols.category),
            branch_channel: rd.code(cols.branch_channel),
            branch_code: rd.text(cols.branch_code),
            exchanges: rd.text(cols.exchanges),
            rm_name: rd.text(cols.rm_name),
            activation_date: rd.date(cols.activation_date),
        };
        if !seen_codes.insert(record.client_code.clone()) {
            report.duplicate_identifiers += 1;
        }
        records.push(record);
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    let records = exclude_negative_holdings(records, &mut report);
    debug!("Client normalization report: {:?}", report);
    Ok((records, report))
}

/// Negative holdings cannot be segmented; such records leave the analysed set.
pub fn exclude_negative_holdings(
    records: Vec<ClientRecord>,
    report: &mut NormalizationReport,
) -> Vec<ClientRecord> {
    let before = records.len();
    let kept: Vec<ClientRecord> = records.into_iter().filter(|r| r.holdings >= 0.0).collect();
    report.negative_holdings_excluded += before - kept.len();
    kept
}

/// Builds typed partner records from the partner sheet.
pub fn normalize_partners(table: &RawTable) -> Result<(Vec<PartnerRecord>, NormalizationReport)> {
    let mut report = NormalizationReport::default();
    let code = required(table, &["BRCODE"])?;
    let state = optional(table, &["STATE"], &mut report);
    let clients = optional(table, &["NOOFCLIENTS"], &mut report);
    let holdings = optional(table, &["TOTALHOLDING"], &mut report);

    let mut seen_codes: HashSet<String> = HashSet::with_capacity(table.len());
    let mut partners = Vec::with_capacity(table.len());
    for row in &table.rows {
        let mut rd = RowReader {
            row,
            report: &mut report,
        };
        let partner = PartnerRecord {
            partner_code: rd.text(Some(code)),
            state: rd.text(state),
            declared_clients: rd.numeric(clients),
            declared_holdings: rd.numeric(holdings),
        };
        if !seen_codes.insert(partner.partner_code.clone()) {
            report.duplicate_identifiers += 1;
        }
        partners.push(partner);
    }
    Ok((partners, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| crate::loading::to_cell(c)).collect())
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_numeric_strips_separators_and_quotes() {
        assert_eq!(coerce_numeric(Some("\"1,20,000.50\"")), Coerced::Parsed(120000.5));
        assert_eq!(coerce_numeric(Some(" -42 ")), Coerced::Parsed(-42.0));
        assert_eq!(coerce_numeric(Some("'7'")), Coerced::Parsed(7.0));
    }

    #[test]
    fn test_numeric_defaults_to_zero() {
        assert_eq!(coerce_numeric(None), Coerced::Missing(0.0));
        assert_eq!(coerce_numeric(Some("nan")), Coerced::Missing(0.0));
        assert_eq!(coerce_numeric(Some("abc")), Coerced::Malformed(0.0));
        assert_eq!(coerce_numeric(Some("inf")), Coerced::Malformed(0.0));
        assert_eq!(coerce_numeric(Some("1.2.3")), Coerced::Malformed(0.0));
    }

    #[test]
    fn test_text_and_code() {
        assert_eq!(coerce_text(Some("  Pune ")).into_value(), "Pune");
        assert_eq!(coerce_text(None).into_value(), UNKNOWN_MARKER);
        assert!(coerce_text(Some("   ")).is_missing());
        assert_eq!(coerce_code(Some(" m ")).into_value(), "M");
        assert_eq!(coerce_code(Some("NaN")).into_value(), UNKNOWN_MARKER);
    }

    #[test]
    fn test_dates() {
        let expected = ActivationDate::Known(NaiveDate::from_ymd_opt(2021, 3, 15).unwrap());
        assert_eq!(coerce_date(Some("2021-03-15")).into_value(), expected);
        assert_eq!(coerce_date(Some("15-MAR-2021")).into_value(), expected);
        assert_eq!(coerce_date(Some("15-Mar-21")).into_value(), expected);
        assert_eq!(coerce_date(Some("2021-03-15 10:30:00")).into_value(), expected);
        assert_eq!(coerce_date(Some("15/03/2021")).into_value(), expected);
        assert!(coerce_date(Some("yesterday")).is_malformed());
        assert!(coerce_date(None).is_missing());
        assert_eq!(coerce_date(Some("31/02/2021")).into_value(), ActivationDate::Unknown);
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let t = table(&["OOWNCODE", "TOTALHOLDING"], &[&["A1", "10"]]);
        let err = normalize_clients(&t, None).unwrap_err();
        assert!(err.to_string().contains("TOTALBRKG"));
    }

    #[test]
    fn test_normalize_clients_counts_degradations() {
        let t = table(
            &["OOWNCODE", "TOTALHOLDING", "TOTALBRKG", "CGENDER", "ACTIVATIONDATE", "CITY"],
            &[
                &["A1", "1,000", "5", " f ", "2020-01-02", "Pune"],
                &["A2", "oops", "", "M", "not a date", ""],
                &["A2", "-50", "0", "", "", "Delhi"],
            ],
        );
        let (records, report) = normalize_clients(&t, None).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].holdings, 1000.0);
        assert_eq!(records[0].gender, "F");
        assert_eq!(records[1].holdings, 0.0);
        assert_eq!(records[1].city, UNKNOWN_MARKER);
        assert_eq!(records[1].activation_date, ActivationDate::Unknown);

        assert_eq!(report.numeric_malformed, 1);
        assert_eq!(report.numeric_missing, 1);
        assert_eq!(report.dates_unknown, 2);
        assert_eq!(report.categorical_missing, 2);
        assert_eq!(report.duplicate_identifiers, 1);
        assert_eq!(report.negative_holdings_excluded, 1);
        assert!(report.absent_columns.contains(&"RMNAME".to_string()));
    }

    #[test]
    fn test_equity_column_alias() {
        let t = table(
            &["OOWNCODE", "TOTALHOLDING", "TOTALBRKG", "EQUITYHOLD"],
            &[&["A1", "100", "0", "60"]],
        );
        let (records, _) = normalize_clients(&t, None).unwrap();
        assert_eq!(records[0].equity, 60.0);
    }

    #[test]
    fn test_normalize_partners() {
        let t = table(
            &["BRCODE", "STATE", "NOOFCLIENTS", "TOTALHOLDING"],
            &[&[" B1 ", "Maharashtra", "120", "\"5,00,000\""], &["B2", "", "x", ""]],
        );
        let (partners, report) = normalize_partners(&t).unwrap();
        assert_eq!(partners[0].partner_code, "B1");
        assert_eq!(partners[0].declared_holdings, 500000.0);
        assert_eq!(partners[1].state, UNKNOWN_MARKER);
        assert_eq!(partners[1].declared_clients, 0.0);
        assert_eq!(report.numeric_malformed, 1);
    }
}
