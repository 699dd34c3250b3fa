// src/models/client.rs
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::utils::constants::{KNOWN_GENDER_CODES, UNKNOWN_MARKER};

/// Activation date of a client account. `Unknown` is kept distinct from any
/// real date so that date-bucketed tables can skip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ActivationDate {
    Known(NaiveDate),
    Unknown,
}

impl ActivationDate {
    pub fn year(&self) -> Option<i32> {
        match self {
            ActivationDate::Known(date) => Some(date.year()),
            ActivationDate::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, ActivationDate::Known(_))
    }
}

/// One normalized row of the client table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientRecord {
    pub client_code: String,

    pub holdings: f64,
    pub net_worth: f64,
    pub brokerage: f64,
    pub net_pl: f64,
    pub age: f64,
    pub equity: f64,
    pub mf_bond: f64,

    pub city: String,
    pub state: String,
    pub occupation: String,
    /// Upper-cased gender code.
    pub gender: String,
    /// Upper-cased client status code.
    pub status: String,
    pub client_category: String,
    /// Upper-cased branch channel (`BR`, `SB`, ...).
    pub branch_channel: String,
    /// Owning branch / partner code.
    pub branch_code: String,
    pub exchanges: String,
    pub rm_name: String,

    pub activation_date: ActivationDate,
}

/// True unless the value is the unknown marker.
pub fn is_known(value: &str) -> bool {
    value != UNKNOWN_MARKER
}

impl ClientRecord {
    /// A client's gender is known iff the code is `M` or `F`. Every gender
    /// table and the data-quality note use this one definition.
    pub fn has_known_gender(&self) -> bool {
        KNOWN_GENDER_CODES.contains(&self.gender.as_str())
    }

    pub fn has_rm(&self) -> bool {
        is_known(&self.rm_name)
    }

    pub fn has_valid_age(&self) -> bool {
        self.age > 0.0
    }
}
