// src/models/partner.rs
use serde::Serialize;

/// One normalized row of the partner sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerRecord {
    /// Branch / partner code, joined against `ClientRecord::branch_code`.
    pub partner_code: String,
    pub state: String,
    /// Client count declared on the partner sheet.
    pub declared_clients: f64,
    /// Holdings declared on the partner sheet.
    pub declared_holdings: f64,
}
