// src/utils/constants.rs

/// Marker substituted for any missing categorical value so that groupings
/// never see an absent key.
pub const UNKNOWN_MARKER: &str = "unknown";

/// Gender codes that count as a known demographic.
pub const KNOWN_GENDER_CODES: [&str; 2] = ["M", "F"];

/// Branch-channel codes reported in the channel breakdown.
pub const BRANCH_CHANNEL_CODES: [&str; 2] = ["BR", "SB"];

/// Number of cities considered for the potential score before ranking.
pub const CITY_POTENTIAL_CANDIDATES: usize = 30;
/// Number of cities shown in the AUM-tier composition table.
pub const CITY_TIER_ROWS: usize = 10;
/// Potential score above which a city is called out as high-potential.
pub const HIGH_POTENTIAL_SCORE: f64 = 60.0;
/// Activation rate (percent) below which a city is a reactivation target.
pub const LOW_ACTIVATION_RATE: f64 = 40.0;
/// Emerging cities: fewer clients than this...
pub const EMERGING_CITY_MAX_CLIENTS: usize = 1000;
/// ...and average holdings above this (₹20 L).
pub const EMERGING_CITY_MIN_AVG_HOLDINGS: f64 = 2_000_000.0;
/// Number of cities listed in each city call-out.
pub const CITY_CALLOUT_ROWS: usize = 5;

/// Partner equity share (percent) that marks an aggressive book.
pub const AGGRESSIVE_EQUITY_PCT: f64 = 95.0;
/// Partner fund/bond share (percent) that marks significant debt exposure.
pub const CONSERVATIVE_MF_BOND_PCT: f64 = 30.0;
/// Distinct client categories that mark a diverse partner.
pub const DIVERSE_CATEGORY_COUNT: usize = 4;
/// Share of a partner's clients (fraction) needed to call it a category specialist.
pub const SPECIALIST_SHARE: f64 = 0.5;
/// Categories examined for specialists.
pub const SPECIALIST_CATEGORIES: usize = 5;
/// States listed in the partner geographic summary.
pub const PARTNER_TOP_STATES: usize = 5;
