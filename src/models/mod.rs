pub mod client;
pub mod partner;
pub mod stats_models;
