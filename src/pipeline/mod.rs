pub mod aggregator;
pub mod derived;
pub mod normalizer;
pub mod ranker;
