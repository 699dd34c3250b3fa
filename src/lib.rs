pub mod analysis;
pub mod loading;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod utils;
