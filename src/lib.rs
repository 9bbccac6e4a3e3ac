pub mod aggregation;
pub mod commands;
pub mod config;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod history_parser;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod query;
pub mod stats;
