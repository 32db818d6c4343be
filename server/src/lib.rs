pub mod cli;
pub mod ingestion;
pub mod models;
pub mod services;
