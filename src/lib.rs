pub mod config;
pub mod data;
pub mod db;
pub mod enrich;
pub mod error;
pub mod feed;
pub mod monitoring;
pub mod polls;
