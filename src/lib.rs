pub mod config;
pub mod download;
pub mod humanize;
pub mod observability;
