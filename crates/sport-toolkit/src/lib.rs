//! Sport-data toolkit for Garmin Connect and Strava
//!
//! - `client`: HTTP clients for both vendors, token handling
//! - `streams`: per-sample metric extraction and moving-time reconstruction
//! - `models`: vendor response types built on the stream engine
//! - `storage` / `export`: a local SQLite mirror of a Strava account
//! - `analysis`: cross-vendor matching and mirror queries

pub mod analysis;
pub mod cli;
pub mod client;
pub mod config;
pub mod dates;
pub mod error;
pub mod export;
pub mod models;
pub mod segments;
pub mod storage;
pub mod streams;

pub use error::{Result, SportError};
