//! Error types
//!
//! Only ingestion and configuration loading can fail. Everything that happens once a
//! graph exists (bad parameters, numeric blow-ups) is repaired in place and logged.

use thiserror::Error;

/// Errors that can occur while loading relationship records
#[derive(Error, Debug)]
pub enum LoadError {
    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV source could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is missing from the header row
    #[error("missing required column: {0}")]
    MissingColumn(String),

    /// The source contained no usable records
    #[error("no usable relationship records")]
    Empty,
}

/// Result type for dataset loading
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors that can occur while loading a layout configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML document could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;
