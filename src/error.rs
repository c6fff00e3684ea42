use std::path::PathBuf;
use thiserror::Error;

/// Startup failures while reading the input tables. All of them are fatal.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in {table} table: {source}")]
    Record {
        table: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{table} table, record {record}: invalid coordinate {column} = {value:?}")]
    Coordinate {
        table: &'static str,
        record: usize,
        column: &'static str,
        value: String,
    },

    #[error("{table} table is empty")]
    Empty { table: &'static str },

    #[error("cannot read boundaries {path}: {reason}")]
    Boundaries { path: PathBuf, reason: String },
}

/// Invalid command-line configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("jitter sigma must be at least 1e-9 degrees, got {0}")]
    InvalidSigma(f64),

    #[error("unknown {group} code {code:?}")]
    UnknownCode { group: &'static str, code: String },
}
