//! Topology data sources: the HTTP API and direct PostgreSQL access.

mod client;

pub use client::ApiClient;

use thiserror::Error;

use crate::db::DbClient;
use crate::graph::types::NetworkNode;
use crate::settings::{Settings, SourceKind};

/// Failure to obtain a node snapshot
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to decode node list: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Anything that can produce the current topology snapshot.
pub trait NodeSource: Send {
    fn fetch_nodes(&self) -> Result<Vec<NetworkNode>, SourceError>;

    /// Cheap reachability probe
    fn health(&self) -> Result<(), SourceError>;

    /// Human-readable origin for the status line
    fn describe(&self) -> String;
}

/// Connect to the source selected in `settings`.
pub fn open_source(settings: &Settings) -> Result<Box<dyn NodeSource>, SourceError> {
    match settings.source {
        SourceKind::Api => Ok(Box::new(ApiClient::new(settings.api_url())?)),
        SourceKind::Database => Ok(Box::new(DbClient::connect(&settings.database_url())?)),
    }
}
