//! Direct PostgreSQL access to the crawler's `nodes` table using sqlx.

use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;

use crate::api::{NodeSource, SourceError};
use crate::graph::types::NetworkNode;

/// Row returned from the node query
#[derive(Debug, FromRow)]
struct NodeRow {
    ip_addr: Option<String>,
    name: Option<String>,
    domains: Option<Vec<String>>,
    neighbours: Option<Vec<String>>,
}

impl From<NodeRow> for NetworkNode {
    fn from(row: NodeRow) -> Self {
        NetworkNode {
            ip_addr: row.ip_addr.as_deref().map(strip_host_mask).unwrap_or_default(),
            name: row.name,
            domains: row.domains.unwrap_or_default(),
            neighbours: row
                .neighbours
                .unwrap_or_default()
                .iter()
                .map(|n| strip_host_mask(n))
                .collect(),
        }
    }
}

/// `inet` columns cast to text carry a `/32` or `/128` suffix for single hosts
fn strip_host_mask(addr: &str) -> String {
    addr.strip_suffix("/32")
        .or_else(|| addr.strip_suffix("/128"))
        .unwrap_or(addr)
        .to_string()
}

/// Database client with connection pool
pub struct DbClient {
    pool: PgPool,
    runtime: Arc<Runtime>,
    url: String,
}

impl DbClient {
    /// Connect to the database at `url`
    pub fn connect(url: &str) -> Result<Self, SourceError> {
        let runtime = Runtime::new()?;

        let pool = runtime.block_on(async {
            PgPoolOptions::new()
                .max_connections(2)
                .connect(url)
                .await
        })?;

        info!(url = %redact(url), "Connected to PostgreSQL");

        Ok(Self {
            pool,
            runtime: Arc::new(runtime),
            url: url.to_string(),
        })
    }
}

impl NodeSource for DbClient {
    /// Fetch every node the crawler has recorded
    fn fetch_nodes(&self) -> Result<Vec<NetworkNode>, SourceError> {
        let rows: Vec<NodeRow> = self.runtime.block_on(async {
            sqlx::query_as(
                r#"
                SELECT
                    ip_addr::text AS ip_addr,
                    name,
                    domains::text[] AS domains,
                    neighbours::text[] AS neighbours
                FROM nodes
                "#,
            )
            .fetch_all(&self.pool)
            .await
        })?;

        info!(count = rows.len(), "Fetched nodes from database");
        Ok(rows.into_iter().map(NetworkNode::from).collect())
    }

    fn health(&self) -> Result<(), SourceError> {
        self.runtime.block_on(async {
            sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("PostgreSQL {}", redact(&self.url))
    }
}

/// Hide the password in a connection URL
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            match credentials.split_once(':') {
                Some((user, _)) => format!("{}{}:***{}", &url[..scheme_end + 3], user, &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}
