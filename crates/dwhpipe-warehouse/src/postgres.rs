//! PostgreSQL wire-protocol session for Redshift
//!
//! Redshift speaks the PostgreSQL protocol, so the session is a thin layer
//! over `tokio-postgres`. It works with:
//! - Amazon Redshift (port 5439 by default)
//! - PostgreSQL, for local runs of the statement catalog
//!
//! ## Transactions
//!
//! The first statement after a commit opens a transaction with `BEGIN`;
//! [`SqlSession::commit`] closes it. A failed statement rolls back only the
//! uncommitted work, so everything committed earlier stays in place.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let settings = ConnectionSettings::from_config(&config.database, host);
//! let mut session = PostgresSession::connect(&settings).await?;
//! session.execute("SELECT 1").await?;
//! session.commit().await?;
//! ```
//!
//! Set `tls = true` in the settings to connect through `native-tls`.

use crate::adapter::{ConnectionSettings, ExecError, SqlSession};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::future::Future;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::{debug, error, warn};

/// Open session against a PostgreSQL-compatible warehouse
pub struct PostgresSession {
    client: Client,

    /// `host:port/dbname`, for log lines
    target: String,

    /// A `BEGIN` was issued and not yet committed
    in_transaction: bool,
}

impl PostgresSession {
    /// Connect with the given settings, over TLS when `settings.tls` is set
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self, ExecError> {
        let config: PgConfig = settings
            .connection_string()
            .parse()
            .map_err(|e| ExecError::ConfigError(format!("Invalid connection string: {}", e)))?;
        let target = settings.target();

        let client = if settings.tls {
            let connector = TlsConnector::builder()
                .build()
                .map_err(|e| ExecError::ConfigError(format!("Failed to create TLS connector: {}", e)))?;

            let (client, connection) = config
                .connect(MakeTlsConnector::new(connector))
                .await
                .map_err(|e| connect_error(&target, e))?;
            spawn_connection(connection, target.clone());
            client
        } else {
            let (client, connection) = config
                .connect(NoTls)
                .await
                .map_err(|e| connect_error(&target, e))?;
            spawn_connection(connection, target.clone());
            client
        };

        debug!(warehouse = %target, tls = settings.tls, "warehouse session opened");

        Ok(Self {
            client,
            target,
            in_transaction: false,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    async fn rollback(&mut self) {
        if !self.in_transaction {
            return;
        }
        self.in_transaction = false;
        if let Err(e) = self.client.batch_execute("ROLLBACK").await {
            warn!(warehouse = %self.target, error = %e, "rollback failed");
        }
    }
}

/// Drive the connection in the background until the client is dropped
fn spawn_connection<C>(connection: C, target: String)
where
    C: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(warehouse = %target, error = %e, "warehouse connection error");
        }
    });
}

fn connect_error(target: &str, e: tokio_postgres::Error) -> ExecError {
    ExecError::ConnectionError(format!("Failed to connect to {}: {}", target, e))
}

/// Prefer the server's message and SQLSTATE over the driver's wrapper text
fn describe(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => format!("{} (SQLSTATE {})", db.message(), db.code().code()),
        None => e.to_string(),
    }
}

#[async_trait::async_trait]
impl SqlSession for PostgresSession {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn execute(&mut self, sql: &str) -> Result<(), ExecError> {
        if !self.in_transaction {
            self.client
                .batch_execute("BEGIN")
                .await
                .map_err(|e| ExecError::QueryError(describe(&e)))?;
            self.in_transaction = true;
        }

        if let Err(e) = self.client.batch_execute(sql).await {
            let message = describe(&e);
            self.rollback().await;
            return Err(ExecError::QueryError(message));
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), ExecError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| ExecError::CommitError(describe(&e)))
    }

    async fn test_connection(&mut self) -> Result<(), ExecError> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| ExecError::ConnectionError(format!("{}: {}", self.target, describe(&e))))
    }
}
