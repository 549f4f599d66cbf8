//! Session trait for executing SQL against the warehouse

use dwhpipe_core::DatabaseConfig;
use std::fmt;

/// Where and as whom to connect
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,

    /// Negotiate TLS before authenticating
    pub tls: bool,
}

impl ConnectionSettings {
    /// Settings for the configured database at a resolved host
    pub fn from_config(database: &DatabaseConfig, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: database.port,
            dbname: database.name.clone(),
            user: database.user.clone(),
            password: database.password.clone(),
            tls: database.tls,
        }
    }

    /// libpq-style `key=value` connection string
    ///
    /// Values containing whitespace, quotes or backslashes are single-quoted
    /// with backslash escapes.
    pub fn connection_string(&self) -> String {
        format!(
            "host={} dbname={} user={} password={} port={}",
            conninfo_value(&self.host),
            conninfo_value(&self.dbname),
            conninfo_value(&self.user),
            conninfo_value(&self.password),
            self.port
        )
    }

    /// `host:port/dbname`, safe to log
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.dbname)
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"** redacted **")
            .field("tls", &self.tls)
            .finish()
    }
}

fn conninfo_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Errors that can occur while talking to the warehouse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Commit failed: {0}")]
    CommitError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// An open connection that executes SQL text
///
/// Statements run inside an implicit transaction that stays open until
/// [`SqlSession::commit`].
#[async_trait::async_trait]
pub trait SqlSession: Send {
    /// Session backend name (e.g., "PostgreSQL", "Mock")
    fn name(&self) -> &'static str;

    /// Execute one statement without committing it
    async fn execute(&mut self, sql: &str) -> Result<(), ExecError>;

    /// Commit everything executed since the last commit
    async fn commit(&mut self) -> Result<(), ExecError>;

    /// Round-trip a trivial query
    async fn test_connection(&mut self) -> Result<(), ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> DatabaseConfig {
        DatabaseConfig {
            host: None,
            name: "dwh".into(),
            user: "dwhuser".into(),
            password: "Passw0rd".into(),
            port: 5439,
            tls: false,
        }
    }

    #[test]
    fn test_connection_string() {
        let settings = ConnectionSettings::from_config(&database(), "dwh.abc.us-west-2.redshift.amazonaws.com");
        assert_eq!(
            settings.connection_string(),
            "host=dwh.abc.us-west-2.redshift.amazonaws.com dbname=dwh user=dwhuser password=Passw0rd port=5439"
        );
        assert_eq!(settings.target(), "dwh.abc.us-west-2.redshift.amazonaws.com:5439/dwh");
    }

    #[test]
    fn test_connection_string_quotes_awkward_values() {
        let mut db = database();
        db.password = "it's a secret".into();
        let settings = ConnectionSettings::from_config(&db, "localhost");
        assert!(settings
            .connection_string()
            .contains("password='it\\'s a secret' port=5439"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let settings = ConnectionSettings::from_config(&database(), "localhost");
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("Passw0rd"));
        assert!(debug.contains("redacted"));
    }
}
