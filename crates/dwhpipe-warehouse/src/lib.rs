//! Warehouse sessions for running SQL against the cluster
//!
//! ## Features
//!
//! Enable the real driver via Cargo features:
//! - `postgres` - PostgreSQL wire protocol (Redshift), with optional TLS
//!
//! [`MockSession`] is always available for tests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dwhpipe_warehouse::{ConnectionSettings, PostgresSession, SqlSession};
//!
//! let settings = ConnectionSettings::from_config(&config.database, host);
//! let mut session = PostgresSession::connect(&settings).await?;
//! session.test_connection().await?;
//! ```

pub mod adapter;
pub mod mock;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use adapter::{ConnectionSettings, ExecError, SqlSession};
pub use mock::MockSession;

#[cfg(feature = "postgres")]
pub use postgres::PostgresSession;
