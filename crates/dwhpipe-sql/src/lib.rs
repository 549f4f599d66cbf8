//! Warehouse SQL statements
//!
//! This crate holds:
//! - The statement model (kind + name + text) consumed by the batch runner
//! - The Redshift `COPY ... format as json` builder for staging loads
//! - The star-schema catalog: drop, create, copy and insert lists in
//!   execution order

pub mod statement;
pub mod copy;
pub mod star_schema;

pub use statement::{Statement, StatementKind};
pub use copy::{quote_literal, CopyStatement, JsonFormat, SqlError};
pub use star_schema::{StatementCatalog, tables};
