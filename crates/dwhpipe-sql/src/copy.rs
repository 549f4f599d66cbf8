//! Redshift bulk-load statements
//!
//! Staging tables are filled with one `COPY` per dataset, reading JSON
//! straight from S3 with the cluster's IAM role:
//!
//! ```text
//! COPY staging_songs FROM 's3://bucket/song_data' credentials 'aws_iam_role=arn:...' format as json 'auto' STATUPDATE ON region 'us-west-2';
//! ```
//!
//! The text layout is fixed; only the table, URIs, role ARN and region vary.

use crate::statement::{Statement, StatementKind};

/// Errors raised while building statement text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqlError {
    #[error("Invalid table name: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid object storage URI: {0:?}")]
    InvalidUri(String),

    #[error("Invalid literal value: {0}")]
    InvalidLiteral(String),
}

/// How COPY maps JSON fields to columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonFormat {
    /// Match JSON keys to column names
    Auto,

    /// Use the JSONPaths file at this URI
    JsonPaths(String),
}

impl JsonFormat {
    /// `Auto` when no JSONPaths URI is configured
    pub fn from_option(jsonpath: Option<&str>) -> Self {
        match jsonpath.map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => Self::JsonPaths(path.to_string()),
            None => Self::Auto,
        }
    }
}

/// A `COPY <table> FROM <s3 uri>` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyStatement {
    pub table: String,
    pub source_uri: String,
    pub role_arn: String,
    pub format: JsonFormat,
    pub region: String,
}

impl CopyStatement {
    pub fn new(
        table: impl Into<String>,
        source_uri: impl Into<String>,
        role_arn: impl Into<String>,
        format: JsonFormat,
        region: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            source_uri: source_uri.into(),
            role_arn: role_arn.into(),
            format,
            region: region.into(),
        }
    }

    /// Render the statement text
    pub fn to_sql(&self) -> Result<String, SqlError> {
        validate_identifier(&self.table)?;
        let source = quote_uri(&self.source_uri)?;
        let format = match &self.format {
            JsonFormat::Auto => "'auto'".to_string(),
            JsonFormat::JsonPaths(uri) => quote_uri(uri)?,
        };
        let role_arn = bare_literal("role ARN", &self.role_arn)?;
        let region = bare_literal("region", &self.region)?;

        Ok(format!(
            "COPY {} FROM {} credentials 'aws_iam_role={}' format as json {} STATUPDATE ON region '{}';",
            self.table, source, role_arn, format, region
        ))
    }

    /// Render into a [`Statement`] for the batch runner
    pub fn to_statement(&self) -> Result<Statement, SqlError> {
        Ok(Statement::new(StatementKind::CopyLoad, self.table.clone(), self.to_sql()?))
    }
}

/// Wrap a value in single quotes, doubling embedded quotes
///
/// Values that already arrive quoted (`'s3://bucket/key'`) are unwrapped
/// first so they are not quoted twice.
pub fn quote_literal(value: &str) -> String {
    let trimmed = value.trim();
    let inner = trimmed
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(trimmed);
    format!("'{}'", inner.replace('\'', "''"))
}

fn quote_uri(uri: &str) -> Result<String, SqlError> {
    let quoted = quote_literal(uri);
    if !quoted[1..].starts_with("s3://") || quoted.len() <= "'s3://'".len() {
        return Err(SqlError::InvalidUri(uri.to_string()));
    }
    Ok(quoted)
}

/// Values spliced inside an existing quoted literal must not carry quotes
fn bare_literal<'a>(what: &str, value: &'a str) -> Result<&'a str, SqlError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SqlError::InvalidLiteral(format!("{} must not be empty", what)));
    }
    if value.contains('\'') {
        return Err(SqlError::InvalidLiteral(format!("{} must not contain quotes", what)));
    }
    Ok(value)
}

fn validate_identifier(name: &str) -> Result<(), SqlError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SqlError::InvalidIdentifier(name.to_string()))
    }
}
