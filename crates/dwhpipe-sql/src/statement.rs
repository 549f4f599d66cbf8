//! Statement model

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a statement does to the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// `DROP TABLE IF EXISTS`
    Drop,

    /// `CREATE TABLE IF NOT EXISTS`
    Create,

    /// Bulk `COPY` from object storage into a staging table
    CopyLoad,

    /// `INSERT ... SELECT` from staging into the star schema
    InsertTransform,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Create => "create",
            Self::CopyLoad => "copy",
            Self::InsertTransform => "insert",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One SQL statement, executed as-is and committed on its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Kind of statement
    pub kind: StatementKind,

    /// Table the statement targets
    pub table: String,

    /// Statement text, values already interpolated
    pub sql: String,
}

impl Statement {
    pub fn new(kind: StatementKind, table: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            sql: sql.into(),
        }
    }

    /// Short label for logs, e.g. `copy staging_events`
    pub fn label(&self) -> String {
        format!("{} {}", self.kind, self.table)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_combines_kind_and_table() {
        let stmt = Statement::new(StatementKind::CopyLoad, "staging_events", "COPY ...");
        assert_eq!(stmt.label(), "copy staging_events");
        assert_eq!(stmt.to_string(), "copy staging_events");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(StatementKind::Drop.as_str(), "drop");
        assert_eq!(StatementKind::Create.as_str(), "create");
        assert_eq!(StatementKind::InsertTransform.to_string(), "insert");
    }
}
