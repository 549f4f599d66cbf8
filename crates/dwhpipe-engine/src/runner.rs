//! Batch SQL runner
//!
//! Executes a statement list in order on one session, committing after
//! every statement. The first failure stops the list; statements before it
//! stay committed and statements after it never run.

use crate::error::RunError;
use dwhpipe_sql::Statement;
use dwhpipe_warehouse::SqlSession;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Statements executed by one [`BatchRunner::run`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stage: String,
    pub executed: usize,
    pub elapsed: Duration,
}

/// Runs one named stage (`load`, `transform`, ...)
#[derive(Debug, Clone)]
pub struct BatchRunner {
    stage: String,
}

impl BatchRunner {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub async fn run(
        &self,
        statements: &[Statement],
        session: &mut dyn SqlSession,
    ) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        info!(stage = %self.stage, statements = statements.len(), backend = session.name(), "Running stage");

        for (index, statement) in statements.iter().enumerate() {
            let label = statement.label();
            debug!(stage = %self.stage, index, statement = %label, "Executing");

            if let Err(source) = session.execute(&statement.sql).await {
                error!(stage = %self.stage, index, statement = %label, error = %source, "Statement failed");
                return Err(RunError::Statement {
                    stage: self.stage.clone(),
                    index,
                    label,
                    source,
                });
            }

            if let Err(source) = session.commit().await {
                error!(stage = %self.stage, index, statement = %label, error = %source, "Commit failed");
                return Err(RunError::Commit {
                    stage: self.stage.clone(),
                    index,
                    label,
                    source,
                });
            }
        }

        let summary = RunSummary {
            stage: self.stage.clone(),
            executed: statements.len(),
            elapsed: started.elapsed(),
        };
        info!(stage = %self.stage, executed = summary.executed, elapsed_ms = summary.elapsed.as_millis() as u64, "Stage complete");
        Ok(summary)
    }
}
