//! Mock session for testing
//!
//! This session records SQL instead of sending it anywhere. It's useful for:
//! - Unit testing the batch runner's ordering and commit boundaries
//! - Simulating a statement that fails partway through a sequence
//! - Running the pipeline end to end without a cluster
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dwhpipe_warehouse::{MockSession, SqlSession};
//!
//! let session = MockSession::new().fail_on_statement(2);
//! let log = session.clone();
//!
//! runner.run(&statements, &mut session).await;
//! assert_eq!(log.committed().await.len(), 2);
//! ```

use crate::adapter::{ExecError, SqlSession};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Log {
    /// Every statement handed to `execute`, including failed ones
    executed: Vec<String>,

    /// Executed but not yet committed
    pending: Vec<String>,

    committed: Vec<String>,
    commits: usize,
}

/// Mock warehouse session
///
/// Clones share the same log, so a test can keep one handle while the code
/// under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    log: Arc<RwLock<Log>>,

    /// Zero-based index of the statement that fails
    fail_at: Option<usize>,

    /// Statements containing this text fail
    fail_matching: Option<String>,

    fail_connection: bool,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the statement at this zero-based position
    pub fn fail_on_statement(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Fail every statement containing `needle`
    pub fn fail_when_contains(mut self, needle: impl Into<String>) -> Self {
        self.fail_matching = Some(needle.into());
        self
    }

    /// Make `test_connection` fail
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Statements handed to `execute`, in order
    pub async fn executed(&self) -> Vec<String> {
        self.log.read().await.executed.clone()
    }

    /// Statements covered by a commit, in order
    pub async fn committed(&self) -> Vec<String> {
        self.log.read().await.committed.clone()
    }

    /// Statements executed since the last commit
    pub async fn pending(&self) -> Vec<String> {
        self.log.read().await.pending.clone()
    }

    pub async fn commit_count(&self) -> usize {
        self.log.read().await.commits
    }
}

#[async_trait::async_trait]
impl SqlSession for MockSession {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn execute(&mut self, sql: &str) -> Result<(), ExecError> {
        let mut log = self.log.write().await;
        let index = log.executed.len();
        log.executed.push(sql.to_string());

        let matched = self
            .fail_matching
            .as_deref()
            .is_some_and(|needle| sql.contains(needle));
        if self.fail_at == Some(index) || matched {
            // Rolled back with the failed statement
            log.pending.clear();
            return Err(ExecError::QueryError(format!(
                "simulated failure on statement {}",
                index
            )));
        }

        log.pending.push(sql.to_string());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), ExecError> {
        let mut log = self.log.write().await;
        let pending = std::mem::take(&mut log.pending);
        log.committed.extend(pending);
        log.commits += 1;
        Ok(())
    }

    async fn test_connection(&mut self) -> Result<(), ExecError> {
        if self.fail_connection {
            return Err(ExecError::ConnectionError(
                "Simulated connection failure".to_string(),
            ));
        }
        Ok(())
    }
}
