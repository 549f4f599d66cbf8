//! Errors that stop a provisioning or loading run

use dwhpipe_cloud::ProviderError;
use dwhpipe_sql::SqlError;
use dwhpipe_warehouse::ExecError;

/// Provisioning cannot continue
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The role could not be resolved after the create attempt
    #[error("Could not look up IAM role {role}: {source}")]
    RoleLookup {
        role: String,
        #[source]
        source: ProviderError,
    },

    /// Role creation failed for a reason other than "already exists"
    /// and strict role creation is enabled
    #[error("Could not create IAM role {role}: {source}")]
    RoleCreation {
        role: String,
        #[source]
        source: ProviderError,
    },

    /// A value that is resolved from the provider is not available yet
    #[error("Cluster {cluster} has no {what} yet (status: {status})")]
    Unresolved {
        cluster: String,
        what: &'static str,
        status: String,
    },

    #[error("Could not describe cluster {cluster}: {source}")]
    Describe {
        cluster: String,
        #[source]
        source: ProviderError,
    },
}

/// A statement sequence stopped early
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Statement `index` (zero-based) failed; earlier statements are committed
    #[error("{stage} statement {index} ({label}) failed: {source}")]
    Statement {
        stage: String,
        index: usize,
        label: String,
        #[source]
        source: ExecError,
    },

    #[error("{stage} commit after statement {index} ({label}) failed: {source}")]
    Commit {
        stage: String,
        index: usize,
        label: String,
        #[source]
        source: ExecError,
    },

    #[error("Could not build statements: {0}")]
    Sql(#[from] SqlError),
}

impl RunError {
    /// Zero-based position of the failed statement within its stage
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Statement { index, .. } | Self::Commit { index, .. } => Some(*index),
            Self::Sql(_) => None,
        }
    }
}
