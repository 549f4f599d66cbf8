//! Access role for the cluster
//!
//! The cluster reads from S3 through an IAM role that only Redshift may
//! assume. [`RoleManager::ensure_role`] is idempotent: a role that already
//! exists is reused, and the ARN is always looked up by name afterwards.

use crate::error::ProvisionError;
use crate::step::Step;
use dwhpipe_cloud::{IdentityProvider, ProviderError, RoleSpec, S3_READ_ONLY_POLICY_ARN};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How the create attempt in [`RoleManager::ensure_role`] went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleCreation {
    /// Role created and the S3 policy attached
    Created,

    /// Role created but attaching the S3 policy failed
    CreatedWithoutPolicy(ProviderError),

    /// Role was already there; nothing was attached
    AlreadyExists,

    /// Creation failed for another reason; the lookup went ahead anyway
    Failed(ProviderError),
}

/// Role ARN together with how it came to exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleOutcome {
    pub arn: String,
    pub creation: RoleCreation,
}

/// Detach and delete results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTeardown {
    pub detach: Step,
    pub delete: Step,
}

impl RoleTeardown {
    pub fn is_ok(&self) -> bool {
        self.delete.is_ok()
    }
}

pub struct RoleManager {
    identity: Arc<dyn IdentityProvider>,
    role_name: String,

    /// Treat non-"already exists" create failures as fatal
    strict: bool,
}

impl RoleManager {
    pub fn new(identity: Arc<dyn IdentityProvider>, role_name: impl Into<String>) -> Self {
        Self {
            identity,
            role_name: role_name.into(),
            strict: false,
        }
    }

    pub fn with_strict_creation(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// Create the role if needed and return its ARN
    pub async fn ensure_role(&self) -> Result<RoleOutcome, ProvisionError> {
        info!(role = %self.role_name, "Creating IAM role");

        let creation = match self.identity.create_role(&RoleSpec::for_redshift(&self.role_name)).await {
            Ok(()) => {
                info!(role = %self.role_name, "Role created");
                match self
                    .identity
                    .attach_role_policy(&self.role_name, S3_READ_ONLY_POLICY_ARN)
                    .await
                {
                    Ok(()) => RoleCreation::Created,
                    Err(e) => {
                        warn!(role = %self.role_name, error = %e, "Could not attach S3 read-only policy");
                        RoleCreation::CreatedWithoutPolicy(e)
                    }
                }
            }
            Err(e) if e.is_already_exists() => {
                warn!(role = %self.role_name, error = %e, "Role already exists, reusing it");
                RoleCreation::AlreadyExists
            }
            Err(e) => {
                if self.strict {
                    error!(role = %self.role_name, error = %e, "Role creation failed");
                    return Err(ProvisionError::RoleCreation {
                        role: self.role_name.clone(),
                        source: e,
                    });
                }
                warn!(role = %self.role_name, error = %e, "Role creation failed, looking it up anyway");
                RoleCreation::Failed(e)
            }
        };

        let arn = self
            .identity
            .get_role_arn(&self.role_name)
            .await
            .map_err(|source| ProvisionError::RoleLookup {
                role: self.role_name.clone(),
                source,
            })?;
        info!(role = %self.role_name, arn = %arn, "Role resolved");

        Ok(RoleOutcome { arn, creation })
    }

    /// Look up the role ARN without creating anything
    pub async fn role_arn(&self) -> Result<String, ProvisionError> {
        self.identity
            .get_role_arn(&self.role_name)
            .await
            .map_err(|source| ProvisionError::RoleLookup {
                role: self.role_name.clone(),
                source,
            })
    }

    /// Detach the S3 policy, then delete the role
    ///
    /// Errors are logged and reported, never returned. A detach failure
    /// other than "not attached" skips the delete.
    pub async fn delete_role(&self) -> RoleTeardown {
        let detach = match self
            .identity
            .detach_role_policy(&self.role_name, S3_READ_ONLY_POLICY_ARN)
            .await
        {
            Ok(()) => Step::Done,
            // Nothing to detach still lets a half-created role be removed
            Err(e) if e.is_not_found() => {
                warn!(role = %self.role_name, error = %e, "S3 policy was not attached");
                Step::Failed(e)
            }
            Err(e) => {
                error!(role = %self.role_name, error = %e, "Could not detach S3 policy");
                return RoleTeardown {
                    detach: Step::Failed(e),
                    delete: Step::Skipped,
                };
            }
        };

        let delete = match self.identity.delete_role(&self.role_name).await {
            Ok(()) => {
                info!(role = %self.role_name, "Role deleted");
                Step::Done
            }
            Err(e) => {
                error!(role = %self.role_name, error = %e, "Could not delete role");
                Step::Failed(e)
            }
        };

        RoleTeardown { detach, delete }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwhpipe_cloud::mock::ops;
    use dwhpipe_cloud::MockProvider;

    fn manager(provider: &MockProvider) -> RoleManager {
        RoleManager::new(Arc::new(provider.clone()), "dwhRole")
    }

    #[tokio::test]
    async fn test_ensure_role_creates_and_attaches() {
        let provider = MockProvider::new();
        let outcome = manager(&provider).ensure_role().await.unwrap();

        assert_eq!(outcome.creation, RoleCreation::Created);
        assert_eq!(outcome.arn, "arn:aws:iam::000000000000:role/dwhRole");
        assert_eq!(
            provider.role("dwhRole").await.unwrap().policies,
            vec![S3_READ_ONLY_POLICY_ARN.to_string()]
        );
    }

    #[tokio::test]
    async fn test_ensure_role_is_idempotent() {
        let provider = MockProvider::new();
        let roles = manager(&provider);

        let first = roles.ensure_role().await.unwrap();
        let second = roles.ensure_role().await.unwrap();

        assert_eq!(first.arn, second.arn);
        assert_eq!(second.creation, RoleCreation::AlreadyExists);
        assert_eq!(provider.call_count(ops::ATTACH_ROLE_POLICY).await, 1);
    }

    #[tokio::test]
    async fn test_other_create_failure_still_looks_up() {
        let provider = MockProvider::new().with_role("dwhRole");
        provider
            .fail_on(ops::CREATE_ROLE, ProviderError::PermissionDenied("iam:CreateRole".into()))
            .await;

        let outcome = manager(&provider).ensure_role().await.unwrap();
        assert!(matches!(outcome.creation, RoleCreation::Failed(ProviderError::PermissionDenied(_))));
        assert_eq!(provider.call_count(ops::GET_ROLE).await, 1);
    }

    #[tokio::test]
    async fn test_strict_creation_fails_fast() {
        let provider = MockProvider::new().with_role("dwhRole");
        provider
            .fail_on(ops::CREATE_ROLE, ProviderError::PermissionDenied("iam:CreateRole".into()))
            .await;

        let err = manager(&provider)
            .with_strict_creation(true)
            .ensure_role()
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::RoleCreation { .. }));
        assert_eq!(provider.call_count(ops::GET_ROLE).await, 0);
    }

    #[tokio::test]
    async fn test_missing_role_lookup_propagates() {
        let provider = MockProvider::new();
        provider
            .fail_on(ops::CREATE_ROLE, ProviderError::PermissionDenied("iam:CreateRole".into()))
            .await;

        let err = manager(&provider).ensure_role().await.unwrap_err();
        assert!(matches!(err, ProvisionError::RoleLookup { .. }));
    }

    #[tokio::test]
    async fn test_attach_failure_is_reported() {
        let provider = MockProvider::new();
        provider
            .fail_on(ops::ATTACH_ROLE_POLICY, ProviderError::PermissionDenied("attach".into()))
            .await;

        let outcome = manager(&provider).ensure_role().await.unwrap();
        assert!(matches!(outcome.creation, RoleCreation::CreatedWithoutPolicy(_)));
    }

    #[tokio::test]
    async fn test_delete_role() {
        let provider = MockProvider::new();
        let roles = manager(&provider);
        roles.ensure_role().await.unwrap();

        let teardown = roles.delete_role().await;
        assert_eq!(teardown.detach, Step::Done);
        assert_eq!(teardown.delete, Step::Done);
        assert!(provider.role("dwhRole").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_role_without_policy_still_deletes() {
        let provider = MockProvider::new().with_role("dwhRole");
        let teardown = manager(&provider).delete_role().await;

        // Detach reports "not attached", yet the delete goes ahead
        assert!(matches!(teardown.detach, Step::Failed(ProviderError::NotFound(_))));
        assert_eq!(teardown.delete, Step::Done);
        assert!(teardown.is_ok());
        assert!(provider.role("dwhRole").await.is_none());
    }

    #[tokio::test]
    async fn test_detach_failure_skips_delete() {
        let provider = MockProvider::new();
        let roles = manager(&provider);
        roles.ensure_role().await.unwrap();
        provider
            .fail_on(ops::DETACH_ROLE_POLICY, ProviderError::PermissionDenied("detach".into()))
            .await;

        let teardown = roles.delete_role().await;
        assert_eq!(teardown.delete, Step::Skipped);
        assert_eq!(provider.call_count(ops::DELETE_ROLE).await, 0);
        assert!(provider.role("dwhRole").await.is_some());
    }
}
