//! In-memory provider for testing
//!
//! [`MockProvider`] implements all three provider traits without talking to
//! AWS. It is useful for:
//! - Unit testing the lifecycle controller and role manager
//! - Scripting cluster status sequences (`creating, creating, available`)
//! - Simulating provider failures per operation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dwhpipe_cloud::{ClusterStatus, MockProvider};
//!
//! let provider = MockProvider::new()
//!     .with_status_script(vec![ClusterStatus::Creating, ClusterStatus::Available]);
//!
//! // Fail one operation
//! provider.fail_on(ops::AUTHORIZE_INGRESS, ProviderError::PermissionDenied("nope".into())).await;
//! ```

use crate::adapter::{
    ClusterDescription, ClusterProvider, ClusterSpec, ClusterStatus, Endpoint, IdentityProvider,
    IngressRule, NetworkProvider, ProviderError, RoleSpec, SecurityGroup,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Operation names used for call recording and failure injection
pub mod ops {
    pub const CREATE_ROLE: &str = "CreateRole";
    pub const ATTACH_ROLE_POLICY: &str = "AttachRolePolicy";
    pub const DETACH_ROLE_POLICY: &str = "DetachRolePolicy";
    pub const DELETE_ROLE: &str = "DeleteRole";
    pub const GET_ROLE: &str = "GetRole";
    pub const CREATE_CLUSTER: &str = "CreateCluster";
    pub const DESCRIBE_CLUSTERS: &str = "DescribeClusters";
    pub const DELETE_CLUSTER: &str = "DeleteCluster";
    pub const DESCRIBE_SECURITY_GROUPS: &str = "DescribeSecurityGroups";
    pub const AUTHORIZE_INGRESS: &str = "AuthorizeSecurityGroupIngress";
}

/// VPC every mock cluster lands in
pub const MOCK_VPC_ID: &str = "vpc-0mock";

/// Default security group of [`MOCK_VPC_ID`]
pub const MOCK_SECURITY_GROUP_ID: &str = "sg-0mock";

/// A role held by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRole {
    pub arn: String,
    pub policies: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    roles: HashMap<String, MockRole>,
    cluster: Option<ClusterDescription>,

    /// Statuses handed out by successive describes; the last one sticks
    status_script: VecDeque<ClusterStatus>,

    /// Describes left before a deleting cluster disappears
    polls_until_gone: u32,

    errors: HashMap<&'static str, ProviderError>,
    calls: Vec<&'static str>,
    ingress_rules: Vec<(String, IngressRule)>,
}

/// Mock cloud provider
#[derive(Clone)]
pub struct MockProvider {
    state: Arc<RwLock<State>>,
    account_id: String,
    port: u16,
    delete_delay: u32,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            account_id: "000000000000".to_string(),
            port: 5439,
            delete_delay: 0,
        }
    }

    /// Statuses returned by successive describe calls after creation
    ///
    /// Once the script runs out the last status repeats.
    pub fn with_status_script(self, statuses: Vec<ClusterStatus>) -> Self {
        if let Ok(mut state) = self.state.try_write() {
            state.status_script = statuses.into();
        }
        self
    }

    /// Number of describes that still report `deleting` after a delete call
    pub fn with_delete_delay(mut self, polls: u32) -> Self {
        self.delete_delay = polls;
        self
    }

    /// Start with an existing role
    pub fn with_role(self, name: &str) -> Self {
        let arn = self.role_arn(name);
        if let Ok(mut state) = self.state.try_write() {
            state.roles.insert(
                name.to_string(),
                MockRole {
                    arn,
                    policies: Vec::new(),
                },
            );
        }
        self
    }

    /// Start with an existing cluster in the given status
    pub fn with_cluster(self, identifier: &str, status: ClusterStatus) -> Self {
        let description = self.observe(ClusterDescription::new(identifier, status.clone()), status);
        if let Ok(mut state) = self.state.try_write() {
            state.cluster = Some(description);
        }
        self
    }

    /// Make every call to `operation` fail with `error`
    pub async fn fail_on(&self, operation: &'static str, error: ProviderError) {
        self.state.write().await.errors.insert(operation, error);
    }

    pub async fn clear_errors(&self) {
        self.state.write().await.errors.clear();
    }

    /// Operations invoked so far, in order
    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.read().await.calls.clone()
    }

    /// How many times `operation` was invoked
    pub async fn call_count(&self, operation: &str) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|c| **c == operation)
            .count()
    }

    pub async fn role(&self, name: &str) -> Option<MockRole> {
        self.state.read().await.roles.get(name).cloned()
    }

    pub async fn cluster(&self) -> Option<ClusterDescription> {
        self.state.read().await.cluster.clone()
    }

    /// Ingress rules authorized so far, keyed by security group id
    pub async fn ingress_rules(&self) -> Vec<(String, IngressRule)> {
        self.state.read().await.ingress_rules.clone()
    }

    fn role_arn(&self, name: &str) -> String {
        format!("arn:aws:iam::{}:role/{}", self.account_id, name)
    }

    /// Fill in the fields the provider only reports once available
    fn observe(&self, mut description: ClusterDescription, status: ClusterStatus) -> ClusterDescription {
        if status == ClusterStatus::Available {
            description.endpoint = Some(Endpoint {
                address: format!("{}.mock.us-west-2.redshift.amazonaws.com", description.identifier),
                port: self.port,
            });
            description.vpc_id = Some(MOCK_VPC_ID.to_string());
        }
        description.status = status;
        description
    }

    /// Record the call and return the injected error, if any
    async fn enter(&self, operation: &'static str) -> Result<(), ProviderError> {
        let mut state = self.state.write().await;
        state.calls.push(operation);
        match state.errors.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockProvider {
    async fn create_role(&self, spec: &RoleSpec) -> Result<(), ProviderError> {
        self.enter(ops::CREATE_ROLE).await?;
        let arn = self.role_arn(&spec.name);
        let mut state = self.state.write().await;
        if state.roles.contains_key(&spec.name) {
            return Err(ProviderError::AlreadyExists(format!(
                "Role with name {} already exists.",
                spec.name
            )));
        }
        state.roles.insert(
            spec.name.clone(),
            MockRole {
                arn,
                policies: Vec::new(),
            },
        );
        Ok(())
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError> {
        self.enter(ops::ATTACH_ROLE_POLICY).await?;
        let mut state = self.state.write().await;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| ProviderError::NotFound(format!("role {}", role_name)))?;
        if !role.policies.iter().any(|p| p == policy_arn) {
            role.policies.push(policy_arn.to_string());
        }
        Ok(())
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError> {
        self.enter(ops::DETACH_ROLE_POLICY).await?;
        let mut state = self.state.write().await;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| ProviderError::NotFound(format!("role {}", role_name)))?;
        let before = role.policies.len();
        role.policies.retain(|p| p != policy_arn);
        if role.policies.len() == before {
            return Err(ProviderError::NotFound(format!(
                "policy {} is not attached to {}",
                policy_arn, role_name
            )));
        }
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), ProviderError> {
        self.enter(ops::DELETE_ROLE).await?;
        let mut state = self.state.write().await;
        let attached = match state.roles.get(role_name) {
            None => return Err(ProviderError::NotFound(format!("role {}", role_name))),
            Some(role) => role.policies.len(),
        };
        if attached > 0 {
            return Err(ProviderError::Service {
                code: "DeleteConflict".to_string(),
                message: format!("role {} still has attached policies", role_name),
            });
        }
        state.roles.remove(role_name);
        Ok(())
    }

    async fn get_role_arn(&self, role_name: &str) -> Result<String, ProviderError> {
        self.enter(ops::GET_ROLE).await?;
        self.state
            .read()
            .await
            .roles
            .get(role_name)
            .map(|r| r.arn.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("role {}", role_name)))
    }
}

#[async_trait::async_trait]
impl ClusterProvider for MockProvider {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<(), ProviderError> {
        self.enter(ops::CREATE_CLUSTER).await?;
        let mut state = self.state.write().await;
        if state.cluster.is_some() {
            return Err(ProviderError::AlreadyExists(format!(
                "Cluster {} already exists",
                spec.identifier
            )));
        }
        for role in &spec.iam_roles {
            if !state.roles.values().any(|r| &r.arn == role) {
                return Err(ProviderError::Service {
                    code: "InvalidParameterValue".to_string(),
                    message: format!("unknown IAM role {}", role),
                });
            }
        }

        let mut description = ClusterDescription::new(spec.identifier.clone(), ClusterStatus::Creating);
        description.node_type = Some(spec.node_type.clone());
        description.number_of_nodes = Some(spec.number_of_nodes);
        description.db_name = Some(spec.db_name.clone());
        description.master_username = Some(spec.master_username.clone());
        description.iam_roles = spec.iam_roles.clone();
        state.cluster = Some(description);
        Ok(())
    }

    async fn describe_cluster(&self, identifier: &str) -> Result<ClusterDescription, ProviderError> {
        self.enter(ops::DESCRIBE_CLUSTERS).await?;
        let mut state = self.state.write().await;

        let Some(current) = state.cluster.clone().filter(|c| c.identifier == identifier) else {
            return Err(ProviderError::ClusterNotFound(format!("Cluster {} not found.", identifier)));
        };

        if current.status == ClusterStatus::Deleting {
            if state.polls_until_gone == 0 {
                state.cluster = None;
                return Err(ProviderError::ClusterNotFound(format!("Cluster {} not found.", identifier)));
            }
            state.polls_until_gone -= 1;
            return Ok(current);
        }

        let next = if state.status_script.len() > 1 {
            state.status_script.pop_front()
        } else {
            state.status_script.front().cloned()
        };

        let observed = match next {
            Some(status) => self.observe(current, status),
            None => current,
        };
        state.cluster = Some(observed.clone());
        Ok(observed)
    }

    async fn delete_cluster(
        &self,
        identifier: &str,
        _skip_final_snapshot: bool,
    ) -> Result<(), ProviderError> {
        self.enter(ops::DELETE_CLUSTER).await?;
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        match state.cluster.as_mut().filter(|c| c.identifier == identifier) {
            Some(cluster) => {
                cluster.status = ClusterStatus::Deleting;
                cluster.endpoint = None;
                state.polls_until_gone = self.delete_delay;
                Ok(())
            }
            None => Err(ProviderError::ClusterNotFound(format!("Cluster {} not found.", identifier))),
        }
    }
}

#[async_trait::async_trait]
impl NetworkProvider for MockProvider {
    async fn default_security_group(&self, vpc_id: &str) -> Result<SecurityGroup, ProviderError> {
        self.enter(ops::DESCRIBE_SECURITY_GROUPS).await?;
        if vpc_id != MOCK_VPC_ID {
            return Err(ProviderError::NotFound(format!("VPC {}", vpc_id)));
        }
        Ok(SecurityGroup {
            group_id: MOCK_SECURITY_GROUP_ID.to_string(),
            group_name: "default".to_string(),
            vpc_id: vpc_id.to_string(),
        })
    }

    async fn authorize_ingress(
        &self,
        group: &SecurityGroup,
        rule: &IngressRule,
    ) -> Result<(), ProviderError> {
        self.enter(ops::AUTHORIZE_INGRESS).await?;
        let mut state = self.state.write().await;
        if state
            .ingress_rules
            .iter()
            .any(|(id, existing)| id == &group.group_id && existing == rule)
        {
            return Err(ProviderError::AlreadyExists(format!(
                "the specified rule already exists in {}",
                group.group_id
            )));
        }
        state.ingress_rules.push((group.group_id.clone(), rule.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::S3_READ_ONLY_POLICY_ARN;
    use dwhpipe_core::ClusterType;

    fn spec(role_arn: &str) -> ClusterSpec {
        ClusterSpec {
            identifier: "dwhCluster".into(),
            cluster_type: ClusterType::MultiNode,
            node_type: "dc2.large".into(),
            number_of_nodes: 4,
            db_name: "dwh".into(),
            master_username: "dwhuser".into(),
            master_password: "Passw0rd".into(),
            port: 5439,
            iam_roles: vec![role_arn.to_string()],
        }
    }

    #[tokio::test]
    async fn test_default_matches_new() {
        let provider = MockProvider::default();
        provider.create_role(&RoleSpec::for_redshift("dwhRole")).await.unwrap();
        assert_eq!(
            provider.get_role_arn("dwhRole").await.unwrap(),
            "arn:aws:iam::000000000000:role/dwhRole"
        );

        let provider = MockProvider::default().with_cluster("dwhCluster", ClusterStatus::Available);
        let description = provider.describe_cluster("dwhCluster").await.unwrap();
        assert_eq!(description.endpoint.unwrap().port, 5439);
    }

    #[tokio::test]
    async fn test_second_create_role_reports_already_exists() {
        let provider = MockProvider::new();
        let role = RoleSpec::for_redshift("dwhRole");

        provider.create_role(&role).await.unwrap();
        let err = provider.create_role(&role).await.unwrap_err();
        assert!(err.is_already_exists());

        let arn = provider.get_role_arn("dwhRole").await.unwrap();
        assert_eq!(arn, "arn:aws:iam::000000000000:role/dwhRole");
    }

    #[tokio::test]
    async fn test_delete_role_requires_detached_policies() {
        let provider = MockProvider::new().with_role("dwhRole");
        provider.attach_role_policy("dwhRole", S3_READ_ONLY_POLICY_ARN).await.unwrap();

        assert!(provider.delete_role("dwhRole").await.is_err());

        provider.detach_role_policy("dwhRole", S3_READ_ONLY_POLICY_ARN).await.unwrap();
        provider.delete_role("dwhRole").await.unwrap();
        assert!(provider.role("dwhRole").await.is_none());
    }

    #[tokio::test]
    async fn test_status_script_advances_and_sticks() {
        let provider = MockProvider::new()
            .with_role("dwhRole")
            .with_status_script(vec![ClusterStatus::Creating, ClusterStatus::Available]);
        let arn = provider.get_role_arn("dwhRole").await.unwrap();
        provider.create_cluster(&spec(&arn)).await.unwrap();

        let first = provider.describe_cluster("dwhCluster").await.unwrap();
        assert_eq!(first.status, ClusterStatus::Creating);
        assert!(first.endpoint.is_none());

        let second = provider.describe_cluster("dwhCluster").await.unwrap();
        assert_eq!(second.status, ClusterStatus::Available);
        assert_eq!(second.vpc_id.as_deref(), Some(MOCK_VPC_ID));
        assert_eq!(second.endpoint.as_ref().unwrap().port, 5439);

        let third = provider.describe_cluster("dwhCluster").await.unwrap();
        assert_eq!(third.status, ClusterStatus::Available);
    }

    #[tokio::test]
    async fn test_deleted_cluster_disappears() {
        let provider = MockProvider::new()
            .with_cluster("dwhCluster", ClusterStatus::Available)
            .with_delete_delay(1);

        provider.delete_cluster("dwhCluster", true).await.unwrap();

        let deleting = provider.describe_cluster("dwhCluster").await.unwrap();
        assert_eq!(deleting.status, ClusterStatus::Deleting);

        let gone = provider.describe_cluster("dwhCluster").await.unwrap_err();
        assert!(matches!(gone, ProviderError::ClusterNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_cluster_rejects_unknown_role() {
        let provider = MockProvider::new();
        let err = provider
            .create_cluster(&spec("arn:aws:iam::000000000000:role/missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Service { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_ingress_rule() {
        let provider = MockProvider::new();
        let group = provider.default_security_group(MOCK_VPC_ID).await.unwrap();
        let rule = IngressRule::tcp_from_anywhere(5439);

        provider.authorize_ingress(&group, &rule).await.unwrap();
        let err = provider.authorize_ingress(&group, &rule).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(provider.ingress_rules().await.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_and_call_log() {
        let provider = MockProvider::new();
        provider
            .fail_on(ops::GET_ROLE, ProviderError::PermissionDenied("denied".into()))
            .await;

        let err = provider.get_role_arn("dwhRole").await.unwrap_err();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
        assert_eq!(provider.calls().await, vec![ops::GET_ROLE]);

        provider.clear_errors().await;
        assert!(matches!(
            provider.get_role_arn("dwhRole").await,
            Err(ProviderError::NotFound(_))
        ));
        assert_eq!(provider.call_count(ops::GET_ROLE).await, 2);
    }
}
