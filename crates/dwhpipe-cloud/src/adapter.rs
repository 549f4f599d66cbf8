//! Provider traits for IAM roles, Redshift clusters and VPC ingress

use dwhpipe_core::ClusterType;
use serde_json::json;
use std::fmt;

/// AWS service principal allowed to assume the warehouse role
pub const REDSHIFT_SERVICE_PRINCIPAL: &str = "redshift.amazonaws.com";

/// Managed policy granting read-only S3 access
pub const S3_READ_ONLY_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess";

/// Errors returned by a cloud provider
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Service error {code}: {message}")]
    Service { code: String, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProviderError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ClusterNotFound(_))
    }
}

/// Role to create for the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub name: String,
    pub path: String,
    pub description: String,

    /// Trust policy document (JSON)
    pub assume_role_policy: String,
}

impl RoleSpec {
    /// A role that only the Redshift service may assume
    pub fn for_redshift(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: "/".to_string(),
            description: "Allows Redshift clusters to call AWS services on your behalf.".to_string(),
            assume_role_policy: redshift_trust_policy(),
        }
    }
}

/// Trust policy restricted to the Redshift service principal
pub fn redshift_trust_policy() -> String {
    json!({
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": REDSHIFT_SERVICE_PRINCIPAL }
        }],
        "Version": "2012-10-17"
    })
    .to_string()
}

/// Parameters of a create-cluster request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub identifier: String,
    pub cluster_type: ClusterType,
    pub node_type: String,

    /// Only sent for multi-node clusters
    pub number_of_nodes: u32,
    pub db_name: String,
    pub master_username: String,
    pub master_password: String,
    pub port: u16,

    /// Roles the cluster may assume
    pub iam_roles: Vec<String>,
}

/// Cluster status as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClusterStatus {
    Creating,
    Available,
    Deleting,
    Deleted,

    /// Any other provider status (modifying, rebooting, ...), trimmed and lowercased
    Unknown(String),
}

impl ClusterStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "creating" => Self::Creating,
            "available" => Self::Available,
            "deleting" => Self::Deleting,
            "deleted" => Self::Deleted,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "creating",
            Self::Available => "available",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address a client connects to once the cluster is available
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// One observation of a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescription {
    pub identifier: String,
    pub status: ClusterStatus,
    pub node_type: Option<String>,
    pub number_of_nodes: Option<u32>,
    pub db_name: Option<String>,
    pub master_username: Option<String>,

    /// Populated once the cluster is available
    pub endpoint: Option<Endpoint>,
    pub vpc_id: Option<String>,
    pub iam_roles: Vec<String>,
}

impl ClusterDescription {
    pub fn new(identifier: impl Into<String>, status: ClusterStatus) -> Self {
        Self {
            identifier: identifier.into(),
            status,
            node_type: None,
            number_of_nodes: None,
            db_name: None,
            master_username: None,
            endpoint: None,
            vpc_id: None,
            iam_roles: Vec::new(),
        }
    }
}

/// Security group resolved for a VPC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub group_id: String,
    pub group_name: String,
    pub vpc_id: String,
}

/// Inbound rule to authorize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub cidr: String,
}

impl IngressRule {
    /// TCP on one port from anywhere
    pub fn tcp_from_anywhere(port: u16) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr: "0.0.0.0/0".to_string(),
        }
    }
}

/// IAM role management
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_role(&self, spec: &RoleSpec) -> Result<(), ProviderError>;

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError>;

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError>;

    async fn delete_role(&self, role_name: &str) -> Result<(), ProviderError>;

    /// Look a role up by name and return its ARN
    async fn get_role_arn(&self, role_name: &str) -> Result<String, ProviderError>;
}

/// Managed warehouse clusters
#[async_trait::async_trait]
pub trait ClusterProvider: Send + Sync {
    /// Start creating a cluster; returns before it is available
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<(), ProviderError>;

    /// Current state; [`ProviderError::ClusterNotFound`] once it is gone
    async fn describe_cluster(&self, identifier: &str) -> Result<ClusterDescription, ProviderError>;

    /// Start deleting a cluster
    async fn delete_cluster(
        &self,
        identifier: &str,
        skip_final_snapshot: bool,
    ) -> Result<(), ProviderError>;
}

/// VPC security groups
#[async_trait::async_trait]
pub trait NetworkProvider: Send + Sync {
    /// The security group new clusters in this VPC are attached to
    async fn default_security_group(&self, vpc_id: &str) -> Result<SecurityGroup, ProviderError>;

    async fn authorize_ingress(
        &self,
        group: &SecurityGroup,
        rule: &IngressRule,
    ) -> Result<(), ProviderError>;
}
