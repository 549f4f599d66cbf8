//! Cloud provider adapters for warehouse provisioning
//!
//! This module defines the three provider seams the lifecycle controller
//! talks to (IAM roles, Redshift clusters, VPC security groups) and their
//! implementations.
//!
//! ## Features
//!
//! Enable the real provider via Cargo features:
//! - `aws` - IAM, Redshift and EC2 through the AWS SDK
//!
//! [`MockProvider`] is always available for tests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dwhpipe_cloud::{AwsProvider, ClusterProvider};
//!
//! let provider = AwsProvider::connect(&credentials, "us-west-2").await;
//! let cluster = provider.describe_cluster("dwhCluster").await?;
//! println!("{} is {}", cluster.identifier, cluster.status);
//! ```

pub mod adapter;
pub mod mock;

#[cfg(feature = "aws")]
pub mod aws;

pub use adapter::{
    redshift_trust_policy, ClusterDescription, ClusterProvider, ClusterSpec, ClusterStatus,
    Endpoint, IdentityProvider, IngressRule, NetworkProvider, ProviderError, RoleSpec,
    SecurityGroup, REDSHIFT_SERVICE_PRINCIPAL, S3_READ_ONLY_POLICY_ARN,
};
pub use mock::{MockProvider, MockRole, MOCK_SECURITY_GROUP_ID, MOCK_VPC_ID};

#[cfg(feature = "aws")]
pub use aws::AwsProvider;
