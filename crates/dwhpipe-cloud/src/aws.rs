//! AWS implementation of the provider traits
//!
//! One [`AwsProvider`] holds IAM, Redshift and EC2 clients built from the
//! same static credentials and region.
//!
//! SDK errors are classified by their error code:
//! - `EntityAlreadyExists`, `ClusterAlreadyExists`, `InvalidPermission.Duplicate`
//!   become [`ProviderError::AlreadyExists`]
//! - `ClusterNotFound` becomes [`ProviderError::ClusterNotFound`]
//! - `NoSuchEntity` and EC2 `*.NotFound` codes become [`ProviderError::NotFound`]
//! - access-denied codes become [`ProviderError::PermissionDenied`]
//! - errors without a code (timeouts, DNS, TLS) become [`ProviderError::NetworkError`]

use aws_config::BehaviorVersion;
use aws_sdk_ec2::types::{Filter, IpPermission, IpRange};
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata};
use dwhpipe_core::{ClusterType, Credentials};
use tracing::debug;

use crate::adapter::{
    ClusterDescription, ClusterProvider, ClusterSpec, ClusterStatus, Endpoint, IdentityProvider,
    IngressRule, NetworkProvider, ProviderError, RoleSpec, SecurityGroup,
};

/// Credential provider name reported to the SDK
const CREDENTIALS_SOURCE: &str = "dwhpipe-environment";

/// IAM, Redshift and EC2 clients for one account and region
#[derive(Clone)]
pub struct AwsProvider {
    iam: aws_sdk_iam::Client,
    redshift: aws_sdk_redshift::Client,
    ec2: aws_sdk_ec2::Client,
    region: String,
}

impl AwsProvider {
    /// Build clients from static credentials
    pub async fn connect(credentials: &Credentials, region: impl Into<String>) -> Self {
        let region = region.into();

        let static_credentials = aws_credential_types::Credentials::new(
            credentials.access_key.clone(),
            credentials.secret_key.clone(),
            Some(credentials.session_token.clone()),
            None,
            CREDENTIALS_SOURCE,
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_redshift::config::Region::new(region.clone()))
            .credentials_provider(static_credentials)
            .load()
            .await;

        debug!(region = %region, "AWS clients initialised");

        Self {
            iam: aws_sdk_iam::Client::new(&sdk_config),
            redshift: aws_sdk_redshift::Client::new(&sdk_config),
            ec2: aws_sdk_ec2::Client::new(&sdk_config),
            region,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Map an SDK error to a [`ProviderError`] by its error code
fn classify<E>(operation: &str, err: E) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let Some(code) = err.code() else {
        return ProviderError::NetworkError(format!("{}: {}", operation, DisplayErrorContext(&err)));
    };

    let message = format!("{}: {}", operation, err.message().unwrap_or(code));

    match code {
        "EntityAlreadyExists" | "ClusterAlreadyExists" | "InvalidPermission.Duplicate" => {
            ProviderError::AlreadyExists(message)
        }
        "ClusterNotFound" => ProviderError::ClusterNotFound(message),
        "NoSuchEntity" | "InvalidVpcID.NotFound" | "InvalidGroup.NotFound" => {
            ProviderError::NotFound(message)
        }
        "AccessDenied" | "AccessDeniedException" | "UnauthorizedOperation"
        | "InvalidClientTokenId" | "ExpiredToken" => ProviderError::PermissionDenied(message),
        other => ProviderError::Service {
            code: other.to_string(),
            message,
        },
    }
}

fn to_port(port: Option<i32>) -> Option<u16> {
    port.and_then(|p| u16::try_from(p).ok())
}

fn describe(cluster: &aws_sdk_redshift::types::Cluster, identifier: &str) -> ClusterDescription {
    let endpoint = cluster.endpoint().and_then(|e| {
        Some(Endpoint {
            address: e.address()?.to_string(),
            port: to_port(e.port())?,
        })
    });

    ClusterDescription {
        identifier: cluster
            .cluster_identifier()
            .unwrap_or(identifier)
            .to_string(),
        status: cluster
            .cluster_status()
            .map(ClusterStatus::parse)
            .unwrap_or_else(|| ClusterStatus::Unknown("unreported".to_string())),
        node_type: cluster.node_type().map(String::from),
        number_of_nodes: cluster.number_of_nodes().and_then(|n| u32::try_from(n).ok()),
        db_name: cluster.db_name().map(String::from),
        master_username: cluster.master_username().map(String::from),
        endpoint,
        vpc_id: cluster.vpc_id().map(String::from),
        iam_roles: cluster
            .iam_roles()
            .iter()
            .filter_map(|r| r.iam_role_arn().map(String::from))
            .collect(),
    }
}

#[async_trait::async_trait]
impl IdentityProvider for AwsProvider {
    async fn create_role(&self, spec: &RoleSpec) -> Result<(), ProviderError> {
        debug!(role = %spec.name, "CreateRole");
        self.iam
            .create_role()
            .path(&spec.path)
            .role_name(&spec.name)
            .description(&spec.description)
            .assume_role_policy_document(&spec.assume_role_policy)
            .send()
            .await
            .map_err(|e| classify("CreateRole", e))?;
        Ok(())
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError> {
        debug!(role = %role_name, policy = %policy_arn, "AttachRolePolicy");
        self.iam
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify("AttachRolePolicy", e))?;
        Ok(())
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError> {
        debug!(role = %role_name, policy = %policy_arn, "DetachRolePolicy");
        self.iam
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify("DetachRolePolicy", e))?;
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), ProviderError> {
        debug!(role = %role_name, "DeleteRole");
        self.iam
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| classify("DeleteRole", e))?;
        Ok(())
    }

    async fn get_role_arn(&self, role_name: &str) -> Result<String, ProviderError> {
        debug!(role = %role_name, "GetRole");
        let output = self
            .iam
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| classify("GetRole", e))?;

        output
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| ProviderError::InvalidResponse(format!("GetRole returned no role for {}", role_name)))
    }
}

#[async_trait::async_trait]
impl ClusterProvider for AwsProvider {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<(), ProviderError> {
        debug!(cluster_id = %spec.identifier, cluster_type = %spec.cluster_type, "CreateCluster");

        let mut request = self
            .redshift
            .create_cluster()
            .cluster_identifier(&spec.identifier)
            .cluster_type(spec.cluster_type.as_str())
            .node_type(&spec.node_type)
            .db_name(&spec.db_name)
            .master_username(&spec.master_username)
            .master_user_password(&spec.master_password)
            .port(i32::from(spec.port));

        if spec.cluster_type == ClusterType::MultiNode {
            let nodes = i32::try_from(spec.number_of_nodes)
                .map_err(|_| ProviderError::ConfigError(format!("node count {} out of range", spec.number_of_nodes)))?;
            request = request.number_of_nodes(nodes);
        }

        for role in &spec.iam_roles {
            request = request.iam_roles(role);
        }

        request
            .send()
            .await
            .map_err(|e| classify("CreateCluster", e))?;
        Ok(())
    }

    async fn describe_cluster(&self, identifier: &str) -> Result<ClusterDescription, ProviderError> {
        let output = self
            .redshift
            .describe_clusters()
            .cluster_identifier(identifier)
            .send()
            .await
            .map_err(|e| classify("DescribeClusters", e))?;

        output
            .clusters()
            .first()
            .map(|cluster| describe(cluster, identifier))
            .ok_or_else(|| ProviderError::ClusterNotFound(identifier.to_string()))
    }

    async fn delete_cluster(
        &self,
        identifier: &str,
        skip_final_snapshot: bool,
    ) -> Result<(), ProviderError> {
        debug!(cluster_id = %identifier, skip_final_snapshot, "DeleteCluster");
        self.redshift
            .delete_cluster()
            .cluster_identifier(identifier)
            .skip_final_cluster_snapshot(skip_final_snapshot)
            .send()
            .await
            .map_err(|e| classify("DeleteCluster", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl NetworkProvider for AwsProvider {
    async fn default_security_group(&self, vpc_id: &str) -> Result<SecurityGroup, ProviderError> {
        let output = self
            .ec2
            .describe_security_groups()
            .filters(Filter::builder().name("vpc-id").values(vpc_id).build())
            .send()
            .await
            .map_err(|e| classify("DescribeSecurityGroups", e))?;

        let groups = output.security_groups();
        let group = groups
            .iter()
            .find(|g| g.group_name() == Some("default"))
            .or_else(|| groups.first())
            .ok_or_else(|| ProviderError::NotFound(format!("no security group in VPC {}", vpc_id)))?;

        let group_id = group
            .group_id()
            .ok_or_else(|| ProviderError::InvalidResponse("security group without id".to_string()))?;

        Ok(SecurityGroup {
            group_id: group_id.to_string(),
            group_name: group.group_name().unwrap_or_default().to_string(),
            vpc_id: vpc_id.to_string(),
        })
    }

    async fn authorize_ingress(
        &self,
        group: &SecurityGroup,
        rule: &IngressRule,
    ) -> Result<(), ProviderError> {
        debug!(group_id = %group.group_id, port = rule.from_port, cidr = %rule.cidr, "AuthorizeSecurityGroupIngress");

        let permission = IpPermission::builder()
            .ip_protocol(&rule.protocol)
            .from_port(i32::from(rule.from_port))
            .to_port(i32::from(rule.to_port))
            .ip_ranges(IpRange::builder().cidr_ip(&rule.cidr).build())
            .build();

        self.ec2
            .authorize_security_group_ingress()
            .group_id(&group.group_id)
            .ip_permissions(permission)
            .send()
            .await
            .map_err(|e| classify("AuthorizeSecurityGroupIngress", e))?;
        Ok(())
    }
}
