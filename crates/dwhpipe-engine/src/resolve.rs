//! Values the config may leave for the provider to supply

use crate::cluster::ClusterController;
use crate::error::ProvisionError;
use crate::role::RoleManager;
use dwhpipe_core::Config;
use tracing::{debug, info};

/// `database.host`, or the endpoint of the available cluster
pub async fn resolve_host(
    config: &Config,
    cluster: &ClusterController,
) -> Result<String, ProvisionError> {
    if let Some(host) = configured(&config.database.host) {
        debug!(host = %host, "Using configured host");
        return Ok(host);
    }

    let description = cluster
        .describe()
        .await
        .map_err(|source| ProvisionError::Describe {
            cluster: cluster.identifier().to_string(),
            source,
        })?
        .ok_or_else(|| ProvisionError::Unresolved {
            cluster: cluster.identifier().to_string(),
            what: "endpoint",
            status: "not found".to_string(),
        })?;

    match description.endpoint {
        Some(endpoint) => {
            info!(cluster_id = %description.identifier, endpoint = %endpoint, "Resolved cluster endpoint");
            Ok(endpoint.address)
        }
        None => Err(ProvisionError::Unresolved {
            cluster: description.identifier,
            what: "endpoint",
            status: description.status.to_string(),
        }),
    }
}

/// `iam_role.arn`, or the ARN of the configured role name
pub async fn resolve_role_arn(config: &Config, roles: &RoleManager) -> Result<String, ProvisionError> {
    if let Some(arn) = configured(&config.iam_role.arn) {
        debug!(arn = %arn, "Using configured role ARN");
        return Ok(arn);
    }
    let arn = roles.role_arn().await?;
    info!(role = %roles.role_name(), arn = %arn, "Resolved role ARN");
    Ok(arn)
}

/// The host can be resolved without calling the provider
pub fn host_configured(config: &Config) -> bool {
    configured(&config.database.host).is_some()
}

/// The role ARN can be resolved without calling the provider
pub fn role_arn_configured(config: &Config) -> bool {
    configured(&config.iam_role.arn).is_some()
}

fn configured(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
