//! Cluster lifecycle controller
//!
//! Drives one Redshift cluster through
//! `absent -> creating -> available -> deleting -> not found`.
//!
//! Every provider call is best-effort: failures are logged and reported as a
//! [`Step`], and the caller decides what to do with degraded information.
//! Waiting is bounded by a [`RetryPolicy`]; a timeout is not an error.

use crate::step::Step;
use dwhpipe_cloud::{
    ClusterDescription, ClusterProvider, ClusterSpec, ClusterStatus, IngressRule, NetworkProvider,
    ProviderError,
};
use dwhpipe_core::{
    poll_until, ClusterConfig, Config, DatabaseConfig, PollOutcome, Polled, RetryPolicy, Sleeper,
    TokioSleeper,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of waiting for a cluster status
pub type StatusWait = Polled<ClusterDescription, ProviderError>;

pub struct ClusterController {
    clusters: Arc<dyn ClusterProvider>,
    network: Arc<dyn NetworkProvider>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    cluster: ClusterConfig,
    database: DatabaseConfig,
}

impl ClusterController {
    pub fn new(
        config: &Config,
        clusters: Arc<dyn ClusterProvider>,
        network: Arc<dyn NetworkProvider>,
    ) -> Self {
        Self {
            clusters,
            network,
            sleeper: Arc::new(TokioSleeper),
            policy: config.polling.retry_policy(),
            cluster: config.cluster.clone(),
            database: config.database.clone(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.cluster.identifier
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Create request for this cluster, using `role_arn` for S3 access
    pub fn spec(&self, role_arn: &str) -> ClusterSpec {
        ClusterSpec {
            identifier: self.cluster.identifier.clone(),
            cluster_type: self.cluster.cluster_type,
            node_type: self.cluster.node_type.clone(),
            number_of_nodes: self.cluster.num_nodes,
            db_name: self.database.name.clone(),
            master_username: self.database.user.clone(),
            master_password: self.database.password.clone(),
            port: self.database.port,
            iam_roles: vec![role_arn.to_string()],
        }
    }

    /// Ask the provider to create the cluster; does not wait
    pub async fn create(&self, role_arn: &str) -> Step {
        let step = Step::from_result(self.clusters.create_cluster(&self.spec(role_arn)).await);
        match &step {
            Step::Done => info!(
                cluster_id = %self.cluster.identifier,
                "Creating cluster, please wait until it is available"
            ),
            Step::AlreadyExists => warn!(
                cluster_id = %self.cluster.identifier,
                "Cluster already exists"
            ),
            Step::Failed(e) => warn!(
                cluster_id = %self.cluster.identifier,
                error = %e,
                "Cluster creation failed"
            ),
            Step::Skipped => {}
        }
        step
    }

    /// Poll until the cluster reports `target`
    ///
    /// A cluster that is not found ends the wait at once; that counts as
    /// success only when `target` is [`ClusterStatus::Deleted`].
    pub async fn await_status(&self, target: ClusterStatus) -> StatusWait {
        let policy = self
            .policy
            .with_absent_as_success(target == ClusterStatus::Deleted);
        let identifier = self.cluster.identifier.as_str();
        let mut attempt = 0;

        let polled = poll_until(
            &policy,
            self.sleeper.as_ref(),
            || async move {
                match self.clusters.describe_cluster(identifier).await {
                    Ok(description) => Ok(Some(description)),
                    Err(ProviderError::ClusterNotFound(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            },
            |description: &ClusterDescription| {
                attempt += 1;
                let reached = description.status == target;
                if !reached {
                    if let Some(notice) = retry_notice(&description.status, attempt, &policy) {
                        info!(cluster_id = %identifier, status = %description.status, "{}", notice);
                    }
                }
                reached
            },
        )
        .await;

        match &polled.outcome {
            PollOutcome::Reached(description) => {
                info!(cluster_id = %identifier, status = %description.status, attempts = polled.attempts, "Cluster reached target status");
            }
            PollOutcome::Absent { .. } => {
                warn!(cluster_id = %identifier, "Cluster {} already deleted", identifier);
            }
            PollOutcome::Exhausted(last) => {
                warn!(
                    cluster_id = %identifier,
                    target_status = %target,
                    last_status = %last.as_ref().map(|d| d.status.as_str()).unwrap_or("unknown"),
                    attempts = polled.attempts,
                    "Gave up waiting for cluster status"
                );
            }
            PollOutcome::Failed { error: e, .. } => {
                error!(cluster_id = %identifier, error = %e, "Could not describe cluster");
            }
        }

        polled
    }

    /// Allow inbound TCP on the database port from anywhere
    pub async fn open_ingress(&self, vpc_id: &str) -> Step {
        let group = match self.network.default_security_group(vpc_id).await {
            Ok(group) => group,
            Err(e) => {
                warn!(vpc_id = %vpc_id, error = %e, "Could not resolve default security group");
                return Step::Failed(e);
            }
        };
        info!(vpc_id = %vpc_id, group_id = %group.group_id, group_name = %group.group_name, "Opening port {}", self.database.port);

        let rule = IngressRule::tcp_from_anywhere(self.database.port);
        let step = Step::from_result(self.network.authorize_ingress(&group, &rule).await);
        match &step {
            Step::AlreadyExists => warn!(group_id = %group.group_id, "Ingress rule already exists"),
            Step::Failed(e) => warn!(group_id = %group.group_id, error = %e, "Could not authorize ingress"),
            Step::Done | Step::Skipped => {}
        }
        step
    }

    /// Ask the provider to delete the cluster, skipping the final snapshot
    pub async fn delete(&self) -> Step {
        let step = Step::from_result(
            self.clusters
                .delete_cluster(&self.cluster.identifier, true)
                .await,
        );
        match &step {
            Step::Failed(e) => error!(cluster_id = %self.cluster.identifier, error = %e, "Cluster deletion failed"),
            _ => info!(cluster_id = %self.cluster.identifier, "Deleting cluster"),
        }
        step
    }

    /// One describe call; `None` when the cluster does not exist
    pub async fn describe(&self) -> Result<Option<ClusterDescription>, ProviderError> {
        match self.clusters.describe_cluster(&self.cluster.identifier).await {
            Ok(description) => Ok(Some(description)),
            Err(ProviderError::ClusterNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Progress line for a poll that will be retried; `None` on the last attempt
fn retry_notice(status: &ClusterStatus, attempt: u32, policy: &RetryPolicy) -> Option<String> {
    (attempt < policy.max_attempts).then(|| {
        format!(
            "Cluster status: {}. Retrying in {} seconds",
            status,
            policy.interval.as_secs()
        )
    })
}
