//! Provision and teardown flows
//!
//! Provision: ensure the role, create the cluster, wait for `available`,
//! then open the database port. Teardown: delete the cluster, wait for it
//! to disappear, then remove the role. The ingress rule is left in place.

use crate::cluster::ClusterController;
use crate::error::ProvisionError;
use crate::role::{RoleManager, RoleOutcome, RoleTeardown};
use crate::step::Step;
use dwhpipe_cloud::{
    ClusterDescription, ClusterProvider, ClusterStatus, IdentityProvider, NetworkProvider,
};
use dwhpipe_core::{Config, PollOutcome, Sleeper, TokioSleeper};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The provider seams a run talks to
#[derive(Clone)]
pub struct Providers {
    pub identity: Arc<dyn IdentityProvider>,
    pub clusters: Arc<dyn ClusterProvider>,
    pub network: Arc<dyn NetworkProvider>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl Providers {
    /// Use one provider for all three seams
    pub fn from_provider<P>(provider: P) -> Self
    where
        P: IdentityProvider + ClusterProvider + NetworkProvider + 'static,
    {
        let provider = Arc::new(provider);
        Self {
            identity: provider.clone(),
            clusters: provider.clone(),
            network: provider,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }
}

/// What a provision run did
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionReport {
    pub role: RoleOutcome,
    pub create: Step,

    /// The cluster once available; `None` when the wait did not get there
    pub cluster: Option<ClusterDescription>,

    /// Most recent status seen while waiting
    pub last_status: Option<ClusterStatus>,
    pub attempts: u32,

    /// `None` when ingress was not attempted
    pub ingress: Option<Step>,
}

impl ProvisionReport {
    /// Cluster is available; the endpoint may be used
    pub fn is_ready(&self) -> bool {
        self.cluster.is_some()
    }
}

/// What a teardown run did
#[derive(Debug, Clone, PartialEq)]
pub struct TeardownReport {
    pub delete: Step,

    /// The cluster was observed to be gone
    pub deleted: bool,
    pub last_status: Option<ClusterStatus>,
    pub attempts: u32,
    pub role: RoleTeardown,
}

pub struct Provisioner {
    roles: RoleManager,
    cluster: ClusterController,
}

impl Provisioner {
    pub fn new(config: &Config, providers: Providers) -> Self {
        let roles = RoleManager::new(providers.identity, config.cluster.iam_role_name.clone())
            .with_strict_creation(config.cluster.strict_role_creation);
        let cluster = ClusterController::new(config, providers.clusters, providers.network)
            .with_sleeper(providers.sleeper);
        Self { roles, cluster }
    }

    pub fn roles(&self) -> &RoleManager {
        &self.roles
    }

    pub fn cluster(&self) -> &ClusterController {
        &self.cluster
    }

    /// Bring the cluster up
    ///
    /// Only a role that cannot be resolved stops the run. A cluster that
    /// never becomes available is reported, not raised.
    pub async fn provision(&self) -> Result<ProvisionReport, ProvisionError> {
        let role = self.roles.ensure_role().await?;
        let create = self.cluster.create(&role.arn).await;
        let polled = self.cluster.await_status(ClusterStatus::Available).await;

        let attempts = polled.attempts;
        let last_status = polled.outcome.last().map(|d| d.status.clone());

        let (cluster, ingress) = match polled.outcome {
            PollOutcome::Reached(description) => {
                match &description.endpoint {
                    Some(endpoint) => info!(cluster_id = %description.identifier, endpoint = %endpoint, "Cluster created"),
                    None => info!(cluster_id = %description.identifier, "Cluster created"),
                }
                let ingress = match description.vpc_id.as_deref() {
                    Some(vpc_id) => Some(self.cluster.open_ingress(vpc_id).await),
                    None => {
                        warn!(cluster_id = %description.identifier, "Cluster reports no VPC, port not opened");
                        None
                    }
                };
                (Some(description), ingress)
            }
            _ => {
                error!(cluster_id = %self.cluster.identifier(), "Could not connect to cluster");
                (None, None)
            }
        };

        Ok(ProvisionReport {
            role,
            create,
            cluster,
            last_status,
            attempts,
            ingress,
        })
    }

    /// Take the cluster down and remove the role
    ///
    /// Never fails; every error is logged and reported.
    pub async fn teardown(&self) -> TeardownReport {
        let delete = self.cluster.delete().await;
        let polled = self.cluster.await_status(ClusterStatus::Deleted).await;
        let role = self.roles.delete_role().await;

        TeardownReport {
            delete,
            deleted: polled.outcome.is_success(),
            last_status: polled.outcome.last().map(|d| d.status.clone()),
            attempts: polled.attempts,
            role,
        }
    }
}
