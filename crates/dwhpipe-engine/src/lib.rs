//! dwhpipe engine - provisioning and loading logic
//!
//! This crate implements:
//! - The access role manager
//! - The cluster lifecycle controller (create, wait, open port, delete)
//! - Provision and teardown flows
//! - The batch SQL runner and the ETL stages built on it

pub mod cluster;
pub mod error;
pub mod pipeline;
pub mod provision;
pub mod resolve;
pub mod role;
pub mod runner;
pub mod step;

pub use cluster::{ClusterController, StatusWait};
pub use error::{ProvisionError, RunError};
pub use pipeline::{recreate_tables, EtlPipeline};
pub use provision::{ProvisionReport, Provisioner, Providers, TeardownReport};
pub use resolve::{host_configured, resolve_host, resolve_role_arn, role_arn_configured};
pub use role::{RoleCreation, RoleManager, RoleOutcome, RoleTeardown};
pub use runner::{BatchRunner, RunSummary};
pub use step::Step;
