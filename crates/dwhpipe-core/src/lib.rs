//! dwhpipe core
//!
//! Configuration, credentials and the polling primitive shared by the
//! provisioning and loading crates.

pub mod config;
pub mod credentials;
pub mod retry;

pub use config::{
    AwsConfig, ClusterConfig, ClusterType, Config, ConfigError, DatabaseConfig, IamRoleConfig,
    PollingConfig, S3Config, DEFAULT_CONFIG_FILE,
};
pub use credentials::Credentials;
pub use retry::{poll_until, PollOutcome, Polled, RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
