//! Configuration schema (dwhpipe.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "dwhpipe.toml";

/// Cluster topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterType {
    /// One leader/compute node
    SingleNode,

    /// Leader node plus two or more compute nodes
    MultiNode,
}

impl ClusterType {
    /// Value the provider API expects
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleNode => "single-node",
            Self::MultiNode => "multi-node",
        }
    }
}

impl Default for ClusterType {
    fn default() -> Self {
        Self::MultiNode
    }
}

impl std::fmt::Display for ClusterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AWS account settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Region used for every provider call and inside COPY statements
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
        }
    }
}

fn default_region() -> String {
    "us-west-2".to_string()
}

/// Cluster hardware and identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster topology
    #[serde(default)]
    pub cluster_type: ClusterType,

    /// Node type (e.g. dc2.large)
    pub node_type: String,

    /// Number of compute nodes (ignored for single-node clusters)
    #[serde(default = "default_num_nodes")]
    pub num_nodes: u32,

    /// Cluster identifier
    pub identifier: String,

    /// Name of the IAM role the cluster assumes to read from S3
    pub iam_role_name: String,

    /// Abort provisioning when role creation fails for any reason other than
    /// the role already existing
    #[serde(default)]
    pub strict_role_creation: bool,
}

fn default_num_nodes() -> u32 {
    4
}

/// Database settings, shared by cluster creation and the SQL session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Cluster endpoint address; resolved from the provider when absent
    #[serde(default)]
    pub host: Option<String>,

    /// Database name
    pub name: String,

    /// Master user name
    pub user: String,

    /// Master user password
    pub password: String,

    /// Port the cluster listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect over TLS
    #[serde(default)]
    pub tls: bool,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"** redacted **")
            .field("port", &self.port)
            .field("tls", &self.tls)
            .finish()
    }
}

fn default_port() -> u16 {
    5439
}

/// Pre-resolved role identifier interpolated into COPY statements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamRoleConfig {
    /// Role ARN; resolved from the provider by role name when absent
    #[serde(default)]
    pub arn: Option<String>,
}

/// Object storage locations of the raw datasets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    /// Prefix holding the event log files
    pub log_data: String,

    /// JSONPaths descriptor for the event logs; `auto` mapping when absent
    #[serde(default)]
    pub log_jsonpath: Option<String>,

    /// Prefix holding the song metadata files
    pub song_data: String,
}

/// Status polling budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between two status checks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Total seconds to wait before giving up
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    900
}

impl PollingConfig {
    /// Retry policy for waits where the cluster must exist
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_budget(
            Duration::from_secs(self.timeout_secs),
            Duration::from_secs(self.interval_secs),
        )
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// AWS account settings
    #[serde(default)]
    pub aws: AwsConfig,

    /// Cluster hardware and identity
    pub cluster: ClusterConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// Role identifier used by COPY statements
    #[serde(default)]
    pub iam_role: IamRoleConfig,

    /// Dataset locations
    pub s3: S3Config,

    /// Polling budget
    #[serde(default)]
    pub polling: PollingConfig,

    /// Directory of the config file (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Reject settings the provider would refuse anyway
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.identifier.trim().is_empty() {
            return Err(ConfigError::Invalid("cluster.identifier must not be empty".into()));
        }
        if self.cluster.iam_role_name.trim().is_empty() {
            return Err(ConfigError::Invalid("cluster.iam_role_name must not be empty".into()));
        }
        if self.cluster.cluster_type == ClusterType::MultiNode && self.cluster.num_nodes < 2 {
            return Err(ConfigError::Invalid(format!(
                "multi-node clusters need at least 2 nodes, got {}",
                self.cluster.num_nodes
            )));
        }
        if self.polling.interval_secs == 0 {
            return Err(ConfigError::Invalid("polling.interval_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Missing environment variable {0}")]
    MissingEnv(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [cluster]
        node_type = "dc2.large"
        identifier = "dwhCluster"
        iam_role_name = "dwhRole"

        [database]
        name = "dwh"
        user = "dwhuser"
        password = "Passw0rd"

        [s3]
        log_data = "s3://udacity-dend/log_data"
        log_jsonpath = "s3://udacity-dend/log_json_path.json"
        song_data = "s3://udacity-dend/song_data"
    "#;

    #[test]
    fn test_minimal_config_takes_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.aws.region, "us-west-2");
        assert_eq!(config.cluster.cluster_type, ClusterType::MultiNode);
        assert_eq!(config.cluster.num_nodes, 4);
        assert!(!config.cluster.strict_role_creation);
        assert_eq!(config.database.port, 5439);
        assert_eq!(config.database.host, None);
        assert_eq!(config.iam_role.arn, None);
        assert_eq!(config.polling.interval_secs, 30);
        assert_eq!(config.polling.timeout_secs, 900);
    }

    #[test]
    fn test_default_polling_budget_is_thirty_attempts() {
        let policy = PollingConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.interval, Duration::from_secs(30));
    }

    #[test]
    fn test_single_node_cluster_type() {
        let toml = MINIMAL.replace(
            "node_type = \"dc2.large\"",
            "node_type = \"dc2.large\"\ncluster_type = \"single-node\"\nnum_nodes = 1",
        );
        let config = Config::from_toml(&toml).unwrap();
        assert_eq!(config.cluster.cluster_type, ClusterType::SingleNode);
        assert_eq!(config.cluster.cluster_type.to_string(), "single-node");
    }

    #[test]
    fn test_multi_node_needs_two_nodes() {
        let toml = MINIMAL.replace(
            "node_type = \"dc2.large\"",
            "node_type = \"dc2.large\"\nnum_nodes = 1",
        );
        let err = Config::from_toml(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        let err = Config::from_toml("[cluster]\nnode_type = \"dc2.large\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_password_is_redacted_in_debug() {
        let config = Config::from_toml(MINIMAL).unwrap();
        let debug = format!("{:?}", config.database);
        assert!(!debug.contains("Passw0rd"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        let config = Config::from_toml(MINIMAL).unwrap();
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.cluster, config.cluster);
        assert_eq!(loaded.s3, config.s3);
        assert_eq!(loaded.project_root, dir.path());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::from_file(Path::new("/nonexistent/dwhpipe.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
