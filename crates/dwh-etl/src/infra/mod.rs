//! Infrastructure Gateway
//!
//! The IAM role and Redshift cluster operations the provisioning and teardown
//! flows need. [`AwsInfrastructure`] talks to AWS; tests use an in-memory fake.

mod aws;

pub use aws::{AwsInfrastructure, AwsSettings};

use crate::error::Result;
use async_trait::async_trait;
use dwh_common::config::CLUSTER_SECTION;
use dwh_common::DwhConfig;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Managed policy granting the cluster read access to the source buckets
pub const S3_READ_ONLY_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess";

/// Cluster status meaning the endpoint accepts connections
pub const STATUS_AVAILABLE: &str = "available";

/// Trust policy letting Redshift assume the role
pub fn redshift_trust_policy() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": "redshift.amazonaws.com" }
        }]
    })
    .to_string()
}

/// A failed remote call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation}: {message}")]
pub struct InfraError {
    pub operation: &'static str,
    pub message: String,
}

impl InfraError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Outcome of an idempotent create call
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Creation {
    Created,
    AlreadyExists,
}

/// Outcome of a delete call on a resource that may already be gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Deletion {
    Deleted,
    NotFound,
}

/// Cluster shape and master credentials from the `[CLUSTER]` section
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub identifier: String,
    pub cluster_type: String,
    pub node_type: String,
    pub num_nodes: u32,
    pub db_name: String,
    pub master_user: String,
    pub master_password: String,
    pub port: Option<u16>,
}

impl ClusterSpec {
    pub fn from_config(config: &DwhConfig) -> Result<Self> {
        let port = match config.get(CLUSTER_SECTION, "DB_PORT") {
            Some(_) => Some(config.parse::<u16>(CLUSTER_SECTION, "DB_PORT")?),
            None => None,
        };
        let cluster_type = config.require(CLUSTER_SECTION, "CLUSTER_TYPE")?.to_lowercase();
        let num_nodes = if cluster_type == "multi-node" {
            config.parse::<u32>(CLUSTER_SECTION, "NUM_NODES")?
        } else {
            1
        };

        Ok(Self {
            identifier: config.require(CLUSTER_SECTION, "CLUSTER_IDENTIFIER")?.to_string(),
            cluster_type,
            node_type: config.require(CLUSTER_SECTION, "NODE_TYPE")?.to_string(),
            num_nodes,
            db_name: config.require(CLUSTER_SECTION, "DB_NAME")?.to_string(),
            master_user: config.require(CLUSTER_SECTION, "DB_USER")?.to_string(),
            master_password: config.require(CLUSTER_SECTION, "DB_PASSWORD")?.to_string(),
            port,
        })
    }

    pub fn is_multi_node(&self) -> bool {
        self.cluster_type == "multi-node"
    }
}

impl fmt::Debug for ClusterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSpec")
            .field("identifier", &self.identifier)
            .field("cluster_type", &self.cluster_type)
            .field("node_type", &self.node_type)
            .field("num_nodes", &self.num_nodes)
            .field("db_name", &self.db_name)
            .field("master_user", &self.master_user)
            .field("master_password", &"***")
            .field("port", &self.port)
            .finish()
    }
}

/// Current state of a cluster
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ClusterDescription {
    pub identifier: String,
    pub status: String,
    /// Endpoint address, present once the cluster is available
    pub endpoint: Option<String>,
    pub port: Option<u16>,
    pub role_arns: Vec<String>,
}

impl ClusterDescription {
    pub fn is_available(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_AVAILABLE)
    }
}

/// IAM role and Redshift cluster operations
#[async_trait]
pub trait Infrastructure: Send + Sync {
    /// Create a role with the given trust policy document.
    async fn create_role(
        &self,
        name: &str,
        description: &str,
        trust_policy: &str,
    ) -> std::result::Result<Creation, InfraError>;

    async fn attach_policy(&self, role: &str, policy_arn: &str) -> std::result::Result<(), InfraError>;

    async fn role_arn(&self, role: &str) -> std::result::Result<String, InfraError>;

    async fn create_cluster(
        &self,
        spec: &ClusterSpec,
        role_arn: &str,
    ) -> std::result::Result<Creation, InfraError>;

    /// `None` when no cluster with this identifier exists
    async fn describe_cluster(
        &self,
        identifier: &str,
    ) -> std::result::Result<Option<ClusterDescription>, InfraError>;

    /// Delete without a final snapshot.
    async fn delete_cluster(&self, identifier: &str) -> std::result::Result<(), InfraError>;

    /// Detaching a policy that is not attached succeeds.
    async fn detach_policy(&self, role: &str, policy_arn: &str) -> std::result::Result<(), InfraError>;

    async fn delete_role(&self, role: &str) -> std::result::Result<Deletion, InfraError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const CLUSTER: &str = "\
[CLUSTER]
CLUSTER_TYPE=multi-node
NUM_NODES=4
NODE_TYPE=dc2.large
CLUSTER_IDENTIFIER=dwhCluster
DB_NAME=dwh
DB_USER=dwhuser
DB_PASSWORD=Passw0rd
DB_PORT=5439
";

    #[test]
    fn test_cluster_spec_from_config() {
        let spec = ClusterSpec::from_config(&DwhConfig::from_ini_str(CLUSTER).unwrap()).unwrap();

        assert_eq!(spec.identifier, "dwhCluster");
        assert!(spec.is_multi_node());
        assert_eq!(spec.num_nodes, 4);
        assert_eq!(spec.port, Some(5439));
        assert!(!format!("{:?}", spec).contains("Passw0rd"));
    }

    #[test]
    fn test_single_node_ignores_node_count() {
        let ini = CLUSTER
            .replace("multi-node", "single-node")
            .replace("NUM_NODES=4\n", "");
        let spec = ClusterSpec::from_config(&DwhConfig::from_ini_str(&ini).unwrap()).unwrap();

        assert!(!spec.is_multi_node());
        assert_eq!(spec.num_nodes, 1);
    }

    #[test]
    fn test_multi_node_requires_node_count() {
        let ini = CLUSTER.replace("NUM_NODES=4\n", "");
        assert!(ClusterSpec::from_config(&DwhConfig::from_ini_str(&ini).unwrap()).is_err());
    }

    #[test]
    fn test_trust_policy_names_redshift() {
        let policy: serde_json::Value = serde_json::from_str(&redshift_trust_policy()).unwrap();
        assert_eq!(policy["Version"], "2012-10-17");
        assert_eq!(policy["Statement"][0]["Principal"]["Service"], "redshift.amazonaws.com");
        assert_eq!(policy["Statement"][0]["Action"], "sts:AssumeRole");
    }
}
