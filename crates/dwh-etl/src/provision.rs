//! Cluster and role lifecycle
//!
//! [`provision`] creates the IAM role and the Redshift cluster and waits until
//! the cluster is available; [`teardown`] removes both after confirmation.
//! Every failed remote call aborts the flow.
//!
//! Waiting is bounded by a [`PollPolicy`] and can be interrupted with a
//! [`CancellationToken`].

use crate::confirm::{ConfirmationPolicy, ConfirmationRequest};
use crate::error::{EtlError, Result};
use crate::infra::{
    redshift_trust_policy, ClusterDescription, ClusterSpec, Creation, Deletion, Infrastructure,
    S3_READ_ONLY_POLICY_ARN,
};
use dwh_common::config::{CLUSTER_SECTION, IAM_ROLE_SECTION};
use dwh_common::DwhConfig;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ============================================================================
// Polling
// ============================================================================

/// Bounded exponential backoff for cluster state polling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(30),
            multiplier: 1.5,
            timeout: Duration::from_secs(20 * 60),
        }
    }
}

impl PollPolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Interval following `current`, capped at `max_interval`
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier.max(1.0)).min(self.max_interval)
    }
}

/// Describe the cluster until `done` accepts the description.
///
/// Returns the accepted description (`None` once the cluster is gone).
async fn wait_for_cluster<F>(
    infra: &dyn Infrastructure,
    identifier: &str,
    waiting_for: &'static str,
    poll: &PollPolicy,
    cancel: &CancellationToken,
    mut done: F,
) -> Result<Option<ClusterDescription>>
where
    F: FnMut(Option<&ClusterDescription>) -> bool,
{
    let deadline = Instant::now() + poll.timeout;
    let mut interval = poll.initial_interval;

    loop {
        let description = infra.describe_cluster(identifier).await?;
        if done(description.as_ref()) {
            return Ok(description);
        }

        let status = description
            .as_ref()
            .map_or("not found", |d| d.status.as_str())
            .to_string();
        let now = Instant::now();
        if now >= deadline {
            return Err(EtlError::infrastructure(
                "wait-cluster",
                format!(
                    "cluster '{}' not {} after {}s (last status: {})",
                    identifier,
                    waiting_for,
                    poll.timeout.as_secs(),
                    status
                ),
            ));
        }

        info!(cluster = identifier, status = %status, next_check_secs = interval.as_secs_f64(), "Waiting for cluster to be {}", waiting_for);

        let sleep = interval.min(deadline - now);
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(EtlError::Cancelled(format!(
                    "waiting for cluster '{}' to be {}",
                    identifier, waiting_for
                )));
            }
            _ = tokio::time::sleep(sleep) => {}
        }
        interval = poll.next_interval(interval);
    }
}

// ============================================================================
// Provisioning
// ============================================================================

/// IAM role created for the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub name: String,
    pub description: String,
}

/// What [`provision`] creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningSpec {
    pub cluster: ClusterSpec,
    pub role: RoleSpec,
}

impl ProvisioningSpec {
    pub fn from_config(config: &DwhConfig) -> Result<Self> {
        Ok(Self {
            cluster: ClusterSpec::from_config(config)?,
            role: RoleSpec {
                name: config.require(IAM_ROLE_SECTION, "IAM_ROLE_NAME")?.to_string(),
                description: "Allows Redshift clusters to call AWS services on your behalf."
                    .to_string(),
            },
        })
    }
}

/// An available cluster and the role it runs under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedCluster {
    pub identifier: String,
    pub endpoint: String,
    pub port: Option<u16>,
    pub role_arn: String,
    pub role: Creation,
    pub cluster: Creation,
}

/// Create the role and the cluster and wait until the cluster is available.
///
/// Existing resources are reused.
pub async fn provision(
    infra: &dyn Infrastructure,
    spec: &ProvisioningSpec,
    poll: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<ProvisionedCluster> {
    let role = infra
        .create_role(&spec.role.name, &spec.role.description, &redshift_trust_policy())
        .await?;
    match role {
        Creation::Created => info!(role = %spec.role.name, "IAM role created"),
        Creation::AlreadyExists => warn!(role = %spec.role.name, "IAM role already exists, reusing it"),
    }

    infra.attach_policy(&spec.role.name, S3_READ_ONLY_POLICY_ARN).await?;
    info!(role = %spec.role.name, policy = S3_READ_ONLY_POLICY_ARN, "Policy attached");

    let role_arn = infra.role_arn(&spec.role.name).await?;

    let cluster = infra.create_cluster(&spec.cluster, &role_arn).await?;
    match cluster {
        Creation::Created => info!(cluster = %spec.cluster.identifier, "Cluster creation started"),
        Creation::AlreadyExists => {
            warn!(cluster = %spec.cluster.identifier, "Cluster already exists, reusing it")
        }
    }

    let description = wait_for_cluster(
        infra,
        &spec.cluster.identifier,
        "available",
        poll,
        cancel,
        |d| d.is_some_and(ClusterDescription::is_available),
    )
    .await?
    .ok_or_else(|| {
        EtlError::infrastructure("wait-cluster", format!("cluster '{}' disappeared", spec.cluster.identifier))
    })?;

    let endpoint = description.endpoint.clone().ok_or_else(|| {
        EtlError::infrastructure(
            "describe-cluster",
            format!("cluster '{}' is available but has no endpoint", description.identifier),
        )
    })?;

    info!(cluster = %description.identifier, endpoint = %endpoint, "Cluster available");
    Ok(ProvisionedCluster {
        identifier: description.identifier,
        endpoint,
        port: description.port,
        role_arn,
        role,
        cluster,
    })
}

// ============================================================================
// Teardown
// ============================================================================

/// What [`teardown`] removes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownSpec {
    pub cluster_identifier: String,
    pub role_name: String,
}

impl TeardownSpec {
    pub fn from_config(config: &DwhConfig) -> Result<Self> {
        Ok(Self {
            cluster_identifier: config.require(CLUSTER_SECTION, "CLUSTER_IDENTIFIER")?.to_string(),
            role_name: config.require(IAM_ROLE_SECTION, "IAM_ROLE_NAME")?.to_string(),
        })
    }
}

/// What happened to one resource during teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeardownOutcome {
    Deleted,
    Declined,
    NotFound,
    /// Not reached because an earlier step was declined
    NotAsked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub cluster: TeardownOutcome,
    pub role: TeardownOutcome,
}

/// Delete the cluster, then the role, each after its own confirmation.
///
/// Declining the cluster leaves the role untouched.
pub async fn teardown(
    infra: &dyn Infrastructure,
    spec: &TeardownSpec,
    confirm: &dyn ConfirmationPolicy,
    poll: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<TeardownReport> {
    let identifier = spec.cluster_identifier.as_str();

    let cluster = match infra.describe_cluster(identifier).await? {
        None => {
            info!(cluster = identifier, "Cluster not found, nothing to delete");
            TeardownOutcome::NotFound
        }
        Some(description) => {
            info!(
                cluster = identifier,
                status = %description.status,
                endpoint = description.endpoint.as_deref().unwrap_or("-"),
                "Cluster found"
            );

            let request = ConfirmationRequest::new(
                identifier,
                format!(
                    "Do you want to delete cluster '{}' (status: {})? This cannot be undone.",
                    identifier, description.status
                ),
            );
            if !confirm.confirm(&request) {
                info!(cluster = identifier, "Cluster deletion declined, keeping cluster and role");
                return Ok(TeardownReport {
                    cluster: TeardownOutcome::Declined,
                    role: TeardownOutcome::NotAsked,
                });
            }

            if description.status.eq_ignore_ascii_case("deleting") {
                info!(cluster = identifier, "Cluster deletion already in progress");
            } else {
                infra.delete_cluster(identifier).await?;
                info!(cluster = identifier, "Cluster deletion started");
            }

            wait_for_cluster(infra, identifier, "deleted", poll, cancel, |d| d.is_none()).await?;
            info!(cluster = identifier, "Cluster deleted");
            TeardownOutcome::Deleted
        }
    };

    let request = ConfirmationRequest::new(
        spec.role_name.as_str(),
        format!("Do you want to delete IAM role '{}'?", spec.role_name),
    );
    if !confirm.confirm(&request) {
        info!(role = %spec.role_name, "Role deletion declined");
        return Ok(TeardownReport {
            cluster,
            role: TeardownOutcome::Declined,
        });
    }

    infra.detach_policy(&spec.role_name, S3_READ_ONLY_POLICY_ARN).await?;
    let role = match infra.delete_role(&spec.role_name).await? {
        Deletion::Deleted => {
            info!(role = %spec.role_name, "IAM role deleted");
            TeardownOutcome::Deleted
        }
        Deletion::NotFound => {
            info!(role = %spec.role_name, "IAM role not found");
            TeardownOutcome::NotFound
        }
    };

    Ok(TeardownReport { cluster, role })
}
