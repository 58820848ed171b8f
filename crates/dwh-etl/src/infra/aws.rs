//! AWS implementation of the infrastructure gateway

use super::{ClusterDescription, ClusterSpec, Creation, Deletion, InfraError, Infrastructure};
use crate::error::Result;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_redshift::config::Region;
use aws_sdk_redshift::types::Cluster;
use dwh_common::DwhConfig;
use std::fmt;
use tracing::{debug, info, instrument};

/// Region used when `[AWS] REGION` is not configured
pub const DEFAULT_REGION: &str = crate::catalog::DEFAULT_REGION;

/// Credentials and region from the `[AWS]` section
#[derive(Clone, PartialEq, Eq)]
pub struct AwsSettings {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl AwsSettings {
    pub fn from_config(config: &DwhConfig) -> Result<Self> {
        Ok(Self {
            access_key: config.require("AWS", "KEY")?.to_string(),
            secret_key: config.require("AWS", "SECRET")?.to_string(),
            region: config.get_or("AWS", "REGION", DEFAULT_REGION).to_string(),
        })
    }
}

impl fmt::Debug for AwsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsSettings")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("region", &self.region)
            .finish()
    }
}

/// IAM and Redshift clients sharing one credentials provider
#[derive(Clone)]
pub struct AwsInfrastructure {
    iam: aws_sdk_iam::Client,
    redshift: aws_sdk_redshift::Client,
}

impl AwsInfrastructure {
    pub async fn new(settings: &AwsSettings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            "dwh-config",
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        info!(region = %settings.region, "AWS clients initialized");

        Self {
            iam: aws_sdk_iam::Client::new(&shared),
            redshift: aws_sdk_redshift::Client::new(&shared),
        }
    }
}

fn failure<E>(operation: &'static str, err: E) -> InfraError
where
    E: std::error::Error,
{
    InfraError::new(operation, DisplayErrorContext(err).to_string())
}

fn describe(cluster: &Cluster) -> ClusterDescription {
    let endpoint = cluster.endpoint();
    ClusterDescription {
        identifier: cluster.cluster_identifier().unwrap_or_default().to_string(),
        status: cluster.cluster_status().unwrap_or_default().to_string(),
        endpoint: endpoint.and_then(|e| e.address()).map(str::to_string),
        port: endpoint
            .and_then(|e| e.port())
            .and_then(|p| u16::try_from(p).ok()),
        role_arns: cluster
            .iam_roles()
            .iter()
            .filter_map(|role| role.iam_role_arn())
            .map(str::to_string)
            .collect(),
    }
}

#[async_trait]
impl Infrastructure for AwsInfrastructure {
    #[instrument(skip(self, trust_policy))]
    async fn create_role(
        &self,
        name: &str,
        description: &str,
        trust_policy: &str,
    ) -> std::result::Result<Creation, InfraError> {
        let result = self
            .iam
            .create_role()
            .path("/")
            .role_name(name)
            .description(description)
            .assume_role_policy_document(trust_policy)
            .send()
            .await;

        match result {
            Ok(_) => Ok(Creation::Created),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_entity_already_exists_exception() {
                    Ok(Creation::AlreadyExists)
                } else {
                    Err(failure("create-role", err))
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn attach_policy(&self, role: &str, policy_arn: &str) -> std::result::Result<(), InfraError> {
        self.iam
            .attach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|err| failure("attach-policy", err.into_service_error()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn role_arn(&self, role: &str) -> std::result::Result<String, InfraError> {
        let output = self
            .iam
            .get_role()
            .role_name(role)
            .send()
            .await
            .map_err(|err| failure("get-role", err.into_service_error()))?;

        output
            .role()
            .map(|r| r.arn().to_string())
            .ok_or_else(|| InfraError::new("get-role", format!("role '{}' has no ARN", role)))
    }

    #[instrument(skip(self, spec), fields(cluster = %spec.identifier))]
    async fn create_cluster(
        &self,
        spec: &ClusterSpec,
        role_arn: &str,
    ) -> std::result::Result<Creation, InfraError> {
        let mut request = self
            .redshift
            .create_cluster()
            .cluster_identifier(&spec.identifier)
            .cluster_type(&spec.cluster_type)
            .node_type(&spec.node_type)
            .db_name(&spec.db_name)
            .master_username(&spec.master_user)
            .master_user_password(&spec.master_password)
            .iam_roles(role_arn);

        if spec.is_multi_node() {
            request = request.number_of_nodes(i32::try_from(spec.num_nodes).unwrap_or(i32::MAX));
        }
        if let Some(port) = spec.port {
            request = request.port(i32::from(port));
        }

        match request.send().await {
            Ok(_) => Ok(Creation::Created),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_cluster_already_exists_fault() {
                    Ok(Creation::AlreadyExists)
                } else {
                    Err(failure("create-cluster", err))
                }
            }
        }
    }

    async fn describe_cluster(
        &self,
        identifier: &str,
    ) -> std::result::Result<Option<ClusterDescription>, InfraError> {
        let result = self
            .redshift
            .describe_clusters()
            .cluster_identifier(identifier)
            .send()
            .await;

        match result {
            Ok(output) => {
                let description = output.clusters().first().map(describe);
                debug!(
                    cluster = identifier,
                    status = description.as_ref().map(|d| d.status.as_str()),
                    "Cluster described"
                );
                Ok(description)
            }
            Err(err) => {
                let err = err.into_service_error();
                if err.is_cluster_not_found_fault() {
                    Ok(None)
                } else {
                    Err(failure("describe-cluster", err))
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete_cluster(&self, identifier: &str) -> std::result::Result<(), InfraError> {
        self.redshift
            .delete_cluster()
            .cluster_identifier(identifier)
            .skip_final_cluster_snapshot(true)
            .send()
            .await
            .map_err(|err| failure("delete-cluster", err.into_service_error()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn detach_policy(&self, role: &str, policy_arn: &str) -> std::result::Result<(), InfraError> {
        match self
            .iam
            .detach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_no_such_entity_exception() {
                    debug!(role, policy_arn, "Policy was not attached");
                    Ok(())
                } else {
                    Err(failure("detach-policy", err))
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete_role(&self, role: &str) -> std::result::Result<Deletion, InfraError> {
        match self.iam.delete_role().role_name(role).send().await {
            Ok(_) => Ok(Deletion::Deleted),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_no_such_entity_exception() {
                    Ok(Deletion::NotFound)
                } else {
                    Err(failure("delete-role", err))
                }
            }
        }
    }
}
