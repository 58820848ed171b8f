//! `dwh provision` command implementation
//!
//! Creates the IAM role and the Redshift cluster, writes the endpoint and
//! role ARN back to the config file and creates the tables.

use super::{create_tables, ensure_succeeded, run_pipeline};
use crate::error::{CliError, Result};
use crate::progress::create_spinner;
use crate::report::RunReport;
use crate::session::Session;
use colored::Colorize;
use dwh_common::config::persist_provisioned_endpoint;
use dwh_etl::infra::{AwsInfrastructure, AwsSettings, Creation};
use dwh_etl::provision::{provision, PollPolicy, ProvisioningSpec};
use std::time::Duration;

fn created(creation: Creation) -> &'static str {
    match creation {
        Creation::Created => "created",
        Creation::AlreadyExists => "already existed, reused",
    }
}

pub async fn run(session: &Session, skip_tables: bool, timeout_secs: u64, verbose: bool) -> Result<()> {
    let aws = AwsSettings::from_config(&session.config)?;
    let spec = ProvisioningSpec::from_config(&session.config)?;
    let poll = PollPolicy::default().with_timeout(Duration::from_secs(timeout_secs));

    println!("{}", "Provisioning".cyan().bold());
    println!("  Role:    {}", spec.role.name);
    println!(
        "  Cluster: {} ({} x {}, {})",
        spec.cluster.identifier, spec.cluster.num_nodes, spec.cluster.node_type, aws.region
    );
    println!();

    let infra = AwsInfrastructure::new(&aws).await;
    let spinner = create_spinner(&format!(
        "Waiting for cluster '{}' to become available...",
        spec.cluster.identifier
    ));
    let provisioned = provision(&infra, &spec, &poll, &session.cancel).await;
    spinner.finish_and_clear();
    let provisioned = provisioned.map_err(CliError::from_etl)?;

    println!("{} IAM role {}", "✓".green(), created(provisioned.role));
    println!("{} Cluster {}", "✓".green(), created(provisioned.cluster));
    println!("  Endpoint: {}", provisioned.endpoint);
    println!("  Role ARN: {}", provisioned.role_arn);

    persist_provisioned_endpoint(&session.config_path, &provisioned.endpoint, &provisioned.role_arn)?;
    println!(
        "{} Wrote HOST and ARN to {}",
        "✓".green(),
        session.config_path.display()
    );
    let config = session
        .config
        .with_provisioned_endpoint(&provisioned.endpoint, &provisioned.role_arn);

    if skip_tables {
        return RunReport::new("provision")
            .with_provisioned(&provisioned)
            .write_to(session.report.as_deref());
    }

    let report = run_pipeline(session, &config, &create_tables::STAGES, verbose).await?;
    RunReport::new("provision")
        .with_provisioned(&provisioned)
        .with_pipeline(&report)
        .write_to(session.report.as_deref())?;
    ensure_succeeded(&report)
}
