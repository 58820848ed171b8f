//! `dwh teardown` command implementation
//!
//! Deletes the cluster and then the IAM role, asking before each.

use crate::error::{CliError, Result};
use crate::report::RunReport;
use crate::session::Session;
use colored::{ColoredString, Colorize};
use dwh_etl::infra::{AwsInfrastructure, AwsSettings};
use dwh_etl::provision::{teardown, PollPolicy, TeardownOutcome, TeardownSpec};
use std::time::Duration;

fn outcome(outcome: TeardownOutcome) -> ColoredString {
    match outcome {
        TeardownOutcome::Deleted => "deleted".green(),
        TeardownOutcome::Declined => "kept (declined)".yellow(),
        TeardownOutcome::NotFound => "not found".normal(),
        TeardownOutcome::NotAsked => "kept".normal(),
    }
}

pub async fn run(session: &Session, timeout_secs: u64) -> Result<()> {
    let aws = AwsSettings::from_config(&session.config)?;
    let spec = TeardownSpec::from_config(&session.config)?;
    let poll = PollPolicy::default().with_timeout(Duration::from_secs(timeout_secs));

    println!("{}", "Teardown".cyan().bold());
    println!("  Cluster: {}", spec.cluster_identifier);
    println!("  Role:    {}", spec.role_name);
    println!("Deleting a cluster takes several minutes; press Ctrl-C to stop waiting.");
    println!();

    let infra = AwsInfrastructure::new(&aws).await;
    let result = teardown(&infra, &spec, session.confirm(), &poll, &session.cancel).await;
    let report = result.map_err(CliError::from_etl)?;

    println!();
    println!("Cluster: {}", outcome(report.cluster));
    println!("Role:    {}", outcome(report.role));

    RunReport::new("teardown")
        .with_teardown(&report)
        .write_to(session.report.as_deref())
}
