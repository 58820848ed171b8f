//! Per-invocation state shared by the commands

use crate::error::Result;
use crate::Cli;
use dwh_common::DwhConfig;
use dwh_etl::confirm::{AlwaysNo, AlwaysYes, ConfirmationPolicy, InteractivePrompt};
use dwh_etl::orchestrator::FailureMode;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How confirmations are answered for this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answering {
    Prompt,
    Yes,
    No,
}

impl Answering {
    pub fn from_flags(yes: bool, no_input: bool) -> Self {
        match (yes, no_input) {
            (true, _) => Answering::Yes,
            (false, true) => Answering::No,
            (false, false) => Answering::Prompt,
        }
    }

    fn policy(self) -> Box<dyn ConfirmationPolicy> {
        match self {
            Answering::Prompt => Box::new(InteractivePrompt::stdio()),
            Answering::Yes => Box::new(AlwaysYes),
            Answering::No => Box::new(AlwaysNo),
        }
    }
}

pub struct Session {
    pub config_path: PathBuf,
    pub config: DwhConfig,
    pub mode: FailureMode,
    pub report: Option<PathBuf>,
    pub cancel: CancellationToken,
    confirm: Box<dyn ConfirmationPolicy>,
}

impl Session {
    /// Load the configuration named on the command line.
    pub fn open(cli: &Cli, cancel: CancellationToken) -> Result<Self> {
        let config = DwhConfig::load(&cli.config)?;
        let answering = Answering::from_flags(cli.yes, cli.no_input);
        debug!(config = %cli.config.display(), ?answering, mode = %cli.mode, "Session opened");

        Ok(Self {
            config_path: cli.config.clone(),
            config,
            mode: cli.mode,
            report: cli.report.clone(),
            cancel,
            confirm: answering.policy(),
        })
    }

    pub fn confirm(&self) -> &dyn ConfirmationPolicy {
        self.confirm.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answering_from_flags() {
        assert_eq!(Answering::from_flags(false, false), Answering::Prompt);
        assert_eq!(Answering::from_flags(true, false), Answering::Yes);
        assert_eq!(Answering::from_flags(false, true), Answering::No);
    }
}
