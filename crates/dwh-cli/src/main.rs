//! DWH CLI - Main entry point

use clap::Parser;
use dwh_cli::commands;
use dwh_cli::{Cli, CliError, Commands, Session};
use dwh_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// 128 + SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let Some(command) = cli.command.as_ref() else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    // Verbose: debug to the console. Otherwise only warnings, so narration stays readable.
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("dwh")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn,sqlx=warn")
        .build();
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);
    let _guard = init_logging(&log_config).ok();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    // First Ctrl-C stops after the current statement or wait, the second exits
    // at once (e.g. out of a pending [y/n] prompt).
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, cancelling");
        eprintln!("Interrupt received, stopping after the current step. Press Ctrl-C again to exit now.");
        on_interrupt.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Exiting.");
            process::exit(EXIT_INTERRUPTED);
        }
    });

    if let Err(e) = execute_command(&cli, command, cancel).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        let code = match e {
            CliError::Interrupted(_) => EXIT_INTERRUPTED,
            _ => 1,
        };
        process::exit(code);
    }
}

async fn execute_command(
    cli: &Cli,
    command: &Commands,
    cancel: CancellationToken,
) -> dwh_cli::Result<()> {
    let session = Session::open(cli, cancel)?;

    match command {
        Commands::Provision {
            skip_tables,
            timeout,
        } => commands::provision::run(&session, *skip_tables, *timeout, cli.verbose).await,

        Commands::CreateTables => commands::create_tables::run(&session, cli.verbose).await,

        Commands::Etl {
            truncate,
            keep_staging,
        } => commands::etl::run(&session, *truncate, *keep_staging, cli.verbose).await,

        Commands::Analytics => commands::analytics::run(&session, cli.verbose).await,

        Commands::Teardown { timeout } => commands::teardown::run(&session, *timeout).await,

        Commands::Statements { phase } => commands::statements::run(&session.config, *phase),
    }
}
