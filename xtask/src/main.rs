//! Build automation tasks for the DWH workspace
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for the DWH workspace", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<dwh_cli::Cli>();

    let content = format!(
        r#"# DWH CLI Reference

Generated from the CLI source code. Last updated: {}.

## Quick Start

```bash
cp dwh.cfg.example dwh.cfg        # fill in [AWS], [CLUSTER], [IAM_ROLE] and [S3]
dwh provision                     # role + cluster, writes HOST and ARN back, creates tables
dwh etl                           # copy, insert, clean, deduplicate, drop staging
dwh analytics                     # songplays per artist
dwh teardown                      # delete cluster and role, asking before each
```

Destructive steps ask for confirmation on the terminal. Use `--yes` or
`--no-input` to answer every question up front.

## Commands

{}

## Environment Variables

- `DWH_CONFIG` - Configuration file (default: `dwh.cfg`)
- `DWH_<SECTION>__<KEY>` - Override one configuration value, e.g. `DWH_CLUSTER__HOST`
- `DWH_LOG_LEVEL`, `DWH_LOG_OUTPUT`, `DWH_LOG_FORMAT`, `DWH_LOG_DIR`, `DWH_LOG_FILTER` - Logging
- `RUST_LOG` - Additional tracing filter directives

---

*To update, run `cargo run --manifest-path xtask/Cargo.toml -- generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());
    Ok(())
}
