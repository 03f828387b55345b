//! # CONFORMA CLI
//!
//! Command-line tool for schema authoring and validation.
//!
//! ## Main Workflow
//!
//! ```bash
//! # Check a schema file and print its normalized form
//! conforma check --schema user.schema.json
//!
//! # Validate an input file against a schema
//! conforma validate --schema user.schema.json --input user.json
//!
//! # Partial update with collected diagnostics
//! conforma validate --schema user.schema.json --input patch.json \
//!     --delta --accumulate --role admin
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use conforma::{process, Options, Roles, Schema};

/// CONFORMA - schema definition and validation
#[derive(Parser)]
#[command(name = "conforma")]
#[command(version)]
#[command(about = "Compiles schemas and validates structured data against them")]
#[command(long_about = r#"
CONFORMA validates structured data against declarative schemas.

Workflow:
  1. Author a schema          → user.schema.json
  2. Check it compiles        → conforma check --schema user.schema.json
  3. Validate incoming data   → conforma validate --schema ... --input ...

Example:
  conforma validate --schema user.schema.json --input user.json --accumulate
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Checks a schema file and prints its normalized form
    Check {
        /// Path to the schema descriptor file
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Validates a JSON input file against a schema
    Validate {
        /// Path to the schema descriptor file
        #[arg(short, long)]
        schema: PathBuf,

        /// Path to the JSON input file
        #[arg(short, long)]
        input: PathBuf,

        /// Admit missing fields (partial update)
        #[arg(long)]
        delta: bool,

        /// Collect all issues instead of stopping at the first
        #[arg(long)]
        accumulate: bool,

        /// Drop unknown fields at the root
        #[arg(long)]
        extract_top: bool,

        /// Drop unknown fields in nested objects
        #[arg(long)]
        extract_nested: bool,

        /// Role held by the caller; repeat for several. Enables access
        /// checks.
        #[arg(long = "role")]
        roles: Vec<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Check { schema } => {
            let compiled = Schema::from_file(&schema)
                .with_context(|| format!("loading schema {}", schema.display()))?;
            println!("{compiled}");
            println!("fingerprint: {} bytes", compiled.fingerprint().len());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate {
            schema,
            input,
            delta,
            accumulate,
            extract_top,
            extract_nested,
            roles,
        } => {
            let compiled = Schema::from_file(&schema)
                .with_context(|| format!("loading schema {}", schema.display()))?;
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("reading input {}", input.display()))?;
            let value: serde_json::Value =
                serde_json::from_str(&raw).context("parsing input JSON")?;

            let mut options = Options::NONE;
            if delta {
                options |= Options::DELTA_MODE;
            }
            if accumulate {
                options |= Options::ACCUMULATE_ERRORS;
            }
            if extract_top {
                options |= Options::EXTRACT_TOP;
            }
            if extract_nested {
                options |= Options::EXTRACT_NESTED;
            }
            let access: Option<Roles> = if roles.is_empty() {
                None
            } else {
                Some(roles.into_iter().collect())
            };

            match process(&value, &compiled, options, access.as_ref()) {
                Ok(output) => {
                    println!("{}", serde_json::to_string_pretty(&output)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(error) => {
                    eprintln!("validation failed with {} issue(s):", error.issues.len());
                    for issue in &error.issues {
                        let path = if issue.path.is_empty() {
                            "(root)"
                        } else {
                            issue.path.as_str()
                        };
                        eprintln!("  {} at {}", issue.code, path);
                    }
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
