//! stubmatch CLI - Resolve requests against API stubs and explain mismatches

mod logging;
mod request_file;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::info;

use stubmatch_core::store::read_stub_file;
use stubmatch_core::{EngineConfig, JsonlAuditLog, StubStore, ValidationOutcome};
use stubmatch_engine::StubResolver;

use logging::{LogFormat, init_logging};
use request_file::RequestFile;

#[derive(Parser)]
#[command(name = "stubmatch")]
#[command(about = "Resolve requests against API stubs and explain mismatches")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Log format on stderr
    #[arg(long, global = true, default_value = "human")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one recorded request against the configured stubs
    Check {
        /// Request file (TOML or JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Config file (default: .stubmatch.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stub file, overriding the config
        #[arg(short, long)]
        stubs: Option<PathBuf>,
    },

    /// Validate stub files without resolving anything
    Lint {
        /// Stub files (default: the configured stub file)
        files: Vec<PathBuf>,

        /// Config file (default: .stubmatch.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for stub files
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_default()?,
    };
    Ok(config)
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Check {
            request,
            config,
            stubs,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(stubs) = stubs {
                cfg.stubs = stubs;
            }
            info!(
                stubs = %cfg.stubs.display(),
                mount_prefix = %cfg.mount_prefix,
                "configuration loaded"
            );

            let store = StubStore::load(&cfg.stubs)
                .with_context(|| format!("Cannot load stubs from {}", cfg.stubs.display()))?;
            let request = RequestFile::load(&request)?.to_request();

            let mut resolver = StubResolver::new(cfg.clone(), Arc::new(store));
            if let Some(path) = &cfg.audit_log {
                let audit = JsonlAuditLog::open(path, cfg.mask_sensitive_headers)
                    .with_context(|| format!("Cannot open audit log {}", path.display()))?;
                resolver = resolver.with_audit(Arc::new(audit));
            }

            let outcome = resolver.resolve(&request);
            print_outcome(cli.output, &outcome)?;

            Ok(if outcome.is_matched() { 0 } else { 1 })
        }

        Commands::Lint { files, config } => {
            let files = if files.is_empty() {
                vec![load_config(config.as_deref())?.stubs]
            } else {
                files
            };

            let mut problems = Vec::new();
            let mut checked = 0usize;
            for file in &files {
                let stubs = read_stub_file(file)?;
                for stub in &stubs {
                    checked += 1;
                    if let Err(e) = stub.validate_payloads() {
                        problems.push(format!("{}: {}: {e}", file.display(), stub.label()));
                    }
                }
            }

            match cli.output {
                OutputFormat::Terminal => {
                    for problem in &problems {
                        println!("  INVALID {problem}");
                    }
                    let icon = if problems.is_empty() { "OK" } else { "FAIL" };
                    println!(
                        "{icon}: {checked} stubs checked, {} invalid",
                        problems.len()
                    );
                }
                OutputFormat::Json => {
                    let json_output = serde_json::json!({
                        "checked": checked,
                        "invalid": problems,
                    });
                    println!("{}", serde_json::to_string_pretty(&json_output)?);
                }
                OutputFormat::Silent => {}
            }

            Ok(if problems.is_empty() { 0 } else { 1 })
        }

        Commands::Init => {
            let config_path = ".stubmatch.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, EngineConfig::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - mount_prefix: path segment in front of stub paths");
            println!("  - stubs: YAML or JSON stub definitions");
            println!("  - ws_security: credentials for SOAP requests");
            Ok(0)
        }

        Commands::Schema => {
            let schema = stubmatch_core::schema::generate_schema();
            println!("{schema}");
            Ok(0)
        }
    }
}

fn print_outcome(output: OutputFormat, outcome: &ValidationOutcome) -> Result<()> {
    match output {
        OutputFormat::Terminal => {
            match outcome {
                ValidationOutcome::Matched(m) => {
                    println!("MATCHED: {}", m.stub.label());
                }
                ValidationOutcome::Unmatched(r) => {
                    println!("UNMATCHED: {}", r.reason());
                }
            }
            println!("  Status: {}", outcome.status());
            println!("  Content-Type: {}", outcome.content_type());
            println!();
            println!("{}", outcome.body());
        }
        OutputFormat::Json => {
            let rejection = outcome.rejection();
            let stub = match outcome {
                ValidationOutcome::Matched(m) => Some(&m.stub),
                ValidationOutcome::Unmatched(r) => r.stub.as_ref(),
            };
            let json_output = serde_json::json!({
                "matched": outcome.is_matched(),
                "status": outcome.status(),
                "content_type": outcome.content_type().mime(),
                "kind": rejection.map(|r| r.kind.as_str()),
                "reason": rejection.map(|r| r.reason()),
                "message": rejection.map(|r| r.message.as_str()),
                "stub": stub.map(|s| s.label()),
                "body": outcome.body(),
            });
            println!("{}", serde_json::to_string_pretty(&json_output)?);
        }
        OutputFormat::Silent => {}
    }
    Ok(())
}
