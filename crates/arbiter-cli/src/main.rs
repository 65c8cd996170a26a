//! Arbiter CLI
//!
//! Reads a submission request as JSON, judges it in an isolate sandbox, and
//! prints the verdict as JSON on stdout. Logging goes to stderr so the
//! verdict stays pipeable.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use arbiter::{Config, EXAMPLE_CONFIG, Judge, JudgeError, Submission, prepare_cgroup};
use clap::{Parser, Subcommand};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arbiter")]
#[command(about = "A sandboxed code judge")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge a submission request
    Judge {
        /// Request JSON file ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        request: PathBuf,

        /// Pretty-print the verdict
        #[arg(short, long)]
        pretty: bool,

        /// Fail fast instead of queueing when the judge is at capacity
        #[arg(long)]
        no_queue: bool,
    },

    /// List configured languages
    Languages,

    /// Write a starter configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "arbiter.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    if config.cgroup {
        match prepare_cgroup(&config.cg_root) {
            Ok(true) => debug!("cgroup hierarchy ready"),
            Ok(false) => {
                warn!("cgroup memory controller unavailable, falling back to RLIMIT_AS");
                config.cgroup = false;
            }
            Err(e) => {
                warn!("cgroup setup failed: {e}, falling back to RLIMIT_AS");
                config.cgroup = false;
            }
        }
    }

    match cli.command {
        Commands::Judge {
            request,
            pretty,
            no_queue,
        } => run_judge(config, &request, pretty, no_queue).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn run_judge(config: Config, request: &PathBuf, pretty: bool, no_queue: bool) -> Result<()> {
    let raw = if request.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read request from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(request)
            .await
            .with_context(|| format!("failed to read request file '{}'", request.display()))?
    };

    let submission: Submission =
        serde_json::from_str(&raw).context("request is not a valid submission")?;

    info!(
        language = %submission.language,
        test_cases = submission.test_cases.len(),
        "judging submission"
    );

    let judge = Judge::new(config);
    let verdict = if no_queue {
        judge.try_judge(&submission).await
    } else {
        judge.judge(&submission).await
    };

    match verdict {
        Ok(verdict) => {
            let json = if pretty {
                serde_json::to_string_pretty(&verdict)?
            } else {
                serde_json::to_string(&verdict)?
            };
            println!("{json}");
            Ok(())
        }
        Err(e) => {
            // Infrastructure faults are the judge's fault and logged loudly;
            // the rest are caller errors reported plainly.
            if e.is_infrastructure() {
                error!(error = %e, "judge-side failure");
            }
            match e {
                JudgeError::Overloaded => {
                    eprintln!("judge at capacity, retry later");
                    std::process::exit(2);
                }
                other => Err(other.into()),
            }
        }
    }
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");
    let mut languages: Vec<_> = config.languages.iter().collect();
    languages.sort_by_key(|(key, _)| *key);
    for (key, lang) in languages {
        let kind = if lang.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        println!("  {:<15} {} ({})", key, lang.name, kind);
    }
}

fn show_config(config: &Config) {
    println!("Default resource limits:");
    println!("  Time limit: {:?} s", config.default_limits.time_limit);
    println!(
        "  Wall time limit: {:?} s",
        config.default_limits.wall_time_limit
    );
    println!("  Memory limit: {:?} KB", config.default_limits.memory_limit);
    println!("  Max processes: {:?}", config.default_limits.max_processes);
    println!();
    println!("Judge:");
    println!("  Max concurrent submissions: {}", config.judge.max_sandboxes);
    println!("  Box start ID: {}", config.judge.box_start_id);
    println!("  Run all tests: {}", config.judge.run_all_tests);
    println!();
    println!("Isolate binary: {}", config.isolate_binary().display());
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "configuration file already exists at '{}'; use --force to overwrite",
            output.display()
        );
    }
    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;
    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
