//! Breakwater CLI

mod simulate;

use anyhow::{Context, Result};
use breakwater_breaker::BreakerConfig;
use breakwater_config::{load_config, Config, LogFormat};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Parser)]
#[command(name = "breakwater")]
#[command(about = "Breakwater circuit breaker toolkit", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted sequence of call outcomes against a breaker
    Simulate {
        /// Comma separated steps: ok, fail, check, wait:<duration>
        #[arg(short, long, default_value = simulate::DEFAULT_SCRIPT)]
        steps: String,

        /// Configuration file providing the breaker settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Breaker name (selects per-breaker overrides from the config file)
        #[arg(short, long, default_value = "simulated")]
        breaker: String,

        /// Reset timeout, e.g. 5s or 1500ms
        #[arg(short, long, value_parser = humantime::parse_duration)]
        reset_timeout: Option<Duration>,

        /// Trip policy: single, consecutive:<n> or rate:<ratio>:<min>
        #[arg(short, long, value_parser = simulate::parse_policy)]
        policy: Option<breakwater_breaker::TripPolicy>,

        /// Log every breaker event
        #[arg(short, long)]
        verbose: bool,

        /// Print the final metrics as JSON
        #[arg(long)]
        json: bool,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, env = "BREAKWATER_LOG", default_value = "info")]
        log_level: String,

        /// Log output format
        #[arg(long, value_enum, default_value_t = LogFormatArg::Text)]
        log_format: LogFormatArg,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "breakwater.yaml")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            steps,
            config,
            breaker,
            reset_timeout,
            policy,
            verbose,
            json,
            log_level,
            log_format,
        } => {
            let file_config = config
                .as_ref()
                .map(|path| {
                    load_config(path)
                        .with_context(|| format!("failed to load {}", path.display()))
                })
                .transpose()?;

            match &file_config {
                Some(cfg) => {
                    let logging = cfg.logging();
                    init_tracing(&logging.level, logging.format)?;
                }
                None => init_tracing(&log_level, log_format.into())?,
            }

            let mut breaker_config = file_config
                .as_ref()
                .map(|cfg| cfg.breaker_config(&breaker))
                .unwrap_or_default();
            if let Some(timeout) = reset_timeout {
                breaker_config = breaker_config.with_reset_timeout(timeout);
            }
            if let Some(policy) = policy {
                breaker_config = breaker_config.with_policy(policy);
            }

            let steps = simulate::parse_script(&steps)?;
            tracing::info!(
                breaker = %breaker,
                reset_timeout = ?breaker_config.reset_timeout,
                policy = ?breaker_config.policy,
                steps = steps.len(),
                "Starting simulation"
            );

            let report = simulate::run(&breaker, breaker_config, &steps, verbose).await?;

            for (index, (step, outcome, state)) in report.rows.iter().enumerate() {
                println!("{:>3}  {:<12} {:<40} [{}]", index + 1, step, outcome, state);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report.metrics)?);
            } else {
                let m = &report.metrics;
                println!(
                    "final state: {}  permitted: {}  rejected: {}  successes: {}  failures: {}  transitions: {}",
                    m.state, m.permitted, m.rejected, m.successes, m.failures, m.transitions
                );
            }
            Ok(())
        }

        Commands::Validate { config } => {
            tracing_subscriber::fmt().with_target(false).init();

            tracing::info!("Validating configuration: {}", config.display());

            match load_config(&config) {
                Ok(cfg) => {
                    tracing::info!("✓ Configuration is valid");
                    describe(&cfg);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("✗ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("Breakwater");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

fn describe(config: &Config) {
    let defaults = config.defaults.resolve();
    tracing::info!("  Defaults: {}", summary(&defaults));
    tracing::info!("  Breakers: {}", config.breakers.len());
    for name in config.breakers.keys() {
        tracing::info!("    {}: {}", name, summary(&config.breaker_config(name)));
    }
    let logging = config.logging();
    tracing::info!("  Logging: {} ({:?})", logging.level, logging.format);
}

fn summary(config: &BreakerConfig) -> String {
    format!(
        "reset_timeout={}, policy={:?}",
        humantime::format_duration(config.reset_timeout),
        config.policy
    )
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let fmt_layer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_level(true)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(filter.into()))
        .init();

    Ok(())
}
