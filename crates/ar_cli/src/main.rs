use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};

use ar_core::Result;
use ar_inference::ReferencePolicy;
use ar_scrappers::cli::{handle_command, run_once, Context, ToolCommands};
use ar_scrappers::discovery::{ChromiumBrowser, DiscoveryConfig};
use ar_scrappers::extractor::ExtractorConfig;
use ar_scrappers::lease::SeedLease;
use ar_scrappers::logging::init_logging;
use ar_scrappers::pipeline::PipelineConfig;

#[derive(Debug, Clone, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let unit = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds = num
                    .checked_mul(unit)
                    .and_then(|secs| total_seconds.checked_add(secs))
                    .ok_or_else(|| "Duration is too large".to_string())?;
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // A trailing bare number counts as seconds
        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds = total_seconds
                .checked_add(num)
                .ok_or_else(|| "Duration is too large".to_string())?;
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }
        if total_seconds == 0 {
            return Err("Duration must be greater than zero".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Refreshes articles with researched references", long_about = None)]
pub struct Cli {
    /// Article store: http, memory or sqlite
    #[arg(long, env = "AR_STORE", default_value = "http")]
    store: String,
    /// Article API base URL (http) or database file (sqlite)
    #[arg(long, env = "AR_API_URL")]
    api_url: Option<String>,
    #[arg(long, env = "AR_MODEL", default_value = "gemini", help = "Model to use for rewriting. Available models: gemini (default), deepseek, dummy")]
    model: String,
    /// Falls back to GEMINI_API_KEY or DEEPSEEK_API_KEY depending on the model
    #[arg(long, env = "AR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "AR_MODEL_NAME")]
    model_name: Option<String>,
    #[arg(long, env = "AR_MODEL_URL")]
    model_url: Option<String>,
    /// Which references end up cited: input-set or trust-model
    #[arg(long, env = "AR_REFERENCE_POLICY", default_value = "input-set")]
    reference_policy: ReferencePolicy,
    /// Show the search browser window
    #[arg(long)]
    headed: bool,
    /// Delay between reference fetches, in milliseconds
    #[arg(long, env = "AR_PACING_MS", default_value_t = 2000)]
    pacing_ms: u64,
    #[arg(long, env = "AR_LEASE_DIR")]
    lease_dir: Option<PathBuf>,
    /// Skip the per-seed lease
    #[arg(long)]
    no_lease: bool,
    #[arg(long, env = "AR_LOG_LEVEL", default_value = "info")]
    log_level: Level,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Refresh the latest unprocessed article
    Run {
        /// Run in periodic mode with the specified interval (e.g. 1h, 30m, 1d, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    #[command(flatten)]
    Tools(ToolCommands),
}

fn api_key_for(model: &str, explicit: Option<String>) -> Option<String> {
    explicit.or_else(|| {
        let var = match model.to_lowercase().as_str() {
            "gemini" => "GEMINI_API_KEY",
            "deepseek" => "DEEPSEEK_API_KEY",
            _ => return None,
        };
        std::env::var(var).ok().filter(|k| !k.trim().is_empty())
    })
}

async fn build_context(cli: &Cli) -> Result<Context> {
    let store = ar_storage::create_store(&cli.store, cli.api_url.as_deref()).await?;
    info!("💾 Article store initialized (using {})", cli.store);

    let model = ar_inference::Config {
        backend: cli.model.clone(),
        api_key: api_key_for(&cli.model, cli.api_key.clone()),
        model_name: cli.model_name.clone(),
        base_url: cli.model_url.clone(),
        ..ar_inference::Config::default()
    };

    let lease_dir = if cli.no_lease {
        None
    } else {
        Some(cli.lease_dir.clone().unwrap_or_else(SeedLease::default_dir))
    };

    Ok(Context {
        store,
        model,
        reference_policy: cli.reference_policy,
        browser: ChromiumBrowser::new(!cli.headed),
        discovery: DiscoveryConfig::default(),
        extractor: ExtractorConfig::default(),
        pipeline: PipelineConfig {
            pacing: Duration::from_millis(cli.pacing_ms),
            lease_dir,
        },
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let ctx = build_context(&cli).await?;

    match cli.command {
        Commands::Run { interval } => {
            let pipeline = ctx.build_pipeline()?;
            if let Some(interval) = interval {
                info!("Running in periodic mode with {}s interval", interval.0.as_secs());
                let periodic = async {
                    loop {
                        info!("Starting refresh cycle");
                        if let Err(e) = run_once(&pipeline).await {
                            error!("Error during refresh: {}", e);
                        }
                        info!("Waiting {}s before next refresh", interval.0.as_secs());
                        tokio::time::sleep(interval.0).await;
                    }
                };
                tokio::select! {
                    _ = periodic => {}
                    _ = tokio::signal::ctrl_c() => warn!("Shutdown signal received, stopping"),
                }
            } else {
                tokio::select! {
                    res = run_once(&pipeline) => {
                        res?;
                    }
                    _ = tokio::signal::ctrl_c() => warn!("Shutdown signal received, abandoning run"),
                }
            }
        }
        Commands::Tools(command) => handle_command(command, &ctx).await?,
    }

    Ok(())
}
