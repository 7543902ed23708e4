//! Campaign Reconcile: pulls campaign analytics from the ESP and prints the
//! reconciled records as JSON.

use campaign_core::config::AppConfig;
use campaign_core::types::{AnalyticsQuery, FetchOptions};
use campaign_integrations::EspAnalyticsService;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-reconcile")]
#[command(about = "Reconciled campaign analytics from an undocumented ESP API")]
#[command(version)]
struct Cli {
    /// ESP API base URL (overrides config)
    #[arg(long, env = "CAMPAIGN_RECONCILE__ESP__BASE_URL")]
    base_url: Option<String>,

    /// Value of the `Version` request header (overrides config)
    #[arg(long, env = "CAMPAIGN_RECONCILE__ESP__API_VERSION")]
    api_version: Option<String>,

    /// Per-request timeout in milliseconds (overrides config)
    #[arg(long, env = "CAMPAIGN_RECONCILE__ESP__TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Page cap for list resources (overrides config)
    #[arg(long, env = "CAMPAIGN_RECONCILE__ESP__MAX_PAGES")]
    max_pages: Option<usize>,

    /// Concurrent per-contact lookups (overrides config)
    #[arg(long, env = "CAMPAIGN_RECONCILE__FANOUT__MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Pretty-print JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Location {
    /// OAuth access token for the location
    #[arg(long, env = "CAMPAIGN_RECONCILE_TOKEN", hide_env_values = true)]
    token: String,

    /// ESP location (sub-account) id
    #[arg(long)]
    location: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List campaigns with their analytics
    Campaigns {
        #[command(flatten)]
        location: Location,
        #[arg(long, default_value_t = false)]
        force_refresh: bool,
    },
    /// Analytics for a single campaign
    Analytics {
        #[command(flatten)]
        location: Location,
        #[arg(long)]
        schedule_id: Option<String>,
        #[arg(long)]
        campaign_id: Option<String>,
        #[arg(long)]
        record_id: Option<String>,
    },
    /// List workflows
    Workflows {
        #[command(flatten)]
        location: Location,
        #[arg(long, default_value_t = false)]
        force_refresh: bool,
    },
    /// Contact lookups, fanned out with bounded concurrency
    Contacts {
        #[command(flatten)]
        location: Location,
        #[arg(required = true)]
        contact_ids: Vec<String>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContactOutcome {
    contact_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_reconcile=info,campaign_integrations=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(base_url) = cli.base_url {
        config.esp.base_url = base_url;
    }
    if let Some(version) = cli.api_version {
        config.esp.api_version = version;
    }
    if let Some(timeout) = cli.timeout_ms {
        config.esp.timeout_ms = timeout;
    }
    if let Some(max_pages) = cli.max_pages {
        config.esp.max_pages = max_pages;
    }
    if let Some(limit) = cli.max_concurrent {
        config.fanout.max_concurrent = limit;
    }

    info!(
        base_url = %config.esp.base_url,
        api_version = %config.esp.api_version,
        max_pages = config.esp.max_pages,
        cache_ttl_secs = config.cache.ttl_secs,
        "Configuration loaded"
    );

    let service = EspAnalyticsService::new(config)?;

    match cli.command {
        Command::Campaigns {
            location,
            force_refresh,
        } => {
            let campaigns = service
                .fetch_campaigns(&location.token, &location.location, FetchOptions { force_refresh })
                .await?;
            print_json(&campaigns, cli.pretty)?;
        }
        Command::Analytics {
            location,
            schedule_id,
            campaign_id,
            record_id,
        } => {
            let query = AnalyticsQuery {
                schedule_id,
                campaign_id,
                record_id,
            };
            let analytics = service
                .fetch_campaign_analytics(&location.token, &location.location, &query)
                .await?;
            print_json(&analytics, cli.pretty)?;
        }
        Command::Workflows {
            location,
            force_refresh,
        } => {
            let workflows = service
                .fetch_workflows(&location.token, &location.location, FetchOptions { force_refresh })
                .await?;
            print_json(&workflows, cli.pretty)?;
        }
        Command::Contacts {
            location,
            contact_ids,
        } => {
            let results = service
                .fetch_contact_summaries(&location.token, &location.location, &contact_ids)
                .await;
            let outcomes: Vec<ContactOutcome> = contact_ids
                .into_iter()
                .zip(results)
                .map(|(contact_id, result)| match result {
                    Ok(summary) => ContactOutcome {
                        contact_id,
                        summary: Some(summary.data),
                        error: None,
                    },
                    Err(e) => ContactOutcome {
                        contact_id,
                        summary: None,
                        error: Some(e.to_string()),
                    },
                })
                .collect();
            print_json(&outcomes, cli.pretty)?;
        }
    }

    Ok(())
}
