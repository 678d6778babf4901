//! Operator CLI for the fraud scoring engine: client provisioning and
//! rule-accuracy inspection against the same durable store the service
//! reads and writes at runtime.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fraudscore_backend::config::Config;
use fraudscore_backend::hasher::{DigestKind, Hasher};
use fraudscore_backend::models::Vertical;
use fraudscore_backend::store::{Client, Store, Tier};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "fraudscore-admin", about = "Operator CLI for the fraud scoring engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a new tenant client and print its API key once.
    CreateClient {
        /// Tenant identifier, e.g. "acme-payments"
        #[arg(long)]
        tenant_id: String,
        /// Rate-limit tier: bronze, silver, or gold
        #[arg(long, default_value = "bronze")]
        tier: String,
        /// Primary vertical this client scores transactions for
        #[arg(long)]
        vertical: String,
        /// Webhook URL to notify on decline/critical decisions
        #[arg(long)]
        webhook_url: Option<String>,
        /// Shared secret used to sign webhook payloads
        #[arg(long)]
        webhook_secret: Option<String>,
    },
    /// Print accumulated precision and current weight for every rule.
    RuleStats,
}

fn parse_vertical(s: &str) -> Result<Vertical> {
    Vertical::all()
        .iter()
        .copied()
        .find(|v| v.as_str() == s)
        .with_context(|| format!("unknown vertical: {s}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("loading configuration")?;
    let store = Store::open(&config.db_url).context("opening durable store")?;
    let hasher = Hasher::new(&config.secret_key)?;

    match cli.command {
        Commands::CreateClient {
            tenant_id,
            tier,
            vertical,
            webhook_url,
            webhook_secret,
        } => {
            let vertical = parse_vertical(&vertical)?;
            let api_key = format!("fsk_{}", Uuid::new_v4().simple());
            let client = Client {
                id: tenant_id.clone(),
                api_key_digest: hasher.digest(DigestKind::ApiKey, &api_key),
                tier: Tier::from_str(&tier),
                vertical,
                webhook_url,
                webhook_secret,
                created_at: chrono::Utc::now().timestamp(),
            };
            store.upsert_client(&client).await?;
            println!("client '{tenant_id}' provisioned");
            println!("api key (store this now, it is not recoverable): {api_key}");
        }
        Commands::RuleStats => {
            let rows = store.list_rule_accuracy().await?;
            if rows.is_empty() {
                println!("no rule accuracy data yet");
                return Ok(());
            }
            println!("{:<28} {:<12} {:>6} {:>6} {:>10} {:>8}", "rule", "vertical", "tp", "fp", "precision", "weight");
            for (rule_name, vertical, acc) in rows {
                let precision = acc
                    .precision()
                    .map(|p| format!("{:.3}", p))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<28} {:<12} {:>6} {:>6} {:>10} {:>8.2}",
                    rule_name,
                    vertical.as_str(),
                    acc.true_positive,
                    acc.false_positive,
                    precision,
                    acc.weight
                );
            }
        }
    }

    Ok(())
}
