//! cipherledger
//!
//! Command-line client for the supply-chain ledger. Configuration comes from
//! the environment (and `.env`); see `ClientConfig::from_env`.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use cipherledger_client::{ClientConfig, ShipmentOrchestrator};
use cipherledger_core::explorer::{explorer_name, transaction_url};
use cipherledger_core::{LedgerError, ShipmentDraft, ShipmentMetrics};

#[derive(Parser)]
#[command(
    name = "cipherledger",
    about = "Submit and track shipments on a privacy-preserving supply-chain ledger"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt and submit a new shipment.
    Submit(SubmitArgs),
    /// Print a shipment record.
    Fetch(ShipmentArgs),
    /// Print aggregate ledger counters.
    Stats,
    /// Mark a shipment as in transit.
    Transit(ShipmentArgs),
    /// Mark a shipment as delivered.
    Deliver(ShipmentArgs),
    /// Mark a shipment as lost.
    Lost(ShipmentArgs),
    /// Ask the contract whether a shipment is low risk.
    AssessRisk(ShipmentArgs),
    /// List the shipments a user takes part in.
    Shipments {
        /// Defaults to the configured wallet.
        #[arg(long)]
        user: Option<String>,
    },
    /// Number of shipments submitted by a shipper.
    ShipperCount {
        /// Defaults to the configured wallet.
        #[arg(long)]
        shipper: Option<String>,
    },
    /// Check whether an account is an authorized carrier.
    IsCarrier(AccountArgs),
    /// Check whether an account is an inspector.
    IsInspector(AccountArgs),
    /// Authorize a carrier (owner only).
    AuthorizeCarrier(AccountArgs),
    /// Revoke a carrier (owner only).
    RevokeCarrier(AccountArgs),
    /// Add an inspector (owner only).
    AddInspector(AccountArgs),
    /// Remove an inspector (owner only).
    RemoveInspector(AccountArgs),
    /// Print the active deployment manifest.
    Manifest,
}

#[derive(Args)]
struct ShipmentArgs {
    /// Free text (up to 31 bytes) or a 32-byte hex id.
    shipment_id: String,
}

#[derive(Args)]
struct AccountArgs {
    address: String,
}

#[derive(Args)]
struct SubmitArgs {
    /// Read the whole draft from a JSON file instead of flags.
    #[arg(long, conflicts_with_all = ["id", "carrier", "receiver", "category"])]
    draft_json: Option<PathBuf>,
    #[arg(long, required_unless_present = "draft_json")]
    id: Option<String>,
    #[arg(long, required_unless_present = "draft_json")]
    carrier: Option<String>,
    #[arg(long, required_unless_present = "draft_json")]
    receiver: Option<String>,
    /// GeneralGoods, Perishable, Hazardous, HighValue, Pharmaceutical or Electronics.
    #[arg(long, required_unless_present = "draft_json")]
    category: Option<String>,
    #[arg(long, default_value_t = 0)]
    weight_kg: u64,
    #[arg(long, default_value_t = 0)]
    volume_cubic_meters: u64,
    #[arg(long, default_value_t = 0)]
    declared_value: u64,
    #[arg(long, default_value_t = 0)]
    quantity: u64,
    #[arg(long, default_value_t = 0)]
    temperature: u64,
    #[arg(long, default_value_t = 0)]
    humidity: u64,
    #[arg(long, default_value_t = 0)]
    fragility_score: u64,
    #[arg(long, default_value_t = 0)]
    priority: u64,
    #[arg(long, default_value_t = 0)]
    risk_code: u64,
}

impl SubmitArgs {
    fn into_draft(self) -> Result<ShipmentDraft> {
        if let Some(path) = self.draft_json {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            return serde_json::from_str(&json).context("failed to parse shipment draft json");
        }

        Ok(ShipmentDraft {
            shipment_id: self.id.unwrap_or_default(),
            carrier: self.carrier.unwrap_or_default(),
            receiver: self.receiver.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            metrics: ShipmentMetrics {
                weight_kg: self.weight_kg,
                volume_cubic_meters: self.volume_cubic_meters,
                declared_value: self.declared_value,
                quantity: self.quantity,
                temperature: self.temperature,
                humidity: self.humidity,
                fragility_score: self.fragility_score,
                priority: self.priority,
                risk_code: self.risk_code,
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cipherledger=info,cipherledger_client=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;

    if let Commands::Manifest = cli.command {
        return print_json(&config.manifest()?);
    }

    let orchestrator = cipherledger_client::connect(&config).await?;
    let chain_id = orchestrator.chain_id();

    let result = run(&orchestrator, cli.command).await;
    if let Err(err) = &result {
        if let Some(tx_hash) = err.downcast_ref::<LedgerError>().and_then(LedgerError::tx_hash) {
            eprintln!(
                "View on {}: {}",
                explorer_name(chain_id),
                transaction_url(&tx_hash, chain_id)
            );
        }
    }
    result
}

async fn run(orchestrator: &ShipmentOrchestrator, command: Commands) -> Result<()> {
    match command {
        Commands::Submit(args) => {
            let draft = args.into_draft()?;
            let result = orchestrator
                .submit_shipment(&draft, |progress| eprintln!("{progress}"))
                .await
                .context("shipment submission failed")?;
            info!(
                "Shipment submitted: {}",
                transaction_url(&result.tx_hash, orchestrator.chain_id())
            );
            print_json(&result)
        }
        Commands::Fetch(args) => {
            let record = orchestrator.fetch_shipment(&args.shipment_id).await?;
            if !record.is_found() {
                eprintln!("Shipment {} not found", args.shipment_id);
            }
            print_json(&record)
        }
        Commands::Stats => print_json(&orchestrator.supply_stats().await?),
        Commands::Transit(args) => print_json(&orchestrator.start_transit(&args.shipment_id).await?),
        Commands::Deliver(args) => print_json(&orchestrator.mark_delivered(&args.shipment_id).await?),
        Commands::Lost(args) => print_json(&orchestrator.mark_lost(&args.shipment_id).await?),
        Commands::AssessRisk(args) => {
            let low_risk = orchestrator.assess_risk(&args.shipment_id).await?;
            print_json(&serde_json::json!({ "shipment_id": args.shipment_id, "low_risk": low_risk }))
        }
        Commands::Shipments { user } => print_json(&orchestrator.user_shipments(user.as_deref()).await?),
        Commands::ShipperCount { shipper } => {
            let count = orchestrator.shipper_shipment_count(shipper.as_deref()).await?;
            print_json(&serde_json::json!({ "shipments": count }))
        }
        Commands::IsCarrier(args) => {
            let authorized = orchestrator.is_carrier(&args.address).await?;
            print_json(&serde_json::json!({ "address": args.address, "carrier": authorized }))
        }
        Commands::IsInspector(args) => {
            let inspector = orchestrator.is_inspector(&args.address).await?;
            print_json(&serde_json::json!({ "address": args.address, "inspector": inspector }))
        }
        Commands::AuthorizeCarrier(args) => print_json(&orchestrator.authorize_carrier(&args.address).await?),
        Commands::RevokeCarrier(args) => print_json(&orchestrator.revoke_carrier(&args.address).await?),
        Commands::AddInspector(args) => print_json(&orchestrator.add_inspector(&args.address).await?),
        Commands::RemoveInspector(args) => print_json(&orchestrator.remove_inspector(&args.address).await?),
        Commands::Manifest => print_json(orchestrator.manifest()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}
