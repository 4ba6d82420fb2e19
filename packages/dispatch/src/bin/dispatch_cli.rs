//! CLI for the blood dispatch engine
//!
//! Runs one operation against the configured backend and prints the result
//! as JSON on stdout. Logs go to stderr. Without `DATABASE_URL` the in-memory
//! store is used, so state only lives for the duration of one invocation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatch_core::common::utils::Position;
use dispatch_core::common::{DispatchId, DonorId, RequestId};
use dispatch_core::config::Config;
use dispatch_core::domains::blood::actions::{self, OpenRequest, RegisterDonor};
use dispatch_core::domains::blood::models::{BloodGroup, RhesusFactor};
use dispatch_core::kernel::{DispatchDeps, MemoryStore, PgStore};

#[derive(Parser)]
#[command(name = "dispatch_cli")]
#[command(about = "Blood request dispatch CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,

    /// Register (or re-register) a donor
    RegisterDonor {
        id: String,
        #[arg(long, value_parser = parse_group)]
        group: BloodGroup,
        #[arg(long, value_parser = parse_rhesus, allow_hyphen_values = true)]
        rhesus: Option<RhesusFactor>,
        #[arg(long, allow_hyphen_values = true)]
        longitude: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        latitude: Option<f64>,
    },

    /// Remove a donor
    RemoveDonor { id: String },

    /// Open a request and run its first dispatch round
    Open {
        #[arg(long)]
        requester: String,
        #[arg(long, value_parser = parse_group)]
        group: BloodGroup,
        #[arg(long, value_parser = parse_rhesus, allow_hyphen_values = true)]
        rhesus: RhesusFactor,
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
        #[arg(long)]
        radius_m: Option<f64>,
    },

    /// Run another dispatch round for an open request
    Dispatch {
        request_id: String,
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
        /// Explicit round ID (generated when omitted)
        #[arg(long)]
        dispatch_id: Option<String>,
    },

    /// Number of donors a recorded round surfaced
    Outcome { dispatch_id: String },

    /// Disable an open request
    Disable { request_id: String },
}

fn parse_group(raw: &str) -> Result<BloodGroup, String> {
    raw.to_uppercase().parse()
}

fn parse_rhesus(raw: &str) -> Result<RhesusFactor, String> {
    match raw {
        "pos" | "positive" => Ok(RhesusFactor::Positive),
        "neg" | "negative" => Ok(RhesusFactor::Negative),
        other => other.parse(),
    }
}

// ============================================================================
// JSON Response
// ============================================================================

#[derive(Serialize)]
struct Response<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn output<T: Serialize>(data: T) -> Result<()> {
    let resp = Response {
        success: true,
        message: None,
        data: Some(data),
    };
    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}

fn output_error(message: String) -> Result<()> {
    let resp: Response<()> = Response {
        success: false,
        message: Some(message),
        data: None,
    };
    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dispatch_core=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    if let Commands::Migrate = cli.command {
        let store = connect(&config).await?.context("DATABASE_URL must be set to migrate")?;
        store.migrate().await.context("Failed to run migrations")?;
        return output("migrations applied");
    }

    let deps = match connect(&config).await? {
        Some(store) => DispatchDeps::postgres(store, config.dispatch),
        None => {
            tracing::warn!("DATABASE_URL not set, using a throwaway in-memory store");
            DispatchDeps::in_memory(Arc::new(MemoryStore::new()), config.dispatch)
        }
    };

    match run(cli.command, &deps).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            output_error(format!("{:#}", e))?;
            std::process::exit(1);
        }
    }
}

async fn connect(config: &Config) -> Result<Option<PgStore>> {
    let Some(url) = config.database_url.as_deref() else {
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("Failed to connect to database")?;

    Ok(Some(PgStore::new(pool)))
}

async fn run(command: Commands, deps: &DispatchDeps) -> Result<()> {
    match command {
        Commands::Migrate => output("nothing to do"),

        Commands::RegisterDonor {
            id,
            group,
            rhesus,
            longitude,
            latitude,
        } => {
            let position = match (longitude, latitude) {
                (Some(lng), Some(lat)) => Some(Position::new(lng, lat)),
                (None, None) => None,
                _ => anyhow::bail!("--longitude and --latitude must be given together"),
            };
            let donor = actions::register_donor(
                RegisterDonor {
                    id: DonorId::new(id),
                    blood_group: group,
                    rhesus_factor: rhesus,
                    position,
                },
                deps,
            )
            .await?;
            output(donor)
        }

        Commands::RemoveDonor { id } => {
            actions::remove_donor(DonorId::new(id), deps).await?;
            output("donor removed")
        }

        Commands::Open {
            requester,
            group,
            rhesus,
            longitude,
            latitude,
            radius_m,
        } => {
            let (request, round) = actions::open_request(
                OpenRequest {
                    requester_id: DonorId::new(requester),
                    blood_group: group,
                    rhesus_factor: rhesus,
                    radius_m,
                    position: Position::new(longitude, latitude),
                },
                deps,
            )
            .await?;
            output(serde_json::json!({ "request": request, "dispatch": round }))
        }

        Commands::Dispatch {
            request_id,
            longitude,
            latitude,
            dispatch_id,
        } => {
            let request_id = RequestId::parse(&request_id).context("Invalid request ID")?;
            let dispatch_id = dispatch_id
                .as_deref()
                .map(DispatchId::parse)
                .transpose()
                .context("Invalid dispatch ID")?;

            let round = actions::dispatch(
                request_id,
                Position::new(longitude, latitude),
                dispatch_id,
                deps,
            )
            .await?;
            output(round)
        }

        Commands::Outcome { dispatch_id } => {
            let dispatch_id = DispatchId::parse(&dispatch_id).context("Invalid dispatch ID")?;
            let size = actions::outcome_size(dispatch_id, deps).await?;
            output(serde_json::json!({ "dispatchId": dispatch_id, "outcomeSize": size }))
        }

        Commands::Disable { request_id } => {
            let request_id = RequestId::parse(&request_id).context("Invalid request ID")?;
            let request = actions::disable_request(request_id, deps).await?;
            output(request)
        }
    }
}
