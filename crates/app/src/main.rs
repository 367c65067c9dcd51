//! Pennyworth binary: the round-up scheduler, the queue consumer, and
//! an address provisioning helper, selected by subcommand. Exits
//! non-zero on configuration or key errors.

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use pennyworth_core::Money;
use pennyworth_crypto::SigningKeypair;
use pennyworth_pipeline::{Consumer, Scheduler, SignerHook, Worker};
use pennyworth_plaid::PlaidClient;
use pennyworth_queue::SqsQueue;
use pennyworth_settings::Config;
use pennyworth_store::Store;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pennyworth", version, about = "Round-up donation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daily round-up over all eligible users.
    Roundup {
        /// Override the start of the history window (YYYY-MM-DD).
        #[arg(long)]
        gte: Option<NaiveDate>,
        /// Override the end of the history window (YYYY-MM-DD).
        #[arg(long)]
        lte: Option<NaiveDate>,
    },
    /// Drain the co-signed queue and commit verified chains.
    Consume,
    /// Create a ledger address with its genesis entry.
    Provision {
        address: String,
        /// Co-signer public key; defaults to SIGNER_PUBLIC_KEY.
        #[arg(long)]
        public_key: Option<String>,
        #[arg(long, default_value = "USD")]
        currency: String,
        /// Minimum permitted balance, e.g. -10.00.
        #[arg(long, default_value_t = -10.0)]
        limit: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("incomplete environment")?;
    let store = Arc::new(Store::open(&config.database_path).context("cannot open database")?);

    match cli.command {
        Command::Roundup { gte, lte } => {
            let server_key = SigningKeypair::from_hex(&config.server_private_key)
                .context("SERVER_PRIVATE_KEY is not a usable ed25519 secret")?;
            let plaid = Arc::new(
                PlaidClient::new(
                    &config.plaid_env,
                    &config.plaid_client_id,
                    &config.plaid_secret,
                )
                .context("cannot build aggregator client")?,
            );
            let queue = Arc::new(SqsQueue::new().context("cannot build queue client")?);
            let hook = SignerHook::new(&config.signer_url)?;

            let worker = Arc::new(Worker::new(
                Arc::clone(&store),
                plaid,
                queue,
                &config.to_signer_queue,
                server_key,
                &config.server_kid,
                Some(hook),
            ));
            let summary = Scheduler::new(store, worker).run(gte, lte).await?;
            info!(
                enqueued = summary.enqueued,
                failed = summary.failed,
                "scheduler finished"
            );
        }
        Command::Consume => {
            let server_key = SigningKeypair::from_hex(&config.server_private_key)
                .context("SERVER_PRIVATE_KEY is not a usable ed25519 secret")?;
            let queue = Arc::new(SqsQueue::new().context("cannot build queue client")?);

            let consumer = Consumer::new(
                store,
                queue,
                &config.from_signer_queue,
                &server_key.public_key_hex(),
                &config.server_kid,
            );
            let summary = consumer.run().await?;
            info!(
                committed = summary.committed,
                dropped = summary.dropped,
                "consumer finished"
            );
        }
        Command::Provision {
            address,
            public_key,
            currency,
            limit,
        } => {
            let public_key = public_key.unwrap_or_else(|| config.signer_public_key.clone());
            let limit = Money::from_f64(limit).context("limit is not a usable amount")?;
            let genesis = store.provision_address(&address, &public_key, &currency, limit)?;
            info!(address = %address, tip = %genesis.hash.value, "address provisioned");
        }
    }
    Ok(())
}
