//! Sidecar Check
//!
//! Fetches blob sidecars and validators from a beacon node and checks them
//! against locally computed roots and proofs.

use anyhow::{bail, Context, Result};
use beacon_merkle::chunk::to_hex;
use beacon_merkle::engine::DEFAULT_MIN_PARALLELIZATION_SIZE;
use beacon_merkle::{
    compute_epoch_at_slot, preset, BeaconClient, Epoch, HashEngineConfig, Merkleizer,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "verify-sidecars")]
#[command(about = "Verify blob sidecars and validator statuses against a beacon node")]
struct Args {
    /// Beacon node URL
    #[arg(long, env = "BEACON_URL", default_value = "http://localhost:5052")]
    beacon_url: String,

    /// Worker threads available for tree hashing (defaults to host parallelism)
    #[arg(long, env = "HASH_PARALLELISM")]
    parallelism: Option<usize>,

    /// Minimum level size before hashing is split across workers
    #[arg(long, default_value_t = DEFAULT_MIN_PARALLELIZATION_SIZE)]
    min_parallelization_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every blob sidecar of a block
    Sidecars {
        /// Block identifier (slot, root, "head", "finalized")
        #[arg(default_value = "head")]
        block_id: String,
    },

    /// Recompute a validator's status and root
    Validator {
        /// Validator index or pubkey
        validator_id: String,

        /// State identifier
        #[arg(long, default_value = "head")]
        state_id: String,

        /// Epoch to evaluate the status at (defaults to the state's epoch)
        #[arg(long)]
        epoch: Option<Epoch>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = HashEngineConfig {
        min_parallelization_size: args.min_parallelization_size,
        ..HashEngineConfig::default()
    };
    if let Some(parallelism) = args.parallelism {
        config.parallelism = parallelism.max(1);
    }
    let merkleizer = Merkleizer::with_config(config);
    let client = BeaconClient::new(args.beacon_url.clone());

    tracing::info!(
        beacon_url = %args.beacon_url,
        preset = preset::NAME,
        parallelism = config.parallelism,
        "Beacon node"
    );

    match args.command {
        Command::Sidecars { block_id } => check_sidecars(&client, &merkleizer, &block_id).await,
        Command::Validator {
            validator_id,
            state_id,
            epoch,
        } => check_validator(&client, &merkleizer, &validator_id, &state_id, epoch).await,
    }
}

async fn check_sidecars(
    client: &BeaconClient,
    merkleizer: &Merkleizer,
    block_id: &str,
) -> Result<()> {
    let header = client
        .get_header(block_id)
        .await
        .context("Failed to fetch block header")?;
    let sidecars = client
        .get_blob_sidecars(block_id)
        .await
        .context("Failed to fetch blob sidecars")?;
    let commitments = client
        .get_block_commitments(block_id)
        .await
        .context("Failed to fetch block commitments")?;

    tracing::info!(
        slot = header.header.message.slot,
        block_root = %to_hex(&header.root),
        sidecars = sidecars.len(),
        commitments = commitments.len(),
        "Fetched block"
    );

    let local_root = merkleizer.hash_tree_root(&header.header.message)?;
    if local_root != header.root {
        bail!(
            "Header root {} differs from the node's {}",
            to_hex(&local_root),
            to_hex(&header.root)
        );
    }

    if let Some(first) = sidecars.first() {
        let sidecar_root = first.block_root(merkleizer)?;
        if sidecar_root != header.root {
            bail!(
                "Sidecars reference block {} instead of {}",
                to_hex(&sidecar_root),
                to_hex(&header.root)
            );
        }
    }

    sidecars
        .validate(merkleizer, &commitments)
        .context("Sidecar validation failed")?;

    tracing::info!(count = sidecars.len(), "All blob sidecars verified");
    Ok(())
}

async fn check_validator(
    client: &BeaconClient,
    merkleizer: &Merkleizer,
    validator_id: &str,
    state_id: &str,
    epoch: Option<Epoch>,
) -> Result<()> {
    let epoch = match epoch {
        Some(epoch) => epoch,
        None => {
            let header = client
                .get_header(state_id)
                .await
                .context("Failed to fetch header for the state's epoch")?;
            compute_epoch_at_slot(header.header.message.slot)
        }
    };

    let response = client
        .get_validator(state_id, validator_id)
        .await
        .context("Failed to fetch validator")?;

    let status = response.validator.status(epoch)?;
    let root = merkleizer.hash_tree_root(&response.validator)?;

    tracing::info!(
        index = response.index,
        epoch,
        status = %status,
        reported = %response.status,
        root = %to_hex(&root),
        withdrawable = response.validator.is_fully_withdrawable(response.balance, epoch),
        "Validator"
    );

    if status != response.status {
        bail!(
            "Validator {} status {status} differs from the node's {}",
            response.index,
            response.status
        );
    }
    Ok(())
}
