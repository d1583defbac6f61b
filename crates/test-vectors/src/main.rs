//! Test Vector Generator
//!
//! Generates JSON test vectors (roots, statuses and sidecar inclusion proofs)
//! for cross-implementation checks.

use anyhow::{Context, Result};
use beacon_merkle::chunk::to_hex;
use beacon_merkle::{
    preset, BlobSidecar, BlockBodyProver, GindexCalculator, HashEngineConfig, Merkleizer,
    SignedBeaconBlockHeader, SlashingInfo, Validator, ValidatorRegistry, BLOCK_BODY_FIELD_COUNT,
};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "generate-test-vectors")]
#[command(about = "Generate merkleization and blob sidecar test vectors")]
struct Args {
    /// Output directory for test vectors
    #[arg(short, long, default_value = "test-vectors")]
    output: PathBuf,

    /// Number of test validators to generate
    #[arg(long, default_value = "10")]
    num_validators: u8,

    /// Number of blob commitments in the test block
    #[arg(long, default_value = "3")]
    num_blobs: u8,

    /// Epoch at which validator statuses are evaluated
    #[arg(long, default_value = "20")]
    epoch: u64,
}

/// Test vector file format
#[derive(Debug, Serialize)]
struct TestVectorFile {
    /// Preset used (minimal or mainnet)
    preset: String,
    validators: ValidatorVectors,
    slashing_info: Vec<ContainerVector<SlashingInfo>>,
    block: BlockVectors,
}

#[derive(Debug, Serialize)]
struct ValidatorVectors {
    epoch: u64,
    registry_root: String,
    entries: Vec<ValidatorVector>,
}

#[derive(Debug, Serialize)]
struct ValidatorVector {
    index: u64,
    validator: Validator,
    root: String,
    status: String,
}

#[derive(Debug, Serialize)]
struct ContainerVector<T> {
    value: T,
    root: String,
}

#[derive(Debug, Serialize)]
struct BlockVectors {
    block_root: String,
    body_root: String,
    commitments_root: String,
    proof_depth: usize,
    /// Valid sidecars with inclusion proofs
    sidecars: Vec<BlobSidecar>,
    /// Invalid sidecars for negative testing
    invalid_sidecars: Vec<InvalidSidecar>,
}

/// An invalid sidecar for negative testing
#[derive(Debug, Serialize)]
struct InvalidSidecar {
    description: String,
    sidecar: BlobSidecar,
    expected_error: String,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    tracing::info!(
        output = %args.output.display(),
        validators = args.num_validators,
        blobs = args.num_blobs,
        preset = preset::NAME,
        "Generating test vectors"
    );

    // Ensure output directory exists
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let merkleizer = Merkleizer::with_config(HashEngineConfig::default());

    let file = TestVectorFile {
        preset: preset::NAME.to_string(),
        validators: validator_vectors(&merkleizer, args.num_validators, args.epoch)?,
        slashing_info: slashing_vectors(&merkleizer)?,
        block: block_vectors(&merkleizer, args.num_blobs)?,
    };

    let output_path = args.output.join(format!("test_vectors_{}.json", preset::NAME));
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(&output_path, json)
        .with_context(|| format!("writing {}", output_path.display()))?;

    tracing::info!(path = %output_path.display(), "Wrote test vectors");

    Ok(())
}

/// Validators walking through every lifecycle phase.
fn lifecycle_validator(i: u8) -> Validator {
    let mut credentials = [0u8; 32];
    credentials[0] = 0x01;
    credentials[12..].copy_from_slice(&[i; 20]);

    let mut validator = Validator::from_deposit([i; 48], credentials, 32_000_000_000);
    let i = u64::from(i);
    match i % 5 {
        // pending_initialized or pending_queued
        0 => {
            if i % 2 == 0 {
                validator.activation_eligibility_epoch = i;
            }
        }
        // active
        1 => {
            validator.activation_eligibility_epoch = 0;
            validator.activation_epoch = 1;
        }
        // exiting or slashed
        2 => {
            validator.activation_eligibility_epoch = 0;
            validator.activation_epoch = 1;
            validator.exit_epoch = 25;
            validator.withdrawable_epoch = 40;
            validator.slashed = i % 2 == 0;
        }
        // exited
        3 => {
            validator.activation_eligibility_epoch = 0;
            validator.activation_epoch = 1;
            validator.exit_epoch = 10;
            validator.withdrawable_epoch = 30;
        }
        // withdrawable
        _ => {
            validator.activation_eligibility_epoch = 0;
            validator.activation_epoch = 1;
            validator.exit_epoch = 5;
            validator.withdrawable_epoch = 10;
            if i % 2 == 0 {
                validator.effective_balance = 0;
            }
        }
    }
    validator
}

fn validator_vectors(merkleizer: &Merkleizer, count: u8, epoch: u64) -> Result<ValidatorVectors> {
    let mut registry = ValidatorRegistry::new();
    for i in 0..count {
        registry.push(lifecycle_validator(i))?;
    }

    let roots = registry.element_roots(merkleizer)?;
    let statuses = registry.statuses(epoch)?;

    let entries = registry
        .iter()
        .zip(roots.iter().zip(statuses))
        .enumerate()
        .map(|(index, (validator, (root, status)))| ValidatorVector {
            index: index as u64,
            validator: *validator,
            root: to_hex(root),
            status: status.to_string(),
        })
        .collect();

    Ok(ValidatorVectors {
        epoch,
        registry_root: to_hex(&registry.hash_tree_root(merkleizer)?),
        entries,
    })
}

fn slashing_vectors(merkleizer: &Merkleizer) -> Result<Vec<ContainerVector<SlashingInfo>>> {
    [
        SlashingInfo::default(),
        SlashingInfo {
            slot: 12345,
            index: 67890,
        },
    ]
    .into_iter()
    .map(|value| {
        Ok(ContainerVector {
            value,
            root: to_hex(&merkleizer.hash_tree_root(&value)?),
        })
    })
    .collect()
}

fn block_vectors(merkleizer: &Merkleizer, num_blobs: u8) -> Result<BlockVectors> {
    let field_roots = (0..BLOCK_BODY_FIELD_COUNT as u8)
        .map(|i| [i.wrapping_mul(17); 32])
        .collect();
    let commitments = (0..num_blobs).map(|i| [0xc0 ^ i; 48]).collect();
    let body = BlockBodyProver::new(merkleizer, field_roots, commitments)?;

    let header =
        SignedBeaconBlockHeader::unsigned(body.block_header(64, 3, [0x11; 32], [0x22; 32]));
    let kzg_proofs: Vec<_> = (0..num_blobs).map(|i| [0xd0 ^ i; 48]).collect();
    let sidecars = body.build_sidecars(&header, &kzg_proofs)?.into_inner();

    let invalid_sidecars = match sidecars.first() {
        Some(first) => invalid_sidecars(first),
        None => vec![],
    };

    Ok(BlockVectors {
        block_root: to_hex(&merkleizer.hash_tree_root(&header.message)?),
        body_root: to_hex(&body.body_root()),
        commitments_root: to_hex(&body.commitments_root()),
        proof_depth: GindexCalculator::blob_commitment_proof_length() as usize,
        sidecars,
        invalid_sidecars,
    })
}

fn invalid_sidecars(valid: &BlobSidecar) -> Vec<InvalidSidecar> {
    let mut short = valid.clone();
    short.inclusion_proof.pop();

    let mut long = valid.clone();
    long.inclusion_proof.push([0u8; 32]);

    let mut tampered = valid.clone();
    if let Some(branch) = tampered.inclusion_proof.first_mut() {
        branch[0] ^= 0x01;
    }

    let mut wrong_commitment = valid.clone();
    wrong_commitment.kzg_commitment[47] ^= 0x01;

    let mut wrong_index = valid.clone();
    wrong_index.index += 1;

    vec![
        InvalidSidecar {
            description: "Inclusion proof one branch short".to_string(),
            sidecar: short,
            expected_error: "proof_length_mismatch".to_string(),
        },
        InvalidSidecar {
            description: "Inclusion proof one branch long".to_string(),
            sidecar: long,
            expected_error: "proof_length_mismatch".to_string(),
        },
        InvalidSidecar {
            description: "Flipped bit in the first branch".to_string(),
            sidecar: tampered,
            expected_error: "root_mismatch".to_string(),
        },
        InvalidSidecar {
            description: "Commitment does not match the proof".to_string(),
            sidecar: wrong_commitment,
            expected_error: "root_mismatch".to_string(),
        },
        InvalidSidecar {
            description: "Proof checked at the wrong commitment index".to_string(),
            sidecar: wrong_index,
            expected_error: "root_mismatch".to_string(),
        },
    ]
}
