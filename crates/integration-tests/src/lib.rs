//! Reference-implementation mirrors and fixtures for cross-checking
//! `beacon-merkle` against `ssz_rs`.

use beacon_merkle::{
    preset, BeaconBlockHeader, Chunk, KzgCommitment, Root, SlashingInfo, Validator,
    BLOCK_BODY_FIELD_COUNT, VALIDATOR_REGISTRY_LIMIT,
};
use ssz_rs::prelude::*;
use ssz_rs::HashTreeRoot;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Cannot build ssz_rs value: {0}")]
    Conversion(String),

    #[error("ssz_rs merkleization failed: {0}")]
    Merkleization(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SszValidator {
    pub pubkey: Vector<u8, 48>,
    pub withdrawal_credentials: [u8; 32],
    pub effective_balance: u64,
    pub slashed: bool,
    pub activation_eligibility_epoch: u64,
    pub activation_epoch: u64,
    pub exit_epoch: u64,
    pub withdrawable_epoch: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SszBeaconBlockHeader {
    pub slot: u64,
    pub proposer_index: u64,
    pub parent_root: [u8; 32],
    pub state_root: [u8; 32],
    pub body_root: [u8; 32],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SszSlashingInfo {
    pub slot: u64,
    pub index: u64,
}

pub type SszCommitments = List<Vector<u8, 48>, { preset::MAX_BLOB_COMMITMENTS_PER_BLOCK }>;

pub type SszRegistry = List<SszValidator, VALIDATOR_REGISTRY_LIMIT>;

/// Deneb block body with every field except the commitments collapsed to its root.
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SszBlockBody {
    pub randao_reveal_root: [u8; 32],
    pub eth1_data_root: [u8; 32],
    pub graffiti: [u8; 32],
    pub proposer_slashings_root: [u8; 32],
    pub attester_slashings_root: [u8; 32],
    pub attestations_root: [u8; 32],
    pub deposits_root: [u8; 32],
    pub voluntary_exits_root: [u8; 32],
    pub sync_aggregate_root: [u8; 32],
    pub execution_payload_root: [u8; 32],
    pub bls_to_execution_changes_root: [u8; 32],
    pub blob_kzg_commitments: SszCommitments,
}

fn bytes48(bytes: &[u8; 48]) -> Result<Vector<u8, 48>, OracleError> {
    Vector::try_from(bytes.to_vec())
        .map_err(|_| OracleError::Conversion("48-byte vector".to_string()))
}

/// Mirror a validator as an `ssz_rs` container.
///
/// # Errors
/// Fails if `ssz_rs` rejects the pubkey vector.
pub fn ssz_validator(validator: &Validator) -> Result<SszValidator, OracleError> {
    Ok(SszValidator {
        pubkey: bytes48(&validator.pubkey)?,
        withdrawal_credentials: validator.withdrawal_credentials,
        effective_balance: validator.effective_balance,
        slashed: validator.slashed,
        activation_eligibility_epoch: validator.activation_eligibility_epoch,
        activation_epoch: validator.activation_epoch,
        exit_epoch: validator.exit_epoch,
        withdrawable_epoch: validator.withdrawable_epoch,
    })
}

/// Mirror a registry as an `ssz_rs` list.
///
/// # Errors
/// Fails if any validator cannot be mirrored.
pub fn ssz_registry(validators: &[Validator]) -> Result<SszRegistry, OracleError> {
    let mut registry = SszRegistry::default();
    for validator in validators {
        registry.push(ssz_validator(validator)?);
    }
    Ok(registry)
}

impl From<&BeaconBlockHeader> for SszBeaconBlockHeader {
    fn from(header: &BeaconBlockHeader) -> Self {
        Self {
            slot: header.slot,
            proposer_index: header.proposer_index,
            parent_root: header.parent_root,
            state_root: header.state_root,
            body_root: header.body_root,
        }
    }
}

impl From<&SlashingInfo> for SszSlashingInfo {
    fn from(info: &SlashingInfo) -> Self {
        Self {
            slot: info.slot,
            index: info.index,
        }
    }
}

/// Mirror a body from its field roots and commitments. The field root at the
/// commitments position is ignored.
///
/// # Errors
/// Fails on a wrong field count or an unconvertible commitment.
pub fn ssz_block_body(
    field_roots: &[Root],
    commitments: &[KzgCommitment],
) -> Result<SszBlockBody, OracleError> {
    if field_roots.len() != BLOCK_BODY_FIELD_COUNT {
        return Err(OracleError::Conversion(format!(
            "expected {BLOCK_BODY_FIELD_COUNT} field roots, got {}",
            field_roots.len()
        )));
    }

    let mut blob_kzg_commitments = SszCommitments::default();
    for commitment in commitments {
        blob_kzg_commitments.push(bytes48(commitment)?);
    }

    Ok(SszBlockBody {
        randao_reveal_root: field_roots[0],
        eth1_data_root: field_roots[1],
        graffiti: field_roots[2],
        proposer_slashings_root: field_roots[3],
        attester_slashings_root: field_roots[4],
        attestations_root: field_roots[5],
        deposits_root: field_roots[6],
        voluntary_exits_root: field_roots[7],
        sync_aggregate_root: field_roots[8],
        execution_payload_root: field_roots[9],
        bls_to_execution_changes_root: field_roots[10],
        blob_kzg_commitments,
    })
}

/// Root of any `ssz_rs` value as raw bytes.
///
/// # Errors
/// Propagates `ssz_rs` merkleization failures.
pub fn oracle_root<T: HashTreeRoot>(value: &T) -> Result<Root, OracleError> {
    let node = value
        .hash_tree_root()
        .map_err(|e| OracleError::Merkleization(format!("{e:?}")))?;
    Ok(node.into())
}

/// Check a branch with `ssz_rs`'s generalized-index verifier.
#[must_use]
pub fn oracle_verify(leaf: &Chunk, branch: &[Chunk], gindex: u64, root: &Root) -> bool {
    let (Ok(leaf), Ok(root)) = (Node::try_from(leaf.as_slice()), Node::try_from(root.as_slice()))
    else {
        return false;
    };
    let Ok(branch) = branch
        .iter()
        .map(|b| Node::try_from(b.as_slice()))
        .collect::<Result<Vec<Node>, _>>()
    else {
        return false;
    };
    let Ok(gindex) = usize::try_from(gindex) else {
        return false;
    };
    ssz_rs::proofs::is_valid_merkle_branch_for_generalized_index(leaf, &branch, gindex, root)
        .is_ok()
}

/// An active validator with distinct pubkey and execution credentials.
#[must_use]
pub fn make_validator(index: u8) -> Validator {
    let mut credentials = [0u8; 32];
    credentials[0] = 0x01;
    credentials[12..32].copy_from_slice(&[index; 20]);

    let mut validator = Validator::from_deposit([index; 48], credentials, 32_000_000_000);
    validator.activation_eligibility_epoch = 0;
    validator.activation_epoch = 100 + u64::from(index);
    validator
}

/// An exited, slashed validator.
#[must_use]
pub fn make_slashed_validator(index: u8) -> Validator {
    let mut validator = make_validator(index);
    validator.slashed = true;
    validator.exit_epoch = 200;
    validator.withdrawable_epoch = 8392;
    validator.effective_balance = 31_000_000_000;
    validator
}

/// A validator fresh from its deposit.
#[must_use]
pub fn make_pending_validator(index: u8) -> Validator {
    Validator::from_deposit([index; 48], [0u8; 32], 17_500_000_000)
}

/// `count` validators cycling through active, slashed and pending records.
#[must_use]
pub fn make_validators(count: usize) -> Vec<Validator> {
    (0..count)
        .map(|i| {
            let tag = (i % 256) as u8;
            match i % 3 {
                0 => make_validator(tag),
                1 => make_slashed_validator(tag),
                _ => make_pending_validator(tag),
            }
        })
        .collect()
}

/// Distinct non-zero roots for every body field.
#[must_use]
pub fn make_field_roots() -> Vec<Root> {
    (0..BLOCK_BODY_FIELD_COUNT)
        .map(|i| {
            let mut root = [0u8; 32];
            root[0] = i as u8 + 1;
            root[31] = 0xf0;
            root
        })
        .collect()
}

/// `count` distinct commitments.
#[must_use]
pub fn make_commitments(count: usize) -> Vec<KzgCommitment> {
    (0..count)
        .map(|i| {
            let mut commitment = [0xc0u8; 48];
            commitment[..8].copy_from_slice(&(i as u64).to_le_bytes());
            commitment
        })
        .collect()
}
