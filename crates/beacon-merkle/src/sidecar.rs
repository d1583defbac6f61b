//! Blob sidecars and their validation against the block they belong to.
//!
//! A sidecar is accepted only if:
//! - its header hashes to the same block root as every other sidecar of the block
//! - its inclusion proof has exactly `KZG_COMMITMENT_INCLUSION_PROOF_DEPTH` branches
//! - the proof places its commitment under the header's body root
//! - its commitment equals the block's commitment at the same index
//!
//! Every rejection is logged and counted in `sidecar_rejections_total`.

use crate::chunk::{to_hex, Chunk, Root};
use crate::codec::hash_bytes48;
use crate::gindex::GindexCalculator;
use crate::hasher::PairHasher;
use crate::merkle::{MerkleError, Merkleizer};
use crate::proof::{verify_inclusion_proof, ProofError};
use crate::types::{preset, KzgCommitment, KzgProof, SignedBeaconBlockHeader};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Deref;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SidecarError {
    #[error("Sidecar {index}: inclusion proof has {actual} branches, expected {expected}")]
    ProofLengthMismatch {
        index: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Sidecar {index}: inclusion proof does not match the body root")]
    RootMismatch { index: u64 },

    #[error("Sidecar {index}: block root {actual} differs from {expected}")]
    BlockRootMismatch {
        index: u64,
        expected: String,
        actual: String,
    },

    #[error("Sidecar {index}: commitment differs from the block's")]
    CommitmentMismatch { index: u64 },

    #[error("Got {sidecars} sidecars for {commitments} block commitments")]
    CommitmentCountMismatch { sidecars: usize, commitments: usize },

    #[error("Sidecar index {index} out of range ({limit} commitments)")]
    IndexOutOfRange { index: u64, limit: usize },

    #[error("Duplicate sidecar index {0}")]
    DuplicateIndex(u64),

    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

impl SidecarError {
    /// Label for the rejection counter.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ProofLengthMismatch { .. } => "proof_length_mismatch",
            Self::RootMismatch { .. } => "root_mismatch",
            Self::BlockRootMismatch { .. } => "block_root_mismatch",
            Self::CommitmentMismatch { .. } => "commitment_mismatch",
            Self::CommitmentCountMismatch { .. } => "commitment_count_mismatch",
            Self::IndexOutOfRange { .. } => "index_out_of_range",
            Self::DuplicateIndex(_) => "duplicate_index",
            Self::Merkle(_) => "merkle",
        }
    }
}

fn reject(err: SidecarError) -> SidecarError {
    warn!(reason = err.reason(), error = %err, "Rejecting blob sidecar");
    metrics::counter!("sidecar_rejections_total", "reason" => err.reason()).increment(1);
    err
}

/// A blob commitment with the proof that it is part of a signed block.
///
/// Blob contents are not carried; checking them against the commitment is
/// KZG verification, which lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobSidecar {
    #[serde(with = "crate::types::quoted_u64")]
    pub index: u64,
    #[serde(with = "crate::types::hex_bytes")]
    pub kzg_commitment: KzgCommitment,
    #[serde(with = "crate::types::hex_bytes")]
    pub kzg_proof: KzgProof,
    pub signed_block_header: SignedBeaconBlockHeader,
    #[serde(
        rename = "kzg_commitment_inclusion_proof",
        with = "crate::types::hex_chunks"
    )]
    pub inclusion_proof: Vec<Chunk>,
}

impl BlobSidecar {
    /// Leaf the inclusion proof starts from.
    pub fn commitment_root<H: PairHasher + ?Sized>(&self, hasher: &H) -> Root {
        hash_bytes48(hasher, &self.kzg_commitment)
    }

    /// Root of the block this sidecar claims to belong to.
    ///
    /// # Errors
    /// Propagates engine failures.
    pub fn block_root<H: PairHasher>(
        &self,
        merkleizer: &Merkleizer<H>,
    ) -> Result<Root, MerkleError> {
        merkleizer.hash_tree_root(&self.signed_block_header.message)
    }

    /// Check the commitment is included under the header's body root.
    ///
    /// The proof length is checked before any hashing.
    ///
    /// # Errors
    /// [`SidecarError::ProofLengthMismatch`], [`SidecarError::IndexOutOfRange`]
    /// or [`SidecarError::RootMismatch`].
    pub fn verify_inclusion_proof<H: PairHasher + ?Sized>(
        &self,
        hasher: &H,
    ) -> Result<(), SidecarError> {
        let depth = preset::KZG_COMMITMENT_INCLUSION_PROOF_DEPTH;
        if self.inclusion_proof.len() != depth {
            return Err(reject(SidecarError::ProofLengthMismatch {
                index: self.index,
                expected: depth,
                actual: self.inclusion_proof.len(),
            }));
        }
        if self.index >= preset::MAX_BLOB_COMMITMENTS_PER_BLOCK as u64 {
            return Err(reject(SidecarError::IndexOutOfRange {
                index: self.index,
                limit: preset::MAX_BLOB_COMMITMENTS_PER_BLOCK,
            }));
        }

        verify_inclusion_proof(
            hasher,
            &self.commitment_root(hasher),
            GindexCalculator::blob_commitment_leaf_index(self.index),
            &self.inclusion_proof,
            &self.signed_block_header.message.body_root,
            depth,
        )
        .map_err(|err| {
            reject(match err {
                ProofError::ProofLengthMismatch { expected, actual } => {
                    SidecarError::ProofLengthMismatch {
                        index: self.index,
                        expected,
                        actual,
                    }
                }
                ProofError::RootMismatch => SidecarError::RootMismatch { index: self.index },
            })
        })
    }
}

/// All sidecars of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobSidecars(Vec<BlobSidecar>);

impl BlobSidecars {
    /// Every sidecar must reference the same block.
    ///
    /// # Errors
    /// Returns [`SidecarError::BlockRootMismatch`] naming the first sidecar whose
    /// header hashes to a different root than the first sidecar's.
    pub fn validate_block_roots<H: PairHasher>(
        &self,
        merkleizer: &Merkleizer<H>,
    ) -> Result<(), SidecarError> {
        let Some(first) = self.0.first() else {
            return Ok(());
        };
        let expected = first.block_root(merkleizer)?;

        for sidecar in &self.0[1..] {
            let actual = sidecar.block_root(merkleizer)?;
            if actual != expected {
                return Err(reject(SidecarError::BlockRootMismatch {
                    index: sidecar.index,
                    expected: to_hex(&expected),
                    actual: to_hex(&actual),
                }));
            }
        }
        Ok(())
    }

    /// Verify every inclusion proof. Sidecars are checked concurrently.
    ///
    /// # Errors
    /// Returns one of the failures if any proof is rejected.
    pub fn verify_inclusion_proofs<H: PairHasher + ?Sized>(
        &self,
        hasher: &H,
    ) -> Result<(), SidecarError> {
        self.0
            .par_iter()
            .try_for_each(|sidecar| sidecar.verify_inclusion_proof(hasher))
    }

    /// Match sidecar commitments against the commitments listed in the block.
    ///
    /// # Errors
    /// Fails on a count mismatch, an out-of-range or repeated index, or a
    /// commitment that differs from the block's at the same index.
    pub fn verify_commitments(
        &self,
        block_commitments: &[KzgCommitment],
    ) -> Result<(), SidecarError> {
        if self.0.len() != block_commitments.len() {
            return Err(reject(SidecarError::CommitmentCountMismatch {
                sidecars: self.0.len(),
                commitments: block_commitments.len(),
            }));
        }

        let mut seen = HashSet::with_capacity(self.0.len());
        for sidecar in &self.0 {
            let expected = usize::try_from(sidecar.index)
                .ok()
                .and_then(|i| block_commitments.get(i))
                .ok_or_else(|| {
                    reject(SidecarError::IndexOutOfRange {
                        index: sidecar.index,
                        limit: block_commitments.len(),
                    })
                })?;
            if !seen.insert(sidecar.index) {
                return Err(reject(SidecarError::DuplicateIndex(sidecar.index)));
            }
            if sidecar.kzg_commitment != *expected {
                return Err(reject(SidecarError::CommitmentMismatch {
                    index: sidecar.index,
                }));
            }
        }
        Ok(())
    }

    /// Block roots, inclusion proofs and commitments, in that order.
    ///
    /// # Errors
    /// The first failing check.
    pub fn validate<H: PairHasher>(
        &self,
        merkleizer: &Merkleizer<H>,
        block_commitments: &[KzgCommitment],
    ) -> Result<(), SidecarError> {
        self.validate_block_roots(merkleizer)?;
        self.verify_inclusion_proofs(merkleizer.hasher())?;
        self.verify_commitments(block_commitments)
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<BlobSidecar> {
        self.0
    }
}

impl From<Vec<BlobSidecar>> for BlobSidecars {
    fn from(sidecars: Vec<BlobSidecar>) -> Self {
        Self(sidecars)
    }
}

impl Deref for BlobSidecars {
    type Target = [BlobSidecar];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
