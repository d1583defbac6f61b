//! Block Body Commitment Prover
//!
//! Builds the body root of a block from its field roots and the
//! `blob_kzg_commitments` list, and produces the per-commitment inclusion
//! proofs carried by blob sidecars.
//!
//! Proof layout, leaf to root:
//! 1. siblings inside the commitments data tree (`BLOB_KZG_COMMITMENTS_TREE_DEPTH`)
//! 2. the list length chunk
//! 3. siblings inside the body container (`BLOCK_BODY_TREE_DEPTH`)

use crate::chunk::{chunk_from_u64, Chunk, Root};
use crate::codec::hash_bytes48;
use crate::gindex::GindexCalculator;
use crate::hasher::PairHasher;
use crate::merkle::{MerkleError, MerkleTree, Merkleizer};
use crate::sidecar::{BlobSidecar, BlobSidecars};
use crate::types::{
    preset, BeaconBlockHeader, KzgCommitment, KzgProof, SignedBeaconBlockHeader, Slot,
    ValidatorIndex, BLOB_KZG_COMMITMENTS_INDEX, BLOCK_BODY_FIELD_COUNT, BLOCK_BODY_TREE_DEPTH,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BodyError {
    #[error("Expected {expected} body field roots, got {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("{0} commitments exceed the per-block maximum")]
    TooManyCommitments(usize),

    #[error("Commitment index {index} out of bounds (len {len})")]
    CommitmentIndexOutOfBounds { index: usize, len: usize },

    #[error("Got {proofs} KZG proofs for {commitments} commitments")]
    KzgProofCountMismatch { commitments: usize, proofs: usize },

    #[error("Header body root does not match the body")]
    BodyRootMismatch,

    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

/// A block body reduced to what blob inclusion proofs need.
#[derive(Debug, Clone)]
pub struct BlockBodyProver {
    commitments: Vec<KzgCommitment>,
    commitments_tree: MerkleTree,
    body_tree: MerkleTree,
}

impl BlockBodyProver {
    /// Build the body and commitment trees.
    ///
    /// `field_roots` holds the roots of all body fields in declaration order.
    /// The entry at the `blob_kzg_commitments` position is replaced with the
    /// root computed from `commitments`.
    ///
    /// # Errors
    /// Fails on a wrong field count or more commitments than the preset allows.
    pub fn new<H: PairHasher>(
        merkleizer: &Merkleizer<H>,
        mut field_roots: Vec<Root>,
        commitments: Vec<KzgCommitment>,
    ) -> Result<Self, BodyError> {
        if field_roots.len() != BLOCK_BODY_FIELD_COUNT {
            return Err(BodyError::FieldCount {
                expected: BLOCK_BODY_FIELD_COUNT,
                actual: field_roots.len(),
            });
        }
        if commitments.len() > preset::MAX_BLOB_COMMITMENTS_PER_BLOCK {
            return Err(BodyError::TooManyCommitments(commitments.len()));
        }

        let leaves: Vec<Chunk> = commitments
            .iter()
            .map(|c| hash_bytes48(merkleizer.hasher(), c))
            .collect();
        let commitments_tree =
            merkleizer.build_tree(&leaves, preset::BLOB_KZG_COMMITMENTS_TREE_DEPTH)?;
        field_roots[BLOB_KZG_COMMITMENTS_INDEX] =
            merkleizer.mix_in_length(&commitments_tree.root(), commitments.len());

        let body_tree = merkleizer.build_tree(&field_roots, BLOCK_BODY_TREE_DEPTH)?;

        debug!(
            commitments = commitments.len(),
            body_root = %hex::encode(body_tree.root()),
            "Built block body tree"
        );

        Ok(Self {
            commitments,
            commitments_tree,
            body_tree,
        })
    }

    #[must_use]
    pub fn body_root(&self) -> Root {
        self.body_tree.root()
    }

    #[must_use]
    pub fn commitments(&self) -> &[KzgCommitment] {
        &self.commitments
    }

    /// Root of the `blob_kzg_commitments` list (with length mixed in).
    #[must_use]
    pub fn commitments_root(&self) -> Root {
        self.body_tree.leaves()[BLOB_KZG_COMMITMENTS_INDEX]
    }

    /// Inclusion proof of `blob_kzg_commitments[index]` against the body root.
    ///
    /// # Errors
    /// Returns [`BodyError::CommitmentIndexOutOfBounds`] for an unknown index.
    pub fn commitment_proof(&self, index: usize) -> Result<Vec<Chunk>, BodyError> {
        if index >= self.commitments.len() {
            return Err(BodyError::CommitmentIndexOutOfBounds {
                index,
                len: self.commitments.len(),
            });
        }

        let mut proof = self.commitments_tree.proof(index as u64)?;
        proof.push(chunk_from_u64(self.commitments.len() as u64));
        proof.extend(self.body_tree.proof(BLOB_KZG_COMMITMENTS_INDEX as u64)?);

        debug_assert_eq!(
            proof.len() as u32,
            GindexCalculator::blob_commitment_proof_length()
        );
        Ok(proof)
    }

    /// A header committing to this body.
    #[must_use]
    pub fn block_header(
        &self,
        slot: Slot,
        proposer_index: ValidatorIndex,
        parent_root: Root,
        state_root: Root,
    ) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot,
            proposer_index,
            parent_root,
            state_root,
            body_root: self.body_root(),
        }
    }

    /// One sidecar per commitment, each carrying its inclusion proof.
    ///
    /// # Errors
    /// Fails if `kzg_proofs` does not pair up with the commitments or the header
    /// commits to a different body.
    pub fn build_sidecars(
        &self,
        signed_block_header: &SignedBeaconBlockHeader,
        kzg_proofs: &[KzgProof],
    ) -> Result<BlobSidecars, BodyError> {
        if kzg_proofs.len() != self.commitments.len() {
            return Err(BodyError::KzgProofCountMismatch {
                commitments: self.commitments.len(),
                proofs: kzg_proofs.len(),
            });
        }
        if signed_block_header.message.body_root != self.body_root() {
            return Err(BodyError::BodyRootMismatch);
        }

        self.commitments
            .iter()
            .zip(kzg_proofs)
            .enumerate()
            .map(|(index, (commitment, kzg_proof))| {
                Ok(BlobSidecar {
                    index: index as u64,
                    kzg_commitment: *commitment,
                    kzg_proof: *kzg_proof,
                    signed_block_header: *signed_block_header,
                    inclusion_proof: self.commitment_proof(index)?,
                })
            })
            .collect::<Result<Vec<_>, BodyError>>()
            .map(BlobSidecars::from)
    }
}
