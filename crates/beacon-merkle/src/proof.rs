//! Inclusion proof verification.
//!
//! A proof is the sibling path from a leaf up to (not including) the root.
//! At level `i` bit `i` of the leaf index says whether the running node is
//! the right child (`1`) or the left child (`0`).

use crate::chunk::{Chunk, Root};
use crate::hasher::PairHasher;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons an inclusion proof is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("Proof has {actual} branches, expected {expected}")]
    ProofLengthMismatch { expected: usize, actual: usize },

    #[error("Proof does not hash to the expected root")]
    RootMismatch,
}

/// A leaf, its position and its sibling path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    #[serde(with = "crate::types::hex_bytes")]
    pub leaf: Chunk,
    pub index: u64,
    #[serde(with = "crate::types::hex_chunks")]
    pub branch: Vec<Chunk>,
}

impl InclusionProof {
    /// Check this proof against `root` for a tree of the given depth.
    ///
    /// # Errors
    /// See [`verify_inclusion_proof`].
    pub fn verify<H: PairHasher + ?Sized>(
        &self,
        hasher: &H,
        root: &Root,
        depth: usize,
    ) -> Result<(), ProofError> {
        verify_inclusion_proof(hasher, &self.leaf, self.index, &self.branch, root, depth)
    }
}

/// Recompute the root from `leaf` along `proof` and compare it with `root`.
///
/// Returns `false` if `proof` does not hold exactly `depth` siblings.
pub fn verify_merkle_proof<H: PairHasher + ?Sized>(
    hasher: &H,
    leaf: &Chunk,
    index: u64,
    proof: &[Chunk],
    root: &Root,
    depth: usize,
) -> bool {
    if proof.len() != depth {
        return false;
    }
    compute_root(hasher, leaf, index, proof) == *root
}

/// Length-gated verification.
///
/// A proof whose length differs from `depth` is rejected before any hashing.
///
/// # Errors
/// [`ProofError::ProofLengthMismatch`] for the wrong number of branches,
/// [`ProofError::RootMismatch`] if the path hashes to a different root.
pub fn verify_inclusion_proof<H: PairHasher + ?Sized>(
    hasher: &H,
    leaf: &Chunk,
    index: u64,
    proof: &[Chunk],
    root: &Root,
    depth: usize,
) -> Result<(), ProofError> {
    if proof.len() != depth {
        return Err(ProofError::ProofLengthMismatch {
            expected: depth,
            actual: proof.len(),
        });
    }
    if verify_merkle_proof(hasher, leaf, index, proof, root, depth) {
        Ok(())
    } else {
        Err(ProofError::RootMismatch)
    }
}

/// Root implied by `leaf` at `index` and the sibling path `proof`.
pub fn compute_root<H: PairHasher + ?Sized>(
    hasher: &H,
    leaf: &Chunk,
    index: u64,
    proof: &[Chunk],
) -> Root {
    let mut current = *leaf;
    for (level, sibling) in proof.iter().enumerate() {
        let bit = u32::try_from(level)
            .ok()
            .and_then(|shift| index.checked_shr(shift))
            .unwrap_or(0)
            & 1;
        current = if bit == 0 {
            hasher.hash_pair(&current, sibling)
        } else {
            hasher.hash_pair(sibling, &current)
        };
    }
    current
}
