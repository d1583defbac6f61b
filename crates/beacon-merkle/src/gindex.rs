//! Generalized Index Computation
//!
//! Computes generalized indices (gindices) for the inclusion proofs this crate
//! produces and checks. A gindex of depth `d` addresses leaf `gindex - 2^d` of
//! a tree with `2^d` leaves, which is the `index` argument of
//! [`verify_merkle_proof`](crate::proof::verify_merkle_proof).

use crate::types::{
    preset, BLOB_KZG_COMMITMENTS_INDEX, BLOCK_BODY_TREE_DEPTH, VALIDATOR_REGISTRY_DEPTH,
    VALIDATOR_TREE_DEPTH,
};

/// Calculator for generalized indices in block bodies and validator lists
#[derive(Debug, Clone, Copy)]
pub struct GindexCalculator;

impl GindexCalculator {
    // BeaconBlockBody has 12 fields in Deneb, tree depth 4 (2^4 = 16 >= 12)
    const BLOCK_BODY_BASE_GINDEX: u64 = 1 << BLOCK_BODY_TREE_DEPTH;

    // Validator has 8 fields, tree depth 3 (2^3 = 8)
    const VALIDATOR_BASE_GINDEX: u64 = 1 << VALIDATOR_TREE_DEPTH;

    // For a List, the root is hash(data_root, length):
    // - gindex 2: data_root (left child)
    // - gindex 3: length mix-in (right child)
    const LIST_DATA_GINDEX: u64 = 2;

    /// Compute gindex for `blob_kzg_commitments[i]` from the block body root
    ///
    /// Path: body → `blob_kzg_commitments` → data root → `[i]`
    #[must_use]
    pub fn blob_commitment_gindex(commitment_index: u64) -> u64 {
        // gindex(blob_kzg_commitments in body) = 16 + 11 = 27
        let commitments_in_body = Self::BLOCK_BODY_BASE_GINDEX + BLOB_KZG_COMMITMENTS_INDEX as u64;
        let element_in_data = (1_u64 << preset::BLOB_KZG_COMMITMENTS_TREE_DEPTH) + commitment_index;

        Self::concat_gindices(&[commitments_in_body, Self::LIST_DATA_GINDEX, element_in_data])
    }

    /// Leaf position of `blob_kzg_commitments[i]` at the bottom of the
    /// inclusion-proof tree rooted at the body root.
    #[must_use]
    pub fn blob_commitment_leaf_index(commitment_index: u64) -> u64 {
        let gindex = Self::blob_commitment_gindex(commitment_index);
        gindex - (1_u64 << Self::gindex_depth(gindex))
    }

    /// Compute gindex for `validators[i].<field>` from the validators list root
    ///
    /// Path: list → data root → `[i]` → field
    #[must_use]
    pub fn validator_field_gindex(validator_index: u64, field_index: u64) -> u64 {
        let element_in_data = (1_u64 << VALIDATOR_REGISTRY_DEPTH) + validator_index;
        let field_in_validator = Self::VALIDATOR_BASE_GINDEX + field_index;

        Self::concat_gindices(&[Self::LIST_DATA_GINDEX, element_in_data, field_in_validator])
    }

    /// Concatenate generalized indices along a path
    ///
    /// Given a sequence of gindices representing a path through nested structures,
    /// compute the final gindex from the outermost root.
    #[must_use]
    pub fn concat_gindices(gindices: &[u64]) -> u64 {
        let mut result = 1_u64; // Start at root

        for &gindex in gindices {
            let depth = Self::gindex_depth(gindex);
            result = (result << depth) | (gindex ^ (1_u64 << depth));
        }

        result
    }

    /// Compute the depth (number of proof elements) for a given gindex
    #[must_use]
    pub const fn gindex_depth(gindex: u64) -> u32 {
        63 - gindex.leading_zeros()
    }

    /// Expected inclusion proof length for a blob commitment
    #[must_use]
    pub fn blob_commitment_proof_length() -> u32 {
        Self::gindex_depth(Self::blob_commitment_gindex(0))
    }

    /// Expected proof length for a validator field against the list root
    #[must_use]
    pub fn validator_field_proof_length() -> u32 {
        Self::gindex_depth(Self::validator_field_gindex(0, 0))
    }
}
