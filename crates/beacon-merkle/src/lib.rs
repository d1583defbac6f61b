//! # Beacon Merkle
//!
//! State-commitment core for beacon-chain records:
//! - SSZ merkleization of validators, block headers and slashing records
//! - a parallel level-hashing engine for large trees
//! - inclusion proofs for `blob_kzg_commitments[i]` and `validators[i].<field>`
//! - blob sidecar validation against a block's committed body root

pub mod beacon_client;
pub mod body;
pub mod chunk;
pub mod codec;
pub mod engine;
pub mod gindex;
pub mod hasher;
pub mod merkle;
pub mod proof;
pub mod registry;
pub mod sidecar;
pub mod types;
pub mod validator;

pub use beacon_client::{BeaconClient, BeaconClientError};
pub use body::{BlockBodyProver, BodyError};
pub use chunk::{Chunk, Root, ZERO_CHUNK};
pub use codec::LeafCodec;
pub use engine::{HashEngineConfig, ParallelHashEngine};
pub use gindex::GindexCalculator;
pub use hasher::{HashError, PairHasher, Sha256Hasher};
pub use merkle::{MerkleError, MerkleTree, Merkleizer};
pub use proof::{verify_inclusion_proof, verify_merkle_proof, InclusionProof, ProofError};
pub use registry::{RegistryError, ValidatorRegistry};
pub use sidecar::{BlobSidecar, BlobSidecars, SidecarError};
pub use types::*;
pub use validator::{
    compute_effective_balance, Validator, ValidatorError, ValidatorField, ValidatorStatus,
};
