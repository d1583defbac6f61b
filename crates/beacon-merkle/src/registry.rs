//! Validator Registry
//!
//! Index-keyed list of validators, merkleized as
//! `List[Validator, VALIDATOR_REGISTRY_LIMIT]`.
//!
//! # Approach
//! Element roots are computed for the whole registry at once: every
//! validator's 8 field chunks are laid out back to back and the buffer is
//! reduced three times through the engine. Each validator occupies an aligned
//! block of 8, so pairs never straddle two validators and a large registry
//! takes the parallel path on every level.
//!
//! The 2^40-leaf data tree is never allocated; padding above the populated
//! region comes from the zero-hash table.

use crate::chunk::{chunk_from_u64, Chunk, Root, ZERO_CHUNK};
use crate::codec::LeafCodec;
use crate::gindex::GindexCalculator;
use crate::hasher::PairHasher;
use crate::merkle::{MerkleError, Merkleizer};
use crate::proof::InclusionProof;
use crate::types::{
    BlsPubkey, Epoch, Gwei, ValidatorIndex, WithdrawalCredentials, VALIDATOR_FIELD_COUNT,
    VALIDATOR_REGISTRY_DEPTH, VALIDATOR_REGISTRY_LIMIT, VALIDATOR_TREE_DEPTH,
};
use crate::validator::{Validator, ValidatorError, ValidatorField, ValidatorStatus};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Validator index {0} out of bounds (len {1})")]
    ValidatorIndexOutOfBounds(ValidatorIndex, usize),

    #[error("Validator registry is full")]
    RegistryFull,

    #[error(transparent)]
    Status(#[from] ValidatorError),

    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

/// Validators keyed by their position in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorRegistry {
    validators: Vec<Validator>,
}

impl ValidatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validator and return its index.
    ///
    /// # Errors
    /// Returns [`RegistryError::RegistryFull`] at `VALIDATOR_REGISTRY_LIMIT`.
    pub fn push(&mut self, validator: Validator) -> Result<ValidatorIndex, RegistryError> {
        if self.validators.len() >= VALIDATOR_REGISTRY_LIMIT {
            return Err(RegistryError::RegistryFull);
        }
        let index = self.validators.len() as ValidatorIndex;
        self.validators.push(validator);
        Ok(index)
    }

    /// Register a new validator from a deposit.
    ///
    /// # Errors
    /// See [`ValidatorRegistry::push`].
    pub fn add_deposit(
        &mut self,
        pubkey: BlsPubkey,
        withdrawal_credentials: WithdrawalCredentials,
        amount: Gwei,
    ) -> Result<ValidatorIndex, RegistryError> {
        self.push(Validator::from_deposit(pubkey, withdrawal_credentials, amount))
    }

    #[must_use]
    pub fn get(&self, index: ValidatorIndex) -> Option<&Validator> {
        usize::try_from(index).ok().and_then(|i| self.validators.get(i))
    }

    pub fn get_mut(&mut self, index: ValidatorIndex) -> Option<&mut Validator> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.validators.get_mut(i))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter()
    }

    /// Status of every validator at `epoch`, in index order.
    ///
    /// # Errors
    /// Fails on the first validator whose epochs are inconsistent.
    pub fn statuses(&self, epoch: Epoch) -> Result<Vec<ValidatorStatus>, RegistryError> {
        self.validators
            .iter()
            .map(|v| v.status(epoch).map_err(RegistryError::from))
            .collect()
    }

    /// Root of every validator, in index order.
    ///
    /// # Errors
    /// Propagates engine failures.
    pub fn element_roots<H: PairHasher>(
        &self,
        merkleizer: &Merkleizer<H>,
    ) -> Result<Vec<Root>, RegistryError> {
        let hasher = merkleizer.hasher();
        let mut layer: Vec<Chunk> =
            Vec::with_capacity(self.validators.len() * VALIDATOR_FIELD_COUNT);
        for validator in &self.validators {
            layer.extend(validator.encode_fields(hasher));
        }

        debug!(
            validators = self.validators.len(),
            chunks = layer.len(),
            "Hashing validator element roots"
        );

        for _ in 0..VALIDATOR_TREE_DEPTH {
            let mut parents = vec![ZERO_CHUNK; layer.len() / 2];
            merkleizer
                .engine()
                .hash_pairs(&mut parents, &layer)
                .map_err(MerkleError::from)?;
            layer = parents;
        }

        Ok(layer)
    }

    /// `hash_tree_root` of the registry as an SSZ list.
    ///
    /// # Errors
    /// Propagates engine failures.
    pub fn hash_tree_root<H: PairHasher>(
        &self,
        merkleizer: &Merkleizer<H>,
    ) -> Result<Root, RegistryError> {
        let elements = self.element_roots(merkleizer)?;
        let data_root = merkleizer.merkleize_with_limit(&elements, VALIDATOR_REGISTRY_LIMIT)?;
        Ok(merkleizer.mix_in_length(&data_root, self.validators.len()))
    }

    /// Proof of `validators[index].<field>` against [`Self::hash_tree_root`].
    ///
    /// Path: field → validator root → data root → list root (length mix-in).
    ///
    /// # Errors
    /// Returns [`RegistryError::ValidatorIndexOutOfBounds`] for an unknown index.
    pub fn prove_field<H: PairHasher>(
        &self,
        merkleizer: &Merkleizer<H>,
        index: ValidatorIndex,
        field: ValidatorField,
    ) -> Result<InclusionProof, RegistryError> {
        let validator = self
            .get(index)
            .ok_or(RegistryError::ValidatorIndexOutOfBounds(index, self.len()))?;

        let field_index = field.index() as u64;
        let fields = validator.encode_fields(merkleizer.hasher());
        let field_tree = merkleizer.build_tree(&fields, VALIDATOR_TREE_DEPTH)?;

        let elements = self.element_roots(merkleizer)?;
        let data_tree = merkleizer.build_tree(&elements, VALIDATOR_REGISTRY_DEPTH)?;

        let mut branch = field_tree.proof(field_index)?;
        branch.extend(data_tree.proof(index)?);
        branch.push(chunk_from_u64(self.validators.len() as u64));

        let gindex = GindexCalculator::validator_field_gindex(index, field_index);
        let depth = GindexCalculator::gindex_depth(gindex);

        Ok(InclusionProof {
            leaf: fields[field.index()],
            index: gindex - (1_u64 << depth),
            branch,
        })
    }
}

impl From<Vec<Validator>> for ValidatorRegistry {
    fn from(validators: Vec<Validator>) -> Self {
        Self { validators }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HashEngineConfig;
    use crate::types::FAR_FUTURE_EPOCH;

    fn registry(n: u8) -> ValidatorRegistry {
        let mut registry = ValidatorRegistry::new();
        for i in 0..n {
            let mut creds = [0u8; 32];
            creds[0] = 0x01;
            creds[31] = i;
            let index = registry
                .add_deposit([i; 48], creds, 32_000_000_000 + u64::from(i))
                .unwrap();
            assert_eq!(index, u64::from(i));
        }
        registry
    }

    fn sequential() -> Merkleizer {
        Merkleizer::with_config(HashEngineConfig::sequential())
    }

    #[test]
    fn test_push_and_get() {
        let mut registry = registry(3);
        assert_eq!(registry.len(), 3);
        assert!(registry.get(3).is_none());
        assert!(registry.get(u64::MAX).is_none());

        registry.get_mut(1).unwrap().activation_epoch = 7;
        assert_eq!(registry.get(1).unwrap().activation_epoch, 7);
    }

    #[test]
    fn test_statuses() {
        let mut registry = registry(2);
        let validator = registry.get_mut(0).unwrap();
        validator.activation_eligibility_epoch = 0;
        validator.activation_epoch = 1;

        assert_eq!(
            registry.statuses(5).unwrap(),
            vec![
                ValidatorStatus::ActiveOngoing,
                ValidatorStatus::PendingInitialized
            ]
        );
    }

    #[test]
    fn test_element_roots_match_per_validator_roots() {
        let registry = registry(5);
        let merkleizer = sequential();
        let roots = registry.element_roots(&merkleizer).unwrap();

        for (validator, root) in registry.iter().zip(&roots) {
            assert_eq!(*root, merkleizer.hash_tree_root(validator).unwrap());
        }
    }

    #[test]
    fn test_large_registry_parallel_matches_sequential() {
        let mut big = ValidatorRegistry::new();
        for i in 0..1000u32 {
            let mut pubkey = [0u8; 48];
            pubkey[..4].copy_from_slice(&i.to_le_bytes());
            big.add_deposit(pubkey, [0; 32], u64::from(i) * 1_000_000_000)
                .unwrap();
        }

        let parallel = Merkleizer::with_config(HashEngineConfig {
            min_parallelization_size: 5000,
            parallelism: 4,
        });
        assert_eq!(
            big.hash_tree_root(&parallel).unwrap(),
            big.hash_tree_root(&sequential()).unwrap()
        );
    }

    #[test]
    fn test_empty_registry_root() {
        let merkleizer = sequential();
        let root = ValidatorRegistry::new().hash_tree_root(&merkleizer).unwrap();
        let expected = merkleizer.mix_in_length(&merkleizer.zero_hash(40).unwrap(), 0);
        assert_eq!(root, expected);
    }

    #[test]
    fn test_prove_field_verifies() {
        let registry = registry(6);
        let merkleizer = sequential();
        let root = registry.hash_tree_root(&merkleizer).unwrap();

        for field in [
            ValidatorField::Pubkey,
            ValidatorField::WithdrawalCredentials,
            ValidatorField::ActivationEpoch,
            ValidatorField::WithdrawableEpoch,
        ] {
            let proof = registry.prove_field(&merkleizer, 4, field).unwrap();
            assert_eq!(
                proof.branch.len(),
                GindexCalculator::validator_field_proof_length() as usize
            );
            proof
                .verify(merkleizer.hasher(), &root, proof.branch.len())
                .unwrap();
        }

        let proof = registry
            .prove_field(&merkleizer, 2, ValidatorField::ExitEpoch)
            .unwrap();
        assert_eq!(proof.leaf, chunk_from_u64(FAR_FUTURE_EPOCH));
        assert_eq!(proof.index, 2 * 8 + 6);
    }

    #[test]
    fn test_prove_field_unknown_index() {
        assert_eq!(
            registry(1).prove_field(&sequential(), 1, ValidatorField::Slashed),
            Err(RegistryError::ValidatorIndexOutOfBounds(1, 1))
        );
    }
}
