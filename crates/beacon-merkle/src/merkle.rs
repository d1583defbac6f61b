//! Merkleization
//!
//! Reduces an ordered sequence of chunks to a single root by hashing level by
//! level through the [`ParallelHashEngine`].
//!
//! # Padding
//! [`Merkleizer::merkleize`] pads to the next power of two with zero chunks.
//! [`Merkleizer::merkleize_with_limit`] and [`Merkleizer::build_tree`] pad
//! *virtually*: leaves past the populated region are never allocated, their
//! subtree roots come from the precomputed zero-hash table. This keeps a
//! `List<Validator, 2^40>` tractable.
//!
//! Lengths are never implied by padding. Variable-length collections must call
//! [`Merkleizer::mix_in_length`] on the data root explicitly.

use crate::chunk::{chunk_from_u64, Chunk, Root, ZERO_CHUNK};
use crate::codec::LeafCodec;
use crate::engine::{HashEngineConfig, ParallelHashEngine};
use crate::hasher::{zero_hashes, HashError, PairHasher, Sha256Hasher, MAX_TREE_DEPTH};
use thiserror::Error;

/// Errors that can occur during merkleization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("Tree level of {0} nodes cannot be paired")]
    OddLeafCount(usize),

    #[error("{actual} chunks exceed the limit of {limit}")]
    InputExceedsLimit { limit: usize, actual: usize },

    #[error("Tree depth {0} exceeds the maximum of 64")]
    TreeTooDeep(u32),

    #[error("Leaf index {index} out of range for depth {depth}")]
    LeafIndexOutOfRange { index: u64, depth: u32 },

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Builds Merkle roots and trees over chunk sequences.
#[derive(Debug, Clone)]
pub struct Merkleizer<H = Sha256Hasher> {
    engine: ParallelHashEngine<H>,
    zero_hashes: Vec<Chunk>,
}

impl Default for Merkleizer<Sha256Hasher> {
    fn default() -> Self {
        Self::new(ParallelHashEngine::default())
    }
}

impl Merkleizer<Sha256Hasher> {
    /// SHA-256 merkleizer with the given engine configuration.
    #[must_use]
    pub fn with_config(config: HashEngineConfig) -> Self {
        Self::new(ParallelHashEngine::new(Sha256Hasher, config))
    }
}

impl<H: PairHasher> Merkleizer<H> {
    /// Create a merkleizer that hashes every level through `engine`.
    pub fn new(engine: ParallelHashEngine<H>) -> Self {
        let zero_hashes = zero_hashes(engine.hasher());
        Self {
            engine,
            zero_hashes,
        }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &ParallelHashEngine<H> {
        &self.engine
    }

    /// The compression function.
    pub fn hasher(&self) -> &H {
        self.engine.hasher()
    }

    /// Root of an all-zero subtree of the given depth.
    ///
    /// # Errors
    /// Returns [`MerkleError::TreeTooDeep`] past depth 64.
    pub fn zero_hash(&self, depth: u32) -> Result<Chunk, MerkleError> {
        self.zero_hashes
            .get(depth as usize)
            .copied()
            .ok_or(MerkleError::TreeTooDeep(depth))
    }

    /// Merkleize `chunks`, padding with zero chunks to the next power of two.
    ///
    /// An empty sequence merkleizes to the zero chunk and a single chunk is its
    /// own root.
    ///
    /// # Errors
    /// Only fails if a level hands the engine an odd node count, which padding
    /// rules out.
    pub fn merkleize(&self, chunks: &[Chunk]) -> Result<Root, MerkleError> {
        match chunks.len() {
            0 => return Ok(ZERO_CHUNK),
            1 => return Ok(chunks[0]),
            _ => {}
        }

        let mut layer = chunks.to_vec();
        layer.resize(chunks.len().next_power_of_two(), ZERO_CHUNK);

        while layer.len() > 1 {
            if layer.len() % 2 != 0 {
                return Err(MerkleError::OddLeafCount(layer.len()));
            }
            let mut parents = vec![ZERO_CHUNK; layer.len() / 2];
            self.engine.hash_pairs(&mut parents, &layer)?;
            layer = parents;
        }

        Ok(layer[0])
    }

    /// Merkleize `chunks` as the bottom of a tree with room for `limit` chunks.
    ///
    /// # Errors
    /// Returns [`MerkleError::InputExceedsLimit`] if there are more chunks than
    /// the limit allows, and [`MerkleError::TreeTooDeep`] if the limit has no
    /// power of two in `usize`.
    pub fn merkleize_with_limit(
        &self,
        chunks: &[Chunk],
        limit: usize,
    ) -> Result<Root, MerkleError> {
        if chunks.len() > limit {
            return Err(MerkleError::InputExceedsLimit {
                limit,
                actual: chunks.len(),
            });
        }

        let depth = limit
            .checked_next_power_of_two()
            .ok_or(MerkleError::TreeTooDeep(usize::BITS))?
            .trailing_zeros();
        let populated_depth = chunks.len().next_power_of_two().trailing_zeros();

        let mut root = self.merkleize(chunks)?;
        for level in populated_depth..depth {
            root = self.hasher().hash_pair(&root, &self.zero_hash(level)?);
        }
        Ok(root)
    }

    /// `hash(root, length)` for variable-length collections.
    pub fn mix_in_length(&self, root: &Root, length: usize) -> Root {
        self.hasher()
            .hash_pair(root, &chunk_from_u64(length as u64))
    }

    /// Root of a record's field chunks as produced by its [`LeafCodec`].
    ///
    /// # Errors
    /// See [`Merkleizer::merkleize`].
    pub fn hash_tree_root<T: LeafCodec + ?Sized>(&self, value: &T) -> Result<Root, MerkleError> {
        self.merkleize(&value.encode_fields(self.hasher()))
    }

    /// Build a tree of fixed `depth` over `leaves` and keep every level for
    /// proof generation.
    ///
    /// # Errors
    /// Fails if `depth` exceeds 64 or `leaves` do not fit in `2^depth` slots.
    pub fn build_tree(&self, leaves: &[Chunk], depth: u32) -> Result<MerkleTree, MerkleError> {
        if depth as usize > MAX_TREE_DEPTH {
            return Err(MerkleError::TreeTooDeep(depth));
        }
        if depth < usize::BITS && leaves.len() > 1usize << depth {
            return Err(MerkleError::InputExceedsLimit {
                limit: 1usize << depth,
                actual: leaves.len(),
            });
        }

        let mut layers = Vec::with_capacity(depth as usize + 1);
        layers.push(leaves.to_vec());

        for level in 0..depth {
            let current: &[Chunk] = &layers[level as usize];
            let padded;
            let input = if current.len() % 2 == 0 {
                current
            } else {
                padded = [current, &[self.zero_hash(level)?]].concat();
                padded.as_slice()
            };
            let mut parents = vec![ZERO_CHUNK; input.len() / 2];
            self.engine.hash_pairs(&mut parents, input)?;
            layers.push(parents);
        }

        let root = match layers.last().and_then(|top| top.first()) {
            Some(root) => *root,
            None => self.zero_hash(depth)?,
        };

        Ok(MerkleTree {
            layers,
            zero_hashes: self.zero_hashes[..=depth as usize].to_vec(),
            depth,
            root,
        })
    }
}

/// A Merkle tree with every populated level retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    layers: Vec<Vec<Chunk>>,
    zero_hashes: Vec<Chunk>,
    depth: u32,
    root: Root,
}

impl MerkleTree {
    /// Root of the tree.
    #[must_use]
    pub fn root(&self) -> Root {
        self.root
    }

    /// Number of levels between the leaves and the root.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Populated leaves (excluding virtual padding).
    #[must_use]
    pub fn leaves(&self) -> &[Chunk] {
        self.layers.first().map_or(&[], Vec::as_slice)
    }

    /// Sibling path from leaf `index` up to (not including) the root.
    ///
    /// # Errors
    /// Returns [`MerkleError::LeafIndexOutOfRange`] if `index >= 2^depth`.
    pub fn proof(&self, index: u64) -> Result<Vec<Chunk>, MerkleError> {
        if self.depth < u64::BITS && index >> self.depth != 0 {
            return Err(MerkleError::LeafIndexOutOfRange {
                index,
                depth: self.depth,
            });
        }

        let proof = (0..self.depth)
            .map(|level| {
                let sibling = (index >> level) ^ 1;
                usize::try_from(sibling)
                    .ok()
                    .and_then(|pos| self.layers[level as usize].get(pos))
                    .copied()
                    .unwrap_or(self.zero_hashes[level as usize])
            })
            .collect();

        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::verify_merkle_proof;
    use proptest::prelude::*;

    fn chunk(i: u8) -> Chunk {
        [i; 32]
    }

    fn parallel() -> Merkleizer {
        Merkleizer::with_config(HashEngineConfig {
            min_parallelization_size: 2,
            parallelism: 4,
        })
    }

    fn sequential() -> Merkleizer {
        Merkleizer::with_config(HashEngineConfig::sequential())
    }

    #[test]
    fn test_empty_is_zero_chunk() {
        assert_eq!(sequential().merkleize(&[]).unwrap(), ZERO_CHUNK);
    }

    #[test]
    fn test_single_leaf_identity() {
        let c = chunk(7);
        assert_eq!(sequential().merkleize(&[c]).unwrap(), c);
    }

    #[test]
    fn test_two_leaves() {
        let m = sequential();
        let root = m.merkleize(&[chunk(1), chunk(2)]).unwrap();
        assert_eq!(root, m.hasher().hash_pair(&chunk(1), &chunk(2)));
    }

    #[test]
    fn test_power_of_two_padding() {
        let m = sequential();
        let three = [chunk(1), chunk(2), chunk(3)];
        let four = [chunk(1), chunk(2), chunk(3), ZERO_CHUNK];
        assert_eq!(m.merkleize(&three).unwrap(), m.merkleize(&four).unwrap());
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let leaves: Vec<Chunk> = (0..1000u32)
            .map(|i| chunk_from_u64(u64::from(i) * 7919))
            .collect();
        assert_eq!(
            parallel().merkleize(&leaves).unwrap(),
            sequential().merkleize(&leaves).unwrap()
        );
    }

    #[test]
    fn test_limit_extends_with_zero_subtrees() {
        let m = sequential();
        let leaves = [chunk(1), chunk(2), chunk(3)];
        let mut padded = leaves.to_vec();
        padded.resize(16, ZERO_CHUNK);

        assert_eq!(
            m.merkleize_with_limit(&leaves, 16).unwrap(),
            m.merkleize(&padded).unwrap()
        );
        // non power-of-two limit rounds up
        assert_eq!(
            m.merkleize_with_limit(&leaves, 9).unwrap(),
            m.merkleize(&padded).unwrap()
        );
    }

    #[test]
    fn test_limit_empty_is_zero_hash() {
        let m = sequential();
        assert_eq!(
            m.merkleize_with_limit(&[], 8).unwrap(),
            m.zero_hash(3).unwrap()
        );
    }

    #[test]
    fn test_limit_exceeded() {
        let err = sequential()
            .merkleize_with_limit(&[chunk(1), chunk(2)], 1)
            .unwrap_err();
        assert_eq!(
            err,
            MerkleError::InputExceedsLimit {
                limit: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn test_limit_beyond_usize_power_of_two() {
        assert!(matches!(
            sequential().merkleize_with_limit(&[], usize::MAX),
            Err(MerkleError::TreeTooDeep(_))
        ));
        assert!(sequential()
            .merkleize_with_limit(&[chunk(1)], 1usize << (usize::BITS - 1))
            .is_ok());
    }

    #[test]
    fn test_mix_in_length() {
        let m = sequential();
        let root = chunk(9);
        let mut length = ZERO_CHUNK;
        length[0] = 3;
        assert_eq!(m.mix_in_length(&root, 3), m.hasher().hash_pair(&root, &length));
    }

    #[test]
    fn test_build_tree_root_matches_merkleize() {
        let m = parallel();
        let leaves: Vec<Chunk> = (0..5u8).map(chunk).collect();

        let tree = m.build_tree(&leaves, 3).unwrap();
        assert_eq!(tree.root(), m.merkleize(&leaves).unwrap());
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.leaves(), leaves.as_slice());

        let deep = m.build_tree(&leaves, 10).unwrap();
        assert_eq!(deep.root(), m.merkleize_with_limit(&leaves, 1024).unwrap());
    }

    #[test]
    fn test_build_tree_empty() {
        let m = sequential();
        let tree = m.build_tree(&[], 5).unwrap();
        assert_eq!(tree.root(), m.zero_hash(5).unwrap());
    }

    #[test]
    fn test_build_tree_depth_zero() {
        let tree = sequential().build_tree(&[chunk(4)], 0).unwrap();
        assert_eq!(tree.root(), chunk(4));
        assert!(tree.proof(0).unwrap().is_empty());
    }

    #[test]
    fn test_build_tree_rejects_overflow() {
        assert!(matches!(
            sequential().build_tree(&[chunk(1), chunk(2), chunk(3)], 1),
            Err(MerkleError::InputExceedsLimit { .. })
        ));
        assert!(matches!(
            sequential().build_tree(&[], 65),
            Err(MerkleError::TreeTooDeep(65))
        ));
    }

    #[test]
    fn test_proof_siblings() {
        let m = sequential();
        let leaves = [chunk(1), chunk(2), chunk(3)];
        let tree = m.build_tree(&leaves, 2).unwrap();

        let proof = tree.proof(0).unwrap();
        assert_eq!(proof.len(), 2);
        assert_eq!(proof[0], chunk(2));
        assert_eq!(proof[1], m.hasher().hash_pair(&chunk(3), &ZERO_CHUNK));
    }

    #[test]
    fn test_sparse_proof_uses_zero_hashes() {
        let m = sequential();
        let tree = m.build_tree(&[chunk(0xaa), chunk(0xbb)], 20).unwrap();
        let proof = tree.proof(0).unwrap();

        assert_eq!(proof.len(), 20);
        assert_eq!(proof[0], chunk(0xbb));
        for (level, sibling) in proof.iter().enumerate().skip(1) {
            assert_eq!(*sibling, m.zero_hash(level as u32).unwrap());
        }
    }

    #[test]
    fn test_every_proof_verifies() {
        let m = parallel();
        let leaves: Vec<Chunk> = (0..13u8).map(chunk).collect();
        let tree = m.build_tree(&leaves, 4).unwrap();

        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.proof(i as u64).unwrap();
            assert!(verify_merkle_proof(
                m.hasher(),
                leaf,
                i as u64,
                &proof,
                &tree.root(),
                4
            ));
        }
    }

    #[test]
    fn test_proof_index_out_of_range() {
        let tree = sequential().build_tree(&[chunk(1)], 2).unwrap();
        assert_eq!(
            tree.proof(4),
            Err(MerkleError::LeafIndexOutOfRange { index: 4, depth: 2 })
        );
    }

    proptest! {
        #[test]
        fn prop_root_independent_of_parallelism(
            leaves in prop::collection::vec(any::<[u8; 32]>(), 0..300),
            parallelism in 1usize..9,
        ) {
            let forced = Merkleizer::with_config(HashEngineConfig {
                min_parallelization_size: 0,
                parallelism,
            });
            prop_assert_eq!(
                forced.merkleize(&leaves).unwrap(),
                sequential().merkleize(&leaves).unwrap()
            );
        }

        #[test]
        fn prop_zero_padding_is_invisible(
            leaves in prop::collection::vec(any::<[u8; 32]>(), 1..64),
        ) {
            let m = sequential();
            let mut padded = leaves.clone();
            padded.resize(leaves.len().next_power_of_two(), ZERO_CHUNK);
            prop_assert_eq!(m.merkleize(&leaves).unwrap(), m.merkleize(&padded).unwrap());
        }
    }
}
