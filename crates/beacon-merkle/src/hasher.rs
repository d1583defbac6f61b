//! Two-to-one compression function
//!
//! Every node of every tree in this crate is `hash(left ‖ right)`. The
//! [`PairHasher`] trait is the single place that function is defined, so the
//! sequential path, the parallel engine and proof verification can never
//! diverge.

use crate::chunk::{Chunk, ZERO_CHUNK};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Maximum supported tree depth.
pub const MAX_TREE_DEPTH: usize = 64;

/// Errors raised while hashing a level of sibling pairs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("Cannot hash an odd number of input chunks ({0})")]
    OddInputLength(usize),

    #[error("Output holds {actual} chunks but {expected} parents are required")]
    OutputLengthMismatch { expected: usize, actual: usize },
}

/// A 2-to-1 compression function over chunks.
pub trait PairHasher: Send + Sync {
    /// Hash two sibling nodes into their parent.
    fn hash_pair(&self, left: &Chunk, right: &Chunk) -> Chunk;

    /// Hash consecutive pairs of `input` into `output`.
    ///
    /// `output[i] = hash_pair(input[2i], input[2i + 1])`.
    ///
    /// # Errors
    /// Fails if `input` has odd length or `output` is not exactly half its size.
    fn hash_pairs(&self, output: &mut [Chunk], input: &[Chunk]) -> Result<(), HashError> {
        check_pair_lengths(output.len(), input.len())?;
        for (parent, pair) in output.iter_mut().zip(input.chunks_exact(2)) {
            *parent = self.hash_pair(&pair[0], &pair[1]);
        }
        Ok(())
    }
}

/// Validate the length contract shared by every `hash_pairs` implementation.
///
/// # Errors
/// See [`PairHasher::hash_pairs`].
pub fn check_pair_lengths(output_len: usize, input_len: usize) -> Result<(), HashError> {
    if input_len % 2 != 0 {
        return Err(HashError::OddInputLength(input_len));
    }
    if output_len != input_len / 2 {
        return Err(HashError::OutputLengthMismatch {
            expected: input_len / 2,
            actual: output_len,
        });
    }
    Ok(())
}

/// SHA-256 of the 64-byte concatenation of two chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl PairHasher for Sha256Hasher {
    fn hash_pair(&self, left: &Chunk, right: &Chunk) -> Chunk {
        let mut hasher = Sha256::new();
        hasher.update(left);
        hasher.update(right);
        hasher.finalize().into()
    }

    fn hash_pairs(&self, output: &mut [Chunk], input: &[Chunk]) -> Result<(), HashError> {
        check_pair_lengths(output.len(), input.len())?;
        let mut hasher = Sha256::new();
        for (parent, pair) in output.iter_mut().zip(input.chunks_exact(2)) {
            hasher.update(pair[0]);
            hasher.update(pair[1]);
            *parent = hasher.finalize_reset().into();
        }
        Ok(())
    }
}

/// Roots of all-zero subtrees for each depth.
///
/// `hashes[0]` is the zero chunk, `hashes[i] = hash(hashes[i-1], hashes[i-1])`.
pub fn zero_hashes<H: PairHasher + ?Sized>(hasher: &H) -> Vec<Chunk> {
    let mut hashes = vec![ZERO_CHUNK; MAX_TREE_DEPTH + 1];
    for i in 1..=MAX_TREE_DEPTH {
        hashes[i] = hasher.hash_pair(&hashes[i - 1], &hashes[i - 1]);
    }
    hashes
}
