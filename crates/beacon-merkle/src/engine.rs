//! Parallel Hash Engine
//!
//! Computes one level of a Merkle tree (the parents of every sibling pair)
//! across a bounded group of workers.
//!
//! # Partitioning
//! For an input of `L` chunks and `W = parallelism - 1` workers, every worker
//! `j` hashes input `[j * 2g, (j + 1) * 2g)` into output `[j * g, (j + 1) * g)`
//! where `g = L / (2 * (W + 1))`. The calling thread hashes everything past the
//! last worker segment. Boundaries depend only on `L` and `W`, so the output
//! never depends on scheduling, and no two workers touch the same output chunk.
//!
//! ```text
//! input:  [--- 2g ---|--- 2g ---| ... |--- 2g ---|---- remainder ----]
//!            worker 0   worker 1        worker W-1     caller
//! output: [-- g --|-- g --| ... |-- g --|-- remainder / 2 --]
//! ```

use crate::chunk::Chunk;
use crate::hasher::{check_pair_lengths, HashError, PairHasher, Sha256Hasher};
use parking_lot::Mutex;
use tracing::trace;

/// Inputs shorter than this are hashed on the calling thread.
pub const DEFAULT_MIN_PARALLELIZATION_SIZE: usize = 5000;

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEngineConfig {
    /// Minimum number of input chunks before work is split across workers.
    pub min_parallelization_size: usize,
    /// Number of execution units available, including the calling thread.
    pub parallelism: usize,
}

impl HashEngineConfig {
    /// A configuration that never spawns workers.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            min_parallelization_size: usize::MAX,
            parallelism: 1,
        }
    }
}

impl Default for HashEngineConfig {
    fn default() -> Self {
        Self {
            min_parallelization_size: DEFAULT_MIN_PARALLELIZATION_SIZE,
            parallelism: detected_parallelism(),
        }
    }
}

/// Host parallelism, falling back to a single unit when it cannot be detected.
#[must_use]
pub fn detected_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

/// Hashes sibling pairs, splitting large levels across scoped workers.
#[derive(Debug, Clone)]
pub struct ParallelHashEngine<H = Sha256Hasher> {
    hasher: H,
    config: HashEngineConfig,
}

impl Default for ParallelHashEngine<Sha256Hasher> {
    fn default() -> Self {
        Self::new(Sha256Hasher, HashEngineConfig::default())
    }
}

impl<H: PairHasher> ParallelHashEngine<H> {
    /// Create an engine around `hasher`.
    pub fn new(hasher: H, config: HashEngineConfig) -> Self {
        Self { hasher, config }
    }

    /// The compression function used for every pair.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// The active configuration.
    pub fn config(&self) -> HashEngineConfig {
        self.config
    }

    /// Number of spawned workers used for inputs above the threshold.
    pub fn workers(&self) -> usize {
        self.config.parallelism.saturating_sub(1)
    }

    /// Hash every consecutive pair of `input` into `output`.
    ///
    /// # Errors
    /// Returns [`HashError::OddInputLength`] for odd-length input and
    /// [`HashError::OutputLengthMismatch`] if `output.len() != input.len() / 2`.
    /// If a worker fails, the first recorded error is returned and the contents
    /// of `output` are unspecified.
    pub fn hash_pairs(&self, output: &mut [Chunk], input: &[Chunk]) -> Result<(), HashError> {
        check_pair_lengths(output.len(), input.len())?;

        let workers = self.workers();
        let group_size = input.len() / workers.saturating_add(1).saturating_mul(2);

        if input.len() < self.config.min_parallelization_size || workers == 0 || group_size == 0 {
            metrics::counter!("hash_engine_levels_total", "path" => "sequential").increment(1);
            return self.hasher.hash_pairs(output, input);
        }

        metrics::counter!("hash_engine_levels_total", "path" => "parallel").increment(1);
        trace!(
            inputs = input.len(),
            workers,
            group_size,
            "Hashing tree level in parallel"
        );

        let (worker_output, caller_output) = output.split_at_mut(workers * group_size);
        let (worker_input, caller_input) = input.split_at(workers * 2 * group_size);

        let hasher = &self.hasher;
        let first_error: Mutex<Option<HashError>> = Mutex::new(None);
        let record = |err: HashError| {
            let mut slot = first_error.lock();
            if slot.is_none() {
                *slot = Some(err);
            }
        };

        rayon::scope(|scope| {
            for (out, inp) in worker_output
                .chunks_mut(group_size)
                .zip(worker_input.chunks(2 * group_size))
            {
                let record = &record;
                scope.spawn(move |_| {
                    if let Err(err) = hasher.hash_pairs(out, inp) {
                        record(err);
                    }
                });
            }

            if let Err(err) = hasher.hash_pairs(caller_output, caller_input) {
                record(err);
            }
        });

        match first_error.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ZERO_CHUNK;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn leaves(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| {
                let mut c = ZERO_CHUNK;
                c[..8].copy_from_slice(&(i as u64).to_le_bytes());
                c
            })
            .collect()
    }

    fn engine(min: usize, parallelism: usize) -> ParallelHashEngine {
        ParallelHashEngine::new(
            Sha256Hasher,
            HashEngineConfig {
                min_parallelization_size: min,
                parallelism,
            },
        )
    }

    /// Fails whenever it is asked to hash a pair whose left chunk starts with 0xff.
    struct PoisonHasher;

    impl PairHasher for PoisonHasher {
        fn hash_pair(&self, left: &Chunk, right: &Chunk) -> Chunk {
            Sha256Hasher.hash_pair(left, right)
        }

        fn hash_pairs(&self, output: &mut [Chunk], input: &[Chunk]) -> Result<(), HashError> {
            if input.iter().step_by(2).any(|c| c[0] == 0xff) {
                return Err(HashError::OddInputLength(usize::MAX));
            }
            Sha256Hasher.hash_pairs(output, input)
        }
    }

    struct CountingHasher(AtomicUsize);

    impl PairHasher for CountingHasher {
        fn hash_pair(&self, left: &Chunk, right: &Chunk) -> Chunk {
            self.0.fetch_add(1, Ordering::Relaxed);
            Sha256Hasher.hash_pair(left, right)
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let input = leaves(10_000);

        let mut sequential = vec![ZERO_CHUNK; 5_000];
        engine(usize::MAX, 1)
            .hash_pairs(&mut sequential, &input)
            .unwrap();

        for parallelism in [2, 3, 4, 7, 16] {
            let mut parallel = vec![ZERO_CHUNK; 5_000];
            engine(2, parallelism)
                .hash_pairs(&mut parallel, &input)
                .unwrap();
            assert_eq!(parallel, sequential, "parallelism {parallelism} diverged");
        }
    }

    #[test]
    fn test_remainder_handled_by_caller() {
        // 3 units -> 2 workers, group size = 22 / 6 = 3 pairs, caller takes 5 pairs
        let input = leaves(22);
        let mut expected = vec![ZERO_CHUNK; 11];
        Sha256Hasher.hash_pairs(&mut expected, &input).unwrap();

        let mut output = vec![ZERO_CHUNK; 11];
        engine(2, 3).hash_pairs(&mut output, &input).unwrap();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_odd_length_rejected_on_both_paths() {
        for len in [1usize, 3, 4999, 5001] {
            let input = leaves(len);
            let mut output = vec![ZERO_CHUNK; len / 2];
            assert_eq!(
                ParallelHashEngine::<Sha256Hasher>::default().hash_pairs(&mut output, &input),
                Err(HashError::OddInputLength(len))
            );
            assert_eq!(
                engine(2, 8).hash_pairs(&mut output, &input),
                Err(HashError::OddInputLength(len))
            );
        }
    }

    #[test]
    fn test_empty_input_is_a_no_op() {
        let mut output: Vec<Chunk> = vec![];
        engine(0, 4).hash_pairs(&mut output, &[]).unwrap();
    }

    #[test]
    fn test_single_unit_stays_on_caller() {
        let counter = CountingHasher(AtomicUsize::new(0));
        let engine = ParallelHashEngine::new(
            counter,
            HashEngineConfig {
                min_parallelization_size: 0,
                parallelism: 1,
            },
        );
        assert_eq!(engine.workers(), 0);

        let input = leaves(64);
        let mut output = vec![ZERO_CHUNK; 32];
        engine.hash_pairs(&mut output, &input).unwrap();
        assert_eq!(engine.hasher().0.load(Ordering::Relaxed), 32);
    }

    #[test]
    fn test_worker_failure_surfaces() {
        let mut input = leaves(64);
        // first pair of worker 1's segment (4 units -> group size 8 pairs)
        input[16][0] = 0xff;

        let engine = ParallelHashEngine::new(
            PoisonHasher,
            HashEngineConfig {
                min_parallelization_size: 2,
                parallelism: 4,
            },
        );
        let mut output = vec![ZERO_CHUNK; 32];
        assert!(engine.hash_pairs(&mut output, &input).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = HashEngineConfig::default();
        assert_eq!(config.min_parallelization_size, 5000);
        assert!(config.parallelism >= 1);
    }
}
