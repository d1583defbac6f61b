//! Leaf Codec
//!
//! Turns a fixed-schema record into the ordered chunk sequence the
//! [`Merkleizer`](crate::merkle::Merkleizer) hashes. One chunk per field, in
//! declaration order. Fields wider than a chunk (BLS pubkeys) are packed and
//! reduced to their own sub-root first, which is why the hasher is passed in.

use crate::chunk::{chunk_from_bool, chunk_from_u64, pack_bytes, Chunk};
use crate::hasher::PairHasher;
use crate::types::{BeaconBlockHeader, SlashingInfo};
use crate::validator::Validator;

/// Encodes a record's fields as chunks.
pub trait LeafCodec {
    /// Field chunks in protocol order.
    fn encode_fields<H: PairHasher + ?Sized>(&self, hasher: &H) -> Vec<Chunk>;
}

/// Root of a 48-byte value packed into two chunks.
pub fn hash_bytes48<H: PairHasher + ?Sized>(hasher: &H, bytes: &[u8; 48]) -> Chunk {
    let packed = pack_bytes(bytes);
    hasher.hash_pair(&packed[0], &packed[1])
}

impl LeafCodec for Validator {
    fn encode_fields<H: PairHasher + ?Sized>(&self, hasher: &H) -> Vec<Chunk> {
        vec![
            hash_bytes48(hasher, &self.pubkey),
            self.withdrawal_credentials,
            chunk_from_u64(self.effective_balance),
            chunk_from_bool(self.slashed),
            chunk_from_u64(self.activation_eligibility_epoch),
            chunk_from_u64(self.activation_epoch),
            chunk_from_u64(self.exit_epoch),
            chunk_from_u64(self.withdrawable_epoch),
        ]
    }
}

impl LeafCodec for BeaconBlockHeader {
    fn encode_fields<H: PairHasher + ?Sized>(&self, _hasher: &H) -> Vec<Chunk> {
        vec![
            chunk_from_u64(self.slot),
            chunk_from_u64(self.proposer_index),
            self.parent_root,
            self.state_root,
            self.body_root,
        ]
    }
}

impl LeafCodec for SlashingInfo {
    fn encode_fields<H: PairHasher + ?Sized>(&self, _hasher: &H) -> Vec<Chunk> {
        vec![chunk_from_u64(self.slot), chunk_from_u64(self.index)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ZERO_CHUNK;
    use crate::hasher::Sha256Hasher;
    use crate::types::{BLOCK_HEADER_FIELD_COUNT, FAR_FUTURE_EPOCH, VALIDATOR_FIELD_COUNT};

    #[test]
    fn test_validator_field_order() {
        let mut validator = Validator::from_deposit([0x11; 48], [0x22; 32], 32_000_000_000);
        validator.slashed = true;
        validator.activation_epoch = 5;

        let fields = validator.encode_fields(&Sha256Hasher);
        assert_eq!(fields.len(), VALIDATOR_FIELD_COUNT);
        assert_eq!(fields[1], [0x22; 32]);
        assert_eq!(fields[2], chunk_from_u64(32_000_000_000));
        assert_eq!(fields[3], chunk_from_bool(true));
        assert_eq!(fields[5], chunk_from_u64(5));
        assert_eq!(fields[7], chunk_from_u64(FAR_FUTURE_EPOCH));
    }

    #[test]
    fn test_pubkey_root() {
        let pubkey = [0xaa; 48];
        let mut second = ZERO_CHUNK;
        second[..16].copy_from_slice(&[0xaa; 16]);
        assert_eq!(
            hash_bytes48(&Sha256Hasher, &pubkey),
            Sha256Hasher.hash_pair(&[0xaa; 32], &second)
        );
    }

    #[test]
    fn test_header_fields() {
        let header = BeaconBlockHeader {
            slot: 7,
            proposer_index: 9,
            parent_root: [1; 32],
            state_root: [2; 32],
            body_root: [3; 32],
        };
        let fields = header.encode_fields(&Sha256Hasher);
        assert_eq!(fields.len(), BLOCK_HEADER_FIELD_COUNT);
        assert_eq!(fields[0], chunk_from_u64(7));
        assert_eq!(fields[4], [3; 32]);
    }

    #[test]
    fn test_slashing_info_fields() {
        let info = SlashingInfo {
            slot: 12345,
            index: 67890,
        };
        assert_eq!(
            info.encode_fields(&Sha256Hasher),
            vec![chunk_from_u64(12345), chunk_from_u64(67890)]
        );
    }
}
