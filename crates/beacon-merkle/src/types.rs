//! Beacon Chain Types
//!
//! Consensus constants and the fixed-schema records committed to by block
//! and state roots.

use crate::chunk::Root;
use serde::{Deserialize, Serialize};

/// Preset constants - only one feature should be active
#[cfg(all(feature = "mainnet", not(feature = "minimal")))]
pub mod preset {
    pub const NAME: &str = "mainnet";
    /// Maximum blob commitments a block body may carry
    pub const MAX_BLOB_COMMITMENTS_PER_BLOCK: usize = 4096;
    /// Depth of the `blob_kzg_commitments` data tree (2^12 = 4096)
    pub const BLOB_KZG_COMMITMENTS_TREE_DEPTH: u32 = 12;
    /// Body depth (4) + length mix-in (1) + commitments tree depth (12)
    pub const KZG_COMMITMENT_INCLUSION_PROOF_DEPTH: usize = 17;
    /// Slots per epoch on mainnet
    pub const SLOTS_PER_EPOCH: u64 = 32;
}

#[cfg(feature = "minimal")]
pub mod preset {
    pub const NAME: &str = "minimal";
    /// Maximum blob commitments for the minimal preset
    pub const MAX_BLOB_COMMITMENTS_PER_BLOCK: usize = 16;
    /// Depth of the `blob_kzg_commitments` data tree (2^4 = 16)
    pub const BLOB_KZG_COMMITMENTS_TREE_DEPTH: u32 = 4;
    /// Body depth (4) + length mix-in (1) + commitments tree depth (4)
    pub const KZG_COMMITMENT_INCLUSION_PROOF_DEPTH: usize = 9;
    /// Slots per epoch in the minimal preset
    pub const SLOTS_PER_EPOCH: u64 = 8;
}

#[cfg(not(any(feature = "mainnet", feature = "minimal")))]
pub mod preset {
    pub const NAME: &str = "mainnet";
    /// Maximum blob commitments a block body may carry
    pub const MAX_BLOB_COMMITMENTS_PER_BLOCK: usize = 4096;
    /// Depth of the `blob_kzg_commitments` data tree (2^12 = 4096)
    pub const BLOB_KZG_COMMITMENTS_TREE_DEPTH: u32 = 12;
    /// Body depth (4) + length mix-in (1) + commitments tree depth (12)
    pub const KZG_COMMITMENT_INCLUSION_PROOF_DEPTH: usize = 17;
    /// Slots per epoch on mainnet
    pub const SLOTS_PER_EPOCH: u64 = 32;
}

pub type Slot = u64;
pub type Epoch = u64;
pub type Gwei = u64;
pub type ValidatorIndex = u64;

pub type BlsPubkey = [u8; 48];
pub type BlsSignature = [u8; 96];
pub type KzgCommitment = [u8; 48];
pub type KzgProof = [u8; 48];
pub type WithdrawalCredentials = [u8; 32];

/// Epoch value meaning "not yet set"
pub const FAR_FUTURE_EPOCH: Epoch = u64::MAX;

/// Cap on a validator's effective balance (32 ETH)
pub const MAX_EFFECTIVE_BALANCE: Gwei = 32_000_000_000;

/// Effective balances are multiples of this (1 ETH)
pub const EFFECTIVE_BALANCE_INCREMENT: Gwei = 1_000_000_000;

/// Maximum number of validators (2^40)
pub const VALIDATOR_REGISTRY_LIMIT: usize = 1 << VALIDATOR_REGISTRY_DEPTH;

/// Depth of the validators list data tree
pub const VALIDATOR_REGISTRY_DEPTH: u32 = 40;

/// Validator container has 8 fields, tree depth 3
pub const VALIDATOR_FIELD_COUNT: usize = 8;
pub const VALIDATOR_TREE_DEPTH: u32 = 3;

/// Deneb `BeaconBlockBody` has 12 fields, tree depth 4
pub const BLOCK_BODY_FIELD_COUNT: usize = 12;
pub const BLOCK_BODY_TREE_DEPTH: u32 = 4;

/// Position of `blob_kzg_commitments` in the block body
pub const BLOB_KZG_COMMITMENTS_INDEX: usize = 11;

/// Header has 5 fields, tree depth 3
pub const BLOCK_HEADER_FIELD_COUNT: usize = 5;

/// Beacon block header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconBlockHeader {
    /// Slot number
    #[serde(with = "quoted_u64")]
    pub slot: Slot,
    /// Proposer validator index
    #[serde(with = "quoted_u64")]
    pub proposer_index: ValidatorIndex,
    /// Root of the parent block
    #[serde(with = "hex_bytes")]
    pub parent_root: Root,
    /// Root of the beacon state
    #[serde(with = "hex_bytes")]
    pub state_root: Root,
    /// Root of the block body
    #[serde(with = "hex_bytes")]
    pub body_root: Root,
}

/// A block header together with the proposer's signature over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
    #[serde(with = "hex_bytes")]
    pub signature: BlsSignature,
}

impl SignedBeaconBlockHeader {
    /// Wrap a header with an all-zero signature.
    #[must_use]
    pub fn unsigned(message: BeaconBlockHeader) -> Self {
        Self {
            message,
            signature: [0u8; 96],
        }
    }
}

/// Slot and proposer of a slashable block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashingInfo {
    #[serde(with = "quoted_u64")]
    pub slot: Slot,
    #[serde(with = "quoted_u64")]
    pub index: ValidatorIndex,
}

/// Convert a slot to the epoch that contains it.
#[must_use]
pub const fn compute_epoch_at_slot(slot: Slot) -> Epoch {
    slot / preset::SLOTS_PER_EPOCH
}

/// Beacon API encodes 64-bit integers as decimal strings.
pub mod quoted_u64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Fixed-size byte arrays as `0x`-prefixed hex strings.
pub mod hex_bytes {
    use crate::chunk::{parse_hex_array, to_hex};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_hex(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_hex_array(&s).map_err(serde::de::Error::custom)
    }
}

/// `Vec<[u8; 32]>` as a list of `0x`-prefixed hex strings.
pub mod hex_chunks {
    use crate::chunk::{parse_hex_array, to_hex, Chunk};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(data: &[Chunk], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_strings: Vec<String> = data.iter().map(|c| to_hex(c)).collect();
        hex_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Chunk>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_strings: Vec<String> = Vec::deserialize(deserializer)?;
        hex_strings
            .iter()
            .map(|s| parse_hex_array(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_json_uses_beacon_api_encoding() {
        let header = BeaconBlockHeader {
            slot: 12345,
            proposer_index: 42,
            parent_root: [1u8; 32],
            state_root: [2u8; 32],
            body_root: [3u8; 32],
        };

        let json = serde_json::to_value(header).unwrap();
        assert_eq!(json["slot"], "12345");
        assert_eq!(json["proposer_index"], "42");
        assert_eq!(json["body_root"], format!("0x{}", "03".repeat(32)));

        let decoded: BeaconBlockHeader = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_signed_header_signature_is_96_bytes() {
        let json = serde_json::json!({
            "message": {
                "slot": "1",
                "proposer_index": "2",
                "parent_root": format!("0x{}", "00".repeat(32)),
                "state_root": format!("0x{}", "00".repeat(32)),
                "body_root": format!("0x{}", "00".repeat(32)),
            },
            "signature": format!("0x{}", "ab".repeat(96)),
        });
        let signed: SignedBeaconBlockHeader = serde_json::from_value(json).unwrap();
        assert_eq!(signed.signature, [0xab; 96]);
        assert_eq!(signed.message.slot, 1);
    }

    #[test]
    fn test_bad_quoted_integer_rejected() {
        let json = serde_json::json!({ "slot": "abc", "index": "1" });
        assert!(serde_json::from_value::<SlashingInfo>(json).is_err());
    }

    #[test]
    fn test_registry_limit() {
        assert_eq!(VALIDATOR_REGISTRY_LIMIT, 1_099_511_627_776);
    }

    #[test]
    fn test_compute_epoch_at_slot() {
        assert_eq!(compute_epoch_at_slot(0), 0);
        assert_eq!(compute_epoch_at_slot(preset::SLOTS_PER_EPOCH - 1), 0);
        assert_eq!(compute_epoch_at_slot(preset::SLOTS_PER_EPOCH), 1);
    }

    #[test]
    #[cfg(all(feature = "mainnet", not(feature = "minimal")))]
    fn test_inclusion_proof_depth_mainnet() {
        assert_eq!(preset::KZG_COMMITMENT_INCLUSION_PROOF_DEPTH, 17);
        assert_eq!(
            1usize << preset::BLOB_KZG_COMMITMENTS_TREE_DEPTH,
            preset::MAX_BLOB_COMMITMENTS_PER_BLOCK
        );
    }

    #[test]
    #[cfg(feature = "minimal")]
    fn test_inclusion_proof_depth_minimal() {
        assert_eq!(preset::KZG_COMMITMENT_INCLUSION_PROOF_DEPTH, 9);
    }
}
