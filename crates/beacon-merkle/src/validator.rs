//! Validator Lifecycle Model
//!
//! The validator record committed to by the registry root, and the status
//! derivation the Beacon API reports. Status is never stored; it is a pure
//! function of the epoch fields, `slashed` and the effective balance.

use crate::types::{
    BlsPubkey, Epoch, Gwei, WithdrawalCredentials, EFFECTIVE_BALANCE_INCREMENT, FAR_FUTURE_EPOCH,
    MAX_EFFECTIVE_BALANCE,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Credentials prefix for an execution-layer withdrawal address.
pub const ETH1_ADDRESS_WITHDRAWAL_PREFIX: u8 = 0x01;

/// Credentials prefix for compounding validators.
pub const COMPOUNDING_WITHDRAWAL_PREFIX: u8 = 0x02;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("Inconsistent epochs for status at epoch {current_epoch}: activation {activation_epoch}, exit {exit_epoch}, withdrawable {withdrawable_epoch}")]
    InvalidValidatorStatus {
        current_epoch: Epoch,
        activation_epoch: Epoch,
        exit_epoch: Epoch,
        withdrawable_epoch: Epoch,
    },
}

/// Validator status as reported by the Beacon API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    PendingInitialized,
    PendingQueued,
    ActiveOngoing,
    ActiveExiting,
    ActiveSlashed,
    ExitedUnslashed,
    ExitedSlashed,
    WithdrawalPossible,
    WithdrawalDone,
}

impl ValidatorStatus {
    /// The Beacon API string for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingInitialized => "pending_initialized",
            Self::PendingQueued => "pending_queued",
            Self::ActiveOngoing => "active_ongoing",
            Self::ActiveExiting => "active_exiting",
            Self::ActiveSlashed => "active_slashed",
            Self::ExitedUnslashed => "exited_unslashed",
            Self::ExitedSlashed => "exited_slashed",
            Self::WithdrawalPossible => "withdrawal_possible",
            Self::WithdrawalDone => "withdrawal_done",
        }
    }
}

impl std::fmt::Display for ValidatorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of the validator container, in merkleization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorField {
    Pubkey,
    WithdrawalCredentials,
    EffectiveBalance,
    Slashed,
    ActivationEligibilityEpoch,
    ActivationEpoch,
    ExitEpoch,
    WithdrawableEpoch,
}

impl ValidatorField {
    /// Position of the field in the container.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Floor `amount` to a multiple of `increment`, then cap at `max_effective_balance`.
#[must_use]
pub const fn compute_effective_balance(
    amount: Gwei,
    increment: Gwei,
    max_effective_balance: Gwei,
) -> Gwei {
    let floored = match amount.checked_rem(increment) {
        Some(rem) => amount - rem,
        None => amount,
    };
    if floored < max_effective_balance {
        floored
    } else {
        max_effective_balance
    }
}

/// Validator record from the beacon state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// BLS public key (48 bytes)
    #[serde(with = "crate::types::hex_bytes")]
    pub pubkey: BlsPubkey,
    /// Withdrawal credentials (32 bytes)
    #[serde(with = "crate::types::hex_bytes")]
    pub withdrawal_credentials: WithdrawalCredentials,
    /// Effective balance in Gwei
    #[serde(with = "crate::types::quoted_u64")]
    pub effective_balance: Gwei,
    /// Whether the validator is slashed
    pub slashed: bool,
    /// Epoch when validator became eligible for activation
    #[serde(with = "crate::types::quoted_u64")]
    pub activation_eligibility_epoch: Epoch,
    /// Epoch when validator was activated
    #[serde(with = "crate::types::quoted_u64")]
    pub activation_epoch: Epoch,
    /// Epoch when validator will exit
    #[serde(with = "crate::types::quoted_u64")]
    pub exit_epoch: Epoch,
    /// Epoch when validator can withdraw
    #[serde(with = "crate::types::quoted_u64")]
    pub withdrawable_epoch: Epoch,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            pubkey: [0u8; 48],
            withdrawal_credentials: [0u8; 32],
            effective_balance: 0,
            slashed: false,
            activation_eligibility_epoch: 0,
            activation_epoch: 0,
            exit_epoch: 0,
            withdrawable_epoch: 0,
        }
    }
}

impl Validator {
    /// A fresh validator for a deposit of `amount` Gwei.
    ///
    /// Every epoch starts at [`FAR_FUTURE_EPOCH`].
    #[must_use]
    pub fn from_deposit(
        pubkey: BlsPubkey,
        withdrawal_credentials: WithdrawalCredentials,
        amount: Gwei,
    ) -> Self {
        Self {
            pubkey,
            withdrawal_credentials,
            effective_balance: compute_effective_balance(
                amount,
                EFFECTIVE_BALANCE_INCREMENT,
                MAX_EFFECTIVE_BALANCE,
            ),
            slashed: false,
            activation_eligibility_epoch: FAR_FUTURE_EPOCH,
            activation_epoch: FAR_FUTURE_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        }
    }

    /// Lifecycle status at `current_epoch`.
    ///
    /// # Errors
    /// Returns [`ValidatorError::InvalidValidatorStatus`] when the epoch fields
    /// place the validator in none of the lifecycle phases.
    pub fn status(&self, current_epoch: Epoch) -> Result<ValidatorStatus, ValidatorError> {
        if self.activation_epoch > current_epoch {
            return Ok(if self.activation_eligibility_epoch == FAR_FUTURE_EPOCH {
                ValidatorStatus::PendingInitialized
            } else {
                ValidatorStatus::PendingQueued
            });
        }

        if self.activation_epoch <= current_epoch && current_epoch < self.exit_epoch {
            return Ok(if self.exit_epoch == FAR_FUTURE_EPOCH {
                ValidatorStatus::ActiveOngoing
            } else if self.slashed {
                ValidatorStatus::ActiveSlashed
            } else {
                ValidatorStatus::ActiveExiting
            });
        }

        if self.exit_epoch <= current_epoch && current_epoch < self.withdrawable_epoch {
            return Ok(if self.slashed {
                ValidatorStatus::ExitedSlashed
            } else {
                ValidatorStatus::ExitedUnslashed
            });
        }

        if self.withdrawable_epoch <= current_epoch {
            return Ok(if self.effective_balance == 0 {
                ValidatorStatus::WithdrawalDone
            } else {
                ValidatorStatus::WithdrawalPossible
            });
        }

        Err(ValidatorError::InvalidValidatorStatus {
            current_epoch,
            activation_epoch: self.activation_epoch,
            exit_epoch: self.exit_epoch,
            withdrawable_epoch: self.withdrawable_epoch,
        })
    }

    #[must_use]
    pub fn is_active(&self, epoch: Epoch) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }

    /// Eligible to be activated once `finalized_epoch` is final.
    #[must_use]
    pub fn is_eligible_for_activation(&self, finalized_epoch: Epoch) -> bool {
        self.activation_eligibility_epoch <= finalized_epoch
            && self.activation_epoch == FAR_FUTURE_EPOCH
    }

    #[must_use]
    pub fn is_eligible_for_activation_queue(&self, threshold: Gwei) -> bool {
        self.activation_eligibility_epoch == FAR_FUTURE_EPOCH && self.effective_balance >= threshold
    }

    #[must_use]
    pub fn is_slashable(&self, epoch: Epoch) -> bool {
        !self.slashed && self.activation_epoch <= epoch && epoch < self.withdrawable_epoch
    }

    #[must_use]
    pub fn is_fully_withdrawable(&self, balance: Gwei, epoch: Epoch) -> bool {
        self.has_execution_withdrawal_credential()
            && self.withdrawable_epoch <= epoch
            && balance > 0
    }

    #[must_use]
    pub fn is_partially_withdrawable(&self, balance: Gwei, max_effective_balance: Gwei) -> bool {
        self.has_execution_withdrawal_credential()
            && self.has_max_effective_balance(max_effective_balance)
            && balance > max_effective_balance
    }

    /// `0x01` prefix followed by eleven zero bytes.
    #[must_use]
    pub fn has_eth1_withdrawal_credentials(&self) -> bool {
        self.withdrawal_credentials[0] == ETH1_ADDRESS_WITHDRAWAL_PREFIX
            && self.withdrawal_credentials[1..12].iter().all(|b| *b == 0)
    }

    #[must_use]
    pub fn has_compounding_withdrawal_credential(&self) -> bool {
        self.withdrawal_credentials[0] == COMPOUNDING_WITHDRAWAL_PREFIX
    }

    /// Only `0x01` credentials count; compounding credentials do not withdraw.
    #[must_use]
    pub fn has_execution_withdrawal_credential(&self) -> bool {
        self.has_eth1_withdrawal_credentials()
    }

    #[must_use]
    pub fn has_max_effective_balance(&self, max_effective_balance: Gwei) -> bool {
        self.effective_balance == max_effective_balance
    }

    /// Execution address that receives withdrawals, if the credentials carry one.
    #[must_use]
    pub fn withdrawal_address(&self) -> Option<[u8; 20]> {
        if !self.has_eth1_withdrawal_credentials()
            && !self.has_compounding_withdrawal_credential()
        {
            return None;
        }
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&self.withdrawal_credentials[12..32]);
        Some(addr)
    }
}
