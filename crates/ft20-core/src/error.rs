use thiserror::Error;

use crate::address::Address;
use crate::ledger::Amount;

/// Canonical failure taxonomy for ledger operations.
///
/// Every failure aborts the attempted operation and leaves prior state
/// untouched; the decision to retry belongs entirely to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The account does not hold enough tokens for the requested debit.
    #[error("insufficient balance in account {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: Address,
        available: Amount,
        required: Amount,
    },

    /// The spender's remaining allowance does not cover the requested amount.
    #[error("insufficient allowance for spender {spender} on {owner}: have {available}, need {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        available: Amount,
        required: Amount,
    },

    /// `decrease_allowance` asked for more than the current allowance.
    #[error("allowance underflow for spender {spender} on {owner}")]
    AllowanceUnderflow { owner: Address, spender: Address },

    /// The zero address cannot receive tokens.
    #[error("the zero address is not a valid recipient")]
    InvalidRecipient,

    /// The zero address cannot be granted an allowance.
    #[error("the zero address is not a valid spender")]
    InvalidSpender,

    /// The zero address cannot own the ledger.
    #[error("the zero address is not a valid owner")]
    InvalidOwner,

    /// The operation is restricted to the current ledger owner.
    #[error("account {caller} is not the ledger owner")]
    Unauthorized { caller: Address },

    /// An arithmetic step would wrap instead of producing a representable value.
    #[error("arithmetic overflow while applying the operation")]
    ArithmeticOverflow,
}
