use std::collections::BTreeMap;
use std::mem;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::error::TokenError;

/// Ledger-wide fixed-precision amount. The canonical 18 fractional decimal
/// digits are folded into the integer; all arithmetic is checked.
pub type Amount = u128;

/// Fractional decimal digits carried by every [`Amount`].
pub const DECIMALS: u8 = 18;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Immutable token metadata, set once at construction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Notification emitted by a successful mutating operation.
///
/// Events are appended to the ledger's pending list and drained by the
/// caller; indexers consume them as snake_case-tagged JSON records.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenEvent {
    Transfer {
        from: Address,
        to: Address,
        value: Amount,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: Amount,
    },
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
}

/// One (owner, spender) allowance in serialized form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllowanceEntry {
    pub owner: Address,
    pub spender: Address,
    pub value: Amount,
}

/// Serializable form of the full ledger state, carrying a digest over every
/// field that the state transition rules touch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub version: u8,
    pub metadata: TokenMetadata,
    pub owner: Address,
    pub total_supply: Amount,
    pub balances: BTreeMap<Address, Amount>,
    pub allowances: Vec<AllowanceEntry>,
    pub digest_hex: String,
}

/// The token ledger: balances, allowances, supply, and the owner capability.
///
/// Each operation is a single atomic state transition: every check precedes
/// every write, so a failed call leaves the ledger exactly as it was. The
/// host invokes operations one at a time; the ledger itself performs no
/// internal concurrency.
#[derive(Debug)]
pub struct TokenLedger {
    metadata: TokenMetadata,
    owner: Address,
    total_supply: Amount,
    balances: BTreeMap<Address, Amount>,
    allowances: BTreeMap<(Address, Address), Amount>,
    events: Vec<TokenEvent>,
}

impl TokenLedger {
    /// Construct a ledger, minting the whole initial supply to the deployer.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        initial_supply: Amount,
        deployer: Address,
    ) -> Self {
        let mut balances = BTreeMap::new();
        if initial_supply > 0 {
            balances.insert(deployer, initial_supply);
        }
        Self {
            metadata: TokenMetadata {
                name: name.into(),
                symbol: symbol.into(),
                decimals: DECIMALS,
            },
            owner: deployer,
            total_supply: initial_supply,
            balances,
            allowances: BTreeMap::new(),
            events: vec![TokenEvent::Transfer {
                from: Address::ZERO,
                to: deployer,
                value: initial_supply,
            }],
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Balance of `account`; absent entries read as zero.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Remaining allowance for `spender` on `owner`'s balance; absent reads
    /// as zero.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    /// Saturating sum of all balances; equals the total supply on a
    /// consistent ledger.
    pub fn balances_total(&self) -> Amount {
        self.balances
            .values()
            .fold(0, |acc, value| acc.saturating_add(*value))
    }

    /// Take the pending event notifications, leaving the list empty.
    pub fn drain_events(&mut self) -> Vec<TokenEvent> {
        mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[TokenEvent] {
        &self.events
    }

    /// Move `amount` from `sender` to `to`. No side effects on allowances.
    pub fn transfer(
        &mut self,
        sender: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let available = self.balance_of(&sender);
        let sender_new = available
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                account: sender,
                available,
                required: amount,
            })?;
        if to.is_zero() {
            return Err(TokenError::InvalidRecipient);
        }
        let recipient_prev = if to == sender {
            sender_new
        } else {
            self.balance_of(&to)
        };
        let recipient_new = recipient_prev
            .checked_add(amount)
            .ok_or(TokenError::ArithmeticOverflow)?;
        self.balances.insert(sender, sender_new);
        self.balances.insert(to, recipient_new);
        self.events.push(TokenEvent::Transfer {
            from: sender,
            to,
            value: amount,
        });
        Ok(())
    }

    /// Set the spender's allowance to `amount` (absolute, not additive).
    ///
    /// Two consecutive approvals racing a `transfer_from` can let the spender
    /// consume both values; callers needing protection should use
    /// [`TokenLedger::increase_allowance`] / [`TokenLedger::decrease_allowance`]
    /// instead. Accepted limitation of the set semantics.
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if spender.is_zero() {
            return Err(TokenError::InvalidSpender);
        }
        self.allowances.insert((owner, spender), amount);
        self.events.push(TokenEvent::Approval {
            owner,
            spender,
            value: amount,
        });
        Ok(())
    }

    /// Raise the spender's allowance by `added_value`.
    pub fn increase_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        added_value: Amount,
    ) -> Result<(), TokenError> {
        if spender.is_zero() {
            return Err(TokenError::InvalidSpender);
        }
        let updated = self
            .allowance(&owner, &spender)
            .checked_add(added_value)
            .ok_or(TokenError::ArithmeticOverflow)?;
        self.allowances.insert((owner, spender), updated);
        self.events.push(TokenEvent::Approval {
            owner,
            spender,
            value: updated,
        });
        Ok(())
    }

    /// Lower the spender's allowance by `subtracted_value`.
    pub fn decrease_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        subtracted_value: Amount,
    ) -> Result<(), TokenError> {
        if spender.is_zero() {
            return Err(TokenError::InvalidSpender);
        }
        let updated = self
            .allowance(&owner, &spender)
            .checked_sub(subtracted_value)
            .ok_or(TokenError::AllowanceUnderflow { owner, spender })?;
        self.allowances.insert((owner, spender), updated);
        self.events.push(TokenEvent::Approval {
            owner,
            spender,
            value: updated,
        });
        Ok(())
    }

    /// Move `amount` from `from` to `to` on behalf of `caller`, spending the
    /// (from, caller) allowance. The allowance is always decremented; no
    /// sentinel "unlimited" value is supported.
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let granted = self.allowance(&from, &caller);
        let remaining =
            granted
                .checked_sub(amount)
                .ok_or(TokenError::InsufficientAllowance {
                    owner: from,
                    spender: caller,
                    available: granted,
                    required: amount,
                })?;
        let available = self.balance_of(&from);
        let from_new = available
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                account: from,
                available,
                required: amount,
            })?;
        if to.is_zero() {
            return Err(TokenError::InvalidRecipient);
        }
        let recipient_prev = if to == from { from_new } else { self.balance_of(&to) };
        let recipient_new = recipient_prev
            .checked_add(amount)
            .ok_or(TokenError::ArithmeticOverflow)?;
        self.allowances.insert((from, caller), remaining);
        self.balances.insert(from, from_new);
        self.balances.insert(to, recipient_new);
        self.events.push(TokenEvent::Transfer {
            from,
            to,
            value: amount,
        });
        Ok(())
    }

    /// Create `amount` new tokens for `to`. Restricted to the ledger owner.
    pub fn mint(
        &mut self,
        caller: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if caller != self.owner {
            return Err(TokenError::Unauthorized { caller });
        }
        if to.is_zero() {
            return Err(TokenError::InvalidRecipient);
        }
        let supply_new = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::ArithmeticOverflow)?;
        let recipient_new = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(TokenError::ArithmeticOverflow)?;
        self.total_supply = supply_new;
        self.balances.insert(to, recipient_new);
        self.events.push(TokenEvent::Transfer {
            from: Address::ZERO,
            to,
            value: amount,
        });
        Ok(())
    }

    /// Destroy `amount` tokens held by `caller`.
    pub fn burn(&mut self, caller: Address, amount: Amount) -> Result<(), TokenError> {
        let available = self.balance_of(&caller);
        let caller_new = available
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                account: caller,
                available,
                required: amount,
            })?;
        let supply_new = self
            .total_supply
            .checked_sub(amount)
            .ok_or(TokenError::ArithmeticOverflow)?;
        self.balances.insert(caller, caller_new);
        self.total_supply = supply_new;
        self.events.push(TokenEvent::Transfer {
            from: caller,
            to: Address::ZERO,
            value: amount,
        });
        Ok(())
    }

    /// Hand the owner capability to `new_owner`. Restricted to the current
    /// owner.
    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), TokenError> {
        if caller != self.owner {
            return Err(TokenError::Unauthorized { caller });
        }
        if new_owner.is_zero() {
            return Err(TokenError::InvalidOwner);
        }
        let previous_owner = mem::replace(&mut self.owner, new_owner);
        self.events.push(TokenEvent::OwnershipTransferred {
            previous_owner,
            new_owner,
        });
        Ok(())
    }

    /// Serializable snapshot of the current state, digest included. Pending
    /// events are not part of the snapshot; drain them separately.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            metadata: self.metadata.clone(),
            owner: self.owner,
            total_supply: self.total_supply,
            balances: self.balances.clone(),
            allowances: self
                .allowances
                .iter()
                .map(|((owner, spender), value)| AllowanceEntry {
                    owner: *owner,
                    spender: *spender,
                    value: *value,
                })
                .collect(),
            digest_hex: hex::encode(self.state_digest()),
        }
    }

    /// Rebuild a ledger from a snapshot. The recorded digest is not checked
    /// here; the store layer recomputes and compares it.
    pub fn from_snapshot(snapshot: &LedgerSnapshot) -> Self {
        Self {
            metadata: snapshot.metadata.clone(),
            owner: snapshot.owner,
            total_supply: snapshot.total_supply,
            balances: snapshot.balances.clone(),
            allowances: snapshot
                .allowances
                .iter()
                .map(|entry| ((entry.owner, entry.spender), entry.value))
                .collect(),
            events: Vec::new(),
        }
    }

    /// Digest over every field the state transition rules touch.
    pub fn state_digest(&self) -> [u8; 32] {
        let mut leaves: Vec<[u8; 32]> = Vec::new();

        let mut hasher = Sha256::new();
        hasher.update(b"meta");
        hasher.update((self.metadata.name.len() as u64).to_le_bytes());
        hasher.update(self.metadata.name.as_bytes());
        hasher.update((self.metadata.symbol.len() as u64).to_le_bytes());
        hasher.update(self.metadata.symbol.as_bytes());
        hasher.update([self.metadata.decimals]);
        hasher.update(self.owner.as_bytes());
        hasher.update(self.total_supply.to_le_bytes());
        leaves.push(hasher.finalize().into());

        for (account, balance) in &self.balances {
            let mut hasher = Sha256::new();
            hasher.update(b"balance");
            hasher.update(account.as_bytes());
            hasher.update(balance.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
        for ((owner, spender), value) in &self.allowances {
            let mut hasher = Sha256::new();
            hasher.update(b"allowance");
            hasher.update(owner.as_bytes());
            hasher.update(spender.as_bytes());
            hasher.update(value.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
        fold_digest_tree(leaves)
    }
}

fn fold_digest_tree(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"ft20-empty-state").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
