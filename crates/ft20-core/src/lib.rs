//! Core primitives for the FT-20 token stack.
//!
//! This crate exposes the building blocks the surrounding tooling relies on:
//!
//! * [`address`] — fixed-width account identifiers with a hex textual form
//!   and a derivation from Ed25519 public keys.
//! * [`ledger`] — the token ledger state machine: balances, allowances,
//!   supply accounting, and the event stream consumed by indexers.
//!
//! The modules are intentionally small and focused so that higher level
//! crates (CLI, deployment tooling, …) can be combined without bespoke
//! plumbing in each consumer.

pub mod address;
pub mod ledger;

mod error;

pub use address::Address;
pub use error::TokenError;
pub use ledger::{Amount, LedgerSnapshot, TokenEvent, TokenLedger};
