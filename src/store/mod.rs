//! Snapshot persistence for deployed ledgers.
//!
//! A deployed ledger lives in a pretty-printed JSON snapshot file; the
//! events it emits are journaled to a sibling `*.events.jsonl`, one record
//! per line, for indexers to tail. Loading recomputes the snapshot digest
//! and the supply invariant so a tampered or truncated state file is
//! rejected before any operation runs against it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ft20_core::ledger::{LedgerSnapshot, SNAPSHOT_VERSION};
use ft20_core::{Amount, TokenEvent, TokenLedger};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported state version {found}, expected {expected}")]
    UnsupportedVersion { found: u8, expected: u8 },

    #[error("state digest mismatch: recorded {recorded}, computed {computed}")]
    DigestMismatch { recorded: String, computed: String },

    #[error("balance total {balances} disagrees with recorded supply {supply}")]
    SupplyMismatch { balances: Amount, supply: Amount },
}

/// Load a ledger from `path`, verifying the digest and supply invariant.
pub fn load(path: &Path) -> Result<TokenLedger, StoreError> {
    let bytes = fs::read(path)?;
    let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    let ledger = TokenLedger::from_snapshot(&snapshot);
    let computed = hex::encode(ledger.state_digest());
    if computed != snapshot.digest_hex {
        return Err(StoreError::DigestMismatch {
            recorded: snapshot.digest_hex,
            computed,
        });
    }
    let balances = ledger.balances_total();
    if balances != ledger.total_supply() {
        return Err(StoreError::SupplyMismatch {
            balances,
            supply: ledger.total_supply(),
        });
    }
    Ok(ledger)
}

/// Write the ledger's snapshot to `path`.
pub fn save(path: &Path, ledger: &TokenLedger) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let bytes = serde_json::to_vec_pretty(&ledger.snapshot())?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Journal path derived from the state path: `ledger.json` → `ledger.events.jsonl`.
pub fn events_path(state_path: &Path) -> PathBuf {
    match state_path.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) => state_path.with_file_name(format!("{stem}.events.jsonl")),
        None => state_path.with_extension("events.jsonl"),
    }
}

/// Append emitted events to the journal next to the state file.
pub fn append_events(state_path: &Path, events: &[TokenEvent]) -> Result<(), StoreError> {
    if events.is_empty() {
        return Ok(());
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(events_path(state_path))?;
    for event in events {
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use ft20_core::Address;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ft20-store-{}-{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn addr(tag: u8) -> Address {
        Address::new([tag; 20])
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = scratch("round-trip").join("ledger.json");
        let mut ledger = TokenLedger::new("T", "T", 1_000, addr(1));
        ledger.transfer(addr(1), addr(2), 250).unwrap();
        save(&path, &ledger).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.balance_of(&addr(1)), 750);
        assert_eq!(loaded.balance_of(&addr(2)), 250);
        assert_eq!(loaded.total_supply(), 1_000);
    }

    #[test]
    fn tampered_snapshot_fails_digest_check() {
        let path = scratch("tamper").join("ledger.json");
        let ledger = TokenLedger::new("T", "T", 1_000, addr(1));
        save(&path, &ledger).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["total_supply"] = serde_json::json!(999);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, StoreError::DigestMismatch { .. }));
    }

    #[test]
    fn inconsistent_supply_fails_invariant_check() {
        // A snapshot whose digest is honest about an inconsistent state must
        // still be rejected by the supply check.
        let ledger = TokenLedger::new("T", "T", 1_000, addr(1));
        let mut snapshot = ledger.snapshot();
        snapshot.total_supply = 1_234;
        let rebuilt = TokenLedger::from_snapshot(&snapshot);
        snapshot.digest_hex = hex::encode(rebuilt.state_digest());

        let path = scratch("supply").join("ledger.json");
        fs::write(&path, serde_json::to_vec_pretty(&snapshot).unwrap()).unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(
            err,
            StoreError::SupplyMismatch {
                balances: 1_000,
                supply: 1_234,
            }
        ));
    }

    #[test]
    fn unknown_snapshot_version_is_rejected() {
        let ledger = TokenLedger::new("T", "T", 1_000, addr(1));
        let mut snapshot = ledger.snapshot();
        snapshot.version = 9;

        let path = scratch("version").join("ledger.json");
        fs::write(&path, serde_json::to_vec_pretty(&snapshot).unwrap()).unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedVersion {
                found: 9,
                expected: SNAPSHOT_VERSION,
            }
        ));
    }

    #[test]
    fn events_journal_appends_lines() {
        let state = scratch("events").join("ledger.json");
        let journal = events_path(&state);
        let _ = fs::remove_file(&journal);
        assert_eq!(
            journal.file_name().unwrap().to_str().unwrap(),
            "ledger.events.jsonl"
        );

        let mut ledger = TokenLedger::new("T", "T", 1_000, addr(1));
        append_events(&state, &ledger.drain_events()).unwrap();
        ledger.transfer(addr(1), addr(2), 5).unwrap();
        append_events(&state, &ledger.drain_events()).unwrap();

        let text = fs::read_to_string(&journal).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let record: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(record["type"], serde_json::json!("transfer"));
        }
    }
}
