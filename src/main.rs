use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use ft20_core::{Address, Amount, TokenError, TokenEvent, TokenLedger};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::store::StoreError;

mod store;

/// Constructor arguments for `init`, read from a JSON config file.
#[derive(Deserialize)]
struct GenesisConfig {
    name: String,
    symbol: String,
    initial_supply: Amount,
    deployer: Address,
}

#[derive(Parser)]
#[command(
    name = "ft20",
    version,
    about = "FT-20 token ledger tooling: keys, genesis, transfers, snapshots"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an Ed25519 keypair and the derived ledger address.
    Keygen {
        #[arg(long, value_name = "DIR")]
        out_dir: PathBuf,
    },
    /// Construct a ledger from a genesis config and write the first snapshot.
    Init {
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Print token metadata, supply, and owner.
    Info {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Print the balance of one account.
    Balance {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        account: Address,
    },
    /// Print the remaining allowance for (owner, spender).
    Allowance {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        owner: Address,
        spender: Address,
    },
    /// Move tokens from the sender to a recipient.
    Transfer {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        #[arg(long)]
        amount: Amount,
    },
    /// Set an absolute spender allowance.
    Approve {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long)]
        owner: Address,
        #[arg(long)]
        spender: Address,
        #[arg(long)]
        amount: Amount,
    },
    /// Raise an existing allowance.
    IncreaseAllowance {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long)]
        owner: Address,
        #[arg(long)]
        spender: Address,
        #[arg(long)]
        amount: Amount,
    },
    /// Lower an existing allowance.
    DecreaseAllowance {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long)]
        owner: Address,
        #[arg(long)]
        spender: Address,
        #[arg(long)]
        amount: Amount,
    },
    /// Spend an allowance on behalf of the balance owner.
    TransferFrom {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long)]
        spender: Address,
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        #[arg(long)]
        amount: Amount,
    },
    /// Create new tokens (ledger owner only).
    Mint {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        to: Address,
        #[arg(long)]
        amount: Amount,
    },
    /// Destroy tokens held by the caller.
    Burn {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        amount: Amount,
    },
    /// Hand the ledger owner role to another account.
    TransferOwnership {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        new_owner: Address,
    },
    /// Recheck the snapshot digest and the supply invariant.
    Verify {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Ledger(#[from] TokenError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli.command) {
        eprintln!("error: {err}");
        process::exit(2);
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Keygen { out_dir } => keygen(&out_dir),
        Command::Init { config, state } => init(&config, &state),
        Command::Info { state } => {
            let ledger = store::load(&state)?;
            println!("name:         {}", ledger.name());
            println!("symbol:       {}", ledger.symbol());
            println!("decimals:     {}", ledger.decimals());
            println!("total supply: {}", ledger.total_supply());
            println!("owner:        {}", ledger.owner());
            Ok(())
        }
        Command::Balance { state, account } => {
            let ledger = store::load(&state)?;
            println!("{}", ledger.balance_of(&account));
            Ok(())
        }
        Command::Allowance {
            state,
            owner,
            spender,
        } => {
            let ledger = store::load(&state)?;
            println!("{}", ledger.allowance(&owner, &spender));
            Ok(())
        }
        Command::Transfer {
            state,
            from,
            to,
            amount,
        } => {
            apply(&state, |ledger| ledger.transfer(from, to, amount))?;
            println!(
                "transfer applied → {} ({} {} → {})",
                state.display(),
                amount,
                from,
                to
            );
            Ok(())
        }
        Command::Approve {
            state,
            owner,
            spender,
            amount,
        } => {
            apply(&state, |ledger| ledger.approve(owner, spender, amount))?;
            println!(
                "allowance set → {} ({} for {})",
                state.display(),
                amount,
                spender
            );
            Ok(())
        }
        Command::IncreaseAllowance {
            state,
            owner,
            spender,
            amount,
        } => {
            apply(&state, |ledger| {
                ledger.increase_allowance(owner, spender, amount)
            })?;
            println!(
                "allowance raised → {} (+{} for {})",
                state.display(),
                amount,
                spender
            );
            Ok(())
        }
        Command::DecreaseAllowance {
            state,
            owner,
            spender,
            amount,
        } => {
            apply(&state, |ledger| {
                ledger.decrease_allowance(owner, spender, amount)
            })?;
            println!(
                "allowance lowered → {} (-{} for {})",
                state.display(),
                amount,
                spender
            );
            Ok(())
        }
        Command::TransferFrom {
            state,
            spender,
            from,
            to,
            amount,
        } => {
            apply(&state, |ledger| {
                ledger.transfer_from(spender, from, to, amount)
            })?;
            println!(
                "transfer-from applied → {} ({} {} → {} via {})",
                state.display(),
                amount,
                from,
                to,
                spender
            );
            Ok(())
        }
        Command::Mint {
            state,
            caller,
            to,
            amount,
        } => {
            apply(&state, |ledger| ledger.mint(caller, to, amount))?;
            println!("minted → {} ({} to {})", state.display(), amount, to);
            Ok(())
        }
        Command::Burn {
            state,
            caller,
            amount,
        } => {
            apply(&state, |ledger| ledger.burn(caller, amount))?;
            println!("burned → {} ({} from {})", state.display(), amount, caller);
            Ok(())
        }
        Command::TransferOwnership {
            state,
            caller,
            new_owner,
        } => {
            apply(&state, |ledger| ledger.transfer_ownership(caller, new_owner))?;
            println!(
                "ownership transferred → {} (now {})",
                state.display(),
                new_owner
            );
            Ok(())
        }
        Command::Verify { state } => {
            // load already rechecks the digest and the supply invariant
            let ledger = store::load(&state)?;
            println!(
                "verify: OK (digest & supply invariant match, supply {})",
                ledger.total_supply()
            );
            Ok(())
        }
    }
}

fn keygen(out_dir: &Path) -> Result<(), CliError> {
    fs::create_dir_all(out_dir)?;
    let mut secret = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut *secret);
    let signing_key = SigningKey::from_bytes(&secret);
    let public_key = signing_key.verifying_key();
    let address = Address::from_public_key(public_key.as_bytes());

    fs::write(out_dir.join("sk.hex"), hex::encode(&*secret))?;
    fs::write(out_dir.join("pk.hex"), hex::encode(public_key.as_bytes()))?;
    fs::write(out_dir.join("address.hex"), address.to_string())?;
    println!(
        "keypair written → {} (address {})",
        out_dir.display(),
        address
    );
    Ok(())
}

fn init(config_path: &Path, state_path: &Path) -> Result<(), CliError> {
    let bytes = fs::read(config_path)?;
    let genesis: GenesisConfig = serde_json::from_slice(&bytes)?;
    let mut ledger = TokenLedger::new(
        genesis.name,
        genesis.symbol,
        genesis.initial_supply,
        genesis.deployer,
    );
    let events = ledger.drain_events();
    store::save(state_path, &ledger)?;
    store::append_events(state_path, &events)?;
    println!(
        "ledger initialized → {} ({} {} minted to {})",
        state_path.display(),
        ledger.total_supply(),
        ledger.symbol(),
        genesis.deployer
    );
    Ok(())
}

/// Load, apply one operation, persist, journal. A failed operation writes
/// nothing.
fn apply<F>(state_path: &Path, op: F) -> Result<Vec<TokenEvent>, CliError>
where
    F: FnOnce(&mut TokenLedger) -> Result<(), TokenError>,
{
    let mut ledger = store::load(state_path)?;
    op(&mut ledger)?;
    let events = ledger.drain_events();
    store::save(state_path, &ledger)?;
    store::append_events(state_path, &events)?;
    Ok(events)
}
