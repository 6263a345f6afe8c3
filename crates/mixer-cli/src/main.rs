use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use mixer_core::credential::CredentialGate;
use mixer_core::paths::{resolve_data_dir, store_path};
use mixer_store::{canonical_address, Account, Store, StoreError};
use mixer_sync::session;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mixer", author, version, about = "Mixer desktop client state tools", long_about = None)]
struct Cli {
    /// Overrides the data directory (also MIXER_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set the local passphrase
    Init,
    /// Check the passphrase and select the pool program (no engine is attached)
    Login {
        /// Hex identity of the pool program; defaults to the saved one
        #[arg(long)]
        program: Option<String>,
    },
    /// Manage known accounts
    Accounts {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// List unspent index tickets
    Tickets,
    /// Show the recorded history of an account
    History { address: String },
}

#[derive(Subcommand, Debug)]
enum AccountCommands {
    Add {
        address: String,
        identity: String,
        name: String,
    },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let data = resolve_data_dir(cli.data_dir)?;
    std::fs::create_dir_all(&data)?;
    let store = Store::open(&store_path(&data)).await?;
    let settings = store.load_settings().await?;
    init_tracing(&settings.log_filter);

    let result = match cli.command {
        Commands::Init => init_command(&data),
        Commands::Login { program } => login_command(&data, &store, program).await,
        Commands::Accounts { command } => accounts_command(&store, command).await,
        Commands::Tickets => tickets_command(&store).await,
        Commands::History { address } => history_command(&store, &address).await,
    };
    store.close().await;
    result
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn init_command(data: &Path) -> Result<()> {
    let gate = CredentialGate::in_dir(data);
    if gate.is_configured() {
        return Err(anyhow!(
            "passphrase already set at {}",
            gate.path().display()
        ));
    }
    let passphrase = prompt_passphrase_twice("Create passphrase")?;
    gate.setup(&passphrase)?;
    info!(path = %gate.path().display(), "credential record written");
    println!("Passphrase set.");
    Ok(())
}

async fn login_command(data: &Path, store: &Store, program: Option<String>) -> Result<()> {
    let gate = CredentialGate::in_dir(data);
    if !gate.is_configured() {
        return Err(anyhow!("no passphrase set; run init first"));
    }
    let passphrase = prompt_passphrase_once("Passphrase")?;
    let session = session::unlock(&gate, store, &passphrase, program.as_deref()).await?;
    session::commit(store, &session).await?;

    println!("Pool program: {}", session.config.pool_program);
    if session.program_changed {
        println!("Pool program changed; local ledger state was reset.");
    }
    let amount = store.cached_pool_amount().await?.unwrap_or(0);
    let set = store.cached_anonymity_set().await?.unwrap_or(0);
    println!("Spendable amount: {amount}");
    println!("Anonymity set: {set}");
    Ok(())
}

async fn accounts_command(store: &Store, command: AccountCommands) -> Result<()> {
    match command {
        AccountCommands::Add {
            address,
            identity,
            name,
        } => {
            let account = Account {
                address: canonical_address(&address),
                identity,
                name,
            };
            match store.add_account(&account).await {
                Ok(()) => println!("Added {}", account.address),
                Err(StoreError::AlreadyExists(_)) => {
                    return Err(anyhow!("account {} already exists", account.address))
                }
                Err(err) => return Err(err.into()),
            }
        }
        AccountCommands::List => {
            let accounts = store.get_accounts().await?;
            println!("{}", serde_json::to_string_pretty(&accounts)?);
        }
    }
    Ok(())
}

async fn tickets_command(store: &Store) -> Result<()> {
    let tickets = store.list_index_tickets().await?;
    println!("{}", serde_json::to_string(&tickets)?);
    println!("Last index: {}", store.last_index().await?);
    Ok(())
}

async fn history_command(store: &Store, address: &str) -> Result<()> {
    let address = canonical_address(address);
    let rows = store.get_transactions(&address).await?;
    if rows.is_empty() {
        println!("No history for {address}");
        return Ok(());
    }
    for row in rows {
        let kind = if row.is_deposit() { "deposit" } else { "withdraw" };
        println!("{:>6}  {:<8} {:>12}  {}", row.id, kind, row.amount, row.time);
    }
    Ok(())
}

fn prompt_passphrase_once(prompt: &str) -> Result<String> {
    if let Ok(pw) = std::env::var("MIXER_PASSPHRASE") {
        if !pw.is_empty() {
            return Ok(pw);
        }
    }
    let pw = rpassword::prompt_password(format!("{prompt}: "))
        .map_err(|e| anyhow!("passphrase prompt: {e}"))?;
    if pw.is_empty() {
        return Err(anyhow!("passphrase must not be empty"));
    }
    Ok(pw)
}

fn prompt_passphrase_twice(prompt: &str) -> Result<String> {
    if let Ok(pw) = std::env::var("MIXER_PASSPHRASE") {
        if !pw.is_empty() {
            return Ok(pw);
        }
    }
    let first = prompt_passphrase_once(prompt)?;
    let second = rpassword::prompt_password("Confirm passphrase: ")
        .map_err(|e| anyhow!("passphrase prompt: {e}"))?;
    if first != second {
        return Err(anyhow!("passphrases do not match"));
    }
    Ok(first)
}
