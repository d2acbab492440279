//! chain-ops command line.
//!
//! ```text
//! sign       build + sign offline (or online), write a PENDING record, advance the nonce ledger
//! broadcast  submit PENDING records once, in order, and record SUCCESS / FAILED
//! nonce      inspect or seed the nonce ledger
//! authorize  hash, sign and post an off-chain action
//! address    print the selected signer's address
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use clap::{Args, Parser, Subcommand};

use chain_ops::action::{self, encoder, AuthorizationClient};
use chain_ops::config::{load_config, ChainConfig, OpsConfig};
use chain_ops::lifecycle::{until_shutdown, Completion};
use chain_ops::nonce::{FileStorage, NonceLedger};
use chain_ops::observability::logging;
use chain_ops::signer::{BridgeTransport, HardwareSigner, LocalSigner};
use chain_ops::transaction::{
    explorer_link, BroadcastOutcome, BroadcastProcessor, BuildOptions, RpcClient, TxBuilder,
    TxFields,
};
use chain_ops::{ChainSigner, SignerBackend};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "chain-ops", version)]
#[command(about = "Offline EVM transaction signing, broadcast and action authorization", long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, env = "CHAIN_OPS_CONFIG", default_value = "chain-ops.toml")]
    config: PathBuf,

    /// Environment (top-level nonce ledger key). Defaults to the configured one.
    #[arg(long = "env", env = "CHAIN_OPS_ENV")]
    environment: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build and sign a transaction, storing it as a PENDING record
    Sign(SignArgs),
    /// Broadcast PENDING records in order, stopping at the first failure
    Broadcast {
        #[arg(long)]
        chain: String,
        /// Record file. Repeat to broadcast several in order.
        #[arg(long = "record", required = true)]
        records: Vec<PathBuf>,
    },
    /// Inspect or seed the nonce ledger
    #[command(subcommand)]
    Nonce(NonceCommand),
    /// Sign and post an off-chain action
    Authorize(AuthorizeArgs),
    /// Print the signer's address
    Address {
        #[command(flatten)]
        signer: SignerArgs,
    },
}

#[derive(Subcommand)]
enum NonceCommand {
    /// Print the next nonce for an address
    Get {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        address: Address,
    },
    /// Set the next nonce for an address
    Set {
        #[arg(long)]
        chain: String,
        #[arg(long)]
        address: Address,
        #[arg(long)]
        nonce: u64,
    },
}

#[derive(Args)]
struct SignerArgs {
    /// Hex private key. Falls back to CHAIN_OPS_PRIVATE_KEY.
    #[arg(long, conflicts_with = "hardware")]
    private_key: Option<String>,

    /// Sign with the hardware device behind the configured bridge.
    #[arg(long)]
    hardware: bool,

    /// Override the configured derivation path.
    #[arg(long, requires = "hardware")]
    derivation_path: Option<String>,
}

#[derive(Args)]
struct SignArgs {
    #[arg(long)]
    chain: String,
    #[arg(long)]
    to: Option<Address>,
    /// Value in wei.
    #[arg(long)]
    value: Option<U256>,
    /// Hex calldata.
    #[arg(long)]
    data: Option<Bytes>,
    #[arg(long)]
    nonce: Option<u64>,
    #[arg(long)]
    gas_limit: Option<u64>,
    #[arg(long)]
    gas_price: Option<u128>,
    #[arg(long)]
    max_fee_per_gas: Option<u128>,
    #[arg(long)]
    max_priority_fee_per_gas: Option<u128>,
    /// Never contact a node; nonce from the ledger, gas from chain defaults.
    #[arg(long)]
    offline: bool,
    /// Added to the resolved nonce to correct drift.
    #[arg(long, allow_negative_numbers = true)]
    nonce_offset: Option<i64>,
    /// Where to write the signed record.
    #[arg(long)]
    output: PathBuf,
    /// Broadcast the record right after signing.
    #[arg(long, conflicts_with = "offline")]
    broadcast: bool,
    #[command(flatten)]
    signer: SignerArgs,
}

#[derive(Args)]
struct AuthorizeArgs {
    /// Action as a JSON object; key order is preserved.
    #[arg(long)]
    action: String,
    /// Nonce in milliseconds. Defaults to the current time.
    #[arg(long)]
    nonce: Option<String>,
    #[arg(long)]
    secondary_pool: Option<Address>,
    /// Print the signed envelope without posting it.
    #[arg(long)]
    dry_run: bool,
    #[command(flatten)]
    signer: SignerArgs,
}

impl SignerArgs {
    fn build(&self, config: &OpsConfig) -> CliResult<SignerBackend> {
        if self.hardware {
            let transport = BridgeTransport::new(
                config.hardware.bridge_url.clone(),
                Duration::from_secs(config.hardware.timeout_secs),
            )?;
            let path = self
                .derivation_path
                .clone()
                .unwrap_or_else(|| config.hardware.derivation_path.clone());
            return Ok(SignerBackend::Hardware(HardwareSigner::new(transport, path)));
        }

        let signer = match &self.private_key {
            Some(key) => LocalSigner::from_private_key(key)?,
            None => LocalSigner::from_env()?,
        };
        Ok(SignerBackend::Local(signer))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<ExitCode> {
    let config = load_config(&cli.config)?;
    logging::init(&config.observability);

    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(|| config.environment.clone());

    tracing::debug!(config = %cli.config.display(), environment = %environment, "Configuration loaded");

    match cli.command {
        Command::Nonce(command) => nonce(command, &config, &environment),
        Command::Broadcast { chain, records } => {
            interruptible(broadcast(&config, &chain, &records)).await
        }
        Command::Sign(args) => {
            let signer = args.signer.build(&config)?;
            let result = interruptible(sign(&signer, &config, &environment, &args)).await;
            close(&signer).await;
            result
        }
        Command::Authorize(args) => {
            let signer = args.signer.build(&config)?;
            let result = interruptible(authorize(&signer, &config, &args)).await;
            close(&signer).await;
            result
        }
        Command::Address { signer } => {
            let signer = signer.build(&config)?;
            let result = interruptible(address(&signer)).await;
            close(&signer).await;
            result
        }
    }
}

async fn interruptible<F>(work: F) -> CliResult<ExitCode>
where
    F: std::future::Future<Output = CliResult<ExitCode>>,
{
    match until_shutdown(work).await {
        Completion::Finished(result) => result,
        Completion::Interrupted(signal) => Err(format!("interrupted by {signal}").into()),
    }
}

async fn close(signer: &SignerBackend) {
    if let Err(e) = signer.close().await {
        tracing::warn!(error = %e, "Failed to close signer session");
    }
}

fn chain<'a>(config: &'a OpsConfig, name: &str) -> CliResult<&'a ChainConfig> {
    config
        .chain(name)
        .ok_or_else(|| format!("Unknown chain '{name}': add a [chains.{name}] section").into())
}

fn ledger(config: &OpsConfig) -> NonceLedger<FileStorage> {
    NonceLedger::new(FileStorage::new(&config.nonce_ledger_path))
}

fn nonce(command: NonceCommand, config: &OpsConfig, environment: &str) -> CliResult<ExitCode> {
    let ledger = ledger(config);
    match command {
        NonceCommand::Get { chain: name, address } => {
            chain(config, &name)?;
            println!("{}", ledger.get(environment, &name, address)?);
        }
        NonceCommand::Set {
            chain: name,
            address,
            nonce,
        } => {
            chain(config, &name)?;
            ledger.set(environment, &name, address, nonce)?;
            println!(
                "Next nonce for {address} on {} ({environment}) set to {nonce}",
                name.to_lowercase()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn sign(
    signer: &SignerBackend,
    config: &OpsConfig,
    environment: &str,
    args: &SignArgs,
) -> CliResult<ExitCode> {
    let chain_config = chain(config, &args.chain)?;
    let ledger = ledger(config);
    let rpc = if args.offline {
        None
    } else {
        Some(RpcClient::new(chain_config)?)
    };

    let mut builder = TxBuilder::new(environment, &args.chain, chain_config, &ledger);
    if let Some(rpc) = &rpc {
        builder = builder.with_node(rpc);
    }

    let fields = TxFields {
        to: args.to,
        value: args.value,
        data: args.data.clone(),
        nonce: args.nonce,
        gas_limit: args.gas_limit,
        gas_price: args.gas_price,
        max_fee_per_gas: args.max_fee_per_gas,
        max_priority_fee_per_gas: args.max_priority_fee_per_gas,
    };
    let options = BuildOptions {
        offline: args.offline,
        nonce_offset: args.nonce_offset,
    };

    let record = builder
        .sign_to_record(signer, &fields, options, &args.output)
        .await?;

    println!(
        "Signed type {} transaction with nonce {} for chain {} ({})",
        record.base_tx.tx_type, record.base_tx.nonce, args.chain, record.base_tx.chain_id
    );
    println!("Record written to {} with status {}", args.output.display(), record.status);

    if args.broadcast {
        return broadcast(config, &args.chain, std::slice::from_ref(&args.output)).await;
    }
    Ok(ExitCode::SUCCESS)
}

async fn broadcast(config: &OpsConfig, name: &str, records: &[PathBuf]) -> CliResult<ExitCode> {
    let chain_config = chain(config, name)?;
    let rpc = RpcClient::new(chain_config)?;
    let entries = BroadcastProcessor::new(name, &rpc)
        .process_batch(records)
        .await;

    let mut clean = true;
    for entry in &entries {
        match &entry.result {
            Ok(outcome) => {
                report(chain_config, &entry.path, outcome);
                clean &= outcome.is_clean();
            }
            Err(e) => {
                eprintln!("Error: {}: {e}", entry.path.display());
                clean = false;
            }
        }
    }

    if entries.len() < records.len() {
        eprintln!(
            "Stopped after {}; {} record(s) left PENDING",
            entries.len(),
            records.len() - entries.len()
        );
    }

    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report(chain_config: &ChainConfig, record: &Path, outcome: &BroadcastOutcome) {
    match outcome {
        BroadcastOutcome::Skipped(status) => {
            println!("Record {} is already {status}; nothing to do", record.display());
        }
        BroadcastOutcome::Confirmed { hash, block_number } => {
            println!("Transaction {hash} confirmed in block {block_number}");
            if let Some(explorer) = &chain_config.explorer_url {
                println!("{}", explorer_link(explorer, *hash));
            }
        }
        BroadcastOutcome::AlreadyApplied { reason } => {
            println!("Already applied, nothing left to do: {reason}");
        }
        BroadcastOutcome::Failed { reason } => {
            eprintln!("Error: broadcast of {} failed: {reason}", record.display());
        }
    }
}

async fn address(signer: &SignerBackend) -> CliResult<ExitCode> {
    println!("{}", signer.get_address().await?);
    Ok(ExitCode::SUCCESS)
}

async fn authorize(
    signer: &SignerBackend,
    config: &OpsConfig,
    args: &AuthorizeArgs,
) -> CliResult<ExitCode> {
    let action: serde_json::Value = serde_json::from_str(&args.action)
        .map_err(|e| format!("--action is not valid JSON: {e}"))?;
    let nonce = match &args.nonce {
        Some(raw) => encoder::parse_nonce_str(raw)?,
        None => encoder::timestamp_nonce()?,
    };

    let envelope = action::sign_action(
        signer,
        &config.authorization,
        action,
        nonce,
        args.secondary_pool,
    )
    .await?;

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(ExitCode::SUCCESS);
    }

    let client = AuthorizationClient::from_config(&config.authorization)?;
    let response = client.submit(&envelope).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(ExitCode::SUCCESS)
}
