//! Command-line front end for WeChat Pay merchant transfers.
//!
//! Runs one provider operation per invocation and prints the typed response as JSON on
//! stdout. Logs go to stderr.
//!
//! ```text
//! wechat-transfer --config merchant.toml wallet --params transfer.json
//! wechat-transfer --config merchant.toml query-bank --partner-trade-no 1212121221278
//! wechat-transfer --config merchant.toml public-key --refresh
//! ```
//!
//! The process exits with status 2 when the provider accepted the request but reported a
//! business failure (`result_code = FAIL`).

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from rsa and reqwest"
)]

mod observability;

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{info, instrument};
use wechat_transfer::{
    MerchantConfig, TransferClient,
    model::{
        BankTransferParams, BankTransferQueryParams, ProviderResponse, WalletTransferParams,
        WalletTransferQueryParams,
    },
};

use crate::observability::{LogFormat, init_logging};

/// WeChat Pay merchant transfer client.
#[derive(Parser, Debug)]
#[command(name = "wechat-transfer", version, about)]
struct Cli {
    /// Merchant configuration file (TOML).
    #[arg(long, short, env = "WECHAT_TRANSFER_CONFIG", default_value = "merchant.toml")]
    config: PathBuf,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transfer to a user's wallet.
    Wallet {
        /// JSON file with the transfer parameters.
        #[arg(long)]
        params: PathBuf,
    },
    /// Query a wallet transfer.
    QueryWallet {
        /// Merchant-side transfer number.
        #[arg(long)]
        partner_trade_no: String,
    },
    /// Transfer to a bank card.
    Bank {
        /// JSON file with the transfer parameters (card number and name in plaintext).
        #[arg(long)]
        params: PathBuf,
    },
    /// Query a bank transfer.
    QueryBank {
        /// Merchant-side transfer number.
        #[arg(long)]
        partner_trade_no: String,
    },
    /// Print the provider's RSA public key.
    PublicKey {
        /// Discard the cached key and fetch a fresh one.
        #[arg(long)]
        refresh: bool,
    },
}

async fn read_params<P: DeserializeOwned>(path: &Path) -> Result<P> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid parameters in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report<R: ProviderResponse + Serialize>(response: &R) -> Result<ExitCode> {
    print_json(response)?;
    if response.status().is_result_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}

#[instrument(skip(client))]
async fn run(client: &TransferClient, command: Command) -> Result<ExitCode> {
    match command {
        Command::Wallet { params } => {
            let params: WalletTransferParams = read_params(&params).await?;
            report(&client.transfer_to_wallet(params).await?)
        }
        Command::QueryWallet { partner_trade_no } => {
            let params = WalletTransferQueryParams { partner_trade_no };
            report(&client.query_wallet_transfer(params).await?)
        }
        Command::Bank { params } => {
            let params: BankTransferParams = read_params(&params).await?;
            report(&client.transfer_to_bank(params).await?)
        }
        Command::QueryBank { partner_trade_no } => {
            let params = BankTransferQueryParams { partner_trade_no };
            report(&client.query_bank_transfer(params).await?)
        }
        Command::PublicKey { refresh } => {
            if refresh {
                client.invalidate_public_key().await?;
            }
            let pem = client.public_key().await?;
            print_json(&serde_json::json!({
                "mch_id": client.config().merchant_id,
                "pub_key": &*pem,
            }))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = MerchantConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    info!(merchant_id = %config.merchant_id, "configuration loaded");

    let client = TransferClient::from_config(config)?;
    run(&client, cli.command).await
}
