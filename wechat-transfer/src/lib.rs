//! WeChat Pay merchant transfers
//!
//! A client for the provider's merchant transfer APIs: payouts to a user's wallet
//! ("change"), payouts to a bank card, status queries for both, and retrieval of the RSA
//! public key used to encrypt bank card details.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  Caller          │  *Params: business fields only
//! └────────┬─────────┘
//!          │
//! ┌────────▼──────────────────────────────────────┐
//! │  TransferClient (this crate)                  │
//! │  ┌────────────┐  ┌────────────┐  ┌─────────┐  │
//! │  │  model     │──│  sign/xml  │──│ crypto  │  │
//! │  │  (inject   │  │  (nonce,   │  │ (RSA on │  │
//! │  │  identity) │  │  MD5, XML) │  │ fields) │  │
//! │  └────────────┘  └────────────┘  └────▲────┘  │
//! │                                  key_cache    │
//! └────────┬──────────────────────────────────────┘
//!          │ HTTPS + client certificate (PKCS#12)
//! ┌────────▼─────────┐
//! │  Provider API    │  api.mch.weixin.qq.com / fraud.mch.weixin.qq.com
//! └──────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## 1. Transfer to a bank card
//!
//! ```rust,no_run
//! use wechat_transfer::{MerchantConfig, TransferClient, model::BankTransferParams};
//!
//! # async fn example() -> wechat_transfer::Result<()> {
//! let config = MerchantConfig::from_file("merchant.toml")?;
//! let client = TransferClient::from_config(config)?;
//!
//! // Card number and name are encrypted with the provider key before sending.
//! let response = client
//!     .transfer_to_bank(BankTransferParams {
//!         partner_trade_no: "1212121221278".to_owned(),
//!         enc_bank_no: "6225760000000000".to_owned(),
//!         enc_true_name: "张三".to_owned(),
//!         bank_code: "1002".to_owned(),
//!         amount: 500,
//!         desc: Some("payout".to_owned()),
//!     })
//!     .await?;
//!
//! println!("payment_no: {:?}", response.payment_no);
//! # Ok(())
//! # }
//! ```
//!
//! ## 2. Query a transfer
//!
//! ```rust,no_run
//! use wechat_transfer::{MerchantConfig, TransferClient, model::WalletTransferQueryParams};
//!
//! # async fn example() -> wechat_transfer::Result<()> {
//! let client = TransferClient::from_config(MerchantConfig::from_file("merchant.toml")?)?;
//!
//! let response = client
//!     .query_wallet_transfer(WalletTransferQueryParams {
//!         partner_trade_no: "10000098201411111234567890".to_owned(),
//!     })
//!     .await?;
//!
//! println!("status: {:?}", response.status_text);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`client`]: the transfer operations
//! - [`model`]: request and response types
//! - [`config`]: TOML merchant configuration
//! - [`transport`]: HTTPS transport with client certificate
//! - [`sign`]: nonce, MD5 signature, request and response codecs
//! - [`xml`]: XML marshaling
//! - [`crypto`]: RSA field encryption
//! - [`key_cache`]: persisted public key cache
//! - [`error`]: error types
//!
//! # Security Considerations
//!
//! - **HTTPS only**: endpoint bases must be HTTPS and not loopback
//! - **Secrets stay out of logs**: `Debug` on configuration redacts the API key and the
//!   certificate password; bank card numbers and names are never logged
//! - **Key file trust**: the persisted public key file is used without verification;
//!   protect it like any other credential file
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`](error::Result):
//!
//! ```rust,no_run
//! use wechat_transfer::{
//!     MerchantConfig, TransferClient, TransferError, model::BankTransferQueryParams,
//! };
//!
//! # async fn example() -> wechat_transfer::Result<()> {
//! let client = TransferClient::from_config(MerchantConfig::from_file("merchant.toml")?)?;
//! let params = BankTransferQueryParams { partner_trade_no: "1212121221278".to_owned() };
//!
//! match client.query_bank_transfer(params).await {
//!     Ok(response) if response.status.is_result_success() => println!("{:?}", response),
//!     Ok(response) => eprintln!("business failure: {:?}", response.status.err_code_des),
//!     Err(TransferError::ProviderError { message, .. }) => eprintln!("rejected: {message}"),
//!     Err(e) => eprintln!("request failed: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from rsa and reqwest"
)]

pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod key_cache;
pub mod model;
pub mod sign;
pub mod transport;
pub mod xml;

pub use client::TransferClient;
pub use config::MerchantConfig;
pub use error::{Result, TransferError};
