//! Transport abstraction for provider requests.
//!
//! The transport owns the mutually authenticated channel to the provider. It receives a
//! fully encoded request body and returns the raw response body; payload construction,
//! signing and decoding happen in [`crate::sign`] and [`crate::client`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use wechat_transfer::{
//!     config::MerchantConfig,
//!     transport::{HttpTransport, Transport},
//! };
//!
//! # async fn example() -> wechat_transfer::error::Result<()> {
//! let config = MerchantConfig::from_file("merchant.toml")?;
//! let transport = HttpTransport::from_merchant_config(&config)?;
//!
//! let body = transport
//!     .post("https://api.mch.weixin.qq.com/mmpaysptrans/query_bank", "<xml></xml>".to_owned())
//!     .await?;
//! println!("{body}");
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use crate::error::Result;

pub mod config;
pub mod http;

pub use config::{HttpConfig, HttpVersion};
pub use http::HttpTransport;

/// Request transport to the payment provider.
///
/// Implementations must attach the merchant's client identity to every call and must
/// return an error for non-success HTTP statuses. The response body is returned untouched.
///
/// The trait is open so callers can substitute an in-process double in tests.
pub trait Transport: Send + Sync {
    /// POSTs `body` to `url` and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is rejected, the TLS handshake or HTTP exchange fails,
    /// or the provider answers with a non-success status.
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: String,
    ) -> impl Future<Output = Result<String>> + Send + 'a;

    /// Returns the protocol name for logging.
    fn protocol_name(&self) -> &'static str;
}
