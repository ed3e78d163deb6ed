//! Error types for the transfer client.
//!
//! All errors implement the standard [`std::error::Error`] trait via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Provider Errors** ([`TransferError::ProviderError`]): the provider's own status
//!   fields reported failure
//! - **Integrity Errors** ([`TransferError::MerchantMismatch`]): the provider answered for
//!   a different merchant than the one configured
//! - **Network Errors** ([`TransferError::HttpError`], [`TransferError::TransportError`]):
//!   HTTP and TLS communication failures
//! - **Codec Errors** ([`TransferError::XmlError`], [`TransferError::SerializationError`]):
//!   payload encoding or decoding failures
//! - **Local Errors** ([`TransferError::CryptoError`], [`TransferError::ConfigError`],
//!   [`TransferError::IoError`]): key material, configuration and filesystem failures
//!
//! # Examples
//!
//! ```
//! use wechat_transfer::error::{Result, TransferError};
//!
//! fn require_merchant(merchant_id: &str) -> Result<&str> {
//!     if merchant_id.is_empty() {
//!         return Err(TransferError::ConfigError("merchant_id must not be empty".to_owned()));
//!     }
//!     Ok(merchant_id)
//! }
//! # assert!(require_merchant("").is_err());
//! ```

use thiserror::Error;

/// Result type alias for transfer operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, TransferError>;

/// Errors that can occur while talking to the payment provider.
///
/// # Error Recovery
///
/// - **Provider errors** ([`ProviderError`](Self::ProviderError)): inspect the message; the
///   provider decided, so resending the same payload gives the same answer
/// - **Integrity errors** ([`MerchantMismatch`](Self::MerchantMismatch)): fix the
///   credentials or environment; never retry
/// - **Network errors** ([`HttpError`](Self::HttpError)): safe to retry queries; for
///   transfers, query by `partner_trade_no` first to avoid paying twice
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum TransferError {
    /// The provider reported a protocol-level failure.
    ///
    /// Raised when `return_code` is `FAIL`, or when the public key issuance endpoint does
    /// not report success. `message` is the provider's own text, unmodified.
    #[error("provider reported failure ({code}): {message}")]
    ProviderError {
        /// Provider status code (`FAIL`, or the business `err_code`).
        code: String,
        /// Provider message (`return_msg` or `err_code_des`).
        message: String,
    },

    /// The merchant id returned by the provider differs from the configured one.
    ///
    /// This implies a credential or environment mix-up (for example a client certificate
    /// issued to another merchant). The returned data is discarded.
    #[error("provider answered for merchant {actual}, expected {expected}")]
    MerchantMismatch {
        /// Configured merchant id.
        expected: String,
        /// Merchant id found in the provider response.
        actual: String,
    },

    /// HTTP request failed.
    ///
    /// Wraps [`reqwest::Error`]: timeouts, connection failures, DNS, TLS handshake
    /// (including a rejected client certificate).
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Transport-level failure that is not a [`reqwest::Error`].
    ///
    /// Non-success HTTP status, rejected URL, client construction problems.
    #[error("transport error: {0}")]
    TransportError(String),

    /// XML document could not be built or parsed.
    #[error("XML error: {0}")]
    XmlError(String),

    /// A payload could not be mapped to or from its typed form.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// RSA key parsing or field encryption failed.
    #[error("cryptographic operation failed: {0}")]
    CryptoError(String),

    /// Merchant configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem operation failed (key cache, certificate, configuration file).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TransferError {
    /// Returns `true` when the error came from the provider's own status fields.
    #[must_use]
    pub const fn is_provider_failure(&self) -> bool {
        matches!(self, Self::ProviderError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_carries_message() {
        let error =
            TransferError::ProviderError { code: "FAIL".into(), message: "签名错误".into() };
        assert_eq!(error.to_string(), "provider reported failure (FAIL): 签名错误");
        assert!(error.is_provider_failure());
    }

    #[test]
    fn test_merchant_mismatch_display() {
        let error =
            TransferError::MerchantMismatch { expected: "1900000109".into(), actual: "123".into() };
        assert_eq!(error.to_string(), "provider answered for merchant 123, expected 1900000109");
        assert!(!error.is_provider_failure());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: TransferError = io.into();
        assert!(matches!(error, TransferError::IoError(_)));
    }
}
