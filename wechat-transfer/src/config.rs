//! Merchant configuration.
//!
//! This module defines the TOML-deserializable merchant configuration: provider-issued
//! credentials, the client certificate bundle, the public key cache location, transport
//! settings and endpoint bases.
//!
//! # Examples
//!
//! ```toml
//! merchant_id = "1900000109"
//! app_id = "wxa1b2c3d4e5f60789"
//! secret_key = "192006250b4c09247ec02edce69f6a2d"
//! public_key_path = ".rsa_pub.pem"
//! encryption_padding = "oaep"
//!
//! [tls]
//! pkcs12_path = "apiclient_cert.p12"
//!
//! [http]
//! timeout_secs = 30
//!
//! [endpoints]
//! api_base = "https://api.mch.weixin.qq.com"
//! risk_base = "https://fraud.mch.weixin.qq.com"
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use url::Url;

use crate::{
    crypto::EncryptionPadding,
    error::{Result, TransferError},
    model::MerchantIdentity,
    transport::HttpConfig,
};

/// Default production API host.
pub const DEFAULT_API_BASE: &str = "https://api.mch.weixin.qq.com";

/// Default host of the risk-control service that issues RSA public keys.
pub const DEFAULT_RISK_BASE: &str = "https://fraud.mch.weixin.qq.com";

/// Default file name of the persisted RSA public key.
pub const DEFAULT_PUBLIC_KEY_FILE: &str = ".rsa_pub.pem";

/// Root merchant configuration.
///
/// Loaded once at startup and shared read-only by every request.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MerchantConfig {
    /// Provider-issued merchant id (`mch_id`).
    pub merchant_id: String,

    /// Application id bound to the merchant (`appid`).
    pub app_id: String,

    /// API secret used to sign requests.
    pub secret_key: String,

    /// Client certificate bundle for the mutually authenticated channel.
    pub tls: TlsConfig,

    /// Location of the persisted RSA public key.
    #[serde(default = "default_public_key_path")]
    pub public_key_path: PathBuf,

    /// Padding scheme for field encryption.
    #[serde(default)]
    pub encryption_padding: EncryptionPadding,

    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Endpoint bases.
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

impl fmt::Debug for MerchantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantConfig")
            .field("merchant_id", &self.merchant_id)
            .field("app_id", &self.app_id)
            .field("secret_key", &"<redacted>")
            .field("tls", &self.tls)
            .field("public_key_path", &self.public_key_path)
            .field("encryption_padding", &self.encryption_padding)
            .field("http", &self.http)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl MerchantConfig {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// Relative paths are kept as written.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ConfigError`] if the TOML is malformed or validation fails.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| TransferError::ConfigError(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// Relative `tls.pkcs12_path` and `public_key_path` values are resolved against the
    /// directory containing the configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::IoError`] if the file cannot be read, or
    /// [`TransferError::ConfigError`] if it does not parse or validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)?;

        if let Some(dir) = path.parent() {
            config.tls.pkcs12_path = resolve(dir, &config.tls.pkcs12_path);
            config.public_key_path = resolve(dir, &config.public_key_path);
        }

        Ok(config)
    }

    /// Validates credentials, endpoints and transport settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ConfigError`] if:
    /// - `merchant_id`, `app_id` or `secret_key` is empty
    /// - an endpoint base is not an HTTPS, non-loopback URL
    /// - HTTP timeouts are out of range
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("merchant_id", &self.merchant_id),
            ("app_id", &self.app_id),
            ("secret_key", &self.secret_key),
        ] {
            if value.trim().is_empty() {
                return Err(TransferError::ConfigError(format!("{name} must not be empty")));
            }
        }

        if self.public_key_path.as_os_str().is_empty() {
            return Err(TransferError::ConfigError("public_key_path must not be empty".to_owned()));
        }

        self.endpoints.validate()?;
        self.http.validate()
    }

    /// Returns the merchant identity injected into request payloads.
    #[must_use]
    pub fn identity(&self) -> MerchantIdentity<'_> {
        MerchantIdentity { merchant_id: &self.merchant_id, app_id: &self.app_id }
    }
}

fn resolve(dir: &Path, path: &Path) -> PathBuf {
    if path.is_relative() { dir.join(path) } else { path.to_path_buf() }
}

fn default_public_key_path() -> PathBuf {
    PathBuf::from(DEFAULT_PUBLIC_KEY_FILE)
}

/// Client certificate bundle.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    /// PKCS#12 (`.p12`) file issued by the provider.
    pub pkcs12_path: PathBuf,

    /// PKCS#12 password. The provider sets it to the merchant id, which is the default.
    #[serde(default)]
    pub pkcs12_password: Option<String>,
}

impl TlsConfig {
    /// Returns the PKCS#12 password, falling back to the merchant id.
    #[must_use]
    pub fn password<'a>(&'a self, merchant_id: &'a str) -> &'a str {
        self.pkcs12_password.as_deref().unwrap_or(merchant_id)
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("pkcs12_path", &self.pkcs12_path)
            .field("pkcs12_password", &self.pkcs12_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Endpoint bases.
///
/// Operation paths are fixed; only the hosts can be overridden, for example to point
/// at a recording proxy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Base for transfer and query APIs.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base for the public key issuance API.
    #[serde(default = "default_risk_base")]
    pub risk_base: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self { api_base: default_api_base(), risk_base: default_risk_base() }
    }
}

impl EndpointConfig {
    /// Transfer to wallet ("change") endpoint.
    #[must_use]
    pub fn wallet_transfer(&self) -> String {
        self.api_url("/mmpaymkttransfers/promotion/transfers")
    }

    /// Wallet transfer query endpoint.
    #[must_use]
    pub fn wallet_transfer_query(&self) -> String {
        self.api_url("/mmpaymkttransfers/gettransferinfo")
    }

    /// Transfer to bank card endpoint.
    #[must_use]
    pub fn bank_transfer(&self) -> String {
        self.api_url("/mmpaysptrans/pay_bank")
    }

    /// Bank transfer query endpoint.
    #[must_use]
    pub fn bank_transfer_query(&self) -> String {
        self.api_url("/mmpaysptrans/query_bank")
    }

    /// RSA public key issuance endpoint.
    #[must_use]
    pub fn public_key(&self) -> String {
        format!("{}/risk/getpublickey", self.risk_base.trim_end_matches('/'))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base.trim_end_matches('/'))
    }

    /// Validates both bases.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ConfigError`] if a base is malformed, not HTTPS, or
    /// points at a loopback host.
    pub fn validate(&self) -> Result<()> {
        validate_base_url("endpoints.api_base", &self.api_base)?;
        validate_base_url("endpoints.risk_base", &self.risk_base)
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_owned()
}

fn default_risk_base() -> String {
    DEFAULT_RISK_BASE.to_owned()
}

fn validate_base_url(name: &str, base: &str) -> Result<()> {
    let url = Url::parse(base)
        .map_err(|e| TransferError::ConfigError(format!("invalid {name} '{base}': {e}")))?;

    if url.scheme() != "https" {
        return Err(TransferError::ConfigError(format!(
            "{name} must use HTTPS, got: {}",
            url.scheme()
        )));
    }

    if let Some(host) = url.host_str() {
        let host_lower = host.to_lowercase();
        if host_lower == "localhost"
            || host_lower == "::1"
            || host_lower == "[::1]"
            || host_lower.starts_with("127.")
        {
            return Err(TransferError::ConfigError(format!(
                "{name} must not be localhost or loopback: {host}"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        merchant_id = "1900000109"
        app_id = "wxa1b2c3d4e5f60789"
        secret_key = "192006250b4c09247ec02edce69f6a2d"

        [tls]
        pkcs12_path = "apiclient_cert.p12"
    "#;

    #[test]
    fn test_minimal_config_applies_defaults() {
        let config = MerchantConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.merchant_id, "1900000109");
        assert_eq!(config.public_key_path, PathBuf::from(".rsa_pub.pem"));
        assert_eq!(config.encryption_padding, EncryptionPadding::Oaep);
        assert_eq!(config.endpoints, EndpointConfig::default());
        assert_eq!(config.http, HttpConfig::default());
        assert_eq!(config.tls.password(&config.merchant_id), "1900000109");
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoints = EndpointConfig::default();
        assert_eq!(
            endpoints.wallet_transfer(),
            "https://api.mch.weixin.qq.com/mmpaymkttransfers/promotion/transfers"
        );
        assert_eq!(
            endpoints.wallet_transfer_query(),
            "https://api.mch.weixin.qq.com/mmpaymkttransfers/gettransferinfo"
        );
        assert_eq!(endpoints.bank_transfer(), "https://api.mch.weixin.qq.com/mmpaysptrans/pay_bank");
        assert_eq!(
            endpoints.bank_transfer_query(),
            "https://api.mch.weixin.qq.com/mmpaysptrans/query_bank"
        );
        assert_eq!(endpoints.public_key(), "https://fraud.mch.weixin.qq.com/risk/getpublickey");
    }

    #[test]
    fn test_endpoint_base_trailing_slash() {
        let endpoints = EndpointConfig {
            api_base: "https://proxy.example.com/wx/".to_owned(),
            risk_base: "https://proxy.example.com/risk/".to_owned(),
        };
        assert_eq!(endpoints.bank_transfer(), "https://proxy.example.com/wx/mmpaysptrans/pay_bank");
        assert_eq!(endpoints.public_key(), "https://proxy.example.com/risk/risk/getpublickey");
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let toml = MINIMAL.replace("\"1900000109\"", "\"\"");
        let err = MerchantConfig::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("merchant_id must not be empty"));
    }

    #[test]
    fn test_http_endpoint_rejected() {
        let toml = format!("{MINIMAL}\n[endpoints]\napi_base = \"http://api.mch.weixin.qq.com\"\n");
        let err = MerchantConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(err, TransferError::ConfigError(_)));
        assert!(err.to_string().contains("HTTPS"));
    }

    #[test]
    fn test_loopback_endpoint_rejected() {
        let toml = format!("{MINIMAL}\n[endpoints]\nrisk_base = \"https://127.0.0.1:8443\"\n");
        let err = MerchantConfig::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("loopback"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = format!("sandbox = true\n{MINIMAL}");
        assert!(MerchantConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let toml = MINIMAL.replace(
            "pkcs12_path = \"apiclient_cert.p12\"",
            "pkcs12_path = \"apiclient_cert.p12\"\npkcs12_password = \"hunter2\"",
        );
        let config = MerchantConfig::from_toml(&toml).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("192006250b4c09247ec02edce69f6a2d"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
        assert_eq!(config.tls.password(&config.merchant_id), "hunter2");
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merchant.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = MerchantConfig::from_file(&path).unwrap();
        assert_eq!(config.tls.pkcs12_path, dir.path().join("apiclient_cert.p12"));
        assert_eq!(config.public_key_path, dir.path().join(".rsa_pub.pem"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = MerchantConfig::from_file("/nonexistent/merchant.toml").unwrap_err();
        assert!(matches!(err, TransferError::IoError(_)));
    }

    #[test]
    fn test_identity() {
        let config = MerchantConfig::from_toml(MINIMAL).unwrap();
        let identity = config.identity();
        assert_eq!(identity.merchant_id, "1900000109");
        assert_eq!(identity.app_id, "wxa1b2c3d4e5f60789");
    }
}
