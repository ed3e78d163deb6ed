//! HTTP transport implementation.
//!
//! This module provides the mutually authenticated HTTPS transport using reqwest with
//! a PKCS#12 client identity.

use reqwest::{Client, Identity, header};
use tracing::{debug, instrument};
use url::Url;

use super::config::{HttpConfig, HttpVersion};
use crate::{
    config::MerchantConfig,
    error::{Result, TransferError},
    transport::Transport,
};

/// Validates URL for security constraints.
///
/// Ensures the URL uses HTTPS and does not point to localhost.
fn validate_url(url: &Url) -> Result<()> {
    if url.scheme() != "https" {
        return Err(TransferError::TransportError("Only HTTPS URLs are allowed".to_owned()));
    }

    if let Some(host) = url.host_str()
        && (host == "localhost" || host == "127.0.0.1" || host == "::1" || host == "[::1]")
    {
        return Err(TransferError::TransportError("Localhost URLs are not allowed".to_owned()));
    }

    Ok(())
}

/// Loads a client identity from a PKCS#12 bundle.
///
/// # Errors
///
/// Returns [`TransferError::TransportError`] if the bundle cannot be decoded with the
/// given password.
pub fn identity_from_pkcs12(der: &[u8], password: &str) -> Result<Identity> {
    Identity::from_pkcs12_der(der, password).map_err(|e| {
        TransferError::TransportError(format!("failed to load PKCS#12 client identity: {e}"))
    })
}

/// HTTPS transport presenting the merchant's client certificate.
///
/// # Examples
///
/// ```rust,no_run
/// use wechat_transfer::transport::{HttpConfig, HttpTransport};
///
/// # fn example() -> wechat_transfer::error::Result<()> {
/// let der = std::fs::read("apiclient_cert.p12")?;
/// let transport = HttpTransport::with_pkcs12(&HttpConfig::default(), &der, "1900000109")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    http_version: HttpVersion,
}

impl HttpTransport {
    /// Creates a transport from the merchant configuration.
    ///
    /// Reads the PKCS#12 bundle named by `tls.pkcs12_path`.
    ///
    /// # Errors
    ///
    /// Returns error if the bundle cannot be read or decoded, or the client cannot be built.
    pub fn from_merchant_config(config: &MerchantConfig) -> Result<Self> {
        let der = std::fs::read(&config.tls.pkcs12_path).map_err(|e| {
            TransferError::ConfigError(format!(
                "failed to read client certificate {}: {e}",
                config.tls.pkcs12_path.display()
            ))
        })?;
        Self::with_pkcs12(&config.http, &der, config.tls.password(&config.merchant_id))
    }

    /// Creates a transport from raw PKCS#12 bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the identity cannot be decoded or the client cannot be built.
    pub fn with_pkcs12(config: &HttpConfig, der: &[u8], password: &str) -> Result<Self> {
        let identity = identity_from_pkcs12(der, password)?;
        Self::with_identity(config, identity)
    }

    /// Creates a transport with an already loaded identity.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails.
    pub fn with_identity(config: &HttpConfig, identity: Identity) -> Result<Self> {
        let mut builder = Client::builder()
            .identity(identity)
            .https_only(true)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout());

        if config.http_version == HttpVersion::Http1 {
            builder = builder.http1_only();
        }

        let client = builder.build().map_err(TransferError::HttpError)?;

        Ok(Self { client, http_version: config.http_version })
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, body), fields(protocol = self.protocol_name(), body_len = body.len()))]
    async fn post<'a>(&'a self, url: &'a str, body: String) -> Result<String> {
        let parsed = Url::parse(url)
            .map_err(|e| TransferError::TransportError(format!("invalid URL '{url}': {e}")))?;

        validate_url(&parsed)?;

        let response = self
            .client
            .post(parsed)
            .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "provider responded");

        if !status.is_success() {
            return Err(TransferError::TransportError(format!(
                "provider returned status {status}"
            )));
        }

        Ok(response.text().await?)
    }

    fn protocol_name(&self) -> &'static str {
        match self.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Auto => "http",
        }
    }
}
