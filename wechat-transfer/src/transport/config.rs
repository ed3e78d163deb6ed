//! `[http]` table of the merchant configuration.
//!
//! Every key is optional. An absent table gives a pooled client with a 30 s request
//! deadline and a 10 s connect deadline.
//!
//! ```toml
//! [http]
//! timeout_secs = 45
//! connect_timeout_secs = 5
//! pool_max_idle_per_host = 4
//! http_version = "http1"
//! ```

use std::{ops::RangeInclusive, time::Duration};

use serde::Deserialize;

use crate::error::{Result, TransferError};

/// Accepted request deadlines, in seconds.
pub const TIMEOUT_SECS_RANGE: RangeInclusive<u64> = 1..=300;

/// Accepted connect deadlines, in seconds.
pub const CONNECT_TIMEOUT_SECS_RANGE: RangeInclusive<u64> = 1..=60;

/// Client settings for the provider channel.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Idle keep-alive connections retained per provider host.
    pub pool_max_idle_per_host: usize,

    /// Whole-request deadline, handshake included.
    pub timeout_secs: u64,

    /// TCP plus TLS connect deadline.
    pub connect_timeout_secs: u64,

    /// Protocol negotiation mode.
    pub http_version: HttpVersion,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 10,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            http_version: HttpVersion::Auto,
        }
    }
}

impl HttpConfig {
    /// Checks both deadlines against [`TIMEOUT_SECS_RANGE`] and
    /// [`CONNECT_TIMEOUT_SECS_RANGE`].
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ConfigError`] naming the offending `http.*` key.
    pub fn validate(&self) -> Result<()> {
        check_range("http.timeout_secs", self.timeout_secs, &TIMEOUT_SECS_RANGE)?;
        check_range(
            "http.connect_timeout_secs",
            self.connect_timeout_secs,
            &CONNECT_TIMEOUT_SECS_RANGE,
        )
    }

    /// Request deadline handed to the reqwest builder.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connect deadline handed to the reqwest builder.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn check_range(key: &str, value: u64, range: &RangeInclusive<u64>) -> Result<()> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(TransferError::ConfigError(format!(
        "{key} = {value} is outside {}..={}",
        range.start(),
        range.end()
    )))
}

/// Protocol negotiation mode for the provider channel.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HttpVersion {
    /// Force HTTP/1.1, for proxies that mishandle ALPN.
    Http1,
    /// Let ALPN pick.
    #[default]
    Auto,
}
