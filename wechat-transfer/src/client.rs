//! Transfer client.
//!
//! [`TransferClient`] wraps the provider's merchant transfer APIs. Each operation builds
//! the full payload from caller params plus the configured identity, signs and encodes
//! it, performs one POST, and decodes the response.
//!
//! # Failure semantics
//!
//! - `return_code = FAIL` fails the call with [`TransferError::ProviderError`] carrying
//!   `return_msg`
//! - `result_code = FAIL` is a business outcome; the response is returned as-is for the
//!   caller to inspect `err_code` / `err_code_des`
//!
//! Nothing is retried. A transfer that fails on the network may still have been executed;
//! query by `partner_trade_no` before resending it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wechat_transfer::{
//!     MerchantConfig, TransferClient,
//!     model::{CheckName, WalletTransferParams},
//! };
//!
//! # async fn example() -> wechat_transfer::error::Result<()> {
//! let config = MerchantConfig::from_file("merchant.toml")?;
//! let client = TransferClient::from_config(config)?;
//!
//! let response = client
//!     .transfer_to_wallet(WalletTransferParams {
//!         partner_trade_no: "10000098201411111234567890".to_owned(),
//!         openid: "oxTWIuGaIt6gTKsQRLau2M0yL16E".to_owned(),
//!         check_name: CheckName::NoCheck,
//!         re_user_name: None,
//!         amount: 100,
//!         desc: "refund".to_owned(),
//!         spbill_create_ip: None,
//!         device_info: None,
//!     })
//!     .await?;
//!
//! if response.status.is_result_success() {
//!     println!("paid: {:?}", response.payment_no);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::MerchantConfig,
    crypto::FieldEncryptor,
    error::{Result, TransferError},
    key_cache::PublicKeyCache,
    model::{
        BankTransferParams, BankTransferQueryParams, BankTransferQueryRequest,
        BankTransferQueryResponse, BankTransferRequest, BankTransferResponse, FAIL,
        ProviderResponse, PublicKeyRequest, PublicKeyResponse, WalletTransferParams,
        WalletTransferQueryParams, WalletTransferQueryRequest, WalletTransferQueryResponse,
        WalletTransferRequest, WalletTransferResponse,
    },
    sign,
    transport::{HttpTransport, Transport},
};

/// Client for the merchant transfer APIs.
///
/// Cheap to share behind an [`Arc`]; all methods take `&self`.
#[derive(Debug)]
pub struct TransferClient<T: Transport = HttpTransport> {
    config: Arc<MerchantConfig>,
    transport: T,
    key_cache: PublicKeyCache,
}

impl TransferClient<HttpTransport> {
    /// Creates a client using the HTTPS transport described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ConfigError`] if the configuration is invalid or the
    /// client certificate cannot be read, or a transport error if it cannot be loaded.
    pub fn from_config(config: MerchantConfig) -> Result<Self> {
        let transport = HttpTransport::from_merchant_config(&config)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> TransferClient<T> {
    /// Creates a client over a custom transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ConfigError`] if the configuration is invalid.
    pub fn with_transport(config: MerchantConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let key_cache = PublicKeyCache::new(config.public_key_path.clone());
        Ok(Self { config: Arc::new(config), transport, key_cache })
    }

    /// Returns the merchant configuration.
    #[must_use]
    pub fn config(&self) -> &MerchantConfig {
        &self.config
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Transfers funds to a user's wallet.
    ///
    /// `mchid`, `mch_appid` and the sign mode are taken from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ProviderError`] if the provider rejects the request, or a
    /// transport/codec error.
    #[instrument(
        skip(self, params),
        fields(endpoint = "wallet_transfer", partner_trade_no = %params.partner_trade_no)
    )]
    pub async fn transfer_to_wallet(
        &self,
        params: WalletTransferParams,
    ) -> Result<WalletTransferResponse> {
        let request = WalletTransferRequest::new(params, self.config.identity());
        self.send(&self.config.endpoints.wallet_transfer(), &request).await
    }

    /// Queries a wallet transfer by `partner_trade_no`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ProviderError`] if the provider rejects the request, or a
    /// transport/codec error.
    #[instrument(
        skip(self, params),
        fields(endpoint = "wallet_transfer_query", partner_trade_no = %params.partner_trade_no)
    )]
    pub async fn query_wallet_transfer(
        &self,
        params: WalletTransferQueryParams,
    ) -> Result<WalletTransferQueryResponse> {
        let request = WalletTransferQueryRequest::new(params, self.config.identity());
        self.send(&self.config.endpoints.wallet_transfer_query(), &request).await
    }

    /// Transfers funds to a bank card.
    ///
    /// Fetches the provider public key if needed, then encrypts `enc_bank_no` and
    /// `enc_true_name` before sending.
    ///
    /// # Errors
    ///
    /// Returns any error of [`public_key`](Self::public_key),
    /// [`TransferError::CryptoError`] if the key is unusable, or the errors of
    /// [`transfer_to_wallet`](Self::transfer_to_wallet).
    #[instrument(
        skip(self, params),
        fields(endpoint = "bank_transfer", partner_trade_no = %params.partner_trade_no)
    )]
    pub async fn transfer_to_bank(&self, params: BankTransferParams) -> Result<BankTransferResponse> {
        let pem = self.public_key().await?;
        let encryptor = FieldEncryptor::from_pem(&pem, self.config.encryption_padding)?;
        let request = BankTransferRequest::encrypted(params, self.config.identity(), &encryptor)?;
        self.send(&self.config.endpoints.bank_transfer(), &request).await
    }

    /// Queries a bank transfer by `partner_trade_no`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ProviderError`] if the provider rejects the request, or a
    /// transport/codec error.
    #[instrument(
        skip(self, params),
        fields(endpoint = "bank_transfer_query", partner_trade_no = %params.partner_trade_no)
    )]
    pub async fn query_bank_transfer(
        &self,
        params: BankTransferQueryParams,
    ) -> Result<BankTransferQueryResponse> {
        let request = BankTransferQueryRequest::new(params, self.config.identity());
        self.send(&self.config.endpoints.bank_transfer_query(), &request).await
    }

    /// Returns the provider's RSA public key as PEM.
    ///
    /// Served from memory, then from `public_key_path`, and only then fetched from the
    /// provider. A persisted key is trusted as-is and never expires; call
    /// [`invalidate_public_key`](Self::invalidate_public_key) after a key rotation.
    ///
    /// # Errors
    ///
    /// - [`TransferError::ProviderError`] if issuance does not report success
    /// - [`TransferError::MerchantMismatch`] if the key was issued to another merchant;
    ///   nothing is persisted in that case
    /// - [`TransferError::IoError`] if the key file cannot be read or written
    pub async fn public_key(&self) -> Result<Arc<str>> {
        self.key_cache.get_or_fetch(|| self.fetch_public_key()).await
    }

    /// Forgets the cached public key and deletes the persisted file.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::IoError`] if the file cannot be removed.
    pub async fn invalidate_public_key(&self) -> Result<()> {
        self.key_cache.invalidate().await
    }

    #[instrument(skip(self), fields(endpoint = "public_key"))]
    async fn fetch_public_key(&self) -> Result<String> {
        let request = PublicKeyRequest::new(self.config.identity());
        let url = self.config.endpoints.public_key();
        info!("requesting public key from provider");

        let body = sign::encode_request(&request, &self.config.secret_key)?;
        let raw = self.transport.post(&url, body).await?;
        let response: PublicKeyResponse = sign::decode_response(&raw)?;
        let status = response.status();

        if !status.is_success() {
            let (code, message) = if status.is_return_success() {
                (
                    status.err_code.clone().unwrap_or_else(|| FAIL.to_owned()),
                    status.err_code_des.clone().unwrap_or_default(),
                )
            } else {
                (status.return_code.clone(), status.return_msg.clone().unwrap_or_default())
            };
            warn!(code = %code, "public key issuance failed");
            return Err(TransferError::ProviderError { code, message });
        }

        let actual = response.mch_id.unwrap_or_default();
        if actual != self.config.merchant_id {
            warn!(actual = %actual, "public key issued for another merchant");
            return Err(TransferError::MerchantMismatch {
                expected: self.config.merchant_id.clone(),
                actual,
            });
        }

        response.pub_key.filter(|pem| !pem.is_empty()).ok_or_else(|| {
            TransferError::ProviderError {
                code: FAIL.to_owned(),
                message: "public key missing from issuance response".to_owned(),
            }
        })
    }

    async fn send<P, R>(&self, url: &str, payload: &P) -> Result<R>
    where
        P: Serialize + Sync,
        R: DeserializeOwned + ProviderResponse,
    {
        let body = sign::encode_request(payload, &self.config.secret_key)?;
        debug!(url, protocol = self.transport.protocol_name(), "dispatching request");

        let raw = self.transport.post(url, body).await?;
        let response: R = sign::decode_response(&raw)?;
        let status = response.status();

        if status.return_code == FAIL {
            let message = status.return_msg.clone().unwrap_or_default();
            warn!(message = %message, "provider rejected request");
            return Err(TransferError::ProviderError { code: FAIL.to_owned(), message });
        }

        if status.is_result_success() {
            debug!("provider reported success");
        } else {
            warn!(
                err_code = status.err_code.as_deref().unwrap_or_default(),
                "provider reported business failure"
            );
        }

        Ok(response)
    }
}
