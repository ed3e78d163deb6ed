//! Request and response types for the transfer APIs.
//!
//! Field names mirror the provider's schema. Caller-facing `*Params` types carry only
//! business fields; the `*Request` types are the complete payloads, produced by their
//! `new` builders from params plus a [`MerchantIdentity`]. Credential fields and the
//! sign mode are always taken from the identity, never from the caller.
//!
//! Amounts are in fen (1/100 CNY). Response fields are kept as the provider's text.

use serde::{Deserialize, Serialize};

use crate::{crypto::FieldEncryptor, error::Result, sign::SignType};

/// Status value used by the provider for success.
pub const SUCCESS: &str = "SUCCESS";

/// Status value used by the provider for failure.
pub const FAIL: &str = "FAIL";

/// Provider-issued identifiers injected into every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerchantIdentity<'a> {
    /// Merchant id (`mch_id` / `mchid`).
    pub merchant_id: &'a str,
    /// Application id (`appid` / `mch_appid`).
    pub app_id: &'a str,
}

/// Real-name check mode for wallet transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckName {
    /// Do not check the recipient's real name.
    #[default]
    NoCheck,
    /// Reject the transfer unless `re_user_name` matches the recipient's real name.
    ForceCheck,
}

/// Parameters of a transfer to a user's wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransferParams {
    /// Merchant-side unique transfer number.
    pub partner_trade_no: String,
    /// Recipient's `openid` under the configured app.
    pub openid: String,
    /// Real-name check mode.
    #[serde(default)]
    pub check_name: CheckName,
    /// Recipient's real name, required with [`CheckName::ForceCheck`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub re_user_name: Option<String>,
    /// Amount in fen.
    pub amount: u64,
    /// Transfer note shown to the recipient.
    pub desc: String,
    /// Caller's IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spbill_create_ip: Option<String>,
    /// Terminal device id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
}

/// Complete wallet transfer payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletTransferRequest {
    /// Application id.
    pub mch_appid: String,
    /// Merchant id.
    pub mchid: String,
    /// Sign mode, always [`SignType::NoSignType`].
    pub sign_type: SignType,
    /// Business fields.
    #[serde(flatten)]
    pub params: WalletTransferParams,
}

impl WalletTransferRequest {
    /// Builds the payload, injecting identity and sign mode.
    #[must_use]
    pub fn new(params: WalletTransferParams, identity: MerchantIdentity<'_>) -> Self {
        Self {
            mch_appid: identity.app_id.to_owned(),
            mchid: identity.merchant_id.to_owned(),
            sign_type: SignType::NoSignType,
            params,
        }
    }
}

/// Parameters of a wallet transfer query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransferQueryParams {
    /// Merchant-side transfer number used when the transfer was created.
    pub partner_trade_no: String,
}

/// Complete wallet transfer query payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletTransferQueryRequest {
    /// Application id.
    pub appid: String,
    /// Merchant id.
    pub mch_id: String,
    /// Sign mode, always [`SignType::NoSignType`].
    pub sign_type: SignType,
    /// Business fields.
    #[serde(flatten)]
    pub params: WalletTransferQueryParams,
}

impl WalletTransferQueryRequest {
    /// Builds the payload, injecting identity and sign mode.
    #[must_use]
    pub fn new(params: WalletTransferQueryParams, identity: MerchantIdentity<'_>) -> Self {
        Self {
            appid: identity.app_id.to_owned(),
            mch_id: identity.merchant_id.to_owned(),
            sign_type: SignType::NoSignType,
            params,
        }
    }
}

/// Parameters of a transfer to a bank card.
///
/// `enc_bank_no` and `enc_true_name` are given in plaintext; the client encrypts them
/// before transmission.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransferParams {
    /// Merchant-side unique transfer number.
    pub partner_trade_no: String,
    /// Recipient's bank card number, plaintext.
    pub enc_bank_no: String,
    /// Recipient's real name, plaintext.
    pub enc_true_name: String,
    /// Provider bank code (for example `1002` for ICBC).
    pub bank_code: String,
    /// Amount in fen.
    pub amount: u64,
    /// Transfer note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl std::fmt::Debug for BankTransferParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankTransferParams")
            .field("partner_trade_no", &self.partner_trade_no)
            .field("enc_bank_no", &"<redacted>")
            .field("enc_true_name", &"<redacted>")
            .field("bank_code", &self.bank_code)
            .field("amount", &self.amount)
            .field("desc", &self.desc)
            .finish()
    }
}

/// Complete bank transfer payload with sensitive fields encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankTransferRequest {
    /// Merchant id.
    pub mch_id: String,
    /// Sign mode, always [`SignType::NoSignType`].
    pub sign_type: SignType,
    /// Merchant-side unique transfer number.
    pub partner_trade_no: String,
    /// Base64 RSA ciphertext of the card number.
    pub enc_bank_no: String,
    /// Base64 RSA ciphertext of the account holder's name.
    pub enc_true_name: String,
    /// Provider bank code.
    pub bank_code: String,
    /// Amount in fen.
    pub amount: u64,
    /// Transfer note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl BankTransferRequest {
    /// Builds the payload, encrypting the card number and name with `encryptor`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TransferError::CryptoError`] if either field cannot be encrypted.
    pub fn encrypted(
        params: BankTransferParams,
        identity: MerchantIdentity<'_>,
        encryptor: &FieldEncryptor,
    ) -> Result<Self> {
        Ok(Self {
            mch_id: identity.merchant_id.to_owned(),
            sign_type: SignType::NoSignType,
            enc_bank_no: encryptor.encrypt(&params.enc_bank_no)?,
            enc_true_name: encryptor.encrypt(&params.enc_true_name)?,
            partner_trade_no: params.partner_trade_no,
            bank_code: params.bank_code,
            amount: params.amount,
            desc: params.desc,
        })
    }
}

/// Parameters of a bank transfer query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransferQueryParams {
    /// Merchant-side transfer number used when the transfer was created.
    pub partner_trade_no: String,
}

/// Complete bank transfer query payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankTransferQueryRequest {
    /// Merchant id.
    pub mch_id: String,
    /// Sign mode, always [`SignType::NoSignType`].
    pub sign_type: SignType,
    /// Business fields.
    #[serde(flatten)]
    pub params: BankTransferQueryParams,
}

impl BankTransferQueryRequest {
    /// Builds the payload, injecting identity and sign mode.
    #[must_use]
    pub fn new(params: BankTransferQueryParams, identity: MerchantIdentity<'_>) -> Self {
        Self { mch_id: identity.merchant_id.to_owned(), sign_type: SignType::NoSignType, params }
    }
}

/// Public key issuance payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicKeyRequest {
    /// Merchant id.
    pub mch_id: String,
    /// Sign mode; this endpoint requires an explicit `MD5`.
    pub sign_type: SignType,
}

impl PublicKeyRequest {
    /// Builds the payload for the configured merchant.
    #[must_use]
    pub fn new(identity: MerchantIdentity<'_>) -> Self {
        Self { mch_id: identity.merchant_id.to_owned(), sign_type: SignType::Md5 }
    }
}

/// Status block shared by every provider response.
///
/// `return_code` reports whether the request was accepted at the protocol level;
/// `result_code` reports the business outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    /// Protocol status: `SUCCESS` or `FAIL`.
    pub return_code: String,
    /// Protocol message, set when `return_code` is `FAIL`.
    #[serde(default)]
    pub return_msg: Option<String>,
    /// Business status: `SUCCESS` or `FAIL`.
    #[serde(default)]
    pub result_code: Option<String>,
    /// Business error code.
    #[serde(default)]
    pub err_code: Option<String>,
    /// Business error description.
    #[serde(default)]
    pub err_code_des: Option<String>,
}

impl ProviderStatus {
    /// Returns `true` if the provider accepted the request.
    #[must_use]
    pub fn is_return_success(&self) -> bool {
        self.return_code == SUCCESS
    }

    /// Returns `true` if the business operation succeeded.
    #[must_use]
    pub fn is_result_success(&self) -> bool {
        self.result_code.as_deref() == Some(SUCCESS)
    }

    /// Returns `true` if both statuses report success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.is_return_success() && self.is_result_success()
    }
}

/// Responses carrying a [`ProviderStatus`].
pub trait ProviderResponse {
    /// Returns the status block.
    fn status(&self) -> &ProviderStatus;
}

macro_rules! provider_response {
    ($($ty:ty),+ $(,)?) => {
        $(impl ProviderResponse for $ty {
            fn status(&self) -> &ProviderStatus {
                &self.status
            }
        })+
    };
}

provider_response!(
    WalletTransferResponse,
    WalletTransferQueryResponse,
    BankTransferResponse,
    BankTransferQueryResponse,
    PublicKeyResponse,
);

/// Wallet transfer result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransferResponse {
    /// Status block.
    #[serde(flatten)]
    pub status: ProviderStatus,
    /// Application id.
    #[serde(default)]
    pub mch_appid: Option<String>,
    /// Merchant id.
    #[serde(default)]
    pub mchid: Option<String>,
    /// Terminal device id.
    #[serde(default)]
    pub device_info: Option<String>,
    /// Provider nonce.
    #[serde(default)]
    pub nonce_str: Option<String>,
    /// Merchant-side transfer number.
    #[serde(default)]
    pub partner_trade_no: Option<String>,
    /// Provider-side payment number.
    #[serde(default)]
    pub payment_no: Option<String>,
    /// Payment time (`YYYY-MM-DD HH:MM:SS`, China Standard Time).
    #[serde(default)]
    pub payment_time: Option<String>,
}

/// Wallet transfer query result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransferQueryResponse {
    /// Status block.
    #[serde(flatten)]
    pub status: ProviderStatus,
    /// Merchant-side transfer number.
    #[serde(default)]
    pub partner_trade_no: Option<String>,
    /// Application id.
    #[serde(default)]
    pub appid: Option<String>,
    /// Merchant id.
    #[serde(default)]
    pub mch_id: Option<String>,
    /// Provider-side payment number.
    #[serde(default)]
    pub detail_id: Option<String>,
    /// Transfer state: `SUCCESS`, `FAILED` or `PROCESSING`.
    #[serde(default, rename = "status")]
    pub status_text: Option<String>,
    /// Failure reason.
    #[serde(default)]
    pub reason: Option<String>,
    /// Recipient `openid`.
    #[serde(default)]
    pub openid: Option<String>,
    /// Recipient name.
    #[serde(default)]
    pub transfer_name: Option<String>,
    /// Amount in fen.
    #[serde(default)]
    pub payment_amount: Option<String>,
    /// Transfer initiation time.
    #[serde(default)]
    pub transfer_time: Option<String>,
    /// Transfer completion time.
    #[serde(default)]
    pub payment_time: Option<String>,
    /// Transfer note.
    #[serde(default)]
    pub desc: Option<String>,
}

/// Bank transfer result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransferResponse {
    /// Status block.
    #[serde(flatten)]
    pub status: ProviderStatus,
    /// Merchant id.
    #[serde(default)]
    pub mch_id: Option<String>,
    /// Merchant-side transfer number.
    #[serde(default)]
    pub partner_trade_no: Option<String>,
    /// Amount in fen.
    #[serde(default)]
    pub amount: Option<String>,
    /// Provider nonce.
    #[serde(default)]
    pub nonce_str: Option<String>,
    /// Provider signature of the response.
    #[serde(default)]
    pub sign: Option<String>,
    /// Provider-side payment number.
    #[serde(default)]
    pub payment_no: Option<String>,
    /// Fee in fen.
    #[serde(default)]
    pub cmms_amt: Option<String>,
}

/// Bank transfer query result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransferQueryResponse {
    /// Status block.
    #[serde(flatten)]
    pub status: ProviderStatus,
    /// Merchant id.
    #[serde(default)]
    pub mch_id: Option<String>,
    /// Merchant-side transfer number.
    #[serde(default)]
    pub partner_trade_no: Option<String>,
    /// Provider-side payment number.
    #[serde(default)]
    pub payment_no: Option<String>,
    /// MD5 of the card number.
    #[serde(default)]
    pub bank_no_md5: Option<String>,
    /// MD5 of the account holder's name.
    #[serde(default)]
    pub true_name_md5: Option<String>,
    /// Amount in fen.
    #[serde(default)]
    pub amount: Option<String>,
    /// Transfer state: `PROCESSING`, `SUCCESS`, `FAILED` or `BANK_FAIL`.
    #[serde(default, rename = "status")]
    pub status_text: Option<String>,
    /// Fee in fen.
    #[serde(default)]
    pub cmms_amt: Option<String>,
    /// Order creation time.
    #[serde(default)]
    pub create_time: Option<String>,
    /// Payment completion time.
    #[serde(default)]
    pub pay_succ_time: Option<String>,
    /// Failure reason.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Public key issuance result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    /// Status block.
    #[serde(flatten)]
    pub status: ProviderStatus,
    /// Merchant the key was issued to.
    #[serde(default)]
    pub mch_id: Option<String>,
    /// PKCS#1 PEM public key.
    #[serde(default)]
    pub pub_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::xml;

    const IDENTITY: MerchantIdentity<'static> =
        MerchantIdentity { merchant_id: "1900000109", app_id: "wxa1b2c3d4e5f60789" };

    fn wallet_params() -> WalletTransferParams {
        WalletTransferParams {
            partner_trade_no: "10000098201411111234567890".into(),
            openid: "oxTWIuGaIt6gTKsQRLau2M0yL16E".into(),
            check_name: CheckName::ForceCheck,
            re_user_name: Some("张三".into()),
            amount: 10099,
            desc: "理赔".into(),
            spbill_create_ip: None,
            device_info: None,
        }
    }

    #[test]
    fn test_wallet_transfer_request_injects_identity() {
        let request = WalletTransferRequest::new(wallet_params(), IDENTITY);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["mchid"], "1900000109");
        assert_eq!(value["mch_appid"], "wxa1b2c3d4e5f60789");
        assert_eq!(value["sign_type"], "no_sign_type");
        assert_eq!(value["check_name"], "FORCE_CHECK");
        assert_eq!(value["amount"], 10099);
        assert!(value.get("spbill_create_ip").is_none());
    }

    #[test]
    fn test_wallet_params_ignore_caller_credentials() {
        let params: WalletTransferParams = serde_json::from_value(json!({
            "partner_trade_no": "1",
            "openid": "o",
            "amount": 1,
            "desc": "d",
            "mchid": "attacker",
            "mch_appid": "attacker",
            "sign_type": "MD5",
        }))
        .unwrap();

        let value = serde_json::to_value(WalletTransferRequest::new(params, IDENTITY)).unwrap();
        assert_eq!(value["mchid"], "1900000109");
        assert_eq!(value["mch_appid"], "wxa1b2c3d4e5f60789");
        assert_eq!(value["sign_type"], "no_sign_type");
        assert_eq!(value["check_name"], "NO_CHECK");
    }

    #[test]
    fn test_query_requests_inject_identity() {
        let params = WalletTransferQueryParams { partner_trade_no: "1".into() };
        let value = serde_json::to_value(WalletTransferQueryRequest::new(params, IDENTITY)).unwrap();
        assert_eq!(value, json!({
            "appid": "wxa1b2c3d4e5f60789",
            "mch_id": "1900000109",
            "sign_type": "no_sign_type",
            "partner_trade_no": "1",
        }));

        let params = BankTransferQueryParams { partner_trade_no: "2".into() };
        let value = serde_json::to_value(BankTransferQueryRequest::new(params, IDENTITY)).unwrap();
        assert_eq!(value, json!({
            "mch_id": "1900000109",
            "sign_type": "no_sign_type",
            "partner_trade_no": "2",
        }));
    }

    #[test]
    fn test_public_key_request_uses_md5() {
        let value = serde_json::to_value(PublicKeyRequest::new(IDENTITY)).unwrap();
        assert_eq!(value, json!({ "mch_id": "1900000109", "sign_type": "MD5" }));
    }

    #[test]
    fn test_bank_params_debug_redacts() {
        let params = BankTransferParams {
            partner_trade_no: "1".into(),
            enc_bank_no: "6225760000000000".into(),
            enc_true_name: "张三".into(),
            bank_code: "1002".into(),
            amount: 100,
            desc: None,
        };
        let debug = format!("{params:?}");
        assert!(!debug.contains("6225760000000000"));
        assert!(!debug.contains("张三"));
    }

    #[test]
    fn test_provider_status_checks() {
        let status = ProviderStatus {
            return_code: SUCCESS.into(),
            result_code: Some(FAIL.into()),
            ..ProviderStatus::default()
        };
        assert!(status.is_return_success());
        assert!(!status.is_result_success());
        assert!(!status.is_success());
    }

    #[test]
    fn test_wallet_response_from_xml() {
        let body = "<xml>\
            <return_code><![CDATA[SUCCESS]]></return_code>\
            <return_msg><![CDATA[]]></return_msg>\
            <mch_appid><![CDATA[wxec38b8ff840bd989]]></mch_appid>\
            <mchid><![CDATA[10013274]]></mchid>\
            <nonce_str><![CDATA[lxuDzMnRjpcXzxLx0q]]></nonce_str>\
            <result_code><![CDATA[SUCCESS]]></result_code>\
            <partner_trade_no><![CDATA[10013574201505191526582441]]></partner_trade_no>\
            <payment_no><![CDATA[1000018301201505190181489473]]></payment_no>\
            <payment_time><![CDATA[2015-05-19 15:26:59]]></payment_time>\
            </xml>";

        let response: WalletTransferResponse = xml::from_xml(body).unwrap();
        assert!(response.status().is_success());
        assert_eq!(response.payment_no.as_deref(), Some("1000018301201505190181489473"));
        assert_eq!(response.status.return_msg.as_deref(), Some(""));
        assert!(response.device_info.is_none());
    }

    #[test]
    fn test_query_response_status_field_renamed() {
        // `status` on the wire is the transfer state, not the status block.
        let map: Value = json!({
            "return_code": "SUCCESS",
            "result_code": "SUCCESS",
            "status": "PROCESSING",
        });
        let response: BankTransferQueryResponse = serde_json::from_value(map).unwrap();
        assert_eq!(response.status_text.as_deref(), Some("PROCESSING"));
        assert!(response.status.is_success());
    }
}
