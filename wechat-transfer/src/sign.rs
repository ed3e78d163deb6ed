//! Request envelope: nonce, signature and wire encoding.
//!
//! Every provider request carries a random `nonce_str` and an MD5 `sign` computed over
//! all other non-empty fields. Payloads built with [`SignType::NoSignType`] are signed the
//! same way, but the `sign_type` field itself is dropped from the wire because the
//! transfer APIs reject it.
//!
//! Signature algorithm:
//!
//! ```text
//! sign = upper(hex(MD5("k1=v1&k2=v2&...&key=<secret>")))
//! ```
//!
//! with keys sorted by byte value, `sign` excluded and empty values skipped.

use std::fmt::Write as _;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{Result, TransferError},
    xml::{self, XmlMap},
};

/// Field carrying the signature.
pub const SIGN_FIELD: &str = "sign";

/// Field carrying the signature mode.
pub const SIGN_TYPE_FIELD: &str = "sign_type";

/// Field carrying the per-request nonce.
pub const NONCE_FIELD: &str = "nonce_str";

/// Signature mode requested by a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignType {
    /// MD5 signature, `sign_type` sent on the wire.
    #[serde(rename = "MD5")]
    Md5,
    /// MD5 signature, `sign_type` omitted from the wire.
    #[serde(rename = "no_sign_type")]
    NoSignType,
}

impl SignType {
    /// Returns the wire value of this sign type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::NoSignType => "no_sign_type",
        }
    }
}

/// Generates a 32-character random nonce.
#[must_use]
pub fn nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Computes the MD5 signature of a payload map.
#[must_use]
pub fn sign_md5(fields: &XmlMap, secret: &str) -> String {
    let mut keys: Vec<&String> = fields.keys().filter(|k| k.as_str() != SIGN_FIELD).collect();
    keys.sort_unstable();

    let mut base = String::new();
    for key in keys {
        let Some(value) = signable_text(&fields[key.as_str()]) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        let _ = write!(base, "{key}={value}&");
    }
    let _ = write!(base, "key={secret}");

    Md5::digest(base.as_bytes()).iter().fold(String::with_capacity(32), |mut hex, byte| {
        let _ = write!(hex, "{byte:02X}");
        hex
    })
}

fn signable_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // Nested values are not part of any signed provider payload.
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Encodes a payload into a signed XML request body.
///
/// Steps:
/// 1. serialize `payload` to a map (`None` fields dropped)
/// 2. add `nonce_str` when the payload has none
/// 3. drop `sign_type` when it is `no_sign_type`
/// 4. add `sign`
///
/// # Errors
///
/// Returns [`TransferError::SerializationError`] if the payload is not a map, or
/// [`TransferError::XmlError`] if the document cannot be written.
pub fn encode_request<P: Serialize + ?Sized>(payload: &P, secret: &str) -> Result<String> {
    let fields = signed_fields(payload, secret)?;
    xml::map_to_xml(&fields)
}

/// Builds the signed field map for a payload without encoding it.
///
/// # Errors
///
/// Returns [`TransferError::SerializationError`] if the payload is not a map.
pub fn signed_fields<P: Serialize + ?Sized>(payload: &P, secret: &str) -> Result<XmlMap> {
    let mut fields = match serde_json::to_value(payload)
        .map_err(|e| TransferError::SerializationError(e.to_string()))?
    {
        Value::Object(map) => map,
        _ => {
            return Err(TransferError::SerializationError(
                "request payload must serialize to a map".to_owned(),
            ));
        }
    };

    fields.retain(|_, value| !value.is_null());
    fields.remove(SIGN_FIELD);

    let has_nonce = fields.get(NONCE_FIELD).and_then(Value::as_str).is_some_and(|n| !n.is_empty());
    if !has_nonce {
        fields.insert(NONCE_FIELD.to_owned(), Value::String(nonce()));
    }

    if fields.get(SIGN_TYPE_FIELD).and_then(Value::as_str) == Some(SignType::NoSignType.as_str()) {
        fields.remove(SIGN_TYPE_FIELD);
    }

    let sign = sign_md5(&fields, secret);
    fields.insert(SIGN_FIELD.to_owned(), Value::String(sign));

    Ok(fields)
}

/// Decodes a provider response body.
///
/// JSON bodies (starting with `{`) are parsed as JSON; everything else as XML. JSON
/// numbers and booleans are read as text so both encodings fit the same types.
///
/// # Errors
///
/// Returns [`TransferError::XmlError`] for malformed XML, or
/// [`TransferError::SerializationError`] if the body does not fit `R`.
pub fn decode_response<R: DeserializeOwned>(body: &str) -> Result<R> {
    if !body.trim_start().starts_with('{') {
        return xml::from_xml(body);
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| TransferError::SerializationError(e.to_string()))?;
    serde_json::from_value(scalars_as_text(value))
        .map_err(|e| TransferError::SerializationError(e.to_string()))
}

fn scalars_as_text(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(scalars_as_text).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, scalars_as_text(v))).collect())
        }
        Value::Null | Value::String(_) => value,
    }
}
