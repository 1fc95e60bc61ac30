//! QR payload codec.
//!
//! A descriptor travels as a compact JSON object with camelCase keys. The
//! plain form carries no integrity protection: the scanning side trusts it
//! at face value and only checks structure and the session date.
//!
//! When a [`PayloadKey`] is configured the issuer appends a `sig` field (hex
//! HMAC-SHA256 over the plain encoding) and the recorder refuses payloads
//! whose signature is missing or wrong.

use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use thiserror::Error;

use crate::{date::SessionDate, descriptor::SessionDescriptor};

type HmacSha256 = Hmac<Sha256>;

/// Field carrying the optional signature.
const SIG_FIELD: &str = "sig";

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
  #[error("malformed payload: {0}")]
  MalformedPayload(String),

  #[error("missing required field: {0}")]
  MissingRequiredField(&'static str),

  #[error("payload signature is missing or invalid")]
  InvalidSignature,
}

// ─── Plain codec ─────────────────────────────────────────────────────────────

fn to_value(d: &SessionDescriptor) -> Value {
  json!({
    "subjectId":       d.subject_id,
    "subjectName":     d.subject_name,
    "sessionDate":     d.session_date.to_string(),
    "issuedAtEpochMs": d.issued_at_epoch_ms,
    "departmentScope": d.department_scope,
    "valid":           d.valid,
  })
}

/// Encode a descriptor as its transport string.
pub fn encode(descriptor: &SessionDescriptor) -> String {
  to_value(descriptor).to_string()
}

/// Wire shape accepted on decode. Only `subjectId` and `sessionDate` are
/// mandatory; everything else falls back to a default when absent.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
  subject_id:         Option<String>,
  subject_name:       Option<String>,
  session_date:       Option<String>,
  issued_at_epoch_ms: Option<i64>,
  department_scope:   Option<String>,
  valid:              Option<bool>,
  sig:                Option<String>,
}

fn parse_raw(raw: &str) -> Result<RawPayload, DecodeError> {
  let value: Value = serde_json::from_str(raw.trim())
    .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;
  if !value.is_object() {
    return Err(DecodeError::MalformedPayload(
      "payload is not a JSON object".to_owned(),
    ));
  }
  serde_json::from_value(value)
    .map_err(|e| DecodeError::MalformedPayload(e.to_string()))
}

fn into_descriptor(raw: RawPayload) -> Result<SessionDescriptor, DecodeError> {
  let subject_id = raw
    .subject_id
    .filter(|s| !s.is_empty())
    .ok_or(DecodeError::MissingRequiredField("subjectId"))?;
  let date_str = raw
    .session_date
    .filter(|s| !s.is_empty())
    .ok_or(DecodeError::MissingRequiredField("sessionDate"))?;
  let session_date = SessionDate::parse(&date_str)
    .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

  Ok(SessionDescriptor {
    subject_id,
    subject_name: raw.subject_name.unwrap_or_default(),
    session_date,
    issued_at_epoch_ms: raw.issued_at_epoch_ms.unwrap_or_default(),
    department_scope: raw.department_scope.unwrap_or_default(),
    valid: raw.valid.unwrap_or_default(),
  })
}

/// Decode a scanned string. A `sig` field, if present, is ignored.
pub fn decode(raw: &str) -> Result<SessionDescriptor, DecodeError> {
  into_descriptor(parse_raw(raw)?)
}

// ─── Signed codec ────────────────────────────────────────────────────────────

/// Secret used to sign and verify payloads.
#[derive(Clone)]
pub struct PayloadKey {
  mac: HmacSha256,
}

impl PayloadKey {
  pub fn new(secret: impl AsRef<[u8]>) -> crate::Result<Self> {
    let secret = secret.as_ref();
    if secret.is_empty() {
      return Err(crate::Error::EmptySigningKey);
    }
    // HMAC accepts keys of any length; only emptiness is rejected above.
    let mac = HmacSha256::new_from_slice(secret)
      .map_err(|_| crate::Error::EmptySigningKey)?;
    Ok(Self { mac })
  }

  /// A fresh random 256-bit key.
  pub fn generate() -> crate::Result<Self> {
    let mut buf = [0u8; 32];
    OsRng.fill_bytes(&mut buf);
    Self::new(buf)
  }

  fn sign(&self, message: &str) -> String {
    let mut mac = self.mac.clone();
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
  }

  fn verify(&self, message: &str, sig_hex: &str) -> bool {
    let Ok(expected) = hex::decode(sig_hex) else {
      return false;
    };
    let mut mac = self.mac.clone();
    mac.update(message.as_bytes());
    mac.verify_slice(&expected).is_ok()
  }
}

impl std::fmt::Debug for PayloadKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("PayloadKey(..)")
  }
}

/// Encode a descriptor and append its signature.
pub fn encode_signed(descriptor: &SessionDescriptor, key: &PayloadKey) -> String {
  let mut value = to_value(descriptor);
  let sig = key.sign(&value.to_string());
  if let Value::Object(map) = &mut value {
    map.insert(SIG_FIELD.to_owned(), Value::String(sig));
  }
  value.to_string()
}

/// Decode a scanned string and verify its signature against `key`.
///
/// Structural errors take precedence over signature errors so the scanning
/// side reports the same failure for garbage regardless of signing mode.
pub fn decode_verified(
  raw: &str,
  key: &PayloadKey,
) -> Result<SessionDescriptor, DecodeError> {
  let mut payload = parse_raw(raw)?;
  let sig = payload.sig.take();
  let descriptor = into_descriptor(payload)?;
  let sig = sig.ok_or(DecodeError::InvalidSignature)?;
  if !key.verify(&encode(&descriptor), &sig) {
    return Err(DecodeError::InvalidSignature);
  }
  Ok(descriptor)
}
