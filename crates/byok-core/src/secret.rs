// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plaintext credential payload.
//!
//! This is the only type that carries decrypted secrets. Its buffers are
//! zeroed on drop, and its `Debug` output never includes secret material.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::error::ByokError;

/// Decrypted credential secret: the primary API key plus provider-specific
/// secret fields (e.g. Twilio's account SID).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPayload {
    api_key: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, String>,
}

impl SecretPayload {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// The primary secret. This is what the credential's `key_hash` covers.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Serialize into a buffer that is zeroed when dropped.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, ByokError> {
        let mut writer = ZeroizingWriter(Zeroizing::new(Vec::with_capacity(self.worst_case_len())));
        serde_json::to_writer(&mut writer, self)
            .map_err(|e| ByokError::Encryption(format!("failed to serialize secret: {e}")))?;
        Ok(writer.0)
    }

    /// Upper bound on the serialized length: every byte escaped as `\u00XX`.
    fn worst_case_len(&self) -> usize {
        const ESCAPED: usize = 6;
        const FRAMING: usize = 32;
        const PER_FIELD: usize = 8;
        ESCAPED * self.api_key.len()
            + self
                .fields
                .iter()
                .map(|(k, v)| ESCAPED * (k.len() + v.len()) + PER_FIELD)
                .sum::<usize>()
            + FRAMING
    }

    /// Parse a decrypted buffer. The caller keeps ownership of the buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ByokError> {
        serde_json::from_slice(bytes)
            .map_err(|_| ByokError::Decryption("decrypted payload is malformed".to_string()))
    }
}

/// Writer whose buffers, including any it outgrows, are zeroed on drop.
struct ZeroizingWriter(Zeroizing<Vec<u8>>);

impl std::io::Write for ZeroizingWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        let needed = self.0.len() + data.len();
        if needed > self.0.capacity() {
            let mut grown = Zeroizing::new(Vec::with_capacity(needed.max(self.0.capacity() * 2)));
            grown.extend_from_slice(&self.0);
            self.0 = grown;
        }
        self.0.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for SecretPayload {
    fn drop(&mut self) {
        self.api_key.zeroize();
        for value in self.fields.values_mut() {
            value.zeroize();
        }
    }
}

impl std::fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretPayload")
            .field("api_key", &"[REDACTED]")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let secret = SecretPayload::new("sk-live-very-secret").with_field("account_sid", "AC123");
        let out = format!("{secret:?}");
        assert!(out.contains("[REDACTED]"));
        assert!(out.contains("account_sid"));
        assert!(!out.contains("sk-live-very-secret"));
        assert!(!out.contains("AC123"));
    }

    #[test]
    fn bytes_round_trip() {
        let secret = SecretPayload::new("key").with_field("account_sid", "AC1");
        let bytes = secret.to_bytes().unwrap();
        let back = SecretPayload::from_bytes(&bytes).unwrap();
        assert_eq!(back, secret);
        assert_eq!(back.field("account_sid"), Some("AC1"));
    }

    #[test]
    fn heavily_escaped_secret_fits_the_initial_buffer() {
        let nasty = "\"\\\u{1}\n".repeat(64);
        let secret = SecretPayload::new(nasty.clone()).with_field("account_sid", nasty);
        let bytes = secret.to_bytes().unwrap();
        assert!(bytes.len() <= secret.worst_case_len());
        assert_eq!(SecretPayload::from_bytes(&bytes).unwrap(), secret);
    }

    #[test]
    fn writer_keeps_content_when_it_grows() {
        use std::io::Write;

        let mut writer = ZeroizingWriter(Zeroizing::new(Vec::with_capacity(2)));
        writer.write_all(b"sk-").unwrap();
        writer.write_all(b"live-").unwrap();
        writer.write_all(&[b'x'; 40]).unwrap();
        assert_eq!(writer.0.len(), 48);
        assert!(writer.0.starts_with(b"sk-live-x"));
    }

    #[test]
    fn fields_omitted_when_empty() {
        let bytes = SecretPayload::new("abc").to_bytes().unwrap();
        assert_eq!(&bytes[..], br#"{"api_key":"abc"}"#);
    }

    #[test]
    fn malformed_bytes_are_a_decryption_error() {
        let err = SecretPayload::from_bytes(b"not json").unwrap_err();
        assert!(matches!(err, ByokError::Decryption(_)));
    }
}
