//! # Credential Codec
//!
//! Reversible, session-keyed obfuscation for `username:password` strings that
//! travel through form fields.
//!
//! The transform XORs the plaintext bytes with the key bytes (the key repeats
//! as needed). Cipher bytes cross the form boundary as standard base64. This
//! keeps credentials from sitting in clear text inside a submitted form; it
//! offers no protection against anyone holding the session cookie.
//!
//! ```rust
//! use cmdbridge_util::credential_codec::{decode_field, encode_field};
//! use cmdbridge_util::SessionKey;
//!
//! let key = SessionKey::from_cookie("c2Vzc2lvbg");
//! let field = encode_field("admin:secret", &key);
//! assert_eq!(decode_field(&field, &key).unwrap(), "admin:secret");
//! ```

use std::fmt;
use std::string::FromUtf8Error;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Key used to derive a session key from the raw cookie value.
pub const COOKIE_DERIVATION_KEY: &[u8] = b"_";

/// Errors surfaced while decoding a credential field.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The field is not valid base64.
    #[error("credential field is not valid base64: {0}")]
    Transport(#[from] base64::DecodeError),
    /// A percent-encoded query value did not decode to UTF-8.
    #[error("credential query value is not valid UTF-8: {0}")]
    QueryEncoding(#[from] std::str::Utf8Error),
    /// The decoded bytes are not UTF-8, usually because the key is wrong.
    #[error("decoded credential is not valid UTF-8")]
    NotUtf8(#[from] FromUtf8Error),
}

/// Per-session secret keying the codec.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    /// Derives the session key from the session cookie value.
    ///
    /// The cookie is itself encoded with [`COOKIE_DERIVATION_KEY`] and the
    /// base64 text of the result becomes the key.
    pub fn from_cookie(cookie: &str) -> Self {
        let derived = STANDARD.encode(encode(cookie, COOKIE_DERIVATION_KEY));
        Self(derived.into_bytes())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionKey").field(&"<redacted>").finish()
    }
}

/// Encodes `plaintext` with `key`. An empty key leaves the bytes unchanged.
pub fn encode(plaintext: &str, key: &[u8]) -> Vec<u8> {
    xor_with_key(plaintext.as_bytes(), key)
}

/// Reverses [`encode`].
pub fn decode(cipher: &[u8], key: &[u8]) -> Result<String, CodecError> {
    Ok(String::from_utf8(xor_with_key(cipher, key))?)
}

/// Encodes `plaintext` into a form-safe field value.
pub fn encode_field(plaintext: &str, key: &SessionKey) -> String {
    STANDARD.encode(encode(plaintext, key.as_bytes()))
}

/// Decodes a form field value produced by [`encode_field`].
pub fn decode_field(field: &str, key: &SessionKey) -> Result<String, CodecError> {
    let cipher = STANDARD.decode(field.trim())?;
    decode(&cipher, key.as_bytes())
}

/// Decodes a credential taken from a URL query string (percent-encoded base64).
pub fn decode_query_field(raw: &str, key: &SessionKey) -> Result<String, CodecError> {
    let unquoted = percent_decode_str(raw).decode_utf8()?;
    decode_field(&unquoted, key)
}

fn xor_with_key(bytes: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return bytes.to_vec();
    }
    bytes.iter().zip(key.iter().cycle()).map(|(byte, k)| byte ^ k).collect()
}
