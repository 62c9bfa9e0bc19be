// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret decryption trait definition.
//!
//! Key management and the cipher itself are outside this crate. A
//! `SecretDecryptor` only has to recognize its own marker and turn a marked
//! value into plaintext.

use crate::domain::Result;

/// Default marker opening an encrypted value, e.g. `ENC(base64...)`.
pub const DEFAULT_ENCRYPTED_PREFIX: &str = "ENC(";

/// Default marker closing an encrypted value.
pub const DEFAULT_ENCRYPTED_SUFFIX: &str = ")";

/// Decrypts values that carry a recognized marker.
///
/// # Examples
///
/// ```rust
/// use dynacfg::ports::SecretDecryptor;
/// use dynacfg::domain::Result;
///
/// struct Reverse;
///
/// impl SecretDecryptor for Reverse {
///     fn decrypt(&self, ciphertext: &str) -> Result<String> {
///         Ok(ciphertext.chars().rev().collect())
///     }
/// }
///
/// assert_eq!(Reverse.decrypt_if_needed("ENC(terces)").unwrap(), "secret");
/// assert_eq!(Reverse.decrypt_if_needed("plain").unwrap(), "plain");
/// ```
pub trait SecretDecryptor: Send + Sync {
    /// Decrypts the payload found between the markers.
    fn decrypt(&self, ciphertext: &str) -> Result<String>;

    /// Marker that opens an encrypted value.
    fn prefix(&self) -> &str {
        DEFAULT_ENCRYPTED_PREFIX
    }

    /// Marker that closes an encrypted value.
    fn suffix(&self) -> &str {
        DEFAULT_ENCRYPTED_SUFFIX
    }

    /// Returns the payload if `value` is wrapped in this decryptor's markers.
    fn encrypted_payload<'a>(&self, value: &'a str) -> Option<&'a str> {
        value
            .strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_suffix(self.suffix()))
    }

    /// Decrypts `value` when it is marked, otherwise returns it unchanged.
    fn decrypt_if_needed(&self, value: &str) -> Result<String> {
        match self.encrypted_payload(value) {
            Some(payload) => self.decrypt(payload),
            None => Ok(value.to_string()),
        }
    }
}
