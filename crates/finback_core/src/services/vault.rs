//! Reversible credential obfuscation.
//!
//! Secrets at rest are XOR-scrambled against a fixed key between two layers
//! of base64: percent-encode, base64, XOR, base64. This keeps passwords out
//! of casual view in any string-typed store; it is deliberately *not*
//! cryptographic protection. The exact chain and key are load-bearing:
//! settings written by earlier releases must keep decrypting.

use crate::error::FinbackError;
use crate::models::profile::{decode_uri_component, encode_uri_component};
use base64::{engine::general_purpose::STANDARD, Engine};

const OBFUSCATION_KEY: &[u8] = b"MySql_B@ckup_T00l_S3cr3t_K3y";

/// Prefix marking a value an older writer failed to obfuscate and stored
/// as-is. Never produced here, but must be recognized on read.
const ENCRYPT_FAILED_TAG: &str = "[ENCRYPT_FAILED]";

/// Substrings identifying keys whose values must be obfuscated at rest.
const SENSITIVE_KEY_MARKERS: [&str; 5] = ["password", "secret", "token", "apikey", "accesskey"];

/// Obfuscate a value for storage. Empty input stays empty.
pub fn encrypt(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let encoded = encode_uri_component(text);
    let inner = STANDARD.encode(encoded.as_bytes());
    let scrambled = xor_with_key(inner.as_bytes());
    STANDARD.encode(scrambled)
}

/// Recover the plaintext from an obfuscated value.
///
/// Total over arbitrary input: values carrying the failure tag come back
/// with the tag stripped, and anything that does not survive the inverse
/// chain is returned unchanged.
pub fn decrypt(value: &str) -> String {
    match decrypt_strict(value) {
        Ok(plain) => plain,
        Err(e) => {
            tracing::debug!(error = %e, "value did not decrypt, returning it unchanged");
            value.to_string()
        }
    }
}

/// Recover the plaintext, reporting failure instead of echoing the input.
///
/// Used where ciphertext must never leak through as a value, such as
/// password fields.
pub fn decrypt_strict(value: &str) -> Result<String, FinbackError> {
    if value.is_empty() {
        return Ok(String::new());
    }
    if let Some(rest) = value.strip_prefix(ENCRYPT_FAILED_TAG) {
        return Ok(rest.to_string());
    }

    let scrambled = STANDARD
        .decode(value)
        .map_err(|e| FinbackError::decryption(format!("outer base64 decode failed: {e}")))?;
    let inner = xor_with_key(&scrambled);
    let encoded = STANDARD
        .decode(&inner)
        .map_err(|e| FinbackError::decryption(format!("inner base64 decode failed: {e}")))?;
    let encoded = String::from_utf8(encoded)
        .map_err(|e| FinbackError::decryption(format!("descrambled value is not text: {e}")))?;
    decode_uri_component(&encoded)
        .map_err(|e| FinbackError::decryption(format!("percent-decode failed: {e}")))
}

/// Heuristic check whether a stored value looks like vault output.
///
/// True only for untagged values longer than 16 chars consisting entirely
/// of base64 alphabet characters. Short ciphertexts are misclassified as
/// plaintext; callers that cannot accept that use [`try_decrypt`] or
/// [`decrypt_strict`] instead.
pub fn is_encrypted(value: &str) -> bool {
    if value.is_empty() || value.starts_with(ENCRYPT_FAILED_TAG) {
        return false;
    }

    value.len() > 16
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

/// Decrypt if the value plausibly came from the vault, otherwise pass it
/// through. Never fails.
pub fn try_decrypt(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    if let Some(rest) = value.strip_prefix(ENCRYPT_FAILED_TAG) {
        return rest.to_string();
    }

    // Only attempt the chain on strict base64; anything else is plaintext.
    if !base64_round_trips(value) {
        return value.to_string();
    }

    decrypt_strict(value).unwrap_or_else(|_| value.to_string())
}

/// Whether a settings key names a value that must be obfuscated at rest.
/// Matching is a case-insensitive substring test.
pub fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_KEY_MARKERS.iter().any(|marker| lowered.contains(marker))
}

fn xor_with_key(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ OBFUSCATION_KEY[i % OBFUSCATION_KEY.len()])
        .collect()
}

fn base64_round_trips(value: &str) -> bool {
    STANDARD.decode(value).map(|decoded| STANDARD.encode(decoded) == value).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_ascii() {
        let plain = "hunter2";
        assert_eq!(decrypt(&encrypt(plain)), plain);
    }

    #[test]
    fn test_round_trip_unicode_and_symbols() {
        for plain in ["pässwörd", "密码123", "a b&c=d?e#f", "p@ss:w/ord", "100% sure!"] {
            assert_eq!(decrypt(&encrypt(plain)), plain, "round trip failed for {plain:?}");
        }
    }

    #[test]
    fn test_empty_string_passes_through() {
        assert_eq!(encrypt(""), "");
        assert_eq!(decrypt(""), "");
        assert_eq!(try_decrypt(""), "");
        assert!(!is_encrypted(""));
    }

    #[test]
    fn test_known_ciphertext_stays_stable() {
        // Pinned output; existing stores depend on this exact chain.
        assert_eq!(encrypt("test"), "KT4FCwgef30=");
        assert_eq!(decrypt("KT4FCwgef30="), "test");
    }

    #[test]
    fn test_is_encrypted_heuristic() {
        // Long enough ciphertext is recognized
        assert!(is_encrypted(&encrypt("my-secret-password")));
        // Short ciphertext slips under the length threshold
        assert!(!is_encrypted(&encrypt("test")));
        // Plaintext with characters outside the base64 alphabet
        assert!(!is_encrypted("definitely not encrypted!"));
        // Tagged fallback values are not ciphertext
        assert!(!is_encrypted("[ENCRYPT_FAILED]whatever-came-before"));
    }

    #[test]
    fn test_decrypt_returns_garbage_unchanged() {
        assert_eq!(decrypt("not base64 at all"), "not base64 at all");
        // Valid base64 that was never produced by the vault
        assert_eq!(decrypt("aGVsbG8gd29ybGQ="), "aGVsbG8gd29ybGQ=");
    }

    #[test]
    fn test_decrypt_strict_reports_failure() {
        assert!(decrypt_strict("not base64 at all").is_err());
        assert_eq!(decrypt_strict(&encrypt("s3cret")).unwrap(), "s3cret");
    }

    #[test]
    fn test_tagged_fallback_is_stripped() {
        assert_eq!(decrypt("[ENCRYPT_FAILED]raw-password"), "raw-password");
        assert_eq!(try_decrypt("[ENCRYPT_FAILED]raw-password"), "raw-password");
        assert_eq!(decrypt_strict("[ENCRYPT_FAILED]raw-password").unwrap(), "raw-password");
    }

    #[test]
    fn test_try_decrypt_passes_plaintext_through() {
        assert_eq!(try_decrypt("plain old value"), "plain old value");
        assert_eq!(try_decrypt("localhost"), "localhost");
    }

    #[test]
    fn test_try_decrypt_inverts_encrypt() {
        let plain = "p@ssw0rd with spaces";
        assert_eq!(try_decrypt(&encrypt(plain)), plain);
    }

    #[test]
    fn test_sensitive_key_markers() {
        assert!(is_sensitive_key("database.password"));
        assert!(is_sensitive_key("dbPassword"));
        assert!(is_sensitive_key("api_secret"));
        assert!(is_sensitive_key("authToken"));
        assert!(is_sensitive_key("apiKey"));
        assert!(is_sensitive_key("APIKEY"));
        assert!(is_sensitive_key("aws.accessKeyId"));

        assert!(!is_sensitive_key("username"));
        assert!(!is_sensitive_key("database.host"));
        assert!(!is_sensitive_key("backup.path"));
    }
}
