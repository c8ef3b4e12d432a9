//! Webhook signature verification using HMAC-SHA256.
//!
//! The relay signs every delivery with a shared secret and sends the result in
//! the `X-Hub-Signature-256` header as `sha256=<hex>`. Verification happens
//! before the payload is parsed or dispatched.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Parses a signature header (`sha256=<hex>`) into raw digest bytes.
///
/// Returns `None` for a missing prefix or invalid hex. Never panics.
///
/// ```
/// use community_robot::webhooks::parse_signature_header;
///
/// assert!(parse_signature_header("sha256=abcd1234").is_some());
/// assert!(parse_signature_header("abcd1234").is_none());
/// assert!(parse_signature_header("sha1=abcd1234").is_none());
/// assert!(parse_signature_header("sha256=xyz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix(SIGNATURE_PREFIX)?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 digest of a payload.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a digest as a header value (`sha256=<hex>`).
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(signature))
}

/// Verifies a delivery signature against the raw body and shared secret.
///
/// Returns `false` when the header is malformed. The digest comparison is
/// constant-time.
///
/// ```
/// use community_robot::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let payload = br#"{"action":"opened"}"#;
/// let header = format_signature_header(&compute_signature(payload, b"hook-secret"));
///
/// assert!(verify_signature(payload, &header, b"hook-secret"));
/// assert!(!verify_signature(payload, &header, b"other-secret"));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);

    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// HMAC zero-pads short keys, so keys that differ only in trailing zero
    /// bytes produce the same MAC.
    fn distinct_hmac_keys(a: &[u8], b: &[u8]) -> bool {
        fn trim(k: &[u8]) -> &[u8] {
            let end = k.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            &k[..end]
        }
        if a.len() > 64 || b.len() > 64 {
            return a != b;
        }
        trim(a) != trim(b)
    }

    // ========================================================================
    // Header parsing
    // ========================================================================

    #[test]
    fn parse_header_valid() {
        assert_eq!(
            parse_signature_header("sha256=1234abcd"),
            Some(vec![0x12, 0x34, 0xab, 0xcd])
        );
    }

    #[test]
    fn parse_header_full_digest() {
        let header = format!("sha256={}", "a".repeat(64));
        assert_eq!(parse_signature_header(&header).map(|s| s.len()), Some(32));
    }

    #[test]
    fn parse_header_rejects_missing_prefix() {
        assert_eq!(parse_signature_header("1234abcd"), None);
        assert_eq!(parse_signature_header(""), None);
    }

    #[test]
    fn parse_header_rejects_other_algorithms() {
        assert_eq!(parse_signature_header("sha1=1234abcd"), None);
    }

    #[test]
    fn parse_header_rejects_bad_hex() {
        assert_eq!(parse_signature_header("sha256=xyz"), None);
        assert_eq!(parse_signature_header("sha256=abc"), None);
    }

    #[test]
    fn parse_header_accepts_uppercase_hex() {
        assert_eq!(
            parse_signature_header("sha256=ABCD1234"),
            Some(vec![0xab, 0xcd, 0x12, 0x34])
        );
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// RFC 4231 test case 2.
    #[test]
    fn known_vector() {
        let sig = compute_signature(b"what do ya want for nothing?", b"Jefe");
        assert_eq!(
            hex::encode(sig),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let payload = br#"{"action":"opened"}"#;
        let header = format_signature_header(&compute_signature(payload, b"correct"));

        assert!(verify_signature(payload, &header, b"correct"));
        assert!(!verify_signature(payload, &header, b"wrong"));
    }

    #[test]
    fn verify_rejects_modified_payload() {
        let header = format_signature_header(&compute_signature(b"original", b"secret"));
        assert!(!verify_signature(b"modified", &header, b"secret"));
    }

    #[test]
    fn verify_malformed_header_returns_false() {
        let payload = b"test";
        let secret = b"secret";

        for header in ["", "sha256=", "sha256=invalid", "sha1=abc123", "not-a-header"] {
            assert!(!verify_signature(payload, header, secret), "{header}");
        }
    }

    #[test]
    fn verify_empty_payload_and_secret() {
        let header = format_signature_header(&compute_signature(b"", b""));
        assert!(verify_signature(b"", &header, b""));
    }

    #[test]
    fn format_header_is_lower_hex() {
        assert_eq!(
            format_signature_header(&[0x12, 0x34, 0xab, 0xcd]),
            "sha256=1234abcd"
        );
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    proptest! {
        #[test]
        fn prop_sign_verify_roundtrip(payload: Vec<u8>, secret: Vec<u8>) {
            let header = format_signature_header(&compute_signature(&payload, &secret));
            prop_assert!(verify_signature(&payload, &header, &secret));
        }

        #[test]
        fn prop_wrong_secret_fails(payload: Vec<u8>, secret1: Vec<u8>, secret2: Vec<u8>) {
            prop_assume!(distinct_hmac_keys(&secret1, &secret2));

            let header = format_signature_header(&compute_signature(&payload, &secret1));
            prop_assert!(!verify_signature(&payload, &header, &secret2));
        }

        #[test]
        fn prop_modified_payload_fails(original: Vec<u8>, modified: Vec<u8>, secret: Vec<u8>) {
            prop_assume!(original != modified);

            let header = format_signature_header(&compute_signature(&original, &secret));
            prop_assert!(!verify_signature(&modified, &header, &secret));
        }

        #[test]
        fn prop_signature_length(payload: Vec<u8>, secret: Vec<u8>) {
            prop_assert_eq!(compute_signature(&payload, &secret).len(), 32);
        }

        #[test]
        fn prop_malformed_header_no_panic(header: String, payload: Vec<u8>, secret: Vec<u8>) {
            let _ = parse_signature_header(&header);
            let _ = verify_signature(&payload, &header, &secret);
        }
    }
}
