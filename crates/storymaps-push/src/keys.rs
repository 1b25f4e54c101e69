//! Application server key decoding
//!
//! VAPID public keys arrive base64url-encoded without padding. A key
//! that fails to decode is a degradation, not a failure: the manager
//! falls back to an unauthenticated subscription.

use crate::PushError;

/// Decode a URL-safe base64 application server key into raw bytes.
pub fn decode_server_key(key: &str) -> Result<Vec<u8>, PushError> {
    let trimmed = key.trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(PushError::InvalidKey("empty key".to_string()));
    }
    // A base64 stream can never leave exactly 6 bits over
    if trimmed.len() % 4 == 1 {
        return Err(PushError::InvalidKey(format!(
            "truncated key ({} characters)",
            trimmed.len()
        )));
    }

    let mut bits: u32 = 0;
    let mut nbits = 0;
    let mut out = Vec::with_capacity(trimmed.len() * 3 / 4);
    for c in trimmed.chars() {
        let value = match c {
            'A'..='Z' => c as u32 - 'A' as u32,
            'a'..='z' => c as u32 - 'a' as u32 + 26,
            '0'..='9' => c as u32 - '0' as u32 + 52,
            '+' | '-' => 62,
            '/' | '_' => 63,
            other => {
                return Err(PushError::InvalidKey(format!(
                    "unexpected character {:?}",
                    other
                )))
            }
        };
        bits = (bits << 6) | value;
        nbits += 6;
        if nbits >= 8 {
            nbits -= 8;
            out.push((bits >> nbits) as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_standard_and_url_safe_alphabets() {
        assert_eq!(decode_server_key("aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_server_key("aGVsbG8=").unwrap(), b"hello");
        // '-' and '_' stand in for '+' and '/'
        assert_eq!(decode_server_key("-_8").unwrap(), decode_server_key("+/8").unwrap());
    }

    #[test]
    fn decodes_a_vapid_shaped_key() {
        // 87 base64url characters = 65 bytes, the size of an
        // uncompressed P-256 point
        let key = "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM";
        let bytes = decode_server_key(key).unwrap();
        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[0], 0x04);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_server_key("").is_err());
        assert!(decode_server_key("===").is_err());
        assert!(decode_server_key("not a key!").is_err());
        // 5 chars % 4 == 1: impossible length
        assert!(decode_server_key("AAAAA").is_err());
    }
}
