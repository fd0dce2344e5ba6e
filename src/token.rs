// 🔐 Session Token Codec - reversible account id <-> bearer token
//
// AES-256-GCM over the account UUID bytes, random 96-bit nonce, encoded as
// base64(nonce || ciphertext). The token is opaque to callers and useless
// without the process secret; GCM authentication means a tampered token
// fails to decode instead of resolving to a different account.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use uuid::Uuid;

use crate::error::LedgerError;

const NONCE_LENGTH: usize = 12;
pub const SECRET_LENGTH: usize = 32;

#[derive(Clone)]
pub struct TokenCodec {
    cipher: Aes256Gcm,
}

impl TokenCodec {
    /// Build a codec from a 32-byte secret
    pub fn new(secret: &[u8]) -> Result<Self, LedgerError> {
        if secret.len() != SECRET_LENGTH {
            return Err(LedgerError::Token(format!(
                "secret must be {SECRET_LENGTH} bytes, got {}",
                secret.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(secret)
            .map_err(|e| LedgerError::Token(format!("invalid secret: {e}")))?;
        Ok(TokenCodec { cipher })
    }

    /// Encode an account id into an opaque bearer token
    pub fn encode(&self, account_id: Uuid) -> Result<String, LedgerError> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, account_id.as_bytes().as_slice())
            .map_err(|_| LedgerError::Token("encryption failed".to_string()))?;

        let mut raw = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        raw.extend_from_slice(&nonce_bytes);
        raw.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(raw))
    }

    /// Decode a bearer token back to the account id it was issued for
    pub fn decode(&self, token: &str) -> Result<Uuid, LedgerError> {
        let raw = BASE64
            .decode(token)
            .map_err(|_| LedgerError::Token("malformed token".to_string()))?;
        if raw.len() <= NONCE_LENGTH {
            return Err(LedgerError::Token("token too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LENGTH);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| LedgerError::Token("token authentication failed".to_string()))?;

        Uuid::from_slice(&plaintext)
            .map_err(|_| LedgerError::Token("token payload is not an account id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(&[7u8; SECRET_LENGTH]).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let codec = codec();
        let id = Uuid::new_v4();
        let token = codec.encode(id).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), id);
    }

    #[test]
    fn test_tokens_are_unique_per_encoding() {
        // Fresh nonce every time: the same account never yields the same token
        let codec = codec();
        let id = Uuid::new_v4();
        let t1 = codec.encode(id).unwrap();
        let t2 = codec.encode(id).unwrap();
        assert_ne!(t1, t2);
        assert_eq!(codec.decode(&t1).unwrap(), codec.decode(&t2).unwrap());
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let codec = codec();
        let token = codec.encode(Uuid::new_v4()).unwrap();

        let mut raw = BASE64.decode(&token).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = BASE64.encode(raw);

        assert!(codec.decode(&tampered).is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = codec().encode(Uuid::new_v4()).unwrap();
        let other = TokenCodec::new(&[9u8; SECRET_LENGTH]).unwrap();
        assert!(other.decode(&token).is_err());
    }

    #[test]
    fn test_garbage_tokens_are_rejected() {
        let codec = codec();
        assert!(codec.decode("not base64 at all!!!").is_err());
        assert!(codec.decode("").is_err());
        assert!(codec.decode(&BASE64.encode([0u8; 4])).is_err());
    }

    #[test]
    fn test_secret_length_enforced() {
        assert!(TokenCodec::new(&[1u8; 16]).is_err());
        assert!(TokenCodec::new(&[1u8; 32]).is_ok());
    }
}
