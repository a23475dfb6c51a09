/*
[INPUT]:  Canonical query strings and the API secret
[OUTPUT]: Lowercase hex HMAC-SHA256 signatures
[POS]:    HTTP layer - request signing for authenticated endpoints
[UPDATE]: When changing signing algorithm or signature encoding
*/

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs query strings for authenticated endpoints
#[derive(Clone)]
pub struct RequestSigner {
    secret: Box<[u8]>,
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl RequestSigner {
    /// Create a new request signer keyed by the API secret
    pub fn new(api_secret: impl Into<String>) -> Self {
        Self {
            secret: api_secret.into().into_bytes().into_boxed_slice(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    /// Sign a payload, returning the lowercase hex HMAC-SHA256 digest
    pub fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a hex signature against a payload in constant time
    pub fn verify(&self, payload: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}
