//! Caller identity for the HTTP boundary.
//!
//! Token minting and password policy belong to an external credential
//! service; this module only defines the [`Authenticator`] seam and a small
//! HMAC bearer-token verifier.
//!
//! Token format: `<user_id>.<hex(hmac_sha256(secret, user_id))>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use kb_harness_core::models::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Resolves the `Authorization` header value to a caller.
///
/// `None` means anonymous; the access gate turns that into `Unauthenticated`.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, authorization: Option<&str>) -> Option<UserId>;
}

/// Verifies `Bearer <user_id>.<signature>` tokens signed with a shared secret.
pub struct HmacTokenAuthenticator {
    keyed: HmacSha256,
}

impl HmacTokenAuthenticator {
    pub fn new(secret: impl AsRef<[u8]>) -> anyhow::Result<Self> {
        let keyed = <HmacSha256 as Mac>::new_from_slice(secret.as_ref())
            .map_err(|e| anyhow::anyhow!("invalid auth secret: {}", e))?;
        Ok(Self { keyed })
    }

    fn mac(&self, user_id: UserId) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(user_id.to_string().as_bytes());
        mac
    }

    /// Mint a token for `user_id`.
    pub fn issue(&self, user_id: UserId) -> String {
        let sig = self.mac(user_id).finalize().into_bytes();
        format!("{}.{}", user_id, hex::encode(sig))
    }

    /// Check a bare token (without the `Bearer ` prefix).
    pub fn verify(&self, token: &str) -> Option<UserId> {
        let (id, sig) = token.split_once('.')?;
        let user_id: UserId = id.parse().ok()?;
        let sig = hex::decode(sig).ok()?;
        self.mac(user_id).verify_slice(&sig).ok()?;
        Some(user_id)
    }
}

impl Authenticator for HmacTokenAuthenticator {
    fn authenticate(&self, authorization: Option<&str>) -> Option<UserId> {
        let token = authorization?.trim().strip_prefix("Bearer ")?;
        self.verify(token.trim())
    }
}
