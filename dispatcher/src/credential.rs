use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Mints the short-lived, pod-and-node-bound credential a started pod
/// uses to authenticate its own agent connection back to the control
/// plane.
pub trait CredentialMinter: Send + Sync {
    fn mint(&self, pod_id: Uuid, node_id: Uuid) -> String;
}

/// HMAC-signed bearer token: `<expiry>.<hex(hmac(pod_id|node_id|expiry))>`.
/// The agent presents it back unmodified; the control plane recomputes the
/// signature rather than storing issued tokens.
pub struct HmacCredentialMinter {
    secret: Vec<u8>,
    ttl: Duration,
}

impl HmacCredentialMinter {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: std::time::Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::minutes(15)),
        }
    }

    fn sign(&self, pod_id: Uuid, node_id: Uuid, expiry: i64) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts a key of any length");
        mac.update(pod_id.as_bytes());
        mac.update(node_id.as_bytes());
        mac.update(&expiry.to_be_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl CredentialMinter for HmacCredentialMinter {
    fn mint(&self, pod_id: Uuid, node_id: Uuid) -> String {
        let expiry = (Utc::now() + self.ttl).timestamp();
        let signature = self.sign(pod_id, node_id, expiry);
        format!("{expiry}.{signature}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_is_bound_to_pod_and_node() {
        let minter = HmacCredentialMinter::new(b"secret".to_vec(), std::time::Duration::from_secs(60));
        let pod_id = Uuid::new_v4();
        let node_a = Uuid::new_v4();
        let node_b = Uuid::new_v4();
        let token_a = minter.mint(pod_id, node_a);
        let token_b = minter.mint(pod_id, node_b);
        assert_ne!(token_a, token_b);
    }
}
