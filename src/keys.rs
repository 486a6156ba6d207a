//! Key derivation for vwgen
//!
//! WireGuard keys are Curve25519 scalars. The public key of a node is
//! recovered from its declared private key, and stable link-layer and
//! overlay IPv6 addresses are hashed out of that public key so every
//! peer can compute them without exchanging anything.

use std::fmt;
use std::net::Ipv6Addr;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use ipnet::Ipv6Net;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::model::{NetworkConfig, NodeConfig};

/// Length of a Curve25519 key in bytes
pub const KEY_LEN: usize = 32;

/// Why a declared private key cannot be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("not valid base64")]
    InvalidBase64,

    #[error("invalid key length: {0} (expected 32)")]
    InvalidLength(usize),
}

/// Decode a base64 private key into its 32 raw bytes
pub fn decode_private_key(b64: &str) -> Result<[u8; KEY_LEN], KeyError> {
    let bytes = BASE64
        .decode(b64.trim())
        .map_err(|_| KeyError::InvalidBase64)?;
    if bytes.len() != KEY_LEN {
        return Err(KeyError::InvalidLength(bytes.len()));
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// Curve25519 base-point multiplication, as `wg pubkey` does it
pub fn derive_public_key(private_key: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
    let secret = StaticSecret::from(*private_key);
    PublicKey::from(&secret).to_bytes()
}

/// Base64 public key for a base64 private key
pub fn public_key_base64(private_key_b64: &str) -> Result<String, KeyError> {
    let secret = decode_private_key(private_key_b64)?;
    Ok(BASE64.encode(derive_public_key(&secret)))
}

/// Public key of a node, if it declares a usable private key
pub fn node_public_key(node: &NodeConfig) -> Option<[u8; KEY_LEN]> {
    let secret = decode_private_key(node.private_key()?).ok()?;
    Some(derive_public_key(&secret))
}

/// Locally administered unicast MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Hash a public key into a MAC address
    pub fn from_public_key(public_key: &[u8; KEY_LEN]) -> Self {
        let hash = Sha256::digest(public_key);
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&hash[hash.len() - 6..]);
        // clear multicast, set locally administered
        mac[0] = (mac[0] & 0xfe) | 0x02;
        Self(mac)
    }

    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    pub fn is_unicast(&self) -> bool {
        self.0[0] & 0x01 == 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// MAC address of a node's VXLAN device
pub fn link_layer_address(node: &NodeConfig) -> Option<MacAddr> {
    node_public_key(node).map(|key| MacAddr::from_public_key(&key))
}

/// Self-assigned overlay address inside `pool`
///
/// Network bits come from the pool, host bits from the first 16 bytes of
/// `SHA-256(public key)`.
pub fn overlay_ipv6_in(pool: &Ipv6Net, public_key: &[u8; KEY_LEN]) -> Ipv6Net {
    let hash = Sha256::digest(public_key);
    let mut host = [0u8; 16];
    host.copy_from_slice(&hash[..16]);

    let network = u128::from(pool.network());
    let hostmask = u128::from(pool.hostmask());
    let addr = Ipv6Addr::from(network | (u128::from_be_bytes(host) & hostmask));

    // prefix length comes from an already valid Ipv6Net
    Ipv6Net::new(addr, pool.prefix_len()).unwrap_or(*pool)
}

/// Overlay IPv6 address of a node, if the network has a pool and the node a key
pub fn overlay_ipv6(network: &NetworkConfig, node: &NodeConfig) -> Option<Ipv6Net> {
    let pool = network.address_pool_ipv6.as_ref()?;
    let public_key = node_public_key(node)?;
    Some(overlay_ipv6_in(pool, &public_key))
}
