//! Node key material — ed25519 seed, public/private key values, and the
//! [`KeyGenerator`] seam used by identity creation.
//!
//! Both keys serialize to URL-safe unpadded base64 of their 32 raw bytes:
//! the public key is the ed25519 verifying key, the private key is the
//! signing key seed. The same text form is used in the database and in
//! configuration overrides.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Random seed material a keypair is derived from.
pub struct Seed([u8; 32]);

impl Seed {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Public half of the node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePublicKey([u8; 32]);

/// Private half of the node identity (ed25519 signing key seed).
#[derive(Clone, PartialEq, Eq)]
pub struct NodePrivateKey([u8; 32]);

impl NodePublicKey {
    /// Parse the base64 text form, rejecting anything that is not a valid
    /// ed25519 point.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        let bytes = decode_32(s, "public key")?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| AppError::InvalidOverride(format!("public key is not a valid point: {e}")))?;
        Ok(Self(bytes))
    }

    pub fn to_human(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Short fingerprint for logs: first 8 hex chars of `SHA256(public_key)`.
    pub fn node_id(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(digest)[..8].to_string()
    }
}

impl fmt::Display for NodePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_human())
    }
}

impl NodePrivateKey {
    pub fn parse(s: &str) -> Result<Self, AppError> {
        decode_32(s, "private key").map(Self)
    }

    pub fn to_human(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Public key this private key derives.
    pub fn public_key(&self) -> NodePublicKey {
        NodePublicKey(SigningKey::from_bytes(&self.0).verifying_key().to_bytes())
    }
}

impl fmt::Debug for NodePrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodePrivateKey(..)")
    }
}

fn decode_32(s: &str, what: &str) -> Result<[u8; 32], AppError> {
    if s.is_empty() {
        return Err(AppError::InvalidOverride(format!("{what} is empty")));
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| AppError::InvalidOverride(format!("{what} is not base64: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| AppError::InvalidOverride(format!("{what} is not 32 bytes")))
}

/// Source of fresh node keys.
pub trait KeyGenerator: Send + Sync {
    fn new_seed(&self) -> Seed;

    fn derive_public(&self, seed: &Seed) -> NodePublicKey;

    fn derive_private(&self, seed: &Seed) -> NodePrivateKey;

    /// Opaque transport parameter material of `bits` length, stored next to
    /// the identity and never interpreted here.
    fn aux_params(&self, bits: usize) -> Vec<u8>;
}

/// ed25519 keys from the OS CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Generator;

impl KeyGenerator for Ed25519Generator {
    fn new_seed(&self) -> Seed {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Seed(bytes)
    }

    fn derive_public(&self, seed: &Seed) -> NodePublicKey {
        NodePublicKey(SigningKey::from_bytes(&seed.0).verifying_key().to_bytes())
    }

    fn derive_private(&self, seed: &Seed) -> NodePrivateKey {
        NodePrivateKey(SigningKey::from_bytes(&seed.0).to_bytes())
    }

    fn aux_params(&self, bits: usize) -> Vec<u8> {
        let mut buf = vec![0u8; bits.div_ceil(8)];
        OsRng.fill_bytes(&mut buf);
        buf
    }
}
