//! Node identity — load, create, and configuration override of the node's
//! persistent ed25519 keypair.
//!
//! The keypair lives in the wallet database's `NodeIdentity` table. It is
//! created once per data directory and only read afterwards. Override
//! credentials from configuration replace the stored pair in memory on every
//! load and are never written back.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::db::{DurableStore, NewIdentity, StoredIdentity};
use crate::error::AppError;
use crate::keys::{KeyGenerator, NodePrivateKey, NodePublicKey};

/// Bit lengths of the auxiliary transport parameter blobs written at creation.
const AUX_PARAM_BITS: (usize, usize) = (512, 1024);

/// The node's identity keypair. Both halves always travel together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    public_key: NodePublicKey,
    private_key: NodePrivateKey,
}

impl NodeIdentity {
    pub fn new(public_key: NodePublicKey, private_key: NodePrivateKey) -> Self {
        Self { public_key, private_key }
    }

    pub fn public_key(&self) -> &NodePublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &NodePrivateKey {
        &self.private_key
    }

    /// Short fingerprint of the public key, for logs.
    pub fn node_id(&self) -> String {
        self.public_key.node_id()
    }
}

/// Raw override credentials as they come out of configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityOverride {
    pub node_public: Option<String>,
    pub node_private: Option<String>,
}

impl IdentityOverride {
    /// Validate the configured pair.
    ///
    /// `Ok(None)` when neither half is configured. Fails with
    /// [`AppError::InvalidOverride`] when only one half is present, either
    /// half does not parse, or the public key is not the one the private key
    /// derives.
    pub fn resolve(&self) -> Result<Option<NodeIdentity>, AppError> {
        let (public, private) = match (self.node_public.as_deref(), self.node_private.as_deref()) {
            (None, None) => return Ok(None),
            (Some(public), Some(private)) => (public, private),
            (Some(_), None) => {
                return Err(AppError::InvalidOverride("node_public set without node_private".into()));
            }
            (None, Some(_)) => {
                return Err(AppError::InvalidOverride("node_private set without node_public".into()));
            }
        };

        let public_key = NodePublicKey::parse(public)?;
        let private_key = NodePrivateKey::parse(private)?;
        if private_key.public_key() != public_key {
            return Err(AppError::InvalidOverride(
                "node_public does not match node_private".into(),
            ));
        }
        Ok(Some(NodeIdentity::new(public_key, private_key)))
    }
}

/// Loads and creates the node identity against a [`DurableStore`].
///
/// Holds no identity state of its own: every call reads the store.
pub struct IdentityManager {
    store: Arc<dyn DurableStore>,
    generator: Arc<dyn KeyGenerator>,
    override_identity: Option<NodeIdentity>,
    quiet: bool,
}

impl IdentityManager {
    /// Build a manager. An unusable override is logged and ignored so the
    /// node falls back to its stored identity.
    pub fn new(
        store: Arc<dyn DurableStore>,
        generator: Arc<dyn KeyGenerator>,
        overrides: &IdentityOverride,
        quiet: bool,
    ) -> Self {
        let override_identity = match overrides.resolve() {
            Ok(Some(identity)) => {
                info!(node_id = %identity.node_id(), "identity override configured");
                Some(identity)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "ignoring identity override");
                None
            }
        };

        Self {
            store,
            generator,
            override_identity,
            quiet,
        }
    }

    /// Whether a valid override will replace the stored identity on load.
    pub fn has_override(&self) -> bool {
        self.override_identity.is_some()
    }

    /// Read the stored identity.
    ///
    /// Returns `Ok(None)` if no row exists. When several rows exist the last
    /// one in insertion order wins. A configured override replaces whatever
    /// was stored, but only once a row exists: the row is what marks the data
    /// directory as bootstrapped.
    pub fn load(&self) -> Result<Option<NodeIdentity>, AppError> {
        let rows = self.store.identity_rows()?;
        let Some(last) = rows.last() else {
            debug!(has_override = self.has_override(), "no stored node identity");
            return Ok(None);
        };

        if rows.len() > 1 {
            warn!(rows = rows.len(), "multiple node identity rows; using the last one");
        }

        if let Some(identity) = &self.override_identity {
            debug!(node_id = %identity.node_id(), "using override node identity");
            return Ok(Some(identity.clone()));
        }

        let identity = decode_row(last)?;
        debug!(node_id = %identity.node_id(), "loaded stored node identity");
        Ok(Some(identity))
    }

    /// Generate a new keypair and persist it with fresh auxiliary parameters.
    ///
    /// If a row already exists the insert is skipped and the existing identity
    /// is kept.
    pub fn create(&self) -> Result<(), AppError> {
        if !self.quiet {
            eprintln!("NodeIdentity: Creating.");
        }

        let seed = self.generator.new_seed();
        let public_key = self.generator.derive_public(&seed);
        let private_key = self.generator.derive_private(&seed);
        let dh512 = self.generator.aux_params(AUX_PARAM_BITS.0);
        let dh1024 = self.generator.aux_params(AUX_PARAM_BITS.1);

        let public_text = public_key.to_human();
        let private_text = private_key.to_human();
        let inserted = self.store.insert_identity(&NewIdentity {
            public_key: &public_text,
            private_key: &private_text,
            dh512: &dh512,
            dh1024: &dh1024,
        })?;

        if inserted {
            info!(node_id = %public_key.node_id(), backend = self.store.backend(), "node identity created");
        } else {
            warn!("node identity already present; keeping the stored one");
        }

        if !self.quiet {
            eprintln!("NodeIdentity: Created.");
        }
        Ok(())
    }
}

fn decode_row(row: &StoredIdentity) -> Result<NodeIdentity, AppError> {
    let public = row.public_key.as_deref().unwrap_or_default();
    let private = row.private_key.as_deref().unwrap_or_default();

    let public_key = NodePublicKey::parse(public)
        .map_err(|e| AppError::Storage(format!("corrupt node identity row: {e}")))?;
    let private_key = NodePrivateKey::parse(private)
        .map_err(|e| AppError::Storage(format!("corrupt node identity row: {e}")))?;
    Ok(NodeIdentity::new(public_key, private_key))
}
