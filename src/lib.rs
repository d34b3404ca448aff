//! Node credentials — persistent node identity bootstrap and a small durable
//! key-value store.
//!
//! [`start`] is the startup path: open the databases, load or create the
//! node identity, start the peer list, and hand back a [`Node`] holding the
//! identity and the kv facade.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod keys;
pub mod kv;
pub mod logger;

use std::sync::Arc;

use tracing::info;

use bootstrap::{Bootstrap, PeerList};
use config::Config;
use db::SqliteStore;
use error::AppError;
use identity::{IdentityManager, NodeIdentity};
use keys::Ed25519Generator;
use kv::KvStore;

/// What the rest of the process gets after a successful bootstrap.
#[derive(Clone)]
pub struct Node {
    pub identity: Arc<NodeIdentity>,
    pub kv: KvStore,
}

/// Open the node's databases and build an identity manager over them.
pub fn open(config: &Config) -> Result<(Arc<SqliteStore>, IdentityManager), AppError> {
    let store = Arc::new(SqliteStore::open(&config.wallet_db, &config.rpc_db)?);
    info!(
        wallet = %store.wallet_path().display(),
        rpc = %store.rpc_path().display(),
        "databases open"
    );
    let manager = IdentityManager::new(
        store.clone(),
        Arc::new(Ed25519Generator),
        &config.identity_override,
        config.quiet,
    );
    Ok((store, manager))
}

/// Run identity bootstrap and start `peers`.
pub fn start(config: &Config, peers: &dyn PeerList) -> Result<Node, AppError> {
    let (store, manager) = open(config)?;
    let identity = Bootstrap::new(&manager, peers, config.quiet).run()?;
    Ok(Node {
        identity: Arc::new(identity),
        kv: KvStore::new(store),
    })
}
