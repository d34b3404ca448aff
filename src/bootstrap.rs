//! Startup sequencing for the node identity.
//!
//! ```text
//! Unbootstrapped → Loading ─┬─ Found ─────────────────────────────┬─ Ready
//!                           └─ AbsentPendingCreate → Created → Loaded ┘
//!                                      │
//!                                      └─ Fatal
//! ```
//!
//! Bootstrap runs once, before anything that depends on the identity. The
//! peer list is told to start only after an identity is in hand.

use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::AppError;
use crate::identity::{IdentityManager, NodeIdentity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Unbootstrapped,
    Loading,
    Found,
    AbsentPendingCreate,
    Created,
    Loaded,
    Ready,
    Fatal,
}

/// Network membership subsystem, started once the identity is known.
pub trait PeerList: Send + Sync {
    fn start(&self);
}

/// [`PeerList`] that flips a watch channel; the peer-list task holds the
/// matching [`PeerListStart`] and waits on it.
#[derive(Debug)]
pub struct PeerListSignal {
    tx: watch::Sender<bool>,
}

/// Receiving half of [`PeerListSignal`].
#[derive(Debug)]
pub struct PeerListStart {
    rx: watch::Receiver<bool>,
}

impl PeerListSignal {
    pub fn channel() -> (Self, PeerListStart) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, PeerListStart { rx })
    }
}

impl PeerList for PeerListSignal {
    fn start(&self) {
        self.tx.send_replace(true);
    }
}

impl PeerListStart {
    /// Resolve once the peer list has been told to start.
    pub async fn wait(mut self) -> Result<(), AppError> {
        self.rx
            .wait_for(|started| *started)
            .await
            .map(|_| ())
            .map_err(|_| AppError::PeerList("start signal dropped before bootstrap finished".into()))
    }
}

/// Drives [`IdentityManager`] through the load-or-create protocol.
pub struct Bootstrap<'a> {
    identity: &'a IdentityManager,
    peers: &'a dyn PeerList,
    quiet: bool,
    state: BootstrapState,
}

impl<'a> Bootstrap<'a> {
    pub fn new(identity: &'a IdentityManager, peers: &'a dyn PeerList, quiet: bool) -> Self {
        Self {
            identity,
            peers,
            quiet,
            state: BootstrapState::Unbootstrapped,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Load the identity, creating it on first run, then start the peer list.
    ///
    /// Fails with [`AppError::IdentityUnavailable`] if creation fails or the
    /// reload after creation still finds nothing. Not retried.
    pub fn run(&mut self) -> Result<NodeIdentity, AppError> {
        self.transition(BootstrapState::Loading);

        let identity = match self.identity.load()? {
            Some(identity) => {
                self.transition(BootstrapState::Found);
                identity
            }
            None => {
                self.transition(BootstrapState::AbsentPendingCreate);
                self.create_and_reload()?
            }
        };

        if !self.quiet {
            eprintln!("NodeIdentity: {}", identity.public_key());
        }
        info!(
            node_id = %identity.node_id(),
            public_key = %identity.public_key(),
            "node identity ready"
        );

        self.peers.start();
        self.transition(BootstrapState::Ready);
        Ok(identity)
    }

    fn create_and_reload(&mut self) -> Result<NodeIdentity, AppError> {
        if let Err(e) = self.identity.create() {
            return Err(self.fatal(format!("cannot create node identity: {e}")));
        }
        self.transition(BootstrapState::Created);

        match self.identity.load() {
            Ok(Some(identity)) => {
                self.transition(BootstrapState::Loaded);
                Ok(identity)
            }
            Ok(None) => Err(self.fatal("unable to retrieve new node identity".into())),
            Err(e) => Err(self.fatal(format!("unable to retrieve new node identity: {e}"))),
        }
    }

    fn fatal(&mut self, reason: String) -> AppError {
        self.transition(BootstrapState::Fatal);
        AppError::IdentityUnavailable(reason)
    }

    fn transition(&mut self, next: BootstrapState) {
        debug!(from = ?self.state, to = ?next, "bootstrap");
        self.state = next;
    }
}
