//! Shared read-only credential
//!
//! Token acquisition and refresh live outside this crate. Whoever owns the
//! credential swaps it in; every client reads the current value per request.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::transport::Credential;

#[derive(Debug, Clone)]
pub struct CredentialStore(Arc<ArcSwap<Credential>>);

impl CredentialStore {
    pub fn new(credential: Credential) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(credential)))
    }

    /// Snapshot of the current credential
    pub fn current(&self) -> Arc<Credential> {
        self.0.load_full()
    }

    /// Install a refreshed credential for all clones of this store
    pub fn replace(&self, credential: Credential) {
        self.0.store(Arc::new(credential));
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(Credential::Anonymous)
    }
}
