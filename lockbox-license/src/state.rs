//! Active premium key state.
//!
//! [`PremiumKeyState`] owns the in-memory active key and mediates every write
//! to the stored raw key. Each operation runs on tokio's blocking pool under
//! a single commit lock:
//!
//! 1. verify (register only)
//! 2. write the settings store
//! 3. publish the new active key to subscribers
//!
//! Observers never see an active key whose backing write failed. Dropping
//! the future returned by an operation does not cancel it; once started,
//! the commit always runs to completion.

use crate::error::{LicenseError, LicenseResult, StoreError};
use crate::key::{PremiumKey, PremiumKeyVerifier};
use crate::source::read_first_line;
use crate::store::{ConfigStore, PREMIUM_KEY_CONFIG_KEY};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Holds the active premium key and keeps it in step with the settings store.
#[derive(Clone)]
pub struct PremiumKeyState {
    inner: Arc<Inner>,
}

struct Inner {
    verifier: PremiumKeyVerifier,
    store: Arc<dyn ConfigStore>,
    active: watch::Sender<Option<PremiumKey>>,
    commit_lock: Mutex<()>,
}

impl PremiumKeyState {
    /// Creates a state holder with no active key.
    ///
    /// Call [`initialize`](Self::initialize) to load the stored key.
    pub fn new(verifier: PremiumKeyVerifier, store: Arc<dyn ConfigStore>) -> Self {
        let (active, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                verifier,
                store,
                active,
                commit_lock: Mutex::new(()),
            }),
        }
    }

    /// Returns a snapshot of the active key.
    #[must_use]
    pub fn active(&self) -> Option<PremiumKey> {
        self.inner.active.borrow().clone()
    }

    /// Returns true if a premium key is active.
    #[must_use]
    pub fn is_premium(&self) -> bool {
        self.inner.active.borrow().is_some()
    }

    /// Subscribes to active key changes.
    ///
    /// Receivers are woken only when the active key actually changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<PremiumKey>> {
        self.inner.active.subscribe()
    }

    /// Loads and re-verifies the stored key, returning the resulting active key.
    ///
    /// Never fails: a missing key leaves the state empty, and a stored key
    /// that no longer verifies is logged as a warning and treated as absent.
    /// If the store cannot be read, the current active key is kept.
    pub async fn initialize(&self) -> Option<PremiumKey> {
        match self.commit(|inner| Ok(inner.initialize())).await {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Premium key initialization did not complete");
                None
            }
        }
    }

    /// Verifies `token`, stores it and makes it the active key.
    ///
    /// On failure neither the store nor the active key is touched.
    ///
    /// # Errors
    ///
    /// Returns the verification error unchanged, or a storage error if the
    /// store write fails.
    pub async fn register(&self, token: impl Into<String>) -> LicenseResult<PremiumKey> {
        let token = token.into();
        self.commit(move |inner| inner.register(&token)).await
    }

    /// Registers the premium key found on the first line of `path`.
    ///
    /// # Errors
    ///
    /// As [`register`](Self::register), plus [`LicenseError::Io`] if the file
    /// cannot be read.
    pub async fn register_file(&self, path: impl Into<PathBuf>) -> LicenseResult<PremiumKey> {
        let path = path.into();
        let token = tokio::task::spawn_blocking(move || read_first_line(&path))
            .await
            .map_err(|e| LicenseError::Task(e.to_string()))??;
        self.register(token).await
    }

    /// Clears the stored key and the active key.
    ///
    /// Succeeds as a no-op when nothing is registered.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store write fails; the active key is
    /// left unchanged in that case.
    pub async fn remove(&self) -> LicenseResult<()> {
        self.commit(Inner::remove).await
    }

    async fn commit<T, F>(&self, op: F) -> LicenseResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> LicenseResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _guard = inner.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
            op(&inner)
        })
        .await
        .map_err(|e| LicenseError::Task(e.to_string()))?
    }
}

impl fmt::Debug for PremiumKeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PremiumKeyState")
            .field("active", &*self.inner.active.borrow())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn initialize(&self) -> Option<PremiumKey> {
        let key = match self.store.read_string(PREMIUM_KEY_CONFIG_KEY) {
            Ok(token) => match self.verifier.verify(&token) {
                Ok(key) => {
                    info!(key_id = %key.id(), "Premium key loaded");
                    Some(key)
                }
                Err(e) => {
                    warn!(error = %e, "Stored premium key rejected");
                    None
                }
            },
            Err(StoreError::NotFound(_)) => {
                debug!("No premium key stored");
                None
            }
            Err(e) => {
                // the stored value is unknown, so whatever is active stays
                warn!(error = %e, "Failed to read stored premium key");
                return self.active.borrow().clone();
            }
        };
        self.publish(key.clone());
        key
    }

    fn register(&self, token: &str) -> LicenseResult<PremiumKey> {
        let token = token.trim();
        let key = self.verifier.verify(token)?;
        self.store.write_string(PREMIUM_KEY_CONFIG_KEY, Some(token))?;
        info!(key_id = %key.id(), "Premium key registered");
        self.publish(Some(key.clone()));
        Ok(key)
    }

    fn remove(&self) -> LicenseResult<()> {
        self.store.write_string(PREMIUM_KEY_CONFIG_KEY, None)?;
        info!("Premium key removed");
        self.publish(None);
        Ok(())
    }

    fn publish(&self, key: Option<PremiumKey>) {
        self.active.send_if_modified(|current| {
            if *current == key {
                false
            } else {
                *current = key;
                true
            }
        });
    }
}
