//! Anonymous identity: provider trait and the adapter the controller uses.

use crate::user_id::UserId;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity provider unreachable: {0}")]
    Unreachable(String),

    #[error("Anonymous sign-in failed: {0}")]
    SignInFailed(String),
}

pub type Result<T> = std::result::Result<T, IdentityError>;

/// External anonymous-identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, if any.
    fn current_user(&self) -> Option<UserId>;

    /// Create an anonymous identity and make it the current user.
    async fn sign_in_anonymously(&self) -> Result<UserId>;
}

/// Yields the session's user, signing in anonymously on first use.
pub struct IdentityAdapter {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityAdapter {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Current identity, creating one if none exists.
    ///
    /// A failed sign-in is logged and yields `None`; the next call tries
    /// again.
    pub async fn current_identity(&self) -> Option<UserId> {
        if let Some(user) = self.provider.current_user() {
            return Some(user);
        }

        debug!("No current user, signing in anonymously");
        match self.provider.sign_in_anonymously().await {
            Ok(user) => {
                info!("Signed in anonymously as {}", user);
                Some(user)
            }
            Err(e) => {
                warn!("Identity unavailable: {}", e);
                None
            }
        }
    }

    /// Current identity without attempting a sign-in.
    pub fn cached_identity(&self) -> Option<UserId> {
        self.provider.current_user()
    }
}

/// In-process identity provider for testing and local sessions.
pub struct InMemoryIdentityProvider {
    user: RwLock<Option<UserId>>,
    reachable: AtomicBool,
    sign_ins: AtomicUsize,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self {
            user: RwLock::new(None),
            reachable: AtomicBool::new(true),
            sign_ins: AtomicUsize::new(0),
        }
    }
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start already signed in as `user`.
    pub fn signed_in(user: UserId) -> Self {
        let provider = Self::default();
        *provider.user.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
        provider
    }

    /// Provider that cannot be reached until [`set_reachable`](Self::set_reachable).
    pub fn unreachable() -> Self {
        let provider = Self::default();
        provider.set_reachable(false);
        provider
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of sign-in attempts made.
    pub fn sign_in_attempts(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn sign_in_anonymously(&self) -> Result<UserId> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(IdentityError::Unreachable("network unavailable".into()));
        }

        let mut guard = self.user.write().unwrap_or_else(|e| e.into_inner());
        if let Some(user) = guard.as_ref() {
            return Ok(user.clone());
        }
        let user = UserId::new(uuid::Uuid::new_v4().simple().to_string())
            .map_err(|e| IdentityError::SignInFailed(e.to_string()))?;
        *guard = Some(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signs_in_on_first_use_only() {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let adapter = IdentityAdapter::new(provider.clone());

        assert!(adapter.cached_identity().is_none());
        let first = adapter.current_identity().await.unwrap();
        let second = adapter.current_identity().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.sign_in_attempts(), 1);
        assert_eq!(adapter.cached_identity(), Some(first));
    }

    #[tokio::test]
    async fn test_existing_user_skips_sign_in() {
        let user = UserId::new("existing").unwrap();
        let provider = Arc::new(InMemoryIdentityProvider::signed_in(user.clone()));
        let adapter = IdentityAdapter::new(provider.clone());

        assert_eq!(adapter.current_identity().await, Some(user));
        assert_eq!(provider.sign_in_attempts(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_provider_degrades_then_recovers() {
        let provider = Arc::new(InMemoryIdentityProvider::unreachable());
        let adapter = IdentityAdapter::new(provider.clone());

        assert!(adapter.current_identity().await.is_none());
        assert!(adapter.current_identity().await.is_none());
        assert_eq!(provider.sign_in_attempts(), 2);

        provider.set_reachable(true);
        assert!(adapter.current_identity().await.is_some());
    }
}
