//! Scriptable authentication provider.

use pointkeeper_core::auth::{AuthProvider, AuthStateChange, AuthStateStream, PrincipalId};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Mock authentication provider.
///
/// Tests drive it with [`sign_in`](Self::sign_in) and
/// [`sign_out`](Self::sign_out). Subscribers see those transitions in order.
/// [`close`](Self::close) ends every subscription stream.
///
/// # Example
///
/// ```
/// use pointkeeper_testing::MockAuthProvider;
/// use pointkeeper_core::auth::{AuthProvider, AuthStateChange, PrincipalId};
/// use futures::StreamExt;
///
/// # async fn example() {
/// let auth = MockAuthProvider::new();
/// let mut changes = auth.subscribe();
///
/// auth.sign_in(PrincipalId::new("uid-1"));
/// auth.close();
///
/// assert_eq!(
///     changes.next().await,
///     Some(AuthStateChange::SignedIn(PrincipalId::new("uid-1")))
/// );
/// assert_eq!(changes.next().await, None);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MockAuthProvider {
    current: Arc<Mutex<Option<PrincipalId>>>,
    changes: Arc<Mutex<Option<broadcast::Sender<AuthStateChange>>>>,
}

impl MockAuthProvider {
    /// Create a signed-out provider.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            current: Arc::new(Mutex::new(None)),
            changes: Arc::new(Mutex::new(Some(sender))),
        }
    }

    /// Create a provider with `principal` already signed in.
    #[must_use]
    pub fn signed_in(principal: PrincipalId) -> Self {
        let provider = Self::new();
        *provider
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(principal);
        provider
    }

    /// Sign `principal` in and notify subscribers.
    pub fn sign_in(&self, principal: PrincipalId) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(principal.clone());
        self.publish(AuthStateChange::SignedIn(principal));
    }

    /// Sign the current principal out and notify subscribers.
    pub fn sign_out(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.publish(AuthStateChange::SignedOut);
    }

    /// End all subscription streams. Later subscriptions are empty.
    pub fn close(&self) {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn publish(&self, change: AuthStateChange) {
        if let Some(sender) = self
            .changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            // No subscribers is fine
            let _ = sender.send(change);
        }
    }
}

impl Default for MockAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for MockAuthProvider {
    fn current_principal_id(&self) -> Option<PrincipalId> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> AuthStateStream {
        let receiver = self
            .changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(broadcast::Sender::subscribe);

        Box::pin(async_stream::stream! {
            let Some(mut receiver) = receiver else {
                return;
            };
            loop {
                match receiver.recv().await {
                    Ok(change) => yield change,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_current_principal_tracks_sign_in_and_out() {
        let auth = MockAuthProvider::new();
        assert_eq!(auth.current_principal_id(), None);

        auth.sign_in(PrincipalId::new("uid-1"));
        assert_eq!(auth.current_principal_id(), Some(PrincipalId::new("uid-1")));

        auth.sign_out();
        assert_eq!(auth.current_principal_id(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions_in_order() {
        let auth = MockAuthProvider::signed_in(PrincipalId::new("uid-0"));
        let changes = auth.subscribe();

        auth.sign_out();
        auth.sign_in(PrincipalId::new("uid-2"));
        auth.close();

        let seen: Vec<_> = changes.collect().await;
        assert_eq!(
            seen,
            vec![
                AuthStateChange::SignedOut,
                AuthStateChange::SignedIn(PrincipalId::new("uid-2")),
            ]
        );
    }

    #[tokio::test]
    async fn test_subscribe_after_close_is_empty() {
        let auth = MockAuthProvider::new();
        auth.close();
        assert_eq!(auth.subscribe().next().await, None);
    }
}
