//! Session-start wiring.
//!
//! The reset runs when a user session starts: once for whoever is already
//! signed in when the application boots, then again on every sign-in. It is
//! best-effort. A failed reset is logged and counted but never stops the
//! session from proceeding.

use crate::reset::{PointsResetter, ResetOutcome};
use futures::StreamExt;
use pointkeeper_core::auth::{AuthProvider, AuthStateChange, PrincipalId};
use pointkeeper_core::environment::Clock;
use pointkeeper_core::store::DocumentStore;
use std::future::Future;

/// Runs the points reset at session start.
///
/// # Example
///
/// ```
/// use pointkeeper_core::auth::PrincipalId;
/// use pointkeeper_points::{PointsResetter, ResetOutcome, SessionResetHook};
/// use pointkeeper_testing::{FixedClock, InMemoryDocumentStore, MockAuthProvider, at};
///
/// # async fn example() {
/// let store = InMemoryDocumentStore::new();
/// let hook = SessionResetHook::new(PointsResetter::new(store, FixedClock::new(at(2024, 4, 15))));
///
/// let auth = MockAuthProvider::signed_in(PrincipalId::new("uid-without-record"));
/// assert_eq!(hook.on_session_start(&auth).await, Some(ResetOutcome::NoRecord));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionResetHook<S, C> {
    resetter: PointsResetter<S, C>,
}

impl<S, C> SessionResetHook<S, C>
where
    S: DocumentStore,
    C: Clock,
{
    /// Wrap a resetter.
    #[must_use]
    pub const fn new(resetter: PointsResetter<S, C>) -> Self {
        Self { resetter }
    }

    /// The wrapped resetter.
    #[must_use]
    pub const fn resetter(&self) -> &PointsResetter<S, C> {
        &self.resetter
    }

    /// Reset the counter of whoever is signed in right now.
    ///
    /// Returns `None` if the reset failed; the failure has been logged.
    pub async fn on_session_start<A>(&self, auth: &A) -> Option<ResetOutcome>
    where
        A: AuthProvider + ?Sized,
    {
        let principal = auth.current_principal_id();
        self.reset_best_effort(principal.as_ref()).await
    }

    /// Reset on every sign-in until the auth stream ends or `shutdown` resolves.
    ///
    /// Sign-outs are ignored. Returns the number of sign-ins handled.
    pub async fn watch<A, F>(&self, auth: &A, shutdown: F) -> usize
    where
        A: AuthProvider + ?Sized,
        F: Future<Output = ()>,
    {
        let mut changes = auth.subscribe();
        tokio::pin!(shutdown);

        let mut handled = 0;
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::debug!(handled, "Session reset watcher shutting down");
                    break;
                },
                change = changes.next() => match change {
                    Some(AuthStateChange::SignedIn(principal)) => {
                        self.reset_best_effort(Some(&principal)).await;
                        handled += 1;
                    },
                    Some(AuthStateChange::SignedOut) => {
                        tracing::debug!("Principal signed out");
                    },
                    None => {
                        tracing::debug!(handled, "Auth state stream closed");
                        break;
                    },
                },
            }
        }
        handled
    }

    async fn reset_best_effort(&self, principal: Option<&PrincipalId>) -> Option<ResetOutcome> {
        match self.resetter.reset_if_new_period(principal).await {
            Ok(outcome) => Some(outcome),
            Err(error) => {
                tracing::warn!(
                    principal = principal.map(PrincipalId::as_str),
                    error = %error,
                    retryable = error.is_retryable(),
                    "Monthly points reset failed, continuing session"
                );
                None
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pointkeeper_core::store::StoreError;
    use pointkeeper_testing::{FixedClock, InMemoryDocumentStore, MockAuthProvider, at};
    use serde_json::json;

    fn hook(store: &InMemoryDocumentStore) -> SessionResetHook<InMemoryDocumentStore, FixedClock> {
        SessionResetHook::new(PointsResetter::new(
            store.clone(),
            FixedClock::new(at(2024, 4, 15)),
        ))
    }

    fn seed(store: &InMemoryDocumentStore, id: &str) {
        store.insert_json(
            "Users",
            id,
            json!({ "contributionPoints": 7, "lastResetMonth": 2, "lastResetYear": 2024 }),
        );
    }

    #[tokio::test]
    async fn test_session_start_resets_current_principal() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "uid-1");
        let auth = MockAuthProvider::signed_in(PrincipalId::new("uid-1"));

        let outcome = hook(&store).on_session_start(&auth).await;

        assert_eq!(outcome, Some(ResetOutcome::Reset { year: 2024, month: 3 }));
        assert_eq!(
            store.document("Users", "uid-1").unwrap()["contributionPoints"],
            json!(0)
        );
    }

    #[tokio::test]
    async fn test_session_start_without_principal() {
        let store = InMemoryDocumentStore::new();
        let auth = MockAuthProvider::new();

        let outcome = hook(&store).on_session_start(&auth).await;

        assert_eq!(outcome, Some(ResetOutcome::NoPrincipal));
        assert_eq!(store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_session_start_swallows_store_failure() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "uid-1");
        store.fail_reads_with(StoreError::Connection("offline".to_string()));
        let auth = MockAuthProvider::signed_in(PrincipalId::new("uid-1"));

        assert_eq!(hook(&store).on_session_start(&auth).await, None);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_watch_resets_on_each_sign_in() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "uid-1");
        seed(&store, "uid-2");
        let auth = MockAuthProvider::new();
        let hook = hook(&store);

        let (handled, ()) = tokio::join!(hook.watch(&auth, std::future::pending()), async {
            tokio::task::yield_now().await;
            auth.sign_in(PrincipalId::new("uid-1"));
            auth.sign_out();
            auth.sign_in(PrincipalId::new("uid-2"));
            auth.sign_in(PrincipalId::new("uid-2"));
            auth.close();
        });

        assert_eq!(handled, 3);
        // The second sign-in of uid-2 finds the counter already reset
        assert_eq!(store.write_count(), 2);
        for id in ["uid-1", "uid-2"] {
            let doc = store.document("Users", id).unwrap();
            assert_eq!(doc["contributionPoints"], json!(0));
            assert_eq!(doc["lastResetMonth"], json!(3));
        }
    }

    #[tokio::test]
    async fn test_watch_stops_on_shutdown() {
        let store = InMemoryDocumentStore::new();
        let auth = MockAuthProvider::new();

        let handled = hook(&store).watch(&auth, std::future::ready(())).await;

        assert_eq!(handled, 0);
        assert_eq!(store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_watch_continues_after_failed_reset() {
        let store = InMemoryDocumentStore::new();
        seed(&store, "uid-1");
        store.insert_json(
            "Users",
            "uid-bad",
            json!({ "contributionPoints": 7, "lastResetMonth": "March" }),
        );
        let auth = MockAuthProvider::new();
        let hook = hook(&store);

        let (handled, ()) = tokio::join!(hook.watch(&auth, std::future::pending()), async {
            tokio::task::yield_now().await;
            auth.sign_in(PrincipalId::new("uid-bad"));
            auth.sign_in(PrincipalId::new("uid-1"));
            auth.close();
        });

        assert_eq!(handled, 2);
        assert_eq!(store.write_count(), 1);
        assert_eq!(
            store.document("Users", "uid-bad").unwrap()["contributionPoints"],
            json!(7)
        );
    }
}
