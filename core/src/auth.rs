//! Authentication capability.
//!
//! The authentication backend is opaque to this workspace. All the reset
//! logic needs from it is the identity of the signed-in principal, and a
//! feed of sign-in / sign-out transitions so the reset can run at session
//! start.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `PrincipalId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid principal ID: {0}")]
pub struct ParsePrincipalIdError(String);

/// Opaque, stable identifier of an authenticated principal.
///
/// It doubles as the document key of the principal's user record.
///
/// # Validation
///
/// - `FromStr::from_str()`: rejects empty or whitespace-only input
/// - `From::from()` and `new()`: no validation (trusted input)
///
/// # Examples
///
/// ```
/// use pointkeeper_core::auth::PrincipalId;
///
/// let id = PrincipalId::new("uid-123");
/// assert_eq!(id.as_str(), "uid-123");
///
/// let parsed: PrincipalId = "uid-456".parse().unwrap();
/// assert_eq!(parsed, PrincipalId::new("uid-456"));
/// assert!("  ".parse::<PrincipalId>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Create a new `PrincipalId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the principal ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `PrincipalId` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PrincipalId {
    type Err = ParsePrincipalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParsePrincipalIdError(
                "Principal ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A change in who is signed in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStateChange {
    /// A principal signed in (or an existing session was restored).
    SignedIn(PrincipalId),
    /// The current principal signed out.
    SignedOut,
}

impl AuthStateChange {
    /// The principal that signed in, if this is a sign-in.
    #[must_use]
    pub const fn principal(&self) -> Option<&PrincipalId> {
        match self {
            Self::SignedIn(id) => Some(id),
            Self::SignedOut => None,
        }
    }
}

/// Stream of auth-state transitions.
///
/// The stream ends when the provider shuts down.
pub type AuthStateStream = Pin<Box<dyn Stream<Item = AuthStateChange> + Send>>;

/// Authentication capability.
///
/// # Dyn Compatibility
///
/// Both methods are synchronous, so the trait is usable as
/// `Arc<dyn AuthProvider>`.
pub trait AuthProvider: Send + Sync {
    /// The currently authenticated principal, or `None` when signed out.
    fn current_principal_id(&self) -> Option<PrincipalId>;

    /// Subscribe to future auth-state changes.
    ///
    /// Only transitions that happen after the call are delivered. Callers
    /// that also care about an already-signed-in principal should check
    /// [`current_principal_id`](Self::current_principal_id) first.
    fn subscribe(&self) -> AuthStateStream;
}
