//! Monthly contribution-point reset.
//!
//! Each principal's user record carries a `contributionPoints` counter and
//! the `(lastResetYear, lastResetMonth)` period in which it was last zeroed.
//! [`reset_if_new_period`] zeroes the counter the first time it runs in a
//! new calendar month and does nothing for the rest of that month.
//!
//! ```text
//! principal? ──no──▶ NoPrincipal
//!     │yes
//!     ▼
//! get record ──missing──▶ NoRecord
//!     │
//!     ▼
//! stored period == clock period ──yes──▶ AlreadyReset
//!     │no
//!     ▼
//! merge { contributionPoints: 0, lastResetMonth, lastResetYear } ──▶ Reset
//! ```
//!
//! There is no retry here. Store failures are returned as
//! [`ResetError::StoreUnavailable`] and the caller decides what to do.
//!
//! Two sessions of the same principal starting at the very beginning of a
//! month may both decide to reset. Both write the same three values, so the
//! record converges either way.

use crate::metrics::ResetMetrics;
use chrono::{FixedOffset, Offset, Utc};
use pointkeeper_core::auth::PrincipalId;
use pointkeeper_core::environment::Clock;
use pointkeeper_core::period::Period;
use pointkeeper_core::record::{ResetMarkers, USERS_COLLECTION, UserRecord};
use pointkeeper_core::store::{DocumentStore, StoreError};
use std::time::Instant;
use thiserror::Error;

/// Result of one reset attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetOutcome {
    /// Nobody is signed in; the store was not contacted.
    NoPrincipal,
    /// The principal has no user record; nothing was written.
    NoRecord,
    /// The counter was already reset during the current period.
    AlreadyReset,
    /// The counter was zeroed and the period markers were updated.
    Reset {
        /// Year of the period the reset was recorded for.
        year: i32,
        /// Zero-based month of the period the reset was recorded for.
        month: u32,
    },
}

impl ResetOutcome {
    /// Whether this outcome wrote to the store.
    #[must_use]
    pub const fn performed_write(&self) -> bool {
        matches!(self, Self::Reset { .. })
    }

    /// The period a reset was recorded for.
    #[must_use]
    pub fn period(&self) -> Option<Period> {
        match *self {
            Self::Reset { year, month } => Period::new(year, month).ok(),
            _ => None,
        }
    }

    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NoPrincipal => "no_principal",
            Self::NoRecord => "no_record",
            Self::AlreadyReset => "already_reset",
            Self::Reset { .. } => "reset",
        }
    }
}

impl From<Period> for ResetOutcome {
    fn from(period: Period) -> Self {
        Self::Reset {
            year: period.year(),
            month: period.month(),
        }
    }
}

/// Errors from a reset attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResetError {
    /// Reading or writing the user record failed.
    #[error("Document store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// The user record exists but its reset markers are not numbers.
    #[error("Malformed user record {id}: {reason}")]
    MalformedRecord {
        /// Principal whose record is malformed.
        id: PrincipalId,
        /// Decoder message.
        reason: String,
    },
}

impl ResetError {
    /// Returns `true` if retrying later could succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// use pointkeeper_core::store::StoreError;
    /// use pointkeeper_points::ResetError;
    ///
    /// let offline = ResetError::StoreUnavailable(StoreError::Connection("refused".into()));
    /// assert!(offline.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::MalformedRecord { .. } => "malformed_record",
        }
    }
}

/// Where user records live and which calendar the periods follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetConfig {
    /// Collection holding one user record per principal.
    ///
    /// Default: `Users`
    pub collection: String,

    /// Offset used to decide which month an instant belongs to.
    ///
    /// Default: UTC
    pub utc_offset: FixedOffset,
}

impl ResetConfig {
    /// Set the user collection.
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Set the calendar offset.
    #[must_use]
    pub const fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            collection: USERS_COLLECTION.to_string(),
            utc_offset: Utc.fix(),
        }
    }
}

/// Zero `principal_id`'s counter if it has not been zeroed this month.
///
/// Uses the default [`ResetConfig`]: the `Users` collection and UTC months.
///
/// # Errors
///
/// See [`reset_if_new_period_with`].
pub async fn reset_if_new_period<S, C>(
    principal_id: Option<&PrincipalId>,
    store: &S,
    clock: &C,
) -> Result<ResetOutcome, ResetError>
where
    S: DocumentStore + ?Sized,
    C: Clock + ?Sized,
{
    reset_if_new_period_with(principal_id, store, clock, &ResetConfig::default()).await
}

/// Zero `principal_id`'s counter if it has not been zeroed in the current
/// period, using an explicit configuration.
///
/// # Errors
///
/// - [`ResetError::StoreUnavailable`] if the read or the write fails
/// - [`ResetError::MalformedRecord`] if a stored reset marker is not a
///   number; nothing is written in that case
#[tracing::instrument(
    skip_all,
    name = "points_reset",
    fields(principal = principal_id.map(PrincipalId::as_str), collection = %config.collection)
)]
pub async fn reset_if_new_period_with<S, C>(
    principal_id: Option<&PrincipalId>,
    store: &S,
    clock: &C,
    config: &ResetConfig,
) -> Result<ResetOutcome, ResetError>
where
    S: DocumentStore + ?Sized,
    C: Clock + ?Sized,
{
    let started = Instant::now();
    let result = run(principal_id, store, clock, config).await;
    ResetMetrics::record(&result, started.elapsed());

    match &result {
        Ok(ResetOutcome::Reset { .. }) => {
            tracing::info!(outcome = "reset", "Contribution points reset for new period");
        },
        Ok(outcome) => tracing::debug!(outcome = outcome.label(), "No reset needed"),
        Err(error) => tracing::debug!(error = %error, "Reset attempt failed"),
    }
    result
}

async fn run<S, C>(
    principal_id: Option<&PrincipalId>,
    store: &S,
    clock: &C,
    config: &ResetConfig,
) -> Result<ResetOutcome, ResetError>
where
    S: DocumentStore + ?Sized,
    C: Clock + ?Sized,
{
    let Some(principal) = principal_id else {
        return Ok(ResetOutcome::NoPrincipal);
    };

    let Some(document) = store
        .get(&config.collection, principal.as_str())
        .await
        .map_err(ResetError::StoreUnavailable)?
    else {
        return Ok(ResetOutcome::NoRecord);
    };

    let markers = ResetMarkers::from_document(&document).map_err(|e| {
        ResetError::MalformedRecord {
            id: principal.clone(),
            reason: e.to_string(),
        }
    })?;

    let period = Period::current(clock, config.utc_offset);
    if !markers.is_due_for_reset(period) {
        return Ok(ResetOutcome::AlreadyReset);
    }

    tracing::debug!(%period, previous = ?markers.last_reset(), "Counter is due for reset");

    let patch = UserRecord::reset_in(period)
        .to_document()
        .map_err(ResetError::StoreUnavailable)?;
    store
        .update(&config.collection, principal.as_str(), patch)
        .await
        .map_err(ResetError::StoreUnavailable)?;

    Ok(period.into())
}

/// The reset operation bundled with its store, clock and configuration.
///
/// # Example
///
/// ```
/// use pointkeeper_core::auth::PrincipalId;
/// use pointkeeper_points::{PointsResetter, ResetOutcome};
/// use pointkeeper_testing::{FixedClock, InMemoryDocumentStore, at};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), pointkeeper_points::ResetError> {
/// let store = InMemoryDocumentStore::new();
/// store.insert_json("Users", "uid-1", json!({ "contributionPoints": 42 }));
///
/// let resetter = PointsResetter::new(store.clone(), FixedClock::new(at(2024, 4, 15)));
/// let outcome = resetter.reset_if_new_period(Some(&PrincipalId::new("uid-1"))).await?;
///
/// assert_eq!(outcome, ResetOutcome::Reset { year: 2024, month: 3 });
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PointsResetter<S, C> {
    store: S,
    clock: C,
    config: ResetConfig,
}

impl<S, C> PointsResetter<S, C>
where
    S: DocumentStore,
    C: Clock,
{
    /// Create a resetter with the default configuration.
    #[must_use]
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            config: ResetConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ResetConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ResetConfig {
        &self.config
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Zero the principal's counter if it has not been zeroed this period.
    ///
    /// # Errors
    ///
    /// See [`reset_if_new_period_with`].
    pub async fn reset_if_new_period(
        &self,
        principal_id: Option<&PrincipalId>,
    ) -> Result<ResetOutcome, ResetError> {
        reset_if_new_period_with(principal_id, &self.store, &self.clock, &self.config).await
    }
}
