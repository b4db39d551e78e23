//! # Pointkeeper Points
//!
//! Keeps each user's contribution-point counter scoped to the calendar month.
//!
//! - [`reset`]: the reset operation, [`reset_if_new_period`] and [`PointsResetter`]
//! - [`session`]: best-effort wiring to session start and sign-in events
//! - [`config`]: environment-driven configuration
//! - [`metrics`]: Prometheus counters and the optional exporter
//!
//! ## Example
//!
//! ```
//! use pointkeeper_core::auth::PrincipalId;
//! use pointkeeper_points::{ResetOutcome, reset_if_new_period};
//! use pointkeeper_testing::{FixedClock, InMemoryDocumentStore, at};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), pointkeeper_points::ResetError> {
//! let store = InMemoryDocumentStore::new();
//! store.insert_json("Users", "uid-1", json!({
//!     "contributionPoints": 42,
//!     "lastResetMonth": 11,
//!     "lastResetYear": 2023,
//! }));
//!
//! let clock = FixedClock::new(at(2024, 1, 2));
//! let uid = PrincipalId::new("uid-1");
//!
//! let first = reset_if_new_period(Some(&uid), &store, &clock).await?;
//! let second = reset_if_new_period(Some(&uid), &store, &clock).await?;
//!
//! assert_eq!(first, ResetOutcome::Reset { year: 2024, month: 0 });
//! assert_eq!(second, ResetOutcome::AlreadyReset);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod config;
pub mod metrics;
pub mod reset;
pub mod session;

// Re-export main types for convenience
pub use config::{Config, ConfigError, DatabaseConfig};
pub use reset::{
    PointsResetter, ResetConfig, ResetError, ResetOutcome, reset_if_new_period,
    reset_if_new_period_with,
};
pub use session::SessionResetHook;
