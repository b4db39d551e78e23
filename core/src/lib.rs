//! # Pointkeeper Core
//!
//! Capability traits and domain types for resetting per-user counters on a
//! calendar cadence.
//!
//! The reset logic itself lives in `pointkeeper-points`. This crate only
//! describes the things it talks to, so that production backends and test
//! doubles can be swapped freely:
//!
//! - **Clock** ([`environment::Clock`]): the current instant, injected
//! - **Period** ([`period::Period`]): a `(year, month)` pair derived from the clock
//! - **Document store** ([`store::DocumentStore`]): read and partially update JSON documents
//! - **Authentication** ([`auth::AuthProvider`]): who is signed in, and when that changes
//! - **User record** ([`record::UserRecord`], [`record::ResetMarkers`]): the canonical counter schema
//!
//! ## Example
//!
//! ```
//! use pointkeeper_core::{FixedOffset, Period, SystemClock};
//!
//! let utc = FixedOffset::east_opt(0).unwrap();
//! let period = Period::current(&SystemClock, utc);
//! assert!(period.month() <= 11);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, FixedOffset, Utc};

pub mod auth;
pub mod environment;
pub mod period;
pub mod record;
pub mod store;

pub use auth::{AuthProvider, AuthStateChange, AuthStateStream, PrincipalId};
pub use environment::{Clock, SystemClock};
pub use period::{InvalidPeriod, Period};
pub use record::{ResetMarkers, UserRecord};
pub use store::{Document, DocumentStore, StoreError};
