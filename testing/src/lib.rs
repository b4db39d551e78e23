//! # Pointkeeper Testing
//!
//! Testing utilities for the Pointkeeper workspace.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - An in-memory [`DocumentStore`](pointkeeper_core::DocumentStore) with
//!   read/write counters and failure injection ([`InMemoryDocumentStore`])
//! - A scriptable [`AuthProvider`](pointkeeper_core::AuthProvider)
//!   ([`MockAuthProvider`])
//!
//! ## Example
//!
//! ```
//! use pointkeeper_core::environment::Clock;
//! use pointkeeper_testing::{FixedClock, InMemoryDocumentStore, at};
//! use serde_json::json;
//!
//! let store = InMemoryDocumentStore::new();
//! store.insert_json("Users", "uid-1", json!({ "contributionPoints": 42 }));
//! assert_eq!(store.len(), 1);
//!
//! let clock = FixedClock::new(at(2024, 4, 15));
//! assert_eq!(clock.now(), at(2024, 4, 15));
//! ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use pointkeeper_core::environment::Clock;
use std::sync::{Arc, Mutex, PoisonError};

pub mod auth_mocks;
pub mod store_mocks;

/// Mock implementations of the clock capability.
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, Mutex, PoisonError, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use pointkeeper_testing::mocks::FixedClock;
    /// use pointkeeper_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can hand one clone to the code
    /// under test and keep another to cross month boundaries.
    ///
    /// # Example
    ///
    /// ```
    /// use pointkeeper_testing::{ManualClock, at};
    /// use pointkeeper_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = ManualClock::new(at(2024, 1, 31));
    /// let handle = clock.clone();
    /// handle.advance(Duration::days(1));
    /// assert_eq!(clock.now(), at(2024, 2, 1));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock reading `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }

        /// Move forward by `delta`.
        pub fn advance(&self, delta: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += delta;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}

/// Noon UTC on the given calendar date (one-based month, as on a calendar).
///
/// # Panics
///
/// Panics if the date does not exist, so a mistyped fixture fails at the
/// line that built it.
#[must_use]
#[allow(clippy::panic)]
pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("Invalid test date {year:04}-{month:02}-{day:02}"))
}

/// Create a default fixed clock for tests (2025-01-01 12:00:00 UTC)
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(at(2025, 1, 1))
}

// Re-export commonly used items
pub use auth_mocks::MockAuthProvider;
pub use mocks::{FixedClock, ManualClock};
pub use store_mocks::InMemoryDocumentStore;
