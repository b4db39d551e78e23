//! Canonical user record schema.
//!
//! [`UserRecord`] encodes the reset patch and [`ResetMarkers`] decodes the
//! part of a stored record the reset decision depends on. Both use the same
//! field names, so the read path and the write path always agree.
//!
//! The counter itself is never read: a reset overwrites it with `0` no
//! matter what was stored. Anything else on the document is ignored on read
//! and never written.

use crate::period::Period;
use crate::store::{Document, StoreError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

/// Default collection holding one user record per principal.
pub const USERS_COLLECTION: &str = "Users";

/// The counter state written to a principal's user record.
///
/// Stored field names are `contributionPoints`, `lastResetMonth` and
/// `lastResetYear`. `lastResetMonth` is zero-based.
///
/// # Example
///
/// ```
/// use pointkeeper_core::{Period, UserRecord};
/// use serde_json::json;
///
/// let april = Period::new(2024, 3).unwrap();
/// let patch = UserRecord::reset_in(april).to_document().unwrap();
///
/// assert_eq!(patch.len(), 3);
/// assert_eq!(patch["contributionPoints"], json!(0));
/// assert_eq!(patch["lastResetMonth"], json!(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Points earned in the current period.
    pub contribution_points: u64,

    /// Zero-based month of the last reset.
    pub last_reset_month: Option<u32>,

    /// Year of the last reset.
    pub last_reset_year: Option<i32>,
}

impl UserRecord {
    /// The state a record is in right after a reset during `period`.
    #[must_use]
    pub const fn reset_in(period: Period) -> Self {
        Self {
            contribution_points: 0,
            last_reset_month: Some(period.month()),
            last_reset_year: Some(period.year()),
        }
    }

    /// The markers this record carries.
    #[must_use]
    pub const fn markers(&self) -> ResetMarkers {
        ResetMarkers {
            last_reset_month: self.last_reset_month,
            last_reset_year: self.last_reset_year,
        }
    }

    /// Encode the managed fields as a partial-update document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if encoding fails.
    pub fn to_document(&self) -> Result<Document, StoreError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(other) => Err(StoreError::Serialization(format!(
                "User record encoded as {other}, expected an object"
            ))),
            Err(e) => Err(StoreError::Serialization(e.to_string())),
        }
    }
}

/// The `(lastResetYear, lastResetMonth)` pair read from a stored record.
///
/// Any integral JSON number is accepted, including `2.0`. A marker that is
/// missing, `null`, fractional or out of range reads as `None`, which never
/// matches a period and so makes the record due for a repairing reset.
///
/// # Example
///
/// ```
/// use pointkeeper_core::Period;
/// use pointkeeper_core::record::ResetMarkers;
/// use serde_json::json;
///
/// let doc = json!({ "contributionPoints": -3, "lastResetMonth": 3.0, "lastResetYear": 2024 });
/// let markers = ResetMarkers::from_document(doc.as_object().unwrap()).unwrap();
///
/// assert_eq!(markers.last_reset(), Some(Period::new(2024, 3).unwrap()));
/// assert!(markers.is_due_for_reset(Period::new(2024, 4).unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetMarkers {
    /// Zero-based month of the last reset.
    #[serde(default, deserialize_with = "integral_marker")]
    pub last_reset_month: Option<u32>,

    /// Year of the last reset.
    #[serde(default, deserialize_with = "integral_marker")]
    pub last_reset_year: Option<i32>,
}

impl ResetMarkers {
    /// Decode the markers from a stored document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if a marker is not a number at
    /// all (for example the string `"April"`).
    pub fn from_document(document: &Document) -> Result<Self, StoreError> {
        serde_json::from_value(Value::Object(document.clone()))
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// The period of the last reset, if both markers are present and valid.
    #[must_use]
    pub fn last_reset(&self) -> Option<Period> {
        match (self.last_reset_year, self.last_reset_month) {
            (Some(year), Some(month)) => Period::new(year, month).ok(),
            _ => None,
        }
    }

    /// Whether the counter still has to be reset for `period`.
    #[must_use]
    pub fn is_due_for_reset(&self, period: Period) -> bool {
        !period.is_recorded_as(self.last_reset_year, self.last_reset_month)
    }
}

fn integral_marker<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let number = Option::<Number>::deserialize(deserializer)?;
    Ok(number
        .as_ref()
        .and_then(as_integer)
        .and_then(|n| T::try_from(n).ok()))
}

/// Largest magnitude at which every `f64` integer is exact.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

#[allow(clippy::cast_possible_truncation)]
fn as_integer(number: &Number) -> Option<i64> {
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT)
            .map(|f| f as i64)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn markers(value: Value) -> Result<ResetMarkers, StoreError> {
        match value {
            Value::Object(map) => ResetMarkers::from_document(&map),
            _ => ResetMarkers::from_document(&Document::new()),
        }
    }

    #[test]
    fn test_never_reset_record_has_empty_markers() {
        let read = markers(json!({ "contributionPoints": 42, "lastResetMonth": null })).unwrap();

        assert_eq!(read, ResetMarkers::default());
        assert_eq!(read.last_reset(), None);
    }

    #[test]
    fn test_counter_is_not_read() {
        for points in [json!(12.0), json!(-3), json!("many"), json!(null)] {
            let read = markers(json!({
                "contributionPoints": points,
                "lastResetMonth": 2,
                "lastResetYear": 2024,
            }))
            .unwrap();
            assert_eq!(read.last_reset(), Some(Period::new(2024, 2).unwrap()));
        }
    }

    #[test]
    fn test_integral_floats_are_accepted() {
        let read = markers(json!({ "lastResetMonth": 2.0, "lastResetYear": 2024.0 })).unwrap();
        assert_eq!(read.last_reset(), Some(Period::new(2024, 2).unwrap()));
    }

    #[test]
    fn test_unusable_numbers_read_as_never_reset() {
        for month in [json!(-1), json!(12), json!(2.5), json!(1e300), json!(u64::MAX)] {
            let read = markers(json!({ "lastResetMonth": month, "lastResetYear": 2024 })).unwrap();
            assert_eq!(read.last_reset(), None, "month {month}");
            for m in 0..12 {
                assert!(read.is_due_for_reset(Period::new(2024, m).unwrap()));
            }
        }

        let read = markers(json!({ "lastResetMonth": 3, "lastResetYear": 3_000_000_000_i64 })).unwrap();
        assert_eq!(read.last_reset_year, None);
    }

    #[test]
    fn test_non_number_marker_is_serialization_error() {
        let result = markers(json!({ "lastResetMonth": "3" }));
        assert!(matches!(result, Err(StoreError::Serialization(_))));

        let result = markers(json!({ "lastResetYear": [2024] }));
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_patch_round_trips_through_reader() {
        let period = Period::new(2024, 3).unwrap();
        let record = UserRecord::reset_in(period);
        let patch = record.to_document().unwrap();

        let mut keys: Vec<_> = patch.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["contributionPoints", "lastResetMonth", "lastResetYear"]);

        let reread = ResetMarkers::from_document(&patch).unwrap();
        assert_eq!(reread, record.markers());
        assert_eq!(reread.last_reset(), Some(period));
        assert!(!reread.is_due_for_reset(period));
        assert!(reread.is_due_for_reset(period.next().unwrap()));
    }
}
