//! Run identity and the step context payload

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique identifier for one saga run.
///
/// Caller-supplied ids double as idempotency keys for the submission
/// boundary; [`RunId::generate`] produces one when the caller does not.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Box<str>);

impl RunId {
    /// Create a run ID from a caller-supplied key
    pub fn new(id: impl Into<Box<str>>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh run ID (timestamp plus process-local counter)
    pub fn generate() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(format!("run-{now}-{seq}").into_boxed_str())
    }

    /// Get the raw ID value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RunId({})", self.0)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Key-value payload handed to every step executor.
///
/// Holds the original booking parameters plus the output of every prior
/// successful step, keyed by step name. Values are opaque to the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Set a field, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Builder-style variant of [`Context::insert`]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Look up a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a string field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Record a step's success payload under the step name.
    ///
    /// Later steps read earlier outputs through this mapping, the way
    /// a confirmation needs the booking id its reservation produced.
    pub fn record_output(&mut self, step_name: &str, payload: Value) {
        self.0.insert(step_name.to_owned(), payload);
    }

    /// Output previously recorded for a step, if any
    pub fn output_of(&self, step_name: &str) -> Option<&Value> {
        self.0.get(step_name)
    }

    /// String field inside a step's recorded output
    pub fn output_field(&self, step_name: &str, field: &str) -> Option<&str> {
        self.output_of(step_name)
            .and_then(|v| v.get(field))
            .and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(RunId::generate(), RunId::generate());
    }

    #[test]
    fn test_output_lookup() {
        let mut ctx = Context::new().with("trip_id", json!("T1"));
        ctx.record_output("ReserveFlight", json!({"status": "ok", "booking_id": "F42"}));

        assert_eq!(ctx.get_str("trip_id"), Some("T1"));
        assert_eq!(ctx.output_field("ReserveFlight", "booking_id"), Some("F42"));
        assert_eq!(ctx.output_of("ReserveCarRental"), None);
    }
}
