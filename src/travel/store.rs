//! In-memory key-value tables backing the travel executors

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

/// Table access failure
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// Underlying storage failed
    #[error("storage error: {0}")]
    Storage(Box<str>),
    /// No row under the given key
    #[error("no row {pk}/{sk}")]
    NotFound {
        /// Partition key
        pk: Box<str>,
        /// Sort key
        sk: Box<str>,
    },
}

/// A reservation table: rows of opaque JSON under a composite
/// partition-key/sort-key pair.
///
/// Stands in for the put/update/delete-by-key store the executors talk
/// to; each executor receives its table through its constructor rather
/// than through ambient process state.
pub struct TripTable {
    name: Box<str>,
    rows: RwLock<HashMap<(String, String), Value>>,
}

impl TripTable {
    /// Create an empty table
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert or replace a row
    pub fn put(&self, pk: &str, sk: &str, item: Value) -> Result<(), TableError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| TableError::Storage(e.to_string().into()))?;
        rows.insert((pk.to_owned(), sk.to_owned()), item);
        Ok(())
    }

    /// Set the `transaction_status` field of an existing row
    pub fn update_status(&self, pk: &str, sk: &str, status: &str) -> Result<(), TableError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| TableError::Storage(e.to_string().into()))?;
        match rows.get_mut(&(pk.to_owned(), sk.to_owned())) {
            Some(row) => {
                row["transaction_status"] = Value::String(status.to_owned());
                Ok(())
            }
            None => Err(TableError::NotFound {
                pk: pk.into(),
                sk: sk.into(),
            }),
        }
    }

    /// Delete a row; deleting a missing row is not an error
    pub fn delete(&self, pk: &str, sk: &str) -> Result<(), TableError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| TableError::Storage(e.to_string().into()))?;
        rows.remove(&(pk.to_owned(), sk.to_owned()));
        Ok(())
    }

    /// Read a row
    pub fn get(&self, pk: &str, sk: &str) -> Option<Value> {
        self.rows
            .read()
            .ok()
            .and_then(|rows| rows.get(&(pk.to_owned(), sk.to_owned())).cloned())
    }

    /// Number of rows in the table
    pub fn row_count(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_update_delete() {
        let table = TripTable::new("Flights");
        table
            .put("T1", "FLIGHT#1", json!({"transaction_status": "pending"}))
            .unwrap();

        table.update_status("T1", "FLIGHT#1", "confirmed").unwrap();
        assert_eq!(
            table.get("T1", "FLIGHT#1").unwrap()["transaction_status"],
            "confirmed"
        );

        table.delete("T1", "FLIGHT#1").unwrap();
        assert!(table.get("T1", "FLIGHT#1").is_none());
        // Deleting again stays quiet
        table.delete("T1", "FLIGHT#1").unwrap();
    }

    #[test]
    fn test_update_missing_row_is_not_found() {
        let table = TripTable::new("Flights");
        let err = table.update_status("T1", "FLIGHT#1", "confirmed").unwrap_err();
        assert!(matches!(err, TableError::NotFound { .. }));
    }
}
