//! Car-rental reservation executors

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{forced_failure, TripTable};
use crate::{Context, IdempotencyKey, StepError, StepExecutor};

fn rental_sk(booking_id: &str) -> String {
    format!("CAR#{booking_id}")
}

/// Put a pending car-rental reservation row, keyed deterministically by
/// the rental window.
pub struct ReserveRental {
    table: Arc<TripTable>,
}

impl ReserveRental {
    /// Executor writing to the given rentals table
    pub fn new(table: Arc<TripTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl StepExecutor for ReserveRental {
    async fn execute(&self, context: &Context) -> Result<Value, StepError> {
        if forced_failure(context, "failCarRentalReservation") {
            return Err(StepError::retriable("Failed to book the car rental"));
        }
        let trip_id = context
            .get_str("trip_id")
            .ok_or_else(|| StepError::fatal("missing trip_id"))?;
        let rental_from = context.get_str("rental_from").unwrap_or_default();
        let rental_to = context.get_str("rental_to").unwrap_or_default();
        let booking_id = IdempotencyKey::derive(&[rental_from, rental_to]);

        self.table
            .put(
                trip_id,
                &rental_sk(booking_id.as_str()),
                json!({
                    "trip_id": trip_id,
                    "id": booking_id.as_str(),
                    "rental": context.get_str("rental").unwrap_or_default(),
                    "rental_from": rental_from,
                    "rental_to": rental_to,
                    "transaction_status": "pending",
                }),
            )
            .map_err(|e| StepError::retriable(e.to_string()))?;

        Ok(json!({ "status": "ok", "booking_id": booking_id.as_str() }))
    }
}

/// Flip the rental reservation to `confirmed`. Not compensable.
pub struct ConfirmRental {
    table: Arc<TripTable>,
}

impl ConfirmRental {
    /// Executor updating the given rentals table
    pub fn new(table: Arc<TripTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl StepExecutor for ConfirmRental {
    async fn execute(&self, context: &Context) -> Result<Value, StepError> {
        if forced_failure(context, "failCarRentalConfirmation") {
            return Err(StepError::retriable("Failed to book the car rental"));
        }
        let trip_id = context
            .get_str("trip_id")
            .ok_or_else(|| StepError::fatal("missing trip_id"))?;
        let booking_id = context
            .output_field("ReserveCarRental", "booking_id")
            .ok_or_else(|| StepError::fatal("no rental reservation in context"))?;

        self.table
            .update_status(trip_id, &rental_sk(booking_id), "confirmed")
            .map_err(|e| StepError::retriable(e.to_string()))?;

        Ok(json!({ "status": "ok", "booking_id": booking_id }))
    }
}

/// Delete the rental reservation row; tolerates a row that was never
/// written.
pub struct CancelRental {
    table: Arc<TripTable>,
}

impl CancelRental {
    /// Executor deleting from the given rentals table
    pub fn new(table: Arc<TripTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl StepExecutor for CancelRental {
    async fn execute(&self, context: &Context) -> Result<Value, StepError> {
        let Some(trip_id) = context.get_str("trip_id") else {
            return Ok(json!({ "status": "ok" }));
        };
        if let Some(booking_id) = context.output_field("ReserveCarRental", "booking_id") {
            self.table
                .delete(trip_id, &rental_sk(booking_id))
                .map_err(|e| StepError::retriable(e.to_string()))?;
        }
        Ok(json!({ "status": "ok" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trip_context() -> Context {
        Context::new()
            .with("trip_id", json!("T1"))
            .with("rental", json!("compact"))
            .with("rental_from", json!("2026-09-01"))
            .with("rental_to", json!("2026-09-08"))
    }

    #[tokio::test]
    async fn test_reserve_confirm_cancel_cycle() {
        let table = Arc::new(TripTable::new("Rentals"));
        let mut ctx = trip_context();

        let payload = ReserveRental::new(table.clone()).execute(&ctx).await.unwrap();
        ctx.record_output("ReserveCarRental", payload.clone());
        assert_eq!(table.row_count(), 1);

        ConfirmRental::new(table.clone()).execute(&ctx).await.unwrap();
        let booking_id = payload["booking_id"].as_str().unwrap();
        let row = table.get("T1", &rental_sk(booking_id)).unwrap();
        assert_eq!(row["transaction_status"], "confirmed");

        CancelRental::new(table.clone()).execute(&ctx).await.unwrap();
        assert_eq!(table.row_count(), 0);
    }

    #[tokio::test]
    async fn test_confirm_without_reservation_is_fatal() {
        let table = Arc::new(TripTable::new("Rentals"));
        let err = ConfirmRental::new(table)
            .execute(&trip_context())
            .await
            .unwrap_err();
        assert!(!err.is_retriable());
    }
}
