//! Payment executors

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{forced_failure, TripTable};
use crate::{Context, IdempotencyKey, StepError, StepExecutor};

fn payment_sk(payment_id: &str) -> String {
    format!("PAYMENT#{payment_id}")
}

/// Charge for the trip.
///
/// The payment id hashes both upstream booking ids, so the same pair of
/// reservations can only ever be charged once and a partial overlap
/// (same flight, different rental) gets a distinct payment.
pub struct ProcessPayment {
    table: Arc<TripTable>,
}

impl ProcessPayment {
    /// Executor writing to the given payments table
    pub fn new(table: Arc<TripTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl StepExecutor for ProcessPayment {
    async fn execute(&self, context: &Context) -> Result<Value, StepError> {
        if forced_failure(context, "failPayment") {
            return Err(StepError::retriable("Failed to process payment"));
        }
        let trip_id = context
            .get_str("trip_id")
            .ok_or_else(|| StepError::fatal("missing trip_id"))?;
        let flight_id = context
            .output_field("ReserveFlight", "booking_id")
            .ok_or_else(|| StepError::fatal("no flight reservation in context"))?;
        let rental_id = context
            .output_field("ReserveCarRental", "booking_id")
            .ok_or_else(|| StepError::fatal("no rental reservation in context"))?;
        let payment_id = IdempotencyKey::derive(&[flight_id, rental_id]);

        self.table
            .put(
                trip_id,
                &payment_sk(payment_id.as_str()),
                json!({
                    "trip_id": trip_id,
                    "id": payment_id.as_str(),
                    "amount": "750.00",
                    "currency": "USD",
                    "transaction_status": "confirmed",
                }),
            )
            .map_err(|e| StepError::retriable(e.to_string()))?;

        Ok(json!({ "status": "ok", "payment_id": payment_id.as_str() }))
    }
}

/// Delete the payment row; tolerates a payment that was never taken.
pub struct RefundPayment {
    table: Arc<TripTable>,
}

impl RefundPayment {
    /// Executor deleting from the given payments table
    pub fn new(table: Arc<TripTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl StepExecutor for RefundPayment {
    async fn execute(&self, context: &Context) -> Result<Value, StepError> {
        let Some(trip_id) = context.get_str("trip_id") else {
            return Ok(json!({ "status": "ok" }));
        };
        if let Some(payment_id) = context.output_field("ProcessPayment", "payment_id") {
            self.table
                .delete(trip_id, &payment_sk(payment_id))
                .map_err(|e| StepError::retriable(e.to_string()))?;
        }
        Ok(json!({ "status": "ok" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context_with_bookings(flight: &str, rental: &str) -> Context {
        let mut ctx = Context::new().with("trip_id", json!("T1"));
        ctx.record_output("ReserveFlight", json!({"booking_id": flight}));
        ctx.record_output("ReserveCarRental", json!({"booking_id": rental}));
        ctx
    }

    #[tokio::test]
    async fn test_payment_id_covers_both_bookings() {
        let table = Arc::new(TripTable::new("Payments"));
        let pay = ProcessPayment::new(table);

        let base = pay
            .execute(&context_with_bookings("F1", "C1"))
            .await
            .unwrap();
        let other_rental = pay
            .execute(&context_with_bookings("F1", "C2"))
            .await
            .unwrap();
        let other_flight = pay
            .execute(&context_with_bookings("F2", "C1"))
            .await
            .unwrap();

        assert_ne!(base["payment_id"], other_rental["payment_id"]);
        assert_ne!(base["payment_id"], other_flight["payment_id"]);
    }

    #[tokio::test]
    async fn test_refund_deletes_payment_row() {
        let table = Arc::new(TripTable::new("Payments"));
        let mut ctx = context_with_bookings("F1", "C1");

        let payload = ProcessPayment::new(table.clone()).execute(&ctx).await.unwrap();
        assert_eq!(table.row_count(), 1);

        ctx.record_output("ProcessPayment", payload);
        RefundPayment::new(table.clone()).execute(&ctx).await.unwrap();
        assert_eq!(table.row_count(), 0);
    }

    #[tokio::test]
    async fn test_refund_tolerates_missing_payment() {
        let table = Arc::new(TripTable::new("Payments"));
        RefundPayment::new(table)
            .execute(&context_with_bookings("F1", "C1"))
            .await
            .unwrap();
    }
}
