//! Flight reservation executors

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{forced_failure, TripTable};
use crate::{Context, IdempotencyKey, StepError, StepExecutor};

fn flight_sk(booking_id: &str) -> String {
    format!("FLIGHT#{booking_id}")
}

/// Put a pending flight reservation row.
///
/// The booking id is derived from the flight legs, so a retried attempt
/// lands on the same row instead of double-booking.
pub struct ReserveFlight {
    table: Arc<TripTable>,
}

impl ReserveFlight {
    /// Executor writing to the given flights table
    pub fn new(table: Arc<TripTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl StepExecutor for ReserveFlight {
    async fn execute(&self, context: &Context) -> Result<Value, StepError> {
        if forced_failure(context, "failFlightsReservation") {
            return Err(StepError::retriable("Failed to book the flights"));
        }
        let trip_id = context
            .get_str("trip_id")
            .ok_or_else(|| StepError::fatal("missing trip_id"))?;
        let depart = context.get_str("depart").unwrap_or_default();
        let arrive = context.get_str("arrive").unwrap_or_default();
        let booking_id = IdempotencyKey::derive(&[depart, arrive]);

        self.table
            .put(
                trip_id,
                &flight_sk(booking_id.as_str()),
                json!({
                    "trip_id": trip_id,
                    "id": booking_id.as_str(),
                    "depart_city": context.get_str("depart_city").unwrap_or_default(),
                    "depart_time": context.get_str("depart_time").unwrap_or_default(),
                    "arrive_city": context.get_str("arrive_city").unwrap_or_default(),
                    "arrive_time": context.get_str("arrive_time").unwrap_or_default(),
                    "transaction_status": "pending",
                }),
            )
            .map_err(|e| StepError::retriable(e.to_string()))?;

        Ok(json!({ "status": "ok", "booking_id": booking_id.as_str() }))
    }
}

/// Flip the flight reservation to `confirmed`. Not compensable; a
/// failure here rolls back the whole trip.
pub struct ConfirmFlight {
    table: Arc<TripTable>,
}

impl ConfirmFlight {
    /// Executor updating the given flights table
    pub fn new(table: Arc<TripTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl StepExecutor for ConfirmFlight {
    async fn execute(&self, context: &Context) -> Result<Value, StepError> {
        if forced_failure(context, "failFlightsConfirmation") {
            return Err(StepError::retriable("Failed to book the flights"));
        }
        let trip_id = context
            .get_str("trip_id")
            .ok_or_else(|| StepError::fatal("missing trip_id"))?;
        let booking_id = context
            .output_field("ReserveFlight", "booking_id")
            .ok_or_else(|| StepError::fatal("no flight reservation in context"))?;

        self.table
            .update_status(trip_id, &flight_sk(booking_id), "confirmed")
            .map_err(|e| StepError::retriable(e.to_string()))?;

        Ok(json!({ "status": "ok", "booking_id": booking_id }))
    }
}

/// Delete the flight reservation row.
///
/// Tolerates a reservation that was never written; compensation is
/// best-effort cleanup.
pub struct CancelFlight {
    table: Arc<TripTable>,
}

impl CancelFlight {
    /// Executor deleting from the given flights table
    pub fn new(table: Arc<TripTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl StepExecutor for CancelFlight {
    async fn execute(&self, context: &Context) -> Result<Value, StepError> {
        let Some(trip_id) = context.get_str("trip_id") else {
            return Ok(json!({ "status": "ok" }));
        };
        if let Some(booking_id) = context.output_field("ReserveFlight", "booking_id") {
            self.table
                .delete(trip_id, &flight_sk(booking_id))
                .map_err(|e| StepError::retriable(e.to_string()))?;
        }
        Ok(json!({ "status": "ok" }))
    }
}
