//! The travel-booking saga: flight, car rental, payment, confirmations.
//!
//! Step executors over per-resource reservation tables, wired into the
//! canonical five-step definition. A `run_type` field in the initial
//! context deterministically forces a named step to fail, which is how
//! rollback paths are exercised end to end.

mod flights;
mod payment;
mod rentals;
mod store;

pub use flights::{CancelFlight, ConfirmFlight, ReserveFlight};
pub use payment::{ProcessPayment, RefundPayment};
pub use rentals::{CancelRental, ConfirmRental, ReserveRental};
pub use store::{TableError, TripTable};

use std::sync::Arc;
use std::time::Duration;

use crate::{Context, RetryPolicy, SagaDefinition, Step};

/// Check the designated simulate-failure field
pub(crate) fn forced_failure(context: &Context, flag: &str) -> bool {
    context.get_str("run_type") == Some(flag)
}

/// The three reservation tables a trip booking touches
pub struct TripTables {
    /// Flight reservations
    pub flights: Arc<TripTable>,
    /// Car-rental reservations
    pub rentals: Arc<TripTable>,
    /// Payments
    pub payments: Arc<TripTable>,
}

impl TripTables {
    /// Fresh empty tables
    pub fn new() -> Self {
        Self {
            flights: Arc::new(TripTable::new("Flights")),
            rentals: Arc::new(TripTable::new("Rentals")),
            payments: Arc::new(TripTable::new("Payments")),
        }
    }
}

impl Default for TripTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the trip-booking definition:
///
/// 1. ReserveFlight, undone by CancelFlight
/// 2. ReserveCarRental, undone by CancelRental
/// 3. ProcessPayment, undone by RefundPayment
/// 4. ConfirmFlight (not compensable)
/// 5. ConfirmCarRental (not compensable)
///
/// Every step gets three attempts before it is declared exhausted.
pub fn trip_booking_definition(
    tables: &TripTables,
) -> Arc<SagaDefinition> {
    let retry = RetryPolicy::exponential(3, Duration::from_millis(100), 2.0);
    SagaDefinition::builder("trip_booking")
        .step(
            Step::new("ReserveFlight", ReserveFlight::new(tables.flights.clone()))
                .with_compensation(CancelFlight::new(tables.flights.clone()))
                .with_retry(retry.clone()),
        )
        .step(
            Step::new(
                "ReserveCarRental",
                ReserveRental::new(tables.rentals.clone()),
            )
            .with_compensation(CancelRental::new(tables.rentals.clone()))
            .with_retry(retry.clone()),
        )
        .step(
            Step::new(
                "ProcessPayment",
                ProcessPayment::new(tables.payments.clone()),
            )
            .with_compensation(RefundPayment::new(tables.payments.clone()))
            .with_retry(retry.clone()),
        )
        .step(
            Step::new("ConfirmFlight", ConfirmFlight::new(tables.flights.clone()))
                .with_retry(retry.clone()),
        )
        .step(
            Step::new(
                "ConfirmCarRental",
                ConfirmRental::new(tables.rentals.clone()),
            )
            .with_retry(retry),
        )
        .build()
        .expect("trip booking definition is statically valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OutcomePhase, RunRequest, RunStatus, SagaEngine};
    use serde_json::json;

    fn trip_context() -> Context {
        Context::new()
            .with("trip_id", json!("T1"))
            .with("depart", json!("2026-09-01"))
            .with("arrive", json!("2026-09-08"))
            .with("rental_from", json!("2026-09-01"))
            .with("rental_to", json!("2026-09-08"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_trip_booking_happy_path() {
        let tables = TripTables::new();
        let def = trip_booking_definition(&tables);
        let engine = SagaEngine::new();

        let run = engine
            .submit(def, RunRequest::new(trip_context()))
            .await
            .unwrap();

        assert_eq!(run.status(), RunStatus::Succeeded);
        let names: Vec<&str> = run.log().iter().map(|o| &*o.step_name).collect();
        assert_eq!(
            names,
            [
                "ReserveFlight",
                "ReserveCarRental",
                "ProcessPayment",
                "ConfirmFlight",
                "ConfirmCarRental"
            ]
        );

        // Both reservations confirmed, payment in place
        let flight_id = run.forward_payload("ReserveFlight").unwrap()["booking_id"]
            .as_str()
            .unwrap()
            .to_owned();
        let flight_row = tables
            .flights
            .get("T1", &format!("FLIGHT#{flight_id}"))
            .unwrap();
        assert_eq!(flight_row["transaction_status"], "confirmed");
        assert_eq!(tables.payments.row_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payment_failure_rolls_back_both_reservations() {
        let tables = TripTables::new();
        let def = trip_booking_definition(&tables);
        let engine = SagaEngine::new();

        let run = engine
            .submit(
                def,
                RunRequest::new(trip_context().with("run_type", json!("failPayment"))),
            )
            .await
            .unwrap();

        assert_eq!(run.status(), RunStatus::Failed);

        // Two successes, then the payment exhausts its three attempts
        assert_eq!(run.forward_attempts("ProcessPayment"), 3);
        let forward: Vec<&str> = run.forward_successes().map(|o| &*o.step_name).collect();
        assert_eq!(forward, ["ReserveFlight", "ReserveCarRental"]);

        // Rollback runs CancelRental then CancelFlight, in that order
        let compensated: Vec<&str> = run
            .log()
            .iter()
            .filter(|o| o.phase == OutcomePhase::Compensation)
            .map(|o| &*o.step_name)
            .collect();
        assert_eq!(compensated, ["ReserveCarRental", "ReserveFlight"]);

        // Both compensations succeeded: tables are clean again
        assert_eq!(tables.flights.row_count(), 0);
        assert_eq!(tables.rentals.row_count(), 0);
        assert_eq!(tables.payments.row_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_failure_refunds_payment() {
        let tables = TripTables::new();
        let def = trip_booking_definition(&tables);
        let engine = SagaEngine::new();

        let run = engine
            .submit(
                def,
                RunRequest::new(
                    trip_context().with("run_type", json!("failFlightsConfirmation")),
                ),
            )
            .await
            .unwrap();

        assert_eq!(run.status(), RunStatus::Failed);

        // ConfirmFlight cannot be undone, but everything before it is
        let compensated: Vec<&str> = run
            .log()
            .iter()
            .filter(|o| o.phase == OutcomePhase::Compensation)
            .map(|o| &*o.step_name)
            .collect();
        assert_eq!(
            compensated,
            ["ProcessPayment", "ReserveCarRental", "ReserveFlight"]
        );
        assert_eq!(tables.flights.row_count(), 0);
        assert_eq!(tables.rentals.row_count(), 0);
        assert_eq!(tables.payments.row_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rental_reservation_failure_cancels_flight_only() {
        let tables = TripTables::new();
        let def = trip_booking_definition(&tables);
        let engine = SagaEngine::new();

        let run = engine
            .submit(
                def,
                RunRequest::new(
                    trip_context().with("run_type", json!("failCarRentalReservation")),
                ),
            )
            .await
            .unwrap();

        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.forward_attempts("ReserveCarRental"), 3);
        // The payment step never ran, so there is nothing to refund
        assert_eq!(run.forward_attempts("ProcessPayment"), 0);
        assert_eq!(tables.flights.row_count(), 0);
        assert_eq!(tables.payments.row_count(), 0);
    }
}
