//! Orchestration-Based SAGA for Distributed Transactions
//!
//! An orchestration-based SAGA pattern: a central `SagaEngine` drives an
//! ordered sequence of steps and, when a step exhausts its retries, undoes
//! the completed work by running compensations in reverse order. Every run
//! ends in exactly one terminal state, `Succeeded` or `Failed`, and an
//! append-only outcome log makes interrupted runs resumable.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! // 1. Implement StepExecutor for each forward action and compensation
//! struct ReserveSeat;
//! #[async_trait]
//! impl StepExecutor for ReserveSeat { /* ... */ }
//!
//! // 2. Describe the transaction as an ordered definition
//! let definition = SagaDefinition::builder("booking")
//!     .step(Step::new("ReserveSeat", ReserveSeat).with_compensation(ReleaseSeat))
//!     .step(Step::new("ChargeCard", ChargeCard).with_compensation(RefundCard))
//!     .build()?;
//!
//! // 3. Submit runs to the engine
//! let engine = SagaEngine::new();
//! let run = engine.submit(definition, RunRequest::new(context)).await?;
//! assert!(run.status().is_terminal());
//! ```

#![warn(missing_docs)]

// === Core Types ===
mod cancel;
mod context;
mod definition;
mod errors;
mod idempotency;
mod policy;
mod run;
mod step;

// === Engine ===
mod engine;

// === Storage ===
mod store;

// === Observability ===
mod notify;
mod observer;
mod stats;

// === Domain ===
pub mod travel;

// === Re-exports ===

// Types
pub use context::{Context, RunId};
pub use idempotency::IdempotencyKey;

// Definition
pub use definition::{DefinitionError, SagaDefinition, SagaDefinitionBuilder, Step};
pub use policy::{Backoff, RetryDecision, RetryPolicy};
pub use step::{FnExecutor, StepExecutor};

// Run state
pub use run::{OutcomePhase, RunStatus, SagaRun, StepOutcome, StepResult};

// Errors
pub use errors::{EngineError, StepError};

// Engine
pub use cancel::CancelToken;
pub use engine::{RunRequest, SagaEngine, SagaEngineBuilder};

// Storage
pub use store::{InMemoryRunStore, RunStore, StoreError};

// Observability
pub use notify::{NoOpSink, Notification, NotificationSink, NotifyError, TracingSink};
pub use observer::{NoOpObserver, SagaObserver, TracingObserver};
pub use stats::{EngineStats, EngineStatsSnapshot};
