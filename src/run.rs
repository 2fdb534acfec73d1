//! Mutable execution record for one saga run

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Context, RunId};

/// Overall status of a run.
///
/// Lifecycle: `Pending` → `Running` → (`Succeeded` | `Compensating` →
/// `Failed`); terminal once `Succeeded` or `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Start request accepted, no step attempted yet
    Pending,
    /// Forward steps executing
    Running,
    /// A forward step exhausted its retries; rollback in progress
    Compensating,
    /// Every forward step completed
    Succeeded,
    /// Rollback finished, with or without residual compensation failures
    Failed,
}

impl RunStatus {
    /// Check whether the run can still make progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Compensating => "compensating",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Which direction a recorded attempt was running in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomePhase {
    /// The step's forward action
    Forward,
    /// The step's compensating action
    Compensation,
}

/// Result of one attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StepResult {
    /// The attempt succeeded
    Success {
        /// Opaque payload, forwarded to later steps keyed by step name
        payload: Value,
    },
    /// The attempt failed
    Failure {
        /// Human-readable failure reason
        reason: Box<str>,
    },
}

impl StepResult {
    /// Check whether this result is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// One attempt of one step, as recorded in the outcome log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Name of the step
    pub step_name: Box<str>,
    /// Forward or compensating invocation
    pub phase: OutcomePhase,
    /// Attempt number within the phase (1-indexed)
    pub attempt: u32,
    /// When the outcome was recorded (millis since UNIX epoch)
    pub recorded_at_millis: u64,
    /// Success payload or failure reason
    pub result: StepResult,
}

/// The execution record for one saga run.
///
/// Owned and mutated exclusively by the engine task driving the run.
/// The outcome log is append-only and is the sole source of truth for
/// what has completed and must be undone; everything a resume needs is
/// re-derivable from the log plus the definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SagaRun {
    id: RunId,
    definition_name: Box<str>,
    status: RunStatus,
    current_step: usize,
    log: Vec<StepOutcome>,
    initial_context: Context,
    started_at_millis: u64,
}

impl SagaRun {
    /// Create a pending run for a definition
    pub fn new(id: RunId, definition_name: impl Into<Box<str>>, context: Context) -> Self {
        Self {
            id,
            definition_name: definition_name.into(),
            status: RunStatus::Pending,
            current_step: 0,
            log: Vec::new(),
            initial_context: context,
            started_at_millis: now_millis(),
        }
    }

    /// Run identifier
    pub fn id(&self) -> &RunId {
        &self.id
    }

    /// Name of the definition this run executes
    pub fn definition_name(&self) -> &str {
        &self.definition_name
    }

    /// Current overall status
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Index of the next forward step to execute
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Append-only outcome log, ordered by step index then attempt
    pub fn log(&self) -> &[StepOutcome] {
        &self.log
    }

    /// The context the run was submitted with
    pub fn initial_context(&self) -> &Context {
        &self.initial_context
    }

    /// When the run was created (millis since UNIX epoch)
    pub fn started_at_millis(&self) -> u64 {
        self.started_at_millis
    }

    /// Wall time since the run was created
    pub fn elapsed(&self) -> std::time::Duration {
        std::time::Duration::from_millis(now_millis().saturating_sub(self.started_at_millis))
    }

    pub(crate) fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }

    /// Append an outcome. A forward success advances the step index.
    pub(crate) fn record(&mut self, outcome: StepOutcome) {
        if outcome.phase == OutcomePhase::Forward && outcome.result.is_success() {
            self.current_step += 1;
        }
        self.log.push(outcome);
    }

    /// Forward successes in completion order.
    ///
    /// This is exactly the set rollback must address, compensated in
    /// reverse of this order.
    pub fn forward_successes(&self) -> impl Iterator<Item = &StepOutcome> {
        self.log
            .iter()
            .filter(|o| o.phase == OutcomePhase::Forward && o.result.is_success())
    }

    /// Success payload recorded for a step's forward action, if any
    pub fn forward_payload(&self, step_name: &str) -> Option<&Value> {
        self.forward_successes()
            .find(|o| &*o.step_name == step_name)
            .and_then(|o| match &o.result {
                StepResult::Success { payload } => Some(payload),
                StepResult::Failure { .. } => None,
            })
    }

    /// Number of forward attempts recorded for a step
    pub fn forward_attempts(&self, step_name: &str) -> u32 {
        self.log
            .iter()
            .filter(|o| o.phase == OutcomePhase::Forward && &*o.step_name == step_name)
            .count() as u32
    }

    /// Whether a compensation success is recorded for a step
    pub fn compensation_succeeded(&self, step_name: &str) -> bool {
        self.log.iter().any(|o| {
            o.phase == OutcomePhase::Compensation
                && &*o.step_name == step_name
                && o.result.is_success()
        })
    }

    /// Number of compensation attempts recorded for a step
    pub fn compensation_attempts(&self, step_name: &str) -> u32 {
        self.log
            .iter()
            .filter(|o| o.phase == OutcomePhase::Compensation && &*o.step_name == step_name)
            .count() as u32
    }

    /// Rebuild the accumulated context: the initial context plus every
    /// forward success payload keyed by step name.
    pub fn rebuild_context(&self) -> Context {
        let mut ctx = self.initial_context.clone();
        for outcome in self.forward_successes() {
            if let StepResult::Success { payload } = &outcome.result {
                ctx.record_output(&outcome.step_name, payload.clone());
            }
        }
        ctx
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(step: &str, phase: OutcomePhase, attempt: u32, result: StepResult) -> StepOutcome {
        StepOutcome {
            step_name: step.into(),
            phase,
            attempt,
            recorded_at_millis: now_millis(),
            result,
        }
    }

    #[test]
    fn test_forward_success_advances_index() {
        let mut run = SagaRun::new(RunId::new("r1"), "trip", Context::new());
        assert_eq!(run.current_step(), 0);

        run.record(outcome(
            "ReserveFlight",
            OutcomePhase::Forward,
            1,
            StepResult::Success { payload: json!({"booking_id": "F1"}) },
        ));
        assert_eq!(run.current_step(), 1);

        // Failures and compensations do not advance the index
        run.record(outcome(
            "ReserveCarRental",
            OutcomePhase::Forward,
            1,
            StepResult::Failure { reason: "boom".into() },
        ));
        run.record(outcome(
            "ReserveFlight",
            OutcomePhase::Compensation,
            1,
            StepResult::Success { payload: json!({"status": "ok"}) },
        ));
        assert_eq!(run.current_step(), 1);
    }

    #[test]
    fn test_rebuild_context_includes_success_payloads() {
        let mut run = SagaRun::new(
            RunId::new("r2"),
            "trip",
            Context::new().with("trip_id", json!("T1")),
        );
        run.record(outcome(
            "ReserveFlight",
            OutcomePhase::Forward,
            2,
            StepResult::Success { payload: json!({"booking_id": "F1"}) },
        ));

        let ctx = run.rebuild_context();
        assert_eq!(ctx.get_str("trip_id"), Some("T1"));
        assert_eq!(ctx.output_field("ReserveFlight", "booking_id"), Some("F1"));
        assert_eq!(run.forward_attempts("ReserveFlight"), 1);
    }

    #[test]
    fn test_run_record_round_trips_through_serde() {
        let mut run = SagaRun::new(RunId::new("r3"), "trip", Context::new());
        run.set_status(RunStatus::Running);
        run.record(outcome(
            "ReserveFlight",
            OutcomePhase::Forward,
            1,
            StepResult::Success { payload: json!({"booking_id": "F1"}) },
        ));

        let bytes = serde_json::to_vec(&run).unwrap();
        let restored: SagaRun = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(restored.id(), run.id());
        assert_eq!(restored.status(), RunStatus::Running);
        assert_eq!(restored.current_step(), 1);
        assert_eq!(restored.log().len(), 1);
    }
}
