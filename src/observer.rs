//! Saga observer trait

use crate::{RunId, SagaRun};

/// Observer trait for external observability
pub trait SagaObserver: Send + Sync + 'static {
    /// A run began executing forward steps
    fn on_run_started(&self, run_id: &RunId, definition: &str);
    /// A forward attempt is about to execute
    fn on_step_started(&self, run_id: &RunId, step: &str, attempt: u32);
    /// A forward step succeeded
    fn on_step_completed(&self, run_id: &RunId, step: &str, attempt: u32);
    /// A forward attempt failed
    fn on_step_failed(&self, run_id: &RunId, step: &str, attempt: u32, error: &str, will_retry: bool);
    /// Rollback began for a run
    fn on_compensation_started(&self, run_id: &RunId, failed_step: &str);
    /// One step's compensation succeeded
    fn on_step_compensated(&self, run_id: &RunId, step: &str);
    /// One step's compensation exhausted its retries
    fn on_compensation_failed(&self, run_id: &RunId, step: &str, error: &str);
    /// A run reached `Succeeded`
    fn on_run_succeeded(&self, run: &SagaRun);
    /// A run reached `Failed`
    fn on_run_failed(&self, run: &SagaRun, uncompensated: &[Box<str>]);
}

/// No-op observer
pub struct NoOpObserver;

impl SagaObserver for NoOpObserver {
    fn on_run_started(&self, _run_id: &RunId, _definition: &str) {}
    fn on_step_started(&self, _run_id: &RunId, _step: &str, _attempt: u32) {}
    fn on_step_completed(&self, _run_id: &RunId, _step: &str, _attempt: u32) {}
    fn on_step_failed(
        &self,
        _run_id: &RunId,
        _step: &str,
        _attempt: u32,
        _error: &str,
        _will_retry: bool,
    ) {
    }
    fn on_compensation_started(&self, _run_id: &RunId, _failed_step: &str) {}
    fn on_step_compensated(&self, _run_id: &RunId, _step: &str) {}
    fn on_compensation_failed(&self, _run_id: &RunId, _step: &str, _error: &str) {}
    fn on_run_succeeded(&self, _run: &SagaRun) {}
    fn on_run_failed(&self, _run: &SagaRun, _uncompensated: &[Box<str>]) {}
}

/// Tracing-based observer
pub struct TracingObserver;

impl SagaObserver for TracingObserver {
    fn on_run_started(&self, run_id: &RunId, definition: &str) {
        tracing::info!(run_id = %run_id, definition = %definition, "Saga run started");
    }

    fn on_step_started(&self, run_id: &RunId, step: &str, attempt: u32) {
        tracing::info!(run_id = %run_id, step = %step, attempt = attempt, "Step started");
    }

    fn on_step_completed(&self, run_id: &RunId, step: &str, attempt: u32) {
        tracing::info!(run_id = %run_id, step = %step, attempt = attempt, "Step completed");
    }

    fn on_step_failed(&self, run_id: &RunId, step: &str, attempt: u32, error: &str, will_retry: bool) {
        tracing::warn!(
            run_id = %run_id,
            step = %step,
            attempt = attempt,
            error = %error,
            will_retry = will_retry,
            "Step failed"
        );
    }

    fn on_compensation_started(&self, run_id: &RunId, failed_step: &str) {
        tracing::info!(run_id = %run_id, failed_step = %failed_step, "Compensation started");
    }

    fn on_step_compensated(&self, run_id: &RunId, step: &str) {
        tracing::info!(run_id = %run_id, step = %step, "Step compensated");
    }

    fn on_compensation_failed(&self, run_id: &RunId, step: &str, error: &str) {
        tracing::error!(run_id = %run_id, step = %step, error = %error, "Compensation failed");
    }

    fn on_run_succeeded(&self, run: &SagaRun) {
        tracing::info!(run_id = %run.id(), "Saga run succeeded");
    }

    fn on_run_failed(&self, run: &SagaRun, uncompensated: &[Box<str>]) {
        tracing::error!(
            run_id = %run.id(),
            uncompensated = ?uncompensated,
            "Saga run failed"
        );
    }
}
