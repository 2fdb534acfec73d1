//! The saga orchestration core

use std::sync::Arc;

use crate::run::now_millis;
use crate::{
    CancelToken, Context, EngineError, EngineStats, EngineStatsSnapshot, InMemoryRunStore,
    NoOpObserver, NoOpSink, Notification, NotificationSink, OutcomePhase, RetryDecision, RunId,
    RunStatus, RunStore, SagaDefinition, SagaObserver, SagaRun, StepOutcome, StepResult,
};

/// Number of delivery attempts for the terminal notification before the
/// engine gives up and logs.
const NOTIFY_ATTEMPTS: u32 = 3;

/// Start request for one saga run
#[derive(Clone, Debug)]
pub struct RunRequest {
    /// Caller-supplied idempotency key; generated when absent
    pub run_id: Option<RunId>,
    /// Initial context (trip id, booking parameters, ...)
    pub context: Context,
}

impl RunRequest {
    /// Request with a generated run id
    pub fn new(context: Context) -> Self {
        Self {
            run_id: None,
            context,
        }
    }

    /// Request with a caller-supplied run id
    pub fn with_id(run_id: impl Into<RunId>, context: Context) -> Self {
        Self {
            run_id: Some(run_id.into()),
            context,
        }
    }
}

impl From<Context> for RunRequest {
    fn from(context: Context) -> Self {
        Self::new(context)
    }
}

/// Drives a [`SagaRun`] through its [`SagaDefinition`] to a terminal
/// state: every forward step confirmed, or every completed step
/// compensated in reverse completion order.
///
/// One run is driven by one logical task, steps strictly in order; the
/// engine itself is shared freely (`&self` methods, `Clone`) and keeps
/// no per-run state outside the run record, so any number of runs can
/// be in flight concurrently.
#[derive(Clone)]
pub struct SagaEngine {
    store: Arc<dyn RunStore>,
    sink: Arc<dyn NotificationSink>,
    observer: Arc<dyn SagaObserver>,
    stats: Arc<EngineStats>,
}

impl SagaEngine {
    /// Engine with in-memory storage and no-op collaborators
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring an engine
    pub fn builder() -> SagaEngineBuilder {
        SagaEngineBuilder {
            store: None,
            sink: None,
            observer: None,
        }
    }

    /// Point-in-time engine counters
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// The run store this engine persists through
    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    /// Submit a run and drive it to a terminal state.
    ///
    /// The run id is the submission idempotency key: when the store
    /// already holds a run with the requested id, that run is returned
    /// (resumed first if it is not yet terminal) instead of starting a
    /// duplicate execution.
    pub async fn submit(
        &self,
        definition: Arc<SagaDefinition>,
        request: impl Into<RunRequest>,
    ) -> Result<SagaRun, EngineError> {
        self.submit_cancellable(definition, request, CancelToken::new())
            .await
    }

    /// [`SagaEngine::submit`] with an externally held cancellation token
    pub async fn submit_cancellable(
        &self,
        definition: Arc<SagaDefinition>,
        request: impl Into<RunRequest>,
        cancel: CancelToken,
    ) -> Result<SagaRun, EngineError> {
        let request = request.into();
        if let Some(run_id) = &request.run_id {
            if self.store.load(run_id)?.is_some() {
                return self.resume_cancellable(definition, run_id, cancel).await;
            }
        }

        let run_id = request.run_id.unwrap_or_else(RunId::generate);
        let run = SagaRun::new(run_id, definition.name(), request.context);
        self.store.save(&run)?;
        EngineStats::incr(&self.stats.runs_started);

        self.drive(run, &definition, &cancel).await
    }

    /// Resume a previously started run.
    ///
    /// Idempotent: a terminal run is returned unchanged; a run stopped
    /// mid-forward continues at the first unexecuted step; a run stopped
    /// mid-rollback continues compensating with already-compensated
    /// steps skipped. Everything needed is re-derived from the outcome
    /// log plus the definition.
    pub async fn resume(
        &self,
        definition: Arc<SagaDefinition>,
        run_id: &RunId,
    ) -> Result<SagaRun, EngineError> {
        self.resume_cancellable(definition, run_id, CancelToken::new())
            .await
    }

    /// [`SagaEngine::resume`] with an externally held cancellation token
    pub async fn resume_cancellable(
        &self,
        definition: Arc<SagaDefinition>,
        run_id: &RunId,
        cancel: CancelToken,
    ) -> Result<SagaRun, EngineError> {
        let run = self
            .store
            .load(run_id)?
            .ok_or_else(|| EngineError::UnknownRun(run_id.clone()))?;
        if run.definition_name() != definition.name() {
            return Err(EngineError::DefinitionMismatch {
                run_id: run_id.clone(),
                expected: run.definition_name().into(),
                actual: definition.name().into(),
            });
        }
        if run.status().is_terminal() {
            return Ok(run);
        }
        self.drive(run, &definition, &cancel).await
    }

    /// Execute forward steps, then roll back if any step exhausted its
    /// budget. State is saved before every next side-effecting call.
    async fn drive(
        &self,
        mut run: SagaRun,
        definition: &SagaDefinition,
        cancel: &CancelToken,
    ) -> Result<SagaRun, EngineError> {
        let mut context = run.rebuild_context();

        let failed_step = if run.status() == RunStatus::Compensating {
            // Interrupted mid-rollback; skip straight back to it
            last_forward_failure(&run)
        } else {
            run.set_status(RunStatus::Running);
            self.store.save(&run)?;
            self.observer.on_run_started(run.id(), definition.name());
            self.forward(&mut run, definition, &mut context, cancel)
                .await?
        };

        match failed_step {
            None => {
                run.set_status(RunStatus::Succeeded);
                self.store.save(&run)?;
                EngineStats::incr(&self.stats.runs_succeeded);
                self.observer.on_run_succeeded(&run);
                self.notify_terminal(&run, Vec::new()).await;
            }
            Some(failed) => {
                let uncompensated = self
                    .rollback(&mut run, definition, &context, &failed)
                    .await?;
                run.set_status(RunStatus::Failed);
                self.store.save(&run)?;
                EngineStats::incr(&self.stats.runs_failed);
                self.observer.on_run_failed(&run, &uncompensated);
                self.notify_terminal(&run, uncompensated).await;
            }
        }
        Ok(run)
    }

    /// Forward phase. Returns the name of the step that exhausted its
    /// retries, or `None` when every step completed.
    async fn forward(
        &self,
        run: &mut SagaRun,
        definition: &SagaDefinition,
        context: &mut Context,
        cancel: &CancelToken,
    ) -> Result<Option<Box<str>>, EngineError> {
        'steps: while run.current_step() < definition.len() {
            let step = &definition.steps()[run.current_step()];
            let step_name: Box<str> = step.name().into();

            // Step-boundary checks: cancellation and overall timeout are
            // treated as a failure of the upcoming step.
            if cancel.is_cancelled() {
                self.record_boundary_failure(run, &step_name, "run cancelled")?;
                return Ok(Some(step_name));
            }
            if let Some(timeout) = definition.timeout() {
                if run.elapsed() >= timeout {
                    self.record_boundary_failure(run, &step_name, "run timeout exceeded")?;
                    return Ok(Some(step_name));
                }
            }

            let policy = step.retry_policy();
            let mut attempt = run.forward_attempts(&step_name) + 1;
            if attempt > policy.max_attempts {
                // Resumed after the last recorded attempt already
                // exhausted the budget
                return Ok(Some(step_name));
            }

            loop {
                self.observer.on_step_started(run.id(), &step_name, attempt);
                EngineStats::incr(&self.stats.step_attempts);

                match step.forward().execute(context).await {
                    Ok(payload) => {
                        run.record(StepOutcome {
                            step_name: step_name.clone(),
                            phase: OutcomePhase::Forward,
                            attempt,
                            recorded_at_millis: now_millis(),
                            result: StepResult::Success {
                                payload: payload.clone(),
                            },
                        });
                        self.store.save(run)?;
                        context.record_output(&step_name, payload);
                        self.observer.on_step_completed(run.id(), &step_name, attempt);
                        continue 'steps;
                    }
                    Err(error) => {
                        EngineStats::incr(&self.stats.step_failures);
                        let decision = if error.is_retriable() {
                            policy.decide(attempt)
                        } else {
                            RetryDecision::exhausted()
                        };
                        run.record(StepOutcome {
                            step_name: step_name.clone(),
                            phase: OutcomePhase::Forward,
                            attempt,
                            recorded_at_millis: now_millis(),
                            result: StepResult::Failure {
                                reason: error.reason().into(),
                            },
                        });
                        self.store.save(run)?;
                        self.observer.on_step_failed(
                            run.id(),
                            &step_name,
                            attempt,
                            error.reason(),
                            decision.retry,
                        );
                        if !decision.retry {
                            return Ok(Some(step_name));
                        }
                        tokio::time::sleep(decision.delay).await;
                        attempt += 1;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Rollback phase: compensate every recorded forward success in
    /// reverse completion order, best-effort. Returns the steps whose
    /// compensation did not succeed.
    async fn rollback(
        &self,
        run: &mut SagaRun,
        definition: &SagaDefinition,
        context: &Context,
        failed_step: &str,
    ) -> Result<Vec<Box<str>>, EngineError> {
        if run.status() != RunStatus::Compensating {
            run.set_status(RunStatus::Compensating);
            self.store.save(run)?;
            self.observer.on_compensation_started(run.id(), failed_step);
        }

        let completed: Vec<Box<str>> = run
            .forward_successes()
            .map(|o| o.step_name.clone())
            .collect();

        let mut uncompensated = Vec::new();
        for step_name in completed.iter().rev() {
            let step = definition
                .index_of(step_name)
                .and_then(|i| definition.step(i));
            let Some(step) = step else { continue };
            let Some(compensation) = step.compensation() else {
                // Never ran or nothing to undo
                continue;
            };
            if run.compensation_succeeded(step_name) {
                // Already undone before an interruption
                continue;
            }

            let policy = step.retry_policy();
            let mut attempt = run.compensation_attempts(step_name) + 1;
            if attempt > policy.max_attempts {
                uncompensated.push(step_name.clone());
                continue;
            }

            loop {
                EngineStats::incr(&self.stats.compensation_attempts);
                match compensation.execute(context).await {
                    Ok(payload) => {
                        run.record(StepOutcome {
                            step_name: step_name.clone(),
                            phase: OutcomePhase::Compensation,
                            attempt,
                            recorded_at_millis: now_millis(),
                            result: StepResult::Success { payload },
                        });
                        self.store.save(run)?;
                        self.observer.on_step_compensated(run.id(), step_name);
                        break;
                    }
                    Err(error) => {
                        run.record(StepOutcome {
                            step_name: step_name.clone(),
                            phase: OutcomePhase::Compensation,
                            attempt,
                            recorded_at_millis: now_millis(),
                            result: StepResult::Failure {
                                reason: error.reason().into(),
                            },
                        });
                        self.store.save(run)?;
                        let decision = if error.is_retriable() {
                            policy.decide(attempt)
                        } else {
                            RetryDecision::exhausted()
                        };
                        if !decision.retry {
                            // Rollback must not wedge on one unrecoverable
                            // compensation; report and keep unwinding
                            EngineStats::incr(&self.stats.compensation_failures);
                            self.observer
                                .on_compensation_failed(run.id(), step_name, error.reason());
                            uncompensated.push(step_name.clone());
                            break;
                        }
                        tokio::time::sleep(decision.delay).await;
                        attempt += 1;
                    }
                }
            }
        }
        Ok(uncompensated)
    }

    /// Record a synthetic failure for a step boundary interruption
    /// (cancellation, timeout) so the log stays the single source of
    /// truth for what happened.
    fn record_boundary_failure(
        &self,
        run: &mut SagaRun,
        step_name: &str,
        reason: &str,
    ) -> Result<(), EngineError> {
        let attempt = run.forward_attempts(step_name) + 1;
        run.record(StepOutcome {
            step_name: step_name.into(),
            phase: OutcomePhase::Forward,
            attempt,
            recorded_at_millis: now_millis(),
            result: StepResult::Failure {
                reason: reason.into(),
            },
        });
        self.store.save(run)?;
        self.observer
            .on_step_failed(run.id(), step_name, attempt, reason, false);
        Ok(())
    }

    /// Deliver the terminal notification, bounded retries, then log and
    /// move on; delivery failure never reopens a terminal run.
    async fn notify_terminal(&self, run: &SagaRun, uncompensated_steps: Vec<Box<str>>) {
        let notification = Notification {
            run_id: run.id().clone(),
            status: run.status(),
            uncompensated_steps,
        };
        for attempt in 1..=NOTIFY_ATTEMPTS {
            match self.sink.notify(&notification).await {
                Ok(()) => return,
                Err(error) if attempt < NOTIFY_ATTEMPTS => {
                    tracing::debug!(
                        run_id = %run.id(),
                        attempt = attempt,
                        error = %error,
                        "Notification delivery failed, retrying"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
                Err(error) => {
                    EngineStats::incr(&self.stats.notifications_failed);
                    tracing::warn!(
                        run_id = %run.id(),
                        error = %error,
                        "Notification delivery failed, giving up"
                    );
                }
            }
        }
    }
}

impl Default for SagaEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Step name of the most recent forward failure in the log
fn last_forward_failure(run: &SagaRun) -> Option<Box<str>> {
    run.log()
        .iter()
        .rev()
        .find(|o| o.phase == OutcomePhase::Forward && !o.result.is_success())
        .map(|o| o.step_name.clone())
}

/// Builder for [`SagaEngine`]
pub struct SagaEngineBuilder {
    store: Option<Arc<dyn RunStore>>,
    sink: Option<Arc<dyn NotificationSink>>,
    observer: Option<Arc<dyn SagaObserver>>,
}

impl SagaEngineBuilder {
    /// Use a specific run store (default: [`InMemoryRunStore`])
    pub fn store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a specific notification sink (default: [`NoOpSink`])
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use a specific observer (default: [`NoOpObserver`])
    pub fn observer(mut self, observer: Arc<dyn SagaObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Assemble the engine
    pub fn build(self) -> SagaEngine {
        SagaEngine {
            store: self.store.unwrap_or_else(|| Arc::new(InMemoryRunStore::new())),
            sink: self.sink.unwrap_or_else(|| Arc::new(NoOpSink)),
            observer: self.observer.unwrap_or_else(|| Arc::new(NoOpObserver)),
            stats: Arc::new(EngineStats::new()),
        }
    }
}
