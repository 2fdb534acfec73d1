//! Static saga definitions: ordered steps with compensations and retry policy

use std::sync::Arc;
use std::time::Duration;

use crate::{RetryPolicy, StepExecutor};

/// One step of a saga definition.
///
/// Pairs a forward action with an optional compensating action and a
/// retry policy. Immutable once the definition is built; step order in
/// the definition fixes both forward execution order and reverse
/// compensation order.
pub struct Step {
    name: Box<str>,
    forward: Arc<dyn StepExecutor>,
    compensation: Option<Arc<dyn StepExecutor>>,
    retry: RetryPolicy,
}

impl Step {
    /// Create a step with no compensation and the default retry policy
    pub fn new(name: impl Into<Box<str>>, forward: impl StepExecutor) -> Self {
        Self {
            name: name.into(),
            forward: Arc::new(forward),
            compensation: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Attach a compensating action.
    ///
    /// The compensation must be safe to invoke even if the forward
    /// action partially succeeded (idempotent compensation).
    pub fn with_compensation(mut self, compensation: impl StepExecutor) -> Self {
        self.compensation = Some(Arc::new(compensation));
        self
    }

    /// Replace the default retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Step name, unique within its definition
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forward action
    pub fn forward(&self) -> &Arc<dyn StepExecutor> {
        &self.forward
    }

    /// Compensating action, if the step is compensable
    pub fn compensation(&self) -> Option<&Arc<dyn StepExecutor>> {
        self.compensation.as_ref()
    }

    /// Retry policy applied to both forward and compensating invocations
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("compensable", &self.compensation.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Error rejected at definition construction time, before any run starts
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    /// A definition must contain at least one step
    #[error("definition '{0}' has no steps")]
    Empty(Box<str>),
    /// Step names must be unique within a definition
    #[error("definition '{definition}' declares step '{step}' more than once")]
    DuplicateStep {
        /// Definition being built
        definition: Box<str>,
        /// Offending step name
        step: Box<str>,
    },
}

/// Immutable, ordered saga definition.
///
/// Built once at startup, validated, and shared read-only across all
/// runs (`Arc<SagaDefinition>`); the engine is an interpreter over this
/// data.
pub struct SagaDefinition {
    name: Box<str>,
    steps: Vec<Step>,
    timeout: Option<Duration>,
}

impl SagaDefinition {
    /// Start building a definition
    pub fn builder(name: impl Into<Box<str>>) -> SagaDefinitionBuilder {
        SagaDefinitionBuilder {
            name: name.into(),
            steps: Vec::new(),
            timeout: None,
        }
    }

    /// Definition name, recorded on every run started from it
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in forward execution order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps (always at least one)
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; kept for slice-like ergonomics
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at a forward index
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Forward index of a named step
    pub fn index_of(&self, step_name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name() == step_name)
    }

    /// Maximum total elapsed run time, checked at step boundaries
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl std::fmt::Debug for SagaDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaDefinition")
            .field("name", &self.name)
            .field("steps", &self.steps.iter().map(Step::name).collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for [`SagaDefinition`]
pub struct SagaDefinitionBuilder {
    name: Box<str>,
    steps: Vec<Step>,
    timeout: Option<Duration>,
}

impl SagaDefinitionBuilder {
    /// Append a step; order of calls is forward execution order
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Set a maximum total elapsed time for each run of this definition
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate and freeze the definition
    pub fn build(self) -> Result<Arc<SagaDefinition>, DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::Empty(self.name));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if self.steps[..i].iter().any(|s| s.name() == step.name()) {
                return Err(DefinitionError::DuplicateStep {
                    definition: self.name,
                    step: step.name().into(),
                });
            }
        }
        Ok(Arc::new(SagaDefinition {
            name: self.name,
            steps: self.steps,
            timeout: self.timeout,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnExecutor;
    use serde_json::json;

    fn ok_step(name: &str) -> Step {
        Step::new(name, FnExecutor::new(|_| Ok(json!({"status": "ok"}))))
    }

    #[test]
    fn test_empty_definition_rejected() {
        let err = SagaDefinition::builder("empty").build().unwrap_err();
        assert!(matches!(err, DefinitionError::Empty(_)));
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let err = SagaDefinition::builder("dup")
            .step(ok_step("ReserveFlight"))
            .step(ok_step("ReserveFlight"))
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateStep { .. }));
    }

    #[test]
    fn test_index_lookup() {
        let def = SagaDefinition::builder("trip")
            .step(ok_step("ReserveFlight"))
            .step(ok_step("ReserveCarRental"))
            .build()
            .unwrap();
        assert_eq!(def.len(), 2);
        assert_eq!(def.index_of("ReserveCarRental"), Some(1));
        assert_eq!(def.index_of("ProcessPayment"), None);
    }
}
