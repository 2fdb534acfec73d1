//! Step executor contract

use async_trait::async_trait;
use serde_json::Value;

use crate::{Context, StepError};

/// One unit of saga work: a forward action or a compensating action
/// against a downstream resource.
///
/// The engine delivers at least once; executors own their idempotency,
/// typically by deriving resource keys deterministically from the
/// context (see [`crate::IdempotencyKey`]) rather than minting random
/// ids. Compensating executors must tolerate being invoked for a
/// resource that was never created: compensation is best-effort cleanup,
/// not guaranteed enactment.
///
/// # Example
///
/// ```rust,ignore
/// struct ReserveFlight { table: Arc<TripTable> }
///
/// #[async_trait]
/// impl StepExecutor for ReserveFlight {
///     async fn execute(&self, ctx: &Context) -> Result<Value, StepError> {
///         // put the reservation row, keyed deterministically
///     }
/// }
/// ```
#[async_trait]
pub trait StepExecutor: Send + Sync + 'static {
    /// Perform the action with the accumulated run context.
    ///
    /// The success payload is opaque to the engine and is forwarded to
    /// later steps keyed by this step's name.
    async fn execute(&self, context: &Context) -> Result<Value, StepError>;
}

/// Adapter turning a plain function into a [`StepExecutor`].
///
/// Mostly useful in tests and for steps with no external resource.
pub struct FnExecutor<F>(F);

impl<F> FnExecutor<F>
where
    F: Fn(&Context) -> Result<Value, StepError> + Send + Sync + 'static,
{
    /// Wrap a synchronous function as an executor
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> StepExecutor for FnExecutor<F>
where
    F: Fn(&Context) -> Result<Value, StepError> + Send + Sync + 'static,
{
    async fn execute(&self, context: &Context) -> Result<Value, StepError> {
        (self.0)(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_executor_passes_context_through() {
        let exec = FnExecutor::new(|ctx: &Context| {
            Ok(json!({ "echo": ctx.get_str("trip_id").unwrap_or("") }))
        });
        let ctx = Context::new().with("trip_id", json!("T1"));

        let out = exec.execute(&ctx).await.unwrap();
        assert_eq!(out["echo"], "T1");
    }
}
