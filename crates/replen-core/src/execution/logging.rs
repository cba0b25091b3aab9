//! Simulated executor that only logs.

use async_trait::async_trait;
use tracing::info;

use super::{ExecutionContext, ExecutionError, ExecutionReceipt, IntentExecutor};
use crate::intent::Intent;

/// Executor that logs the intent and reports success.
///
/// Useful for local runs and demos where no chain is attached.
#[derive(Debug, Clone, Default)]
pub struct LoggingExecutor;

impl LoggingExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IntentExecutor for LoggingExecutor {
    async fn execute(
        &self,
        intent: &Intent,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionReceipt, ExecutionError> {
        info!(
            intent_id = %intent.id,
            action = %intent.action,
            pool_id = %intent.pool_id,
            amount = %intent.amount,
            attempt = ctx.attempt,
            "Executing intent (simulated)"
        );
        Ok(ExecutionReceipt::default())
    }

    fn name(&self) -> &str {
        "logging"
    }
}
