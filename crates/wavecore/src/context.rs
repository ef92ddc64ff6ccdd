use crate::parameter::ParameterMap;
use crate::result::ProduceResult;
use crate::value::Value;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Live bookkeeping of one run. Only the scheduler mutates it.
#[derive(Debug, Default)]
pub struct RunLedger {
    pub finished: Vec<String>,
    pub skipped: Vec<String>,
    pub data_pool: Vec<ProduceResult>,
}

struct ContextInner {
    execution_id: Uuid,
    environment: ParameterMap,
    cancellation: CancellationToken,
    ledger: RwLock<RunLedger>,
}

/// Per-run state shared by every producer invocation.
///
/// Cloning is cheap; all clones observe the same run. Producers get
/// snapshot readers only, the contents may change between waves.
#[derive(Clone)]
pub struct WorkflowContext {
    inner: Arc<ContextInner>,
}

impl WorkflowContext {
    pub fn new(environment: ParameterMap) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                execution_id: Uuid::new_v4(),
                environment,
                cancellation: CancellationToken::new(),
                ledger: RwLock::new(RunLedger::default()),
            }),
        }
    }

    pub fn execution_id(&self) -> Uuid {
        self.inner.execution_id
    }

    pub fn environment(&self) -> &ParameterMap {
        &self.inner.environment
    }

    pub fn env(&self, key: &str) -> Option<&Value> {
        self.inner.environment.get(key)
    }

    /// Ask the scheduler to stop at its next checkpoint. In-flight calls
    /// are not interrupted.
    pub fn cancel(&self) {
        self.inner.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Token that fires when the run is cancelled, for producers that want
    /// to `select!` on it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancellation.clone()
    }

    pub fn finished(&self) -> Vec<String> {
        self.with_ledger(|l| l.finished.clone())
    }

    pub fn skipped(&self) -> Vec<String> {
        self.with_ledger(|l| l.skipped.clone())
    }

    pub fn data_pool(&self) -> Vec<ProduceResult> {
        self.with_ledger(|l| l.data_pool.clone())
    }

    pub fn data_pool_len(&self) -> usize {
        self.with_ledger(|l| l.data_pool.len())
    }

    pub fn is_finished(&self, id: &str) -> bool {
        self.with_ledger(|l| l.finished.iter().any(|f| f == id))
    }

    pub fn is_skipped(&self, id: &str) -> bool {
        self.with_ledger(|l| l.skipped.iter().any(|s| s == id))
    }

    pub fn with_ledger<R>(&self, f: impl FnOnce(&RunLedger) -> R) -> R {
        let ledger = self.inner.ledger.read().unwrap_or_else(PoisonError::into_inner);
        f(&ledger)
    }

    #[doc(hidden)]
    pub fn with_ledger_mut<R>(&self, f: impl FnOnce(&mut RunLedger) -> R) -> R {
        let mut ledger = self.inner.ledger.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut ledger)
    }
}

impl std::fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("execution_id", &self.inner.execution_id)
            .field("environment", &self.inner.environment)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn clones_share_one_run() {
        let ctx = WorkflowContext::new(HashMap::from([("region".to_string(), Value::from("eu"))]));
        let view = ctx.clone();
        ctx.with_ledger_mut(|l| {
            l.finished.push("a".to_string());
            l.data_pool.push(ProduceResult::new("a", vec![1.into()]));
        });
        assert!(view.is_finished("a"));
        assert!(!view.is_skipped("a"));
        assert_eq!(view.data_pool_len(), 1);
        assert_eq!(view.env("region"), Some(&Value::from("eu")));
        assert_eq!(view.execution_id(), ctx.execution_id());
    }

    #[test]
    fn cancellation_is_visible_to_all_clones() {
        let ctx = WorkflowContext::new(HashMap::new());
        let token = ctx.cancellation_token();
        ctx.clone().cancel();
        assert!(ctx.is_cancelled());
        assert!(token.is_cancelled());
    }
}
