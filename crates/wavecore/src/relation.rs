use crate::condition::ConditionExpr;
use crate::graph::ProducerId;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Caller-supplied predicate. An `Err` aborts the run.
pub type NativePredicate = Arc<dyn Fn(&Value) -> Result<bool, String> + Send + Sync>;

/// Predicate deciding which emitted values travel along a relation.
#[derive(Clone, Default)]
pub enum Condition {
    #[default]
    Always,
    Expr(ConditionExpr),
    Native(NativePredicate),
}

impl Condition {
    pub fn native<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, String> + Send + Sync + 'static,
    {
        Condition::Native(Arc::new(predicate))
    }

    pub fn evaluate(&self, value: &Value) -> Result<bool, String> {
        match self {
            Condition::Always => Ok(true),
            Condition::Expr(expr) => expr.evaluate(value),
            Condition::Native(predicate) => predicate(value),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => f.write_str("Always"),
            Condition::Expr(expr) => f.debug_tuple("Expr").field(expr).finish(),
            Condition::Native(_) => f.write_str("Native(..)"),
        }
    }
}

impl From<ConditionExpr> for Condition {
    fn from(expr: ConditionExpr) -> Self {
        Condition::Expr(expr)
    }
}

/// Handle to a relation stored in a [`crate::ProducerGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationId(pub(crate) usize);

/// Per-edge settings supplied when relating two producers.
#[derive(Debug, Clone, Default)]
pub struct RelationOptions {
    pub inject: Option<String>,
    pub condition: Condition,
    pub allow_empty_input: bool,
}

impl RelationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver the first accepted value as a named parameter instead of input.
    pub fn inject(mut self, name: impl Into<String>) -> Self {
        self.inject = Some(name.into());
        self
    }

    pub fn condition(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = condition.into();
        self
    }

    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.condition(Condition::native(predicate))
    }

    pub fn allow_empty_input(mut self, allow: bool) -> Self {
        self.allow_empty_input = allow;
        self
    }
}

/// A directed, conditioned edge between two producers.
#[derive(Debug, Clone)]
pub struct Relation {
    pub(crate) from: ProducerId,
    pub(crate) to: ProducerId,
    inject: Option<String>,
    condition: Condition,
    allow_empty_input: bool,
}

impl Relation {
    pub(crate) fn new(from: ProducerId, to: ProducerId, options: RelationOptions) -> Self {
        Self {
            from,
            to,
            inject: options.inject,
            condition: options.condition,
            allow_empty_input: options.allow_empty_input,
        }
    }

    pub fn from(&self) -> ProducerId {
        self.from
    }

    pub fn to(&self) -> ProducerId {
        self.to
    }

    pub fn inject(&self) -> Option<&str> {
        self.inject.as_deref()
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Whether the target still runs when no emitted value is accepted.
    pub fn allow_empty_input(&self) -> bool {
        self.allow_empty_input
    }
}
