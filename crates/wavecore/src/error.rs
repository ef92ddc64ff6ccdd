use thiserror::Error;

/// Errors raised by graph assembly, loading and the scheduler.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The operation is not valid for the current run state.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// The operation collides with one already in progress.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Structural error while building a workflow from definitions.
    #[error("Generator error: {0}")]
    Generator(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Misuse of the producer graph (unknown ids, missing edges).
    #[error("Graph error: {0}")]
    Graph(String),

    /// A relation condition could not be evaluated.
    #[error("Cannot evaluate condition under relation {from} -> {to}: {message}")]
    Relation {
        from: String,
        to: String,
        message: String,
    },

    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Taxonomy name of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Unavailable(_) => "Unavailable",
            WorkflowError::Conflict(_) => "Conflict",
            WorkflowError::Generator(_) => "Generator",
            WorkflowError::InvalidInput(_) => "InvalidInput",
            WorkflowError::Graph(_) => "Graph",
            WorkflowError::Relation { .. } => "Relation",
            WorkflowError::Producer(_) => "Producer",
            WorkflowError::Serialization(_) => "Serialization",
        }
    }
}

/// Failure reported by a producer implementation.
///
/// Producers do not know their own graph id; the node wrapping them turns
/// this into a [`ProducerError`] that carries type and id.
#[derive(Error, Debug)]
pub enum ProduceError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Parameter error: {0}")]
    Parameter(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// A nested workflow failed; the inner error is kept as the source.
    #[error("Sub-workflow failed: {0}")]
    Workflow(#[source] Box<WorkflowError>),
}

impl From<WorkflowError> for ProduceError {
    fn from(err: WorkflowError) -> Self {
        ProduceError::Workflow(Box::new(err))
    }
}

/// A producer failure, tagged with the originating producer's type and id.
#[derive(Error, Debug)]
#[error("{producer_type} {{{producer_id}}}: {source}")]
pub struct ProducerError {
    pub producer_type: String,
    pub producer_id: String,
    #[source]
    pub source: ProduceError,
}

impl ProducerError {
    pub fn new(
        producer_type: impl Into<String>,
        producer_id: impl Into<String>,
        source: ProduceError,
    ) -> Self {
        Self {
            producer_type: producer_type.into(),
            producer_id: producer_id.into(),
            source,
        }
    }

    /// Shorthand for an execution failure with a plain message.
    pub fn message(
        producer_type: impl Into<String>,
        producer_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            producer_type,
            producer_id,
            ProduceError::ExecutionFailed(message.into()),
        )
    }

    /// The nested producer error when this failure came out of a sub-workflow.
    pub fn nested(&self) -> Option<&ProducerError> {
        match &self.source {
            ProduceError::Workflow(inner) => match inner.as_ref() {
                WorkflowError::Producer(p) => Some(p),
                _ => None,
            },
            _ => None,
        }
    }
}
