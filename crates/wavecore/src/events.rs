use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Events emitted by a manager during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    WorkflowStarted {
        execution_id: ExecutionId,
        entrance: String,
        timestamp: DateTime<Utc>,
    },
    WaveStarted {
        execution_id: ExecutionId,
        wave: usize,
        producers: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    ProducerCompleted {
        execution_id: ExecutionId,
        producer_id: String,
        producer_type: String,
        outputs: Vec<Value>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    ProducerSkipped {
        execution_id: ExecutionId,
        producer_id: String,
        timestamp: DateTime<Utc>,
    },
    WorkflowPaused {
        execution_id: ExecutionId,
        timestamp: DateTime<Utc>,
    },
    WorkflowResumed {
        execution_id: ExecutionId,
        timestamp: DateTime<Utc>,
    },
    WorkflowStopped {
        execution_id: ExecutionId,
        timestamp: DateTime<Utc>,
    },
    WorkflowCompleted {
        execution_id: ExecutionId,
        finished: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    WorkflowFailed {
        execution_id: ExecutionId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            ExecutionEvent::WorkflowStarted { execution_id, .. }
            | ExecutionEvent::WaveStarted { execution_id, .. }
            | ExecutionEvent::ProducerCompleted { execution_id, .. }
            | ExecutionEvent::ProducerSkipped { execution_id, .. }
            | ExecutionEvent::WorkflowPaused { execution_id, .. }
            | ExecutionEvent::WorkflowResumed { execution_id, .. }
            | ExecutionEvent::WorkflowStopped { execution_id, .. }
            | ExecutionEvent::WorkflowCompleted { execution_id, .. }
            | ExecutionEvent::WorkflowFailed { execution_id, .. } => *execution_id,
        }
    }
}

/// Broadcast bus for execution events. Sending with no subscriber is not an
/// error.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();
        bus.emit(ExecutionEvent::WorkflowPaused {
            execution_id: id,
            timestamp: Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.execution_id(), id);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "WorkflowPaused");
    }

    #[test]
    fn emitting_without_subscribers_is_silent() {
        EventBus::new(1).emit(ExecutionEvent::WorkflowStopped {
            execution_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });
    }
}
