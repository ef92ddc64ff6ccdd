use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use wavecore::{WorkflowContext, WorkflowError};

/// Pending control requests, resolved by the run loop at wave checkpoints.
#[derive(Default)]
struct Signals {
    /// Fired when the loop reaches the checkpoint and suspends.
    pause_ack: Option<oneshot::Sender<()>>,
    /// Armed by `pause()`, consumed by `resume()` (or `stop()`).
    resume_tx: Option<oneshot::Sender<()>>,
    /// Handed to the loop at the checkpoint.
    resume_rx: Option<oneshot::Receiver<()>>,
    stop: Option<StopRequest>,
}

struct StopRequest {
    /// `None` for stops requested through context cancellation.
    ack: Option<oneshot::Sender<()>>,
}

/// Run state shared between a manager and its handles.
///
/// `running` only flips while `signals` is held so that a control call can
/// never slip in between the end of a run and the reset of its signals.
#[derive(Default)]
pub(crate) struct RunControl {
    running: AtomicBool,
    signals: Mutex<Signals>,
    context: Mutex<Option<WorkflowContext>>,
}

impl RunControl {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Enter the running state. Fails when a run is already in flight.
    pub fn begin(self: &Arc<Self>, ctx: WorkflowContext) -> Result<RunGuard, WorkflowError> {
        {
            let mut signals = self.signals();
            if self.running.swap(true, Ordering::SeqCst) {
                return Err(WorkflowError::Conflict("Workflow is already running".to_string()));
            }
            *signals = Signals::default();
        }
        *self.context.lock().unwrap_or_else(PoisonError::into_inner) = Some(ctx);
        Ok(RunGuard {
            control: Arc::clone(self),
        })
    }

    /// Context of the current or most recent run.
    pub fn context(&self) -> Option<WorkflowContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub async fn pause(&self) -> Result<(), WorkflowError> {
        let acked = {
            let mut signals = self.signals();
            if !self.is_running() {
                return Err(WorkflowError::Unavailable("Workflow is not running".to_string()));
            }
            if signals.pause_ack.is_some() || signals.resume_tx.is_some() {
                return Err(WorkflowError::Conflict("Workflow is in pausing progress".to_string()));
            }
            if signals.stop.is_some() {
                return Err(WorkflowError::Conflict("Workflow is in stopping progress".to_string()));
            }
            let (ack_tx, ack_rx) = oneshot::channel();
            let (resume_tx, resume_rx) = oneshot::channel();
            signals.pause_ack = Some(ack_tx);
            signals.resume_tx = Some(resume_tx);
            signals.resume_rx = Some(resume_rx);
            ack_rx
        };
        acked.await.map_err(|_| {
            WorkflowError::Unavailable("Workflow finished before reaching a pause checkpoint".to_string())
        })
    }

    pub async fn stop(&self) -> Result<(), WorkflowError> {
        let acked = {
            let mut signals = self.signals();
            if !self.is_running() {
                return Err(WorkflowError::Unavailable("Workflow is not running".to_string()));
            }
            if signals.stop.is_some() {
                return Err(WorkflowError::Conflict("Workflow is in stopping progress".to_string()));
            }
            let (ack_tx, ack_rx) = oneshot::channel();
            signals.stop = Some(StopRequest { ack: Some(ack_tx) });
            if let Some(resume) = signals.resume_tx.take() {
                let _ = resume.send(());
            }
            ack_rx
        };
        // A dropped ack means the run ended on an error; it is stopped either way.
        let _ = acked.await;
        Ok(())
    }

    pub fn resume(&self) -> Result<(), WorkflowError> {
        let mut signals = self.signals();
        if !self.is_running() {
            return Err(WorkflowError::Unavailable("Workflow is not running".to_string()));
        }
        match signals.resume_tx.take() {
            Some(resume) => {
                let _ = resume.send(());
                Ok(())
            }
            None => Err(WorkflowError::Unavailable("Workflow is not paused".to_string())),
        }
    }

    /// Stop request raised from inside the run (context cancellation).
    pub(crate) fn request_stop(&self) {
        let mut signals = self.signals();
        if signals.stop.is_none() {
            signals.stop = Some(StopRequest { ack: None });
        }
    }

    /// At a checkpoint: acknowledge a pending pause and hand back the
    /// signal to wait on.
    pub(crate) fn take_pause(&self) -> Option<oneshot::Receiver<()>> {
        let mut signals = self.signals();
        let ack = signals.pause_ack.take()?;
        let _ = ack.send(());
        signals.resume_rx.take()
    }

    /// At a checkpoint: whether the loop must break now.
    pub(crate) fn observe_stop(&self) -> bool {
        let mut signals = self.signals();
        match signals.stop.as_mut() {
            Some(request) => {
                if let Some(ack) = request.ack.take() {
                    let _ = ack.send(());
                }
                true
            }
            None => false,
        }
    }

    /// Whether a stop was requested at any point of the run. Acknowledges a
    /// request that arrived after the last checkpoint.
    pub(crate) fn conclude(&self) -> bool {
        self.observe_stop()
    }

    fn signals(&self) -> MutexGuard<'_, Signals> {
        self.signals.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the control to idle when a run ends, however it ends.
pub(crate) struct RunGuard {
    control: Arc<RunControl>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut signals = self.control.signals();
        *signals = Signals::default();
        self.control.running.store(false, Ordering::SeqCst);
    }
}
