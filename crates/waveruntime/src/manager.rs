use crate::control::RunControl;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use wavecore::{
    EventBus, ExecutionEvent, ParameterMap, ProduceResult, ProducerGraph, ProducerId, Result,
    RunOptions, Value, WorkflowContext, WorkflowError, WorkflowResult,
};

/// Callback invoked synchronously once per completed producer.
pub type ResultObserver = Arc<dyn Fn(&ProduceResult) + Send + Sync>;

/// A producer waiting for a wave, with the data routed to it so far.
struct QueueItem {
    producer: ProducerId,
    data: Vec<Value>,
    inject: ParameterMap,
}

impl QueueItem {
    fn new(producer: ProducerId) -> Self {
        Self {
            producer,
            data: Vec::new(),
            inject: ParameterMap::new(),
        }
    }
}

/// Scheduler-owned sets of one run.
#[derive(Default)]
struct RunState {
    finished: HashSet<ProducerId>,
    skipped: HashSet<ProducerId>,
    /// Completed producers whose result may still be dropped from the pool.
    need_clean: Vec<ProducerId>,
}

impl RunState {
    fn settled(&self, id: ProducerId) -> bool {
        self.finished.contains(&id) || self.skipped.contains(&id)
    }
}

/// Runs a producer graph wave by wave from its entrance.
///
/// A manager admits one run at a time. Control requests (`pause`, `stop`,
/// `resume`) are honored only between waves; use [`WorkflowManager::handle`]
/// to issue them from another task while `run` is being awaited.
pub struct WorkflowManager {
    graph: Arc<ProducerGraph>,
    entrance: Option<ProducerId>,
    output: Option<ProducerId>,
    control: Arc<RunControl>,
    result_observer: Option<ResultObserver>,
    events: Option<Arc<EventBus>>,
}

impl WorkflowManager {
    pub fn new() -> Self {
        Self::from_graph(ProducerGraph::new())
    }

    pub fn from_graph(graph: ProducerGraph) -> Self {
        Self {
            graph: Arc::new(graph),
            entrance: None,
            output: None,
            control: Arc::new(RunControl::default()),
            result_observer: None,
            events: None,
        }
    }

    pub(crate) fn assemble(graph: ProducerGraph, entrance: ProducerId, output: Option<ProducerId>) -> Self {
        Self {
            entrance: Some(entrance),
            output,
            ..Self::from_graph(graph)
        }
    }

    pub fn graph(&self) -> &ProducerGraph {
        &self.graph
    }

    /// Mutable access to the graph. Fails while a shallow clone shares it.
    pub fn graph_mut(&mut self) -> Result<&mut ProducerGraph> {
        Arc::get_mut(&mut self.graph).ok_or_else(|| {
            WorkflowError::Conflict("Producer graph is shared with another manager".to_string())
        })
    }

    pub fn entrance(&self) -> Option<&str> {
        self.entrance.map(|id| self.graph[id].id())
    }

    pub fn output(&self) -> Option<&str> {
        self.output.map(|id| self.graph[id].id())
    }

    pub fn set_entrance(&mut self, id: &str) -> Result<()> {
        self.entrance = Some(self.lookup(id, "entrance")?);
        Ok(())
    }

    /// Designate the output producer, enabling memory reclamation.
    pub fn set_output(&mut self, id: &str) -> Result<()> {
        self.output = Some(self.lookup(id, "output point")?);
        Ok(())
    }

    pub fn clear_output(&mut self) {
        self.output = None;
    }

    pub fn set_result_observer<F>(&mut self, observer: F)
    where
        F: Fn(&ProduceResult) + Send + Sync + 'static,
    {
        self.result_observer = Some(Arc::new(observer));
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Producers finished in the current or most recent run, in completion order.
    pub fn finished(&self) -> Vec<String> {
        self.control.context().map(|c| c.finished()).unwrap_or_default()
    }

    /// Producers skipped in the current or most recent run.
    pub fn skipped(&self) -> Vec<String> {
        self.control.context().map(|c| c.skipped()).unwrap_or_default()
    }

    /// Producers that can not be reached from the entrance.
    pub fn unreachable_nodes(&self) -> Vec<String> {
        self.entrance
            .map(|entrance| self.graph.unreachable_from(entrance))
            .unwrap_or_default()
    }

    pub fn handle(&self) -> WorkflowHandle {
        WorkflowHandle {
            control: Arc::clone(&self.control),
        }
    }

    /// Suspend the run at its next wave checkpoint. Resolves once suspended.
    pub async fn pause(&self) -> Result<()> {
        self.control.pause().await
    }

    /// End the run at its next wave checkpoint. Resolves once observed.
    pub async fn stop(&self) -> Result<()> {
        self.control.stop().await
    }

    pub fn resume(&self) -> Result<()> {
        self.control.resume()
    }

    /// A manager over the same graph, entrance and output, with its own run
    /// state. Producers are shared, so both may run concurrently only if the
    /// producers tolerate it.
    pub fn shallow_clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            entrance: self.entrance,
            output: self.output,
            control: Arc::new(RunControl::default()),
            result_observer: None,
            events: None,
        }
    }

    /// Execute the graph from its entrance.
    ///
    /// `input` must be an array unless `options.single_input` is set. With
    /// an output producer configured, the result holds only that producer's
    /// data; otherwise it holds every producer's result in completion order.
    pub async fn run(
        &self,
        input: Value,
        environment: ParameterMap,
        options: RunOptions,
    ) -> Result<WorkflowResult> {
        let entrance = self
            .entrance
            .ok_or_else(|| WorkflowError::Unavailable("Workflow has no entrance point".to_string()))?;
        let ctx = WorkflowContext::new(environment);
        let _guard = self.control.begin(ctx.clone())?;

        let input = match input {
            value if options.single_input => vec![value],
            Value::Array(items) => items,
            other => {
                return Err(WorkflowError::InvalidInput(format!(
                    "When single_input is not set, input data must be an array (got {})",
                    other.kind()
                )))
            }
        };

        let start = Instant::now();
        let execution_id = ctx.execution_id();
        tracing::info!("Starting workflow run {} from '{}'", execution_id, self.graph[entrance].id());
        self.emit(|| ExecutionEvent::WorkflowStarted {
            execution_id,
            entrance: self.graph[entrance].id().to_string(),
            timestamp: Utc::now(),
        });

        if let Err(e) = self.drive(entrance, input, &ctx).await {
            tracing::error!("Workflow run {} failed: {}", execution_id, e);
            self.emit(|| ExecutionEvent::WorkflowFailed {
                execution_id,
                error: e.to_string(),
                timestamp: Utc::now(),
            });
            return Err(e);
        }

        let finished = !self.control.conclude();
        let mut data = ctx.data_pool();
        if options.return_last && data.len() > 1 {
            data.drain(..data.len() - 1);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Workflow run {} ended in {}ms (finished: {}, results: {})",
            execution_id,
            duration_ms,
            finished,
            data.len()
        );
        self.emit(|| ExecutionEvent::WorkflowCompleted {
            execution_id,
            finished,
            duration_ms,
            timestamp: Utc::now(),
        });

        Ok(WorkflowResult { data, finished })
    }

    /// The wave loop.
    async fn drive(&self, entrance: ProducerId, input: Vec<Value>, ctx: &WorkflowContext) -> Result<()> {
        let graph = &*self.graph;
        let execution_id = ctx.execution_id();
        let mut state = RunState::default();
        let mut running = vec![QueueItem {
            producer: entrance,
            data: input,
            inject: ParameterMap::new(),
        }];
        let mut wave = 0usize;

        while !running.is_empty() {
            if let Some(resume) = self.control.take_pause() {
                tracing::info!("Workflow run {} paused before wave {}", execution_id, wave + 1);
                self.emit(|| ExecutionEvent::WorkflowPaused {
                    execution_id,
                    timestamp: Utc::now(),
                });
                // The sender lives until resume, stop or the end of the run.
                let _ = resume.await;
                tracing::info!("Workflow run {} resumed", execution_id);
                self.emit(|| ExecutionEvent::WorkflowResumed {
                    execution_id,
                    timestamp: Utc::now(),
                });
            }
            if self.control.observe_stop() {
                tracing::info!("Workflow run {} stopped before wave {}", execution_id, wave + 1);
                self.emit(|| ExecutionEvent::WorkflowStopped {
                    execution_id,
                    timestamp: Utc::now(),
                });
                break;
            }

            let current: HashSet<ProducerId> = running.iter().map(|item| item.producer).collect();
            let mut next: Vec<QueueItem> = Vec::new();
            let mut active: Vec<QueueItem> = Vec::new();
            for item in running {
                let deferred = next.iter().any(|n| n.producer == item.producer);
                if !deferred && graph.fit_condition(item.producer, &state.finished, &state.skipped) {
                    active.push(item);
                } else {
                    merge(&mut next, item);
                }
            }

            if active.is_empty() {
                let stuck: Vec<&str> = next.iter().map(|item| graph[item.producer].id()).collect();
                return Err(WorkflowError::Unavailable(format!(
                    "Workflow cannot make progress, producers never become ready: {}",
                    stuck.join(", ")
                )));
            }

            wave += 1;
            let names: Vec<String> = active.iter().map(|item| graph[item.producer].id().to_string()).collect();
            tracing::debug!("Wave {}: dispatching {:?}", wave, names);
            self.emit(|| ExecutionEvent::WaveStarted {
                execution_id,
                wave,
                producers: names.clone(),
                timestamp: Utc::now(),
            });

            let mut tasks: FuturesUnordered<_> = active
                .into_iter()
                .map(|item| async move {
                    let started = Instant::now();
                    let result = graph[item.producer]
                        .prepare_execute(item.data, item.inject, ctx)
                        .await;
                    (item.producer, result, started.elapsed().as_millis() as u64)
                })
                .collect();

            let mut failure: Option<WorkflowError> = None;
            let mut reached_output = false;
            while let Some((pid, result, duration_ms)) = tasks.next().await {
                if failure.is_some() {
                    continue;
                }
                let data = match result {
                    Ok(data) => data,
                    Err(e) => {
                        tracing::error!("Producer '{}' failed: {}", graph[pid].id(), e);
                        failure = Some(e.into());
                        continue;
                    }
                };

                let node = &graph[pid];
                state.finished.insert(pid);
                let produced = ProduceResult::new(node.id(), data);
                tracing::debug!(
                    "Producer '{}' completed in {}ms with {} value(s)",
                    node.id(),
                    duration_ms,
                    produced.data.len()
                );
                self.emit(|| ExecutionEvent::ProducerCompleted {
                    execution_id,
                    producer_id: node.id().to_string(),
                    producer_type: node.producer_type().to_string(),
                    outputs: produced.data.clone(),
                    duration_ms,
                    timestamp: Utc::now(),
                });

                if reached_output {
                    ctx.with_ledger_mut(|l| l.finished.push(produced.producer.clone()));
                    self.observe(&produced);
                    continue;
                }

                if self.output == Some(pid) {
                    reached_output = true;
                    next.clear();
                    ctx.with_ledger_mut(|l| {
                        l.finished.push(produced.producer.clone());
                        l.data_pool.clear();
                        l.data_pool.push(produced.clone());
                    });
                    self.observe(&produced);
                    continue;
                }

                if self.output.is_some() {
                    state.need_clean.push(pid);
                }
                ctx.with_ledger_mut(|l| {
                    l.finished.push(produced.producer.clone());
                    l.data_pool.push(produced.clone());
                });
                self.observe(&produced);

                if ctx.is_cancelled() {
                    tracing::info!("Producer '{}' cancelled the run, stopping at next checkpoint", node.id());
                    self.control.request_stop();
                    continue;
                }
                if let Err(e) = self.route(pid, &produced.data, &current, &mut next, &mut state, ctx) {
                    failure = Some(e);
                }
            }
            drop(tasks);

            if let Some(e) = failure {
                return Err(e);
            }
            if self.output.is_some() {
                self.reclaim(&mut state, ctx);
            }
            running = next;
        }

        Ok(())
    }

    /// Deliver the emitted values of `from` along each outgoing relation.
    fn route(
        &self,
        from: ProducerId,
        data: &[Value],
        current: &HashSet<ProducerId>,
        next: &mut Vec<QueueItem>,
        state: &mut RunState,
        ctx: &WorkflowContext,
    ) -> Result<()> {
        let graph = &*self.graph;
        for (rid, relation) in graph.children_of(from) {
            let mut accepted = Vec::new();
            for value in data {
                if graph.judge(rid, value)? {
                    accepted.push(value.clone());
                }
            }

            let target = relation.to();
            if !accepted.is_empty() || relation.allow_empty_input() {
                let item = entry(next, target);
                match relation.inject() {
                    Some(name) => {
                        let first = accepted.into_iter().next().unwrap_or(Value::Null);
                        item.inject.insert(name.to_string(), first);
                    }
                    None => item.data.extend(accepted),
                }
            } else if !current.contains(&target)
                && !next.iter().any(|item| item.producer == target)
                && graph.fit_condition(target, &state.finished, &state.skipped)
            {
                self.skip_producer(target, current, next, state, ctx);
            }
        }
        Ok(())
    }

    /// Mark `target` skipped, then every descendant left with no parent that
    /// could still deliver data to it.
    fn skip_producer(
        &self,
        target: ProducerId,
        current: &HashSet<ProducerId>,
        next: &[QueueItem],
        state: &mut RunState,
        ctx: &WorkflowContext,
    ) {
        let graph = &*self.graph;
        let mut pending = vec![target];
        while let Some(id) = pending.pop() {
            if state.finished.contains(&id) || !state.skipped.insert(id) {
                continue;
            }
            let node = &graph[id];
            tracing::warn!("Skipping producer '{}': no relation delivered data", node.id());
            ctx.with_ledger_mut(|l| l.skipped.push(node.id().to_string()));
            self.emit(|| ExecutionEvent::ProducerSkipped {
                execution_id: ctx.execution_id(),
                producer_id: node.id().to_string(),
                timestamp: Utc::now(),
            });

            // A finished parent has already routed, so it counts as settled
            // alongside skipped ones. Otherwise the outcome would depend on
            // which sibling of the wave completed first.
            for (_, relation) in graph.children_of(id) {
                let child = relation.to();
                if !current.contains(&child)
                    && !next.iter().any(|item| item.producer == child)
                    && graph.fit_condition(child, &state.finished, &state.skipped)
                {
                    pending.push(child);
                }
            }
        }
    }

    /// Drop results that nothing pending can still consume. Always keeps at
    /// least one entry in the pool.
    fn reclaim(&self, state: &mut RunState, ctx: &WorkflowContext) {
        let graph = &*self.graph;
        ctx.with_ledger_mut(|ledger| {
            let mut i = 0;
            while i < state.need_clean.len() && ledger.data_pool.len() > 1 {
                let pid = state.need_clean[i];
                if graph.children_of(pid).all(|(_, r)| state.settled(r.to())) {
                    let id = graph[pid].id();
                    if let Some(pos) = ledger.data_pool.iter().position(|r| r.producer == id) {
                        ledger.data_pool.remove(pos);
                    }
                    state.need_clean.remove(i);
                } else {
                    i += 1;
                }
            }
        });
    }

    fn observe(&self, result: &ProduceResult) {
        if let Some(observer) = &self.result_observer {
            observer(result);
        }
    }

    fn emit(&self, event: impl FnOnce() -> ExecutionEvent) {
        if let Some(events) = &self.events {
            events.emit(event());
        }
    }

    fn lookup(&self, id: &str, role: &str) -> Result<ProducerId> {
        self.graph.find(id).ok_or_else(|| {
            WorkflowError::Unavailable(format!("Cannot use unknown producer '{}' as {}", id, role))
        })
    }
}

impl Default for WorkflowManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry for `producer` in the next wave, created when absent.
fn entry(next: &mut Vec<QueueItem>, producer: ProducerId) -> &mut QueueItem {
    match next.iter().position(|item| item.producer == producer) {
        Some(pos) => &mut next[pos],
        None => {
            next.push(QueueItem::new(producer));
            let last = next.len() - 1;
            &mut next[last]
        }
    }
}

/// Fold a deferred item into the next wave.
fn merge(next: &mut Vec<QueueItem>, item: QueueItem) {
    let existing = entry(next, item.producer);
    existing.data.extend(item.data);
    existing.inject.extend(item.inject);
}

/// Cloneable control surface of a [`WorkflowManager`], usable from other
/// tasks while a run is awaited.
#[derive(Clone)]
pub struct WorkflowHandle {
    control: Arc<RunControl>,
}

impl WorkflowHandle {
    pub async fn pause(&self) -> Result<()> {
        self.control.pause().await
    }

    pub async fn stop(&self) -> Result<()> {
        self.control.stop().await
    }

    pub fn resume(&self) -> Result<()> {
        self.control.resume()
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    pub fn finished(&self) -> Vec<String> {
        self.control.context().map(|c| c.finished()).unwrap_or_default()
    }

    pub fn skipped(&self) -> Vec<String> {
        self.control.context().map(|c| c.skipped()).unwrap_or_default()
    }
}
