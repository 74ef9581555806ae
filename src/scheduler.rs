//! The Scheduler: the central run loop, cycle sub-scheduler, candidate
//! selection, and stuck detection.
//!
//! The run-queue / waiting-queue algorithm handles lazy-variadic
//! deferral, a two-witness stuck check, and an ordered candidate
//! selection policy for forcing progress once the run queue drains.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::component::{ComponentImpl, ComponentOutput};
use crate::config::EngineConfig;
use crate::distributor::distribute;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::input_data::InputData;
use crate::input_store::InputStore;
use crate::readiness::{is_lazy_variadic, ready};
use crate::worker::Worker;

/// One element of the stream [`Scheduler::run`] returns.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// One component's output, yielded immediately after it runs
    /// (including each iteration inside a cycle). Deep-snapshotted:
    /// `serde_json::Value`'s `Clone` is already a structural copy, so
    /// no further mutation by a downstream component can alter what
    /// was already yielded here.
    Output {
        component: String,
        outputs: ComponentOutput,
    },
    /// The terminal value: every component's last leaf output map.
    /// Always the last item the stream yields. `stuck` is true if the
    /// run ended via stuck-loop detection rather than natural
    /// termination.
    Final {
        outputs: HashMap<String, ComponentOutput>,
        stuck: bool,
    },
}

/// Orchestrates one or more runs of a fixed [`Graph`]. Cheap to clone
/// (graph is `Arc`-shared); construction validates that every cycle in
/// the graph is breakable.
#[derive(Clone)]
pub struct Scheduler {
    graph: Arc<Graph>,
    config: EngineConfig,
}

impl Scheduler {
    /// Build a scheduler for `graph`. Fails with `InvalidGraph` if any
    /// cycle in the graph cannot be broken.
    pub fn new(graph: Graph, config: EngineConfig) -> Result<Self> {
        graph.validate_cycles_breakable()?;
        Ok(Scheduler {
            graph: Arc::new(graph),
            config,
        })
    }

    /// Builder-style override of the visit budget.
    pub fn with_max_runs_per_component(mut self, max: u32) -> Self {
        self.config.max_runs_per_component = max;
        self
    }

    /// Builder-style injection of a worker executor.
    pub fn with_worker(mut self, worker: Arc<Worker>) -> Self {
        self.config.worker = Some(worker);
        self
    }

    /// Run the graph once against `data`, returning a stream of
    /// [`PipelineEvent`]s. One engine instance runs one graph; nothing
    /// here is shared across concurrent calls to `run`. Each call gets
    /// its own fresh Input Store, queues, and visit counters, created
    /// here and dropped when the returned stream is dropped or drained
    /// to completion.
    pub fn run(&self, data: InputData) -> ReceiverStream<Result<PipelineEvent>> {
        let (tx, rx) = mpsc::channel(1);
        let graph = self.graph.clone();
        let max_runs = self.config.max_runs_per_component;
        let worker = self.config.resolve_worker();

        tokio::spawn(async move {
            let outcome = run_pipeline(graph, max_runs, worker, data, tx.clone()).await;
            match outcome {
                Ok(Some(final_event)) => {
                    let _ = tx.send(Ok(final_event)).await;
                }
                Ok(None) => {
                    // Consumer dropped the stream mid-run; nothing left to send.
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

/// Drives the entire run to completion (or to a fatal error / dropped
/// consumer). Returns `Ok(Some(Final))` on natural or stuck
/// termination, `Ok(None)` if the consumer dropped the stream before
/// that point.
async fn run_pipeline(
    graph: Arc<Graph>,
    max_runs: u32,
    worker: Arc<Worker>,
    data: InputData,
    tx: mpsc::Sender<Result<PipelineEvent>>,
) -> Result<Option<PipelineEvent>> {
    let mut store = InputStore::new();
    data.populate(&graph, &mut store)?;

    let mut visits: HashMap<String, u32> = HashMap::new();
    for name in graph.component_names() {
        store.apply_defaults(&graph, name);
        visits.insert(name.to_string(), 0);
    }

    let mut run_queue: VecDeque<String> =
        graph.topological_order_without_cycles().into_iter().collect();
    let mut waiting_queue: VecDeque<String> = VecDeque::new();
    let mut final_outputs: HashMap<String, ComponentOutput> = HashMap::new();
    let mut prev1: Option<HashSet<String>> = None;
    let mut prev2: Option<HashSet<String>> = None;

    loop {
        if run_queue.is_empty() {
            if waiting_queue.is_empty() {
                break;
            }
            match progress_check(&graph, &store, &waiting_queue, &mut prev1, &mut prev2) {
                ProgressOutcome::Stuck => {
                    warn!(
                        waiting = ?waiting_queue,
                        "pipeline stuck: waiting queue has not changed across two drains and no candidate can become ready"
                    );
                    return Ok(Some(PipelineEvent::Final {
                        outputs: final_outputs,
                        stuck: true,
                    }));
                }
                ProgressOutcome::Selected(idx) => {
                    let name = waiting_queue.remove(idx).expect("index from this queue");
                    store.apply_defaults(&graph, &name);
                    run_queue.push_back(name);
                }
            }
            continue;
        }

        let name = run_queue.pop_front().expect("checked non-empty above");
        let reachable = reachable_set(&run_queue, &waiting_queue);

        if is_lazy_variadic(&graph, &name, &reachable)
            && !run_queue.iter().all(|c| is_lazy_variadic(&graph, c, &reachable))
        {
            debug!(component = %name, "deferring lazy-variadic component");
            waiting_queue.push_back(name);
            continue;
        }

        if !ready(&graph, &store, &name, &reachable) {
            waiting_queue.push_back(name);
            continue;
        }

        if graph.is_in_cycle(&name) {
            let cycle = graph.cycles_containing(&name);
            let mut members = cycle;
            members.push(name.clone());
            debug!(component = %name, cycle = ?members, "entering cycle sub-scheduler");

            // Every member of this cycle is now exclusively owned by the
            // sub-scheduler for this dispatch; the outer queues no longer
            // track them individually.
            run_queue.retain(|c| !members.contains(c));
            waiting_queue.retain(|c| !members.contains(c));

            let subgraph_outputs = run_cycle(
                &graph,
                &mut store,
                &mut visits,
                &members,
                &name,
                max_runs,
                &worker,
                &tx,
            )
            .await?;

            for (producer, outputs) in subgraph_outputs {
                let reachable = reachable_set(&run_queue, &waiting_queue);
                let result = distribute(&graph, &mut store, &producer, &outputs, &reachable)?;
                accumulate_leaf(&mut final_outputs, &producer, result.leaf_outputs);
                requeue(&mut run_queue, &mut waiting_queue, result.newly_runnable);
                dequeue_dead(&mut run_queue, &mut waiting_queue, result.newly_dead);
            }

            run_queue = rebuild_run_queue(&graph, &store, &run_queue, &waiting_queue);
            prev1 = None;
            prev2 = None;
            continue;
        }

        let visit_count = *visits.get(&name).unwrap_or(&0);
        if visit_count >= max_runs {
            return Err(Error::MaxRunsExceeded {
                component: name.clone(),
                max: max_runs,
            });
        }

        let output = invoke(&graph, &worker, &store, &name).await?;
        *visits.entry(name.clone()).or_insert(0) += 1;

        if tx
            .send(Ok(PipelineEvent::Output {
                component: name.clone(),
                outputs: output.clone(),
            }))
            .await
            .is_err()
        {
            return Ok(None);
        }

        consume_inputs(&graph, &mut store, &name);
        waiting_queue.retain(|c| c != &name);

        let reachable = reachable_set(&run_queue, &waiting_queue);
        let result = distribute(&graph, &mut store, &name, &output, &reachable)?;
        accumulate_leaf(&mut final_outputs, &name, result.leaf_outputs);
        requeue(&mut run_queue, &mut waiting_queue, result.newly_runnable);
        dequeue_dead(&mut run_queue, &mut waiting_queue, result.newly_dead);

        prev1 = None;
        prev2 = None;
    }

    Ok(Some(PipelineEvent::Final {
        outputs: final_outputs,
        stuck: false,
    }))
}

/// Invoke a component via its native path: sync components go through
/// the worker pool, async components run inline on this task.
async fn invoke(
    graph: &Graph,
    worker: &Worker,
    store: &InputStore,
    name: &str,
) -> Result<ComponentOutput> {
    let node = graph
        .node(name)
        .expect("component popped from a queue built from this graph");
    let inputs = store.get_inputs(name);
    let result = match &node.component {
        ComponentImpl::Sync(c) => worker.dispatch(c.clone(), inputs).await,
        ComponentImpl::Async(c) => c.run(inputs).await,
    };
    result.map_err(|source| Error::ComponentRuntime {
        component: name.to_string(),
        source,
    })
}

/// Delete every input socket of `name` whose senders set is non-empty
/// (it has just been consumed). User-only sockets are retained.
fn consume_inputs(graph: &Graph, store: &mut InputStore, name: &str) {
    let Some(node) = graph.node(name) else { return };
    for (socket, spec) in &node.input_sockets {
        if spec.senders.is_empty() {
            continue;
        }
        if spec.is_variadic {
            store.reset_variadic(name, socket);
        } else {
            store.delete(name, socket);
        }
    }
}

fn accumulate_leaf(
    final_outputs: &mut HashMap<String, ComponentOutput>,
    name: &str,
    leaf: ComponentOutput,
) {
    if leaf.is_empty() {
        return;
    }
    final_outputs.insert(name.to_string(), leaf);
}

fn requeue(run_queue: &mut VecDeque<String>, waiting_queue: &mut VecDeque<String>, newly_runnable: Vec<String>) {
    for name in newly_runnable {
        waiting_queue.retain(|c| c != &name);
        if !run_queue.contains(&name) {
            run_queue.push_back(name);
        }
    }
}

fn dequeue_dead(run_queue: &mut VecDeque<String>, waiting_queue: &mut VecDeque<String>, dead: Vec<String>) {
    for name in dead {
        run_queue.retain(|c| c != &name);
        waiting_queue.retain(|c| c != &name);
    }
}

fn reachable_set(run_queue: &VecDeque<String>, waiting_queue: &VecDeque<String>) -> HashSet<String> {
    run_queue.iter().chain(waiting_queue.iter()).cloned().collect()
}

/// Deterministic rebuild of the outer run queue after a cycle
/// completes: whatever remained queued before the cycle ran, followed
/// by every waiting component that just became ready, in waiting-queue
/// insertion order.
fn rebuild_run_queue(
    graph: &Graph,
    store: &InputStore,
    run_queue: &VecDeque<String>,
    waiting_queue: &VecDeque<String>,
) -> VecDeque<String> {
    let reachable = reachable_set(run_queue, waiting_queue);
    let mut rebuilt: VecDeque<String> = run_queue.clone();
    for name in waiting_queue {
        if ready(graph, store, name, &reachable) && !rebuilt.contains(name) {
            rebuilt.push_back(name.clone());
        }
    }
    rebuilt
}

enum ProgressOutcome {
    Stuck,
    Selected(usize),
}

/// The progress check run when the run queue has drained but the
/// waiting queue has not. Two consecutive identical waiting-set
/// snapshots, combined with no available candidate, means the run is
/// genuinely stuck.
fn progress_check(
    graph: &Graph,
    store: &InputStore,
    waiting_queue: &VecDeque<String>,
    prev1: &mut Option<HashSet<String>>,
    prev2: &mut Option<HashSet<String>>,
) -> ProgressOutcome {
    // Two consecutive identical waiting-set snapshots mean the last
    // forced candidate (selected below) ran and changed nothing.
    // Repeating the same selection forever would never terminate.
    if let (Some(p1), Some(p2)) = (prev1.as_ref(), prev2.as_ref()) {
        if p1 == p2 {
            return ProgressOutcome::Stuck;
        }
    }

    let current: HashSet<String> = waiting_queue.iter().cloned().collect();
    *prev2 = prev1.take();
    *prev1 = Some(current.clone());

    // No candidate at all (nothing ready, nothing lazy-variadic,
    // nothing fillable by defaults) can never change on its own once
    // the run queue is empty. There is nothing left to wait for.
    match select_candidate(graph, store, waiting_queue, &current) {
        Some(idx) => ProgressOutcome::Selected(idx),
        None => ProgressOutcome::Stuck,
    }
}

/// Candidate selection from the waiting queue: prefer a component that
/// has become runnable, then a lazy-variadic one, then one whose every
/// socket has a default. Ties broken by insertion order (first match
/// wins).
fn select_candidate(
    graph: &Graph,
    store: &InputStore,
    waiting_queue: &VecDeque<String>,
    reachable: &HashSet<String>,
) -> Option<usize> {
    if let Some(idx) = waiting_queue
        .iter()
        .position(|name| ready(graph, store, name, reachable))
    {
        return Some(idx);
    }
    if let Some(idx) = waiting_queue
        .iter()
        .position(|name| is_lazy_variadic(graph, name, reachable))
    {
        return Some(idx);
    }
    waiting_queue.iter().position(|name| {
        graph
            .node(name)
            .map(|n| n.input_sockets.values().all(|s| s.is_optional()))
            .unwrap_or(false)
    })
}

/// The cycle sub-scheduler: runs a restricted main loop over exactly
/// the components in `members`, rotated so that `start` runs first.
/// Returns the outputs routed to receivers outside the cycle, keyed by
/// producer (overwritten on each occurrence, so only the last is
/// surfaced).
#[allow(clippy::too_many_arguments)]
async fn run_cycle(
    graph: &Graph,
    store: &mut InputStore,
    visits: &mut HashMap<String, u32>,
    members: &[String],
    start: &str,
    max_runs: u32,
    worker: &Worker,
    tx: &mpsc::Sender<Result<PipelineEvent>>,
) -> Result<HashMap<String, ComponentOutput>> {
    let member_set: HashSet<String> = members.iter().cloned().collect();
    let mut run_queue: VecDeque<String> = rotate_to(members, start).into_iter().collect();
    let mut waiting_queue: VecDeque<String> = VecDeque::new();
    let mut subgraph_outputs: HashMap<String, ComponentOutput> = HashMap::new();
    let mut prev1: Option<HashSet<String>> = None;
    let mut prev2: Option<HashSet<String>> = None;
    let mut cycle_received_inputs = false;

    while !cycle_received_inputs {
        if run_queue.is_empty() {
            if waiting_queue.is_empty() {
                break;
            }
            match progress_check(graph, store, &waiting_queue, &mut prev1, &mut prev2) {
                ProgressOutcome::Stuck => {
                    warn!(cycle = ?members, "cycle stuck before closing on its own output");
                    break;
                }
                ProgressOutcome::Selected(idx) => {
                    let name = waiting_queue.remove(idx).expect("index from this queue");
                    store.apply_defaults(graph, &name);
                    run_queue.push_back(name);
                }
            }
            continue;
        }

        let name = run_queue.pop_front().expect("checked non-empty above");
        let reachable: HashSet<String> = run_queue
            .iter()
            .chain(waiting_queue.iter())
            .cloned()
            .collect();

        if is_lazy_variadic(graph, &name, &reachable)
            && !run_queue.iter().all(|c| is_lazy_variadic(graph, c, &reachable))
        {
            waiting_queue.push_back(name);
            continue;
        }

        if !ready(graph, store, &name, &reachable) {
            waiting_queue.push_back(name);
            continue;
        }

        let visit_count = *visits.get(&name).unwrap_or(&0);
        if visit_count >= max_runs {
            return Err(Error::MaxRunsExceeded {
                component: name.clone(),
                max: max_runs,
            });
        }

        let output = invoke(graph, worker, store, &name).await?;
        *visits.entry(name.clone()).or_insert(0) += 1;

        if tx
            .send(Ok(PipelineEvent::Output {
                component: name.clone(),
                outputs: output.clone(),
            }))
            .await
            .is_err()
        {
            break;
        }

        // Input-deletion rule inside the cycle: a consumed socket is
        // deleted only if every sender is inside the cycle; sockets
        // with any external sender are retained for later iterations.
        if let Some(node) = graph.node(&name) {
            for (socket, spec) in &node.input_sockets {
                if spec.senders.is_empty() {
                    continue;
                }
                let all_internal = spec.senders.iter().all(|(s, _)| member_set.contains(s));
                if all_internal {
                    if spec.is_variadic {
                        store.reset_variadic(&name, socket);
                    } else {
                        store.delete(&name, socket);
                    }
                }
            }
        }
        waiting_queue.retain(|c| c != &name);

        let mut fed_internal_receiver = false;
        for (output_socket, value) in &output {
            for (receiver, input_socket) in graph.receivers_of(&name, output_socket) {
                if member_set.contains(receiver) {
                    fed_internal_receiver = true;
                    let is_variadic = graph
                        .node(receiver)
                        .and_then(|n| n.input_sockets.get(input_socket))
                        .map(|s| s.is_variadic)
                        .unwrap_or(false);
                    if is_variadic {
                        store.append(receiver, input_socket, value.clone());
                    } else {
                        store.set(receiver, input_socket, value.clone());
                    }
                } else {
                    subgraph_outputs
                        .entry(name.clone())
                        .or_default()
                        .insert(output_socket.clone(), value.clone());
                }
            }
            if graph.receivers_of(&name, output_socket).is_empty() {
                subgraph_outputs
                    .entry(name.clone())
                    .or_default()
                    .insert(output_socket.clone(), value.clone());
            }
        }

        // Readiness is judged against the whole cycle membership, not
        // just the current queues: a self-loop (or any member that just
        // ran and left both queues) must still be reconsidered once its
        // own output feeds it again.
        let newly_runnable: Vec<String> = member_set
            .iter()
            .filter(|m| !run_queue.contains(*m) && ready(graph, store, m, &member_set))
            .cloned()
            .collect();
        requeue(&mut run_queue, &mut waiting_queue, newly_runnable);

        prev1 = None;
        prev2 = None;

        if !fed_internal_receiver {
            cycle_received_inputs = true;
        }
    }

    Ok(subgraph_outputs)
}

fn rotate_to(members: &[String], start: &str) -> Vec<String> {
    let pos = members.iter().position(|m| m == start).unwrap_or(0);
    let mut rotated = Vec::with_capacity(members.len());
    rotated.extend_from_slice(&members[pos..]);
    rotated.extend_from_slice(&members[..pos]);
    rotated
}
