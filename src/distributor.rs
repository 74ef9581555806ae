//! The Distributor: pushes a component's produced outputs into
//! downstream input sockets and reports who became newly runnable or
//! newly dead as a result.

use std::collections::{HashMap, HashSet};

use crate::component::ComponentOutput;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::input_store::InputStore;
use crate::readiness::{is_dead, ready};

/// Outcome of distributing one component's output.
pub struct DistributeResult {
    /// The subset of `res` whose output sockets have no receivers.
    /// This step's leaf outputs for the producer.
    pub leaf_outputs: ComponentOutput,
    /// Downstream components that just became runnable (ready) and
    /// should move from the waiting queue to the run queue.
    pub newly_runnable: Vec<String>,
    /// Downstream components that just became permanently unreachable
    /// and should be removed from both queues.
    pub newly_dead: Vec<String>,
}

/// Distribute `producer`'s output map to every socket it feeds.
/// `reachable` is the Scheduler's current "still might run" set, used
/// to decide readiness/deadness of receivers after this write.
pub fn distribute(
    graph: &Graph,
    store: &mut InputStore,
    producer: &str,
    res: &ComponentOutput,
    reachable: &HashSet<String>,
) -> Result<DistributeResult> {
    let node = graph.node(producer).ok_or_else(|| {
        Error::ComponentContractViolation {
            component: producer.to_string(),
            reason: "producer not found in graph".to_string(),
        }
    })?;

    for output_socket in res.keys() {
        if !node.output_sockets.contains_key(output_socket) {
            return Err(Error::ComponentContractViolation {
                component: producer.to_string(),
                reason: format!("output references undeclared socket '{output_socket}'"),
            });
        }
    }

    let mut leaf_outputs = HashMap::new();
    let mut touched_order = Vec::new();
    let mut touched_seen = HashSet::new();

    for (output_socket, value) in res {
        let receivers = graph.receivers_of(producer, output_socket);
        if receivers.is_empty() {
            leaf_outputs.insert(output_socket.clone(), value.clone());
            continue;
        }
        for (receiver, input_socket) in receivers {
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
            if touched_seen.insert(receiver.clone()) {
                touched_order.push(receiver.clone());
            }
        }
    }

    let mut newly_runnable = Vec::new();
    let mut newly_dead = Vec::new();
    for receiver in touched_order {
        if ready(graph, store, &receiver, reachable) {
            newly_runnable.push(receiver.clone());
        } else if is_dead(graph, store, &receiver, reachable) {
            newly_dead.push(receiver);
        }
    }

    Ok(DistributeResult {
        leaf_outputs,
        newly_runnable,
        newly_dead,
    })
}
