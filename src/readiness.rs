//! The Readiness Oracle: pure predicates over the Graph Model and
//! Input Store. Never mutates either. The Scheduler is the only
//! module allowed to act on what these functions report.

use std::collections::HashSet;

use crate::graph::Graph;
use crate::input_store::InputStore;

/// True if every sender feeding `(component, socket)` has left the
/// reachable set, meaning none of them can ever produce a value for it
/// again. A socket with no senders at all (user/default only) is never
/// considered closed off this way.
fn senders_closed(graph: &Graph, component: &str, socket: &str, reachable: &HashSet<String>) -> bool {
    let senders = graph.senders_of(component, socket);
    !senders.is_empty() && senders.iter().all(|(sender, _)| !reachable.contains(sender))
}

/// `ready(name)`: true iff every input socket has a value, or is
/// variadic and its senders can no longer contribute further elements
/// (all closed off per [`senders_closed`]). At that point its current,
/// possibly-empty accumulator is final.
///
/// `reachable` is the set of component names the Scheduler still
/// considers possibly-runnable (present in the run queue or waiting
/// queue). Variadic completeness is judged against this set rather
/// than a fixed "has run" flag, so a sender that can never run again
/// counts as done even if it hasn't literally executed yet.
pub fn ready(graph: &Graph, store: &InputStore, component: &str, reachable: &HashSet<String>) -> bool {
    let Some(node) = graph.node(component) else {
        return false;
    };
    node.input_sockets.iter().all(|(socket, spec)| {
        if store.has_value(component, socket) {
            return true;
        }
        spec.is_variadic && senders_closed(graph, component, socket, reachable)
    })
}

/// `is_lazy_variadic(name)`: true if the component has at least one
/// variadic input socket whose senders might still fire. Such a
/// component is deferred while any non-lazy-variadic component remains
/// runnable, to guarantee fan-in completeness.
pub fn is_lazy_variadic(graph: &Graph, component: &str, reachable: &HashSet<String>) -> bool {
    let Some(node) = graph.node(component) else {
        return false;
    };
    node.input_sockets
        .iter()
        .any(|(socket, spec)| spec.is_variadic && !senders_closed(graph, component, socket, reachable))
}

/// True if a component can never run again: some mandatory
/// (non-optional) socket has no value and every sender feeding it has
/// left the reachable set, so it will never be filled.
pub fn is_dead(graph: &Graph, store: &InputStore, component: &str, reachable: &HashSet<String>) -> bool {
    let Some(node) = graph.node(component) else {
        return true;
    };
    node.input_sockets.iter().any(|(socket, spec)| {
        !spec.is_optional()
            && !store.has_value(component, socket)
            && senders_closed(graph, component, socket, reachable)
    })
}
