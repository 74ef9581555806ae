//! The Input Store: accumulated input values for every component in
//! the current run, keyed by `(component, socket)`.
//!
//! Holds a flat value per non-variadic socket and an accumulating
//! sequence per variadic socket, plus the default-filling rules both
//! kinds of socket need.

use std::collections::HashMap;

use crate::graph::Graph;
use crate::value::{SocketValue, StoredValue};

/// Run-scoped store of every value written to a component's input
/// sockets so far. Created fresh at the start of a run and dropped at
/// the end.
#[derive(Debug, Default)]
pub struct InputStore {
    values: HashMap<(String, String), StoredValue>,
}

impl InputStore {
    pub fn new() -> Self {
        InputStore::default()
    }

    /// Overwrite a non-variadic socket's value.
    pub fn set(&mut self, component: &str, socket: &str, value: SocketValue) {
        self.values.insert(
            (component.to_string(), socket.to_string()),
            StoredValue::Single(value),
        );
    }

    /// Append one value to a variadic socket's accumulator, creating it
    /// if this is the first value received this run.
    pub fn append(&mut self, component: &str, socket: &str, value: SocketValue) {
        let key = (component.to_string(), socket.to_string());
        match self.values.get_mut(&key) {
            Some(stored) => stored.push(value),
            None => {
                self.values.insert(key, StoredValue::Variadic(vec![value]));
            }
        }
    }

    /// Remove a socket's stored value entirely. Used by the Distributor
    /// after a value has been consumed by a run, keeping only
    /// user-sourced or cycle-internal-only-sender inputs that must
    /// survive until regenerated.
    pub fn delete(&mut self, component: &str, socket: &str) {
        self.values.remove(&(component.to_string(), socket.to_string()));
    }

    /// Current stored value for a socket, if any.
    pub fn get(&self, component: &str, socket: &str) -> Option<&StoredValue> {
        self.values.get(&(component.to_string(), socket.to_string()))
    }

    /// True if the given socket currently has any stored value (a
    /// non-empty variadic counts; an absent entry does not).
    pub fn has_value(&self, component: &str, socket: &str) -> bool {
        match self.get(component, socket) {
            Some(v) => !v.is_empty(),
            None => false,
        }
    }

    /// Collect every stored input for a component into the flat map a
    /// [`crate::component::ComponentImpl`] expects, without removing
    /// anything. Consumption is a separate decision the Scheduler
    /// makes afterward based on each socket's `senders`: sockets with a
    /// sender are deleted post-run, user-only sockets are retained.
    pub fn get_inputs(&self, component: &str) -> HashMap<String, SocketValue> {
        self.values
            .iter()
            .filter(|((c, _), _)| c == component)
            .map(|((_, s), v)| (s.clone(), v.clone().into_socket_value()))
            .collect()
    }

    /// Reset a variadic socket's accumulator to an empty sequence.
    /// Used instead of [`InputStore::delete`] for variadic sockets
    /// whose senders have just run, so the socket stays present as an
    /// empty sequence rather than disappearing entirely.
    pub fn reset_variadic(&mut self, component: &str, socket: &str) {
        self.values.insert(
            (component.to_string(), socket.to_string()),
            StoredValue::Variadic(Vec::new()),
        );
    }

    /// Fill in default values for every input socket of `component`
    /// that has no stored value yet. A variadic socket's default is
    /// wrapped in a single-element sequence. A variadic socket that
    /// already holds at least one user-appended element is left
    /// untouched, so a default never coexists with user input.
    pub fn apply_defaults(&mut self, graph: &Graph, component: &str) {
        let Some(node) = graph.node(component) else {
            return;
        };
        for (socket, spec) in &node.input_sockets {
            let Some(default) = &spec.default else {
                continue;
            };
            if self.has_value(component, socket) {
                continue;
            }
            if spec.is_variadic {
                self.values.insert(
                    (component.to_string(), socket.to_string()),
                    StoredValue::Variadic(vec![default.clone()]),
                );
            } else {
                self.set(component, socket, default.clone());
            }
        }
    }
}
