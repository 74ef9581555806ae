//! Parsing and validation of the `data` argument to
//! [`crate::scheduler::Scheduler::run`].

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::input_store::InputStore;
use crate::value::SocketValue;

/// The shape `data` may take: canonical (per-component maps) or
/// shorthand (flat, broadcast by socket name).
pub enum InputData {
    /// `{component-name -> {socket-name -> value}}`.
    Canonical(HashMap<String, HashMap<String, SocketValue>>),
    /// `{socket-name -> value}`, broadcast to every component declaring
    /// a matching input socket name.
    Shorthand(HashMap<String, SocketValue>),
}

impl InputData {
    /// Expand shorthand into canonical form against `graph`, validate,
    /// and write the result into `store`. Pre-run validation fails with
    /// `InvalidInput` if: an unknown component name appears, an unknown
    /// socket is targeted, or a mandatory socket goes unprovided.
    pub fn populate(self, graph: &Graph, store: &mut InputStore) -> Result<()> {
        let canonical = match self {
            InputData::Canonical(map) => {
                for component in map.keys() {
                    if graph.node(component).is_none() {
                        return Err(Error::invalid_input(format!(
                            "unknown component '{component}'"
                        )));
                    }
                }
                map
            }
            InputData::Shorthand(flat) => expand_shorthand(graph, flat),
        };

        for (component, sockets) in &canonical {
            let Some(node) = graph.node(component) else {
                return Err(Error::invalid_input(format!("unknown component '{component}'")));
            };
            for socket in sockets.keys() {
                if !node.input_sockets.contains_key(socket) {
                    return Err(Error::invalid_input(format!(
                        "unknown socket '{socket}' on component '{component}'"
                    )));
                }
            }
        }

        for (component, sockets) in canonical {
            let node = graph.node(&component).expect("validated above");
            for (socket, value) in sockets {
                let is_variadic = node
                    .input_sockets
                    .get(&socket)
                    .map(|s| s.is_variadic)
                    .unwrap_or(false);
                if is_variadic {
                    store.append(&component, &socket, value);
                } else {
                    store.set(&component, &socket, value);
                }
            }
        }

        validate_mandatory_inputs(graph, store)
    }
}

/// Broadcast each `(socket, value)` pair in `flat` to every component
/// declaring an input socket of that name.
fn expand_shorthand(
    graph: &Graph,
    flat: HashMap<String, SocketValue>,
) -> HashMap<String, HashMap<String, SocketValue>> {
    let mut canonical: HashMap<String, HashMap<String, SocketValue>> = HashMap::new();
    for (socket, value) in flat {
        for component in graph.component_names() {
            let Some(node) = graph.node(component) else {
                continue;
            };
            if node.input_sockets.contains_key(&socket) {
                canonical
                    .entry(component.to_string())
                    .or_default()
                    .insert(socket.clone(), value.clone());
            }
        }
    }
    canonical
}

/// A mandatory socket (no default, no sender) that never received a
/// user value is an `InvalidInput` error, raised before the run begins.
fn validate_mandatory_inputs(graph: &Graph, store: &InputStore) -> Result<()> {
    for component in graph.component_names() {
        let node = graph.node(component).expect("from component_names");
        for (socket, spec) in &node.input_sockets {
            let has_sender = !spec.senders.is_empty();
            if spec.is_optional() || has_sender {
                continue;
            }
            if !store.has_value(component, socket) {
                return Err(Error::invalid_input(format!(
                    "mandatory socket '{socket}' on component '{component}' was not provided"
                )));
            }
        }
    }
    Ok(())
}
