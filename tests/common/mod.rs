//! Shared test fixtures: a closure-backed component and small graph
//! builders used across the scheduling scenario tests.

use std::collections::HashMap;

use flowgraph_core::{
    AsyncComponent, ComponentImpl, ComponentInput, ComponentNode, ComponentOutput, Graph,
    InputSocketSpec, OutputSocketSpec,
};
use serde_json::Value;

/// An `AsyncComponent` backed by a plain closure, used throughout
/// these tests instead of any real component implementation (which is
/// out of this crate's scope).
pub struct FnComponent<F> {
    name: String,
    f: F,
}

impl<F> FnComponent<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        FnComponent {
            name: name.into(),
            f,
        }
    }
}

#[async_trait::async_trait]
impl<F> AsyncComponent for FnComponent<F>
where
    F: Fn(ComponentInput) -> anyhow::Result<ComponentOutput> + Send + Sync,
{
    fn component_type(&self) -> &str {
        &self.name
    }

    async fn run(&self, inputs: ComponentInput) -> anyhow::Result<ComponentOutput> {
        (self.f)(inputs)
    }
}

/// Build a `ComponentNode` with no input sockets, wired by hand later
/// via `wire`.
pub fn node<F>(
    name: &str,
    input_sockets: Vec<(&str, InputSocketSpec)>,
    output_sockets: Vec<&str>,
    f: F,
) -> ComponentNode
where
    F: Fn(ComponentInput) -> anyhow::Result<ComponentOutput> + Send + Sync + 'static,
{
    ComponentNode {
        name: name.to_string(),
        input_sockets: input_sockets
            .into_iter()
            .map(|(s, spec)| (s.to_string(), spec))
            .collect(),
        output_sockets: output_sockets
            .into_iter()
            .map(|s| (s.to_string(), OutputSocketSpec::new()))
            .collect(),
        component: ComponentImpl::Async(Box::new(FnComponent::new(name, f))),
    }
}

/// Wire a sender into a receiver's input socket spec and the sender's
/// output socket's receiver list, so `Graph::new` picks up the edge
/// and `Graph::receivers_of`/`senders_of` both agree.
pub fn wire(
    nodes: &mut HashMap<String, ComponentNode>,
    from: &str,
    from_socket: &str,
    to: &str,
    to_socket: &str,
) {
    nodes
        .get_mut(to)
        .unwrap()
        .input_sockets
        .get_mut(to_socket)
        .unwrap()
        .senders
        .push((from.to_string(), from_socket.to_string()));
    nodes
        .get_mut(from)
        .unwrap()
        .output_sockets
        .get_mut(from_socket)
        .unwrap()
        .receivers
        .push((to.to_string(), to_socket.to_string()));
}

pub fn build_graph(nodes: Vec<ComponentNode>) -> Graph {
    Graph::new(nodes)
}

pub fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn hello_fn(inputs: ComponentInput) -> anyhow::Result<ComponentOutput> {
    let word = inputs
        .get("word")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("missing 'word' input"))?;
    let mut out = HashMap::new();
    out.insert("output".to_string(), text(&format!("Hello, {word}!")));
    Ok(out)
}
