//! Graph Model: the static, read-only topology a [`crate::scheduler::Scheduler`]
//! runs over.
//!
//! Backed by `petgraph::graph::DiGraph` with edges carrying the socket
//! pairing they represent, rather than node-owned `Rc<RefCell<_>>` links.
//! Walking "who feeds socket X" or "what cycles is this component on" are
//! graph queries, not pointer chases.

use std::collections::HashMap;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::component::{ComponentImpl, InputSocketSpec, OutputSocketSpec};
use crate::error::{Error, Result};

/// One edge of the graph: a wire from one component's output socket to
/// another's input socket.
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub from_socket: String,
    pub to_socket: String,
}

/// A node's full metadata: its sockets and its component implementation.
/// Immutable for the lifetime of the graph. The Scheduler never writes
/// through this type, only reads it; visit counters live in the
/// Scheduler's own run state instead.
pub struct ComponentNode {
    pub name: String,
    pub input_sockets: HashMap<String, InputSocketSpec>,
    pub output_sockets: HashMap<String, OutputSocketSpec>,
    pub component: ComponentImpl,
}

impl std::fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentNode")
            .field("name", &self.name)
            .field("input_sockets", &self.input_sockets.keys().collect::<Vec<_>>())
            .field("output_sockets", &self.output_sockets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The component graph: topology plus per-node socket metadata.
pub struct Graph {
    graph: DiGraph<String, EdgeSpec>,
    indices: HashMap<String, NodeIndex>,
    nodes: HashMap<String, ComponentNode>,
}

impl Graph {
    /// Build a graph from its nodes. Edges are derived from each node's
    /// declared `senders`/`receivers` (both sides of a wire must agree;
    /// callers that build the graph through a single builder API get
    /// this for free, so no explicit edge-building API is exposed here).
    pub fn new(nodes: Vec<ComponentNode>) -> Self {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();
        for node in &nodes {
            let idx = graph.add_node(node.name.clone());
            indices.insert(node.name.clone(), idx);
        }
        let mut by_name: HashMap<String, ComponentNode> = HashMap::new();
        for node in nodes {
            by_name.insert(node.name.clone(), node);
        }
        for node in by_name.values() {
            for (input_socket, spec) in &node.input_sockets {
                for (sender, sender_socket) in &spec.senders {
                    if let (Some(&from), Some(&to)) = (indices.get(sender), indices.get(&node.name)) {
                        graph.add_edge(
                            from,
                            to,
                            EdgeSpec {
                                from_socket: sender_socket.clone(),
                                to_socket: input_socket.clone(),
                            },
                        );
                    }
                }
            }
        }
        Graph {
            graph,
            indices,
            nodes: by_name,
        }
    }

    /// Look up a component node by name.
    pub fn node(&self, name: &str) -> Option<&ComponentNode> {
        self.nodes.get(name)
    }

    /// All component names in the graph, in no particular order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.indices.get(name).copied()
    }

    /// The components feeding `name`'s given input socket.
    pub fn senders_of(&self, name: &str, input_socket: &str) -> &[(String, String)] {
        self.nodes
            .get(name)
            .and_then(|n| n.input_sockets.get(input_socket))
            .map(|s| s.senders.as_slice())
            .unwrap_or(&[])
    }

    /// The components consuming `name`'s given output socket.
    pub fn receivers_of(&self, name: &str, output_socket: &str) -> &[(String, String)] {
        self.nodes
            .get(name)
            .and_then(|n| n.output_sockets.get(output_socket))
            .map(|s| s.receivers.as_slice())
            .unwrap_or(&[])
    }

    /// Strongly-connected components with more than one node, or a
    /// single node with a self-loop. These are the actual cycles in the
    /// graph.
    fn sccs_with_cycles(&self) -> Vec<Vec<NodeIndex>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || (scc.len() == 1
                        && self.graph.find_edge(scc[0], scc[0]).is_some())
            })
            .collect()
    }

    /// The set of component names participating in a cycle with `name`,
    /// not including `name` itself. Empty if `name` is acyclic.
    pub fn cycles_containing(&self, name: &str) -> Vec<String> {
        let Some(idx) = self.index_of(name) else {
            return Vec::new();
        };
        for scc in self.sccs_with_cycles() {
            if scc.contains(&idx) {
                return scc
                    .into_iter()
                    .filter(|&i| i != idx)
                    .map(|i| self.graph[i].clone())
                    .collect();
            }
        }
        Vec::new()
    }

    /// True if `name` participates in any cycle.
    pub fn is_in_cycle(&self, name: &str) -> bool {
        !self.cycles_containing(name).is_empty()
    }

    /// A topological order of the graph with every feedback edge of
    /// every cycle removed first. This is the outer view the plain
    /// scheduling loop walks, deferring to the cycle sub-scheduler
    /// whenever it lands on a component that is part of a cycle.
    pub fn topological_order_without_cycles(&self) -> Vec<String> {
        let mut acyclic = self.graph.clone();
        for scc in self.sccs_with_cycles() {
            let scc_set: std::collections::HashSet<_> = scc.iter().copied().collect();
            let feedback_edges: Vec<_> = acyclic
                .edge_indices()
                .filter(|&e| {
                    let (a, b) = acyclic.edge_endpoints(e).unwrap();
                    scc_set.contains(&a) && scc_set.contains(&b)
                })
                .collect();
            for e in feedback_edges {
                acyclic.remove_edge(e);
            }
        }
        toposort(&acyclic, None)
            .expect("cycle feedback edges removed above; toposort cannot fail")
            .into_iter()
            .map(|i| self.graph[i].clone())
            .collect()
    }

    /// Validate that every cycle in the graph is breakable: at least
    /// one edge on the cycle must feed a socket that has a default
    /// value, or is variadic (so the cycle can start with that socket
    /// unfilled and still make progress). Called once before a run;
    /// failure is `Error::InvalidGraph`, never a runtime condition.
    pub fn validate_cycles_breakable(&self) -> Result<()> {
        for scc in self.sccs_with_cycles() {
            let scc_set: std::collections::HashSet<_> = scc.iter().copied().collect();
            let breakable = scc.iter().any(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Outgoing)
                    .filter(|e| scc_set.contains(&e.target()))
                    .any(|e| {
                        let target_name = &self.graph[e.target()];
                        let edge = e.weight();
                        self.nodes
                            .get(target_name)
                            .and_then(|n| n.input_sockets.get(&edge.to_socket))
                            .map(|spec| spec.is_optional())
                            .unwrap_or(false)
                    })
            });
            if !breakable {
                let names: Vec<_> = scc.iter().map(|&i| self.graph[i].clone()).collect();
                return Err(Error::invalid_graph(format!(
                    "cycle {:?} has no edge feeding a socket with a default or variadic socket; cannot be broken",
                    names
                )));
            }
        }
        Ok(())
    }
}
