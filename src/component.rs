//! The `Component` trait family.
//!
//! Components never see the graph, the run queue, or the Input Store.
//! They receive a flat map of socket name to value and return a flat
//! map of output socket name to value. Whether the scheduler can invoke
//! a component inline or must offload it to the [`crate::worker::Worker`]
//! is decided once, up front, by which trait it implements, not by any
//! runtime introspection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::SocketValue;

/// Output of a single component invocation: socket name to value.
pub type ComponentOutput = HashMap<String, SocketValue>;
/// Input to a single component invocation: socket name to value.
pub type ComponentInput = HashMap<String, SocketValue>;

/// A component whose work is synchronous, non-suspending CPU/IO and
/// must be dispatched onto the [`crate::worker::Worker`] so it never
/// blocks the scheduler's executor thread.
pub trait SyncComponent: Send + Sync {
    /// Name used in diagnostics and error messages. Not necessarily the
    /// same as the component's name in the graph (that's owned by
    /// [`crate::graph::Graph`]), but should usually agree with it.
    fn component_type(&self) -> &str;

    /// Run once with the given inputs, producing one set of named
    /// outputs. Errors are wrapped by the caller into
    /// [`crate::error::Error::ComponentRuntime`].
    fn run(&self, inputs: ComponentInput) -> std::result::Result<ComponentOutput, anyhow::Error>;
}

/// A component whose work is naturally asynchronous (I/O-bound,
/// cooperates with the scheduler's own executor) and can run inline on
/// the scheduler's task.
#[async_trait::async_trait]
pub trait AsyncComponent: Send + Sync {
    /// See [`SyncComponent::component_type`].
    fn component_type(&self) -> &str;

    /// Run once with the given inputs, producing one set of named
    /// outputs.
    async fn run(
        &self,
        inputs: ComponentInput,
    ) -> std::result::Result<ComponentOutput, anyhow::Error>;
}

/// Which invocation path a graph node uses. Decided once at graph
/// construction time; the scheduler never probes a component to find
/// out, it just matches on this enum.
pub enum ComponentImpl {
    /// Dispatched onto the worker pool; `run` must not suspend. Held as
    /// an `Arc` (rather than `Box`) so a dispatch can clone a cheap
    /// handle into the `'static` closure the worker pool requires,
    /// instead of reaching for unsafe pointer tricks.
    Sync(Arc<dyn SyncComponent>),
    /// Invoked inline on the scheduler's own async task.
    Async(Box<dyn AsyncComponent>),
}

impl ComponentImpl {
    /// The component's declared type name, regardless of dispatch path.
    pub fn component_type(&self) -> &str {
        match self {
            ComponentImpl::Sync(c) => c.component_type(),
            ComponentImpl::Async(c) => c.component_type(),
        }
    }
}

impl fmt::Debug for ComponentImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ComponentImpl::Sync(_) => "Sync",
            ComponentImpl::Async(_) => "Async",
        };
        f.debug_struct("ComponentImpl")
            .field("kind", &kind)
            .field("component_type", &self.component_type())
            .finish()
    }
}

/// Declaration of one input socket, as recorded on [`crate::graph::ComponentNode`].
#[derive(Debug, Clone)]
pub struct InputSocketSpec {
    /// Value used when nothing is ever written to this socket in a run.
    pub default: Option<SocketValue>,
    /// Whether this socket accumulates one value per sender rather than
    /// holding a single overwritten value.
    pub is_variadic: bool,
    /// Producers wired to this socket: `(component, output_socket)`.
    pub senders: Vec<(String, String)>,
}

impl InputSocketSpec {
    /// A mandatory, non-variadic socket with no senders yet (graph
    /// construction wires `senders` in afterward).
    pub fn mandatory() -> Self {
        InputSocketSpec {
            default: None,
            is_variadic: false,
            senders: Vec::new(),
        }
    }

    /// A socket with a default value, making it optional.
    pub fn with_default(default: SocketValue) -> Self {
        InputSocketSpec {
            default: Some(default),
            is_variadic: false,
            senders: Vec::new(),
        }
    }

    /// A variadic (fan-in accumulating) socket.
    pub fn variadic() -> Self {
        InputSocketSpec {
            default: None,
            is_variadic: true,
            senders: Vec::new(),
        }
    }

    /// A variadic socket with a declared default. `apply_defaults` wraps
    /// the default in a single-element sequence when nothing has been
    /// appended to it yet.
    pub fn variadic_with_default(default: SocketValue) -> Self {
        InputSocketSpec {
            default: Some(default),
            is_variadic: true,
            senders: Vec::new(),
        }
    }

    /// True if this socket can never be missing a value at run time:
    /// either it has a default, or it is variadic (an empty variadic
    /// input is valid).
    pub fn is_optional(&self) -> bool {
        self.default.is_some() || self.is_variadic
    }
}

/// Declaration of one output socket.
#[derive(Debug, Clone, Default)]
pub struct OutputSocketSpec {
    /// Consumers wired to this socket: `(component, input_socket)`.
    pub receivers: Vec<(String, String)>,
}

impl OutputSocketSpec {
    /// An output socket with no consumers wired yet.
    pub fn new() -> Self {
        OutputSocketSpec::default()
    }

    /// True if nothing downstream consumes this output. Its values
    /// become part of `final_outputs` (a "leaf" output).
    pub fn is_leaf(&self) -> bool {
        self.receivers.is_empty()
    }
}
