//! Async component-graph orchestration core.
//!
//! A [`scheduler::Scheduler`] walks a [`graph::Graph`] of typed-socket
//! components, resolving fan-in/fan-out, defaults, variadic inputs,
//! and bounded cycles, and streams each component's output to the
//! caller as soon as it is produced. Graph construction, component
//! implementations, and telemetry backends are out of scope. This
//! crate assumes a validated, ready-to-run graph and focuses entirely
//! on the runtime scheduler.

pub mod component;
pub mod config;
pub mod convenience;
pub mod distributor;
pub mod error;
pub mod graph;
pub mod input_data;
pub mod input_store;
pub mod readiness;
pub mod scheduler;
pub mod value;
pub mod worker;

pub use component::{
    AsyncComponent, ComponentImpl, ComponentInput, ComponentOutput, InputSocketSpec,
    OutputSocketSpec, SyncComponent,
};
pub use config::EngineConfig;
pub use convenience::run_to_completion;
pub use error::{Error, Result};
pub use graph::{ComponentNode, EdgeSpec, Graph};
pub use input_data::InputData;
pub use scheduler::{PipelineEvent, Scheduler};
pub use value::{SocketValue, StoredValue};
pub use worker::Worker;
