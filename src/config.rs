//! Engine configuration.
//!
//! `EngineConfig` is `serde`-deserializable and can be loaded straight
//! from a TOML document.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::worker::Worker;

/// Default visit budget per component.
pub const DEFAULT_MAX_RUNS_PER_COMPONENT: u32 = 100;

/// Configuration for a [`crate::scheduler::Scheduler`] instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Visit budget per component before `MaxRunsExceeded` is raised.
    #[serde(default = "default_max_runs")]
    pub max_runs_per_component: u32,

    /// Arbitrary metadata carried through for telemetry; not
    /// interpreted by the scheduler itself.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,

    /// Worker executor used to dispatch non-suspending components. Not
    /// serializable: always `None` when loaded from a config file.
    /// Callers wire one in programmatically, or the scheduler builds a
    /// default one sized 1.
    #[serde(skip)]
    pub worker: Option<Arc<Worker>>,
}

fn default_max_runs() -> u32 {
    DEFAULT_MAX_RUNS_PER_COMPONENT
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_runs_per_component: DEFAULT_MAX_RUNS_PER_COMPONENT,
            metadata: HashMap::new(),
            worker: None,
        }
    }
}

impl EngineConfig {
    /// Parse an `EngineConfig` from a TOML document.
    pub fn from_toml(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::invalid_input(format!("invalid config TOML: {e}")))
    }

    /// The worker this config resolves to: the injected one, or a
    /// freshly built default sized 1.
    pub fn resolve_worker(&self) -> Arc<Worker> {
        self.worker.clone().unwrap_or_else(|| Arc::new(Worker::new()))
    }
}
