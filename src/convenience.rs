//! The convenience driver: an out-of-band helper that consumes the
//! full event stream and folds it into a single map.
//!
//! Layered on top of [`crate::scheduler::Scheduler`] rather than
//! folded into it, so callers that want the raw stream still can.

use std::collections::{HashMap, HashSet};

use tokio_stream::StreamExt;

use crate::component::ComponentOutput;
use crate::error::Result;
use crate::scheduler::PipelineEvent;

/// Drain `stream` to completion and return a single map: `final_outputs`
/// augmented, for each name in `include_outputs_from`, with the last
/// intermediate output observed for that component. Where a name
/// already has a leaf output, missing keys are merged in without
/// overwriting existing ones.
pub async fn run_to_completion<S>(
    mut stream: S,
    include_outputs_from: &HashSet<String>,
) -> Result<HashMap<String, ComponentOutput>>
where
    S: futures::Stream<Item = Result<PipelineEvent>> + Unpin,
{
    let mut last_seen: HashMap<String, ComponentOutput> = HashMap::new();
    let mut final_outputs: HashMap<String, ComponentOutput> = HashMap::new();

    while let Some(event) = stream.next().await {
        match event? {
            PipelineEvent::Output { component, outputs } => {
                if include_outputs_from.contains(&component) {
                    last_seen.insert(component, outputs);
                }
            }
            PipelineEvent::Final { outputs, .. } => {
                final_outputs = outputs;
            }
        }
    }

    for (component, outputs) in last_seen {
        let entry = final_outputs.entry(component).or_default();
        for (socket, value) in outputs {
            entry.entry(socket).or_insert(value);
        }
    }

    Ok(final_outputs)
}
