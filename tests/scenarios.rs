//! End-to-end scheduling scenarios: linear chains, fan-out, variadic
//! joins, cycles, stuck detection, and the visit budget.

mod common;

use std::collections::HashMap;

use flowgraph_core::component::InputSocketSpec;
use flowgraph_core::{EngineConfig, InputData, PipelineEvent, Scheduler};
use serde_json::json;
use tokio_stream::StreamExt;

use common::{build_graph, hello_fn, node, text, wire};

async fn collect_events(
    scheduler: &Scheduler,
    data: InputData,
) -> Vec<flowgraph_core::Result<PipelineEvent>> {
    let stream = scheduler.run(data);
    tokio::pin!(stream);
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn linear_chain() {
    let mut nodes = HashMap::new();
    nodes.insert(
        "hello".to_string(),
        node("hello", vec![("word", InputSocketSpec::mandatory())], vec!["output"], hello_fn),
    );
    nodes.insert(
        "hello2".to_string(),
        node("hello2", vec![("word", InputSocketSpec::mandatory())], vec!["output"], hello_fn),
    );
    wire(&mut nodes, "hello", "output", "hello2", "word");

    let graph = build_graph(nodes.into_values().collect());
    let scheduler = Scheduler::new(graph, EngineConfig::default()).unwrap();

    let mut data = HashMap::new();
    data.insert("hello".to_string(), HashMap::from([("word".to_string(), text("world"))]));
    let events = collect_events(&scheduler, InputData::Canonical(data)).await;

    assert_eq!(events.len(), 3);
    match events[0].as_ref().unwrap() {
        PipelineEvent::Output { component, outputs } => {
            assert_eq!(component, "hello");
            assert_eq!(outputs["output"], text("Hello, world!"));
        }
        _ => panic!("expected Output"),
    }
    match events[1].as_ref().unwrap() {
        PipelineEvent::Output { component, outputs } => {
            assert_eq!(component, "hello2");
            assert_eq!(outputs["output"], text("Hello, Hello, world!"));
        }
        _ => panic!("expected Output"),
    }
    match events[2].as_ref().unwrap() {
        PipelineEvent::Final { outputs, stuck } => {
            assert!(!stuck);
            assert_eq!(outputs["hello2"]["output"], text("Hello, Hello, world!"));
        }
        _ => panic!("expected Final"),
    }
}

#[tokio::test]
async fn fan_out_leaf() {
    let mut nodes = HashMap::new();
    nodes.insert(
        "a".to_string(),
        node("a", vec![("x", InputSocketSpec::mandatory())], vec!["out"], |inputs| {
            let mut out = HashMap::new();
            out.insert("out".to_string(), inputs["x"].clone());
            Ok(out)
        }),
    );
    nodes.insert(
        "b".to_string(),
        node("b", vec![("in", InputSocketSpec::mandatory())], vec!["res"], |inputs| {
            let mut out = HashMap::new();
            out.insert("res".to_string(), json!(format!("b:{}", inputs["in"])));
            Ok(out)
        }),
    );
    nodes.insert(
        "c".to_string(),
        node("c", vec![("in", InputSocketSpec::mandatory())], vec!["res"], |inputs| {
            let mut out = HashMap::new();
            out.insert("res".to_string(), json!(format!("c:{}", inputs["in"])));
            Ok(out)
        }),
    );
    wire(&mut nodes, "a", "out", "b", "in");
    wire(&mut nodes, "a", "out", "c", "in");

    let graph = build_graph(nodes.into_values().collect());
    let scheduler = Scheduler::new(graph, EngineConfig::default()).unwrap();

    let mut data = HashMap::new();
    data.insert("a".to_string(), HashMap::from([("x".to_string(), json!(1))]));
    let events = collect_events(&scheduler, InputData::Canonical(data)).await;

    let PipelineEvent::Final { outputs, stuck } = events.last().unwrap().as_ref().unwrap() else {
        panic!("expected Final last");
    };
    assert!(!stuck);
    assert!(outputs.contains_key("b"));
    assert!(outputs.contains_key("c"));
}

#[tokio::test]
async fn variadic_join() {
    let mut nodes = HashMap::new();
    nodes.insert("a".to_string(), node("a", vec![], vec!["out"], |_| {
        let mut out = HashMap::new();
        out.insert("out".to_string(), json!("from-a"));
        Ok(out)
    }));
    nodes.insert("b".to_string(), node("b", vec![], vec!["out"], |_| {
        let mut out = HashMap::new();
        out.insert("out".to_string(), json!("from-b"));
        Ok(out)
    }));
    nodes.insert(
        "j".to_string(),
        node("j", vec![("in", InputSocketSpec::variadic())], vec!["count"], |inputs| {
            let len = inputs["in"].as_array().map(|a| a.len()).unwrap_or(0);
            let mut out = HashMap::new();
            out.insert("count".to_string(), json!(len));
            Ok(out)
        }),
    );
    wire(&mut nodes, "a", "out", "j", "in");
    wire(&mut nodes, "b", "out", "j", "in");

    let graph = build_graph(nodes.into_values().collect());
    let scheduler = Scheduler::new(graph, EngineConfig::default()).unwrap();

    let events = collect_events(&scheduler, InputData::Canonical(HashMap::new())).await;

    let j_runs = events
        .iter()
        .filter(|e| matches!(e.as_ref().unwrap(), PipelineEvent::Output { component, .. } if component == "j"))
        .count();
    assert_eq!(j_runs, 1, "j must run exactly once after both a and b have produced");

    let PipelineEvent::Final { outputs, .. } = events.last().unwrap().as_ref().unwrap() else {
        panic!("expected Final last");
    };
    assert_eq!(outputs["j"]["count"], json!(2));
}

#[tokio::test]
async fn simple_cycle_closes_and_feeds_external_leaf() {
    let mut nodes = HashMap::new();
    nodes.insert(
        "a".to_string(),
        node(
            "a",
            vec![("val", InputSocketSpec::with_default(json!(0)))],
            vec!["out"],
            |inputs| {
                let mut out = HashMap::new();
                out.insert("out".to_string(), json!(inputs["val"].as_i64().unwrap()));
                Ok(out)
            },
        ),
    );
    nodes.insert(
        "b".to_string(),
        node(
            "b",
            vec![("in", InputSocketSpec::mandatory())],
            vec!["back", "done"],
            |inputs| {
                let n = inputs["in"].as_i64().unwrap();
                let mut out = HashMap::new();
                if n < 1 {
                    out.insert("back".to_string(), json!(n + 1));
                } else {
                    out.insert("done".to_string(), json!("finished"));
                }
                Ok(out)
            },
        ),
    );
    nodes.insert(
        "c".to_string(),
        node("c", vec![("in", InputSocketSpec::mandatory())], vec!["res"], |inputs| {
            let mut out = HashMap::new();
            out.insert("res".to_string(), json!(format!("c:{}", inputs["in"])));
            Ok(out)
        }),
    );
    wire(&mut nodes, "a", "out", "b", "in");
    wire(&mut nodes, "b", "back", "a", "val");
    wire(&mut nodes, "b", "done", "c", "in");

    let graph = build_graph(nodes.into_values().collect());
    let scheduler = Scheduler::new(graph, EngineConfig::default()).unwrap();

    let events = collect_events(&scheduler, InputData::Canonical(HashMap::new())).await;

    let a_runs = events
        .iter()
        .filter(|e| matches!(e.as_ref().unwrap(), PipelineEvent::Output { component, .. } if component == "a"))
        .count();
    let b_runs = events
        .iter()
        .filter(|e| matches!(e.as_ref().unwrap(), PipelineEvent::Output { component, .. } if component == "b"))
        .count();
    assert_eq!(a_runs, 2, "a runs once per cycle iteration, two iterations");
    assert_eq!(b_runs, 2, "b runs once per cycle iteration, two iterations");

    let c_ran = events
        .iter()
        .any(|e| matches!(e.as_ref().unwrap(), PipelineEvent::Output { component, .. } if component == "c"));
    assert!(c_ran, "b's 'done' output on its second iteration must reach external c");

    match events.last().unwrap().as_ref().unwrap() {
        PipelineEvent::Final { outputs, stuck } => {
            assert!(!stuck);
            assert_eq!(outputs["c"]["res"], text("c:\"finished\""));
        }
        _ => panic!("expected Final"),
    }
}

#[tokio::test]
async fn stuck_detection_terminates_cleanly() {
    let mut nodes = HashMap::new();
    nodes.insert(
        "alive".to_string(),
        node("alive", vec![], vec!["out"], |_| {
            let mut out = HashMap::new();
            out.insert("out".to_string(), json!("ok"));
            Ok(out)
        }),
    );
    // "z" declares a sender ("ghost") that is never added as a node, so
    // it can never produce a value; the mandatory-input pre-run check
    // is satisfied because a sender *is* declared, but at run time it
    // never arrives.
    let mut z = node("z", vec![("in", InputSocketSpec::mandatory())], vec!["out"], |_| {
        Ok(HashMap::new())
    });
    z.input_sockets
        .get_mut("in")
        .unwrap()
        .senders
        .push(("ghost".to_string(), "out".to_string()));
    nodes.insert("z".to_string(), z);

    let graph = build_graph(nodes.into_values().collect());
    let scheduler = Scheduler::new(graph, EngineConfig::default()).unwrap();

    let events = collect_events(&scheduler, InputData::Canonical(HashMap::new())).await;

    let has_alive_output = events.iter().any(|e| {
        matches!(e.as_ref().unwrap(), PipelineEvent::Output { component, .. } if component == "alive")
    });
    assert!(has_alive_output, "components not blocked by the stall must still run");

    match events.last().unwrap().as_ref().unwrap() {
        PipelineEvent::Final { outputs, stuck } => {
            assert!(*stuck);
            assert!(!outputs.contains_key("z"));
        }
        _ => panic!("expected Final"),
    }
}

#[tokio::test]
async fn max_runs_trip() {
    let mut nodes = HashMap::new();
    let mut looper = node(
        "loop",
        vec![("carry", InputSocketSpec::variadic())],
        vec!["out"],
        |inputs| {
            let len = inputs.get("carry").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);
            let mut out = HashMap::new();
            out.insert("out".to_string(), json!(len + 1));
            Ok(out)
        },
    );
    looper
        .input_sockets
        .get_mut("carry")
        .unwrap()
        .senders
        .push(("loop".to_string(), "out".to_string()));
    looper
        .output_sockets
        .get_mut("out")
        .unwrap()
        .receivers
        .push(("loop".to_string(), "carry".to_string()));
    nodes.insert("loop".to_string(), looper);

    let graph = build_graph(nodes.into_values().collect());
    let config = EngineConfig {
        max_runs_per_component: 3,
        ..EngineConfig::default()
    };
    let scheduler = Scheduler::new(graph, config).unwrap();

    let events = collect_events(&scheduler, InputData::Canonical(HashMap::new())).await;

    let run_count = events
        .iter()
        .filter(|e| matches!(e, Ok(PipelineEvent::Output { component, .. }) if component == "loop"))
        .count();
    assert_eq!(run_count, 3, "exactly three successful runs before the budget trips");

    let last = events.last().unwrap();
    assert!(matches!(last, Err(flowgraph_core::Error::MaxRunsExceeded { component, max }) if component == "loop" && *max == 3));
}
