//! Browser tests for the JavaScript facade. Run with `wasm-pack test --headless`.

#![cfg(target_arch = "wasm32")]

use js_sys::{Array, Function, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen_test::*;

use topology_graph_wasm::TopologyGraphWasm;

wasm_bindgen_test_configure!(run_in_browser);

fn js(text: &str) -> JsValue {
    js_sys::JSON::parse(text).unwrap()
}

fn keyed() -> TopologyGraphWasm {
    TopologyGraphWasm::new(js(r#"{"identityKey": "id"}"#)).unwrap()
}

#[wasm_bindgen_test]
fn set_data_reports_counts() {
    let mut graph = keyed();
    let summary = graph
        .set_data(js(r#"{
            "nodes": [{"id": 0}, {"id": 1}],
            "links": [{"source": 0, "target": 1}, {"source": 0, "target": 9}]
        }"#))
        .unwrap();

    let vertices = Reflect::get(&summary, &"vertices".into()).unwrap();
    let rejected = Array::from(&Reflect::get(&summary, &"rejected".into()).unwrap());
    assert_eq!(vertices.as_f64(), Some(2.0));
    assert_eq!(rejected.length(), 1);
    assert_eq!(graph.edge_count(), 1);
}

#[wasm_bindgen_test]
fn collapse_fires_events() {
    let mut graph = keyed();
    graph
        .set_data(js(r#"{
            "nodes": [{"id": 0, "x": 0, "y": 0}, {"id": 1, "x": 10, "y": 0}, {"id": 2, "x": 50, "y": 0}],
            "links": [{"source": 1, "target": 2}],
            "nodeSet": [{"id": "g", "nodes": [0, 1]}]
        }"#))
        .unwrap();

    let seen = Array::new();
    let callback = Function::new_with_args("seen, event", "seen.push(event.type)")
        .bind1(&JsValue::NULL, &seen);
    let handle = graph.on_event(callback);

    assert!(graph.set_vertex_set_collapsed("g".into(), true).unwrap());
    assert!(seen.includes(&"addVertexSet".into(), 0));
    assert!(seen.includes(&"addEdgeSetCollection".into(), 0));

    assert_eq!(
        graph.find_nearest_vertex(5.0, 0.0, 1.0).unwrap().as_string(),
        Some("g".to_string())
    );

    assert!(graph.off_event(handle));
    assert!(graph.set_vertex_set_collapsed(JsValue::from("missing"), true).is_err());
}

#[wasm_bindgen_test]
fn positional_ids_come_back_as_numbers() {
    let mut graph = TopologyGraphWasm::new(JsValue::UNDEFINED).unwrap();
    let id = graph.add_vertex(js(r#"{"x": 1, "y": 1}"#)).unwrap();
    assert_eq!(id.as_f64(), Some(0.0));
    assert!(graph.remove_vertex(id).unwrap());
    assert_eq!(graph.vertex_count(), 0);
}
