//! Purpose: Prove the two backends are observably interchangeable.
//! Exports: None (integration test module).
//! Role: Run identical operation scripts against a `MemoryStore` and a
//! `RemoteStore`-over-`Server` pair and compare every observable outcome.
//! Invariants: Both stores are seeded with the same root id so raw ids can
//! be compared directly.

use nodebook::api::{
    Attrs, ErrorKind, MemoryStore, NodeId, NodeStore, RemoteStore, ServeConfig, Server,
};
use serde_json::{Value, json};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

fn attrs(value: Value) -> Attrs {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn outcome<T: std::fmt::Debug>(result: Result<T, nodebook::api::Error>) -> String {
    match result {
        Ok(value) => format!("ok: {value:?}"),
        Err(err) => format!("err: {:?}", err.kind()),
    }
}

/// Fixed operation script exercising every store operation, including the
/// failure paths. Explicit ids keep the transcript comparable across
/// backends.
fn run_script(store: &dyn NodeStore) -> Vec<String> {
    let root = store.root_id().expect("root");
    let mut log = Vec::new();

    log.push(outcome(store.create_node(
        &root,
        attrs(json!({"title": "Alpha", "count": 1})),
        Some(NodeId::new("a")),
    )));
    log.push(outcome(store.create_node(
        &NodeId::new("a"),
        attrs(json!({"title": "Beta"})),
        Some(NodeId::new("b")),
    )));
    log.push(outcome(store.create_node(
        &root,
        attrs(json!({})),
        Some(NodeId::new("a")),
    )));
    log.push(outcome(store.create_node(
        &NodeId::new("ghost"),
        attrs(json!({})),
        None,
    )));
    log.push(outcome(store.attrs(&NodeId::new("a"))));
    log.push(outcome(store.children(&root)));
    log.push(outcome(store.set_attrs(
        &NodeId::new("a"),
        attrs(json!({"count": 2, "extra": 0.5})),
    )));
    log.push(outcome(store.attrs(&NodeId::new("a"))));
    log.push(outcome(store.set_attrs(&NodeId::new("ghost"), attrs(json!({})))));
    log.push(outcome(store.move_node(&NodeId::new("a"), &NodeId::new("b"))));
    log.push(outcome(store.move_node(&root, &NodeId::new("a"))));
    log.push(outcome(
        store.create_node(&root, attrs(json!({"title": "Gamma"})), Some(NodeId::new("c"))),
    ));
    log.push(outcome(store.move_node(&NodeId::new("b"), &NodeId::new("c"))));
    log.push(outcome(store.children(&NodeId::new("c"))));
    log.push(outcome(store.node(&NodeId::new("b")).map(|node| node.parent)));
    log.push(outcome(store.search_title("a")));
    log.push(outcome(store.delete_node(&NodeId::new("c"))));
    log.push(outcome(store.node(&NodeId::new("b"))));
    log.push(outcome(store.delete_node(&NodeId::new("c"))));
    log.push(outcome(store.delete_node(&root)));
    log.push(outcome(store.children(&root)));
    log
}

#[test]
fn memory_and_remote_backends_observe_identically() -> TestResult<()> {
    let root = NodeId::new("root");

    let memory = MemoryStore::with_root_id(root.clone());
    let memory_log = run_script(&memory);

    let server = Server::start(
        ServeConfig::new("127.0.0.1:0".parse()?),
        MemoryStore::with_root_id(root),
    )?;
    let mut client = RemoteStore::new();
    client.connect(server.base_url())?;
    let remote_log = run_script(&client);
    server.shutdown()?;

    assert_eq!(memory_log, remote_log);
    Ok(())
}

/// The concrete scenario from the original system's HTTP test, run against
/// each backend through the same interface.
fn create_get_delete_scenario(store: &dyn NodeStore) {
    let root = store.root_id().expect("root");
    let payload = attrs(json!({"key1": 123, "key2": 456}));
    let id = store
        .create_node(&root, payload.clone(), None)
        .expect("create");
    assert_eq!(store.attrs(&id).expect("attrs"), payload);
    store.delete_node(&id).expect("delete");
    let err = store.node(&id).expect_err("deleted");
    assert_eq!(err.kind(), ErrorKind::NodeNotFound);
}

#[test]
fn concrete_scenario_on_the_memory_store() {
    create_get_delete_scenario(&MemoryStore::new());
}

#[test]
fn concrete_scenario_over_http() -> TestResult<()> {
    let server = Server::start(
        ServeConfig::new("127.0.0.1:0".parse()?),
        MemoryStore::new(),
    )?;
    let mut client = RemoteStore::new();
    client.connect(server.base_url())?;
    create_get_delete_scenario(&client);
    server.shutdown()?;
    Ok(())
}
