//! Tests against a real Chrome instance. Run with `cargo test -- --ignored`.

use browser_agent::dom::IndexOptions;
use browser_agent::{
    ActionRegistry, Agent, BrowserContext, BrowserSession, Decision, ElementIndex, LaunchOptions, ScriptedDecisions,
    TerminationReason,
};
use serde_json::json;
use std::sync::Arc;

const FORM: &str = "data:text/html,<html><head><title>Apply</title></head><body>\
    <label for='name'>Name</label><input id='name' type='text'>\
    <button id='submit'>Submit</button></body></html>";

fn launch() -> BrowserSession {
    BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser")
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires Chrome to be installed
async fn test_snapshot_indexes_form() {
    let session = launch();
    let context = session.open_context().expect("Failed to open tab");
    context.navigate(FORM).await.expect("Failed to navigate");

    let snapshot = context.snapshot().await.expect("Failed to snapshot");
    assert_eq!(snapshot.title, "Apply");
    assert_eq!(snapshot.root.tag_name, "body");

    // Visibility of data: URL pages varies, so count everything
    let index = ElementIndex::build(snapshot, 1, &IndexOptions { viewport_expansion: -1 }).expect("Failed to index");
    println!("{}", index.describe());
    assert!(index.iter().any(|(_, d)| d.css_selector == "#submit"));

    session.close().expect("Failed to close");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore]
async fn test_page_html_and_screenshot() {
    let session = launch();
    let context = session.open_context().expect("Failed to open tab");
    context.navigate(FORM).await.expect("Failed to navigate");

    let html = context.page_html().await.expect("Failed to read HTML");
    assert!(html.contains("submit"));

    let png = context.take_screenshot().await.expect("Failed to capture screenshot");
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
}

#[tokio::test(flavor = "multi_thread")]
#[ignore]
async fn test_scripted_run_fills_by_label() {
    let session = launch();
    let context = session.open_context().expect("Failed to open tab");

    let script = ScriptedDecisions::new(vec![
        Decision::single("go_to_url", json!({ "url": FORM })),
        Decision::single(
            "fill_text_field_by_label",
            json!({"label_text": "Name", "text_to_fill": "Ada Lovelace"}),
        ),
        Decision::single("done", json!({"text": "filled"})),
    ]);

    let result = Agent::new(
        "fill the form",
        Arc::new(ActionRegistry::with_defaults().unwrap()),
        Arc::new(script),
        context,
    )
    .run()
    .await;

    assert_eq!(result.termination, TerminationReason::Done, "{:?}", result.error);
    assert_eq!(result.steps, 3);
    assert!(result.history.errors().all(|e| e.is_none()));

    session.close().expect("Failed to close");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore]
async fn test_contexts_are_isolated() {
    let session = launch();
    let first = session.open_context().expect("Failed to open tab");
    let second = session.open_context().expect("Failed to open tab");
    assert_ne!(first.id(), second.id());

    first.navigate(FORM).await.expect("Failed to navigate");
    let url = second.current_url().await.expect("Failed to read URL");
    assert!(!url.starts_with("data:"));
}
