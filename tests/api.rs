//! Integration tests for the HTTP sidecar.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot` over a
//! scripted desktop.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use axpilot::api::{routes::create_router, state::AppState};
use axpilot::config::Config;
use axpilot::desktop::{RunningApp, ScriptedAccessibility, ScriptedHost};

const PID: i32 = 321;

fn app() -> (Arc<ScriptedAccessibility>, Router) {
    let ax = Arc::new(ScriptedAccessibility::new());
    let application = ax.add_application(PID);
    let window = ax.add_element("AXWindow");
    ax.set_main_window(application, window);
    for label in ["Save", "Cancel"] {
        let button = ax.add_element("AXButton");
        ax.set_attribute_value(button, "AXTitle", label);
        ax.set_actions(button, &["AXPress"]);
        ax.add_child(window, button);
    }

    let host = ScriptedHost::new().with_app(RunningApp {
        name: "TextEdit".to_string(),
        bundle_id: "com.apple.TextEdit".to_string(),
        path: "/System/Applications/TextEdit.app".to_string(),
        pid: PID,
    });

    let config = Config {
        wait_between_actions_ms: 0,
        app_launch_wait_ms: 0,
        ..Default::default()
    };
    let state = AppState::new(config, ax.clone(), Arc::new(host)).unwrap();
    (ax, create_router(Arc::new(state)))
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (ax, router) = app();
    let (status, body) = send(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accessibility_trusted"], json!(true));

    ax.set_trusted(false);
    let (_, body) = send(&router, "GET", "/health", None).await;
    assert_eq!(body["accessibility_trusted"], json!(false));
}

#[tokio::test]
async fn test_list_actions_and_apps() {
    let (_ax, router) = app();

    let (status, body) = send(&router, "GET", "/actions", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names[0], "done");
    assert!(names.contains(&"click_element"));
    assert_eq!(names.len(), 8);

    let (status, body) = send(&router, "GET", "/apps", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["bundle_id"], json!("com.apple.TextEdit"));
}

#[tokio::test]
async fn test_build_tree_then_act() {
    let (ax, router) = app();

    let (status, body) = send(&router, "POST", "/tree", Some(json!({"pid": PID, "verbose": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interactive_count"], json!(2));
    assert_eq!(
        body["elements"],
        json!("0[:]<AXButton title=\"Save\">\n1[:]<AXButton title=\"Cancel\">")
    );
    assert_eq!(body["interactive"][1]["path"], json!("/AXWindow/AXButton[2]"));
    assert!(body["verbose"].as_str().unwrap().starts_with("<application>"));

    let actions = json!({"actions": [
        {"name": "click_element", "params": {"index": 1}},
        {"name": "done", "params": {"text": "cancelled"}}
    ]});
    let (status, body) = send(&router, "POST", "/act", Some(actions)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stop"], json!({"kind": "done"}));
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][1]["is_done"], json!(true));
    assert_eq!(ax.interactions().len(), 1);
}

#[tokio::test]
async fn test_build_tree_errors() {
    let (ax, router) = app();

    let (status, _) = send(&router, "POST", "/tree", Some(json!({"pid": 999}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&router, "POST", "/tree", Some(json!({"pid": -4}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    ax.set_trusted(false);
    let (status, body) = send(&router, "POST", "/tree", Some(json!({"pid": PID}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["detail"].as_str().unwrap().contains("Accessibility"));
}

#[tokio::test]
async fn test_act_truncates_errors() {
    let (_ax, router) = app();
    let name = "x".repeat(1000);
    let actions = json!({"actions": [{"name": name, "params": {}}]});

    let (status, body) = send(&router, "POST", "/act", Some(actions)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stop"], json!({"kind": "error"}));
    let error = body["results"][0]["error"].as_str().unwrap();
    assert_eq!(error.chars().count(), 400);
    assert!(error.chars().all(|c| c == 'x'));
}
