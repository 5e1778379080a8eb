//! Integration tests for tree acquisition.
//!
//! These tests script an accessibility graph in memory and verify the
//! structural guarantees of the built tree: dense indices, no duplicate
//! elements, traversal bounds and index invalidation across rebuilds.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use axpilot::desktop::platform::scripted::ElementId;
use axpilot::desktop::serializer::clickable_elements_string;
use axpilot::desktop::{
    AccessibilityProvider, AttributeValue, AxError, BuildError, BuilderConfig, ElementHandle, ScriptedAccessibility,
    ScriptedHost, TreeBuilder, UiTree,
};
use axpilot::tools::{default_registry, ActionContext, DesktopSession};

const PID: i32 = 4242;

/// Application with a main window; returns the window element
fn app_with_window(ax: &ScriptedAccessibility) -> ElementId {
    let app = ax.add_application(PID);
    let window = ax.add_element("AXWindow");
    ax.set_main_window(app, window);
    window
}

fn build(ax: &Arc<ScriptedAccessibility>, config: BuilderConfig) -> UiTree {
    TreeBuilder::new(ax.clone(), config).try_build(Some(PID)).unwrap()
}

/// Deterministic pseudo-random graph with shared references and back edges
fn random_graph(ax: &ScriptedAccessibility, seed: u64, size: usize) -> ElementId {
    const ROLES: [&str; 8] = [
        "AXGroup", "AXButton", "AXStaticText", "AXTextField", "AXRow", "AXCell", "AXCheckBox", "AXImage",
    ];

    let window = app_with_window(ax);
    let mut state = seed;
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };

    let mut elements = vec![window];
    for _ in 0..size {
        let role = ROLES[next() % ROLES.len()];
        let element = ax.add_element(role);
        if next() % 3 == 0 {
            ax.set_actions(element, &["AXPress"]);
        }
        let parent = elements[next() % elements.len()];
        ax.add_child(parent, element);
        elements.push(element);
    }

    // shared references and cycles
    for _ in 0..size / 4 {
        let parent = elements[next() % elements.len()];
        let child = elements[next() % elements.len()];
        ax.add_child(parent, child);
    }

    window
}

#[test]
fn test_indices_are_dense_and_unique() {
    for seed in 1..20u64 {
        let ax = Arc::new(ScriptedAccessibility::new());
        random_graph(&ax, seed, 120);
        let tree = build(&ax, BuilderConfig::default());

        let indices: Vec<usize> = tree.iter().filter_map(|n| n.index).collect();
        let interactive = tree.iter().filter(|n| n.is_interactive).count();

        assert_eq!(indices.len(), interactive, "seed {}", seed);
        assert_eq!(indices, (0..interactive).collect::<Vec<_>>(), "seed {}", seed);
        assert_eq!(tree.registry().len(), interactive);

        for index in indices {
            assert_eq!(tree.node_for_index(index).unwrap().index, Some(index));
        }
    }
}

#[test]
fn test_no_element_appears_twice() {
    for seed in 1..20u64 {
        let ax = Arc::new(ScriptedAccessibility::new());
        random_graph(&ax, seed, 120);
        let tree = build(&ax, BuilderConfig::default());

        let mut seen = HashSet::new();
        for node in tree.iter() {
            assert!(
                seen.insert(node.handle().identity()),
                "seed {}: element {} included twice",
                seed,
                node
            );
        }
    }
}

#[test]
fn test_cycle_terminates() {
    let ax = Arc::new(ScriptedAccessibility::new());
    let window = app_with_window(&ax);
    let group = ax.add_element("AXGroup");
    let button = ax.add_element("AXButton");
    ax.add_child(window, group);
    ax.add_child(group, button);
    ax.add_child(button, group);
    ax.add_child(group, window);

    let tree = build(&ax, BuilderConfig::default());
    assert_eq!(tree.len(), 4);
    assert_eq!(tree.interactive_count(), 1);
}

#[test]
fn test_depth_cap() {
    let ax = Arc::new(ScriptedAccessibility::new());
    let mut parent = app_with_window(&ax);
    for _ in 0..30 {
        let group = ax.add_element("AXGroup");
        ax.add_child(parent, group);
        parent = group;
    }

    for max_depth in [0usize, 3, 10] {
        let config = BuilderConfig {
            max_depth,
            ..Default::default()
        };
        let tree = build(&ax, config);
        let deepest = tree.iter().map(|n| tree.depth(n)).max().unwrap();

        // the window sits one level below the synthetic root
        assert_eq!(deepest, max_depth + 1);
        assert_eq!(tree.len(), max_depth + 2);
    }
}

#[test]
fn test_children_cap() {
    let ax = Arc::new(ScriptedAccessibility::new());
    let window = app_with_window(&ax);
    let list = ax.add_element("AXList");
    ax.add_child(window, list);
    for i in 0..80 {
        let button = ax.add_element("AXButton");
        ax.set_attribute_value(button, "AXTitle", format!("Item {}", i));
        ax.add_child(list, button);
    }

    let config = BuilderConfig {
        max_children: 25,
        ..Default::default()
    };
    let tree = build(&ax, config);

    for node in tree.iter() {
        assert!(node.child_ids().len() <= 25);
    }
    assert_eq!(tree.interactive_count(), 25);
    assert_eq!(tree.node_for_index(24).unwrap().attribute_str("title"), Some("Item 24"));
}

#[test]
fn test_table_cells_inside_rows_are_not_indexed() {
    let ax = Arc::new(ScriptedAccessibility::new());
    let window = app_with_window(&ax);
    let table = ax.add_element("AXTable");
    ax.add_child(window, table);

    for _ in 0..3 {
        let row = ax.add_element("AXRow");
        ax.add_child(table, row);
        for _ in 0..4 {
            let cell = ax.add_element("AXCell");
            ax.set_actions(cell, &["AXPress"]);
            ax.add_child(row, cell);
        }
    }
    let loose_cell = ax.add_element("AXCell");
    ax.set_actions(loose_cell, &["AXPress"]);
    ax.add_child(table, loose_cell);

    let tree = build(&ax, BuilderConfig::default());
    assert_eq!(tree.iter().filter(|n| n.role == "AXCell").count(), 13);
    assert_eq!(tree.interactive_count(), 1);
    assert_eq!(tree.node_for_index(0).unwrap().accessibility_path(), "/AXWindow/AXTable/AXCell");
}

#[test]
fn test_rebuild_is_structurally_identical() {
    let ax = Arc::new(ScriptedAccessibility::new());
    random_graph(&ax, 7, 80);
    let builder = TreeBuilder::new(ax.clone(), BuilderConfig::default());

    let first = builder.try_build(Some(PID)).unwrap();
    let second = builder.try_build(Some(PID)).unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.role, b.role);
        assert_eq!(a.attributes, b.attributes);
        assert_eq!(a.is_interactive, b.is_interactive);
        assert_eq!(a.index, b.index);
        assert_eq!(a.accessibility_path(), b.accessibility_path());
    }
    assert_eq!(clickable_elements_string(&first), clickable_elements_string(&second));
}

#[test]
fn test_ok_button_and_disabled_field() {
    let ax = Arc::new(ScriptedAccessibility::new());
    let window = app_with_window(&ax);
    let ok = ax.add_element("AXButton");
    ax.set_attribute_value(ok, "AXTitle", "OK");
    ax.set_attribute_value(ok, "AXEnabled", true);
    ax.set_actions(ok, &["AXPress"]);
    let field = ax.add_element("AXStaticText");
    ax.set_attribute_value(field, "AXEnabled", false);
    ax.add_child(window, ok);
    ax.add_child(window, field);

    let tree = build(&ax, BuilderConfig::default());
    assert!(tree.len() >= 2);
    assert_eq!(tree.interactive_count(), 1);

    let button = tree.node_for_index(0).unwrap();
    assert_eq!(button.attribute_str("title"), Some("OK"));
    assert!(button.is_enabled());
    assert_eq!(clickable_elements_string(&tree), "0[:]<AXButton title=\"OK\">");
}

#[tokio::test]
async fn test_disabled_field_with_actions_rejects_input() {
    let ax = Arc::new(ScriptedAccessibility::new());
    let window = app_with_window(&ax);
    let ok = ax.add_element("AXButton");
    ax.set_attribute_value(ok, "AXTitle", "OK");
    ax.set_actions(ok, &["AXPress"]);
    let field = ax.add_element("AXTextField");
    ax.set_actions(field, &["AXConfirm"]);
    ax.set_attribute_value(field, "AXEnabled", false);
    ax.add_child(window, ok);
    ax.add_child(window, field);

    let session = DesktopSession::new(TreeBuilder::new(ax.clone(), BuilderConfig::default()));
    session.set_target(PID).await;
    let tree = assert_ok!(session.refresh().await);
    assert_eq!(tree.interactive_count(), 2);
    assert!(!tree.node_for_index(1).unwrap().is_enabled());

    let registry = default_registry().unwrap();
    let ctx = ActionContext::new(Arc::new(ScriptedHost::new()), Some(Arc::new(session)));
    let result = registry
        .execute("input_text", json!({"index": 1, "text": "hello"}), &ctx)
        .await;

    assert!(result.error.unwrap().contains("Element disabled"));
    assert!(ax.interactions().is_empty());
}

#[tokio::test]
async fn test_stale_index_fails_after_rebuild() {
    let ax = Arc::new(ScriptedAccessibility::new());
    let window = app_with_window(&ax);
    let buttons: Vec<ElementId> = (0..4)
        .map(|_| {
            let b = ax.add_element("AXButton");
            ax.set_actions(b, &["AXPress"]);
            ax.add_child(window, b);
            b
        })
        .collect();

    let session = DesktopSession::new(TreeBuilder::new(ax.clone(), BuilderConfig::default()));
    session.set_target(PID).await;
    let stale = assert_ok!(session.refresh().await);
    assert_eq!(stale.interactive_count(), 4);

    // the application releases two buttons, then the tree is rebuilt
    ax.remove_element(buttons[2]);
    ax.remove_element(buttons[3]);
    let fresh = assert_ok!(session.refresh().await);
    assert_eq!(fresh.interactive_count(), 2);

    let registry = default_registry().unwrap();
    let ctx = ActionContext::new(Arc::new(ScriptedHost::new()), Some(Arc::new(session)));
    let result = registry.execute("click_element", json!({"index": 3}), &ctx).await;

    let error = result.error.unwrap();
    assert!(error.contains("Invalid index 3"), "{}", error);
    assert!(ax.interactions().is_empty());
}

#[test]
fn test_build_failures() {
    let ax = Arc::new(ScriptedAccessibility::new());
    let builder = TreeBuilder::new(ax.clone(), BuilderConfig::default());

    assert!(matches!(assert_err!(builder.try_build(None)), BuildError::NoProcess));
    assert!(builder.build(Some(PID)).is_none());

    ax.add_application(PID);
    assert!(matches!(
        assert_err!(builder.try_build(Some(PID))),
        BuildError::NoMainWindow { .. }
    ));

    ax.set_trusted(false);
    assert!(assert_err!(builder.try_build(Some(PID))).is_permission());
}

/// Provider that takes `delay` for every attribute read
struct SlowProvider {
    inner: Arc<ScriptedAccessibility>,
    delay: Duration,
}

impl AccessibilityProvider for SlowProvider {
    fn is_trusted(&self) -> bool {
        self.inner.is_trusted()
    }

    fn application(&self, pid: i32) -> Result<ElementHandle, AxError> {
        self.inner.application(pid)
    }

    fn copy_attribute(&self, element: &ElementHandle, attribute: &str) -> Result<AttributeValue, AxError> {
        std::thread::sleep(self.delay);
        self.inner.copy_attribute(element, attribute)
    }

    fn action_names(&self, element: &ElementHandle) -> Result<Vec<String>, AxError> {
        self.inner.action_names(element)
    }

    fn perform_action(&self, element: &ElementHandle, action: &str) -> Result<(), AxError> {
        self.inner.perform_action(element, action)
    }

    fn set_attribute(&self, element: &ElementHandle, attribute: &str, value: &AttributeValue) -> Result<(), AxError> {
        self.inner.set_attribute(element, attribute, value)
    }
}

#[tokio::test]
async fn test_slow_build_times_out_without_installing_a_tree() {
    let ax = Arc::new(ScriptedAccessibility::new());
    let window = app_with_window(&ax);
    for _ in 0..3 {
        let button = ax.add_element("AXButton");
        ax.add_child(window, button);
    }

    let provider = Arc::new(SlowProvider {
        inner: ax.clone(),
        delay: Duration::from_millis(20),
    });
    let config = BuilderConfig {
        timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let session = DesktopSession::new(TreeBuilder::new(provider, config));
    session.set_target(PID).await;

    let err = assert_err!(session.refresh().await);
    match err {
        BuildError::Timeout { pid, elapsed } => {
            assert_eq!(pid, PID);
            assert!(elapsed >= Duration::from_millis(50));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(session.current_tree().await.is_none());
}
