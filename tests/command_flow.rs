//! End-to-end command flows against the in-process host.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tabpilot::harness::InProcessBrowser;
use tabpilot::{DriverEvent, DriverStatus, LoopStatus, MockChatProvider};

use common::{article_doc, drain_events, scripted_driver};

#[tokio::test]
async fn navigate_and_screenshot_completes_in_one_step() {
    let provider = Arc::new(MockChatProvider::new());
    provider.push_ok(
        r#"{"thinking":"open the site, then capture it",
            "actions":[{"type":"navigate","url":"https://example.com"},{"type":"screenshot"}],
            "done":true,"summary":"Took a screenshot of example.com"}"#,
    );

    let browser = InProcessBrowser::new();
    let tab = browser.open_tab(article_doc("https://start.example.com", "Start"));
    let mut driver = scripted_driver(provider.clone());
    let mut rx = driver.subscribe();

    let result = driver
        .execute_command(tab.as_ref(), "Go to example.com and take a screenshot")
        .await
        .unwrap();

    assert_eq!(result.status, LoopStatus::Completed);
    assert_eq!(result.message, "Took a screenshot of example.com");
    assert_eq!(result.steps_taken, 1);
    // Exactly one model call.
    assert_eq!(provider.request_count(), 1);
    // The navigation really happened and the debug channel was attached for
    // the capture.
    assert_eq!(tab.navigations(), vec!["https://example.com".to_string()]);
    assert!(tab.is_debug_attached());

    let events = drain_events(&mut rx);
    let statuses: Vec<DriverStatus> = events
        .iter()
        .filter_map(|e| match e {
            DriverEvent::StatusUpdate { status, .. } => Some(*status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses.first(), Some(&DriverStatus::Busy));
    assert_eq!(statuses.last(), Some(&DriverStatus::Ready));
    let running: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            DriverEvent::ExecutionState { running, .. } => Some(*running),
            _ => None,
        })
        .collect();
    assert_eq!(running, vec![true, false]);
}

#[tokio::test]
async fn concurrent_command_is_rejected_as_busy() {
    let provider = Arc::new(MockChatProvider::new());
    let browser = InProcessBrowser::new();
    let tab = browser.open_tab(article_doc("https://example.com", "Example"));
    let mut driver = scripted_driver(provider);

    // Another command holds the session.
    let _session = driver.state().try_begin().expect("claim session");
    let err = driver
        .execute_command(tab.as_ref(), "do something")
        .await
        .unwrap_err();
    assert!(matches!(err, tabpilot::LoopError::Busy));
}

#[tokio::test]
async fn stop_unwinds_at_the_next_suspension_point() {
    let provider = Arc::new(MockChatProvider::new());
    // A single decision whose action parks the loop long enough to stop it.
    provider.push_ok(
        r#"{"thinking":"wait for the page",
            "actions":[{"type":"wait","milliseconds":400}],
            "done":false}"#,
    );

    let browser = InProcessBrowser::new();
    let tab = browser.open_tab(article_doc("https://example.com", "Example"));
    let mut driver = scripted_driver(provider.clone());
    let state = driver.state();
    let mut rx = driver.subscribe();

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        state.stop();
    });

    let result = driver
        .execute_command(tab.as_ref(), "hang around")
        .await
        .unwrap();
    stopper.await.unwrap();

    assert_eq!(result.status, LoopStatus::Stopped);
    // The in-flight step finished; no further model calls were made.
    assert_eq!(provider.request_count(), 1);

    let events = drain_events(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        DriverEvent::StatusUpdate {
            status: DriverStatus::Ready,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        DriverEvent::ExecutionState { running: false, .. }
    )));
}

#[tokio::test]
async fn describe_only_batches_are_retried_with_correction() {
    let provider = Arc::new(MockChatProvider::new());
    provider.push_ok(r#"{"thinking":"the page shows an article","actions":[{"type":"describe","text":"an article"}],"done":false}"#);
    provider.push_ok(r#"{"thinking":"extract the heading","actions":[{"type":"extract","selector":"h1"}],"done":true,"summary":"Heading read"}"#);

    let browser = InProcessBrowser::new();
    let tab = browser.open_tab(article_doc("https://example.com", "Example"));
    let mut driver = scripted_driver(provider.clone());

    let result = driver
        .execute_command(tab.as_ref(), "read the heading")
        .await
        .unwrap();

    assert_eq!(result.status, LoopStatus::Completed);
    assert_eq!(provider.request_count(), 2);
    let requests = provider.requests();
    let retry_text = requests[1].messages.last().unwrap().text();
    assert!(
        retry_text.contains("no executable actions"),
        "retry should carry the corrective prompt: {retry_text}"
    );
}

#[tokio::test]
async fn failing_actions_do_not_abort_the_batch() {
    let provider = Arc::new(MockChatProvider::new());
    provider.push_ok(
        r##"{"thinking":"click both",
            "actions":[{"type":"click","selector":"#missing"},{"type":"click","selector":"#more"}],
            "done":true,"summary":"Clicked what exists"}"##,
    );

    let browser = InProcessBrowser::new();
    let tab = browser.open_tab(article_doc("https://example.com", "Example"));
    let mut driver = scripted_driver(provider);
    let mut rx = driver.subscribe();

    let result = driver
        .execute_command(tab.as_ref(), "click around")
        .await
        .unwrap();
    assert_eq!(result.status, LoopStatus::Completed);

    // Selector-not-found is logged as an error line; the second click still
    // ran and succeeded.
    let events = drain_events(&mut rx);
    let logs: Vec<(tabpilot::LogKind, String)> = events
        .into_iter()
        .filter_map(|e| match e {
            DriverEvent::ActionLog { log_type, text, .. } => Some((log_type, text)),
            _ => None,
        })
        .collect();
    assert!(logs
        .iter()
        .any(|(k, t)| *k == tabpilot::LogKind::Error && t.contains("#missing")));
    assert!(logs
        .iter()
        .any(|(k, t)| *k == tabpilot::LogKind::Success && t.contains("#more")));
}

#[tokio::test]
async fn tab_listing_returns_a_formatted_block() {
    let provider = Arc::new(MockChatProvider::new());
    provider.push_ok(
        r#"{"thinking":"list tabs","actions":[{"type":"tab_list"}],"done":true,"summary":"Listed tabs"}"#,
    );

    let browser = InProcessBrowser::new();
    let tab = browser.open_tab(article_doc("https://example.com", "Example"));
    browser.open_tab(article_doc("https://docs.example.com", "Docs"));
    let mut driver = scripted_driver(provider);
    let mut rx = driver.subscribe();

    let result = driver
        .execute_command(tab.as_ref(), "list all open tabs")
        .await
        .unwrap();
    assert_eq!(result.status, LoopStatus::Completed);

    let events = drain_events(&mut rx);
    let listing = events
        .iter()
        .find_map(|e| match e {
            DriverEvent::ActionLog {
                log_type: tabpilot::LogKind::Success,
                text,
                ..
            } if text.starts_with("Open tabs") => Some(text.clone()),
            _ => None,
        })
        .expect("tab listing logged");
    assert!(listing.contains("Open tabs (2):"));
    assert!(listing.contains("Docs"));
}
