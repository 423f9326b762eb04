//! Session lifecycle tests
//!
//! Run against the mock launcher; no browser is started.

use std::collections::HashSet;

use crate::cdp::{CdpConnection, MockCdpBrowser};
use crate::config::Config;
use crate::session::{MockLauncher, Session, SessionState};
use crate::Error;

fn create_test_session() -> (Session, MockLauncher) {
    Session::mock(Config::default(), MockCdpBrowser::new())
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (session, launcher) = create_test_session();
    assert_eq!(session.state().await, SessionState::Uninitialized);

    session.start().await.expect("Failed to start session");
    assert_eq!(session.state().await, SessionState::Running);

    // A second start is a no-op
    session.start().await.expect("Second start should succeed");
    assert_eq!(launcher.launches(), 1);

    let version = session.version().await.expect("Failed to get version");
    assert!(version.product.contains("mock"));

    session.stop().await.expect("Failed to stop session");
    assert_eq!(session.state().await, SessionState::Closed);
    assert!(!launcher.browser().is_connected());

    // Stop is idempotent, restart is refused
    session.stop().await.expect("Second stop should succeed");
    assert!(matches!(session.start().await, Err(Error::SessionClosed(_))));
}

#[tokio::test]
async fn test_launch_failure_is_fatal() {
    let session = Session::with_launcher(
        Config::default(),
        std::sync::Arc::new(MockLauncher::failing("No Chrome or Chromium executable found")),
    );

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, Error::Launch(_)));
    assert!(err.is_fatal());
    assert_eq!(session.state().await, SessionState::Uninitialized);
}

#[tokio::test]
async fn test_new_page_requires_running_session() {
    let (session, _launcher) = create_test_session();

    let err = session.new_page().await.unwrap_err();
    assert!(matches!(err, Error::SessionClosed(_)));

    session.start().await.unwrap();
    session.stop().await.unwrap();

    let err = session.new_page().await.unwrap_err();
    assert!(matches!(err, Error::SessionClosed(_)));
}

#[tokio::test]
async fn test_pages_get_isolated_contexts() {
    let (session, launcher) = create_test_session();
    session.start().await.unwrap();

    let page1 = session.new_page().await.expect("Failed to create page 1");
    let page2 = session.new_page().await.expect("Failed to create page 2");

    assert_ne!(page1.id(), page2.id());
    assert_ne!(page1.target().target_id, page2.target().target_id);
    assert!(page1.target().browser_context_id.is_some());
    assert_ne!(page1.target().browser_context_id, page2.target().browser_context_id);

    // Each page enables its domains and applies the configured viewport
    let connection = launcher.browser().connection_for(&page1.target().target_id).unwrap();
    let enabled: Vec<String> = connection
        .calls()
        .into_iter()
        .map(|(method, _)| method)
        .filter(|method| method.ends_with(".enable"))
        .collect();
    assert_eq!(enabled, vec!["Page.enable", "Runtime.enable", "Network.enable"]);
    let viewport = connection.calls_to("Emulation.setDeviceMetricsOverride");
    assert_eq!(viewport[0]["width"], 1280);
    assert_eq!(viewport[0]["height"], 720);

    let closed_id = page1.target().target_id.clone();
    page1.close().await.expect("Failed to close page 1");
    let closed = launcher.browser().closed_targets();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].target_id, closed_id);
    assert!(!connection.is_active());

    page2.close().await.unwrap();
    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_page_creation() {
    let (session, launcher) = create_test_session();
    session.start().await.unwrap();

    let pages = futures::future::try_join_all((0..8).map(|_| session.new_page()))
        .await
        .expect("Failed to create pages concurrently");

    let targets: HashSet<String> = pages.iter().map(|p| p.target().target_id.clone()).collect();
    assert_eq!(targets.len(), 8);

    futures::future::try_join_all(pages.into_iter().map(|p| p.close()))
        .await
        .expect("Failed to close pages concurrently");
    assert_eq!(launcher.browser().closed_targets().len(), 8);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_page_operations_fail_after_stop() {
    let (session, _launcher) = create_test_session();
    session.start().await.unwrap();
    let page = session.new_page().await.unwrap();

    session.stop().await.unwrap();

    let err = page.title().await.unwrap_err();
    assert!(matches!(err, Error::SessionClosed(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_dropped_page_is_closed() {
    let (session, launcher) = create_test_session();
    session.start().await.unwrap();

    let page = session.new_page().await.unwrap();
    let target_id = page.target().target_id.clone();
    drop(page);

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    let closed = launcher.browser().closed_targets();
    assert!(closed.iter().any(|t| t.target_id == target_id));
    session.stop().await.unwrap();
}
