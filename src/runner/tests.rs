//! Runner tests over a mock browser

use futures::future::BoxFuture;
use std::time::Duration;

use super::*;
use crate::cdp::MockCdpBrowser;
use crate::expect::expect;
use crate::session::MockLauncher;

fn passes(_ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async { Ok(()) })
}

fn fails_assertion(_ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async { expect(1.0_f64).context("#prevBtn opacity").to_be_less_than(1.0) })
}

fn breaks_transport(_ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async { Err(Error::cdp("socket reset")) })
}

fn panics(_ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async {
        let broken = true;
        if broken {
            panic!("boom");
        }
        Ok(())
    })
}

fn hangs(_ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    })
}

fn reads_config(ctx: &mut CaseContext) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        expect(ctx.url("/naamani/1/")).to_equal("http://fake.test/naamani/1/".to_string())?;
        expect(ctx.edit_server().is_err()).to_be_true()
    })
}

fn config() -> Config {
    Config {
        base_url: "http://fake.test".to_string(),
        case_timeout_ms: 300,
        concurrency: 3,
        ..Default::default()
    }
}

fn mock_runner(cases: Vec<TestCase>) -> (Runner, MockLauncher) {
    let (session, launcher) = Session::mock(config(), MockCdpBrowser::new());
    let runner = Runner::with_session(session, cases).with_capabilities(Capabilities::none());
    (runner, launcher)
}

#[tokio::test]
async fn test_every_outcome_is_reported() {
    let (runner, launcher) = mock_runner(vec![
        TestCase::new("basic", "passes", passes),
        TestCase::new("basic", "fails_assertion", fails_assertion),
        TestCase::new("basic", "breaks_transport", breaks_transport),
        TestCase::new("basic", "panics", panics),
        TestCase::new("basic", "hangs", hangs),
        TestCase::new("basic", "reads_config", reads_config),
    ]);

    let report = runner.run().await.unwrap();

    let status = |name: &str| report.case("basic", name).map(|c| c.status);
    assert_eq!(status("passes"), Some(CaseStatus::Passed));
    assert_eq!(status("fails_assertion"), Some(CaseStatus::Failed));
    assert_eq!(status("breaks_transport"), Some(CaseStatus::Errored));
    assert_eq!(status("panics"), Some(CaseStatus::Errored));
    assert_eq!(status("hangs"), Some(CaseStatus::Failed));
    assert_eq!(status("reads_config"), Some(CaseStatus::Passed));

    let failed = report.case("basic", "fails_assertion").and_then(|c| c.diagnostic.clone()).unwrap();
    assert_eq!(failed.selector.as_deref(), Some("#prevBtn opacity"));
    assert_eq!(failed.expected.as_deref(), Some("< 1"));

    let hung = report.case("basic", "hangs").and_then(|c| c.diagnostic.clone()).unwrap();
    assert_eq!(hung.kind, "timeout");
    assert_eq!(hung.elapsed, Some(Duration::from_millis(300)));

    let panicked = report.case("basic", "panics").and_then(|c| c.diagnostic.clone()).unwrap();
    assert_eq!(panicked.kind, "panic");
    assert_eq!(panicked.message, "boom");

    assert_eq!(report.summary.total, 6);
    assert_eq!(report.exit_code(), 1);
    assert!(!launcher.browser().is_connected());
}

#[tokio::test]
async fn test_each_case_gets_its_own_page() {
    let (runner, launcher) = mock_runner(vec![
        TestCase::new("a", "one", passes),
        TestCase::new("a", "two", fails_assertion),
        TestCase::new("b", "three", passes),
    ]);
    let report = runner.run().await.unwrap();
    assert_eq!(report.summary.total, 3);

    let mut closed: Vec<String> = launcher
        .browser()
        .closed_targets()
        .into_iter()
        .map(|t| t.target_id)
        .collect();
    closed.sort();
    closed.dedup();
    assert_eq!(closed.len(), 3);
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test]
async fn test_missing_capability_skips_case() {
    let (runner, launcher) = mock_runner(vec![
        TestCase::new("editing", "needs_server", fails_assertion).requiring(&[Capability::EditServer]),
        TestCase::new("navigation", "core", passes),
    ]);
    let report = runner.run().await.unwrap();

    let skipped = report.case("editing", "needs_server").unwrap();
    assert_eq!(skipped.status, CaseStatus::Skipped);
    assert_eq!(skipped.skip_reason.as_deref(), Some("edit server unavailable"));
    assert_eq!(report.case("navigation", "core").map(|c| c.status), Some(CaseStatus::Passed));
    assert_eq!(report.exit_code(), 0);
    // No page is opened for a skipped case
    assert_eq!(launcher.browser().closed_targets().len(), 1);
}

#[tokio::test]
async fn test_available_capability_runs_case() {
    let (session, _launcher) = Session::mock(config(), MockCdpBrowser::new());
    let report = Runner::with_session(
        session,
        vec![TestCase::new("editing", "needs_server", passes).requiring(&[Capability::EditServer])],
    )
    .with_capabilities(Capabilities::none().with(Capability::EditServer))
    .run()
    .await
    .unwrap();

    assert_eq!(report.summary.passed, 1);
    assert_eq!(report.capabilities, vec![Capability::EditServer]);
}

#[test]
fn test_filter_matches_suite_and_name() {
    let (runner, _launcher) = mock_runner(vec![
        TestCase::new("navigation", "next_button", passes),
        TestCase::new("styling", "next_button_hover", passes),
        TestCase::new("styling", "mantra_background", passes),
    ]);

    let runner = runner.filter("next_button");
    assert_eq!(runner.selected().len(), 2);

    let runner = runner.filter("styling::");
    let names: Vec<_> = runner.selected().iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["next_button_hover", "mantra_background"]);

    assert_eq!(runner.filter("").selected().len(), 3);
}

#[tokio::test]
async fn test_launch_failure_aborts_run() {
    let session = Session::with_launcher(config(), std::sync::Arc::new(MockLauncher::failing("chrome not found")));
    let err = Runner::with_session(session, vec![TestCase::new("a", "one", passes)])
        .with_capabilities(Capabilities::none())
        .run()
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_failure_screenshot_written() {
    let dir = tempfile::tempdir().unwrap();
    let browser = MockCdpBrowser::with_handler(|method, _params, _events| match method {
        // "PNG" in base64
        "Page.captureScreenshot" => Ok(serde_json::json!({ "data": "UE5H" })),
        _ => Ok(serde_json::json!({})),
    });
    let config = Config {
        artifacts_dir: Some(dir.path().join("shots")),
        ..config()
    };
    let (session, _launcher) = Session::mock(config, browser);
    let report = Runner::with_session(session, vec![TestCase::new("styling", "opacity", fails_assertion)])
        .with_capabilities(Capabilities::none())
        .run()
        .await
        .unwrap();

    let path = report.cases[0]
        .diagnostic
        .as_ref()
        .and_then(|d| d.screenshot.clone())
        .unwrap();
    assert_eq!(path, dir.path().join("shots").join("styling-opacity.png"));
    assert_eq!(std::fs::read(path).unwrap(), b"PNG");
}

#[tokio::test]
async fn test_site_cases_against_fake_site() {
    use crate::page::tests::{fake_site, ORIGIN};
    use crate::suites::{editing, navigation};

    let wanted = [
        "homepage_links_names_list",
        "homepage_stylesheet",
        "name_page_controls",
        "sanskrit_numeral",
        "prev_disabled_on_first",
        "prev_enabled_on_second",
        "next_button",
        "mantra_section_visible",
        "no_redirects",
    ];
    let mut cases: Vec<TestCase> = navigation::cases()
        .into_iter()
        .filter(|c| wanted.contains(&c.name))
        .collect();
    cases.extend(editing::cases().into_iter().take(2));

    // The fake site is one shared document, so cases must not interleave
    let config = Config {
        base_url: ORIGIN.to_string(),
        case_timeout_ms: 5000,
        poll_interval_ms: 10,
        concurrency: 1,
        ..Default::default()
    };
    let (session, _launcher) = Session::mock(config, fake_site());
    let report = Runner::with_session(session, cases)
        .with_capabilities(Capabilities::none())
        .run()
        .await
        .unwrap();

    for case in &report.cases {
        let expected = if case.suite == "editing" {
            CaseStatus::Skipped
        } else {
            CaseStatus::Passed
        };
        assert_eq!(case.status, expected, "{}: {:?}", case.id(), case.diagnostic);
    }
    assert_eq!(report.summary.passed, wanted.len());
    assert_eq!(report.summary.skipped, 2);
}

#[tokio::test]
async fn test_edit_round_trip_against_fake_site() {
    use crate::page::tests::{fake_site_with_editor, ORIGIN};
    use crate::suites::editing;

    let wanted = ["mantra_textarea_prepopulated", "cancel_restores_text"];
    let cases: Vec<TestCase> = editing::cases()
        .into_iter()
        .filter(|c| wanted.contains(&c.name))
        .collect();

    let config = Config {
        base_url: ORIGIN.to_string(),
        case_timeout_ms: 5000,
        poll_interval_ms: 10,
        concurrency: 1,
        ..Default::default()
    };
    let (session, _launcher) = Session::mock(config, fake_site_with_editor());
    let report = Runner::with_session(session, cases)
        .with_capabilities(Capabilities::none().with(Capability::EditServer))
        .run()
        .await
        .unwrap();

    assert_eq!(report.summary.total, wanted.len());
    for case in &report.cases {
        assert_eq!(case.status, CaseStatus::Passed, "{}: {:?}", case.id(), case.diagnostic);
    }
}
