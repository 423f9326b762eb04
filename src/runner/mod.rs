//! # 用例运行器
//!
//! 在一个浏览器会话上并发执行测试用例，并汇总为运行报告。
//!
//! ## 主要功能
//! - **会话生命周期**: 运行开始时启动浏览器，结束时无论成败都会停止
//! - **能力探测**: 每次运行只探测一次编辑服务器
//! - **并发调度**: 受 `concurrency` 限制，每个用例拥有独立页面和超时
//! - **故障隔离**: 用例内的错误和 panic 只影响该用例
//! - **失败截图**: 配置 `artifacts_dir` 后保存失败页面的截图
//!
//! ## 核心概念
//! - **TestCase**: 套件名、用例名、所需能力和用例函数
//! - **CaseContext**: 用例独占的页面、配置和可用能力
//! - **RunReport**: 每个用例的状态、耗时和诊断信息
//!
//! ## 使用示例
//! ```rust,no_run
//! use naamani_e2e::{config::Config, runner::Runner, suites};
//!
//! # async fn example() -> naamani_e2e::Result<()> {
//! let report = Runner::new(Config::from_env()?, suites::all())
//!     .filter("navigation")
//!     .run()
//!     .await?;
//! println!("{}", report.render_text());
//! # Ok(())
//! # }
//! ```

pub mod case;
pub mod report;

#[cfg(test)]
mod tests;

pub use case::{CaseContext, CaseFn, TestCase};
pub use report::{CaseReport, CaseStatus, Diagnostic, RunReport, Summary};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::page::Page;
use crate::probe::{Capabilities, Capability, EditServerClient};
use crate::session::Session;
use crate::{Error, Result};

/// Runs test cases against one session
#[derive(Debug)]
pub struct Runner {
    config: Config,
    session: Arc<Session>,
    cases: Vec<TestCase>,
    filter: Option<String>,
    capabilities: Option<Capabilities>,
}

impl Runner {
    /// Runner that launches Chrome per `config`
    pub fn new(config: Config, cases: Vec<TestCase>) -> Self {
        let session = Session::new(config.clone());
        Self::with_session(session, cases)
    }

    /// Runner over an existing, not yet started session
    pub fn with_session(session: Session, cases: Vec<TestCase>) -> Self {
        Self {
            config: session.config().as_ref().clone(),
            session: Arc::new(session),
            cases,
            filter: None,
            capabilities: None,
        }
    }

    /// Only run cases whose `suite::name` contains `pattern`
    pub fn filter(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.filter = if pattern.is_empty() { None } else { Some(pattern) };
        self
    }

    /// Use these capabilities instead of probing
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Cases selected by the filter, in declaration order
    pub fn selected(&self) -> Vec<TestCase> {
        self.cases
            .iter()
            .filter(|case| match &self.filter {
                Some(pattern) => case.id().contains(pattern.as_str()),
                None => true,
            })
            .copied()
            .collect()
    }

    /// Run every selected case.
    ///
    /// Only session-lifecycle failures during setup or teardown return `Err`;
    /// everything raised inside a case ends up in the report.
    pub async fn run(self) -> Result<RunReport> {
        let started_at = Utc::now();
        let cases = self.selected();
        info!("Running {} test case(s) against {}", cases.len(), self.config.base_url);

        self.session.start().await?;

        let capabilities = match self.capabilities.clone() {
            Some(capabilities) => capabilities,
            None => Capabilities::probe(&self.config).await,
        };
        let edit_server = if capabilities.has(Capability::EditServer) {
            EditServerClient::new(&self.config.edit_server_url, self.config.probe_timeout()).ok()
        } else {
            None
        };

        let concurrency = self.config.concurrency.max(1);
        let reports: Vec<CaseReport> = stream::iter(cases)
            .map(|case| {
                let session = Arc::clone(&self.session);
                let config = self.config.clone();
                let capabilities = capabilities.clone();
                let edit_server = edit_server.clone();
                async move {
                    let started_at = Utc::now();
                    let started = Instant::now();
                    let handle = tokio::spawn(execute(case, session, config, capabilities, edit_server));
                    match handle.await {
                        Ok(report) => report,
                        Err(join_error) => {
                            error!("Test case {} panicked: {}", case.id(), join_error);
                            CaseReport {
                                suite: case.suite.to_string(),
                                name: case.name.to_string(),
                                status: CaseStatus::Errored,
                                started_at,
                                duration: started.elapsed(),
                                skip_reason: None,
                                diagnostic: Some(Diagnostic::from_message("panic", panic_message(join_error))),
                            }
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        self.session.stop().await?;

        let available = [Capability::EditServer]
            .into_iter()
            .filter(|c| capabilities.has(*c))
            .collect();
        let report = RunReport::new(started_at, self.config.base_url.clone(), available, reports);
        info!(
            "Run finished: {} passed, {} failed, {} errored, {} skipped",
            report.summary.passed, report.summary.failed, report.summary.errored, report.summary.skipped
        );
        Ok(report)
    }
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    match join_error.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "test case panicked".to_string()),
        Err(join_error) => join_error.to_string(),
    }
}

/// Run one case on its own page. Never fails; every outcome becomes a report.
async fn execute(
    case: TestCase,
    session: Arc<Session>,
    config: Config,
    capabilities: Capabilities,
    edit_server: Option<EditServerClient>,
) -> CaseReport {
    let started_at = Utc::now();
    let started = Instant::now();
    let mut report = CaseReport {
        suite: case.suite.to_string(),
        name: case.name.to_string(),
        status: CaseStatus::Passed,
        started_at,
        duration: Duration::ZERO,
        skip_reason: None,
        diagnostic: None,
    };

    if let Some(missing) = capabilities.missing(case.requires) {
        info!("Skipping {}: {} unavailable", case.id(), missing);
        report.status = CaseStatus::Skipped;
        report.skip_reason = Some(format!("{} unavailable", missing));
        return report;
    }

    let page = match session.new_page().await {
        Ok(page) => page,
        Err(e) => {
            warn!("Could not open a page for {}: {}", case.id(), e);
            report.status = CaseStatus::Errored;
            report.diagnostic = Some(Diagnostic::from(&e));
            report.duration = started.elapsed();
            return report;
        }
    };

    debug!("Running {} on page {}", case.id(), page.id());
    let budget = config.case_timeout();
    let artifacts_dir = config.artifacts_dir.clone();
    let mut ctx = CaseContext::new(page, config, capabilities, edit_server);

    let outcome = match tokio::time::timeout(budget, (case.run)(&mut ctx)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(Error::timeout(format!("test case {}", case.id()), budget)),
    };
    let page = ctx.into_page();

    if let Err(e) = outcome {
        report.status = CaseStatus::for_error(&e);
        let mut diagnostic = Diagnostic::from(&e);
        if let Some(dir) = artifacts_dir {
            diagnostic.screenshot = capture_failure(&page, &dir, &case).await;
        }
        info!("{} {:?}: {}", case.id(), report.status, e);
        report.diagnostic = Some(diagnostic);
    } else {
        info!("{} passed", case.id());
    }

    if let Err(e) = page.close().await {
        warn!("Failed to close page for {}: {}", case.id(), e);
    }

    report.duration = started.elapsed();
    report
}

async fn capture_failure(page: &Page, dir: &Path, case: &TestCase) -> Option<PathBuf> {
    let path = dir.join(format!("{}-{}.png", case.suite, case.name));
    let result: Result<()> = async {
        let png = page.screenshot().await?;
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, png).await?;
        Ok(())
    }
    .await;

    match result {
        Ok(()) => Some(path),
        Err(e) => {
            warn!("Failed to capture screenshot for {}: {}", case.id(), e);
            None
        }
    }
}
