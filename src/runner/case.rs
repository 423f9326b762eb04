//! Test case definition and per-case context

use futures::future::BoxFuture;
use std::fmt;

use crate::config::Config;
use crate::page::{NavigationResponse, Page};
use crate::probe::{Capabilities, Capability, EditServerClient};
use crate::{Error, Result};

/// Body of a test case. The returned future borrows the context.
pub type CaseFn = for<'a> fn(&'a mut CaseContext) -> BoxFuture<'a, Result<()>>;

/// One named, linear sequence of navigate / interact / observe / assert steps
#[derive(Clone, Copy)]
pub struct TestCase {
    pub suite: &'static str,
    pub name: &'static str,
    /// Optional dependencies; a case whose requirement is missing is skipped
    pub requires: &'static [Capability],
    pub run: CaseFn,
}

impl TestCase {
    pub const fn new(suite: &'static str, name: &'static str, run: CaseFn) -> Self {
        Self {
            suite,
            name,
            requires: &[],
            run,
        }
    }

    pub const fn requiring(mut self, requires: &'static [Capability]) -> Self {
        self.requires = requires;
        self
    }

    /// `suite::name`, the string filters match against
    pub fn id(&self) -> String {
        format!("{}::{}", self.suite, self.name)
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("suite", &self.suite)
            .field("name", &self.name)
            .field("requires", &self.requires)
            .finish()
    }
}

/// Everything a running case may touch. The page is exclusively its own.
#[derive(Debug)]
pub struct CaseContext {
    pub page: Page,
    pub config: Config,
    pub capabilities: Capabilities,
    edit_server: Option<EditServerClient>,
}

impl CaseContext {
    pub(crate) fn new(
        page: Page,
        config: Config,
        capabilities: Capabilities,
        edit_server: Option<EditServerClient>,
    ) -> Self {
        Self {
            page,
            config,
            capabilities,
            edit_server,
        }
    }

    pub(crate) fn into_page(self) -> Page {
        self.page
    }

    /// Absolute URL of a site path
    pub fn url(&self, path: &str) -> String {
        self.config.site_url(path)
    }

    /// Navigate to a site path, requiring a 2xx response
    pub async fn open(&self, path: &str) -> Result<NavigationResponse> {
        self.page.goto_ok(&self.url(path)).await
    }

    /// Client for the edit server; only present when it was reachable at probe time
    pub fn edit_server(&self) -> Result<&EditServerClient> {
        self.edit_server
            .as_ref()
            .ok_or_else(|| Error::configuration("Edit server is not available in this run"))
    }
}
