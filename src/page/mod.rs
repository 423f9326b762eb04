//! # 页面层
//!
//! 单个测试用例独占的页面（标签页），提供导航、观察、交互和事件订阅。
//!
//! ## 主要功能
//! - **导航驱动**: `goto` 等待文档加载完成并返回状态码和最终 URL
//! - **条件等待**: URL 模式、选择器出现、类名变化、计算样式变化
//! - **观察层**: 文本、属性、可见性、禁用状态、计算样式快照
//! - **交互层**: 点击、悬停、填写、按键、视口尺寸
//! - **事件订阅**: 控制台和网络事件，生命周期不超过页面本身
//!
//! ## 核心概念
//! - **Page**: 在独立浏览器上下文中创建，用例结束时销毁
//! - **Locator**: 延迟解析的元素引用，每次操作都重新解析
//! - **Deadline**: 用例内所有等待共享的时间预算
//!
//! ## 模块结构
//! - `dom`: 页面内执行的元素解析脚本与请求类型
//! - `locator`: 定位器与选择器解析
//! - `navigation`: 导航和 URL 等待
//! - `observe`: 只读观察操作
//! - `style`: 计算样式快照
//! - `interact`: 用户输入模拟
//! - `events`: 页面事件订阅
//! - `wait`: 时间预算与轮询
//!
//! ## 使用示例
//! ```rust,no_run
//! use naamani_e2e::{config::Config, session::Session, page::UrlPattern};
//! use std::time::Duration;
//!
//! # async fn example() -> naamani_e2e::Result<()> {
//! let session = Session::new(Config::default());
//! session.start().await?;
//!
//! let page = session.new_page().await?;
//! page.goto("http://localhost:8000/naamani/1/").await?;
//! page.locator("#nextBtn").click().await?;
//! page.wait_for_url(&UrlPattern::glob("**/naamani/2/**")?, Duration::from_secs(5)).await?;
//!
//! page.close().await?;
//! session.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod dom;
pub mod events;
pub mod interact;
pub mod locator;
pub mod navigation;
pub mod observe;
pub mod style;
pub mod wait;


use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::cdp::{CdpBrowser, CdpClient, TargetHandle};
use crate::config::Config;
use crate::{Error, Result};

use dom::{DomOp, DomReply, DomRequest, Target};

pub use events::{PageEvent, PageEventSubscription};
pub use locator::Locator;
pub use navigation::{NavigationResponse, UrlPattern};
pub use style::ComputedStyleSnapshot;
pub use wait::Deadline;

/// A single-owner browser tab in its own browser context
#[derive(Debug)]
pub struct Page {
    id: String,
    target: TargetHandle,
    client: Arc<dyn CdpClient>,
    browser: Arc<dyn CdpBrowser>,
    config: Arc<Config>,
    deadline: Deadline,
    session_alive: Arc<AtomicBool>,
    /// Serialises operations so they run in issue order
    op_lock: Mutex<()>,
    closed: bool,
}

impl Page {
    /// Create an isolated target, connect to it and prepare its domains
    pub(crate) async fn open(
        browser: Arc<dyn CdpBrowser>,
        config: Arc<Config>,
        session_alive: Arc<AtomicBool>,
    ) -> Result<Self> {
        let target = browser.create_target(true).await?;

        let client = match browser.create_client(&target).await {
            Ok(client) => client,
            Err(e) => {
                if let Err(close_err) = browser.close_target(&target).await {
                    warn!("Failed to close target {} after connect error: {}", target.target_id, close_err);
                }
                return Err(e);
            }
        };

        let page = Self {
            id: uuid::Uuid::new_v4().to_string(),
            target,
            client,
            browser,
            deadline: Deadline::new(config.case_timeout()),
            config,
            session_alive,
            op_lock: Mutex::new(()),
            closed: false,
        };

        // On failure `page` drops here and schedules its own close
        page.client.enable_domain("Page").await?;
        page.client.enable_domain("Runtime").await?;
        page.client.enable_domain("Network").await?;
        page.client
            .set_viewport(page.config.viewport_width, page.config.viewport_height)
            .await?;

        Ok(page)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target(&self) -> &TargetHandle {
        &self.target
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Budget shared by every wait on this page
    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    pub(crate) fn client(&self) -> &Arc<dyn CdpClient> {
        &self.client
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.config.poll_interval()
    }

    pub(crate) fn ensure_alive(&self) -> Result<()> {
        if !self.session_alive.load(Ordering::SeqCst) {
            return Err(Error::session_closed("Session stopped while page was in use"));
        }
        Ok(())
    }

    pub(crate) async fn exclusive(&self) -> Result<MutexGuard<'_, ()>> {
        self.ensure_alive()?;
        Ok(self.op_lock.lock().await)
    }

    /// Deferred reference to elements matching `selector`
    pub fn locator(&self, selector: &str) -> Locator<'_> {
        Locator::new(self, selector)
    }

    /// Run one page-side element request. Callers hold the operation lock.
    pub(crate) async fn dom_unlocked(&self, op: DomOp, target: Option<&Target>) -> Result<DomReply> {
        let request = DomRequest {
            op,
            target: target.cloned(),
        };
        let value = self
            .client
            .evaluate(&dom::expression(&request)?, false)
            .await?
            .into_value();
        Ok(serde_json::from_value(value)?)
    }

    pub(crate) async fn dom(&self, op: DomOp, target: Option<&Target>) -> Result<DomReply> {
        let _guard = self.exclusive().await?;
        self.dom_unlocked(op, target).await
    }

    /// Evaluate an arbitrary expression and return its JSON value
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let _guard = self.exclusive().await?;
        Ok(self.client.evaluate(expression, true).await?.into_value())
    }

    /// PNG screenshot of the viewport
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let _guard = self.exclusive().await?;
        self.client.screenshot().await
    }

    /// Close the target and dispose its browser context
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        debug!("Closing page {}", self.id);
        let _ = self.client.connection().close().await;
        self.browser.close_target(&self.target).await
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if self.closed || !self.session_alive.load(Ordering::SeqCst) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("Page {} dropped outside a runtime; target left open", self.id);
            return;
        };

        let browser = Arc::clone(&self.browser);
        let client = Arc::clone(&self.client);
        let target = self.target.clone();
        handle.spawn(async move {
            let _ = client.connection().close().await;
            if let Err(e) = browser.close_target(&target).await {
                warn!("Deferred close of target {} failed: {}", target.target_id, e);
            }
        });
    }
}
