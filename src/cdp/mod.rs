//! # Chrome DevTools Protocol (CDP) 层
//!
//! 提供与 Chrome/Chromium 的 WebSocket 通信接口，是整个验证工具的底层传输。
//!
//! ## 主要功能
//! - **WebSocket 连接管理**: 拆分读写两端，单一读取任务按到达顺序分发消息
//! - **协议通信**: 发送 CDP 命令并按方法类型施加超时
//! - **事件订阅**: 按方法名或域前缀过滤的事件接收器
//! - **目标管理**: 在独立的浏览器上下文中创建和关闭页面
//! - **输入派发**: 原生鼠标、键盘和文本输入
//!
//! ## 模块结构
//! - `traits`: CDP 操作的核心 trait 定义
//! - `types`: CDP 协议相关的数据类型
//! - `connection`: WebSocket 连接实现
//! - `client`: CDP 客户端实现
//! - `browser`: 浏览器级别的操作
//! - `mock`: 用于测试的 Mock 实现
//!
//! ## 使用示例
//! ```rust,no_run
//! use naamani_e2e::cdp::{CdpBrowser, CdpBrowserImpl, CdpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = CdpBrowserImpl::resolve_endpoint(
//!     "http://localhost:9222",
//!     std::time::Duration::from_secs(2),
//! )
//! .await?;
//! let browser = CdpBrowserImpl::connect(endpoint).await?;
//! let target = browser.create_target(true).await?;
//! let client = browser.create_client(&target).await?;
//!
//! let title = client.evaluate("document.title", false).await?;
//! println!("Title: {:?}", title);
//! browser.close_target(&target).await?;
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod types;
pub mod connection;
pub mod client;
pub mod browser;
pub mod mock;

pub use traits::{
    CdpConnection, CdpClient, CdpBrowser, CdpEvent, CdpResponse, CdpError,
    EvaluationResult, EventReceiver, TargetHandle,
};

// Re-export implementation structs
pub use connection::{CdpTimeoutConfig, CdpWebSocketConnection};
pub use client::CdpClientImpl;
pub use browser::CdpBrowserImpl;

// Re-export mock for development/testing
pub use mock::{MockCdpBrowser, MockCdpConnection, MockEvents};
