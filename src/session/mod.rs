//! # 会话管理层
//!
//! 管理浏览器进程的生命周期：一次运行一个浏览器，每个测试用例一个独立页面。
//!
//! ## 主要功能
//! - **浏览器启动**: 查找 Chrome 可执行文件，使用临时用户目录启动并读取调试端口
//! - **附加模式**: 配置 `cdp_endpoint` 时连接已运行的浏览器，不启动进程
//! - **页面创建**: 每个页面位于独立的浏览器上下文中，可并发创建和销毁
//! - **资源回收**: 子进程随句柄释放而终止，临时目录随之删除
//!
//! ## 核心概念
//! - **Session**: 状态机 未初始化 → 运行中 → 已关闭，关闭后不可重启
//! - **BrowserLauncher**: 启动策略接口，真实实现为 `ChromeLauncher`
//!
//! ## 模块结构
//! - `launcher`: Chrome 查找、启动和 DevTools 端点发现
//! - `manager`: 会话状态机与页面创建
//! - `mock`: 用于测试的 Mock 启动器
//!
//! ## 使用示例
//! ```rust,no_run
//! use naamani_e2e::config::Config;
//! use naamani_e2e::session::Session;
//!
//! # async fn example() -> naamani_e2e::Result<()> {
//! let session = Session::new(Config::from_env()?);
//! session.start().await?;
//!
//! let version = session.version().await?;
//! println!("Browser: {}", version.product);
//!
//! let page = session.new_page().await?;
//! page.close().await?;
//! session.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod launcher;
pub mod manager;
pub mod mock;

#[cfg(test)]
pub mod tests;

pub use launcher::{BrowserLauncher, ChromeLauncher, ChromeProcess, LaunchedBrowser};
pub use manager::{Session, SessionState};
pub use mock::MockLauncher;
