//! # 站点测试套件
//!
//! 针对 Lalita Sahasranama 网站的端到端用例。
//!
//! ## 主要功能
//! - **navigation**: URL 结构、页面跳转、键盘导航、数据加载与缓存参数
//! - **styling**: 计算样式、悬停过渡、响应式布局
//! - **editing**: 内联编辑界面，仅在编辑服务器可用时运行
//!
//! ## 核心概念
//! - 每个用例都是线性的步骤序列：导航、交互、等待、观察、断言
//! - 断言失败立即结束用例，不做重试；只有等待操作会轮询
//! - 依赖编辑服务器的用例声明 `Capability::EditServer`，不可用时跳过
//!
//! ## 使用示例
//! ```rust
//! use naamani_e2e::suites;
//!
//! let cases = suites::all();
//! assert!(cases.iter().any(|c| c.suite == "editing"));
//! ```

pub mod editing;
pub mod navigation;
pub mod styling;

use crate::runner::TestCase;

/// Every case of every suite, in declaration order
pub fn all() -> Vec<TestCase> {
    let mut cases = navigation::cases();
    cases.extend(styling::cases());
    cases.extend(editing::cases());
    cases
}
