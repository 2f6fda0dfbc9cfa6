//! # 数字菜单
//!
//! 两个界面共用一套实时文档存储与认证协作方：
//! - 菜单展示页：只读，按分类展示可售产品，缺少凭据时降级为只读预览
//! - 管理面板：查看全部产品并通过表单新增
//!
//! 协作方通过 [`infrastructure::backend`] 中的 trait 注入，
//! [`infrastructure::memory::MemoryBackend`] 是进程内实现。

pub mod app;
pub mod core;
pub mod infrastructure;

pub use app::{admin::AdminScreen, router, viewer::ViewerScreen, Screens};
pub use infrastructure::{
    backend::ClientContext,
    config::{ResolvedConfig, ServerConfig},
    memory::MemoryBackend,
};
