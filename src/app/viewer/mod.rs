//! 菜单展示页：只显示可售产品，按分类分组

pub mod handler;
pub mod model;
pub mod service;
pub mod view;

pub use model::MenuView;
pub use service::ViewerScreen;
