//! 管理面板：查看全部产品并提交新产品

pub mod handler;
pub mod model;
pub mod service;
pub mod view;

pub use model::{AdminView, ProductForm, SubmitOutcome};
pub use service::AdminScreen;
