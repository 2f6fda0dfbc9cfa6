//! 基础设施层：配置、日志与后端协作方

pub mod backend;
pub mod config;
pub mod logger;
pub mod memory;
