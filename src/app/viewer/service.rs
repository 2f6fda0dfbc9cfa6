//! 菜单展示页业务服务

use tracing::{info, warn};

use super::model::MenuView;
use crate::{
    app::{
        presentation::{group_by_category, PhaseInputs, UiPhase},
        screen::ScreenRuntime,
    },
    core::error::CoreError,
    infrastructure::{
        backend::{ClientContext, CollectionPath, Query},
        config::ResolvedConfig,
    },
};

pub struct ViewerScreen {
    runtime: ScreenRuntime,
    app_id: String,
    is_fallback: bool,
}

impl ViewerScreen {
    /// 挂载菜单页。只读模式下不建立会话和订阅。
    pub fn mount(config: &ResolvedConfig, context: Option<ClientContext>) -> Self {
        let query = Self::query(&config.app_id);

        let (runtime, is_fallback) = match context {
            Some(context) if !config.is_fallback => (
                ScreenRuntime::mount(
                    "viewer",
                    &context,
                    query,
                    config.initial_auth_token.clone(),
                ),
                false,
            ),
            Some(_) => {
                warn!("ignoring client context while in read-only fallback mode");
                (ScreenRuntime::detached("viewer"), true)
            }
            None => (ScreenRuntime::detached("viewer"), true),
        };
        if is_fallback {
            info!(app_id = %config.app_id, "menu running in read-only fallback mode");
        }

        Self {
            runtime,
            app_id: config.app_id.clone(),
            is_fallback,
        }
    }

    /// 只查询可售产品，排序在客户端完成
    pub fn query(app_id: &str) -> Query {
        Query::collection(CollectionPath::products(app_id)).where_eq("available", true)
    }

    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    /// 需要整屏显示的错误；只读模式下订阅错误不会出现
    pub fn fatal_error(&self) -> Option<CoreError> {
        if self.is_fallback {
            return None;
        }
        self.runtime
            .session()
            .error
            .or_else(|| self.runtime.feed().error)
    }

    pub fn view(&self) -> MenuView {
        let session = self.runtime.session();
        let feed = self.runtime.feed();
        let error = self.fatal_error();

        let phase = UiPhase::derive(&PhaseInputs {
            is_auth_ready: session.is_auth_ready,
            is_loading: feed.is_loading,
            error: error.as_ref(),
            is_fallback: self.is_fallback,
            product_count: feed.products.len(),
        });
        let sections = match phase {
            UiPhase::Populated { .. } => group_by_category(&feed.products),
            _ => Vec::new(),
        };

        MenuView {
            phase,
            sections,
            app_id: self.app_id.clone(),
            user_id: session.user_id,
            is_fallback: self.is_fallback,
        }
    }

    pub fn unmount(&self) {
        self.runtime.unmount();
    }
}
