//! 应用层：菜单展示页与管理面板
//!
//! 两个界面各自持有客户端上下文、会话和实时查询订阅，互不共享状态。

pub mod admin;
pub mod layout;
pub mod model;
pub mod presentation;
pub mod screen;
pub mod session;
pub mod subscriber;
pub mod viewer;

use std::{sync::Arc, time::Duration};

use axum::{extract::State, http::Method, middleware, response::Json, routing::get, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use self::{admin::AdminScreen, presentation::UiPhase, viewer::ViewerScreen};
use crate::core::{middleware::request_logging_middleware, response::ApiResponse};

pub const MENU_PATH: &str = "/menu";
pub const ADMIN_PATH: &str = "/admin";

/// 组装路由所需的全部输入
#[derive(Clone)]
pub struct Screens {
    pub viewer: Arc<ViewerScreen>,
    pub admin: Arc<AdminScreen>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub viewer: UiPhase,
    pub admin: UiPhase,
    pub menu_products: usize,
    pub is_fallback: bool,
}

pub fn router(screens: Screens, admin_url: &str, timeout: Duration) -> Router {
    let viewer = viewer::handler::router(viewer::handler::AppState {
        screen: Arc::clone(&screens.viewer),
        admin_url: admin_url.to_string(),
    });
    let admin = admin::handler::router(admin::handler::AppState {
        screen: Arc::clone(&screens.admin),
        base_path: ADMIN_PATH.to_string(),
    });

    Router::new()
        .route("/health", get(health))
        .with_state(screens)
        .nest(MENU_PATH, viewer)
        .nest(ADMIN_PATH, admin)
        .layer(
            ServiceBuilder::new()
                .layer(TimeoutLayer::new(timeout))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST])
                        .allow_headers(Any),
                )
                .map_response(axum::response::IntoResponse::into_response)
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware)),
        )
}

async fn health(State(screens): State<Screens>) -> Json<ApiResponse<HealthStatus>> {
    let viewer = screens.viewer.view();
    let admin = screens.admin.view();
    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        is_fallback: viewer.is_fallback,
        menu_products: viewer.product_count(),
        viewer: viewer.phase,
        admin: admin.phase,
    }))
}
