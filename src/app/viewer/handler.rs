//! 菜单展示页处理器

use std::sync::Arc;

use axum::{
    extract::State,
    response::{Html, Json},
    routing::get,
    Router,
};

use super::{model::MenuView, service::ViewerScreen, view::render_menu};
use crate::core::{error::CoreError, response::ApiResponse};

#[derive(Clone)]
pub struct AppState {
    pub screen: Arc<ViewerScreen>,
    pub admin_url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(menu_page))
        .route("/api/products", get(list_products))
        .with_state(state)
}

pub async fn menu_page(State(state): State<AppState>) -> Html<String> {
    let view = state.screen.view();
    Html(render_menu(&view, &state.admin_url))
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MenuView>>, CoreError> {
    if let Some(err) = state.screen.fatal_error() {
        return Err(err);
    }
    let view = state.screen.view();
    let message = if view.is_fallback {
        "read-only fallback mode"
    } else {
        "ok"
    };
    Ok(Json(ApiResponse::with_message(view, message)))
}
