//! 管理面板处理器

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Serialize;

use super::{
    model::{AdminView, ProductForm, SubmitOutcome},
    service::AdminScreen,
    view::render_admin,
};
use crate::{
    core::{error::CoreError, response::ApiResponse},
    infrastructure::backend::StoreError,
};

#[derive(Clone)]
pub struct AppState {
    pub screen: Arc<AdminScreen>,
    /// 管理面板挂载的路径前缀，如 `/admin`
    pub base_path: String,
}

impl AppState {
    fn form_action(&self) -> String {
        format!("{}/products", self.base_path.trim_end_matches('/'))
    }

    fn page_path(&self) -> &str {
        if self.base_path.is_empty() {
            "/"
        } else {
            &self.base_path
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedProduct {
    pub id: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(admin_page))
        .route("/products", post(submit_form))
        .route("/api/products", get(list_products).post(create_product))
        .with_state(state)
}

pub async fn admin_page(State(state): State<AppState>) -> Html<String> {
    let view = state.screen.view();
    Html(render_admin(&view, &state.form_action()))
}

/// 表单提交：成功后重定向回面板，失败时带内联错误重新渲染
pub async fn submit_form(
    State(state): State<AppState>,
    Form(form): Form<ProductForm>,
) -> Response {
    let status = match state.screen.submit(form).await {
        SubmitOutcome::Created { .. } => {
            return Redirect::to(state.page_path()).into_response();
        }
        SubmitOutcome::Rejected(err) | SubmitOutcome::Failed(err) => err.status(),
        SubmitOutcome::Busy => CoreError::SubmissionInFlight.status(),
        SubmitOutcome::Discarded => StatusCode::SERVICE_UNAVAILABLE,
    };
    let view = state.screen.view();
    (status, Html(render_admin(&view, &state.form_action()))).into_response()
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AdminView>>, CoreError> {
    if let Some(err) = state.screen.fatal_error() {
        return Err(err);
    }
    Ok(Json(ApiResponse::success(state.screen.view())))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(form): Json<ProductForm>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedProduct>>), CoreError> {
    match state.screen.submit(form).await {
        SubmitOutcome::Created { id } => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::with_message(
                CreatedProduct { id },
                "product created",
            )),
        )),
        SubmitOutcome::Rejected(err) | SubmitOutcome::Failed(err) => Err(err),
        SubmitOutcome::Busy => Err(CoreError::SubmissionInFlight),
        SubmitOutcome::Discarded => Err(CoreError::Submission(StoreError::Unavailable(
            "admin panel is shutting down".to_string(),
        ))),
    }
}
