//! 管理面板业务服务
//!
//! 与菜单页共用同一套会话和订阅运行时，但不过滤可售状态，
//! 并负责新产品的校验与提交。同一时刻最多一个提交在进行。

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use validator::Validate;

use super::model::{AdminView, FormState, ProductCandidate, ProductForm, SubmitOutcome};
use crate::{
    app::{
        presentation::{PhaseInputs, UiPhase},
        screen::ScreenRuntime,
    },
    core::error::CoreError,
    infrastructure::{
        backend::{ClientContext, CollectionPath, DocumentStore, Query, StoreError},
        config::ResolvedConfig,
    },
};

pub struct AdminScreen {
    runtime: ScreenRuntime,
    store: Option<Arc<dyn DocumentStore>>,
    path: CollectionPath,
    app_id: String,
    config_error: Option<CoreError>,
    form: Mutex<FormState>,
}

impl AdminScreen {
    /// 挂载管理面板。缺少后端配置时直接进入致命错误状态。
    pub fn mount(config: &ResolvedConfig, context: Option<ClientContext>) -> Self {
        let path = CollectionPath::products(&config.app_id);

        let (runtime, store, config_error) = match (config.require_backend(), context) {
            (Ok(_), Some(context)) => {
                let runtime = ScreenRuntime::mount(
                    "admin",
                    &context,
                    Query::collection(path.clone()),
                    config.initial_auth_token.clone(),
                );
                (runtime, Some(Arc::clone(&context.store)), None)
            }
            (Ok(_), None) => (
                ScreenRuntime::detached("admin"),
                None,
                Some(CoreError::Config("no backend client available".to_string())),
            ),
            (Err(err), _) => {
                warn!(error = %err, "admin panel cannot start without backend credentials");
                (ScreenRuntime::detached("admin"), None, Some(err))
            }
        };

        Self {
            runtime,
            store,
            path,
            app_id: config.app_id.clone(),
            config_error,
            form: Mutex::new(FormState::default()),
        }
    }

    /// 配置、认证、订阅三类错误，按此顺序取第一个
    pub fn fatal_error(&self) -> Option<CoreError> {
        self.config_error
            .clone()
            .or_else(|| self.runtime.session().error)
            .or_else(|| self.runtime.feed().error)
    }

    pub fn form(&self) -> FormState {
        self.form.lock().clone()
    }

    pub fn view(&self) -> AdminView {
        let session = self.runtime.session();
        let feed = self.runtime.feed();
        let error = self.fatal_error();

        let phase = UiPhase::derive(&PhaseInputs {
            is_auth_ready: session.is_auth_ready,
            is_loading: feed.is_loading,
            error: error.as_ref(),
            is_fallback: false,
            product_count: feed.products.len(),
        });
        let products = match phase {
            UiPhase::Populated { .. } => feed.products,
            _ => Vec::new(),
        };

        AdminView {
            phase,
            products,
            form: self.form(),
            user_id: session.user_id,
            app_id: self.app_id.clone(),
        }
    }

    /// 校验并提交一个新产品。
    ///
    /// 成功后表单恢复默认值；失败时保留输入并记录错误。
    /// 新产品只会通过下一次实时查询事件出现在列表中。
    pub async fn submit(&self, values: ProductForm) -> SubmitOutcome {
        let store = match (&self.store, self.fatal_error()) {
            (_, Some(err)) => return SubmitOutcome::Failed(err),
            (None, None) => {
                return SubmitOutcome::Failed(CoreError::Config(
                    "no backend client available".to_string(),
                ))
            }
            (Some(store), None) => Arc::clone(store),
        };
        let created_by = self.runtime.session().user_id;

        let document = {
            let mut form = self.form.lock();
            if form.is_submitting {
                debug!("submission already in flight");
                return SubmitOutcome::Busy;
            }
            form.values = values.clone();
            form.error = None;

            let candidate = ProductCandidate::from_form(&values);
            if let Err(err) = candidate.validate() {
                let err = CoreError::from(err);
                form.error = Some(err.to_string());
                return SubmitOutcome::Rejected(err);
            }
            match candidate.into_new_product(created_by).into_document() {
                Ok(document) => {
                    form.is_submitting = true;
                    document
                }
                Err(err) => {
                    let err = CoreError::Submission(StoreError::InvalidArgument(err.to_string()));
                    form.error = Some(err.to_string());
                    return SubmitOutcome::Failed(err);
                }
            }
        };

        let result = store.add_document(&self.path, document).await;

        if !self.runtime.is_mounted() {
            debug!(path = %self.path, ok = result.is_ok(), "discarding submission result after unmount");
            return SubmitOutcome::Discarded;
        }

        let mut form = self.form.lock();
        form.is_submitting = false;
        match result {
            Ok(id) => {
                info!(path = %self.path, id = %id, "product created");
                form.values = ProductForm::default();
                form.last_created = Some(id.clone());
                SubmitOutcome::Created { id }
            }
            Err(err) => {
                let err = CoreError::Submission(err);
                warn!(path = %self.path, error = %err, "product submission failed");
                form.error = Some(err.to_string());
                SubmitOutcome::Failed(err)
            }
        }
    }

    pub fn unmount(&self) {
        self.runtime.unmount();
    }
}
