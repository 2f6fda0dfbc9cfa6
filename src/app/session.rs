//! 会话管理
//!
//! 只读模式下本地生成伪 id 并立即就绪；否则注册认证状态监听，
//! 由单个任务按顺序处理通知：无会话时用一次性令牌或匿名方式登录，
//! 有会话时沿用其 uid。无论成功失败，处理完通知后都标记为就绪。

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    core::error::CoreError,
    infrastructure::backend::{AuthProvider, AuthUser, Subscription},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub user_id: Option<String>,
    pub is_auth_ready: bool,
    pub error: Option<CoreError>,
}

pub struct SessionManager {
    state: Arc<watch::Sender<SessionState>>,
    listener: Mutex<Option<Subscription>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// 只读模式：不联系任何协作方
    pub fn read_only() -> Self {
        let user_id = format!("local-{}", Uuid::new_v4().simple());
        debug!(user_id = %user_id, "read-only session");
        let (sender, _) = watch::channel(SessionState {
            user_id: Some(user_id),
            is_auth_ready: true,
            error: None,
        });
        Self {
            state: Arc::new(sender),
            listener: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// 注册认证状态监听并启动处理任务，需在 tokio 运行时内调用
    pub fn start(auth: Arc<dyn AuthProvider>, initial_auth_token: Option<String>) -> Self {
        let (sender, _) = watch::channel(SessionState::default());
        let state = Arc::new(sender);
        let (events, mut received) = mpsc::unbounded_channel::<Option<AuthUser>>();

        let listener = auth.on_auth_state_changed(Box::new(move |user| {
            let _ = events.send(user);
        }));

        let published = Arc::clone(&state);
        let worker = tokio::spawn(async move {
            while let Some(user) = received.recv().await {
                match user {
                    Some(user) => {
                        debug!(uid = %user.uid, anonymous = user.is_anonymous, "session present");
                        update(&published, |s| {
                            s.user_id = Some(user.uid);
                            s.is_auth_ready = true;
                        });
                    }
                    None => {
                        let outcome = match initial_auth_token.as_deref() {
                            Some(token) => auth.sign_in_with_custom_token(token).await,
                            None => auth.sign_in_anonymously().await,
                        };
                        match outcome {
                            Ok(user) => {
                                info!(uid = %user.uid, "signed in");
                                update(&published, |s| {
                                    s.user_id = Some(user.uid);
                                    s.is_auth_ready = true;
                                });
                            }
                            Err(err) => {
                                warn!(error = %err, "sign-in failed");
                                update(&published, |s| {
                                    s.error = Some(CoreError::Auth(err));
                                    s.is_auth_ready = true;
                                });
                            }
                        }
                    }
                }
            }
        });

        Self {
            state,
            listener: Mutex::new(Some(listener)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// 释放认证监听并停止处理任务，可重复调用
    pub fn shutdown(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.unsubscribe();
        }
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn update(sender: &watch::Sender<SessionState>, apply: impl FnOnce(&mut SessionState)) {
    sender.send_if_modified(|state| {
        let before = state.clone();
        apply(state);
        *state != before
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{
        backend::AuthError,
        memory::{AccessRules, MemoryBackend},
    };
    use std::time::Duration;

    async fn settled(session: &SessionManager) -> SessionState {
        let mut changes = session.watch();
        let state = tokio::time::timeout(
            Duration::from_secs(2),
            changes.wait_for(|s| s.is_auth_ready && (s.user_id.is_some() || s.error.is_some())),
        )
        .await
        .expect("session never settled")
        .expect("session channel closed")
        .clone();
        state
    }

    #[test]
    fn test_read_only_session_is_ready() {
        let session = SessionManager::read_only();
        let state = session.state();
        assert!(state.is_auth_ready);
        assert!(state.user_id.unwrap().starts_with("local-"));
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_anonymous_sign_in() {
        let backend = MemoryBackend::new("demo");
        let session = SessionManager::start(Arc::new(backend.clone()), None);

        let state = settled(&session).await;
        assert_eq!(state.user_id, backend.current_user().map(|u| u.uid));
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_custom_token_sign_in() {
        let backend = MemoryBackend::new("demo");
        let token = backend.issue_custom_token("manager-7");
        let session = SessionManager::start(Arc::new(backend.clone()), Some(token));

        let state = settled(&session).await;
        assert_eq!(state.user_id.as_deref(), Some("manager-7"));
    }

    #[tokio::test]
    async fn test_existing_session_is_reused() {
        let backend = MemoryBackend::new("demo");
        let existing = backend.sign_in_anonymously().await.unwrap();

        let session = SessionManager::start(Arc::new(backend.clone()), None);
        let state = settled(&session).await;
        assert_eq!(state.user_id, Some(existing.uid));
    }

    #[tokio::test]
    async fn test_failed_sign_in_still_becomes_ready() {
        let backend = MemoryBackend::new("demo");
        let session =
            SessionManager::start(Arc::new(backend.clone()), Some("bogus-token".to_string()));

        let state = settled(&session).await;
        assert!(state.is_auth_ready);
        assert_eq!(
            state.error,
            Some(CoreError::Auth(AuthError::InvalidCustomToken))
        );
        assert!(state.user_id.is_none());
    }

    #[tokio::test]
    async fn test_disabled_anonymous_sign_in() {
        let backend = MemoryBackend::new("demo").with_rules(AccessRules {
            allow_anonymous: false,
            ..AccessRules::default()
        });
        let session = SessionManager::start(Arc::new(backend), None);
        let state = settled(&session).await;
        assert_eq!(
            state.error,
            Some(CoreError::Auth(AuthError::OperationNotAllowed))
        );
    }

    #[tokio::test]
    async fn test_shutdown_releases_listener() {
        let backend = MemoryBackend::new("demo");
        let session = SessionManager::start(Arc::new(backend.clone()), None);
        assert_eq!(backend.auth_listener_count(), 1);
        session.shutdown();
        assert_eq!(backend.auth_listener_count(), 0);
        session.shutdown();
    }
}
