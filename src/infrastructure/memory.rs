//! 内存后端
//!
//! 进程内的文档存储与认证服务模拟器，实现 [`DocumentStore`] 与 [`AuthProvider`]。
//! 所有监听回调都在后端锁内按提交顺序投递，回调中不得再调用后端。

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backend::{
    AuthError, AuthListener, AuthProvider, AuthUser, ClientContext, CollectionPath, DocumentData,
    DocumentSnapshot, DocumentStore, Query, QuerySnapshot, ServerTimestamp, SnapshotListener,
    StoreError, Subscription, Timestamp,
};

/// 访问规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRules {
    pub allow_reads: bool,
    /// 写入还要求存在已登录会话
    pub allow_writes: bool,
    pub allow_anonymous: bool,
}

impl Default for AccessRules {
    fn default() -> Self {
        Self {
            allow_reads: true,
            allow_writes: true,
            allow_anonymous: true,
        }
    }
}

struct SnapshotEntry {
    query: Query,
    listener: SnapshotListener,
}

#[derive(Default)]
struct BackendState {
    collections: HashMap<CollectionPath, Vec<DocumentSnapshot>>,
    snapshot_listeners: HashMap<u64, SnapshotEntry>,
    auth_listeners: HashMap<u64, AuthListener>,
    current_user: Option<AuthUser>,
    custom_tokens: HashMap<String, String>,
    rules: AccessRules,
    last_commit: Option<Timestamp>,
    next_listener_id: u64,
}

impl BackendState {
    fn next_id(&mut self) -> u64 {
        self.next_listener_id += 1;
        self.next_listener_id
    }

    /// 提交时间严格递增
    fn commit_time(&mut self) -> Timestamp {
        let mut now = Timestamp::now();
        if let Some(last) = self.last_commit {
            if now <= last {
                now = last
                    .to_datetime()
                    .map(|at| Timestamp::from_datetime(at + Duration::nanoseconds(1)))
                    .unwrap_or(last);
            }
        }
        self.last_commit = Some(now);
        now
    }

    fn snapshot_for(&self, query: &Query) -> QuerySnapshot {
        let docs = self
            .collections
            .get(&query.path)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| query.matches(&doc.data))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        QuerySnapshot { docs }
    }

    fn notify_collection(&self, path: &CollectionPath) {
        for entry in self.snapshot_listeners.values() {
            if &entry.query.path == path {
                (entry.listener)(Ok(self.snapshot_for(&entry.query)));
            }
        }
    }

    fn notify_auth(&self) {
        for listener in self.auth_listeners.values() {
            listener(self.current_user.clone());
        }
    }

    fn insert(&mut self, path: &CollectionPath, mut data: DocumentData) -> String {
        let committed_at = self.commit_time();
        for value in data.values_mut() {
            if ServerTimestamp::is_sentinel(value) {
                *value = timestamp_value(committed_at);
            }
        }
        let id = document_id();
        self.collections
            .entry(path.clone())
            .or_default()
            .push(DocumentSnapshot {
                id: id.clone(),
                data,
            });
        self.notify_collection(path);
        id
    }
}

/// 进程内后端，克隆后共享同一份数据
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<BackendState>>,
}

impl MemoryBackend {
    pub fn new(project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        info!(project_id = %project_id, "starting in-memory backend");
        Self {
            inner: Arc::new(Mutex::new(BackendState::default())),
        }
    }

    pub fn with_rules(self, rules: AccessRules) -> Self {
        self.set_rules(rules);
        self
    }

    pub fn set_rules(&self, rules: AccessRules) {
        self.inner.lock().rules = rules;
    }

    /// 为某个 uid 签发自定义令牌，有效期内可重复登录
    pub fn issue_custom_token(&self, uid: impl Into<String>) -> String {
        let token = format!("ct-{}", Uuid::new_v4().simple());
        self.accept_custom_token(token.clone(), uid);
        token
    }

    /// 登记外部签发的令牌，例如启动时从环境注入的令牌
    pub fn accept_custom_token(&self, token: impl Into<String>, uid: impl Into<String>) {
        let uid = uid.into();
        debug!(uid = %uid, "custom token accepted");
        self.inner.lock().custom_tokens.insert(token.into(), uid);
    }

    /// 吊销令牌，之后的登录都会失败
    pub fn revoke_custom_token(&self, token: &str) -> bool {
        self.inner.lock().custom_tokens.remove(token).is_some()
    }

    /// 绕过访问规则直接写入，用于准备数据
    pub fn insert_document(&self, path: &CollectionPath, data: DocumentData) -> String {
        self.inner.lock().insert(path, data)
    }

    pub fn documents(&self, path: &CollectionPath) -> Vec<DocumentSnapshot> {
        self.inner
            .lock()
            .collections
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.inner.lock().current_user.clone()
    }

    pub fn snapshot_listener_count(&self) -> usize {
        self.inner.lock().snapshot_listeners.len()
    }

    pub fn auth_listener_count(&self) -> usize {
        self.inner.lock().auth_listeners.len()
    }

    /// 为一个界面实例创建客户端上下文
    pub fn client(&self) -> ClientContext {
        let shared = Arc::new(self.clone());
        ClientContext::new(shared.clone(), shared)
    }

    fn sign_in(&self, user: AuthUser) -> AuthUser {
        let mut state = self.inner.lock();
        state.current_user = Some(user.clone());
        state.notify_auth();
        user
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    fn on_snapshot(&self, query: Query, listener: SnapshotListener) -> Subscription {
        let mut state = self.inner.lock();
        if !state.rules.allow_reads {
            warn!(path = %query.path, "live query rejected by access rules");
            listener(Err(StoreError::PermissionDenied));
            return Subscription::noop();
        }

        listener(Ok(state.snapshot_for(&query)));

        let id = state.next_id();
        debug!(listener_id = id, path = %query.path, "snapshot listener registered");
        state
            .snapshot_listeners
            .insert(id, SnapshotEntry { query, listener });

        let weak: Weak<Mutex<BackendState>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().snapshot_listeners.remove(&id);
                debug!(listener_id = id, "snapshot listener released");
            }
        })
    }

    async fn add_document(
        &self,
        path: &CollectionPath,
        data: DocumentData,
    ) -> Result<String, StoreError> {
        let mut state = self.inner.lock();
        if !state.rules.allow_writes || state.current_user.is_none() {
            warn!(path = %path, "write rejected by access rules");
            return Err(StoreError::PermissionDenied);
        }
        let id = state.insert(path, data);
        debug!(path = %path, id = %id, "document created");
        Ok(id)
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    fn on_auth_state_changed(&self, listener: AuthListener) -> Subscription {
        let mut state = self.inner.lock();
        listener(state.current_user.clone());

        let id = state.next_id();
        state.auth_listeners.insert(id, listener);

        let weak: Weak<Mutex<BackendState>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().auth_listeners.remove(&id);
            }
        })
    }

    async fn sign_in_anonymously(&self) -> Result<AuthUser, AuthError> {
        if !self.inner.lock().rules.allow_anonymous {
            return Err(AuthError::OperationNotAllowed);
        }
        let user = AuthUser {
            uid: Uuid::new_v4().simple().to_string(),
            is_anonymous: true,
        };
        info!(uid = %user.uid, "anonymous sign-in");
        Ok(self.sign_in(user))
    }

    async fn sign_in_with_custom_token(&self, token: &str) -> Result<AuthUser, AuthError> {
        let uid = self
            .inner
            .lock()
            .custom_tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidCustomToken)?;
        info!(uid = %uid, "custom token sign-in");
        Ok(self.sign_in(AuthUser {
            uid,
            is_anonymous: false,
        }))
    }
}

fn document_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(20).collect()
}

fn timestamp_value(at: Timestamp) -> Value {
    serde_json::to_value(at).unwrap_or_else(|_| Value::from(Utc::now().timestamp()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn data(value: Value) -> DocumentData {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_live_query_receives_filtered_snapshots() {
        let backend = MemoryBackend::new("demo");
        let path = CollectionPath::products("demo");
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&received);
        let subscription = backend.on_snapshot(
            Query::collection(path.clone()).where_eq("available", true),
            Box::new(move |result| {
                sink.lock().push(result.unwrap().docs.len());
            }),
        );

        backend.insert_document(&path, data(json!({"name": "Soup", "available": true})));
        backend.insert_document(&path, data(json!({"name": "Old", "available": false})));

        assert_eq!(*received.lock(), vec![0, 1, 1]);

        subscription.unsubscribe();
        assert_eq!(backend.snapshot_listener_count(), 0);
        backend.insert_document(&path, data(json!({"name": "Tea", "available": true})));
        assert_eq!(received.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_write_requires_session() {
        let backend = MemoryBackend::new("demo");
        let path = CollectionPath::products("demo");
        let result = backend.add_document(&path, data(json!({"name": "Tea"}))).await;
        assert_eq!(result, Err(StoreError::PermissionDenied));

        backend.sign_in_anonymously().await.unwrap();
        let id = backend
            .add_document(&path, data(json!({"name": "Tea", "createdAt": ServerTimestamp})))
            .await
            .unwrap();

        let docs = backend.documents(&path);
        assert_eq!(docs[0].id, id);
        let created_at: Timestamp =
            serde_json::from_value(docs[0].data["createdAt"].clone()).unwrap();
        assert!(created_at.seconds > 0);
    }

    #[tokio::test]
    async fn test_commit_times_increase() {
        let backend = MemoryBackend::new("demo");
        let path = CollectionPath::products("demo");
        for _ in 0..3 {
            backend.insert_document(&path, data(json!({"createdAt": ServerTimestamp})));
        }
        let times: Vec<Timestamp> = backend
            .documents(&path)
            .iter()
            .map(|doc| serde_json::from_value(doc.data["createdAt"].clone()).unwrap())
            .collect();
        assert!(times.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_auth_listener_and_custom_token() {
        let backend = MemoryBackend::new("demo");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _subscription = backend.on_auth_state_changed(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let token = backend.issue_custom_token("chef");
        let user = backend.sign_in_with_custom_token(&token).await.unwrap();
        assert_eq!(user.uid, "chef");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // 有效期内可重复使用，吊销后失效
        let again = backend.sign_in_with_custom_token(&token).await.unwrap();
        assert_eq!(again.uid, "chef");
        assert!(backend.revoke_custom_token(&token));
        assert_eq!(
            backend.sign_in_with_custom_token(&token).await,
            Err(AuthError::InvalidCustomToken)
        );
        assert_eq!(
            backend.sign_in_with_custom_token("ct-unknown").await,
            Err(AuthError::InvalidCustomToken)
        );
    }

    #[tokio::test]
    async fn test_accepts_externally_issued_token() {
        let backend = MemoryBackend::new("demo");
        backend.accept_custom_token("env-token", "operator");
        let user = backend.sign_in_with_custom_token("env-token").await.unwrap();
        assert_eq!(user.uid, "operator");
        assert!(!user.is_anonymous);
        assert_eq!(backend.current_user(), Some(user));
    }

    #[tokio::test]
    async fn test_denied_reads_report_error() {
        let backend = MemoryBackend::new("demo").with_rules(AccessRules {
            allow_reads: false,
            ..AccessRules::default()
        });
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        let _subscription = backend.on_snapshot(
            Query::collection(CollectionPath::products("demo")),
            Box::new(move |result| {
                if result.is_err() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(backend.snapshot_listener_count(), 0);
    }
}
