//! 后端协作方契约
//!
//! 文档存储与认证服务都是外部托管服务，这里只定义界面层消费的接口：
//! 实时查询（返回取消订阅句柄）、创建文档、认证状态通知与两种登录方式。

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// 文档字段集合
pub type DocumentData = Map<String, Value>;

/// 服务端时间戳占位符在线上格式中的键名
pub const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

/// 服务端时间戳占位符，写入时由存储方替换为提交时间
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerTimestamp;

impl ServerTimestamp {
    pub fn is_sentinel(value: &Value) -> bool {
        value.get(SERVER_TIMESTAMP_KEY).and_then(Value::as_bool) == Some(true)
    }
}

impl Serialize for ServerTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(SERVER_TIMESTAMP_KEY, &true)?;
        map.end()
    }
}

/// 存储方分配的时间戳
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            seconds: at.timestamp(),
            nanoseconds: at.timestamp_subsec_nanos(),
        }
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanoseconds)
    }
}

/// 集合路径，按租户隔离
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// `artifacts/{app_id}/public/data/products`
    pub fn products(app_id: &str) -> Self {
        Self(format!("artifacts/{app_id}/public/data/products"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 等值过滤条件
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub equals: Value,
}

impl FieldFilter {
    pub fn matches(&self, data: &DocumentData) -> bool {
        data.get(&self.field) == Some(&self.equals)
    }
}

/// 实时查询描述
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub path: CollectionPath,
    pub filter: Option<FieldFilter>,
}

impl Query {
    pub fn collection(path: CollectionPath) -> Self {
        Self { path, filter: None }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(FieldFilter {
            field: field.into(),
            equals: value.into(),
        });
        self
    }

    pub fn matches(&self, data: &DocumentData) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter.matches(data))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: DocumentData,
}

/// 一次查询结果的完整快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    pub docs: Vec<DocumentSnapshot>,
}

/// 认证服务返回的会话主体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Missing or insufficient permissions.")]
    PermissionDenied,
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid document: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("the custom token is invalid or expired")]
    InvalidCustomToken,
    #[error("this sign-in method is disabled for the project")]
    OperationNotAllowed,
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

pub type SnapshotListener = Box<dyn Fn(Result<QuerySnapshot, StoreError>) + Send + Sync>;
pub type AuthListener = Box<dyn Fn(Option<AuthUser>) + Send + Sync>;

/// 订阅句柄
///
/// 调用 [`Subscription::unsubscribe`] 或直接丢弃都会释放底层监听器，且只释放一次。
pub struct Subscription {
    disposer: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposer: Some(Box::new(disposer)),
        }
    }

    /// 无需释放任何资源的句柄（例如监听器注册即失败）
    pub fn noop() -> Self {
        Self { disposer: None }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.disposer.is_some())
            .finish()
    }
}

/// 实时文档存储
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 注册实时查询。初次加载和之后每次远端变化都会投递完整快照。
    fn on_snapshot(&self, query: Query, listener: SnapshotListener) -> Subscription;

    /// 在集合中创建文档，返回存储方分配的 id
    async fn add_document(
        &self,
        path: &CollectionPath,
        data: DocumentData,
    ) -> Result<String, StoreError>;
}

/// 认证服务
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// 注册认证状态通知，注册后立即收到一次当前状态
    fn on_auth_state_changed(&self, listener: AuthListener) -> Subscription;

    async fn sign_in_anonymously(&self) -> Result<AuthUser, AuthError>;

    async fn sign_in_with_custom_token(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// 每个界面实例独占的客户端上下文
#[derive(Clone)]
pub struct ClientContext {
    pub store: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthProvider>,
}

impl ClientContext {
    pub fn new(store: Arc<dyn DocumentStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_server_timestamp_sentinel() {
        let value = serde_json::to_value(ServerTimestamp).unwrap();
        assert!(ServerTimestamp::is_sentinel(&value));
        assert!(!ServerTimestamp::is_sentinel(&serde_json::json!({"seconds": 1})));
    }

    #[test]
    fn test_subscription_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        subscription.unsubscribe();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let counter = Arc::clone(&released);
        {
            let _dropped = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_query_filter() {
        let query = Query::collection(CollectionPath::products("demo")).where_eq("available", true);
        let mut data = DocumentData::new();
        data.insert("available".into(), Value::Bool(false));
        assert!(!query.matches(&data));
        data.insert("available".into(), Value::Bool(true));
        assert!(query.matches(&data));
        assert_eq!(query.path.as_str(), "artifacts/demo/public/data/products");
    }
}
