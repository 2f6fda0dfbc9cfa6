//! 实时查询订阅
//!
//! 每个界面最多持有一个活动订阅。激活条件（会话就绪、用户 id、是否有错误）
//! 变化时先释放旧订阅再建立新订阅。排序在客户端完成，远端无需复合索引。

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::{
    model::Product,
    presentation::sorted_newest_first,
    session::SessionState,
};
use crate::{
    core::error::CoreError,
    infrastructure::backend::{DocumentStore, Query, QuerySnapshot, Subscription},
};

/// 界面持有的产品列表状态
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState {
    pub products: Vec<Product>,
    pub is_loading: bool,
    pub error: Option<CoreError>,
    generation: u64,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            is_loading: true,
            error: None,
            generation: 0,
        }
    }
}

pub type SharedFeed = Arc<Mutex<FeedState>>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActivationKey {
    is_auth_ready: bool,
    user_id: Option<String>,
    has_error: bool,
}

pub struct LiveQuerySubscriber {
    store: Arc<dyn DocumentStore>,
    query: Query,
    feed: SharedFeed,
    active: Option<Subscription>,
    last_key: Option<ActivationKey>,
    closed: bool,
}

impl LiveQuerySubscriber {
    pub fn new(store: Arc<dyn DocumentStore>, query: Query, feed: SharedFeed) -> Self {
        Self {
            store,
            query,
            feed,
            active: None,
            last_key: None,
            closed: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// 根据最新会话状态调整订阅
    pub fn reconcile(&mut self, session: &SessionState) {
        if self.closed {
            return;
        }
        let has_error = session.error.is_some() || self.feed.lock().error.is_some();
        let key = ActivationKey {
            is_auth_ready: session.is_auth_ready,
            user_id: session.user_id.clone(),
            has_error,
        };
        if self.last_key.as_ref() == Some(&key) {
            return;
        }
        self.last_key = Some(key.clone());
        self.release();

        if !key.is_auth_ready || key.has_error {
            return;
        }

        let generation = self.feed.lock().generation;
        let feed = Arc::clone(&self.feed);
        let path = self.query.path.clone();
        debug!(path = %path, generation, "opening live query");

        let subscription = self.store.on_snapshot(
            self.query.clone(),
            Box::new(move |result| {
                let next = result.map(|snapshot| decode_snapshot(&snapshot));
                let mut feed = feed.lock();
                if feed.generation != generation {
                    return;
                }
                match next {
                    Ok(products) => {
                        debug!(path = %path, count = products.len(), "snapshot applied");
                        feed.products = products;
                    }
                    Err(err) => {
                        error!(path = %path, error = %err, "live query failed");
                        feed.error = Some(CoreError::Subscription(err));
                    }
                }
                feed.is_loading = false;
            }),
        );
        self.active = Some(subscription);
    }

    /// 释放当前订阅，之后到达的旧事件会被丢弃
    pub fn release(&mut self) {
        self.feed.lock().generation += 1;
        if let Some(subscription) = self.active.take() {
            debug!(path = %self.query.path, "releasing live query");
            subscription.unsubscribe();
        }
    }

    /// 释放并停止后续协调，用于界面卸载
    pub fn close(&mut self) {
        self.closed = true;
        self.release();
    }
}

impl Drop for LiveQuerySubscriber {
    fn drop(&mut self) {
        self.release();
    }
}

fn decode_snapshot(snapshot: &QuerySnapshot) -> Vec<Product> {
    let products = snapshot
        .docs
        .iter()
        .filter_map(|doc| match Product::from_document(doc) {
            Ok(product) => Some(product),
            Err(err) => {
                warn!(id = %doc.id, error = %err, "skipping malformed product document");
                None
            }
        })
        .collect();
    sorted_newest_first(products)
}
