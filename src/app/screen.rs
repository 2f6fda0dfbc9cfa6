//! 界面运行时
//!
//! 把会话管理器与实时查询订阅串起来：会话状态每次变化都重新协调订阅。
//! 卸载时统一释放所有订阅句柄和后台任务。

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{
    session::{SessionManager, SessionState},
    subscriber::{FeedState, LiveQuerySubscriber, SharedFeed},
};
use crate::infrastructure::backend::{ClientContext, Query};

pub struct ScreenRuntime {
    name: &'static str,
    feed: SharedFeed,
    session: SessionManager,
    subscriber: Option<Arc<Mutex<LiveQuerySubscriber>>>,
    reconciler: Mutex<Option<JoinHandle<()>>>,
    mounted: AtomicBool,
}

impl ScreenRuntime {
    /// 挂载并开始会话与订阅，需在 tokio 运行时内调用
    pub fn mount(
        name: &'static str,
        context: &ClientContext,
        query: Query,
        initial_auth_token: Option<String>,
    ) -> Self {
        let feed = SharedFeed::default();
        let session = SessionManager::start(Arc::clone(&context.auth), initial_auth_token);
        let subscriber = Arc::new(Mutex::new(LiveQuerySubscriber::new(
            Arc::clone(&context.store),
            query,
            Arc::clone(&feed),
        )));

        let mut changes = session.watch();
        let reconciling = Arc::clone(&subscriber);
        let reconciler = tokio::spawn(async move {
            loop {
                let state = changes.borrow_and_update().clone();
                reconciling.lock().reconcile(&state);
                if changes.changed().await.is_err() {
                    break;
                }
            }
        });

        debug!(screen = name, "screen mounted");
        Self {
            name,
            feed,
            session,
            subscriber: Some(subscriber),
            reconciler: Mutex::new(Some(reconciler)),
            mounted: AtomicBool::new(true),
        }
    }

    /// 不连接任何协作方的界面：只读会话，无订阅，不处于加载中
    pub fn detached(name: &'static str) -> Self {
        let feed = SharedFeed::default();
        feed.lock().is_loading = false;
        debug!(screen = name, "screen mounted without backend");
        Self {
            name,
            feed,
            session: SessionManager::read_only(),
            subscriber: None,
            reconciler: Mutex::new(None),
            mounted: AtomicBool::new(true),
        }
    }

    pub fn session(&self) -> SessionState {
        self.session.state()
    }

    pub fn feed(&self) -> FeedState {
        self.feed.lock().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// 卸载，可重复调用
    pub fn unmount(&self) {
        if !self.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(reconciler) = self.reconciler.lock().take() {
            reconciler.abort();
        }
        if let Some(subscriber) = &self.subscriber {
            subscriber.lock().close();
        }
        self.session.shutdown();
        debug!(screen = self.name, "screen unmounted");
    }
}

impl Drop for ScreenRuntime {
    fn drop(&mut self) {
        self.unmount();
    }
}
