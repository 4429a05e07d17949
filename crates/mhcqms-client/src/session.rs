//! 会话管理
//!
//! 持有当前Bearer凭证，并通过 `watch` 通道广播登录状态，
//! 视图层订阅后可在凭证失效时切回未登录界面。

use mhcqms_core::Result;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

use crate::token::TokenStore;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    SignedOut,
    SignedIn,
}

/// 客户端会话
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    token: RwLock<Option<String>>,
    store: Arc<dyn TokenStore>,
    state: watch::Sender<SessionState>,
}

impl Session {
    /// 创建未登录的会话
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self::with_token(store, None)
    }

    /// 从凭证存储恢复会话
    pub async fn restore(store: Arc<dyn TokenStore>) -> Result<Self> {
        let token = store.load().await?;
        if token.is_some() {
            info!("已从凭证存储恢复会话");
        }
        Ok(Self::with_token(store, token))
    }

    fn with_token(store: Arc<dyn TokenStore>, token: Option<String>) -> Self {
        let initial = if token.is_some() {
            SessionState::SignedIn
        } else {
            SessionState::SignedOut
        };
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(SessionInner {
                token: RwLock::new(token),
                store,
                state,
            }),
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.inner.token.read().await.clone()
    }

    /// 登录成功后保存凭证
    pub async fn sign_in(&self, token: String) -> Result<()> {
        self.inner.store.save(&token).await?;
        *self.inner.token.write().await = Some(token);
        self.inner.state.send_replace(SessionState::SignedIn);
        Ok(())
    }

    /// 丢弃凭证并切换到未登录状态
    ///
    /// 存储删除失败只记录日志，内存中的凭证总会被清除。
    pub async fn reset(&self) {
        *self.inner.token.write().await = None;
        if let Err(e) = self.inner.store.clear().await {
            warn!("清除已保存的会话凭证失败: {}", e);
        }
        let previous = self.inner.state.send_replace(SessionState::SignedOut);
        if previous == SessionState::SignedIn {
            info!("会话已重置，需要重新登录");
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::SignedIn
    }

    /// 订阅登录状态变化
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
