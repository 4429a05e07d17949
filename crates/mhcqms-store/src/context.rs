//! 控制台上下文
//!
//! 显式持有客户端、会话以及两个存储，替代全局单例；释放即销毁。

use mhcqms_client::{ApiClient, AuthApi, ClientConfig, Credentials, Session, TokenStore, User};
use mhcqms_core::Result;
use std::sync::Arc;
use tracing::info;

use crate::patient_store::PatientStore;
use crate::queue_store::QueueStore;

/// 控制台运行上下文
pub struct ConsoleContext {
    client: ApiClient,
    patients: PatientStore,
    queue: QueueStore,
}

impl ConsoleContext {
    /// 从配置和凭证存储构建，已保存的凭证会被恢复
    pub async fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let session = Session::restore(tokens).await?;
        let client = ApiClient::new(config, session)?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: ApiClient) -> Self {
        let api = Arc::new(client.clone());
        Self {
            patients: PatientStore::new(api.clone()),
            queue: QueueStore::new(api),
            client,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn session(&self) -> &Session {
        self.client.session()
    }

    pub fn patients(&self) -> &PatientStore {
        &self.patients
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    /// 登录，返回当前用户
    ///
    /// 登录响应未携带用户信息时再请求一次 `/auth/me`。
    pub async fn login(&self, credentials: &Credentials) -> Result<User> {
        let response = self.client.login(credentials).await?;
        let user = match response.user {
            Some(user) => user,
            None => self.client.me().await?,
        };
        info!("当前用户: {}", user.display_name());
        Ok(user)
    }

    /// 注销并清空本地缓存
    pub async fn logout(&self) -> Result<()> {
        self.client.logout().await?;
        self.patients.reset().await;
        self.queue.reset().await;
        Ok(())
    }

    pub async fn current_user(&self) -> Result<User> {
        self.client.me().await
    }
}
