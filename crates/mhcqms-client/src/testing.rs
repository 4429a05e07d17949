//! 测试辅助：在本地随机端口启动模拟后端

use axum::Router;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::http::ApiClient;
use crate::session::Session;
use crate::token::MemoryTokenStore;

/// 启动模拟服务端，返回 `/api/v1` 根地址
pub(crate) async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/v1", addr)
}

pub(crate) async fn client_for(
    base_url: &str,
    token: Option<&str>,
) -> (ApiClient, Arc<MemoryTokenStore>) {
    let store = Arc::new(match token {
        Some(token) => MemoryTokenStore::with_token(token),
        None => MemoryTokenStore::new(),
    });
    let session = Session::restore(store.clone()).await.unwrap();
    let client = ApiClient::new(ClientConfig::with_base_url(base_url), session).unwrap();
    (client, store)
}
