//! HTTP传输层
//!
//! 统一处理凭证附加、超时、状态码到错误类型的映射和请求日志。

use mhcqms_core::{QueueError, Result};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::config::{CallClass, ClientConfig};
use crate::session::Session;

/// 请求体
pub(crate) enum Payload<'a> {
    Empty,
    Json(serde_json::Value),
    Form(&'a [(&'a str, &'a str)]),
}

impl Payload<'_> {
    pub(crate) fn json<T: Serialize + ?Sized>(body: &T) -> Result<Self> {
        Ok(Payload::Json(serde_json::to_value(body)?))
    }
}

/// 远程资源客户端
///
/// 本身不缓存任何业务数据，只是请求/响应的通道。
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: Session,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: Session) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("mhcqms-console/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| QueueError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config: Arc::new(config),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 拼接资源地址，每一段都会做路径编码
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(self.config.base_url.trim())
            .map_err(|e| QueueError::Config(format!("invalid api.base_url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| QueueError::Config("api.base_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// 发送请求并检查状态码
    pub(crate) async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        payload: Payload<'_>,
        class: CallClass,
    ) -> Result<String> {
        let url = self.endpoint(segments)?;
        let timeout = self.config.timeout_for(class);
        let path = url.path().to_string();

        let mut request = self
            .http
            .request(method.clone(), url)
            .timeout(timeout)
            .header(reqwest::header::ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.session.token().await {
            request = request.bearer_auth(token);
        }
        request = match payload {
            Payload::Empty => request,
            Payload::Json(body) => {
                if self.config.debug {
                    debug!("接口请求体 {} {}: {}", method, path, body);
                }
                request.json(&body)
            }
            Payload::Form(fields) => request.form(fields),
        };

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                error!("接口超时: {} {}，已等待 {}ms", method, path, timeout.as_millis());
                return Err(QueueError::timeout(timeout));
            }
            Err(e) => {
                error!("接口传输错误: {} {}: {}", method, path, e);
                return Err(QueueError::transport(e.to_string()));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Err(QueueError::timeout(timeout)),
            Err(e) => return Err(QueueError::transport(e.to_string())),
        };
        let elapsed_ms = started.elapsed().as_millis();

        if status.is_success() {
            debug!("接口响应: {} {} - {} ({}ms)", method, path, status.as_u16(), elapsed_ms);
            if self.config.debug {
                debug!("接口响应体 {} {}: {}", method, path, body);
            }
            return Ok(body);
        }

        warn!("接口错误: {} {} - {} ({}ms)", method, path, status.as_u16(), elapsed_ms);
        Err(self.map_failure(status, &body).await)
    }

    async fn map_failure(&self, status: StatusCode, body: &str) -> QueueError {
        let message = error_message(status, body);
        if status == StatusCode::UNAUTHORIZED {
            self.session.reset().await;
            return QueueError::Auth(message);
        }
        QueueError::Submission {
            status: status.as_u16(),
            message,
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let body = self
            .send(Method::GET, segments, query, Payload::Empty, CallClass::Standard)
            .await?;
        decode(&body)
    }

    pub(crate) async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        let body = self
            .send(method, segments, &[], Payload::json(body)?, CallClass::Standard)
            .await?;
        decode(&body)
    }

    pub(crate) async fn send_empty<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<T> {
        let body = self
            .send(method, segments, &[], Payload::Empty, CallClass::Standard)
            .await?;
        decode(&body)
    }

    /// 删除资源，忽略响应体
    pub(crate) async fn delete_resource(&self, segments: &[&str]) -> Result<()> {
        self.send(Method::DELETE, segments, &[], Payload::Empty, CallClass::Standard)
            .await
            .map(|_| ())
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    Ok(serde_json::from_str(body)?)
}

/// 从错误响应体提取可读信息
///
/// 依次尝试 `detail`（字符串或校验错误数组）、`message`，最后退回原始响应体。
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| match value.get("detail") {
            Some(serde_json::Value::String(detail)) => Some(detail.clone()),
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<String> = items.iter().filter_map(validation_item).collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            _ => value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
        });

    parsed.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            trimmed.to_string()
        }
    })
}

fn validation_item(item: &serde_json::Value) -> Option<String> {
    let msg = item.get("msg")?.as_str()?;
    let field = item
        .get("loc")
        .and_then(|loc| loc.as_array())
        .and_then(|loc| loc.last())
        .map(|last| match last {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    Some(match field {
        Some(field) => format!("{}: {}", field, msg),
        None => msg.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client_for, spawn_server};
    use crate::token::MemoryTokenStore;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::time::Duration;

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"detail": "Patient is already in queue"}"#),
            "Patient is already in queue"
        );
        assert_eq!(
            error_message(
                StatusCode::UNPROCESSABLE_ENTITY,
                r#"{"detail": [{"loc": ["body", "phone"], "msg": "field required", "type": "missing"}]}"#
            ),
            "phone: field required"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message": "bad"}"#),
            "bad"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }

    #[tokio::test]
    async fn test_endpoint_encodes_segments() {
        let store = Arc::new(MemoryTokenStore::new());
        let client = ApiClient::new(
            ClientConfig::with_base_url("http://localhost:8000/api/v1/"),
            Session::new(store),
        )
        .unwrap();

        let url = client.endpoint(&["patients", "P 01", "serve"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/patients/P%2001/serve");
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let app = Router::new().route(
            "/api/v1/echo",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(serde_json::json!({ "authorization": auth }))
            }),
        );
        let base_url = spawn_server(app).await;
        let (client, _) = client_for(&base_url, Some("tok-123")).await;

        let echoed: serde_json::Value = client.get_json(&["echo"], &[]).await.unwrap();
        assert_eq!(echoed["authorization"], "Bearer tok-123");
    }

    #[tokio::test]
    async fn test_unauthorized_resets_session() {
        let app = Router::new().route(
            "/api/v1/patients",
            get(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "detail": "Could not validate credentials" })),
                )
            }),
        );
        let base_url = spawn_server(app).await;
        let (client, store) = client_for(&base_url, Some("stale")).await;
        assert!(client.session().is_authenticated());

        let err = client
            .get_json::<serde_json::Value>(&["patients"], &[])
            .await
            .unwrap_err();

        assert!(matches!(&err, QueueError::Auth(msg) if msg == "Could not validate credentials"));
        assert!(!client.session().is_authenticated());
        assert_eq!(client.session().token().await, None);
        assert_eq!(crate::token::TokenStore::load(store.as_ref()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejection_surfaces_status_and_body() {
        let app = Router::new().route(
            "/api/v1/patients",
            get(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "detail": "Patient ID already exists" })),
                )
            }),
        );
        let base_url = spawn_server(app).await;
        let (client, _) = client_for(&base_url, Some("tok")).await;

        let err = client
            .get_json::<serde_json::Value>(&["patients"], &[])
            .await
            .unwrap_err();
        match err {
            QueueError::Submission { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Patient ID already exists");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // 非401不影响会话
        assert!(client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let app = Router::new().route(
            "/api/v1/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Json(serde_json::json!([]))
            }),
        );
        let base_url = spawn_server(app).await;
        let mut config = ClientConfig::with_base_url(base_url);
        config.timeouts.default_ms = 50;
        let client = ApiClient::new(config, Session::new(Arc::new(MemoryTokenStore::new()))).unwrap();

        let err = client
            .get_json::<serde_json::Value>(&["slow"], &[])
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (client, _) = client_for(&format!("http://{}/api/v1", addr), None).await;
        let err = client
            .get_json::<serde_json::Value>(&["patients"], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Transport { timed_out: false, .. }));
    }
}
