//! 登录认证

use async_trait::async_trait;
use mhcqms_core::{QueueError, RecordId, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::config::CallClass;
use crate::http::{decode, ApiClient, Payload};

/// 登录凭据
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 登录响应，凭证字段名在不同后端版本中为 `access_token` 或 `token`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub user: Option<User>,
}

impl LoginResponse {
    pub fn token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .or(self.token.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// 当前登录用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

/// 认证接口
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// 登录并保存凭证
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse>;

    /// 注销，本地凭证总会被清除
    async fn logout(&self) -> Result<()>;

    async fn me(&self) -> Result<User>;
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let body = self
            .send(
                Method::POST,
                &["auth", "login"],
                &[],
                Payload::Form(&form),
                CallClass::Login,
            )
            .await?;
        let response: LoginResponse = decode(&body)?;

        let token = response.token().ok_or_else(|| QueueError::Submission {
            status: 200,
            message: "login response did not include an access token".into(),
        })?;
        self.session().sign_in(token.to_string()).await?;
        info!("用户 {} 登录成功", credentials.username);
        Ok(response)
    }

    async fn logout(&self) -> Result<()> {
        if let Err(e) = self
            .send(
                Method::POST,
                &["auth", "logout"],
                &[],
                Payload::Empty,
                CallClass::Standard,
            )
            .await
        {
            warn!("注销请求失败，仍清除本地会话: {}", e);
        }
        self.session().reset().await;
        info!("已注销");
        Ok(())
    }

    async fn me(&self) -> Result<User> {
        self.get_json(&["auth", "me"], &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client_for, spawn_server};
    use crate::token::TokenStore;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Form, Json, Router};
    use std::collections::HashMap;

    #[test]
    fn test_login_response_token_fallback() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"token": "legacy", "user": {"id": 1, "username": "nurse"}}"#)
                .unwrap();
        assert_eq!(response.token(), Some("legacy"));
        assert_eq!(response.user.unwrap().display_name(), "nurse");

        let empty: LoginResponse = serde_json::from_str(r#"{"access_token": ""}"#).unwrap();
        assert_eq!(empty.token(), None);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials::new("admin", "s3cret");
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_login_posts_form_and_stores_token() {
        let app = Router::new()
            .route(
                "/api/v1/auth/login",
                post(|Form(fields): Form<HashMap<String, String>>| async move {
                    assert_eq!(fields.get("username").map(String::as_str), Some("admin"));
                    assert_eq!(fields.get("password").map(String::as_str), Some("pw"));
                    Json(serde_json::json!({
                        "access_token": "jwt-1",
                        "token_type": "bearer",
                        "user": {"id": 1, "username": "admin", "full_name": "Front Desk"}
                    }))
                }),
            )
            .route(
                "/api/v1/auth/me",
                get(|| async {
                    Json(serde_json::json!({"id": 1, "username": "admin", "is_superuser": true}))
                }),
            );
        let base_url = spawn_server(app).await;
        let (client, store) = client_for(&base_url, None).await;
        assert!(!client.session().is_authenticated());

        let response = client
            .login(&Credentials::new("admin", "pw"))
            .await
            .unwrap();
        assert_eq!(response.user.unwrap().display_name(), "Front Desk");
        assert!(client.session().is_authenticated());
        assert_eq!(store.load().await.unwrap().as_deref(), Some("jwt-1"));

        let me = client.me().await.unwrap();
        assert!(me.is_superuser);
        assert!(me.is_active);
    }

    #[tokio::test]
    async fn test_login_without_token_is_rejected() {
        let app = Router::new().route(
            "/api/v1/auth/login",
            post(|| async { Json(serde_json::json!({"token_type": "bearer"})) }),
        );
        let base_url = spawn_server(app).await;
        let (client, _) = client_for(&base_url, None).await;

        let err = client
            .login(&Credentials::new("admin", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Submission { .. }));
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_session_even_on_server_error() {
        let app = Router::new().route(
            "/api/v1/auth/logout",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base_url = spawn_server(app).await;
        let (client, store) = client_for(&base_url, Some("jwt-1")).await;
        assert!(client.session().is_authenticated());

        client.logout().await.unwrap();
        assert!(!client.session().is_authenticated());
        assert_eq!(store.load().await.unwrap(), None);
    }
}
