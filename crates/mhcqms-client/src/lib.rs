//! # MHCQMS远程资源客户端
//!
//! 提供对排队系统后端的HTTP访问，包括：
//! - 患者、排队条目和认证三类资源接口
//! - 请求自动附带Bearer凭证，凭证失效时强制重置会话
//! - 按调用类型区分的超时控制
//! - 凭证的本地持久化

pub mod api;
pub mod auth;
pub mod config;
pub mod http;
pub mod session;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{PatientApi, QueueApi, Registration};
pub use auth::{AuthApi, Credentials, LoginResponse, User};
pub use config::{CallClass, ClientConfig, TimeoutConfig};
pub use http::ApiClient;
pub use session::{Session, SessionState};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore};
