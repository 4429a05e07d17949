//! 客户端配置

use mhcqms_core::{QueueError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 远程接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 接口根地址
    pub base_url: String,
    /// 超时设置
    pub timeouts: TimeoutConfig,
    /// 调试模式：记录请求和响应内容
    pub debug: bool,
}

/// 超时设置（毫秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// 普通读写请求
    pub default_ms: u64,
    /// 登录请求
    pub login_ms: u64,
}

/// 调用类型，决定使用哪一档超时
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallClass {
    Standard,
    Login,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            timeouts: TimeoutConfig::default(),
            debug: false,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_ms: 10_000,
            login_ms: 15_000,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout_for(&self, class: CallClass) -> Duration {
        match class {
            CallClass::Standard => Duration::from_millis(self.timeouts.default_ms),
            CallClass::Login => Duration::from_millis(self.timeouts.login_ms),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(QueueError::Config("api.base_url must not be empty".into()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(QueueError::Config(format!(
                "api.base_url must be an http(s) URL: {}",
                base_url
            )));
        }
        if self.timeouts.default_ms == 0 || self.timeouts.login_ms == 0 {
            return Err(QueueError::Config("api timeouts must be greater than zero".into()));
        }
        Ok(())
    }
}
