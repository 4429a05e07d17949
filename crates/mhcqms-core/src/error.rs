//! 错误定义模块

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// 字段级校验错误集合（字段名 -> 错误信息列表）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个字段错误
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// 获取某个字段的全部错误信息
    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    /// 无错误时返回 `Ok(())`，否则转换为 [`QueueError::Validation`]
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(QueueError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// 排队系统统一错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("校验错误: {0}")]
    Validation(ValidationErrors),

    #[error("获取{resource}失败: {source}")]
    Fetch {
        resource: String,
        #[source]
        source: Box<QueueError>,
    },

    #[error("请求被拒绝 (HTTP {status}): {message}")]
    Submission { status: u16, message: String },

    #[error("认证失败: {0}")]
    Auth(String),

    #[error("网络错误: {message}")]
    Transport { message: String, timed_out: bool },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

impl QueueError {
    /// 将底层错误包装为集合获取失败
    pub fn fetch(resource: impl Into<String>, source: QueueError) -> Self {
        QueueError::Fetch {
            resource: resource.into(),
            source: Box::new(source),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        QueueError::Transport {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(after: Duration) -> Self {
        QueueError::Transport {
            message: format!("request timed out after {}ms", after.as_millis()),
            timed_out: true,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            QueueError::Transport { timed_out, .. } => *timed_out,
            QueueError::Fetch { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// 凭证失效（包括获取过程中遇到的 401）
    pub fn is_auth(&self) -> bool {
        match self {
            QueueError::Auth(_) => true,
            QueueError::Fetch { source, .. } => source.is_auth(),
            _ => false,
        }
    }

    /// 服务端返回的HTTP状态码（如有）
    pub fn status(&self) -> Option<u16> {
        match self {
            QueueError::Submission { status, .. } => Some(*status),
            QueueError::Auth(_) => Some(401),
            QueueError::Fetch { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// 排队系统统一结果类型
pub type Result<T> = std::result::Result<T, QueueError>;
