//! 核心数据模型定义

mod patient;
mod queue;

pub use patient::*;
pub use queue::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// 服务端分配的记录标识（整数或字符串）
///
/// 比较和哈希按规范形式进行：`Text("5")` 与 `Number(5)` 视为同一标识。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    /// 数字形式的标识（包括内容为整数的字符串）
    pub fn as_number(&self) -> Option<i64> {
        match self {
            RecordId::Number(n) => Some(*n),
            RecordId::Text(s) => s.trim().parse().ok(),
        }
    }

    fn text_key(&self) -> &str {
        match self {
            RecordId::Number(_) => "",
            RecordId::Text(s) => s.trim(),
        }
    }
}

impl PartialEq for RecordId {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.text_key() == other.text_key(),
            _ => false,
        }
    }
}

impl Eq for RecordId {}

impl Hash for RecordId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.as_number() {
            Some(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            None => {
                1u8.hash(state);
                self.text_key().hash(state);
            }
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Number(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| RecordId::Text(value.to_string()))
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<i64>() {
            Ok(n) => RecordId::Number(n),
            Err(_) => RecordId::Text(s.trim().to_string()),
        })
    }
}

/// 就诊优先级
///
/// 线上传输使用整数 0/1/2；早期版本使用的字符串
/// `low`/`normal`/`high`/`emergency` 只在反序列化边界做映射。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "PriorityRepr", into = "u8")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
    Emergency,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriorityRepr {
    Level(i64),
    Label(String),
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Normal, Priority::Urgent, Priority::Emergency];

    pub fn level(self) -> u8 {
        match self {
            Priority::Normal => 0,
            Priority::Urgent => 1,
            Priority::Emergency => 2,
        }
    }

    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Priority::Normal),
            1 => Some(Priority::Urgent),
            2 => Some(Priority::Emergency),
            _ => None,
        }
    }

    /// 兼容旧版字符串优先级
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" | "normal" => Some(Priority::Normal),
            "high" | "urgent" => Some(Priority::Urgent),
            "emergency" => Some(Priority::Emergency),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Urgent => "urgent",
            Priority::Emergency => "emergency",
        }
    }
}

impl TryFrom<PriorityRepr> for Priority {
    type Error = String;

    fn try_from(value: PriorityRepr) -> Result<Self, Self::Error> {
        match value {
            PriorityRepr::Level(level) => {
                Priority::from_level(level).ok_or_else(|| format!("unknown priority level: {}", level))
            }
            PriorityRepr::Label(label) => label
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(Priority::from_level)
                .or_else(|| Priority::from_label(&label))
                .ok_or_else(|| format!("unknown priority: {}", label)),
        }
    }
}

impl From<Priority> for u8 {
    fn from(value: Priority) -> Self {
        value.level()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::try_from(PriorityRepr::Label(s.to_string()))
    }
}

/// 性别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(format!("unknown gender: {}", other)),
        }
    }
}
