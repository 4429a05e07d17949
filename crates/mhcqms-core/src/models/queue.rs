//! 排队条目数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Priority, RecordId};
use crate::error::{Result, ValidationErrors};
use crate::utils::optional_timestamp;
use crate::validation::{check_required_text, check_wait_time, non_blank};

/// 排队状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,    // 候诊
    InProgress, // 检查中
    Completed,  // 已完成
    Cancelled,  // 已取消
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 4] = [
        QueueStatus::Waiting,
        QueueStatus::InProgress,
        QueueStatus::Completed,
        QueueStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::InProgress => "in_progress",
            QueueStatus::Completed => "completed",
            QueueStatus::Cancelled => "cancelled",
        }
    }

    /// 仍占用排队位置
    pub fn is_active(self) -> bool {
        matches!(self, QueueStatus::Waiting | QueueStatus::InProgress)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        QueueStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown queue status: {}", s))
    }
}

/// 排队条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: RecordId,
    #[serde(default)]
    pub queue_number: Option<String>,
    pub patient_id: RecordId,
    pub checkup_type: String,
    #[serde(default)]
    pub priority: Priority,
    pub status: QueueStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub estimated_wait_time: Option<u32>,
    #[serde(default, with = "optional_timestamp")]
    pub check_in_time: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_timestamp")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// 实际候诊分钟数（签到到开始检查）
    pub fn waited_minutes(&self) -> Option<i64> {
        match (self.check_in_time, self.start_time) {
            (Some(check_in), Some(start)) => Some((start - check_in).num_minutes()),
            _ => None,
        }
    }
}

/// 加入排队请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueCreate {
    pub patient_id: RecordId,
    pub checkup_type: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_time: Option<u32>,
}

impl QueueCreate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_required_text(&mut errors, "checkup_type", "Checkup type", &self.checkup_type, 2);
        if let Some(minutes) = self.estimated_wait_time {
            check_wait_time(&mut errors, "estimated_wait_time", minutes);
        }
        if matches!(&self.notes, Some(notes) if notes.chars().count() > 1000) {
            errors.add("notes", "Notes cannot exceed 1000 characters");
        }
        errors.into_result()
    }

    pub fn normalized(mut self) -> Self {
        self.checkup_type = self.checkup_type.trim().to_string();
        self.notes = non_blank(self.notes);
        self
    }
}

/// 排队条目部分更新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkup_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_time: Option<u32>,
}

impl QueueUpdate {
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if self == &QueueUpdate::default() {
            errors.add("update", "No fields to update");
        }
        if let Some(checkup_type) = &self.checkup_type {
            check_required_text(&mut errors, "checkup_type", "Checkup type", checkup_type, 2);
        }
        if let Some(minutes) = self.estimated_wait_time {
            check_wait_time(&mut errors, "estimated_wait_time", minutes);
        }
        errors.into_result()
    }
}

/// 状态变更请求（`PATCH /queue/{id}/status`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatusUpdate {
    pub status: QueueStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// 排队列表查询条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFilter {
    pub status: Option<QueueStatus>,
    pub priority: Option<Priority>,
    pub skip: u32,
    pub limit: u32,
}

impl Default for QueueFilter {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            skip: 0,
            limit: 100,
        }
    }
}

impl QueueFilter {
    /// 转换为查询参数
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status_filter", status.as_str().to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority_filter", priority.level().to_string()));
        }
        pairs.push(("skip", self.skip.to_string()));
        pairs.push(("limit", self.limit.clamp(1, 1000).to_string()));
        pairs
    }
}

/// 服务端排队统计（`GET /queue/stats/summary`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSummary {
    #[serde(default)]
    pub total_waiting: u32,
    #[serde(default)]
    pub total_in_progress: u32,
    #[serde(default)]
    pub total_completed: u32,
    #[serde(default)]
    pub total_cancelled: u32,
    #[serde(default)]
    pub average_wait_time: u32,
    #[serde(default)]
    pub estimated_completion_time: Option<String>,
}
