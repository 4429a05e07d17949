//! 排队状态机
//!
//! 管理排队条目从签到到完成的生命周期状态转换

use mhcqms_core::{QueueError, QueueStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 排队状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QueueEvent {
    Start,    // 开始检查
    Complete, // 检查完成
    Cancel,   // 取消排队
}

impl QueueEvent {
    pub const ALL: [QueueEvent; 3] = [QueueEvent::Start, QueueEvent::Complete, QueueEvent::Cancel];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueEvent::Start => "start",
            QueueEvent::Complete => "complete",
            QueueEvent::Cancel => "cancel",
        }
    }
}

impl fmt::Display for QueueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 排队状态机
#[derive(Debug)]
pub struct QueueStateMachine {
    transitions: HashMap<(QueueStatus, QueueEvent), QueueStatus>,
}

impl QueueStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert((QueueStatus::Waiting, QueueEvent::Start), QueueStatus::InProgress);
        transitions.insert((QueueStatus::InProgress, QueueEvent::Complete), QueueStatus::Completed);
        transitions.insert((QueueStatus::Waiting, QueueEvent::Cancel), QueueStatus::Cancelled);
        transitions.insert((QueueStatus::InProgress, QueueEvent::Cancel), QueueStatus::Cancelled);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: QueueStatus, event: QueueEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: QueueStatus, event: QueueEvent) -> Result<QueueStatus> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| QueueError::InvalidStateTransition {
                from: from.to_string(),
                event: event.to_string(),
            })
    }

    /// 当前状态下可触发的事件，按固定顺序返回
    pub fn possible_events(&self, current: QueueStatus) -> Vec<QueueEvent> {
        QueueEvent::ALL
            .into_iter()
            .filter(|event| self.can_transition(current, *event))
            .collect()
    }

    /// 到达目标状态所需的事件；`Waiting` 不能由任何事件到达
    pub fn event_for(target: QueueStatus) -> Option<QueueEvent> {
        match target {
            QueueStatus::Waiting => None,
            QueueStatus::InProgress => Some(QueueEvent::Start),
            QueueStatus::Completed => Some(QueueEvent::Complete),
            QueueStatus::Cancelled => Some(QueueEvent::Cancel),
        }
    }

    /// 生命周期中的下一步（取消除外）
    pub fn next_event(current: QueueStatus) -> Option<QueueEvent> {
        match current {
            QueueStatus::Waiting => Some(QueueEvent::Start),
            QueueStatus::InProgress => Some(QueueEvent::Complete),
            QueueStatus::Completed | QueueStatus::Cancelled => None,
        }
    }

    /// 校验从 `from` 直接改为 `target` 是否合法
    pub fn check_target(&self, from: QueueStatus, target: QueueStatus) -> Result<QueueEvent> {
        let invalid = || QueueError::InvalidStateTransition {
            from: from.to_string(),
            event: target.to_string(),
        };
        let event = Self::event_for(target).ok_or_else(invalid)?;
        if self.can_transition(from, event) {
            Ok(event)
        } else {
            Err(QueueError::InvalidStateTransition {
                from: from.to_string(),
                event: event.to_string(),
            })
        }
    }
}

impl Default for QueueStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
