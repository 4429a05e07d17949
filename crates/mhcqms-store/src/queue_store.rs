//! 排队状态存储

use mhcqms_client::QueueApi;
use mhcqms_core::utils::rounded_mean;
use mhcqms_core::{
    QueueCreate, QueueEntry, QueueError, QueueFilter, QueueStatus, QueueStatusUpdate,
    QueueSummary, QueueUpdate, RecordId, Result, ValidationErrors,
};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::state_machine::QueueStateMachine;

/// 服务端单页上限
const ACTIVE_PAGE_SIZE: u32 = 1000;

/// 排队缓存快照
#[derive(Debug, Clone, Default)]
pub struct QueueState {
    pub entries: Vec<QueueEntry>,
    pub summary: Option<QueueSummary>,
    pub last_error: Option<String>,
}

/// 排队存储
///
/// 缓存顺序与服务端返回顺序一致，本地不重新排序。
pub struct QueueStore {
    api: Arc<dyn QueueApi>,
    state: Arc<RwLock<QueueState>>,
    machine: QueueStateMachine,
}

impl QueueStore {
    pub fn new(api: Arc<dyn QueueApi>) -> Self {
        Self {
            api,
            state: Arc::new(RwLock::new(QueueState::default())),
            machine: QueueStateMachine::new(),
        }
    }

    /// 按过滤条件刷新排队列表
    pub async fn fetch_queue(&self, filter: &QueueFilter) -> Result<Vec<QueueEntry>> {
        let result = self.api.list(filter).await;
        let entries = self.settle(result.map_err(|e| QueueError::fetch("queue", e))).await?;

        info!("已获取 {} 条排队条目", entries.len());
        self.state.write().await.entries = entries.clone();
        Ok(entries)
    }

    /// 刷新全部进行中的条目（候诊和就诊中），逐页拉取直到取完
    pub async fn fetch_active(&self) -> Result<Vec<QueueEntry>> {
        let mut active = Vec::new();
        for status in [QueueStatus::Waiting, QueueStatus::InProgress] {
            let mut filter = QueueFilter {
                status: Some(status),
                limit: ACTIVE_PAGE_SIZE,
                ..Default::default()
            };
            loop {
                let result = self.api.list(&filter).await;
                let page = self.settle(result.map_err(|e| QueueError::fetch("queue", e))).await?;
                let full = page.len() >= ACTIVE_PAGE_SIZE as usize;
                active.extend(page);
                if !full {
                    break;
                }
                filter.skip += ACTIVE_PAGE_SIZE;
            }
        }

        info!("已获取 {} 条进行中的排队条目", active.len());
        self.state.write().await.entries = active.clone();
        Ok(active)
    }

    /// 加入排队，同一患者只能有一个进行中的条目
    ///
    /// 重复检查基于当前缓存，调用前应先执行 [`QueueStore::fetch_active`]。
    pub async fn add_to_queue(&self, data: QueueCreate) -> Result<QueueEntry> {
        let data = data.normalized();
        self.settle(data.validate()).await?;

        let duplicate = self
            .state
            .read()
            .await
            .entries
            .iter()
            .any(|e| e.patient_id == data.patient_id && e.status.is_active());
        if duplicate {
            let mut errors = ValidationErrors::new();
            errors.add("patient_id", "Patient is already in queue");
            return self.settle(Err(QueueError::Validation(errors))).await;
        }

        let result = self.api.create(&data).await;
        let created = self.settle(result).await?;

        info!(
            "患者 {} 已加入排队，条目 {}",
            created.patient_id, created.id
        );
        upsert(&mut self.state.write().await.entries, created.clone());
        Ok(created)
    }

    /// 修改排队条目（优先级、备注等）
    pub async fn update_entry(&self, id: &RecordId, update: QueueUpdate) -> Result<QueueEntry> {
        self.settle(update.validate()).await?;
        let result = self.api.update(id, &update).await;
        let updated = self.settle(result).await?;

        self.replace(updated).await
    }

    /// 变更状态，先按状态机校验
    pub async fn update_status(
        &self,
        id: &RecordId,
        status: QueueStatus,
        notes: Option<String>,
    ) -> Result<QueueEntry> {
        let current = self.settle(self.cached_status(id).await).await?;
        self.settle(self.machine.check_target(current, status)).await?;

        let update = QueueStatusUpdate { status, notes };
        let result = self.api.transition(id, &update).await;
        let updated = self.settle(result).await?;

        info!("排队条目 {} 状态 {} -> {}", id, current, updated.status);
        self.replace(updated).await
    }

    /// 推进到生命周期中的下一个状态
    pub async fn advance(&self, id: &RecordId) -> Result<QueueEntry> {
        let current = self.settle(self.cached_status(id).await).await?;
        let next = match QueueStateMachine::next_event(current) {
            Some(event) => self.machine.transition(current, event),
            None => Err(QueueError::InvalidStateTransition {
                from: current.to_string(),
                event: "advance".into(),
            }),
        };
        let next = self.settle(next).await?;
        self.update_status(id, next, None).await
    }

    /// 移出排队
    pub async fn remove_from_queue(&self, id: &RecordId) -> Result<()> {
        let result = self.api.delete(id).await;
        self.settle(result).await?;

        self.state.write().await.entries.retain(|e| &e.id != id);
        info!("排队条目 {} 已移除", id);
        Ok(())
    }

    /// 获取服务端统计
    pub async fn fetch_summary(&self) -> Result<QueueSummary> {
        let result = self.api.summary().await;
        let summary = self
            .settle(result.map_err(|e| QueueError::fetch("queue summary", e)))
            .await?;

        self.state.write().await.summary = Some(summary.clone());
        Ok(summary)
    }

    /// 下一位应叫号的患者：优先级最高，其次签到最早
    pub async fn next_waiting(&self) -> Option<QueueEntry> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .filter(|e| e.status == QueueStatus::Waiting)
            .min_by(|a, b| call_order(a, b))
            .cloned()
    }

    /// 根据当前缓存计算各状态数量
    pub async fn local_summary(&self) -> QueueSummary {
        let state = self.state.read().await;
        let count = |status: QueueStatus| {
            state.entries.iter().filter(|e| e.status == status).count() as u32
        };
        let waited = state
            .entries
            .iter()
            .filter_map(QueueEntry::waited_minutes)
            .map(|minutes| u32::try_from(minutes.max(0)).unwrap_or(u32::MAX));

        QueueSummary {
            total_waiting: count(QueueStatus::Waiting),
            total_in_progress: count(QueueStatus::InProgress),
            total_completed: count(QueueStatus::Completed),
            total_cancelled: count(QueueStatus::Cancelled),
            average_wait_time: rounded_mean(waited),
            estimated_completion_time: None,
        }
    }

    pub async fn entries(&self) -> Vec<QueueEntry> {
        self.state.read().await.entries.clone()
    }

    pub async fn summary(&self) -> Option<QueueSummary> {
        self.state.read().await.summary.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub async fn clear_error(&self) {
        self.state.write().await.last_error = None;
    }

    pub async fn reset(&self) {
        *self.state.write().await = QueueState::default();
    }

    async fn cached_status(&self, id: &RecordId) -> Result<QueueStatus> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .find(|e| &e.id == id)
            .map(|e| e.status)
            .ok_or_else(|| QueueError::NotFound(format!("queue entry {}", id)))
    }

    async fn replace(&self, updated: QueueEntry) -> Result<QueueEntry> {
        let replaced = {
            let mut state = self.state.write().await;
            match state.entries.iter_mut().find(|e| e.id == updated.id) {
                Some(slot) => {
                    *slot = updated.clone();
                    true
                }
                None => false,
            }
        };
        if !replaced {
            return self
                .settle(Err(QueueError::NotFound(format!("queue entry {}", updated.id))))
                .await;
        }
        Ok(updated)
    }

    async fn settle<T>(&self, result: Result<T>) -> Result<T> {
        let mut state = self.state.write().await;
        match &result {
            Ok(_) => state.last_error = None,
            Err(e) => {
                error!("排队操作失败: {}", e);
                state.last_error = Some(e.to_string());
            }
        }
        result
    }
}

/// 叫号顺序：优先级降序，签到时间升序，缺失签到时间排在最后
fn call_order(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| match (a.check_in_time, b.check_in_time) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

fn upsert(entries: &mut Vec<QueueEntry>, entry: QueueEntry) {
    match entries.iter_mut().find(|e| e.id == entry.id) {
        Some(slot) => *slot = entry,
        None => entries.push(entry),
    }
}
