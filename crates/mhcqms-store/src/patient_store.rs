//! 患者状态存储
//!
//! 缓存待诊和已完成两个患者集合。所有变更都在远程调用成功后才写入缓存，
//! 远程调用期间不持有锁。

use chrono::Utc;
use mhcqms_client::{PatientApi, Registration};
use mhcqms_core::utils::rounded_mean;
use mhcqms_core::{
    Patient, PatientRegistration, PatientStats, PatientUpdate, Priority, QueueError, RecordId,
    Result,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// 患者缓存快照
#[derive(Debug, Clone, Default)]
pub struct PatientState {
    pub active: Vec<Patient>,
    pub completed: Vec<Patient>,
    pub last_error: Option<String>,
}

/// 患者存储
pub struct PatientStore {
    api: Arc<dyn PatientApi>,
    state: Arc<RwLock<PatientState>>,
}

impl PatientStore {
    pub fn new(api: Arc<dyn PatientApi>) -> Self {
        Self {
            api,
            state: Arc::new(RwLock::new(PatientState::default())),
        }
    }

    /// 刷新待诊列表，服务端标记为已就诊的记录会被排除
    pub async fn fetch_patients(&self) -> Result<Vec<Patient>> {
        let result = self.api.list().await;
        let patients = self.settle(result.map_err(|e| QueueError::fetch("patients", e))).await?;

        let active: Vec<Patient> = patients.into_iter().filter(|p| !p.served()).collect();
        info!("已获取 {} 名待诊患者", active.len());
        self.state.write().await.active = active.clone();
        Ok(active)
    }

    /// 刷新已完成列表
    pub async fn fetch_completed_patients(&self) -> Result<Vec<Patient>> {
        let result = self.api.list_completed().await;
        let completed = self
            .settle(result.map_err(|e| QueueError::fetch("completed patients", e)))
            .await?;

        info!("已获取 {} 名已完成患者", completed.len());
        self.state.write().await.completed = completed.clone();
        Ok(completed)
    }

    /// 登记患者并加入排队
    ///
    /// 校验失败时不发起请求；成功后记录进入待诊集合且只出现一次。
    pub async fn register_patient(&self, data: PatientRegistration) -> Result<Registration> {
        let payload = self.settle(data.validate(Utc::now().date_naive())).await?;
        let result = self.api.register(&payload).await;
        let registration = self.settle(result).await?;

        info!(
            "患者 {} ({}) 登记成功",
            registration.patient.full_name(),
            registration.patient.id
        );
        upsert(&mut self.state.write().await.active, registration.patient.clone());
        Ok(registration)
    }

    /// 仅创建患者档案，不进入排队
    pub async fn add_patient(&self, data: PatientRegistration) -> Result<Patient> {
        let payload = self.settle(data.validate(Utc::now().date_naive())).await?;
        let result = self.api.create(&payload).await;
        let patient = self.settle(result).await?;

        info!("患者档案 {} 已创建", patient.id);
        upsert(&mut self.state.write().await.active, patient.clone());
        Ok(patient)
    }

    /// 部分更新患者信息
    pub async fn update_patient(&self, id: &RecordId, update: PatientUpdate) -> Result<Patient> {
        self.settle(update.validate(Utc::now().date_naive())).await?;
        let result = self.api.update(id, &update).await;
        let updated = self.settle(result).await?;

        let replaced = {
            let mut state = self.state.write().await;
            let PatientState {
                active, completed, ..
            } = &mut *state;
            match active
                .iter_mut()
                .chain(completed.iter_mut())
                .find(|p| p.id == updated.id)
            {
                Some(slot) => {
                    *slot = updated.clone();
                    true
                }
                None => false,
            }
        };
        if !replaced {
            return self
                .settle(Err(QueueError::NotFound(format!("patient {}", updated.id))))
                .await;
        }

        info!("患者 {} 信息已更新", updated.id);
        Ok(updated)
    }

    /// 删除患者
    pub async fn delete_patient(&self, id: &RecordId) -> Result<()> {
        let result = self.api.delete(id).await;
        self.settle(result).await?;

        self.state.write().await.active.retain(|p| &p.id != id);
        info!("患者 {} 已删除", id);
        Ok(())
    }

    /// 标记为已就诊：移出待诊集合并加入已完成集合
    pub async fn mark_served(&self, id: &RecordId) -> Result<Patient> {
        let result = self.api.serve(id).await;
        let served = self.settle(result).await?;

        {
            let mut state = self.state.write().await;
            state.active.retain(|p| &p.id != id && p.id != served.id);
            upsert(&mut state.completed, served.clone());
        }
        info!("患者 {} 已标记为就诊完成", served.id);
        Ok(served)
    }

    /// 根据当前缓存计算统计
    pub async fn compute_stats(&self) -> PatientStats {
        let state = self.state.read().await;
        PatientStats {
            total_in_queue: state.active.len(),
            total_served: state.completed.len(),
            average_wait_time: rounded_mean(state.completed.iter().map(Patient::wait_minutes)),
        }
    }

    /// 待诊患者按优先级计数，所有优先级都会出现
    pub async fn priority_breakdown(&self) -> BTreeMap<Priority, usize> {
        let state = self.state.read().await;
        let mut counts: BTreeMap<Priority, usize> =
            Priority::ALL.into_iter().map(|p| (p, 0)).collect();
        for patient in &state.active {
            *counts.entry(patient.priority).or_insert(0) += 1;
        }
        counts
    }

    pub async fn active(&self) -> Vec<Patient> {
        self.state.read().await.active.clone()
    }

    pub async fn completed(&self) -> Vec<Patient> {
        self.state.read().await.completed.clone()
    }

    pub async fn find(&self, id: &RecordId) -> Option<Patient> {
        let state = self.state.read().await;
        state
            .active
            .iter()
            .chain(state.completed.iter())
            .find(|p| &p.id == id)
            .cloned()
    }

    pub async fn snapshot(&self) -> PatientState {
        self.state.read().await.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub async fn clear_error(&self) {
        self.state.write().await.last_error = None;
    }

    /// 清空缓存（注销时使用）
    pub async fn reset(&self) {
        *self.state.write().await = PatientState::default();
    }

    /// 记录操作结果：失败时保存错误信息，成功时清除
    async fn settle<T>(&self, result: Result<T>) -> Result<T> {
        let mut state = self.state.write().await;
        match &result {
            Ok(_) => state.last_error = None,
            Err(e) => {
                error!("患者操作失败: {}", e);
                state.last_error = Some(e.to_string());
            }
        }
        result
    }
}

/// 按id替换或追加
fn upsert(records: &mut Vec<Patient>, record: Patient) {
    match records.iter_mut().find(|p| p.id == record.id) {
        Some(slot) => *slot = record,
        None => records.push(record),
    }
}
