//! 资源接口
//!
//! 以trait形式定义患者和排队条目两类远程资源，`ApiClient` 提供HTTP实现，
//! 测试中可以替换为内存实现。

use async_trait::async_trait;
use mhcqms_core::{
    Patient, PatientUpdate, QueueCreate, QueueEntry, QueueFilter, QueueStatusUpdate,
    QueueSummary, QueueUpdate, RecordId, RegistrationPayload, Result,
};
use reqwest::Method;
use serde::Deserialize;
use tracing::info;

use crate::http::ApiClient;

/// 登记结果：患者记录，以及服务端同时创建的排队条目（如有）
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub patient: Patient,
    pub queue_entry: Option<QueueEntry>,
}

/// `/patients/register` 既可能返回包装结构也可能直接返回患者记录
#[derive(Deserialize)]
#[serde(untagged)]
enum RegistrationResponse {
    Envelope {
        patient: Patient,
        #[serde(default, alias = "queue")]
        queue_entry: Option<QueueEntry>,
    },
    Bare(Patient),
}

impl From<RegistrationResponse> for Registration {
    fn from(response: RegistrationResponse) -> Self {
        match response {
            RegistrationResponse::Envelope {
                patient,
                queue_entry,
            } => Registration {
                patient,
                queue_entry,
            },
            RegistrationResponse::Bare(patient) => Registration {
                patient,
                queue_entry: None,
            },
        }
    }
}

/// 患者资源接口
#[async_trait]
pub trait PatientApi: Send + Sync {
    /// 待诊患者列表
    async fn list(&self) -> Result<Vec<Patient>>;

    /// 已完成患者列表
    async fn list_completed(&self) -> Result<Vec<Patient>>;

    /// 登记患者并加入排队
    async fn register(&self, payload: &RegistrationPayload) -> Result<Registration>;

    /// 仅创建患者档案
    async fn create(&self, payload: &RegistrationPayload) -> Result<Patient>;

    async fn update(&self, id: &RecordId, update: &PatientUpdate) -> Result<Patient>;

    async fn delete(&self, id: &RecordId) -> Result<()>;

    /// 标记为已就诊，返回更新后的记录
    async fn serve(&self, id: &RecordId) -> Result<Patient>;
}

/// 排队条目资源接口
#[async_trait]
pub trait QueueApi: Send + Sync {
    async fn list(&self, filter: &QueueFilter) -> Result<Vec<QueueEntry>>;

    async fn get(&self, id: &RecordId) -> Result<QueueEntry>;

    async fn create(&self, data: &QueueCreate) -> Result<QueueEntry>;

    async fn update(&self, id: &RecordId, data: &QueueUpdate) -> Result<QueueEntry>;

    /// 状态变更
    async fn transition(&self, id: &RecordId, update: &QueueStatusUpdate) -> Result<QueueEntry>;

    async fn delete(&self, id: &RecordId) -> Result<()>;

    /// 服务端统计
    async fn summary(&self) -> Result<QueueSummary>;
}

#[async_trait]
impl PatientApi for ApiClient {
    async fn list(&self) -> Result<Vec<Patient>> {
        self.get_json(&["patients"], &[]).await
    }

    async fn list_completed(&self) -> Result<Vec<Patient>> {
        self.get_json(&["patients", "completed"], &[]).await
    }

    async fn register(&self, payload: &RegistrationPayload) -> Result<Registration> {
        let response: RegistrationResponse = self
            .send_json(Method::POST, &["patients", "register"], payload)
            .await?;
        let registration = Registration::from(response);
        info!("患者 {} 登记成功", registration.patient.id);
        Ok(registration)
    }

    async fn create(&self, payload: &RegistrationPayload) -> Result<Patient> {
        let patient: Patient = self.send_json(Method::POST, &["patients"], payload).await?;
        info!("患者档案 {} 已创建", patient.id);
        Ok(patient)
    }

    async fn update(&self, id: &RecordId, update: &PatientUpdate) -> Result<Patient> {
        let id = id.to_string();
        self.send_json(Method::PUT, &["patients", &id], update).await
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let id = id.to_string();
        self.delete_resource(&["patients", &id]).await
    }

    async fn serve(&self, id: &RecordId) -> Result<Patient> {
        let id = id.to_string();
        self.send_empty(Method::PATCH, &["patients", &id, "serve"]).await
    }
}

#[async_trait]
impl QueueApi for ApiClient {
    async fn list(&self, filter: &QueueFilter) -> Result<Vec<QueueEntry>> {
        self.get_json(&["queue"], &filter.query_pairs()).await
    }

    async fn get(&self, id: &RecordId) -> Result<QueueEntry> {
        let id = id.to_string();
        self.get_json(&["queue", &id], &[]).await
    }

    async fn create(&self, data: &QueueCreate) -> Result<QueueEntry> {
        self.send_json(Method::POST, &["queue"], data).await
    }

    async fn update(&self, id: &RecordId, data: &QueueUpdate) -> Result<QueueEntry> {
        let id = id.to_string();
        self.send_json(Method::PUT, &["queue", &id], data).await
    }

    async fn transition(&self, id: &RecordId, update: &QueueStatusUpdate) -> Result<QueueEntry> {
        let id = id.to_string();
        self.send_json(Method::PATCH, &["queue", &id, "status"], update)
            .await
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let id = id.to_string();
        self.delete_resource(&["queue", &id]).await
    }

    async fn summary(&self) -> Result<QueueSummary> {
        self.get_json(&["queue", "stats", "summary"], &[]).await
    }
}
