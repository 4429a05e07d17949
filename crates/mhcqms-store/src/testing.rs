//! 测试辅助：资源接口的内存实现

use async_trait::async_trait;
use mhcqms_client::{PatientApi, QueueApi, Registration};
use mhcqms_core::{
    Patient, PatientUpdate, QueueCreate, QueueEntry, QueueError, QueueFilter, QueueStatus,
    QueueStatusUpdate, QueueSummary, QueueUpdate, RecordId, RegistrationPayload, Result,
};
use std::sync::Mutex;

pub(crate) fn patient(id: i64, first_name: &str, last_name: &str) -> Patient {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "first_name": first_name,
        "last_name": last_name,
        "date_of_birth": "1985-03-02",
        "gender": "female",
        "phone": "5551234567",
        "priority": 0,
        "created_at": "2025-06-01T09:00:00Z",
    }))
    .unwrap()
}

pub(crate) fn entry(id: i64, patient_id: i64, priority: u8, status: &str, check_in: &str) -> QueueEntry {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "patient_id": patient_id,
        "checkup_type": "General Checkup",
        "priority": priority,
        "status": status,
        "check_in_time": check_in,
    }))
    .unwrap()
}

fn rejected() -> QueueError {
    QueueError::Submission {
        status: 500,
        message: "Internal Server Error".into(),
    }
}

/// 内存中的患者后端
#[derive(Default)]
pub(crate) struct FakePatientApi {
    pub active: Mutex<Vec<Patient>>,
    pub completed: Mutex<Vec<Patient>>,
    pub next_id: Mutex<i64>,
    /// 为真时所有调用都返回500
    pub failing: Mutex<bool>,
}

impl FakePatientApi {
    pub fn with_active(active: Vec<Patient>) -> Self {
        let api = Self::default();
        *api.next_id.lock().unwrap() = 100;
        *api.active.lock().unwrap() = active;
        api
    }

    pub fn fail(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock().unwrap() {
            return Err(rejected());
        }
        Ok(())
    }

    fn build(&self, payload: &RegistrationPayload) -> Patient {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let mut record = patient(*next_id, &payload.first_name, &payload.last_name);
        record.date_of_birth = Some(payload.date_of_birth);
        record.gender = payload.gender;
        record.phone = Some(payload.phone.clone());
        record.checkup_type = Some(payload.checkup_type.clone());
        record.priority = payload.priority;
        record.symptoms = payload.medical_history.clone();
        record.estimated_wait_time = Some(payload.estimated_wait_time);
        record
    }
}

#[async_trait]
impl PatientApi for FakePatientApi {
    async fn list(&self) -> Result<Vec<Patient>> {
        self.check()?;
        Ok(self.active.lock().unwrap().clone())
    }

    async fn list_completed(&self) -> Result<Vec<Patient>> {
        self.check()?;
        Ok(self.completed.lock().unwrap().clone())
    }

    async fn register(&self, payload: &RegistrationPayload) -> Result<Registration> {
        self.check()?;
        let record = self.build(payload);
        self.active.lock().unwrap().push(record.clone());
        Ok(Registration {
            patient: record,
            queue_entry: None,
        })
    }

    async fn create(&self, payload: &RegistrationPayload) -> Result<Patient> {
        self.check()?;
        let record = self.build(payload);
        self.active.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &RecordId, update: &PatientUpdate) -> Result<Patient> {
        self.check()?;
        let mut active = self.active.lock().unwrap();
        let record = active
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| QueueError::Submission {
                status: 404,
                message: "Patient not found".into(),
            })?;
        if let Some(phone) = &update.phone {
            record.phone = Some(phone.clone());
        }
        if let Some(first_name) = &update.first_name {
            record.first_name = first_name.clone();
        }
        Ok(record.clone())
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        self.check()?;
        self.active.lock().unwrap().retain(|p| &p.id != id);
        Ok(())
    }

    async fn serve(&self, id: &RecordId) -> Result<Patient> {
        self.check()?;
        let mut active = self.active.lock().unwrap();
        let position = active
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| QueueError::Submission {
                status: 404,
                message: "Patient not found".into(),
            })?;
        let mut record = active.remove(position);
        record.is_served = true;
        record.wait_time = Some(18);
        self.completed.lock().unwrap().push(record.clone());
        Ok(record)
    }
}

/// 内存中的排队后端
#[derive(Default)]
pub(crate) struct FakeQueueApi {
    pub entries: Mutex<Vec<QueueEntry>>,
    pub next_id: Mutex<i64>,
    pub transitions: Mutex<Vec<(RecordId, QueueStatus)>>,
}

impl FakeQueueApi {
    pub fn with_entries(entries: Vec<QueueEntry>) -> Self {
        let api = Self::default();
        *api.next_id.lock().unwrap() = 100;
        *api.entries.lock().unwrap() = entries;
        api
    }

    fn not_found() -> QueueError {
        QueueError::Submission {
            status: 404,
            message: "Queue entry not found".into(),
        }
    }
}

#[async_trait]
impl QueueApi for FakeQueueApi {
    async fn list(&self, filter: &QueueFilter) -> Result<Vec<QueueEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| filter.status.map_or(true, |s| e.status == s))
            .filter(|e| filter.priority.map_or(true, |p| e.priority == p))
            .skip(filter.skip as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &RecordId) -> Result<QueueEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| &e.id == id)
            .cloned()
            .ok_or_else(Self::not_found)
    }

    async fn create(&self, data: &QueueCreate) -> Result<QueueEntry> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let mut created = entry(*next_id, 0, data.priority.level(), "waiting", "2025-06-01T10:00:00Z");
        created.patient_id = data.patient_id.clone();
        created.checkup_type = data.checkup_type.clone();
        created.notes = data.notes.clone();
        created.estimated_wait_time = data.estimated_wait_time;
        self.entries.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &RecordId, data: &QueueUpdate) -> Result<QueueEntry> {
        let mut entries = self.entries.lock().unwrap();
        let existing = entries
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(Self::not_found)?;
        if let Some(priority) = data.priority {
            existing.priority = priority;
        }
        if let Some(notes) = &data.notes {
            existing.notes = Some(notes.clone());
        }
        Ok(existing.clone())
    }

    async fn transition(&self, id: &RecordId, update: &QueueStatusUpdate) -> Result<QueueEntry> {
        self.transitions
            .lock()
            .unwrap()
            .push((id.clone(), update.status));
        let mut entries = self.entries.lock().unwrap();
        let existing = entries
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(Self::not_found)?;
        existing.status = update.status;
        if update.notes.is_some() {
            existing.notes = update.notes.clone();
        }
        Ok(existing.clone())
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| &e.id != id);
        if entries.len() == before {
            return Err(Self::not_found());
        }
        Ok(())
    }

    async fn summary(&self) -> Result<QueueSummary> {
        let entries = self.entries.lock().unwrap();
        let count = |status: QueueStatus| entries.iter().filter(|e| e.status == status).count() as u32;
        Ok(QueueSummary {
            total_waiting: count(QueueStatus::Waiting),
            total_in_progress: count(QueueStatus::InProgress),
            total_completed: count(QueueStatus::Completed),
            total_cancelled: count(QueueStatus::Cancelled),
            average_wait_time: 0,
            estimated_completion_time: None,
        })
    }
}
