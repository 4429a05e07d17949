//! 患者相关数据模型

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Gender, Priority, RecordId};
use crate::error::{QueueError, Result, ValidationErrors};
use crate::utils::{age_on, optional_timestamp};
use crate::validation::{
    check_optional_email, check_optional_phone, check_phone, check_required_text,
    check_wait_time, non_blank, DEFAULT_ESTIMATED_WAIT_MINUTES,
};

/// 患者记录
///
/// 同一结构同时承载待诊和已完成两类集合中的记录；是否已就诊由
/// `is_served` 或所在集合决定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Gender,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub checkup_type: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    /// 症状/病史备注
    #[serde(default, alias = "medical_history")]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub estimated_wait_time: Option<u32>,
    /// 登记时间（旧版称为预约时间）
    #[serde(
        default,
        alias = "appointment_time",
        alias = "appointmentTime",
        with = "optional_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "servedAt", with = "optional_timestamp")]
    pub served_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "isServed")]
    pub is_served: bool,
    /// 实际等待分钟数，由服务端在就诊完成时给出
    #[serde(default, alias = "waitTime")]
    pub wait_time: Option<u32>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.date_of_birth.and_then(|dob| age_on(dob, today))
    }

    /// 联系电话，缺失时为空串
    pub fn contact(&self) -> &str {
        self.phone.as_deref().unwrap_or("")
    }

    /// 统计口径的等待时间：缺失按0计
    pub fn wait_minutes(&self) -> u32 {
        self.wait_time.unwrap_or(0)
    }

    /// 是否已就诊
    pub fn served(&self) -> bool {
        self.is_served || self.served_at.is_some()
    }

    /// 从登记到就诊完成实际经过的分钟数，四舍五入
    ///
    /// 与服务端给出的 `wait_time` 相互独立；任一时间缺失时为 `None`。
    pub fn elapsed_wait_minutes(&self) -> Option<i64> {
        let elapsed = self.served_at? - self.created_at?;
        let minutes = elapsed.num_milliseconds() as f64 / 60_000.0;
        Some((minutes + 0.5).floor() as i64)
    }

    pub fn wait_band(&self) -> Option<WaitBand> {
        self.elapsed_wait_minutes().map(WaitBand::from_minutes)
    }
}

/// 实际等待时长分档
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitBand {
    Short,    // 不超过15分钟
    Moderate, // 不超过30分钟
    Long,     // 超过30分钟
}

impl WaitBand {
    pub const ALL: [WaitBand; 3] = [WaitBand::Short, WaitBand::Moderate, WaitBand::Long];

    pub fn from_minutes(minutes: i64) -> Self {
        match minutes {
            m if m <= 15 => WaitBand::Short,
            m if m <= 30 => WaitBand::Moderate,
            _ => WaitBand::Long,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WaitBand::Short => "short",
            WaitBand::Moderate => "moderate",
            WaitBand::Long => "long",
        }
    }
}

impl fmt::Display for WaitBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 患者登记表单输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRegistration {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub checkup_type: String,
    pub priority: Option<Priority>,
    pub symptoms: Option<String>,
    pub estimated_wait_time: Option<u32>,
}

/// 通过校验后提交给 `/patients/register` 的请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationPayload {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_history: Option<String>,
    pub checkup_type: String,
    pub priority: Priority,
    pub notes: Option<String>,
    pub estimated_wait_time: u32,
}

impl PatientRegistration {
    /// 校验必填字段并补全默认值
    ///
    /// 优先级缺省为 Normal，预估等待时间缺省为30分钟。
    pub fn validate(self, today: NaiveDate) -> Result<RegistrationPayload> {
        let mut errors = ValidationErrors::new();

        check_required_text(&mut errors, "first_name", "First name", &self.first_name, 2);
        check_required_text(&mut errors, "last_name", "Last name", &self.last_name, 2);
        match self.date_of_birth {
            None => errors.add("date_of_birth", "Date of birth is required"),
            Some(dob) if dob > today => errors.add("date_of_birth", "Please enter a valid date"),
            Some(_) => {}
        }
        if self.gender.is_none() {
            errors.add("gender", "Gender is required");
        }
        if self.phone.trim().is_empty() {
            errors.add("phone", "Phone number is required");
        } else {
            check_phone(&mut errors, "phone", &self.phone);
        }
        check_optional_email(&mut errors, "email", self.email.as_deref());
        check_optional_phone(&mut errors, "emergency_contact", self.emergency_contact.as_deref());
        check_required_text(&mut errors, "checkup_type", "Checkup type", &self.checkup_type, 3);

        let estimated_wait_time = self
            .estimated_wait_time
            .unwrap_or(DEFAULT_ESTIMATED_WAIT_MINUTES);
        check_wait_time(&mut errors, "estimated_wait_time", estimated_wait_time);

        let (date_of_birth, gender) = match (self.date_of_birth, self.gender) {
            (Some(dob), Some(gender)) if errors.is_empty() => (dob, gender),
            _ => return Err(QueueError::Validation(errors)),
        };
        let symptoms = non_blank(self.symptoms);

        Ok(RegistrationPayload {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            date_of_birth,
            gender,
            phone: self.phone.trim().to_string(),
            email: non_blank(self.email),
            address: non_blank(self.address),
            emergency_contact: non_blank(self.emergency_contact),
            medical_history: symptoms.clone(),
            checkup_type: self.checkup_type.trim().to_string(),
            priority: self.priority.unwrap_or_default(),
            notes: symptoms,
            estimated_wait_time,
        })
    }
}

/// 患者信息部分更新，仅序列化已填写字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self == &PatientUpdate::default()
    }

    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if self.is_empty() {
            errors.add("update", "No fields to update");
        }
        if let Some(first_name) = &self.first_name {
            check_required_text(&mut errors, "first_name", "First name", first_name, 2);
        }
        if let Some(last_name) = &self.last_name {
            check_required_text(&mut errors, "last_name", "Last name", last_name, 2);
        }
        if matches!(self.date_of_birth, Some(dob) if dob > today) {
            errors.add("date_of_birth", "Please enter a valid date");
        }
        if let Some(phone) = &self.phone {
            check_phone(&mut errors, "phone", phone);
        }
        check_optional_email(&mut errors, "email", self.email.as_deref());
        check_optional_phone(&mut errors, "emergency_contact", self.emergency_contact.as_deref());
        errors.into_result()
    }
}

/// 排队统计（由本地缓存推导）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientStats {
    pub total_in_queue: usize,
    pub total_served: usize,
    pub average_wait_time: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn jane() -> PatientRegistration {
        PatientRegistration {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 3, 2),
            gender: Some(Gender::Female),
            phone: "5551234567".into(),
            checkup_type: "General Checkup".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_registration_defaults() {
        let payload = jane().validate(today()).unwrap();
        assert_eq!(payload.priority, Priority::Normal);
        assert_eq!(payload.estimated_wait_time, 30);
        assert_eq!(payload.email, None);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["date_of_birth"], "1985-03-02");
        assert_eq!(json["gender"], "female");
        assert_eq!(json["priority"], 0);
    }

    #[test]
    fn test_registration_reports_every_missing_field() {
        let err = PatientRegistration::default().validate(today()).unwrap_err();
        let QueueError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        for field in ["first_name", "last_name", "date_of_birth", "gender", "phone", "checkup_type"] {
            assert!(errors.contains(field), "missing error for {}", field);
        }
        assert!(!errors.contains("estimated_wait_time"));
    }

    #[test]
    fn test_registration_rejects_out_of_range_values() {
        let registration = PatientRegistration {
            date_of_birth: NaiveDate::from_ymd_opt(2030, 1, 1),
            estimated_wait_time: Some(600),
            emergency_contact: Some("not-a-phone".into()),
            ..jane()
        };
        let QueueError::Validation(errors) = registration.validate(today()).unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.contains("date_of_birth"));
        assert!(errors.contains("estimated_wait_time"));
        assert!(errors.contains("emergency_contact"));
    }

    #[test]
    fn test_patient_decodes_legacy_fields() {
        let json = r#"{
            "id": 12,
            "first_name": "Jane",
            "last_name": "Doe",
            "date_of_birth": "1985-03-02",
            "gender": "female",
            "phone": "5551234567",
            "priority": "high",
            "medical_history": "cough",
            "appointmentTime": "2025-06-01T09:00:00",
            "servedAt": "2025-06-01T09:18:00Z",
            "isServed": true,
            "waitTime": 18
        }"#;
        let patient: Patient = serde_json::from_str(json).unwrap();
        assert_eq!(patient.id, RecordId::Number(12));
        assert_eq!(patient.priority, Priority::Urgent);
        assert_eq!(patient.symptoms.as_deref(), Some("cough"));
        assert!(patient.served());
        assert_eq!(patient.wait_minutes(), 18);
        assert_eq!(patient.full_name(), "Jane Doe");
        assert_eq!(patient.age_on(today()), Some(40));
    }

    #[test]
    fn test_elapsed_wait_from_timestamps() {
        let mut patient: Patient = serde_json::from_value(serde_json::json!({
            "id": 3,
            "first_name": "Jane",
            "last_name": "Doe",
            "gender": "female",
            "appointment_time": "2025-06-01T09:00:00Z",
            "served_at": "2025-06-01T09:40:30Z",
            "wait_time": 12
        }))
        .unwrap();

        // 服务端的wait_time不参与计算
        assert_eq!(patient.elapsed_wait_minutes(), Some(41));
        assert_eq!(patient.wait_band(), Some(WaitBand::Long));
        assert_eq!(patient.wait_minutes(), 12);

        patient.served_at = "2025-06-01T09:15:29Z".parse().ok();
        assert_eq!(patient.elapsed_wait_minutes(), Some(15));
        assert_eq!(patient.wait_band(), Some(WaitBand::Short));

        patient.served_at = None;
        assert_eq!(patient.elapsed_wait_minutes(), None);
        assert_eq!(patient.wait_band(), None);
    }

    #[test]
    fn test_wait_band_boundaries() {
        assert_eq!(WaitBand::from_minutes(0), WaitBand::Short);
        assert_eq!(WaitBand::from_minutes(15), WaitBand::Short);
        assert_eq!(WaitBand::from_minutes(16), WaitBand::Moderate);
        assert_eq!(WaitBand::from_minutes(30), WaitBand::Moderate);
        assert_eq!(WaitBand::from_minutes(31), WaitBand::Long);
        assert_eq!(WaitBand::Moderate.to_string(), "moderate");
    }

    #[test]
    fn test_update_only_serializes_present_fields() {
        let update = PatientUpdate {
            phone: Some("5559876543".into()),
            ..Default::default()
        };
        update.validate(today()).unwrap();
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"phone":"5559876543"}"#
        );
        assert!(PatientUpdate::default().validate(today()).is_err());
    }
}
