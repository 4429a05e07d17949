//! 报表筛选条件

use chrono::{DateTime, Duration, Months, Utc};
use mhcqms_core::{Patient, Priority};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 就诊时间范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    #[default]
    Today, // 当天
    Week,  // 最近7天
    Month, // 最近一个月
    All,   // 不限
}

impl ReportPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportPeriod::Today => "today",
            ReportPeriod::Week => "week",
            ReportPeriod::Month => "month",
            ReportPeriod::All => "all",
        }
    }

    /// 判断就诊时间是否落在范围内；缺少就诊时间的记录只在 `All` 下保留
    pub fn contains(self, served_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        if self == ReportPeriod::All {
            return true;
        }
        let Some(served_at) = served_at else {
            return false;
        };
        match self {
            ReportPeriod::Today => served_at.date_naive() == now.date_naive(),
            ReportPeriod::Week => served_at >= now - Duration::days(7),
            ReportPeriod::Month => match now.checked_sub_months(Months::new(1)) {
                Some(start) => served_at >= start,
                None => true,
            },
            ReportPeriod::All => true,
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(ReportPeriod::Today),
            "week" => Ok(ReportPeriod::Week),
            "month" => Ok(ReportPeriod::Month),
            "all" => Ok(ReportPeriod::All),
            other => Err(format!("unknown report period: {}", other)),
        }
    }
}

/// 已完成记录的筛选条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    /// 姓名（不区分大小写）或联系电话的子串
    pub search: Option<String>,
    pub period: ReportPeriod,
    pub priority: Option<Priority>,
}

impl ReportFilter {
    pub fn matches(&self, patient: &Patient, now: DateTime<Utc>) -> bool {
        self.matches_search(patient)
            && self.priority.map_or(true, |p| patient.priority == p)
            && self.period.contains(patient.served_at, now)
    }

    fn matches_search(&self, patient: &Patient) -> bool {
        let term = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => term,
            _ => return true,
        };
        patient
            .full_name()
            .to_lowercase()
            .contains(&term.to_lowercase())
            || patient.contact().contains(term)
    }

    /// 按原有顺序筛选
    pub fn apply<'a>(&self, records: &'a [Patient], now: DateTime<Utc>) -> Vec<&'a Patient> {
        records.iter().filter(|p| self.matches(p, now)).collect()
    }
}
