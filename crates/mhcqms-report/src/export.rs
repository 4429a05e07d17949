//! CSV导出

use chrono::{DateTime, NaiveDate, Utc};
use mhcqms_core::{Patient, Priority, Result, WaitBand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::filter::ReportPeriod;

const HEADERS: [&str; 9] = [
    "Name",
    "Age",
    "Gender",
    "Contact",
    "Priority",
    "Appointment Time",
    "Served At",
    "Wait Time (minutes)",
    "Symptoms",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MISSING: &str = "N/A";

/// 已完成记录的CSV报表
pub struct CsvReport;

impl CsvReport {
    /// 生成CSV文本：首行表头，每条记录一行，所有字段加双引号，行间以 `\n` 分隔
    pub fn render<'a>(records: impl IntoIterator<Item = &'a Patient>, today: NaiveDate) -> String {
        let mut lines = vec![csv_row(HEADERS.iter().map(|h| h.to_string()))];
        lines.extend(records.into_iter().map(|p| csv_row(row(p, today))));
        lines.join("\n")
    }
}

fn row(patient: &Patient, today: NaiveDate) -> Vec<String> {
    vec![
        patient.full_name(),
        patient
            .age_on(today)
            .map_or_else(|| MISSING.to_string(), |age| age.to_string()),
        patient.gender.to_string(),
        patient.contact().to_string(),
        patient.priority.label().to_string(),
        format_timestamp(patient.created_at),
        format_timestamp(patient.served_at),
        patient
            .wait_time
            .map_or_else(|| MISSING.to_string(), |minutes| minutes.to_string()),
        patient
            .symptoms
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(MISSING)
            .to_string(),
    ]
}

fn format_timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(
        || MISSING.to_string(),
        |ts| ts.format(TIMESTAMP_FORMAT).to_string(),
    )
}

fn csv_row(fields: impl IntoIterator<Item = String>) -> String {
    fields
        .into_iter()
        .map(|field| quote(&field))
        .collect::<Vec<_>>()
        .join(",")
}

/// 所有字段都加引号，内部双引号转义为两个
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// 导出文件名：`mhcqms_report_<范围>_<YYYY-MM-DD>.csv`
pub fn report_file_name(period: ReportPeriod, date: NaiveDate) -> String {
    format!("mhcqms_report_{}_{}.csv", period, date.format("%Y-%m-%d"))
}

/// 报表统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    /// 平均等待分钟数（缺失按0计，四舍五入）
    pub average_wait_time: u32,
    pub priority_counts: BTreeMap<Priority, usize>,
    /// 按登记到就诊的实际时长分档计数，时间缺失的记录不计入
    pub wait_bands: BTreeMap<WaitBand, usize>,
}

impl ReportSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Patient>) -> Self {
        let mut summary = ReportSummary {
            priority_counts: Priority::ALL.into_iter().map(|p| (p, 0)).collect(),
            wait_bands: WaitBand::ALL.into_iter().map(|b| (b, 0)).collect(),
            ..Default::default()
        };
        let mut waits = Vec::new();
        for patient in records {
            summary.total += 1;
            waits.push(patient.wait_minutes());
            *summary.priority_counts.entry(patient.priority).or_insert(0) += 1;
            if let Some(band) = patient.wait_band() {
                *summary.wait_bands.entry(band).or_insert(0) += 1;
            }
        }
        summary.average_wait_time = mhcqms_core::utils::rounded_mean(waits);
        summary
    }
}

/// 将报表写入目录，返回文件路径
pub async fn write_report(
    dir: &Path,
    period: ReportPeriod,
    now: DateTime<Utc>,
    records: &[&Patient],
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let today = now.date_naive();
    let path = dir.join(report_file_name(period, today));
    let contents = CsvReport::render(records.iter().copied(), today);
    tokio::fs::write(&path, contents).await?;

    info!("已导出 {} 条记录到 {}", records.len(), path.display());
    Ok(path)
}
