//! # MHCQMS报表导出
//!
//! 对已完成就诊记录进行筛选、统计并导出为CSV文件。

pub mod export;
pub mod filter;

pub use export::{report_file_name, write_report, CsvReport, ReportSummary};
pub use filter::{ReportFilter, ReportPeriod};
