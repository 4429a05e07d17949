//! 输入校验
//!
//! 提交到远程接口之前的客户端字段检查。

use regex::Regex;
use std::sync::OnceLock;

use crate::error::ValidationErrors;

/// 预估等待时间上限（8小时）
pub const MAX_ESTIMATED_WAIT_MINUTES: u32 = 480;

/// 未填写预估等待时间时的默认值
pub const DEFAULT_ESTIMATED_WAIT_MINUTES: u32 = 30;

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[1-9]\d{0,15}$").expect("phone pattern is valid"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

pub fn is_valid_phone(value: &str) -> bool {
    phone_pattern().is_match(value.trim())
}

pub fn is_valid_email(value: &str) -> bool {
    email_pattern().is_match(value.trim())
}

/// 必填文本字段，要求去除空白后至少 `min_len` 个字符
pub fn check_required_text(
    errors: &mut ValidationErrors,
    field: &str,
    label: &str,
    value: &str,
    min_len: usize,
) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, format!("{} is required", label));
    } else if trimmed.chars().count() < min_len {
        errors.add(field, format!("{} must be at least {} characters", label, min_len));
    }
}

pub fn check_phone(errors: &mut ValidationErrors, field: &str, value: &str) {
    if !is_valid_phone(value) {
        errors.add(
            field,
            "Please enter a valid phone number (e.g., 1234567890 or +1234567890)",
        );
    }
}

/// 可选字段：空值视为未填写
pub fn check_optional_phone(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        check_phone(errors, field, value);
    }
}

pub fn check_optional_email(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        if !is_valid_email(value) {
            errors.add(field, "Please enter a valid email address");
        }
    }
}

pub fn check_wait_time(errors: &mut ValidationErrors, field: &str, minutes: u32) {
    if minutes > MAX_ESTIMATED_WAIT_MINUTES {
        errors.add(
            field,
            format!(
                "Wait time cannot exceed 8 hours ({} minutes)",
                MAX_ESTIMATED_WAIT_MINUTES
            ),
        );
    }
}

/// 空白字符串归一化为 `None`
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
