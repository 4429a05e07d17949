//! 控制台配置
//!
//! 依次叠加内置默认值、可选的TOML配置文件和 `MHCQMS__` 前缀的环境变量
//! （例如 `MHCQMS__API__BASE_URL`）。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use mhcqms_client::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// 默认配置文件名（当前目录，可缺省）
const DEFAULT_CONFIG_NAME: &str = "mhcqms";

/// 控制台完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// 远程接口
    pub api: ClientConfig,
    /// 会话凭证
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    /// 报表导出
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 凭证文件路径
    pub token_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            token_path: home.join(".mhcqms").join("token"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志过滤表达式，如 `info` 或 `mhcqms_client=debug`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./reports"),
        }
    }
}

impl ConsoleConfig {
    /// 加载配置；显式指定的文件必须存在
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };
        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("MHCQMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        let config: ConsoleConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;

        match path {
            Some(path) => info!("配置已加载: {}", path.display()),
            None => info!("配置已从默认值和环境变量加载"),
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.api.validate().context("Invalid api configuration")?;
        if self.logging.level.trim().is_empty() {
            anyhow::bail!("logging.level must not be empty");
        }
        if self.session.token_path.as_os_str().is_empty() {
            anyhow::bail!("session.token_path must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConsoleConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000/api/v1");
        assert_eq!(config.api.timeouts.login_ms, 15_000);
        assert!(config.session.token_path.ends_with(".mhcqms/token"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.toml");

        let mut expected = ConsoleConfig::default();
        expected.api.base_url = "https://queue.example.org/api/v1".into();
        expected.api.timeouts.default_ms = 5_000;
        expected.report.output_dir = dir.path().join("out");
        std::fs::write(&path, toml::to_string(&expected).unwrap()).unwrap();

        let config = ConsoleConfig::load(Some(&path)).unwrap();
        assert_eq!(config.api.base_url, "https://queue.example.org/api/v1");
        assert_eq!(config.api.timeouts.default_ms, 5_000);
        assert_eq!(config.api.timeouts.login_ms, 15_000);
        assert_eq!(config.report.output_dir, dir.path().join("out"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = ConsoleConfig::load(Some(&path)).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.api.timeouts.default_ms, 10_000);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.toml");
        std::fs::write(&path, "[api.timeouts]\ndefault_ms = 0\n").unwrap();

        assert!(ConsoleConfig::load(Some(&path)).is_err());
        assert!(ConsoleConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
