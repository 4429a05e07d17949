//! # MHCQMS Core
//!
//! 健康检查排队管理控制台的核心模块，提供领域数据结构、统一错误定义、
//! 输入校验和通用工具。

pub mod error;
pub mod models;
pub mod utils;
pub mod validation;

pub use error::{QueueError, Result, ValidationErrors};
pub use models::*;
