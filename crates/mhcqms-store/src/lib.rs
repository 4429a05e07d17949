//! # MHCQMS状态存储
//!
//! 在远程资源之上维护本地缓存，包括：
//! - 患者存储：待诊/已完成两个集合、统计和最近一次错误
//! - 排队存储：排队条目缓存、状态流转校验和服务端统计
//! - 排队状态机：等待、检查中、完成、取消之间的合法转换
//! - 控制台上下文：统一持有客户端、会话和两个存储

pub mod context;
pub mod patient_store;
pub mod queue_store;
pub mod state_machine;

#[cfg(test)]
pub(crate) mod testing;

// 重新导出主要类型
pub use context::ConsoleContext;
pub use patient_store::{PatientState, PatientStore};
pub use queue_store::{QueueState, QueueStore};
pub use state_machine::{QueueEvent, QueueStateMachine};
