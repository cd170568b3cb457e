//! # pipeline-runner
//!
//! 在隔离的分层 Realm 中单次运行流水线定义：平台 ← 宿主 ← 引导层 ← 负载

pub mod error;
pub mod home;
pub mod launcher;
pub mod observability;

// Re-export commonly used types
pub use error::{Error, Result};
pub use home::RunHome;
pub use launcher::{BootLayout, BootRealms, Launch, LaunchMode, LaunchSettings};
pub use runner_common::config::RunnerConfig;
