//! Base 基础设施库
//!
//! 为 pipeline runner 各层提供共享组件：配置、跨 Realm 传递的运行选项与统一错误模型

pub mod config;
pub mod error;
pub mod options;

pub use config::{DEFAULT_CONFIG_FILE, LayoutConfig, LogConfig, ObservabilityConfig, RunnerConfig};
pub use error::{ConfigError, RunError};
pub use options::{RUN_OPTIONS_TYPE, RunOptions};
