//! 统一错误处理模型
//!
//! 提供主程序 pipeline-runner 的顶层错误类型，聚合所有子 crate 的错误

use runner_common::{ConfigError, RunError};
use runner_realm::{BindError, DiscoveryError, ResolutionError, TargetNotFound};
use std::path::PathBuf;
use thiserror::Error;

/// 主程序的统一错误枚举
#[derive(Debug, Error)]
pub enum Error {
    // ========== 配置相关错误 ==========
    /// 配置文件相关错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 配置验证失败
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    // ========== Realm 引导错误 ==========
    /// 归档扫描或清单读取失败
    #[error("Archive discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// 分发目标不存在，展示完整诊断
    #[error("{}", .0.report())]
    TargetNotFound(Box<TargetNotFound>),

    /// 回退 Realm 重复绑定
    #[error(transparent)]
    Bind(#[from] BindError),

    /// 扩展模块依赖解析失败
    #[error("Dependency resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    // ========== 运行相关错误 ==========
    /// 负载返回的运行错误，原样传递
    #[error(transparent)]
    Run(#[from] RunError),

    /// --run-home 不可用
    #[error("--run-home {reason}: {path:?}")]
    RunHome { path: PathBuf, reason: String },

    /// --with-init-hooks 不可用
    #[error("--with-init-hooks {reason}: {path:?}")]
    InitHooks { path: PathBuf, reason: String },

    /// 插件列表文件格式错误
    #[error("{path:?} line {line}: {message}")]
    PluginList {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// 插件不在本地缓存中
    #[error("Extension module {name}:{version} is not cached at {path:?}")]
    PluginNotCached {
        name: String,
        version: String,
        path: PathBuf,
    },

    // ========== 系统级错误 ==========
    /// I/O 操作错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // ========== 通用错误 ==========
    /// 自定义错误消息
    #[error("Application error: {message}")]
    Custom { message: String },
}

impl From<TargetNotFound> for Error {
    fn from(err: TargetNotFound) -> Self {
        Error::TargetNotFound(Box::new(err))
    }
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 创建自定义错误
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// 创建配置验证失败错误
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn run_home(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::RunHome {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::custom("test error");
        assert!(matches!(err, Error::Custom { .. }));
    }

    #[test]
    fn test_run_error_is_transparent() {
        let err: Error = RunError::DefinitionNotFound {
            path: PathBuf::from("ci/Jenkinsfile"),
        }
        .into();
        assert_eq!(err.to_string(), "Pipeline definition not found: \"ci/Jenkinsfile\"");
    }
}
