//! 流水线运行错误
//!
//! 由负载入口返回，跨 Realm 分发时原样传递给调用方

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Pipeline definition not found: {path:?}")]
    DefinitionNotFound { path: PathBuf },

    #[error("Invalid build parameter '{arg}', expected KEY=VALUE")]
    InvalidParameter { arg: String },

    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
