use thiserror::Error;

use crate::extensions::ExtensionError;
use crate::security::Right;

/// 仓储层错误
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("没有权限: 需要 {0}")]
    Unauthorized(Right),

    #[error("禁止的操作: {0}")]
    Forbidden(String),

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("数据无效: {0}")]
    Validation(String),

    #[error("冲突: {0}")]
    Conflict(String),

    #[error(transparent)]
    Query(#[from] super::query::QueryError),

    #[error("存储错误: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl RepositoryError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        RepositoryError::NotFound(what.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RepositoryError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        RepositoryError::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        RepositoryError::Forbidden(message.into())
    }
}

impl From<ExtensionError> for RepositoryError {
    fn from(error: ExtensionError) -> Self {
        match error {
            ExtensionError::NotFound(_) | ExtensionError::SettingsNotFound { .. } => {
                RepositoryError::NotFound(error.to_string())
            }
            _ => RepositoryError::Validation(error.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
