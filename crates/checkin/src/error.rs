//! Checkin 服务错误定义

use crate::directory::DirectoryError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Checkin 服务错误类型
#[derive(Error, Debug)]
pub enum CheckinError {
    /// 状态记录不存在（与其他存储失败区分开）
    #[error("Status not found: table={table}, key={key}")]
    NotFound { table: String, key: String },

    /// 请求缺少必要字段
    #[error("Validation error: {0}")]
    Validation(String),

    /// 缺少身份或网关未注册
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// 网络状态表非空时拒绝删除
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// 通用存储错误，附带表和键上下文
    #[error("Storage error: {0}")]
    Io(String),

    /// Gateway directory 查询失败（原样传播）
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// JSON 序列化/反序列化错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CheckinError {
    pub fn not_found(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Whether the error means "no status yet" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP 状态码映射
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CheckinError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // 不向客户端暴露内部错误详情
            tracing::error!("Internal error: {:?}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": error_message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Checkin 结果类型别名
pub type CheckinResult<T> = Result<T, CheckinError>;
