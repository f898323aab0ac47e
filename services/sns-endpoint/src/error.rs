//! エラーハンドリング
//!
//! - `ResolveError`: 引数解決の失敗種別
//! - `ApiError`: 統一されたエラーレスポンス形式
//!
//! すべてのエラーはJSON形式で返却され、`error`と`message`フィールドを含む。

use crate::envelope::MessageType;
use crate::parameter::ParameterMarker;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 引数解決のエラー型
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Notification以外のエンベロープに対してメッセージ抽出が要求された
    #[error(
        "{marker} annotated parameters are only allowed for method that receive a notification message. (Type: {actual})"
    )]
    NotANotification {
        marker: ParameterMarker,
        actual: MessageType,
    },

    /// サブスクリプション制御メッセージ以外に対して確認ハンドルが要求された
    #[error(
        "NotificationStatus is only available for subscription and unsubscription requests. (Type: {actual})"
    )]
    NotASubscriptionControl { actual: MessageType },

    /// ボディがJSONでない、または必須フィールドが不足
    #[error("malformed notification body: {0}")]
    MalformedBody(String),

    /// ボディの読み込みに失敗（上限超過、UTF-8以外を含む）
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// メッセージ本文を宣言型に変換できない
    #[error("failed to convert notification message: {0}")]
    Conversion(String),

    /// リゾルバーが対応していない引数で呼び出された
    #[error("unsupported parameter: {0}")]
    UnsupportedParameter(String),
}

impl ResolveError {
    /// レスポンスに使うステータスコード
    pub fn status(&self) -> StatusCode {
        match self {
            ResolveError::UnsupportedParameter(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// エラー種別の識別子
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::NotANotification { .. } | ResolveError::NotASubscriptionControl { .. } => {
                "illegal_argument"
            }
            ResolveError::MalformedBody(_) => "malformed_body",
            ResolveError::BodyRead(_) => "bad_request",
            ResolveError::Conversion(_) => "conversion_failed",
            ResolveError::UnsupportedParameter(_) => "internal_error",
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::UnsupportedParameter(_) => ApiError::internal_error(error.to_string()),
            _ => ApiError::new(error.status(), error.kind(), error.to_string()),
        }
    }
}

impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// APIエラーレスポンスのボディ
///
/// JSON形式で`error`（エラー種別）と`message`（詳細メッセージ）を含む。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiErrorBody {
    /// エラー種別（例: "bad_request", "illegal_argument", "internal_error"）
    pub error: String,
    /// 詳細なエラーメッセージ
    pub message: String,
}

/// APIエラー
///
/// ステータスコードとJSON形式のエラーボディを含む。
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorBody,
}

impl ApiError {
    /// 新しいApiErrorを作成
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                error: error.into(),
                message: message.into(),
            },
        }
    }

    /// 400 Bad Requestエラーを作成
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// 502 Bad Gatewayエラーを作成（SNS API呼び出し失敗）
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "bad_gateway", message)
    }

    /// 500 Internal Server Errorを作成
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn error(&self) -> &str {
        &self.body.error
    }

    pub fn message(&self) -> &str {
        &self.body.message
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
