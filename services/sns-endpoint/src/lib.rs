//! SNS HTTP(S)サブスクリプション受信エンドポイント
//!
//! SNSが配信するJSONエンベロープから、ハンドラー引数に値を解決する。
//! - 通知メッセージの抽出 (`NotificationMessage`)
//! - 件名の抽出 (`NotificationSubject`)
//! - サブスクリプション確認 (`NotificationStatus`)
//!
//! 受信エンドポイントは`x-amz-sns-message-type`ヘッダーで処理を振り分ける。

pub mod config;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod logging;
pub mod parameter;
pub mod resolver;
pub mod sns_ops;

pub use config::{ConfigError, EndpointConfig};
pub use envelope::{MESSAGE_TYPE_HEADER, MessageType, SnsEnvelope};
pub use error::{ApiError, ApiErrorBody, ResolveError};
pub use extract::{FromMessageText, NotificationMessage, NotificationSubject};
pub use logging::init_logging;
pub use parameter::{
    BindingContext, DeclaredType, HandlerSignature, ParameterDescriptor, ParameterMarker,
};
pub use resolver::{
    ArgumentResolver, NotificationMessageResolver, NotificationStatus, NotificationStatusResolver,
    NotificationSubjectResolver, ResolvedArgument,
};
pub use sns_ops::{AwsSnsOps, SnsOps, SnsOpsError};

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::Span;

/// ログに出す通知メッセージ本文の最大文字数
const MESSAGE_PREVIEW_CHARS: usize = 64;

/// アプリケーション状態
///
/// ルーター全体で共有される状態を保持する。
#[derive(Clone)]
pub struct AppState {
    /// エンドポイント設定
    pub config: Arc<EndpointConfig>,
    /// SNS操作（サブスクリプション確認用）
    pub sns: Arc<dyn SnsOps>,
}

impl AppState {
    pub fn new(config: EndpointConfig, sns: Arc<dyn SnsOps>) -> Self {
        Self {
            config: Arc::new(config),
            sns,
        }
    }
}

impl FromRef<AppState> for Arc<dyn SnsOps> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.sns)
    }
}

/// 通知メッセージ本文をログ用に切り詰める
///
/// 文字境界で切り、超過分は`...`で示す。
fn message_preview(message: &str) -> String {
    let mut chars = message.chars();
    let preview: String = chars.by_ref().take(MESSAGE_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// リクエストspanを作成する
///
/// SNSメッセージ種別ヘッダーをspanのフィールドとして記録する。
fn make_request_span(request: &Request) -> Span {
    let message_type = request
        .headers()
        .get(MESSAGE_TYPE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "sns_request",
        method = %request.method(),
        uri = %request.uri(),
        sns_message_type = %message_type,
    )
}

/// ヘルスチェックエンドポイント
async fn health() -> &'static str {
    "OK"
}

/// SNS受信エンドポイント (POST {topic_path})
///
/// `x-amz-sns-message-type`ヘッダーで処理を振り分ける。
/// ヘッダーとボディの`Type`が食い違う場合はボディ側の検証で400になる。
///
/// # Returns
/// - 204 No Content: 通知を受信した
/// - 200 OK: サブスクリプションを確認した / 解除確認を受信した
/// - 202 Accepted: 自動確認が無効なため確認を保留した
/// - 400 Bad Request: ヘッダー欠落・未知の種別・ボディ不正
/// - 502 Bad Gateway: SNS APIの呼び出しに失敗
async fn receive_topic_message(State(state): State<AppState>, request: Request) -> Response {
    let message_type = request
        .headers()
        .get(MESSAGE_TYPE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(MessageType::from);

    match message_type {
        Some(MessageType::Notification) => receive_notification(&state, request).await,
        Some(message_type) if message_type.is_subscription_control() => {
            receive_subscription_control(&state, request).await
        }
        Some(other) => {
            tracing::warn!(message_type = %other, "未対応のSNSメッセージ種別");
            ApiError::bad_request(format!("未対応のメッセージ種別です: {}", other))
                .into_response()
        }
        None => {
            tracing::warn!("SNSメッセージ種別ヘッダーがありません");
            ApiError::bad_request(format!("{} ヘッダーが必要です", MESSAGE_TYPE_HEADER))
                .into_response()
        }
    }
}

async fn receive_notification(state: &AppState, request: Request) -> Response {
    match NotificationMessage::<String>::from_request(request, state).await {
        Ok(NotificationMessage(message)) => {
            tracing::info!(message_length = message.len(), "通知メッセージを受信");
            tracing::debug!(message = %message_preview(&message), "通知メッセージ本文");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "通知メッセージの解決に失敗");
            e.into_response()
        }
    }
}

async fn receive_subscription_control(state: &AppState, request: Request) -> Response {
    let status = match NotificationStatus::from_request(request, state).await {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(error = %e, "サブスクリプション確認ハンドルの解決に失敗");
            return e.into_response();
        }
    };

    // 解除確認は記録のみ（再購読はしない）
    if *status.message_type() == MessageType::UnsubscribeConfirmation {
        tracing::info!(topic_arn = %status.topic_arn(), "サブスクリプション解除確認を受信");
        return StatusCode::OK.into_response();
    }

    if !state.config.auto_confirm_subscriptions {
        tracing::info!(
            topic_arn = %status.topic_arn(),
            "自動確認が無効のためサブスクリプション確認を保留"
        );
        return StatusCode::ACCEPTED.into_response();
    }

    match status.confirm_subscription().await {
        Ok(subscription_arn) => {
            tracing::info!(
                topic_arn = %status.topic_arn(),
                subscription_arn = %subscription_arn,
                "サブスクリプションを確認"
            );
            StatusCode::OK.into_response()
        }
        Err(e) => {
            tracing::error!(topic_arn = %status.topic_arn(), error = %e, "サブスクリプション確認エラー");
            ApiError::bad_gateway(e.to_string()).into_response()
        }
    }
}

/// ルーターを構築する
///
/// TraceLayerによりリクエスト/レスポンスの構造化ログを自動記録する。
pub fn create_router(state: AppState) -> Router {
    let topic_path = state.config.topic_path.clone();
    let body_limit = state.config.body_limit;

    Router::new()
        .route("/health", get(health))
        .route(&topic_path, post(receive_topic_message))
        .layer(DefaultBodyLimit::max(body_limit))
        // リクエストトレーシングレイヤー（method, path, status, latencyを自動記録）
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .with_state(state)
}
