//! 引数リゾルバー
//!
//! ハンドラー引数の記述子とリクエストから、SNSエンベロープ由来の値を解決する。
//! - `NotificationMessageResolver`: Notificationの`Message`
//! - `NotificationSubjectResolver`: Notificationの`Subject`
//! - `NotificationStatusResolver`: サブスクリプション確認ハンドル
//!
//! 解決は1リクエストにつき1回で、ボディは一度だけ読み込まれる。

use crate::envelope::{MessageType, SnsEnvelope};
use crate::error::ResolveError;
use crate::parameter::{BindingContext, DeclaredType, ParameterDescriptor, ParameterMarker};
use crate::sns_ops::{SnsOps, SnsOpsError};
use async_trait::async_trait;
use axum::extract::Request;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 解決された引数値
#[derive(Debug, Clone)]
pub enum ResolvedArgument {
    /// メッセージ本文（無変換）
    Text(String),
    /// JSONとして解釈したメッセージ本文
    Json(Value),
    /// 件名
    Subject(Option<String>),
    /// サブスクリプション確認ハンドル
    Status(NotificationStatus),
}

/// 引数リゾルバートレイト
#[async_trait]
pub trait ArgumentResolver: Send + Sync {
    /// 引数に対応しているか
    fn supports_parameter(&self, parameter: &ParameterDescriptor) -> bool;

    /// リクエストから引数値を解決する
    ///
    /// # 戻り値
    /// * `Ok(ResolvedArgument)` - 解決された値（常に1つ）
    /// * `Err(ResolveError)` - 解決失敗
    async fn resolve_argument(
        &self,
        parameter: &ParameterDescriptor,
        context: &BindingContext,
        request: Request,
    ) -> Result<ResolvedArgument, ResolveError>;
}

/// リクエストボディ全体をテキストとして読み込む
///
/// Content-Typeは検査しない（SNSはtext/plainで配信する）。
pub async fn read_body_text(
    request: Request,
    context: &BindingContext,
) -> Result<String, ResolveError> {
    let bytes = axum::body::to_bytes(request.into_body(), context.body_limit())
        .await
        .map_err(|e| ResolveError::BodyRead(e.to_string()))?;

    String::from_utf8(bytes.to_vec()).map_err(|e| ResolveError::BodyRead(e.to_string()))
}

fn unsupported(parameter: &ParameterDescriptor) -> ResolveError {
    ResolveError::UnsupportedParameter(format!(
        "{} (index: {}, type: {:?})",
        parameter.name, parameter.index, parameter.declared_type
    ))
}

/// Notificationの`Message`を解決するリゾルバー
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationMessageResolver;

impl NotificationMessageResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArgumentResolver for NotificationMessageResolver {
    fn supports_parameter(&self, parameter: &ParameterDescriptor) -> bool {
        parameter.has_marker(ParameterMarker::NotificationMessage)
            && parameter.declared_type.accepts_message_text()
    }

    async fn resolve_argument(
        &self,
        parameter: &ParameterDescriptor,
        context: &BindingContext,
        request: Request,
    ) -> Result<ResolvedArgument, ResolveError> {
        if !self.supports_parameter(parameter) {
            return Err(unsupported(parameter));
        }

        let body = read_body_text(request, context).await?;
        let message = SnsEnvelope::parse(&body)?.into_notification_message()?;

        debug!(
            parameter = %parameter.name,
            message_length = message.len(),
            "通知メッセージを解決"
        );

        match parameter.declared_type {
            DeclaredType::Text => Ok(ResolvedArgument::Text(message)),
            DeclaredType::Json => serde_json::from_str(&message)
                .map(ResolvedArgument::Json)
                .map_err(|e| ResolveError::Conversion(e.to_string())),
            _ => Err(unsupported(parameter)),
        }
    }
}

/// Notificationの`Subject`を解決するリゾルバー
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationSubjectResolver;

impl NotificationSubjectResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArgumentResolver for NotificationSubjectResolver {
    fn supports_parameter(&self, parameter: &ParameterDescriptor) -> bool {
        parameter.has_marker(ParameterMarker::NotificationSubject)
            && parameter.declared_type == DeclaredType::Text
    }

    async fn resolve_argument(
        &self,
        parameter: &ParameterDescriptor,
        context: &BindingContext,
        request: Request,
    ) -> Result<ResolvedArgument, ResolveError> {
        if !self.supports_parameter(parameter) {
            return Err(unsupported(parameter));
        }

        let body = read_body_text(request, context).await?;
        let subject = SnsEnvelope::parse(&body)?.into_notification_subject()?;

        Ok(ResolvedArgument::Subject(subject))
    }
}

/// サブスクリプション確認ハンドル
///
/// SubscriptionConfirmation/UnsubscribeConfirmationを受け取ったハンドラーが、
/// 必要に応じてサブスクリプションを確認するために使う。
#[derive(Clone)]
pub struct NotificationStatus {
    message_type: MessageType,
    topic_arn: String,
    token: String,
    sns: Arc<dyn SnsOps>,
}

impl NotificationStatus {
    /// エンベロープから確認ハンドルを作成
    pub fn from_envelope(envelope: SnsEnvelope, sns: Arc<dyn SnsOps>) -> Result<Self, ResolveError> {
        let (message_type, topic_arn, token) = envelope.into_confirmation()?;
        Ok(Self {
            message_type,
            topic_arn,
            token,
            sns,
        })
    }

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// サブスクリプションを確認する
    ///
    /// 戻り値は確認されたサブスクリプションARN。
    pub async fn confirm_subscription(&self) -> Result<String, SnsOpsError> {
        self.sns
            .confirm_subscription(&self.topic_arn, &self.token)
            .await
    }
}

impl fmt::Debug for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationStatus")
            .field("message_type", &self.message_type)
            .field("topic_arn", &self.topic_arn)
            .finish_non_exhaustive()
    }
}

/// サブスクリプション確認ハンドルを解決するリゾルバー
#[derive(Clone)]
pub struct NotificationStatusResolver {
    sns: Arc<dyn SnsOps>,
}

impl NotificationStatusResolver {
    pub fn new(sns: Arc<dyn SnsOps>) -> Self {
        Self { sns }
    }
}

#[async_trait]
impl ArgumentResolver for NotificationStatusResolver {
    fn supports_parameter(&self, parameter: &ParameterDescriptor) -> bool {
        parameter.declared_type == DeclaredType::NotificationStatus
    }

    async fn resolve_argument(
        &self,
        parameter: &ParameterDescriptor,
        context: &BindingContext,
        request: Request,
    ) -> Result<ResolvedArgument, ResolveError> {
        if !self.supports_parameter(parameter) {
            return Err(unsupported(parameter));
        }

        let body = read_body_text(request, context).await?;
        let envelope = SnsEnvelope::parse(&body)?;
        let status = NotificationStatus::from_envelope(envelope, Arc::clone(&self.sns))?;

        debug!(
            parameter = %parameter.name,
            message_type = %status.message_type(),
            topic_arn = %status.topic_arn(),
            "サブスクリプション確認ハンドルを解決"
        );

        Ok(ResolvedArgument::Status(status))
    }
}
