//! SNSエンベロープ
//!
//! SNSがHTTP(S)エンドポイントへ配信するJSONボディを型付きで扱う。
//! - `Type`フィールドによる種別判定
//! - Notificationからの`Message`/`Subject`抽出
//! - SubscriptionConfirmation/UnsubscribeConfirmationからの`TopicArn`/`Token`抽出

use crate::error::ResolveError;
use crate::parameter::ParameterMarker;
use serde::Deserialize;
use std::fmt;

/// SNSメッセージ種別を示すHTTPヘッダー名
pub const MESSAGE_TYPE_HEADER: &str = "x-amz-sns-message-type";

/// SNSメッセージ種別（`Type`フィールド）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum MessageType {
    /// 通知メッセージ（アプリケーションのペイロードを含む）
    Notification,
    /// サブスクリプション確認
    SubscriptionConfirmation,
    /// サブスクリプション解除確認
    UnsubscribeConfirmation,
    /// 未知の種別（値をそのまま保持）
    Other(String),
}

impl MessageType {
    /// 種別の文字列表現を取得
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Notification => "Notification",
            MessageType::SubscriptionConfirmation => "SubscriptionConfirmation",
            MessageType::UnsubscribeConfirmation => "UnsubscribeConfirmation",
            MessageType::Other(other) => other,
        }
    }

    /// サブスクリプション制御メッセージかどうか
    pub fn is_subscription_control(&self) -> bool {
        matches!(
            self,
            MessageType::SubscriptionConfirmation | MessageType::UnsubscribeConfirmation
        )
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Notification" => MessageType::Notification,
            "SubscriptionConfirmation" => MessageType::SubscriptionConfirmation,
            "UnsubscribeConfirmation" => MessageType::UnsubscribeConfirmation,
            _ => MessageType::Other(value),
        }
    }
}

impl From<&str> for MessageType {
    fn from(value: &str) -> Self {
        MessageType::from(value.to_string())
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SNSエンベロープ
///
/// `Type`以外のフィールドは種別によって存在しないため、すべてOptionで保持する。
/// `Message`は文字列であることが前提で、数値やオブジェクトの場合はパースエラーになる。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnsEnvelope {
    /// メッセージ種別
    #[serde(rename = "Type")]
    pub message_type: MessageType,
    pub message_id: Option<String>,
    pub topic_arn: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<String>,
    /// サブスクリプション確認用トークン
    pub token: Option<String>,
    #[serde(rename = "SubscribeURL")]
    pub subscribe_url: Option<String>,
    #[serde(rename = "UnsubscribeURL")]
    pub unsubscribe_url: Option<String>,
    pub signature_version: Option<String>,
    pub signature: Option<String>,
    #[serde(rename = "SigningCertURL")]
    pub signing_cert_url: Option<String>,
}

impl SnsEnvelope {
    /// リクエストボディ（テキスト）をパースする
    ///
    /// # Returns
    /// * `Ok(SnsEnvelope)` - パース成功時
    /// * `Err(ResolveError::MalformedBody)` - JSONでない、または`Type`がない場合
    pub fn parse(body: &str) -> Result<Self, ResolveError> {
        serde_json::from_str(body).map_err(|e| {
            ResolveError::MalformedBody(format!("SNSエンベロープのパースに失敗しました: {}", e))
        })
    }

    /// Notificationであることを要求する
    ///
    /// 他の種別の場合は`marker`付きのエラーを返す。
    pub fn require_notification(&self, marker: ParameterMarker) -> Result<(), ResolveError> {
        if self.message_type == MessageType::Notification {
            Ok(())
        } else {
            Err(ResolveError::NotANotification {
                marker,
                actual: self.message_type.clone(),
            })
        }
    }

    /// Notificationの`Message`を取り出す
    ///
    /// 値には一切変換を加えない。
    pub fn into_notification_message(self) -> Result<String, ResolveError> {
        self.require_notification(ParameterMarker::NotificationMessage)?;
        self.message.ok_or_else(|| {
            ResolveError::MalformedBody("Notificationに Message フィールドがありません".to_string())
        })
    }

    /// Notificationの`Subject`を取り出す（件名なしはNone）
    pub fn into_notification_subject(self) -> Result<Option<String>, ResolveError> {
        self.require_notification(ParameterMarker::NotificationSubject)?;
        Ok(self.subject)
    }

    /// サブスクリプション制御メッセージの`TopicArn`と`Token`を取り出す
    pub fn into_confirmation(self) -> Result<(MessageType, String, String), ResolveError> {
        if !self.message_type.is_subscription_control() {
            return Err(ResolveError::NotASubscriptionControl {
                actual: self.message_type,
            });
        }

        let topic_arn = self.topic_arn.ok_or_else(|| {
            ResolveError::MalformedBody("TopicArn フィールドがありません".to_string())
        })?;
        let token = self
            .token
            .ok_or_else(|| ResolveError::MalformedBody("Token フィールドがありません".to_string()))?;

        Ok((self.message_type, topic_arn, token))
    }
}
