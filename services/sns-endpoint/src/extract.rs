//! axumエクストラクター
//!
//! ハンドラー引数としてSNSエンベロープの値を受け取るための`FromRequest`実装。
//!
//! ```ignore
//! async fn receive(NotificationMessage(message): NotificationMessage) -> StatusCode {
//!     tracing::info!(message = %message, "通知を受信");
//!     StatusCode::NO_CONTENT
//! }
//! ```
//!
//! ボディを消費するため、1つのハンドラーで使えるのはいずれか1つのみ。

use crate::envelope::SnsEnvelope;
use crate::error::ResolveError;
use crate::resolver::NotificationStatus;
use crate::sns_ops::SnsOps;
use axum::Json;
use axum::extract::{FromRef, FromRequest, Request};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// メッセージ本文から生成できる型
pub trait FromMessageText: Sized {
    fn from_message_text(text: String) -> Result<Self, ResolveError>;
}

impl FromMessageText for String {
    fn from_message_text(text: String) -> Result<Self, ResolveError> {
        Ok(text)
    }
}

impl<T: DeserializeOwned> FromMessageText for Json<T> {
    fn from_message_text(text: String) -> Result<Self, ResolveError> {
        serde_json::from_str(&text)
            .map(Json)
            .map_err(|e| ResolveError::Conversion(e.to_string()))
    }
}

/// ボディを読み込んでエンベロープとしてパースする
///
/// ボディ上限は`DefaultBodyLimit`レイヤーに従う。
async fn read_envelope<S>(req: Request, state: &S) -> Result<SnsEnvelope, ResolveError>
where
    S: Send + Sync,
{
    let body = String::from_request(req, state)
        .await
        .map_err(|rejection| ResolveError::BodyRead(rejection.body_text()))?;

    SnsEnvelope::parse(&body)
}

/// Notificationの`Message`を受け取るエクストラクター
///
/// `NotificationMessage<String>`は本文をそのまま、
/// `NotificationMessage<Json<T>>`は本文をJSONとしてデシリアライズして受け取る。
#[derive(Debug, Clone)]
pub struct NotificationMessage<T = String>(pub T);

impl<S, T> FromRequest<S> for NotificationMessage<T>
where
    S: Send + Sync,
    T: FromMessageText + Send,
{
    type Rejection = ResolveError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let message = read_envelope(req, state).await?.into_notification_message()?;
        T::from_message_text(message).map(NotificationMessage)
    }
}

/// Notificationの`Subject`を受け取るエクストラクター
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSubject(pub Option<String>);

impl<S> FromRequest<S> for NotificationSubject
where
    S: Send + Sync,
{
    type Rejection = ResolveError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        read_envelope(req, state)
            .await?
            .into_notification_subject()
            .map(NotificationSubject)
    }
}

impl<S> FromRequest<S> for NotificationStatus
where
    S: Send + Sync,
    Arc<dyn SnsOps>: FromRef<S>,
{
    type Rejection = ResolveError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let sns = <Arc<dyn SnsOps> as FromRef<S>>::from_ref(state);
        let envelope = read_envelope(req, state).await?;
        NotificationStatus::from_envelope(envelope, sns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorBody;
    use crate::sns_ops::mock::MockSnsOps;
    use axum::Router;
    use axum::body::Body;
    use axum::extract::DefaultBodyLimit;
    use axum::http::{StatusCode, header};
    use axum::routing::post;
    use serde::Deserialize;
    use tower::ServiceExt;

    const NOTIFICATION: &str = include_str!("../fixtures/notification_message.json");
    const SUBSCRIPTION_CONFIRMATION: &str =
        include_str!("../fixtures/subscription_confirmation.json");

    fn post_topic(body: &str) -> Request {
        Request::builder()
            .uri("/topic")
            .method("POST")
            .header(header::CONTENT_TYPE, "text/plain; charset=UTF-8")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    // ========================================
    // NotificationMessageのテスト
    // ========================================

    /// ハンドラーがMessageをそのまま受け取ることを確認
    #[tokio::test]
    async fn test_notification_message_extracts_message() {
        async fn handler(NotificationMessage(message): NotificationMessage) -> String {
            message
        }

        let app = Router::new().route("/topic", post(handler));
        let response = app.oneshot(post_topic(NOTIFICATION)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "asdasd");
    }

    /// SubscriptionConfirmationでは400とエラーメッセージが返ることを確認
    #[tokio::test]
    async fn test_notification_message_rejects_subscription_confirmation() {
        async fn handler(NotificationMessage(message): NotificationMessage) -> String {
            message
        }

        let app = Router::new().route("/topic", post(handler));
        let response = app
            .oneshot(post_topic(SUBSCRIPTION_CONFIRMATION))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error_body: ApiErrorBody = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(error_body.error, "illegal_argument");
        assert!(error_body.message.contains(
            "are only allowed for method that receive a notification message."
        ));
    }

    /// 未知の種別ではMessageがあっても400になることを確認
    #[tokio::test]
    async fn test_notification_message_rejects_unknown_type() {
        async fn handler(NotificationMessage(message): NotificationMessage) -> String {
            message
        }

        let app = Router::new().route("/topic", post(handler));
        let response = app
            .oneshot(post_topic(r#"{"Type":"Heartbeat","Message":"x"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error_body: ApiErrorBody = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(error_body.error, "illegal_argument");
        assert!(error_body.message.contains("Heartbeat"));
    }

    #[derive(Debug, Deserialize)]
    struct OrderCreated {
        order_id: u64,
    }

    /// Json<T>でMessageがデシリアライズされることを確認
    #[tokio::test]
    async fn test_notification_message_json_is_deserialized() {
        async fn handler(
            NotificationMessage(Json(order)): NotificationMessage<Json<OrderCreated>>,
        ) -> String {
            order.order_id.to_string()
        }

        let app = Router::new().route("/topic", post(handler));
        let body = r#"{"Type":"Notification","Message":"{\"order_id\":42}"}"#;
        let response = app.oneshot(post_topic(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "42");
    }

    /// ボディ上限を超えるとBodyReadとして400が返ることを確認
    #[tokio::test]
    async fn test_notification_message_respects_body_limit() {
        async fn handler(NotificationMessage(message): NotificationMessage) -> String {
            message
        }

        let app = Router::new()
            .route("/topic", post(handler))
            .layer(DefaultBodyLimit::max(16));
        let response = app.oneshot(post_topic(NOTIFICATION)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error_body: ApiErrorBody = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(error_body.error, "bad_request");
    }

    /// JSONでないボディではmalformed_bodyが返ることを確認
    #[tokio::test]
    async fn test_notification_message_malformed_body() {
        async fn handler(NotificationMessage(message): NotificationMessage) -> String {
            message
        }

        let app = Router::new().route("/topic", post(handler));
        let response = app.oneshot(post_topic("{")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error_body: ApiErrorBody = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(error_body.error, "malformed_body");
    }

    // ========================================
    // NotificationSubjectのテスト
    // ========================================

    #[tokio::test]
    async fn test_notification_subject_extracts_subject() {
        async fn handler(NotificationSubject(subject): NotificationSubject) -> String {
            subject.unwrap_or_else(|| "<none>".to_string())
        }

        let app = Router::new().route("/topic", post(handler));

        let response = app.clone().oneshot(post_topic(NOTIFICATION)).await.unwrap();
        assert_eq!(body_string(response).await, "asdasd");

        let response = app
            .oneshot(post_topic(r#"{"Type":"Notification","Message":"m"}"#))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "<none>");
    }

    // ========================================
    // NotificationStatusのテスト
    // ========================================

    #[derive(Clone)]
    struct TestState {
        sns: Arc<dyn SnsOps>,
    }

    impl FromRef<TestState> for Arc<dyn SnsOps> {
        fn from_ref(state: &TestState) -> Self {
            Arc::clone(&state.sns)
        }
    }

    /// 状態からSnsOpsを取り出して確認ハンドルが作られることを確認
    #[tokio::test]
    async fn test_notification_status_confirms_with_state_sns() {
        async fn handler(status: NotificationStatus) -> StatusCode {
            match status.confirm_subscription().await {
                Ok(_) => StatusCode::OK,
                Err(_) => StatusCode::BAD_GATEWAY,
            }
        }

        let sns = Arc::new(MockSnsOps::new());
        let state = TestState { sns: sns.clone() };
        let app = Router::new()
            .route("/topic", post(handler))
            .with_state(state);

        let response = app
            .oneshot(post_topic(SUBSCRIPTION_CONFIRMATION))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(sns.confirmed().len(), 1);
    }

    /// Notificationに対して確認ハンドルを要求すると400になることを確認
    #[tokio::test]
    async fn test_notification_status_rejects_notification() {
        async fn handler(_status: NotificationStatus) -> StatusCode {
            StatusCode::OK
        }

        let sns = Arc::new(MockSnsOps::new());
        let state = TestState { sns: sns.clone() };
        let app = Router::new()
            .route("/topic", post(handler))
            .with_state(state);

        let response = app.oneshot(post_topic(NOTIFICATION)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(sns.confirmed().is_empty());
    }
}
