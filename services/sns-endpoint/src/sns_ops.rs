//! SNS操作モジュール
//!
//! サブスクリプション確認（ConfirmSubscription API）を提供する。

use async_trait::async_trait;
use aws_sdk_sns::Client as SnsClient;
use thiserror::Error;
use tracing::{info, warn};

/// SNS操作のエラー型
#[derive(Debug, Error)]
pub enum SnsOpsError {
    /// AWS SDK エラー
    #[error("AWS SNS APIエラー: {0}")]
    AwsSdkError(String),
}

/// SNS操作トレイト（テスト用の抽象化）
#[async_trait]
pub trait SnsOps: Send + Sync {
    /// サブスクリプションを確認する
    ///
    /// # 引数
    /// * `topic_arn` - SNSトピックARN
    /// * `token` - SubscriptionConfirmation/UnsubscribeConfirmationに含まれるトークン
    ///
    /// # 戻り値
    /// * `Ok(String)` - 確認されたサブスクリプションARN
    /// * `Err(SnsOpsError)` - エラー
    async fn confirm_subscription(
        &self,
        topic_arn: &str,
        token: &str,
    ) -> Result<String, SnsOpsError>;
}

/// 実際のAWS SNS SDKを使用したSNS操作実装
pub struct AwsSnsOps {
    client: SnsClient,
}

impl AwsSnsOps {
    pub fn new(client: SnsClient) -> Self {
        Self { client }
    }

    /// AWS設定からデフォルトのクライアントを作成
    pub async fn from_config() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = SnsClient::new(&config);
        Self::new(client)
    }
}

#[async_trait]
impl SnsOps for AwsSnsOps {
    async fn confirm_subscription(
        &self,
        topic_arn: &str,
        token: &str,
    ) -> Result<String, SnsOpsError> {
        info!(topic_arn = %topic_arn, "SNSサブスクリプション確認開始");

        let result = self
            .client
            .confirm_subscription()
            .topic_arn(topic_arn)
            .token(token)
            .send()
            .await;

        match result {
            Ok(response) => {
                let subscription_arn = response.subscription_arn().unwrap_or("unknown").to_string();

                info!(
                    topic_arn = %topic_arn,
                    subscription_arn = %subscription_arn,
                    "SNSサブスクリプション確認成功"
                );

                Ok(subscription_arn)
            }
            Err(err) => {
                warn!(
                    topic_arn = %topic_arn,
                    error = %err,
                    "SNSサブスクリプション確認エラー"
                );
                Err(SnsOpsError::AwsSdkError(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::Mutex;

    /// テスト用のモックSNS操作
    ///
    /// 呼び出された(topic_arn, token)を記録する。
    pub(crate) struct MockSnsOps {
        fail: bool,
        confirmed: Mutex<Vec<(String, String)>>,
    }

    impl MockSnsOps {
        pub(crate) fn new() -> Self {
            Self {
                fail: false,
                confirmed: Mutex::new(Vec::new()),
            }
        }

        /// 常に失敗するモックを作成
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                confirmed: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn confirmed(&self) -> Vec<(String, String)> {
            self.confirmed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SnsOps for MockSnsOps {
        async fn confirm_subscription(
            &self,
            topic_arn: &str,
            token: &str,
        ) -> Result<String, SnsOpsError> {
            self.confirmed
                .lock()
                .unwrap()
                .push((topic_arn.to_string(), token.to_string()));

            if self.fail {
                Err(SnsOpsError::AwsSdkError("mock error".to_string()))
            } else {
                Ok(format!("{}:mock-subscription", topic_arn))
            }
        }
    }
}
