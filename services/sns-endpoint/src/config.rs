// エンドポイント設定
//
// 環境変数からリッスンアドレス・受信パス・自動確認の有無・ボディ上限を読み込む。

use crate::parameter::DEFAULT_BODY_LIMIT;
use std::net::SocketAddr;
use thiserror::Error;

/// リッスンアドレス環境変数名
pub const LISTEN_ADDR_ENV: &str = "LISTEN_ADDR";
/// 受信パス環境変数名
pub const TOPIC_PATH_ENV: &str = "TOPIC_PATH";
/// サブスクリプション自動確認環境変数名
pub const AUTO_CONFIRM_ENV: &str = "AUTO_CONFIRM_SUBSCRIPTIONS";
/// ボディ上限環境変数名
pub const BODY_LIMIT_ENV: &str = "BODY_LIMIT_BYTES";

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_TOPIC_PATH: &str = "/topic";

/// 設定のエラー型
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl ConfigError {
    fn invalid(key: &str, value: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// エンドポイント設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// リッスンアドレス (LISTEN_ADDR)
    pub listen_addr: SocketAddr,
    /// SNSが配信するパス (TOPIC_PATH、`/`始まり)
    pub topic_path: String,
    /// SubscriptionConfirmationを自動で確認するか (AUTO_CONFIRM_SUBSCRIPTIONS)
    pub auto_confirm_subscriptions: bool,
    /// バッファするボディの最大バイト数 (BODY_LIMIT_BYTES)
    pub body_limit: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            topic_path: DEFAULT_TOPIC_PATH.to_string(),
            auto_confirm_subscriptions: true,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl EndpointConfig {
    /// 環境変数から設定を読み込み
    ///
    /// 未設定・空文字の項目はデフォルト値を使う:
    /// - LISTEN_ADDR: 127.0.0.1:8080
    /// - TOPIC_PATH: /topic
    /// - AUTO_CONFIRM_SUBSCRIPTIONS: true
    /// - BODY_LIMIT_BYTES: 2MiB
    pub fn from_env() -> Result<Self, ConfigError> {
        let get = |key: &str| -> Option<String> {
            std::env::var(key)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let listen_addr_raw = get(LISTEN_ADDR_ENV).unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::invalid(LISTEN_ADDR_ENV, &listen_addr_raw))?;

        let topic_path = get(TOPIC_PATH_ENV).unwrap_or_else(|| DEFAULT_TOPIC_PATH.to_string());
        if !is_valid_topic_path(&topic_path) {
            return Err(ConfigError::invalid(TOPIC_PATH_ENV, &topic_path));
        }

        let auto_confirm_subscriptions = match get(AUTO_CONFIRM_ENV) {
            Some(value) => parse_bool(&value).ok_or_else(|| ConfigError::invalid(AUTO_CONFIRM_ENV, &value))?,
            None => true,
        };

        let body_limit = match get(BODY_LIMIT_ENV) {
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or_else(|| ConfigError::invalid(BODY_LIMIT_ENV, &value))?,
            None => DEFAULT_BODY_LIMIT,
        };

        Ok(Self {
            listen_addr,
            topic_path,
            auto_confirm_subscriptions,
            body_limit,
        })
    }
}

/// 受信パスとして使える固定パスかどうか
///
/// `/`始まりで、ルーターのキャプチャ・ワイルドカード記法（`{` `}` `*`）を含まないこと。
fn is_valid_topic_path(path: &str) -> bool {
    path.starts_with('/') && !path.contains(['{', '}', '*'])
}

/// 真偽値文字列をパース（大文字小文字を区別しない）
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
