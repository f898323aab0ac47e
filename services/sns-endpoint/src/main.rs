//! SNS HTTP(S)サブスクリプション受信サーバー
//!
//! 本バイナリは以下の機能を提供する:
//! - SNS通知の受信 (POST {TOPIC_PATH})
//! - サブスクリプションの自動確認
//! - ヘルスチェック (GET /health)

use sns_endpoint::{AppState, AwsSnsOps, EndpointConfig, create_router, init_logging};
use std::sync::Arc;
use tokio::signal;

/// 停止のきっかけになったシグナル
#[derive(Debug, Clone, Copy)]
enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
        }
    }
}

/// SIGINTを待機する
///
/// ハンドラーを登録できない場合はログを残して待機し続ける（SIGTERM側で停止できる）。
async fn interrupt() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!(error = %e, "SIGINT ハンドラーを登録できません");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM ハンドラーを登録できません");
            std::future::pending::<()>().await;
        }
    }
}

// 非Unix環境ではSIGTERMを待機しない
#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// シャットダウンシグナルを待機する
///
/// 受信後は処理中のSNS配信を捌き切ってから停止する。
/// 途中で落ちた配信はSNS側のリトライポリシーで再送される。
async fn shutdown_signal(topic_path: String) {
    let received = tokio::select! {
        _ = interrupt() => ShutdownSignal::Interrupt,
        _ = terminate() => ShutdownSignal::Terminate,
    };

    tracing::info!(
        signal = received.as_str(),
        topic_path = %topic_path,
        "シグナルを受信しました。新規配信の受付を止めて停止します"
    );
}

/// メイン関数
///
/// # 環境変数
/// - `LISTEN_ADDR`: リッスンアドレス（デフォルト: 127.0.0.1:8080）
/// - `TOPIC_PATH`: SNSの配信先パス（デフォルト: /topic）
/// - `AUTO_CONFIRM_SUBSCRIPTIONS`: サブスクリプションを自動確認するか（デフォルト: true）
/// - `BODY_LIMIT_BYTES`: ボディ上限（デフォルト: 2MiB）
/// - `RUST_LOG`: ログレベル（デフォルト: info）
#[tokio::main]
async fn main() {
    init_logging();

    tracing::info!("SNS エンドポイントを起動します");

    let config = match EndpointConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "設定の読み込みに失敗しました");
            std::process::exit(1);
        }
    };
    tracing::info!(
        listen_addr = %config.listen_addr,
        topic_path = %config.topic_path,
        auto_confirm = config.auto_confirm_subscriptions,
        body_limit = config.body_limit,
        "設定を読み込みました"
    );

    let sns = Arc::new(AwsSnsOps::from_config().await);
    let addr = config.listen_addr;
    let topic_path = config.topic_path.clone();
    let app = create_router(AppState::new(config, sns));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("アドレスのバインドに失敗しました");
    tracing::info!("リッスン開始: {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(topic_path))
        .await
        .expect("サーバーの起動に失敗しました");

    tracing::info!("サーバーが正常に停止しました");
}
