//! ハンドラー引数の記述子
//!
//! 引数に付与するマーカーと宣言型を、登録時に明示的に宣言する。
//! リゾルバーはこの記述子だけを見て対応可否を判定する。

use std::fmt;

/// axumのデフォルトボディ上限（2MiB）
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// 引数マーカー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterMarker {
    /// Notificationの`Message`を受け取る
    NotificationMessage,
    /// Notificationの`Subject`を受け取る
    NotificationSubject,
}

impl ParameterMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterMarker::NotificationMessage => "NotificationMessage",
            ParameterMarker::NotificationSubject => "NotificationSubject",
        }
    }
}

impl fmt::Display for ParameterMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 引数の宣言型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    /// 文字列
    Text,
    /// JSON値（メッセージ本文をJSONとして解釈する）
    Json,
    /// サブスクリプション確認ハンドル
    NotificationStatus,
    /// その他の型（型名を保持）
    Other(String),
}

impl DeclaredType {
    /// メッセージ本文の文字列から生成できる型かどうか
    pub fn accepts_message_text(&self) -> bool {
        matches!(self, DeclaredType::Text | DeclaredType::Json)
    }
}

/// ハンドラー引数の記述子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// 引数の位置（0始まり）
    pub index: usize,
    /// 引数名
    pub name: String,
    /// 付与されたマーカー
    pub markers: Vec<ParameterMarker>,
    /// 宣言型
    pub declared_type: DeclaredType,
}

impl ParameterDescriptor {
    /// マーカーなしの記述子を作成
    pub fn new(index: usize, name: impl Into<String>, declared_type: DeclaredType) -> Self {
        Self {
            index,
            name: name.into(),
            markers: Vec::new(),
            declared_type,
        }
    }

    /// マーカーを付与する
    pub fn with_marker(mut self, marker: ParameterMarker) -> Self {
        if !self.markers.contains(&marker) {
            self.markers.push(marker);
        }
        self
    }

    /// 指定したマーカーが付与されているか
    pub fn has_marker(&self, marker: ParameterMarker) -> bool {
        self.markers.contains(&marker)
    }
}

/// ハンドラーのシグネチャ
///
/// 引数記述子を宣言順に保持する。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HandlerSignature {
    /// ハンドラー名
    pub name: String,
    parameters: Vec<ParameterDescriptor>,
}

impl HandlerSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// 引数を末尾に追加する
    ///
    /// `index`は追加順で自動的に振られる。
    pub fn param(
        mut self,
        name: impl Into<String>,
        declared_type: DeclaredType,
        markers: &[ParameterMarker],
    ) -> Self {
        let mut descriptor = ParameterDescriptor::new(self.parameters.len(), name, declared_type);
        for marker in markers {
            descriptor = descriptor.with_marker(*marker);
        }
        self.parameters.push(descriptor);
        self
    }

    /// 指定位置の引数を取得
    pub fn parameter(&self, index: usize) -> Option<&ParameterDescriptor> {
        self.parameters.get(index)
    }
}

/// 引数解決時のコンテキスト
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingContext {
    body_limit: usize,
}

impl BindingContext {
    /// ボディ上限を指定して作成
    pub fn new(body_limit: usize) -> Self {
        Self { body_limit }
    }

    /// バッファするリクエストボディの最大バイト数
    pub fn body_limit(&self) -> usize {
        self.body_limit
    }
}

impl Default for BindingContext {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// マーカーの表示名を確認
    #[test]
    fn test_marker_display() {
        assert_eq!(
            ParameterMarker::NotificationMessage.to_string(),
            "NotificationMessage"
        );
        assert_eq!(
            ParameterMarker::NotificationSubject.to_string(),
            "NotificationSubject"
        );
    }

    /// 同じマーカーを重複して付与しても1つだけ保持されることを確認
    #[test]
    fn test_with_marker_is_deduplicated() {
        let descriptor = ParameterDescriptor::new(0, "message", DeclaredType::Text)
            .with_marker(ParameterMarker::NotificationMessage)
            .with_marker(ParameterMarker::NotificationMessage);

        assert_eq!(descriptor.markers, vec![ParameterMarker::NotificationMessage]);
        assert!(descriptor.has_marker(ParameterMarker::NotificationMessage));
        assert!(!descriptor.has_marker(ParameterMarker::NotificationSubject));
    }

    /// シグネチャの引数に宣言順でindexが振られることを確認
    #[test]
    fn test_signature_assigns_indices_in_order() {
        let signature = HandlerSignature::new("handle")
            .param("subject", DeclaredType::Text, &[])
            .param(
                "message",
                DeclaredType::Text,
                &[ParameterMarker::NotificationMessage],
            );

        assert_eq!(signature.parameter(0).unwrap().name, "subject");
        assert_eq!(signature.parameter(1).unwrap().index, 1);
        assert!(signature.parameter(2).is_none());
    }

    #[test]
    fn test_accepts_message_text() {
        assert!(DeclaredType::Text.accepts_message_text());
        assert!(DeclaredType::Json.accepts_message_text());
        assert!(!DeclaredType::NotificationStatus.accepts_message_text());
        assert!(!DeclaredType::Other("Integer".to_string()).accepts_message_text());
    }

    #[test]
    fn test_binding_context_default_limit() {
        assert_eq!(BindingContext::default().body_limit(), DEFAULT_BODY_LIMIT);
        assert_eq!(BindingContext::new(16).body_limit(), 16);
    }
}
