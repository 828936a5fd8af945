//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// qipextractクレート全体で使用するエラー型
///
/// ワークブックのデコード、スキーマ設定の検証、ページ単位の抽出処理で
/// 発生するエラーを統一的に扱います。
///
/// # 伝播ポリシー
///
/// - `Io` / `Parse` / `Zip` / `Xml` / `SecurityViolation`: ワークブック自体を
///   デコードできない致命的エラー。実行全体を中断し、呼び出し元へ返されます。
/// - `PageUnavailable`: 1ページの処理失敗。エンジン内でエラーログに記録され、
///   次のアンカーページへ処理が継続します。
/// - `InvalidRange`: 範囲文字列が解析できない。該当する穴組はスキップされます。
/// - `Config` / `Json`: スキーマ設定が無効な場合（`build()`時に検出）。
///
/// # 使用例
///
/// ```rust,no_run
/// use qipextract::{ExtractorBuilder, QipExtractError};
///
/// match ExtractorBuilder::new().build() {
///     Err(QipExtractError::Config(msg)) => eprintln!("設定エラー: {}", msg),
///     _ => {}
/// }
/// ```
#[derive(Error, Debug)]
pub enum QipExtractError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// calamineがワークブックを解析できなかったエラー
    #[error("Failed to parse Excel file: {0}")]
    Parse(#[from] calamine::Error),

    /// XML内のUTF-8文字列の変換エラー
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// XML属性の数値変換エラー
    #[error("Number parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// XLSXファイル（ZIPアーカイブ）の解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// XLSX内部XMLの解析エラー
    #[error("XML parse error: {0}")]
    Xml(String),

    /// スキーマ設定のJSON解析エラー
    #[error("Configuration JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 設定の検証に失敗したエラー
    ///
    /// # 例
    ///
    /// ```rust,no_run
    /// use qipextract::QipExtractError;
    ///
    /// let error = QipExtractError::Config("no active cavity group".to_string());
    /// assert!(error.to_string().starts_with("Configuration error"));
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// 範囲文字列（例: "K3:R10"）の解析に失敗したエラー
    #[error("Invalid range '{input}': {reason}")]
    InvalidRange {
        /// 入力された範囲文字列
        input: String,
        /// 失敗の理由
        reason: String,
    },

    /// ワークシートを読み込めなかった、または参照できなかったエラー
    ///
    /// メッセージに"worksheet"を含むため、エラーログでは工作表錯誤に分類されます。
    #[error("worksheet '{sheet}' is unavailable: {message}")]
    PageUnavailable {
        /// ワークシート名
        sheet: String,
        /// 詳細メッセージ
        message: String,
    },

    /// セキュリティ制限に違反したエラー
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl QipExtractError {
    /// 範囲解析エラーを生成するヘルパー
    pub(crate) fn invalid_range(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
