//! Error Log
//!
//! ページ単位の処理失敗を記録する追記専用ログ。ログへの記録は処理を中断しません。

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::api::ErrorType;

/// 1件のエラー記録
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// 発生箇所（`"<ファイル名>: <シート名>"`）
    pub sheet_name: String,

    /// メッセージから判定した分類
    pub error_type: ErrorType,

    /// 元のエラーメッセージ
    pub error_message: String,

    /// 記録時刻
    pub timestamp: DateTime<Utc>,
}

/// エラー集計
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    /// 総件数
    pub total: usize,

    /// 分類ラベルごとの件数
    pub by_type: IndexMap<String, usize>,

    /// 発生箇所ごとの件数
    pub by_sheet: IndexMap<String, usize>,
}

/// エラーログ
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorLog {
    records: Vec<ErrorRecord>,
}

impl ErrorLog {
    /// 空のログを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// エラーを記録する
    pub fn log_error(&mut self, sheet_name: impl Into<String>, message: impl Into<String>) {
        let sheet_name = sheet_name.into();
        let error_message = message.into();
        let error_type = ErrorType::classify(&error_message);

        tracing::warn!(
            sheet = %sheet_name,
            error_type = error_type.label(),
            "{}",
            error_message
        );

        self.records.push(ErrorRecord {
            sheet_name,
            error_type,
            error_message,
            timestamp: Utc::now(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.records.len()
    }

    /// 記録順のエラー一覧
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// 分類別・発生箇所別の件数を集計する
    pub fn summary(&self) -> ErrorSummary {
        let mut summary = ErrorSummary {
            total: self.records.len(),
            ..ErrorSummary::default()
        };
        for record in &self.records {
            *summary
                .by_type
                .entry(record.error_type.label().to_string())
                .or_insert(0) += 1;
            *summary
                .by_sheet
                .entry(record.sheet_name.clone())
                .or_insert(0) += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_and_classify() {
        let mut log = ErrorLog::new();
        assert!(!log.has_errors());

        log.log_error("a.xlsx: Batch1", "Invalid range 'K3:'");
        log.log_error("a.xlsx: Batch2", "unexpected failure");

        assert!(log.has_errors());
        assert_eq!(log.error_count(), 2);
        assert_eq!(log.errors()[0].error_type, ErrorType::Range);
        assert_eq!(log.errors()[1].error_type, ErrorType::General);
        assert_eq!(log.errors()[0].sheet_name, "a.xlsx: Batch1");
    }

    #[test]
    fn test_summary_counts() {
        let mut log = ErrorLog::new();
        log.log_error("a.xlsx: Batch1", "data missing");
        log.log_error("a.xlsx: Batch1", "data missing again");
        log.log_error("b.xlsx: Batch1", "chart failed");

        let summary = log.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_type["數據錯誤"], 2);
        assert_eq!(summary.by_type["圖表錯誤"], 1);
        assert_eq!(summary.by_sheet["a.xlsx: Batch1"], 2);
        assert_eq!(summary.by_sheet["b.xlsx: Batch1"], 1);
    }

    #[test]
    fn test_clear() {
        let mut log = ErrorLog::new();
        log.log_error("x", "y");
        log.clear();
        assert_eq!(log.error_count(), 0);
        assert_eq!(log.summary().total, 0);
    }

    #[test]
    fn test_serializes_as_list() {
        let mut log = ErrorLog::new();
        log.log_error("a.xlsx: S1", "worksheet 'S1' is unavailable: bad xml");
        let json = serde_json::to_value(&log).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["sheetName"], "a.xlsx: S1");
        assert_eq!(json[0]["errorType"], "工作表錯誤");
        assert!(json[0]["timestamp"].is_string());
    }
}
